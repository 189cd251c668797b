//! # Receipt Text
//!
//! Small text helpers shared by the bill, the fiscal check annotations and
//! the EGAIS confirmation slip.

/// Group separator (ASCII 29) used inside marking code payloads.
pub const GROUP_SEPARATOR: char = '\u{1d}';

/// How the front-end spells the group separator in JSON.
pub const GROUP_SEPARATOR_PLACEHOLDER: &str = "<GS>";

/// Centres `text` in a line of `width` characters.
///
/// Extra padding goes to the right; text wider than the line is returned
/// unchanged.
///
/// ## Example
/// ```rust
/// use kassa_core::receipt::center;
///
/// assert_eq!(center("СЧЕТ", 10), "   СЧЕТ   ");
/// ```
pub fn center(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.to_string();
    }
    let total = width - len;
    let left = total / 2;
    let right = total - left;
    format!("{}{}{}", " ".repeat(left), text, " ".repeat(right))
}

/// Splits a signature into space-separated groups of four characters.
///
/// ## Example
/// ```rust
/// use kassa_core::receipt::signature_groups;
///
/// assert_eq!(signature_groups("3045022100AB"), "3045 0221 00AB");
/// ```
pub fn signature_groups(sign: &str) -> String {
    sign.chars()
        .collect::<Vec<_>>()
        .chunks(4)
        .map(|chunk| chunk.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Wraps grouped signature text to the printable line width without
/// splitting a group.
pub fn wrap_groups(grouped: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for group in grouped.split(' ').filter(|g| !g.is_empty()) {
        let needed = if line.is_empty() {
            group.chars().count()
        } else {
            line.chars().count() + 1 + group.chars().count()
        };
        if needed > width && !line.is_empty() {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(group);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

/// Replaces the `<GS>` placeholder with the real control character.
pub fn restore_group_separators(payload: &str) -> String {
    payload.replace(GROUP_SEPARATOR_PLACEHOLDER, &GROUP_SEPARATOR.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_venue_title() {
        let line = center("Пиццерия на Московской", 45);
        assert_eq!(line.chars().count(), 45);
        assert!(line.starts_with("           Пиццерия"));
        assert_eq!(center("x".repeat(50).as_str(), 45).len(), 50);
    }

    #[test]
    fn test_signature_groups() {
        assert_eq!(signature_groups("ABCDEFGHI"), "ABCD EFGH I");
        assert_eq!(signature_groups(""), "");
    }

    #[test]
    fn test_wrap_groups() {
        let grouped = signature_groups(&"A".repeat(40));
        let lines = wrap_groups(&grouped, 20);
        assert_eq!(lines, vec!["AAAA AAAA AAAA AAAA", "AAAA AAAA AAAA AAAA", "AAAA AAAA"]);
    }

    #[test]
    fn test_restore_group_separators() {
        let payload = "0104600000000000215abc<GS>93dGVz";
        assert_eq!(
            restore_group_separators(payload),
            "0104600000000000215abc\u{1d}93dGVz"
        );
    }
}

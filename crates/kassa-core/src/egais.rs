//! # EGAIS Documents
//!
//! Builds the ChequeV3 document sent to the UTM transport and reads the
//! UTM reply. Everything here is string-in, string-out; transport and
//! storage live in `kassa-egais`.
//!
//! ## Document Shape
//! ```text
//! ns:Documents (WB_DOC_SINGLE_01)
//! ├── ns:Owner / ns:FSRAR_ID          organisation id in EGAIS
//! └── ns:Document / ns:ChequeV3
//!     ├── ck:Identity                 unique per cheque
//!     ├── ck:Header
//!     │   ├── ck:Date                 2024-03-26T21:14:05
//!     │   ├── ck:Kassa                register serial
//!     │   ├── ck:Shift                shift number
//!     │   ├── ck:Number               document number
//!     │   └── ck:Type                 Продажа | Возврат
//!     └── ck:Content
//!         └── ck:Bottle × n           Barcode, EAN, Price
//! ```
//!
//! ## UTM Reply
//! ```text
//! <A><url>https://check.egais.ru?id=…</url><sign>3045…</sign><ver>2</ver></A>
//! <A><error>…</error><ver>2</ver></A>
//! ```
//! Fields are found by element name, never by pattern matching the body, so
//! free text inside `<error>` cannot be mistaken for a confirmation.

use chrono::NaiveDateTime;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use serde::{Deserialize, Serialize};
use std::io::Cursor;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::pricing::PricedOrder;
use crate::validation::{
    validate_bottle_barcode, validate_ean, validate_price_text, ValidationResult,
};

/// Document envelope namespace.
pub const NS_DOCUMENTS: &str = "http://fsrar.ru/WEGAIS/WB_DOC_SINGLE_01";
/// ChequeV3 namespace.
pub const NS_CHEQUE_V3: &str = "http://fsrar.ru/WEGAIS/ChequeV3";

const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

// =============================================================================
// Cheque Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChequeType {
    Sale,
    Return,
}

impl ChequeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChequeType::Sale => "Продажа",
            ChequeType::Return => "Возврат",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChequeHeader {
    pub date: NaiveDateTime,
    pub kassa: String,
    pub shift: u32,
    pub number: String,
    pub kind: ChequeType,
}

/// One alcohol line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChequeBottle {
    /// Excise stamp.
    pub barcode: String,
    pub ean: String,
    /// Unit price after discount; negative on returns.
    pub price: Money,
}

/// A ChequeV3 document ready to be serialised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChequeV3 {
    pub identity: String,
    pub owner_fsrar_id: String,
    pub header: ChequeHeader,
    pub bottles: Vec<ChequeBottle>,
}

impl ChequeV3 {
    /// Collects the alcohol lines of a priced order into a cheque.
    ///
    /// The barcode is the EGAIS mark code, falling back to the scanned
    /// marking code; the EAN falls back to the GTIN. Missing values are left
    /// empty so that [`ChequeV3::validate`] reports them by position.
    ///
    /// ## Errors
    /// [`CoreError::NoAlcoholItems`] when nothing in the order qualifies.
    pub fn from_order(
        order: &PricedOrder,
        header: ChequeHeader,
        owner_fsrar_id: impl Into<String>,
        identity: impl Into<String>,
    ) -> CoreResult<Self> {
        let sign = if header.kind == ChequeType::Return { -1 } else { 1 };
        let bottles: Vec<ChequeBottle> = order
            .alcohol_items()
            .map(|item| ChequeBottle {
                barcode: item
                    .codes
                    .egais_mark_code
                    .clone()
                    .or_else(|| item.codes.marking_code.clone())
                    .unwrap_or_default(),
                ean: item
                    .codes
                    .ean
                    .clone()
                    .or_else(|| item.codes.gtin.clone())
                    .unwrap_or_default(),
                price: item.discounted_unit_price * sign,
            })
            .collect();

        if bottles.is_empty() {
            return Err(CoreError::NoAlcoholItems {
                order: order.number.clone(),
            });
        }

        Ok(ChequeV3 {
            identity: identity.into(),
            owner_fsrar_id: owner_fsrar_id.into(),
            header,
            bottles,
        })
    }

    /// Checks every field against its regulatory format.
    pub fn validate(&self) -> ValidationResult<()> {
        if self.owner_fsrar_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "fsrar_id".to_string(),
            });
        }
        if self.header.kassa.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "kassa".to_string(),
            });
        }
        for (i, bottle) in self.bottles.iter().enumerate() {
            let at = |e: ValidationError| match e {
                ValidationError::InvalidFormat { field, reason } => {
                    ValidationError::invalid_format(format!("bottles[{}].{}", i, field), reason)
                }
                other => other,
            };
            validate_bottle_barcode(&bottle.barcode).map_err(at)?;
            validate_ean(&bottle.ean).map_err(at)?;
            validate_price_text(&bottle.price.to_string()).map_err(at)?;
        }
        Ok(())
    }

    /// Validates, then serialises the document.
    pub fn to_xml(&self) -> CoreResult<String> {
        self.validate()?;

        let mut w = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
        emit(&mut w, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut root = BytesStart::new("ns:Documents");
        root.push_attribute(("Version", "1.0"));
        root.push_attribute(("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"));
        root.push_attribute(("xmlns:ns", NS_DOCUMENTS));
        root.push_attribute(("xmlns:ck", NS_CHEQUE_V3));
        emit(&mut w, Event::Start(root))?;

        open(&mut w, "ns:Owner")?;
        text_element(&mut w, "ns:FSRAR_ID", self.owner_fsrar_id.trim())?;
        close(&mut w, "ns:Owner")?;

        open(&mut w, "ns:Document")?;
        open(&mut w, "ns:ChequeV3")?;
        text_element(&mut w, "ck:Identity", &self.identity)?;

        open(&mut w, "ck:Header")?;
        text_element(&mut w, "ck:Date", &self.header.date.format(DATE_FORMAT).to_string())?;
        text_element(&mut w, "ck:Kassa", self.header.kassa.trim())?;
        text_element(&mut w, "ck:Shift", &self.header.shift.to_string())?;
        text_element(&mut w, "ck:Number", &self.header.number)?;
        text_element(&mut w, "ck:Type", self.header.kind.as_str())?;
        close(&mut w, "ck:Header")?;

        open(&mut w, "ck:Content")?;
        for bottle in &self.bottles {
            open(&mut w, "ck:Bottle")?;
            text_element(&mut w, "ck:Barcode", &bottle.barcode)?;
            text_element(&mut w, "ck:EAN", &bottle.ean)?;
            text_element(&mut w, "ck:Price", &bottle.price.to_string())?;
            close(&mut w, "ck:Bottle")?;
        }
        close(&mut w, "ck:Content")?;

        close(&mut w, "ns:ChequeV3")?;
        close(&mut w, "ns:Document")?;
        close(&mut w, "ns:Documents")?;

        String::from_utf8(w.into_inner().into_inner())
            .map_err(|e| CoreError::XmlWrite(e.to_string()))
    }
}

fn emit<W: std::io::Write>(w: &mut Writer<W>, event: Event<'_>) -> CoreResult<()> {
    w.write_event(event)
        .map_err(|e| CoreError::XmlWrite(e.to_string()))
}

fn open<W: std::io::Write>(w: &mut Writer<W>, name: &str) -> CoreResult<()> {
    emit(w, Event::Start(BytesStart::new(name)))
}

fn close<W: std::io::Write>(w: &mut Writer<W>, name: &str) -> CoreResult<()> {
    emit(w, Event::End(BytesEnd::new(name)))
}

fn text_element<W: std::io::Write>(w: &mut Writer<W>, name: &str, value: &str) -> CoreResult<()> {
    open(w, name)?;
    emit(w, Event::Text(BytesText::new(value)))?;
    close(w, name)
}

// =============================================================================
// UTM Reply
// =============================================================================

/// What the UTM said about a submitted cheque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UtmReply {
    /// Accepted: confirmation URL for the QR code and the signature.
    Confirmed { url: String, sign: String },
    /// Refused, with the UTM's error text.
    Rejected { error: String },
}

/// Reads a UTM reply body.
///
/// ## Errors
/// [`CoreError::XmlParse`] when the body is not XML or carries neither a
/// confirmation nor an error element.
pub fn parse_utm_reply(body: &str) -> CoreResult<UtmReply> {
    let mut reader = Reader::from_str(body);
    let mut current: Option<String> = None;
    let mut url = None;
    let mut sign = None;
    let mut error = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                current = Some(String::from_utf8_lossy(e.local_name().as_ref()).to_lowercase());
            }
            Ok(Event::End(_)) => current = None,
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| CoreError::XmlParse(e.to_string()))?
                    .trim()
                    .to_string();
                assign(current.as_deref(), text, &mut url, &mut sign, &mut error);
            }
            Ok(Event::CData(c)) => {
                let text = String::from_utf8_lossy(&c.into_inner()).trim().to_string();
                assign(current.as_deref(), text, &mut url, &mut sign, &mut error);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(CoreError::XmlParse(e.to_string())),
        }
    }

    match (url, sign, error) {
        (_, _, Some(error)) => Ok(UtmReply::Rejected { error }),
        (Some(url), Some(sign), None) => Ok(UtmReply::Confirmed { url, sign }),
        _ => Err(CoreError::XmlParse(
            "reply carries neither url/sign nor error".to_string(),
        )),
    }
}

fn assign(
    element: Option<&str>,
    text: String,
    url: &mut Option<String>,
    sign: &mut Option<String>,
    error: &mut Option<String>,
) {
    if text.is_empty() {
        return;
    }
    match element {
        Some("url") => *url = Some(text),
        Some("sign") => *sign = Some(text),
        Some("error") => *error = Some(text),
        _ => {}
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::{price_order, PricingPolicy};
    use crate::types::{Order, OrderItem};
    use chrono::NaiveDate;

    const STAMP: &str =
        "22N0000123456789012345670110123456789AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

    fn header(kind: ChequeType) -> ChequeHeader {
        ChequeHeader {
            date: NaiveDate::from_ymd_opt(2024, 3, 26)
                .unwrap()
                .and_hms_opt(21, 14, 5)
                .unwrap(),
            kassa: "0123456789".to_string(),
            shift: 12,
            number: "57".to_string(),
            kind,
        }
    }

    fn vodka(stamp: &str) -> OrderItem {
        OrderItem {
            name: Some("Водка 0.5".to_string()),
            kolvo: Some("1".to_string()),
            price: Some("700".to_string()),
            alco: Some("1".to_string()),
            egais_mark_code: Some(stamp.to_string()),
            ean: Some("4600000000001".to_string()),
            ..Default::default()
        }
    }

    fn priced(items: Vec<OrderItem>, alldiscount: &str) -> PricedOrder {
        let order = Order {
            num: Some("477".to_string()),
            alldiscount: Some(alldiscount.to_string()),
            products: items,
            ..Default::default()
        };
        price_order(&order, PricingPolicy::default()).unwrap()
    }

    #[test]
    fn test_cheque_xml() {
        let order = priced(
            vec![
                vodka(STAMP),
                OrderItem {
                    name: Some("Пицца".to_string()),
                    kolvo: Some("1".to_string()),
                    price: Some("500".to_string()),
                    ..Default::default()
                },
            ],
            "10",
        );
        let cheque =
            ChequeV3::from_order(&order, header(ChequeType::Sale), "030000000001", "id-1").unwrap();
        assert_eq!(cheque.bottles.len(), 1);

        let xml = cheque.to_xml().unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("xmlns:ck=\"http://fsrar.ru/WEGAIS/ChequeV3\""));
        assert!(xml.contains("<ns:FSRAR_ID>030000000001</ns:FSRAR_ID>"));
        assert!(xml.contains("<ck:Date>2024-03-26T21:14:05</ck:Date>"));
        assert!(xml.contains("<ck:Type>Продажа</ck:Type>"));
        assert!(xml.contains(&format!("<ck:Barcode>{}</ck:Barcode>", STAMP)));
        assert!(xml.contains("<ck:Price>630.00</ck:Price>"));
        assert!(!xml.contains("Пицца"));
    }

    #[test]
    fn test_return_prices_are_negative() {
        let order = priced(vec![vodka(STAMP)], "0");
        let cheque =
            ChequeV3::from_order(&order, header(ChequeType::Return), "030000000001", "id-2")
                .unwrap();
        let xml = cheque.to_xml().unwrap();
        assert!(xml.contains("<ck:Price>-700.00</ck:Price>"));
        assert!(xml.contains("<ck:Type>Возврат</ck:Type>"));
    }

    #[test]
    fn test_bad_barcode_fails_validation() {
        let order = priced(vec![vodka("SHORT-STAMP")], "0");
        let cheque =
            ChequeV3::from_order(&order, header(ChequeType::Sale), "030000000001", "id-3").unwrap();
        match cheque.to_xml() {
            Err(CoreError::Validation(ValidationError::InvalidFormat { field, .. })) => {
                assert_eq!(field, "bottles[0].barcode")
            }
            other => panic!("expected barcode validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_no_alcohol_items() {
        let order = priced(
            vec![OrderItem {
                name: Some("Чай".to_string()),
                kolvo: Some("1".to_string()),
                price: Some("90".to_string()),
                ..Default::default()
            }],
            "0",
        );
        let result = ChequeV3::from_order(&order, header(ChequeType::Sale), "0300", "id-4");
        assert!(matches!(result, Err(CoreError::NoAlcoholItems { .. })));
    }

    #[test]
    fn test_parse_confirmation() {
        let body = r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?>
            <A><url>https://check.egais.ru?id=8f2c&amp;dt=2603242114&amp;cn=0123</url>
            <sign>3045022100AB</sign><ver>2</ver></A>"#;
        assert_eq!(
            parse_utm_reply(body).unwrap(),
            UtmReply::Confirmed {
                url: "https://check.egais.ru?id=8f2c&dt=2603242114&cn=0123".to_string(),
                sign: "3045022100AB".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_rejection_ignores_url_text_inside_error() {
        let body = "<A><error>Bad cheque, see &lt;url&gt;http://x&lt;/url&gt;</error><ver>2</ver></A>";
        match parse_utm_reply(body).unwrap() {
            UtmReply::Rejected { error } => assert!(error.starts_with("Bad cheque")),
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(
            parse_utm_reply("502 Bad Gateway"),
            Err(CoreError::XmlParse(_))
        ));
        assert!(matches!(parse_utm_reply(""), Err(CoreError::XmlParse(_))));
        assert!(matches!(
            parse_utm_reply("<A><url>x</url></A>"),
            Err(CoreError::XmlParse(_))
        ));
    }
}

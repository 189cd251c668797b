//! # EGAIS Settings
//!
//! The `[egais]` and `[register]` sections of `kassa.toml`.
//!
//! ```toml
//! [egais]
//! enabled = true
//! host = "127.0.0.1:8080"
//! path = "/opt/in/ChequeV3"
//! fsrar_id = "030000000001"
//! timeout_secs = 10
//! xml_dir = "egais_xml"
//!
//! [register]
//! kassa_number = "0000000000012345"
//! shift_number = 1
//! ```
//!
//! With `enabled = false` cheques are still built and validated, then only
//! written to `xml_dir`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::{ReportingError, ReportingResult};

// =============================================================================
// EGAIS Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EgaisSettings {
    /// Transmit to the UTM. When false, cheques are only saved to disk.
    #[serde(default)]
    pub enabled: bool,

    /// UTM address, `host:port` or a full `http://` base URL.
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_path")]
    pub path: String,

    /// Organisation id in EGAIS (cheque owner).
    #[serde(default)]
    pub fsrar_id: String,

    /// Upper bound on one UTM request. There is no retry.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Where cheque XML and UTM replies are written.
    #[serde(default = "default_xml_dir")]
    pub xml_dir: PathBuf,
}

fn default_host() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_path() -> String {
    "/opt/in/ChequeV3".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_xml_dir() -> PathBuf {
    PathBuf::from("egais_xml")
}

impl Default for EgaisSettings {
    fn default() -> Self {
        EgaisSettings {
            enabled: false,
            host: default_host(),
            path: default_path(),
            fsrar_id: String::new(),
            timeout_secs: default_timeout(),
            xml_dir: default_xml_dir(),
        }
    }
}

impl EgaisSettings {
    /// Full URL cheques are posted to.
    pub fn endpoint(&self) -> ReportingResult<Url> {
        let host = self.host.trim().trim_end_matches('/');
        let base = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("http://{}", host)
        };
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        Ok(Url::parse(&format!("{}{}", base, path))?)
    }

    pub fn validate(&self) -> ReportingResult<()> {
        if self.timeout_secs == 0 {
            return Err(ReportingError::InvalidConfig(
                "timeout_secs must be greater than 0".into(),
            ));
        }
        if self.enabled {
            if self.host.trim().is_empty() {
                return Err(ReportingError::InvalidConfig(
                    "host is required when EGAIS is enabled".into(),
                ));
            }
            if self.fsrar_id.trim().is_empty() {
                return Err(ReportingError::InvalidConfig(
                    "fsrar_id is required when EGAIS is enabled".into(),
                ));
            }
            self.endpoint()?;
        }
        Ok(())
    }

    /// `KASSA_EGAIS_*` overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(enabled) = std::env::var("KASSA_EGAIS_ENABLED") {
            match enabled.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.enabled = true,
                "0" | "false" | "no" => self.enabled = false,
                _ => {}
            }
        }

        if let Ok(host) = std::env::var("KASSA_EGAIS_HOST") {
            debug!(host = %host, "Overriding UTM host from environment");
            self.host = host;
        }

        if let Ok(id) = std::env::var("KASSA_EGAIS_FSRAR_ID") {
            self.fsrar_id = id;
        }

        if let Ok(timeout) = std::env::var("KASSA_EGAIS_TIMEOUT_SECS") {
            if let Ok(t) = timeout.parse::<u64>() {
                self.timeout_secs = t;
            }
        }

        if let Ok(dir) = std::env::var("KASSA_EGAIS_XML_DIR") {
            self.xml_dir = PathBuf::from(dir);
        }
    }
}

// =============================================================================
// Register Defaults
// =============================================================================

/// Cheque header values used when the register did not report them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterDefaults {
    #[serde(default)]
    pub kassa_number: String,

    #[serde(default = "default_shift")]
    pub shift_number: u32,
}

fn default_shift() -> u32 {
    1
}

impl Default for RegisterDefaults {
    fn default() -> Self {
        RegisterDefaults {
            kassa_number: String::new(),
            shift_number: default_shift(),
        }
    }
}

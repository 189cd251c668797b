//! # Service Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     KASSA_PORT=8000  KASSA_EGAIS_ENABLED=true                          │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     --config <path> | KASSA_CONFIG | ~/.config/kassa/kassa.toml        │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [venue]
//! title = "Кафе «Пионер»"
//!
//! [pricing]
//! discount_cap_enabled = true
//!
//! [device]
//! driver = "emulator"
//! line_width = 45
//! draught_portion_litres = 0.5
//! feed_lines_cash = 2
//! feed_lines_card = 5
//! operator_password = 30
//!
//! [register]
//! kassa_number = "0000000000012345"
//! shift_number = 1
//!
//! [egais]
//! enabled = true
//! host = "127.0.0.1:8080"
//! fsrar_id = "030000000001"
//!
//! [storage]
//! database_path = "/var/lib/kassa/kassa.db"
//! fallback_dir = "/var/lib/kassa/LOGS"
//!
//! [server]
//! bind_addr = "0.0.0.0"
//! port = 5000
//!
//! [logging]
//! directory = "/var/log/kassa"
//! ```

use std::path::PathBuf;

use kassa_core::{PricingPolicy, Quantity, DEFAULT_LINE_WIDTH};
use kassa_egais::{EgaisSettings, RegisterDefaults, ReportingError};
use kassa_fiscal::reports::DEFAULT_OPERATOR_PASSWORD;
use kassa_fiscal::{BillLayout, SettlementOptions};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Egais(#[from] ReportingError),
}

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VenueConfig {
    /// Printed centred at the top of every bill.
    #[serde(default)]
    pub title: String,
}

/// Register driver. Only the emulator ships with the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    #[default]
    Emulator,
}

impl std::str::FromStr for DriverKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "emulator" => Ok(DriverKind::Emulator),
            other => Err(ConfigError::Invalid(format!(
                "Unknown device driver: '{}'. Valid options: emulator",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default)]
    pub driver: DriverKind,

    /// Printable characters per line.
    #[serde(default = "default_line_width")]
    pub line_width: usize,

    /// Litres in one ordered draught portion.
    #[serde(default = "default_draught_portion")]
    pub draught_portion_litres: f64,

    #[serde(default = "default_feed_cash")]
    pub feed_lines_cash: u8,

    #[serde(default = "default_feed_card")]
    pub feed_lines_card: u8,

    /// Password for X/Z reports.
    #[serde(default = "default_operator_password")]
    pub operator_password: u32,
}

fn default_line_width() -> usize {
    DEFAULT_LINE_WIDTH
}

fn default_draught_portion() -> f64 {
    0.5
}

fn default_feed_cash() -> u8 {
    2
}

fn default_feed_card() -> u8 {
    5
}

fn default_operator_password() -> u32 {
    DEFAULT_OPERATOR_PASSWORD
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            driver: DriverKind::default(),
            line_width: default_line_width(),
            draught_portion_litres: default_draught_portion(),
            feed_lines_cash: default_feed_cash(),
            feed_lines_card: default_feed_card(),
            operator_password: default_operator_password(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite file for audit logs and the product catalog.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Where audit records go when the database is unavailable.
    #[serde(default = "default_fallback_dir")]
    pub fallback_dir: PathBuf,
}

fn default_database_path() -> PathBuf {
    data_dir().join("kassa.db")
}

fn default_fallback_dir() -> PathBuf {
    data_dir().join("LOGS")
}

fn data_dir() -> PathBuf {
    directories::ProjectDirs::from("ru", "kassa", "kassa")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            database_path: default_database_path(),
            fallback_dir: default_fallback_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addr: default_bind_addr(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Daily rolling log files go here; console only when unset.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PricingConfig {
    #[serde(default)]
    pub discount_cap_enabled: bool,
}

// =============================================================================
// Main Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KassaConfig {
    #[serde(default)]
    pub venue: VenueConfig,

    #[serde(default)]
    pub pricing: PricingConfig,

    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub register: RegisterDefaults,

    #[serde(default)]
    pub egais: EgaisSettings,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl KassaConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`kassa.toml`)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        let path = config_path
            .or_else(|| std::env::var("KASSA_CONFIG").ok().map(PathBuf::from))
            .or_else(Self::default_config_path);
        if let Some(path) = path {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::Read {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.device.line_width < 20 {
            return Err(ConfigError::Invalid(
                "device.line_width must be at least 20".into(),
            ));
        }
        if !(self.device.draught_portion_litres > 0.0 && self.device.draught_portion_litres <= 10.0)
        {
            return Err(ConfigError::Invalid(
                "device.draught_portion_litres must be in (0, 10]".into(),
            ));
        }
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be set".into()));
        }
        self.egais.validate()?;
        Ok(())
    }

    /// `KASSA_*` overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(title) = std::env::var("KASSA_VENUE_TITLE") {
            self.venue.title = title;
        }

        if let Ok(cap) = std::env::var("KASSA_DISCOUNT_CAP") {
            match cap.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.pricing.discount_cap_enabled = true,
                "0" | "false" | "no" => self.pricing.discount_cap_enabled = false,
                _ => warn!(value = %cap, "Unknown KASSA_DISCOUNT_CAP value"),
            }
        }

        if let Ok(driver) = std::env::var("KASSA_DEVICE_DRIVER") {
            match driver.parse() {
                Ok(d) => self.device.driver = d,
                Err(e) => warn!(error = %e, "Ignoring KASSA_DEVICE_DRIVER"),
            }
        }

        if let Ok(width) = std::env::var("KASSA_LINE_WIDTH") {
            if let Ok(w) = width.parse::<usize>() {
                self.device.line_width = w;
            }
        }

        if let Ok(password) = std::env::var("KASSA_OPERATOR_PASSWORD") {
            if let Ok(p) = password.parse::<u32>() {
                self.device.operator_password = p;
            }
        }

        if let Ok(kassa) = std::env::var("KASSA_KASSA_NUMBER") {
            self.register.kassa_number = kassa;
        }

        if let Ok(shift) = std::env::var("KASSA_SHIFT_NUMBER") {
            if let Ok(s) = shift.parse::<u32>() {
                self.register.shift_number = s;
            }
        }

        if let Ok(path) = std::env::var("KASSA_DATABASE_PATH") {
            self.storage.database_path = PathBuf::from(path);
        }

        if let Ok(dir) = std::env::var("KASSA_FALLBACK_DIR") {
            self.storage.fallback_dir = PathBuf::from(dir);
        }

        if let Ok(addr) = std::env::var("KASSA_BIND_ADDR") {
            self.server.bind_addr = addr;
        }

        if let Ok(port) = std::env::var("KASSA_PORT") {
            if let Ok(p) = port.parse::<u16>() {
                debug!(port = p, "Overriding port from environment");
                self.server.port = p;
            }
        }

        if let Ok(dir) = std::env::var("KASSA_LOG_DIR") {
            self.logging.directory = Some(PathBuf::from(dir));
        }

        self.egais.apply_env_overrides();
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("ru", "kassa", "kassa")
            .map(|dirs| dirs.config_dir().join("kassa.toml"))
    }

    // =========================================================================
    // Derived Settings
    // =========================================================================

    pub fn settlement_options(&self) -> SettlementOptions {
        SettlementOptions {
            pricing: PricingPolicy {
                discount_cap_enabled: self.pricing.discount_cap_enabled,
            },
            draught_portion: Quantity::from_milli(
                (self.device.draught_portion_litres * 1000.0).round() as i64,
            ),
            feed_lines_cash: self.device.feed_lines_cash,
            feed_lines_card: self.device.feed_lines_card,
        }
    }

    pub fn bill_layout(&self) -> BillLayout {
        BillLayout {
            title: self.venue.title.clone(),
            line_width: self.device.line_width,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = KassaConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.device.line_width, 45);
        assert_eq!(config.device.operator_password, 30);
        assert!(!config.egais.enabled);
        assert_eq!(config.server.bind_address(), "0.0.0.0:5000");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[venue]
title = "Кафе"

[pricing]
discount_cap_enabled = true

[device]
draught_portion_litres = 0.33
feed_lines_card = 4

[egais]
enabled = true
fsrar_id = "030000000001"
"#
        )
        .unwrap();

        let config = KassaConfig::load(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.venue.title, "Кафе");
        assert!(config.egais.enabled);

        let options = config.settlement_options();
        assert!(options.pricing.discount_cap_enabled);
        assert_eq!(options.draught_portion, Quantity::from_milli(330));
        assert_eq!(options.feed_lines_cash, 2);
        assert_eq!(options.feed_lines_card, 4);
        assert_eq!(config.bill_layout().title, "Кафе");
    }

    #[test]
    fn test_validation() {
        let mut config = KassaConfig::default();
        config.device.line_width = 10;
        assert!(config.validate().is_err());

        let mut config = KassaConfig::default();
        config.device.draught_portion_litres = 0.0;
        assert!(config.validate().is_err());

        let mut config = KassaConfig::default();
        config.egais.enabled = true;
        assert!(matches!(config.validate(), Err(ConfigError::Egais(_))));
    }

    #[test]
    fn test_unknown_driver() {
        assert_eq!("Emulator".parse::<DriverKind>().unwrap(), DriverKind::Emulator);
        assert!("shtrih-com".parse::<DriverKind>().is_err());
        assert!(toml::from_str::<DeviceConfig>("driver = \"atol\"").is_err());
    }
}

//! Root configuration types.

use super::defaults::default_port;
use super::logging::LoggingConfig;
use super::tls::TlsConfig;
use serde::{Deserialize, Serialize};

/// Root configuration struct for tls-rotor.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub tls: TlsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            logging: LoggingConfig::default(),
            tls: TlsConfig::default(),
        }
    }
}

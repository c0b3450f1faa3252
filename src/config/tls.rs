//! TLS configuration types.

use super::defaults::{
    default_acme_refresh_interval_secs, default_alpn_protocols, default_min_version, default_modern_ciphers,
    default_session_tickets_enabled, default_ticket_ring_size,
    default_ticket_rotation_interval_secs,
};
use crate::settings::TlsVersion;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// TLS termination settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    /// Static certificate/key pairs; the first one is the SNI fallback
    #[serde(default)]
    pub certificates: Vec<CertificateConfig>,
    #[serde(default = "default_min_version")]
    pub min_version: TlsVersion,
    /// Restrict TLS 1.2 to ECDHE + AEAD suites and prefer server order
    #[serde(default = "default_modern_ciphers")]
    pub modern_ciphers: bool,
    #[serde(default = "default_alpn_protocols")]
    pub alpn_protocols: Vec<String>,
    #[serde(default)]
    pub acme: AcmeConfig,
    #[serde(default)]
    pub session_tickets: SessionTicketConfig,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            certificates: Vec::new(),
            min_version: default_min_version(),
            modern_ciphers: default_modern_ciphers(),
            alpn_protocols: default_alpn_protocols(),
            acme: AcmeConfig::default(),
            session_tickets: SessionTicketConfig::default(),
        }
    }
}

/// One PEM certificate chain and its private key.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Default)]
pub struct CertificateConfig {
    pub certificate_path: String,
    pub private_key_path: String,
    /// SNI names served by this certificate (wildcards allowed)
    #[serde(default)]
    pub server_names: Vec<String>,
}

/// Automatic certificate management.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct AcmeConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Hosts certificates may be obtained for
    #[serde(default)]
    pub hosts: Vec<String>,
    /// Directory for issued certificates; in-memory only when unset
    #[serde(default)]
    pub cache_dir: Option<String>,
    /// How often certificates are obtained for hosts still missing one
    #[serde(default = "default_acme_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

impl AcmeConfig {
    #[must_use]
    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

impl Default for AcmeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            hosts: Vec::new(),
            cache_dir: None,
            refresh_interval_secs: default_acme_refresh_interval_secs(),
        }
    }
}

/// Session ticket key rotation.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct SessionTicketConfig {
    #[serde(default = "default_session_tickets_enabled")]
    pub enabled: bool,
    /// Number of keys kept for decryption, including the active one
    #[serde(default = "default_ticket_ring_size")]
    pub ring_size: usize,
    #[serde(default = "default_ticket_rotation_interval_secs")]
    pub rotation_interval_secs: u64,
}

impl SessionTicketConfig {
    #[must_use]
    pub const fn rotation_interval(&self) -> Duration {
        Duration::from_secs(self.rotation_interval_secs)
    }
}

impl Default for SessionTicketConfig {
    fn default() -> Self {
        Self {
            enabled: default_session_tickets_enabled(),
            ring_size: default_ticket_ring_size(),
            rotation_interval_secs: default_ticket_rotation_interval_secs(),
        }
    }
}

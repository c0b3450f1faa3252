//! Default value functions for configuration fields.
//!
//! These back the `#[serde(default = ...)]` attributes in the configuration
//! types, so a partial JSON document always deserializes to a usable config.

use super::logging::LogFormat;
use crate::settings::TlsVersion;

// =============================================================================
// Port & Root Config
// =============================================================================

pub const fn default_port() -> u16 {
    8443
}

// =============================================================================
// Logging Defaults
// =============================================================================

pub fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn default_log_filename() -> String {
    "tls-rotor.log".to_string()
}

pub fn default_rotation() -> String {
    "daily".to_string()
}

pub const fn default_enable_file_logging() -> bool {
    false
}

pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

// =============================================================================
// TLS Defaults
// =============================================================================

pub const fn default_min_version() -> TlsVersion {
    TlsVersion::Tls12
}

pub const fn default_modern_ciphers() -> bool {
    true
}

pub fn default_alpn_protocols() -> Vec<String> {
    vec!["h2".to_string(), "http/1.1".to_string()]
}

// =============================================================================
// ACME Defaults
// =============================================================================

pub const fn default_acme_refresh_interval_secs() -> u64 {
    12 * 3600 // 12 hours
}

// =============================================================================
// Session Ticket Defaults
// =============================================================================

pub const fn default_session_tickets_enabled() -> bool {
    true
}

/// Keys kept for decryption: the active key plus three retired ones.
pub const fn default_ticket_ring_size() -> usize {
    4
}

pub const fn default_ticket_rotation_interval_secs() -> u64 {
    3600 // 1 hour
}

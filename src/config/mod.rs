//! Configuration module for tls-rotor.
//!
//! Configuration comes from JSON documents (env var, stdin, files) merged
//! over compiled defaults, followed by per-field environment overrides.
//!
//! # Module Structure
//!
//! - [`crate::config::types`]: Root `Config` struct
//! - [`tls`]: Certificates, protocol policy, ACME and session tickets
//! - [`logging`]: Logging configuration
//! - [`crate::config::loader`]: Configuration loading functions
//! - [`crate::config::validation`]: Configuration validation functions
//! - [`crate::config::defaults`]: Default value functions

pub mod defaults;
pub mod loader;
pub mod logging;
pub mod tls;
pub mod types;
pub mod validation;

pub use loader::load;

pub use logging::{LogFormat, LogLevel, LoggingConfig};

pub use tls::{AcmeConfig, CertificateConfig, SessionTicketConfig, TlsConfig};

pub use types::Config;

pub use validation::validate_config;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::TlsVersion;
    use std::time::Duration;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();

        assert_eq!(config.port, 8443);
        assert!(config.tls.certificates.is_empty());
        assert_eq!(config.tls.min_version, TlsVersion::Tls12);
        assert!(config.tls.modern_ciphers);
        assert_eq!(config.tls.alpn_protocols, vec!["h2", "http/1.1"]);

        assert!(!config.tls.acme.enabled);
        assert!(config.tls.acme.cache_dir.is_none());
        assert_eq!(
            config.tls.acme.refresh_interval(),
            Duration::from_secs(12 * 3600)
        );

        assert!(config.tls.session_tickets.enabled);
        assert_eq!(config.tls.session_tickets.ring_size, 4);
        assert_eq!(
            config.tls.session_tickets.rotation_interval(),
            Duration::from_secs(3600)
        );

        assert_eq!(config.logging.dir, "logs");
        assert_eq!(config.logging.rotation, "daily");
        assert!(!config.logging.enable_file_logging);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).expect("serialize");
        let deserialized: Config = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"tls": {"min_version": "1.3", "session_tickets": {"ring_size": 2}}}"#,
        )
        .expect("partial config");

        assert_eq!(config.port, 8443);
        assert_eq!(config.tls.min_version, TlsVersion::Tls13);
        assert_eq!(config.tls.session_tickets.ring_size, 2);
        assert_eq!(config.tls.session_tickets.rotation_interval_secs, 3600);
    }

    #[test]
    fn test_log_level_display() {
        assert_eq!(LogLevel::Trace.to_string(), "trace");
        assert_eq!(LogLevel::Info.to_string(), "info");
        assert_eq!(LogLevel::Error.to_string(), "error");
    }

    #[test]
    fn test_validation_requires_certificate_source() {
        let err = validate_config(&Config::default()).expect_err("no source");
        assert!(err.to_string().contains("No certificate source"));
    }

    #[test]
    fn test_validation_rejects_empty_ring() {
        let mut config = Config::default();
        config.tls.acme.enabled = true;
        config.tls.acme.hosts = vec!["example.test".to_string()];
        config.tls.session_tickets.ring_size = 0;
        assert!(validate_config(&config).is_err());

        config.tls.session_tickets.enabled = false;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_acme_refresh() {
        let mut config = Config::default();
        config.tls.acme.enabled = true;
        config.tls.acme.hosts = vec!["example.test".to_string()];
        config.tls.acme.refresh_interval_secs = 0;
        let err = validate_config(&config).expect_err("zero interval");
        assert!(err.to_string().contains("refresh_interval_secs"));
    }

    #[test]
    fn test_validation_requires_acme_hosts() {
        let mut config = Config::default();
        config.tls.acme.enabled = true;
        let err = validate_config(&config).expect_err("no hosts");
        assert!(err.to_string().contains("tls.acme.hosts"));
    }

    #[test]
    fn test_validation_checks_certificate_files() {
        let mut config = Config::default();
        config.tls.certificates.push(CertificateConfig {
            certificate_path: "/nonexistent/cert.pem".to_string(),
            private_key_path: "/nonexistent/key.pem".to_string(),
            server_names: Vec::new(),
        });
        let err = validate_config(&config).expect_err("missing file");
        assert!(err.to_string().contains("/nonexistent/cert.pem"));
    }
}

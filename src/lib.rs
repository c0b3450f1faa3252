#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_excessive_bools
)]

//! # tls-rotor
//!
//! Composable rustls server configuration with rotating session ticket keys.
//!
//! Configuration is built from a list of options applied in order. Session
//! ticket keys are rotated by a background actor that keeps a bounded ring of
//! recent keys, so tickets issued shortly before a rotation still resume.

/// Automatic certificate management (host policy, cache, resolver)
pub mod acme;

/// Server configuration and environment variables
pub mod config;

/// Structured logging configuration
pub mod logging;

/// Composable TLS configuration steps
pub mod options;

/// Certificate loading, ticket sealing and randomness
pub mod security;

/// TLS settings and conversion to a rustls server config
pub mod settings;

/// Background actor lifecycle
pub mod supervisor;

/// Session ticket keys, key ring and rotation
pub mod ticket;

pub use options::{
    new_tls_config, with_alpn, with_key_pair, with_min_version, with_named_key_pair,
    with_random_source, with_session_ticket_key_rotation, with_tls12, wrap, TlsOption,
};
pub use settings::{TlsSettings, TlsVersion};
pub use supervisor::TaskGroup;

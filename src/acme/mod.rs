//! Automatic certificate management.
//!
//! The protocol client lives behind [`CertificateIssuer`]; this module owns
//! host policy, persistence, background refresh and certificate selection
//! during the handshake.

pub mod cache;
pub mod manager;
pub mod policy;
pub mod refresh;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use thiserror::Error;

pub use cache::{CertCache, DirCache};
pub use manager::{AcmeManager, CertificateIssuer};
pub use policy::HostPolicy;
pub use refresh::CertificateRefresher;

use crate::options::TlsOption;
use crate::supervisor::TaskGroup;

#[derive(Debug, Error)]
pub enum AcmeError {
    #[error("host {0:?} is not allowed by the ACME host policy")]
    HostNotAllowed(String),
    #[error("the ACME terms of service have not been accepted")]
    TermsNotAccepted,
    #[error("no certificate issuer configured for {0}")]
    NoIssuer(String),
    #[error("certificate issuance failed: {0}")]
    Issuance(String),
    #[error("invalid certificate bundle for {host}: {reason}")]
    InvalidBundle { host: String, reason: String },
    #[error("invalid certificate cache key {0:?}")]
    InvalidCacheKey(String),
    #[error("certificate cache I/O error: {0}")]
    Io(#[from] io::Error),
}

/// A configuration step applied to an [`AcmeManager`].
pub type AcmeOption<'a> = Box<dyn FnOnce(&mut AcmeManager) -> anyhow::Result<()> + 'a>;

/// Combine several ACME options into one, applied in order.
pub fn acme_wrap<'a>(opts: Vec<AcmeOption<'a>>) -> AcmeOption<'a> {
    Box::new(move |mgr| {
        for opt in opts {
            opt(mgr)?;
        }
        Ok(())
    })
}

/// Serve certificates from an ACME manager configured by `opts`.
///
/// The manager accepts the CA terms of service and replaces the static
/// certificate store as the handshake resolver.
pub fn with_acme<'a>(opts: Vec<AcmeOption<'a>>) -> TlsOption<'a> {
    Box::new(move |settings| {
        let mut mgr = AcmeManager::new(Arc::new(settings.crypto_provider().clone()));
        mgr.set_accept_tos(true);
        for opt in opts {
            opt(&mut mgr)?;
        }
        settings.set_acme_manager(Arc::new(mgr));
        Ok(())
    })
}

/// Restrict issuance to `hosts`. An empty list leaves the policy unset.
pub fn with_acme_hosts<'a>(hosts: Vec<String>) -> AcmeOption<'a> {
    Box::new(move |mgr| {
        if !hosts.is_empty() {
            mgr.set_host_policy(HostPolicy::whitelist(hosts));
        }
        Ok(())
    })
}

pub fn with_acme_dir_cache<'a>(dir: impl Into<PathBuf>) -> AcmeOption<'a> {
    let dir = dir.into();
    Box::new(move |mgr| {
        let cache = DirCache::create(&dir).with_context(|| {
            format!("failed to create ACME cache directory {}", dir.display())
        })?;
        mgr.set_cache(Arc::new(cache));
        Ok(())
    })
}

pub fn with_acme_issuer<'a>(issuer: Arc<dyn CertificateIssuer>) -> AcmeOption<'a> {
    Box::new(move |mgr| {
        mgr.set_issuer(issuer);
        Ok(())
    })
}

/// Obtain certificates for the ACME manager's allowed hosts in the
/// background, at start and every `interval`, driven by `group`.
///
/// Must follow [`with_acme`]; it fails when no ACME manager is configured.
pub fn with_acme_refresh<'a>(group: &'a mut TaskGroup, interval: Duration) -> TlsOption<'a> {
    Box::new(move |settings| {
        if interval.is_zero() {
            anyhow::bail!("ACME refresh interval must be positive");
        }
        let Some(manager) = settings.acme_manager() else {
            anyhow::bail!("ACME refresh requires an ACME manager; apply with_acme first");
        };

        let hosts = manager.host_policy().map_or(0, HostPolicy::len);
        tracing::info!(
            hosts,
            interval_secs = interval.as_secs(),
            "ACME certificate refresh enabled"
        );
        group.add(CertificateRefresher::new(manager, interval));
        Ok(())
    })
}

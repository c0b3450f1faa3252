use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use rustls::crypto::CryptoProvider;
use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;

use super::{AcmeError, CertCache, HostPolicy};
use crate::security::tls::{certified_key_from_pem, normalize_host};

/// Issues certificates for a host, returning a PEM bundle holding the
/// private key and the certificate chain.
#[async_trait]
pub trait CertificateIssuer: Send + Sync + fmt::Debug {
    async fn issue(&self, host: &str) -> Result<Vec<u8>, AcmeError>;
}

/// Serves automatically issued certificates.
///
/// [`AcmeManager::obtain`] loads from memory, then the cache, then the issuer.
/// The handshake path never blocks on issuance: it serves from memory or the
/// cache only, and a [`CertificateRefresher`](super::CertificateRefresher)
/// obtains certificates for the allowed hosts ahead of time.
pub struct AcmeManager {
    provider: Arc<CryptoProvider>,
    accept_tos: bool,
    policy: Option<HostPolicy>,
    cache: Option<Arc<dyn CertCache>>,
    issuer: Option<Arc<dyn CertificateIssuer>>,
    certs: ArcSwap<HashMap<String, Arc<CertifiedKey>>>,
}

impl fmt::Debug for AcmeManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcmeManager")
            .field("accept_tos", &self.accept_tos)
            .field("policy", &self.policy)
            .field("cache", &self.cache)
            .field("issuer", &self.issuer)
            .field("certs", &self.certs.load().len())
            .finish_non_exhaustive()
    }
}

impl AcmeManager {
    #[must_use]
    pub fn new(provider: Arc<CryptoProvider>) -> Self {
        Self {
            provider,
            accept_tos: false,
            policy: None,
            cache: None,
            issuer: None,
            certs: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    pub fn set_accept_tos(&mut self, accept: bool) {
        self.accept_tos = accept;
    }

    #[must_use]
    pub const fn accept_tos(&self) -> bool {
        self.accept_tos
    }

    pub fn set_host_policy(&mut self, policy: HostPolicy) {
        self.policy = Some(policy);
    }

    #[must_use]
    pub const fn host_policy(&self) -> Option<&HostPolicy> {
        self.policy.as_ref()
    }

    pub fn set_cache(&mut self, cache: Arc<dyn CertCache>) {
        self.cache = Some(cache);
    }

    #[must_use]
    pub fn has_cache(&self) -> bool {
        self.cache.is_some()
    }

    pub fn set_issuer(&mut self, issuer: Arc<dyn CertificateIssuer>) {
        self.issuer = Some(issuer);
    }

    fn check_host(&self, host: &str) -> Result<(), AcmeError> {
        match &self.policy {
            Some(policy) => policy.check(host),
            None => Ok(()),
        }
    }

    fn cached(&self, host: &str) -> Result<Option<Arc<CertifiedKey>>, AcmeError> {
        if let Some(key) = self.certs.load().get(host) {
            return Ok(Some(key.clone()));
        }

        let Some(cache) = &self.cache else {
            return Ok(None);
        };
        match cache.get(host)? {
            Some(pem) => {
                let key = self.parse_bundle(host, &pem)?;
                self.remember(host, key.clone());
                Ok(Some(key))
            }
            None => Ok(None),
        }
    }

    fn parse_bundle(&self, host: &str, pem: &[u8]) -> Result<Arc<CertifiedKey>, AcmeError> {
        certified_key_from_pem(&self.provider, pem)
            .map(Arc::new)
            .map_err(|err| AcmeError::InvalidBundle {
                host: host.to_string(),
                reason: format!("{err:#}"),
            })
    }

    fn remember(&self, host: &str, key: Arc<CertifiedKey>) {
        self.certs.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(host.to_string(), key.clone());
            next
        });
    }

    /// Return the certificate for `host`, issuing and caching one if needed.
    pub async fn obtain(&self, host: &str) -> Result<Arc<CertifiedKey>, AcmeError> {
        let host = normalize_host(host);
        self.check_host(&host)?;

        if let Some(key) = self.cached(&host)? {
            return Ok(key);
        }

        if !self.accept_tos {
            return Err(AcmeError::TermsNotAccepted);
        }
        let issuer = self
            .issuer
            .as_ref()
            .ok_or_else(|| AcmeError::NoIssuer(host.clone()))?;

        tracing::info!(host = %host, "Requesting certificate");
        let pem = issuer.issue(&host).await?;
        let key = self.parse_bundle(&host, &pem)?;

        if let Some(cache) = &self.cache {
            if let Err(err) = cache.put(&host, &pem) {
                tracing::warn!(host = %host, error = %err, "Failed to cache certificate");
            }
        }
        self.remember(&host, key.clone());
        tracing::info!(host = %host, "Certificate ready");
        Ok(key)
    }
}

impl ResolvesServerCert for AcmeManager {
    fn resolve(&self, client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        let host = normalize_host(client_hello.server_name()?);
        if let Err(err) = self.check_host(&host) {
            tracing::debug!(error = %err, "Rejecting handshake");
            return None;
        }

        match self.cached(&host) {
            Ok(Some(key)) => Some(key),
            Ok(None) => {
                tracing::debug!(host = %host, "No certificate available yet");
                None
            }
            Err(err) => {
                tracing::warn!(host = %host, error = %err, "Failed to load cached certificate");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acme::DirCache;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn bundle() -> Vec<u8> {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join("example.test.bundle.pem");
        std::fs::read(path).expect("fixture")
    }

    #[derive(Debug, Default)]
    struct FixtureIssuer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CertificateIssuer for FixtureIssuer {
        async fn issue(&self, _host: &str) -> Result<Vec<u8>, AcmeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(bundle())
        }
    }

    fn manager() -> AcmeManager {
        AcmeManager::new(Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
    }

    #[tokio::test]
    async fn obtain_issues_once_then_serves_from_memory() {
        let issuer = Arc::new(FixtureIssuer::default());
        let mut mgr = manager();
        mgr.set_accept_tos(true);
        mgr.set_issuer(issuer.clone());

        let first = mgr.obtain("Example.Test").await.expect("issued");
        let second = mgr.obtain("example.test").await.expect("memory");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(issuer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn policy_blocks_unlisted_hosts() {
        let issuer = Arc::new(FixtureIssuer::default());
        let mut mgr = manager();
        mgr.set_accept_tos(true);
        mgr.set_issuer(issuer.clone());
        mgr.set_host_policy(HostPolicy::whitelist(["example.test"]));

        let err = mgr.obtain("other.test").await.expect_err("blocked");
        assert!(matches!(err, AcmeError::HostNotAllowed(_)));
        assert_eq!(issuer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn terms_must_be_accepted() {
        let mut mgr = manager();
        mgr.set_issuer(Arc::new(FixtureIssuer::default()));
        let err = mgr.obtain("example.test").await.expect_err("no tos");
        assert!(matches!(err, AcmeError::TermsNotAccepted));
    }

    #[tokio::test]
    async fn missing_issuer_is_reported() {
        let mut mgr = manager();
        mgr.set_accept_tos(true);
        let err = mgr.obtain("example.test").await.expect_err("no issuer");
        assert!(matches!(err, AcmeError::NoIssuer(host) if host == "example.test"));
    }

    #[tokio::test]
    async fn issued_bundle_is_written_to_cache_and_reused() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let cache = Arc::new(DirCache::create(tmp.path()).expect("cache"));

        let issuer = Arc::new(FixtureIssuer::default());
        let mut mgr = manager();
        mgr.set_accept_tos(true);
        mgr.set_issuer(issuer.clone());
        mgr.set_cache(cache.clone());
        mgr.obtain("example.test").await.expect("issued");
        assert!(cache.get("example.test").expect("get").is_some());

        // A fresh manager with no issuer still finds the cached bundle.
        let mut restarted = manager();
        restarted.set_cache(cache);
        restarted.obtain("example.test").await.expect("from cache");
        assert_eq!(issuer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn corrupt_cache_entry_is_an_error() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let cache = Arc::new(DirCache::create(tmp.path()).expect("cache"));
        cache.put("example.test", b"not pem").expect("put");

        let mut mgr = manager();
        mgr.set_cache(cache);
        let err = mgr.obtain("example.test").await.expect_err("corrupt");
        assert!(matches!(err, AcmeError::InvalidBundle { .. }));
    }
}

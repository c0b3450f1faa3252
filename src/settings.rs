//! The mutable TLS configuration object that configuration steps act on, and
//! its conversion into a [`rustls::ServerConfig`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use rustls::crypto::{CryptoProvider, SupportedKxGroup};
use rustls::server::{NoServerSessionStorage, ProducesTickets, ResolvesServerCert};
use rustls::sign::CertifiedKey;
use rustls::{ServerConfig, SupportedCipherSuite, SupportedProtocolVersion};
use serde::{Deserialize, Serialize};

use crate::acme::AcmeManager;
use crate::security::random::{ConfiguredRandom, RandomSource};
use crate::security::tls::CertificateStore;
use crate::ticket::{NoSessionTicketer, RotatingTicketer, MAX_TICKET_LIFETIME_SECS};

static TLS13_ONLY: &[&SupportedProtocolVersion] = &[&rustls::version::TLS13];

/// Minimum TLS protocol version accepted by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum TlsVersion {
    #[default]
    #[serde(rename = "1.2")]
    Tls12,
    #[serde(rename = "1.3")]
    Tls13,
}

impl TlsVersion {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Tls12 => "1.2",
            Self::Tls13 => "1.3",
        }
    }

    fn protocol_versions(self) -> &'static [&'static SupportedProtocolVersion] {
        match self {
            Self::Tls12 => rustls::DEFAULT_VERSIONS,
            Self::Tls13 => TLS13_ONLY,
        }
    }
}

impl fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TlsVersion {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1.2" => Ok(Self::Tls12),
            "1.3" => Ok(Self::Tls13),
            other => anyhow::bail!("invalid TLS version: {other} (must be 1.2 or 1.3)"),
        }
    }
}

// Environment overrides turn `1.3` into a JSON number, so accept both forms.
impl<'de> Deserialize<'de> for TlsVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(f64),
        }

        let text = match Raw::deserialize(deserializer)? {
            Raw::Text(text) => text,
            Raw::Number(number) => number.to_string(),
        };
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Server-side TLS settings assembled by configuration steps.
pub struct TlsSettings {
    provider: CryptoProvider,
    certificates: CertificateStore,
    acme: Option<Arc<AcmeManager>>,
    min_version: Option<TlsVersion>,
    cipher_suites: Option<Vec<SupportedCipherSuite>>,
    kx_groups: Option<Vec<&'static dyn SupportedKxGroup>>,
    prefer_server_cipher_suites: bool,
    alpn_protocols: Vec<Vec<u8>>,
    random: Arc<ConfiguredRandom>,
    ticketer: Arc<RotatingTicketer>,
    session_tickets_disabled: bool,
}

impl fmt::Debug for TlsSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsSettings")
            .field("certificates", &self.certificates.len())
            .field("acme", &self.acme.is_some())
            .field("min_version", &self.min_version)
            .field("cipher_suites", &self.cipher_suites)
            .field("prefer_server_cipher_suites", &self.prefer_server_cipher_suites)
            .field("ticketer", &self.ticketer)
            .field("session_tickets_disabled", &self.session_tickets_disabled)
            .finish_non_exhaustive()
    }
}

impl Default for TlsSettings {
    fn default() -> Self {
        Self::new()
    }
}

impl TlsSettings {
    #[must_use]
    pub fn new() -> Self {
        let random = Arc::new(ConfiguredRandom::new());
        Self {
            provider: rustls::crypto::aws_lc_rs::default_provider(),
            certificates: CertificateStore::default(),
            acme: None,
            min_version: None,
            cipher_suites: None,
            kx_groups: None,
            prefer_server_cipher_suites: false,
            alpn_protocols: Vec::new(),
            ticketer: Arc::new(RotatingTicketer::with_random_source(
                MAX_TICKET_LIFETIME_SECS,
                random.clone(),
            )),
            random,
            session_tickets_disabled: false,
        }
    }

    /// The crypto provider used to load keys and, narrowed by the configured
    /// suites and groups, to run handshakes.
    #[must_use]
    pub const fn crypto_provider(&self) -> &CryptoProvider {
        &self.provider
    }

    pub fn add_certificate(&mut self, names: Vec<String>, key: Arc<CertifiedKey>) {
        self.certificates.push(names, key);
    }

    #[must_use]
    pub fn certificate_count(&self) -> usize {
        self.certificates.len()
    }

    pub fn set_acme_manager(&mut self, manager: Arc<AcmeManager>) {
        self.acme = Some(manager);
    }

    #[must_use]
    pub fn acme_manager(&self) -> Option<Arc<AcmeManager>> {
        self.acme.clone()
    }

    pub fn set_min_version(&mut self, version: TlsVersion) {
        self.min_version = Some(version);
    }

    #[must_use]
    pub const fn min_version(&self) -> Option<TlsVersion> {
        self.min_version
    }

    pub fn set_cipher_suites(&mut self, suites: Vec<SupportedCipherSuite>) {
        self.cipher_suites = Some(suites);
    }

    #[must_use]
    pub fn cipher_suites(&self) -> Option<&[SupportedCipherSuite]> {
        self.cipher_suites.as_deref()
    }

    pub fn set_kx_groups(&mut self, groups: Vec<&'static dyn SupportedKxGroup>) {
        self.kx_groups = Some(groups);
    }

    pub fn set_prefer_server_cipher_suites(&mut self, prefer: bool) {
        self.prefer_server_cipher_suites = prefer;
    }

    #[must_use]
    pub const fn prefer_server_cipher_suites(&self) -> bool {
        self.prefer_server_cipher_suites
    }

    pub fn set_alpn_protocols(&mut self, protocols: Vec<Vec<u8>>) {
        self.alpn_protocols = protocols;
    }

    /// Override the randomness used for session ticket keys and nonces.
    ///
    /// Takes effect for every later draw, including those of rotators built
    /// before the override.
    pub fn set_random_source(&mut self, random: Arc<dyn RandomSource>) {
        self.random.set(random);
    }

    /// The configured random source, falling back to the operating system
    /// CSPRNG. It follows later calls to [`TlsSettings::set_random_source`].
    #[must_use]
    pub fn random_source(&self) -> Arc<dyn RandomSource> {
        self.random.clone()
    }

    /// The sink that receives rotated session ticket keys.
    #[must_use]
    pub fn ticketer(&self) -> Arc<RotatingTicketer> {
        self.ticketer.clone()
    }

    pub fn disable_session_tickets(&mut self) {
        self.session_tickets_disabled = true;
    }

    #[must_use]
    pub const fn session_tickets_disabled(&self) -> bool {
        self.session_tickets_disabled
    }

    /// Build the rustls server configuration.
    ///
    /// With session tickets disabled every resumption mechanism is switched
    /// off, so clients fall back to full handshakes.
    pub fn into_server_config(self) -> anyhow::Result<ServerConfig> {
        let mut provider = self.provider;
        if let Some(suites) = self.cipher_suites {
            provider.cipher_suites = suites;
        }
        if let Some(groups) = self.kx_groups {
            provider.kx_groups = groups;
        }

        let versions = self.min_version.unwrap_or_default().protocol_versions();
        let resolver: Arc<dyn ResolvesServerCert> = match self.acme {
            Some(manager) => manager,
            None => Arc::new(self.certificates),
        };

        let mut config = ServerConfig::builder_with_provider(Arc::new(provider))
            .with_protocol_versions(versions)
            .context("configured cipher suites cannot serve the configured protocol versions")?
            .with_no_client_auth()
            .with_cert_resolver(resolver);

        config.ignore_client_order = self.prefer_server_cipher_suites;
        config.alpn_protocols = self.alpn_protocols;

        if self.session_tickets_disabled {
            config.ticketer = Arc::new(NoSessionTicketer);
            config.send_tls13_tickets = 0;
            config.session_storage = Arc::new(NoServerSessionStorage {});
        } else if self.ticketer.enabled() {
            config.ticketer = self.ticketer;
        }

        Ok(config)
    }
}

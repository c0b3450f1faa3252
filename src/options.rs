//! Composable configuration steps for [`TlsSettings`].
//!
//! Each option is a boxed closure that mutates the settings and may fail.
//! Options are applied in order and the first failure stops the chain.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use rustls::crypto::aws_lc_rs::cipher_suite;
use rustls::crypto::aws_lc_rs::kx_group::{SECP256R1, X25519};

use crate::security::random::RandomSource;
use crate::security::tls::load_certified_key;
use crate::settings::{TlsSettings, TlsVersion};
use crate::supervisor::TaskGroup;
use crate::ticket::{KeyRotator, MAX_TICKET_LIFETIME_SECS};

/// A configuration step applied to [`TlsSettings`].
pub type TlsOption<'a> = Box<dyn FnOnce(&mut TlsSettings) -> anyhow::Result<()> + 'a>;

/// Combine several options into one, applied in order.
pub fn wrap<'a>(opts: Vec<TlsOption<'a>>) -> TlsOption<'a> {
    Box::new(move |settings| {
        for opt in opts {
            opt(settings)?;
        }
        Ok(())
    })
}

/// Fresh settings with every option applied.
pub fn new_tls_config(opts: Vec<TlsOption<'_>>) -> anyhow::Result<TlsSettings> {
    let mut settings = TlsSettings::new();
    wrap(opts)(&mut settings)?;
    Ok(settings)
}

/// Append a certificate chain and private key loaded from PEM files.
pub fn with_key_pair<'a>(cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> TlsOption<'a> {
    with_named_key_pair(Vec::new(), cert, key)
}

/// Like [`with_key_pair`], but the certificate is selected for the given SNI
/// names (wildcards allowed).
pub fn with_named_key_pair<'a>(
    names: Vec<String>,
    cert: impl Into<PathBuf>,
    key: impl Into<PathBuf>,
) -> TlsOption<'a> {
    let cert = cert.into();
    let key = key.into();
    Box::new(move |settings| {
        let certified = load_certified_key(settings.crypto_provider(), &cert, &key)
            .context("failed to load keypair")?;
        tracing::debug!(
            cert = %cert.display(),
            names = ?names,
            "Loaded TLS key pair"
        );
        settings.add_certificate(names, Arc::new(certified));
        Ok(())
    })
}

/// Modern TLS 1.2 policy: ECDHE key exchange with AEAD ciphers only, server
/// cipher order, X25519 and P-256. TLS 1.3 stays enabled.
pub fn with_tls12<'a>() -> TlsOption<'a> {
    Box::new(|settings| {
        settings.set_min_version(TlsVersion::Tls12);
        settings.set_prefer_server_cipher_suites(true);
        settings.set_kx_groups(vec![X25519, SECP256R1]);
        settings.set_cipher_suites(vec![
            cipher_suite::TLS13_AES_256_GCM_SHA384,
            cipher_suite::TLS13_CHACHA20_POLY1305_SHA256,
            cipher_suite::TLS13_AES_128_GCM_SHA256,
            cipher_suite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
            cipher_suite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
            cipher_suite::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256,
            cipher_suite::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256,
            cipher_suite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
            cipher_suite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
        ]);
        Ok(())
    })
}

pub fn with_min_version<'a>(version: TlsVersion) -> TlsOption<'a> {
    Box::new(move |settings| {
        settings.set_min_version(version);
        Ok(())
    })
}

/// Advertise the given ALPN protocols, in preference order.
pub fn with_alpn<'a, I, S>(protocols: I) -> TlsOption<'a>
where
    I: IntoIterator<Item = S>,
    S: Into<Vec<u8>>,
{
    let protocols: Vec<Vec<u8>> = protocols.into_iter().map(Into::into).collect();
    Box::new(move |settings| {
        settings.set_alpn_protocols(protocols);
        Ok(())
    })
}

/// Draw session ticket keys and ticket nonces from `random`.
///
/// Applies to every later draw regardless of option order; a rotator
/// registered by an earlier option switches to this source too. The initial
/// key of such a rotator was already drawn from the previous source.
pub fn with_random_source<'a>(random: Arc<dyn RandomSource>) -> TlsOption<'a> {
    Box::new(move |settings| {
        settings.set_random_source(random);
        Ok(())
    })
}

/// Rotate session ticket keys every `interval`, keeping the `n` most recent
/// keys valid for decryption.
///
/// One key is generated immediately. If that fails, session tickets are
/// disabled for the configuration and the option still succeeds. Otherwise
/// the rotator is added to `group`, which drives and stops it.
pub fn with_session_ticket_key_rotation<'a>(
    group: &'a mut TaskGroup,
    n: usize,
    interval: Duration,
) -> TlsOption<'a> {
    Box::new(move |settings| {
        if n == 0 {
            anyhow::bail!("session ticket key ring size must be at least 1");
        }
        if interval.is_zero() {
            anyhow::bail!("session ticket key rotation interval must be positive");
        }

        let lifetime = interval
            .as_secs()
            .saturating_mul(u64::try_from(n).unwrap_or(u64::MAX))
            .min(u64::from(MAX_TICKET_LIFETIME_SECS));
        let ticketer = settings.ticketer();
        ticketer.set_lifetime(u32::try_from(lifetime).unwrap_or(MAX_TICKET_LIFETIME_SECS));

        let mut rotator = KeyRotator::new(ticketer, settings.random_source(), n, interval);
        match rotator.rotate() {
            Ok(()) => {
                tracing::info!(
                    keys = n,
                    interval_secs = interval.as_secs(),
                    lifetime_secs = lifetime,
                    "Session ticket key rotation enabled"
                );
                group.add(rotator);
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    "Failed to generate initial session ticket key; session tickets disabled"
                );
                settings.disable_session_tickets();
            }
        }
        Ok(())
    })
}

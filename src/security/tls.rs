use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use rustls::crypto::CryptoProvider;
use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;
use rustls_pemfile::{read_all, Item};
use rustls_pki_types::{CertificateDer, PrivateKeyDer};

/// Load a PEM certificate chain and private key into a signing-ready
/// [`CertifiedKey`].
pub fn load_certified_key(
    provider: &CryptoProvider,
    cert_path: &Path,
    key_path: &Path,
) -> Result<CertifiedKey> {
    let cert_chain = load_cert_chain(cert_path)?;
    let private_key = load_private_key(key_path)?;
    let signing_key = provider
        .key_provider
        .load_private_key(private_key)
        .map_err(|err| anyhow!("unsupported private key in {}: {err}", key_path.display()))?;

    Ok(CertifiedKey::new(cert_chain, signing_key))
}

/// Build a [`CertifiedKey`] from a single PEM bundle holding a private key and
/// its certificate chain, in any order.
pub fn certified_key_from_pem(provider: &CryptoProvider, pem: &[u8]) -> Result<CertifiedKey> {
    let (cert_chain, private_key) = parse_pem(pem).context("failed to parse PEM bundle")?;
    if cert_chain.is_empty() {
        anyhow::bail!("no certificates were found in the PEM bundle");
    }
    let private_key = private_key
        .ok_or_else(|| anyhow!("no supported private key (pkcs8/pkcs1/sec1) in the PEM bundle"))?;
    let signing_key = provider
        .key_provider
        .load_private_key(private_key)
        .map_err(|err| anyhow!("unsupported private key in PEM bundle: {err}"))?;

    Ok(CertifiedKey::new(cert_chain, signing_key))
}

fn load_cert_chain(cert_path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let data = fs::read(cert_path).with_context(|| {
        format!(
            "failed to read TLS certificate chain at {}",
            cert_path.display()
        )
    })?;
    let (certs, _) = parse_pem(&data).with_context(|| {
        format!(
            "failed to parse TLS certificate chain at {}",
            cert_path.display()
        )
    })?;

    if certs.is_empty() {
        anyhow::bail!("no certificates were found in {}", cert_path.display());
    }

    Ok(certs)
}

fn load_private_key(key_path: &Path) -> Result<PrivateKeyDer<'static>> {
    let key_bytes = fs::read(key_path)
        .with_context(|| format!("failed to read TLS private key at {}", key_path.display()))?;
    let (_, key) = parse_pem(&key_bytes).with_context(|| {
        format!(
            "failed to parse PEM entry inside TLS private key ({})",
            key_path.display()
        )
    })?;

    key.ok_or_else(|| {
        anyhow!(
            "no supported private key (pkcs8/pkcs1/sec1) was found in {}",
            key_path.display()
        )
    })
}

type ParsedPem = (Vec<CertificateDer<'static>>, Option<PrivateKeyDer<'static>>);

fn parse_pem(mut reader: &[u8]) -> std::io::Result<ParsedPem> {
    let mut certs = Vec::new();
    let mut key = None;
    for item in read_all(&mut reader) {
        match item? {
            Item::X509Certificate(cert) => certs.push(cert),
            Item::Pkcs8Key(der) if key.is_none() => key = Some(der.into()),
            Item::Pkcs1Key(der) if key.is_none() => key = Some(der.into()),
            Item::Sec1Key(der) if key.is_none() => key = Some(der.into()),
            _ => continue,
        }
    }
    Ok((certs, key))
}

#[derive(Debug)]
struct NamedCertificate {
    names: Vec<String>,
    key: Arc<CertifiedKey>,
}

/// Certificates served by SNI, with the first entry as the fallback.
///
/// Names are matched case-insensitively; a `*.example.com` pattern matches
/// exactly one extra leading label.
#[derive(Debug, Default)]
pub struct CertificateStore {
    entries: Vec<NamedCertificate>,
}

impl CertificateStore {
    pub fn push(&mut self, names: Vec<String>, key: Arc<CertifiedKey>) {
        let names = names.iter().map(|name| normalize_host(name)).collect();
        self.entries.push(NamedCertificate { names, key });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn find(&self, server_name: Option<&str>) -> Option<Arc<CertifiedKey>> {
        if let Some(name) = server_name {
            let name = normalize_host(name);
            let named = self.entries.iter().find(|entry| {
                entry
                    .names
                    .iter()
                    .any(|pattern| host_matches(pattern, &name))
            });
            if let Some(entry) = named {
                return Some(entry.key.clone());
            }
        }

        self.entries.first().map(|entry| entry.key.clone())
    }
}

impl ResolvesServerCert for CertificateStore {
    fn resolve(&self, client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        self.find(client_hello.server_name())
    }
}

/// Lowercase and strip a trailing dot.
#[must_use]
pub fn normalize_host(host: &str) -> String {
    host.trim().trim_end_matches('.').to_ascii_lowercase()
}

fn host_matches(pattern: &str, host: &str) -> bool {
    if pattern == host {
        return true;
    }

    match pattern.strip_prefix("*.") {
        Some(suffix) => host
            .split_once('.')
            .is_some_and(|(label, rest)| !label.is_empty() && rest == suffix),
        None => false,
    }
}

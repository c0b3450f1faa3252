use arc_swap::ArcSwap;
use rustls::server::ProducesTickets;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use super::{TicketKey, TicketKeySink};
use crate::security::crypto::{TicketCipher, KEY_NAME_SIZE};
use crate::security::random::{OsRandom, RandomSource};

/// Upper bound on the advertised ticket lifetime (RFC 8446 section 4.6.1).
pub const MAX_TICKET_LIFETIME_SECS: u32 = 7 * 24 * 60 * 60;

/// Session ticket producer backed by an externally rotated key set.
///
/// The key set is replaced wholesale by [`TicketKeySink::set_session_ticket_keys`];
/// handshakes in flight keep using the snapshot they loaded. New tickets are
/// sealed under the first key, and a presented ticket is accepted under any
/// key of the current set. Ticket nonces come from the ticketer's random
/// source.
pub struct RotatingTicketer {
    ciphers: ArcSwap<Vec<TicketCipher>>,
    lifetime: AtomicU32,
    random: Arc<dyn RandomSource>,
}

impl RotatingTicketer {
    #[must_use]
    pub fn new(lifetime_secs: u32) -> Self {
        Self::with_random_source(lifetime_secs, Arc::new(OsRandom))
    }

    #[must_use]
    pub fn with_random_source(lifetime_secs: u32, random: Arc<dyn RandomSource>) -> Self {
        Self {
            ciphers: ArcSwap::from_pointee(Vec::new()),
            lifetime: AtomicU32::new(lifetime_secs.min(MAX_TICKET_LIFETIME_SECS)),
            random,
        }
    }

    pub fn set_lifetime(&self, lifetime_secs: u32) {
        self.lifetime
            .store(lifetime_secs.min(MAX_TICKET_LIFETIME_SECS), Ordering::Relaxed);
    }

    /// Number of keys currently accepted for decryption.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.ciphers.load().len()
    }
}

impl Default for RotatingTicketer {
    fn default() -> Self {
        Self::new(MAX_TICKET_LIFETIME_SECS)
    }
}

impl fmt::Debug for RotatingTicketer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotatingTicketer")
            .field("keys", &self.key_count())
            .field("lifetime", &self.lifetime.load(Ordering::Relaxed))
            .finish()
    }
}

impl TicketKeySink for RotatingTicketer {
    fn set_session_ticket_keys(&self, keys: &[TicketKey]) {
        let ciphers: Vec<TicketCipher> = keys.iter().map(TicketCipher::new).collect();
        self.ciphers.store(Arc::new(ciphers));
        tracing::debug!(keys = keys.len(), "Session ticket keys updated");
    }
}

impl ProducesTickets for RotatingTicketer {
    fn enabled(&self) -> bool {
        !self.ciphers.load().is_empty()
    }

    fn lifetime(&self) -> u32 {
        self.lifetime.load(Ordering::Relaxed)
    }

    fn encrypt(&self, plain: &[u8]) -> Option<Vec<u8>> {
        let ciphers = self.ciphers.load();
        let active = ciphers.first()?;
        match active.seal(plain, self.random.as_ref()) {
            Ok(ticket) => Some(ticket),
            Err(err) => {
                tracing::debug!(error = %err, "Failed to seal session ticket");
                None
            }
        }
    }

    fn decrypt(&self, cipher: &[u8]) -> Option<Vec<u8>> {
        let name = cipher.get(..KEY_NAME_SIZE)?;
        let ciphers = self.ciphers.load();
        let key = ciphers.iter().find(|candidate| candidate.matches_name(name))?;
        key.open(cipher).ok()
    }
}

/// Ticketer that never issues or accepts tickets.
#[derive(Debug, Default)]
pub struct NoSessionTicketer;

impl ProducesTickets for NoSessionTicketer {
    fn enabled(&self) -> bool {
        false
    }

    fn lifetime(&self) -> u32 {
        0
    }

    fn encrypt(&self, _plain: &[u8]) -> Option<Vec<u8>> {
        None
    }

    fn decrypt(&self, _cipher: &[u8]) -> Option<Vec<u8>> {
        None
    }
}

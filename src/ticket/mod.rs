//! Session ticket keys: the bounded key ring, the rustls ticketer that consumes
//! it, and the background rotator that keeps it fresh.

pub mod ring;
pub mod rotator;
pub mod ticketer;

pub use ring::KeyRing;
pub use rotator::{KeyRotator, RotationError};
pub use ticketer::{NoSessionTicketer, RotatingTicketer, MAX_TICKET_LIFETIME_SECS};

use std::fmt;
use subtle::ConstantTimeEq;

/// Size of a session ticket key in bytes.
pub const TICKET_KEY_SIZE: usize = 32;

/// Raw symmetric key material for session tickets.
///
/// `Debug` output is redacted and equality is constant-time.
#[derive(Clone, Copy)]
pub struct TicketKey([u8; TICKET_KEY_SIZE]);

impl TicketKey {
    #[must_use]
    pub const fn from_bytes(bytes: [u8; TICKET_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; TICKET_KEY_SIZE] {
        &self.0
    }
}

impl PartialEq for TicketKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for TicketKey {}

impl fmt::Debug for TicketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TicketKey(..)")
    }
}

/// Receiver of the active session ticket key set.
///
/// The first key encrypts new tickets; every key in the slice is acceptable
/// for decryption. Implementations must apply the whole slice atomically and
/// must be safe to call from a background task.
pub trait TicketKeySink: Send + Sync {
    fn set_session_ticket_keys(&self, keys: &[TicketKey]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_is_redacted() {
        let key = TicketKey::from_bytes([0xAB; TICKET_KEY_SIZE]);
        let rendered = format!("{key:?}");
        assert_eq!(rendered, "TicketKey(..)");
        assert!(!rendered.contains("171"));
    }

    #[test]
    fn equality_compares_every_byte() {
        let mut bytes = [7u8; TICKET_KEY_SIZE];
        let a = TicketKey::from_bytes(bytes);
        bytes[TICKET_KEY_SIZE - 1] = 8;
        let b = TicketKey::from_bytes(bytes);
        assert_ne!(a, b);
        assert_eq!(a, TicketKey::from_bytes([7u8; TICKET_KEY_SIZE]));
    }
}

/// Security and cryptography utilities
///
/// This module provides security-related functionality including:
/// - Certificate and key loading, SNI certificate selection
/// - Session ticket sealing (AES-256-GCM)
/// - Pluggable randomness for key generation
pub mod crypto;
pub mod random;
pub mod tls;

pub use crypto::{TicketCipher, TicketCryptoError};
pub use random::{ConfiguredRandom, OsRandom, RandomError, RandomSource, ReaderRandom};
pub use tls::{certified_key_from_pem, load_certified_key, CertificateStore};

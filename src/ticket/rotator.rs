use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{self, Instant, MissedTickBehavior};

use super::{KeyRing, TicketKey, TicketKeySink, TICKET_KEY_SIZE};
use crate::security::random::{RandomError, RandomSource};
use crate::supervisor::{stop_channel, Actor, StopHandle, StopSignal};

/// Failure of a single rotation attempt. The ring is left untouched.
#[derive(Debug, Error)]
pub enum RotationError {
    #[error("failed to generate session ticket key: {0}")]
    Random(#[from] RandomError),
}

/// Periodically replaces the session ticket encryption key while retaining a
/// bounded history of retired keys for decryption.
///
/// Every rotation (successful or not) republishes the full ring to the sink,
/// newest key first.
pub struct KeyRotator {
    sink: Arc<dyn TicketKeySink>,
    random: Arc<dyn RandomSource>,
    ring: KeyRing,
    interval: Duration,
    stop: StopSignal,
    stop_handle: StopHandle,
}

impl fmt::Debug for KeyRotator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRotator")
            .field("keys", &self.ring.len())
            .field("capacity", &self.ring.capacity())
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl KeyRotator {
    pub fn new(
        sink: Arc<dyn TicketKeySink>,
        random: Arc<dyn RandomSource>,
        capacity: usize,
        interval: Duration,
    ) -> Self {
        let (stop_handle, stop) = stop_channel();
        Self {
            sink,
            random,
            ring: KeyRing::with_capacity(capacity),
            interval,
            stop,
            stop_handle,
        }
    }

    /// Generate one fresh key and push it onto the ring.
    ///
    /// If the random source fails the ring is kept as it was. The ring is
    /// republished to the sink either way.
    pub fn rotate(&mut self) -> Result<(), RotationError> {
        let mut bytes = [0u8; TICKET_KEY_SIZE];
        let generated = self.random.fill(&mut bytes);
        if generated.is_ok() {
            self.ring.push(TicketKey::from_bytes(bytes));
        }

        self.sink.set_session_ticket_keys(self.ring.as_slice());
        generated.map_err(RotationError::from)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Handle for stopping [`KeyRotator::run`] from another task.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop_handle.clone()
    }

    /// Rotate once per interval until a stop request arrives.
    ///
    /// The first rotation happens one full interval after the call. A stop
    /// request that is ready together with a tick wins; no rotation happens
    /// after the acknowledgement.
    pub async fn run(&mut self) {
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            interval_secs = self.interval.as_secs(),
            capacity = self.ring.capacity(),
            "Session ticket key rotation started"
        );

        loop {
            tokio::select! {
                biased;

                Some(ack) = self.stop.requested() => {
                    drop(ticker);
                    ack.acknowledge();
                    tracing::info!("Session ticket key rotation stopped");
                    return;
                }
                _ = ticker.tick() => {
                    match self.rotate() {
                        Ok(()) => tracing::debug!(keys = self.ring.len(), "Rotated session ticket key"),
                        Err(err) => tracing::warn!(
                            error = %err,
                            keys = self.ring.len(),
                            "Session ticket key rotation failed; keeping current keys"
                        ),
                    }
                }
            }
        }
    }
}

#[async_trait]
impl Actor for KeyRotator {
    fn name(&self) -> &'static str {
        "session-ticket-key-rotator"
    }

    async fn run(&mut self) -> anyhow::Result<()> {
        KeyRotator::run(self).await;
        Ok(())
    }

    fn stop_handle(&self) -> StopHandle {
        self.stop_handle.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::random::ReaderRandom;
    use std::io::Cursor;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        writes: Mutex<Vec<Vec<TicketKey>>>,
    }

    impl TicketKeySink for RecordingSink {
        fn set_session_ticket_keys(&self, keys: &[TicketKey]) {
            self.writes.lock().expect("lock").push(keys.to_vec());
        }
    }

    impl RecordingSink {
        fn last(&self) -> Vec<TicketKey> {
            self.writes
                .lock()
                .expect("lock")
                .last()
                .cloned()
                .expect("at least one write")
        }
    }

    fn key(tag: u8) -> TicketKey {
        TicketKey::from_bytes([tag; TICKET_KEY_SIZE])
    }

    fn source(tags: &[u8]) -> Arc<ReaderRandom<Cursor<Vec<u8>>>> {
        let bytes: Vec<u8> = tags
            .iter()
            .flat_map(|tag| [*tag; TICKET_KEY_SIZE])
            .collect();
        Arc::new(ReaderRandom::new(Cursor::new(bytes)))
    }

    #[test]
    fn rotation_pushes_newest_first() {
        let sink = Arc::new(RecordingSink::default());
        let mut rotator = KeyRotator::new(sink.clone(), source(&[1, 2]), 3, Duration::from_secs(60));

        rotator.rotate().expect("first");
        assert_eq!(sink.last(), vec![key(1)]);
        rotator.rotate().expect("second");
        assert_eq!(sink.last(), vec![key(2), key(1)]);
        assert_eq!(rotator.len(), 2);
    }

    #[test]
    fn exhausted_source_republishes_unchanged_ring() {
        let sink = Arc::new(RecordingSink::default());
        let mut rotator = KeyRotator::new(sink.clone(), source(&[1]), 3, Duration::from_secs(60));

        rotator.rotate().expect("first");
        let err = rotator.rotate().expect_err("source exhausted");
        assert!(matches!(err, RotationError::Random(_)));

        let writes = sink.writes.lock().expect("lock");
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[1], vec![key(1)]);
    }

    #[test]
    fn failed_first_rotation_publishes_empty_ring() {
        let sink = Arc::new(RecordingSink::default());
        let mut rotator = KeyRotator::new(sink.clone(), source(&[]), 2, Duration::from_secs(60));

        assert!(rotator.rotate().is_err());
        assert!(rotator.is_empty());
        assert!(sink.last().is_empty());
    }
}

use super::TicketKey;

/// Bounded newest-first ring of ticket keys.
///
/// Pushing into a full ring evicts the oldest key.
#[derive(Debug, Clone)]
pub struct KeyRing {
    keys: Vec<TicketKey>,
    capacity: usize,
}

impl KeyRing {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            keys: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Install `key` at the front, shifting every other key one slot towards
    /// the tail.
    pub fn push(&mut self, key: TicketKey) {
        if self.capacity == 0 {
            return;
        }

        if self.keys.len() < self.capacity {
            self.keys.push(key);
        }

        let len = self.keys.len();
        self.keys.copy_within(..len - 1, 1);
        if let Some(front) = self.keys.first_mut() {
            *front = key;
        }
    }

    #[must_use]
    pub fn as_slice(&self) -> &[TicketKey] {
        &self.keys
    }

    #[must_use]
    pub fn newest(&self) -> Option<&TicketKey> {
        self.keys.first()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::TICKET_KEY_SIZE;
    use proptest::prelude::*;

    fn key(tag: u8) -> TicketKey {
        TicketKey::from_bytes([tag; TICKET_KEY_SIZE])
    }

    #[test]
    fn grows_until_capacity_then_evicts_oldest() {
        let mut ring = KeyRing::with_capacity(3);
        ring.push(key(1));
        ring.push(key(2));
        ring.push(key(3));
        assert_eq!(ring.as_slice(), &[key(3), key(2), key(1)]);

        ring.push(key(4));
        assert_eq!(ring.as_slice(), &[key(4), key(3), key(2)]);
        assert_eq!(ring.len(), 3);
    }

    #[test]
    fn capacity_one_keeps_only_newest() {
        let mut ring = KeyRing::with_capacity(1);
        ring.push(key(1));
        ring.push(key(2));
        assert_eq!(ring.as_slice(), &[key(2)]);
        assert_eq!(ring.newest(), Some(&key(2)));
    }

    #[test]
    fn zero_capacity_stays_empty() {
        let mut ring = KeyRing::with_capacity(0);
        ring.push(key(1));
        assert!(ring.is_empty());
    }

    proptest! {
        #[test]
        fn push_keeps_bound_and_shift_order(capacity in 1usize..8, tags in proptest::collection::vec(any::<u8>(), 0..32)) {
            let mut ring = KeyRing::with_capacity(capacity);
            for tag in tags {
                let before: Vec<TicketKey> = ring.as_slice().to_vec();
                let fresh = key(tag);
                ring.push(fresh);

                prop_assert!(ring.len() <= capacity);
                prop_assert_eq!(ring.newest(), Some(&fresh));

                let expected_tail: Vec<TicketKey> =
                    before.iter().take(capacity - 1).copied().collect();
                prop_assert_eq!(&ring.as_slice()[1..], expected_tail.as_slice());
            }
        }
    }
}

//! Key ratchet
//!
//! Keys are derived from a contact's pre-shared secret and a message counter
//! with HKDF-SHA256. Derivation is one-way: knowing the key for one counter
//! reveals nothing about the key for another, and nothing is cached.

use std::collections::BTreeSet;

use hkdf::Hkdf;
use noteline_storage_traits::Secret;
use sha2::Sha256;

use crate::constant::{RATCHET_INFO, RATCHET_SALT, REPLAY_WINDOW};
use crate::error::Error;

/// Derive the one-time key for `counter` from a pre-shared secret.
///
/// Pure and deterministic: both parties derive the same key from the same
/// `(secret, counter)` without further negotiation.
pub fn derive_key(secret: &[u8], counter: u64) -> Result<Secret<[u8; 32]>, Error> {
    let hk = Hkdf::<Sha256>::new(Some(RATCHET_SALT), secret);

    let mut info = Vec::with_capacity(RATCHET_INFO.len() + 8);
    info.extend_from_slice(RATCHET_INFO);
    info.extend_from_slice(&counter.to_be_bytes());

    let mut key = [0u8; 32];
    hk.expand(&info, &mut key)
        .map_err(|e| Error::KeyDerivation(e.to_string()))?;

    Ok(Secret::new(key))
}

/// Sliding window of accepted counters for one inbound direction.
///
/// A counter is accepted once. Counters more than [`REPLAY_WINDOW`] below the
/// highest accepted counter are rejected outright.
#[derive(Debug, Clone, Default)]
pub struct CounterWindow {
    highest: Option<u64>,
    /// Everything at or below this was accepted before the window was built
    floor: Option<u64>,
    seen: BTreeSet<u64>,
}

impl CounterWindow {
    /// Create an empty window
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a window from the highest counter persisted for a contact.
    ///
    /// Which counters below it were seen is not persisted, so all of them
    /// are rejected.
    pub fn resume(highest: u64) -> Self {
        Self {
            highest: Some(highest),
            floor: Some(highest),
            seen: BTreeSet::new(),
        }
    }

    /// Record `counter`, returning `false` if it was already seen or is too old
    pub fn accept(&mut self, counter: u64) -> bool {
        if let Some(highest) = self.highest
            && counter.saturating_add(REPLAY_WINDOW) <= highest
        {
            return false;
        }
        if self.floor.is_some_and(|floor| counter <= floor) {
            return false;
        }

        if !self.seen.insert(counter) {
            return false;
        }

        let highest = self.highest.map_or(counter, |h| h.max(counter));
        self.highest = Some(highest);

        let floor = highest.saturating_sub(REPLAY_WINDOW - 1);
        self.seen = self.seen.split_off(&floor);
        true
    }

    /// Highest counter accepted so far
    pub fn highest(&self) -> Option<u64> {
        self.highest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_key_is_deterministic() {
        let a = derive_key(b"shared secret", 7).unwrap();
        let b = derive_key(b"shared secret", 7).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_derive_key_differs_per_counter() {
        let keys: Vec<[u8; 32]> = (0..64)
            .map(|c| *derive_key(b"shared secret", c).unwrap())
            .collect();
        for (i, a) in keys.iter().enumerate() {
            for b in &keys[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_derive_key_differs_per_secret() {
        let a = derive_key(b"secret one", 0).unwrap();
        let b = derive_key(b"secret two", 0).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_derive_key_handles_extreme_counter() {
        let a = derive_key(b"s", u64::MAX).unwrap();
        let b = derive_key(b"s", u64::MAX - 1).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_counter_window_rejects_replay() {
        let mut window = CounterWindow::new();
        assert!(window.accept(0));
        assert!(window.accept(2));
        assert!(!window.accept(2));
        // Out of order but inside the window
        assert!(window.accept(1));
        assert!(!window.accept(1));
        assert_eq!(window.highest(), Some(2));
    }

    #[test]
    fn test_counter_window_rejects_stale() {
        let mut window = CounterWindow::new();
        assert!(window.accept(500));
        assert!(!window.accept(300));
        assert!(window.accept(301));
        assert!(window.accept(1_000));
        assert!(!window.accept(500));
    }

    #[test]
    fn test_resumed_window_rejects_everything_up_to_highest() {
        let mut window = CounterWindow::resume(7);
        assert_eq!(window.highest(), Some(7));
        assert!(!window.accept(7));
        assert!(!window.accept(3));
        assert!(window.accept(9));
        assert!(window.accept(8));
        assert!(!window.accept(8));
        assert_eq!(window.highest(), Some(9));
    }
}

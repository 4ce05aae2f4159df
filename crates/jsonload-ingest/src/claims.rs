//! In-flight claims for the current run
//!
//! A claim says "this worker is loading this file right now". Claims are
//! process-local and vanish with the process; durable progress lives in the
//! checkpoint store.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// Set of file identifiers currently being processed
#[derive(Debug, Default)]
pub struct ClaimRegistry {
    in_flight: Mutex<HashSet<String>>,
}

impl ClaimRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `identifier` unless someone already holds it
    pub fn try_claim(&self, identifier: &str) -> bool {
        let mut in_flight = self.in_flight.lock();
        if in_flight.contains(identifier) {
            return false;
        }
        in_flight.insert(identifier.to_string())
    }

    /// Returns false when `identifier` was not claimed
    pub fn release(&self, identifier: &str) -> bool {
        self.in_flight.lock().remove(identifier)
    }

    /// Claim that is released when the guard drops
    pub fn claim(self: &Arc<Self>, identifier: &str) -> Option<ClaimGuard> {
        self.try_claim(identifier).then(|| ClaimGuard {
            registry: Arc::clone(self),
            identifier: identifier.to_string(),
        })
    }

    pub fn is_claimed(&self, identifier: &str) -> bool {
        self.in_flight.lock().contains(identifier)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }
}

/// Held claim on one file
#[derive(Debug)]
pub struct ClaimGuard {
    registry: Arc<ClaimRegistry>,
    identifier: String,
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        self.registry.release(&self.identifier);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn test_claim_and_release() {
        let registry = ClaimRegistry::new();

        assert!(registry.try_claim("a.json"));
        assert!(!registry.try_claim("a.json"));
        assert!(registry.try_claim("b.json"));
        assert_eq!(registry.in_flight(), 2);

        assert!(registry.release("a.json"));
        assert!(!registry.release("a.json"));
        assert!(!registry.is_claimed("a.json"));
        assert!(registry.try_claim("a.json"));
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let registry = Arc::new(ClaimRegistry::new());

        let guard = registry.claim("a.json").unwrap();
        assert!(registry.is_claimed("a.json"));
        assert!(registry.claim("a.json").is_none());

        drop(guard);
        assert!(!registry.is_claimed("a.json"));
        assert!(registry.claim("a.json").is_some());
    }

    #[test]
    fn test_guard_releases_on_panic() {
        let registry = Arc::new(ClaimRegistry::new());

        let inner = Arc::clone(&registry);
        let result = thread::spawn(move || {
            let _guard = inner.claim("a.json").unwrap();
            panic!("worker failed");
        })
        .join();

        assert!(result.is_err());
        assert_eq!(registry.in_flight(), 0);
    }

    #[test]
    fn test_only_one_concurrent_claim_wins() {
        const CONTENDERS: usize = 16;

        let registry = Arc::new(ClaimRegistry::new());
        let barrier = Arc::new(Barrier::new(CONTENDERS));

        let handles: Vec<_> = (0..CONTENDERS)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    registry.try_claim("shared.json")
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(winners, 1);
        assert_eq!(registry.in_flight(), 1);
    }
}

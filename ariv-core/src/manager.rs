//! Bounded LRU bookkeeping for resident models (§4.D).
//!
//! The manager never loads or unloads an actual model; it is pure
//! bookkeeping that tells callers which names to evict elsewhere.

use std::collections::HashMap;

use tokio::sync::Mutex;

struct ResidentSet {
    loaded: HashMap<String, u64>,
    counter: u64,
    max_loaded: usize,
}

impl ResidentSet {
    fn touch(&mut self, name: &str) -> Vec<String> {
        self.counter += 1;
        self.loaded.insert(name.to_string(), self.counter);

        let mut evicted = Vec::new();
        while self.loaded.len() > self.max_loaded {
            let lru_name = self
                .loaded
                .iter()
                .min_by_key(|(_, &counter)| counter)
                .map(|(name, _)| name.clone())
                .expect("loaded is non-empty while over bound");
            self.loaded.remove(&lru_name);
            evicted.push(lru_name);
        }
        evicted
    }

    fn loaded_sorted(&self) -> Vec<String> {
        let mut names: Vec<String> = self.loaded.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Tracks the currently-resident model set under an LRU bound, behind a
/// mutex since it is shared across concurrent request handlers.
pub struct ResidentManager {
    set: Mutex<ResidentSet>,
}

impl ResidentManager {
    pub fn new(max_loaded: usize) -> Self {
        assert!(max_loaded >= 1, "max_loaded must be at least 1");
        Self {
            set: Mutex::new(ResidentSet {
                loaded: HashMap::new(),
                counter: 0,
                max_loaded,
            }),
        }
    }

    /// Record a use of `name`, returning the names evicted to keep the set
    /// within `max_loaded`. Refreshing an already-resident name never
    /// evicts it (its counter is bumped before the eviction loop runs).
    pub async fn touch(&self, name: &str) -> Vec<String> {
        self.set.lock().await.touch(name)
    }

    /// A defensive, sorted snapshot of the currently-resident names.
    pub async fn loaded(&self) -> Vec<String> {
        self.set.lock().await.loaded_sorted()
    }
}

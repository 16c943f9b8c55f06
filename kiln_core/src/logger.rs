//! "Log at most once per category" cache for messages the idle loop would otherwise repeat.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Default)]
pub struct LogOnce {
    seen: Mutex<HashSet<String>>,
}

impl LogOnce {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true the first time `category` is seen, false afterwards.
    pub fn first(&self, category: &str) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        if seen.contains(category) {
            false
        } else {
            seen.insert(category.to_string());
            true
        }
    }

    /// Forget `category` so the next occurrence is logged again.
    pub fn clear(&self, category: &str) {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(category);
    }
}

use std::collections::HashSet;
use std::sync::Mutex;

/// Concurrency-safe set of already-seen URLs. `try_insert` is the single
/// mutating operation and is atomic: exactly one caller observes `true` for
/// any given URL, no matter how many workers race on it.
#[derive(Debug, Default)]
pub struct DedupStore {
    seen: Mutex<HashSet<String>>,
}

impl DedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_insert(&self, url: &str) -> bool {
        self.lock().insert(url.to_string())
    }

    pub fn contains(&self, url: &str) -> bool {
        self.lock().contains(url)
    }

    /// Seeds the store, e.g. from a previous run's output file. Returns how
    /// many entries were new.
    pub fn preload<I>(&self, urls: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let mut guard = self.lock();
        let mut added = 0;
        for url in urls {
            if guard.insert(url) {
                added += 1;
            }
        }
        added
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        match self.seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

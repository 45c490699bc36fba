//! Bounded LRU cache of canonicalized sounds.
//!
//! Canonicalization (resampling plus 16-bit conversion) is the expensive
//! step between synthesis and playback; stimuli are typically replayed many
//! times per block, so the engine keeps the converted form keyed by the
//! caller's stable identity for the source.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::sound::CanonicalSound;

/// Stable identity of a cached source: a file path, or an id the caller
/// manages (for in-memory buffers).
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Path(PathBuf),
    Id(u64),
}

struct Entry {
    sound: CanonicalSound,
    last_access: u64,
}

pub struct SoundCache {
    entries: HashMap<CacheKey, Entry>,
    capacity: usize,
    access_counter: u64,
}

pub const DEFAULT_CACHE_CAPACITY: usize = 256;

impl SoundCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        SoundCache {
            entries: HashMap::with_capacity(capacity),
            capacity,
            access_counter: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached sound for `key`, computing and inserting on a miss. Eviction
    /// is strict LRU down to capacity.
    pub fn get_or_insert_with<E>(
        &mut self,
        key: CacheKey,
        compute: impl FnOnce() -> Result<CanonicalSound, E>,
    ) -> Result<CanonicalSound, E> {
        self.access_counter += 1;
        let access = self.access_counter;
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.last_access = access;
            return Ok(entry.sound.clone());
        }
        let sound = compute()?;
        while self.entries.len() >= self.capacity {
            self.evict_lru();
        }
        self.entries.insert(
            key,
            Entry {
                sound: sound.clone(),
                last_access: access,
            },
        );
        Ok(sound)
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Drop everything. Called whenever the engine is reconfigured, since a
    /// new output rate invalidates every canonicalization.
    pub fn flush(&mut self) {
        self.entries.clear();
    }

    fn evict_lru(&mut self) {
        if let Some(oldest) = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_access)
            .map(|(key, _)| key.clone())
        {
            self.entries.remove(&oldest);
        }
    }
}

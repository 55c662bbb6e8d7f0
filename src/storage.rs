//! Internal feature storage.
//!
//! A bounded table from feature identifier to feature. Storages can be
//! chained: a full store moves its victims into an overflow store and
//! promotes them back on a later `get`.

use crate::error::Result;
use crate::types::Feature;
use rand::seq::IteratorRandom;
use rustc_hash::FxHashMap;

/// Trait for bounded feature tables.
///
/// Implementations never hold more than `capacity()` features after a call
/// returns. `put` of an identifier that is already stored is a no-op; remove
/// it first to replace it.
pub trait FeatureStorage: Send {
    /// Insert a feature, making room first if the table is full.
    ///
    /// Returns the feature displaced to make room, if any.
    fn put(&mut self, feature: Feature) -> Result<Option<Feature>>;

    /// Look up a feature, consulting (and promoting from) the overflow
    /// store on a local miss.
    fn get(&mut self, id: &str) -> Result<Option<Feature>>;

    /// Look up a feature locally without touching the overflow store.
    fn peek(&self, id: &str) -> Option<&Feature>;

    /// Remove a feature locally. Does not cascade to the overflow store.
    fn remove(&mut self, id: &str) -> Result<Option<Feature>>;

    /// Remove a feature as an eviction victim, handing it to the overflow
    /// store when one is chained.
    fn evict(&mut self, id: &str) -> Result<Option<Feature>> {
        self.remove(id)
    }

    fn contains(&self, id: &str) -> bool;

    /// Remove `id` from the overflow chain and hand it back for promotion.
    /// Leaves the local table untouched.
    fn take_overflow(&mut self, _id: &str) -> Result<Option<Feature>> {
        Ok(None)
    }

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn capacity(&self) -> usize;

    /// Identifiers of every stored feature.
    fn ids(&self) -> Vec<String>;

    /// Iterator over all stored features.
    fn iter(&self) -> Box<dyn Iterator<Item = &Feature> + '_>;

    /// Snapshot of all stored features.
    fn all(&self) -> Vec<Feature> {
        self.iter().cloned().collect()
    }

    /// Empty the table and reset its accounting.
    fn clear(&mut self) -> Result<()>;

    /// A uniformly random stored identifier.
    fn random_id(&self) -> Option<String>;

    fn stats(&self) -> StorageStats;
}

/// Storage statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageStats {
    /// Features currently stored
    pub len: usize,
    pub capacity: usize,
    /// Features evicted, to make room or on request
    pub evictions: u64,
    /// Overflow hits moved back into the local table
    pub promotions: u64,
}

/// In-memory feature storage with random-victim replacement.
pub struct MemoryStorage {
    data: FxHashMap<String, Feature>,
    capacity: usize,
    overflow: Option<Box<dyn FeatureStorage>>,
    evictions: u64,
    promotions: u64,
}

impl MemoryStorage {
    /// Create a storage holding at most `capacity` features.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Storage capacity must be greater than zero");
        Self {
            data: FxHashMap::default(),
            capacity,
            overflow: None,
            evictions: 0,
            promotions: 0,
        }
    }

    /// Chain an overflow store that receives this store's victims.
    pub fn with_overflow(mut self, overflow: Box<dyn FeatureStorage>) -> Self {
        self.overflow = Some(overflow);
        self
    }

    pub fn overflow(&self) -> Option<&dyn FeatureStorage> {
        self.overflow.as_deref()
    }

    fn evict_random(&mut self) -> Result<Option<Feature>> {
        let Some(victim_id) = self.random_id() else {
            return Ok(None);
        };
        log::debug!("storage full, evicting '{}'", victim_id);
        self.evict(&victim_id)
    }
}

impl FeatureStorage for MemoryStorage {
    fn put(&mut self, feature: Feature) -> Result<Option<Feature>> {
        if self.data.contains_key(feature.id()) {
            return Ok(None);
        }

        let victim = if self.data.len() >= self.capacity {
            self.evict_random()?
        } else {
            None
        };

        self.data.insert(feature.id().to_string(), feature);
        Ok(victim)
    }

    fn get(&mut self, id: &str) -> Result<Option<Feature>> {
        if let Some(feature) = self.data.get(id) {
            return Ok(Some(feature.clone()));
        }

        let promoted = match self.overflow.as_mut() {
            Some(overflow) => overflow.get(id)?,
            None => None,
        };

        let Some(feature) = promoted else {
            return Ok(None);
        };

        if let Some(overflow) = self.overflow.as_mut() {
            overflow.remove(id)?;
        }
        self.promotions += 1;
        self.put(feature.clone())?;
        Ok(Some(feature))
    }

    fn peek(&self, id: &str) -> Option<&Feature> {
        self.data.get(id)
    }

    fn remove(&mut self, id: &str) -> Result<Option<Feature>> {
        Ok(self.data.remove(id))
    }

    fn evict(&mut self, id: &str) -> Result<Option<Feature>> {
        let Some(victim) = self.data.remove(id) else {
            return Ok(None);
        };
        self.evictions += 1;
        if let Some(overflow) = self.overflow.as_mut() {
            overflow.put(victim.clone())?;
        }
        Ok(Some(victim))
    }

    fn contains(&self, id: &str) -> bool {
        self.data.contains_key(id)
    }

    fn take_overflow(&mut self, id: &str) -> Result<Option<Feature>> {
        let Some(overflow) = self.overflow.as_mut() else {
            return Ok(None);
        };
        let taken = match overflow.remove(id)? {
            Some(feature) => Some(feature),
            None => overflow.take_overflow(id)?,
        };
        if taken.is_some() {
            self.promotions += 1;
        }
        Ok(taken)
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn ids(&self) -> Vec<String> {
        self.data.keys().cloned().collect()
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &Feature> + '_> {
        Box::new(self.data.values())
    }

    fn clear(&mut self) -> Result<()> {
        self.data.clear();
        self.evictions = 0;
        self.promotions = 0;
        Ok(())
    }

    fn random_id(&self) -> Option<String> {
        self.data.keys().choose(&mut rand::rng()).cloned()
    }

    fn stats(&self) -> StorageStats {
        StorageStats {
            len: self.data.len(),
            capacity: self.capacity,
            evictions: self.evictions,
            promotions: self.promotions,
        }
    }
}

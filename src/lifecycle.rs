use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use tracing::debug;

use crate::{
    cache::SampleCache,
    error::{IndexStatError, Result},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheType {
    // Built but not yet published
    Build,
    // Current, visible to queries
    Query,
    // Superseded, waiting for its last reader
    Clean,
}

// Summed over all caches of one type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheInfo {
    pub count: usize,
    pub valid: usize,
    pub sample_count: usize,
    pub total_bytes: usize,
    pub save_time: Duration,
    pub sort_time: Duration,
    // Readers holding one of the caches
    pub ref_count: usize,
}

impl CacheInfo {
    fn add(&mut self, cache: &Arc<SampleCache>) {
        self.count += 1;
        self.valid += cache.is_valid() as usize;
        self.sample_count += cache.sample_count();
        self.total_bytes += cache.total_bytes();
        self.save_time += cache.save_time;
        self.sort_time += cache.sort_time;
        // The slot itself holds one reference
        self.ref_count += Arc::strong_count(cache) - 1;
    }
}

#[derive(Default)]
struct Generations {
    building: Option<Arc<SampleCache>>,
    current: Option<Arc<SampleCache>>,
    retiring: Vec<Arc<SampleCache>>,
    next_generation: u64,
}

impl Generations {
    // Frees retiring caches nobody reads anymore
    fn sweep(&mut self) -> usize {
        let before = self.retiring.len();
        self.retiring.retain(|cache| Arc::strong_count(cache) > 1);
        before - self.retiring.len()
    }
}

/*
    Owns the generations of one index. Queries take a reference to the current cache
    under the mutex and run without it. Publishing swaps the built cache in and moves the
    old one to the retiring list, which is swept whenever the slots change.
    A reader's Arc keeps its generation alive, dropping it is the release.
 */
#[derive(Default)]
pub struct CacheManager {
    inner: Mutex<Generations>,
}

impl CacheManager {
    pub fn new() -> CacheManager {
        CacheManager::default()
    }

    pub fn next_generation(&self) -> u64 {
        let mut inner = self.inner.lock();
        inner.next_generation += 1;
        inner.next_generation
    }

    // Replaces any unpublished cache
    pub fn set_building(&self, cache: SampleCache) {
        self.inner.lock().building = Some(Arc::new(cache));
    }

    pub fn publish(&self) -> Result<u64> {
        let mut inner = self.inner.lock();
        let building = inner.building.take().ok_or_else(|| IndexStatError::usage("no built cache to publish"))?;
        if !building.is_valid() {
            return Err(IndexStatError::invalid_cache(format!("generation {} is not valid", building.generation())));
        }
        let generation = building.generation();
        if let Some(old) = inner.current.replace(building) {
            inner.retiring.push(old);
        }
        let freed = inner.sweep();
        debug!(generation, freed, retiring = inner.retiring.len(), "cache published");
        Ok(generation)
    }

    pub fn acquire(&self) -> Option<Arc<SampleCache>> {
        self.inner.lock().current.clone()
    }

    pub fn clean(&self) -> usize {
        self.inner.lock().sweep()
    }

    // Drops building and current, readers keep theirs until done
    pub fn drop_all(&self) {
        let mut inner = self.inner.lock();
        inner.building = None;
        if let Some(old) = inner.current.take() {
            inner.retiring.push(old);
        }
        inner.sweep();
    }

    pub fn has_current(&self) -> bool {
        self.inner.lock().current.is_some()
    }

    pub fn info(&self, cache_type: CacheType) -> CacheInfo {
        let inner = self.inner.lock();
        let mut info = CacheInfo::default();
        match cache_type {
            CacheType::Build => inner.building.iter().for_each(|c| info.add(c)),
            CacheType::Query => inner.current.iter().for_each(|c| info.add(c)),
            CacheType::Clean => inner.retiring.iter().for_each(|c| info.add(c)),
        }
        info
    }
}

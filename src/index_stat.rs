use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::{
    bound::{Bound, Range},
    cache::{builder::CacheBuilder, SampleCache},
    config::IndexStatConfig,
    dump::CacheDump,
    error::{IndexStatError, Result},
    estimate::{self, StatValue},
    lifecycle::{CacheInfo, CacheManager, CacheType},
    pack::{ColumnSpec, Spec},
    source::SampleSource,
};

/*
    Statistics of one index. Bind the key columns once with set_index, then build
    generations with read_stat and ask for estimates with query_stat from any thread.
    Only one build runs at a time, queries never wait for it.
 */
pub struct IndexStatistics {
    config: IndexStatConfig,
    key_spec: Option<Arc<Spec>>,
    caches: CacheManager,
    build_lock: Mutex<()>,
}

impl IndexStatistics {
    pub fn new(config: IndexStatConfig) -> IndexStatistics {
        IndexStatistics { config, key_spec: None, caches: CacheManager::new(), build_lock: Mutex::new(()) }
    }

    pub fn set_index(&mut self, columns: Vec<ColumnSpec>) -> Result<()> {
        if self.key_spec.is_some() {
            return Err(IndexStatError::usage("index already set"));
        }
        if columns.is_empty() {
            return Err(IndexStatError::usage("index has no key columns"));
        }
        self.key_spec = Some(Arc::new(Spec::new(columns)?));
        Ok(())
    }

    // Unbinds the index and drops every cache not held by a reader
    pub fn reset_index(&mut self) {
        self.caches.drop_all();
        self.key_spec = None;
    }

    pub fn key_spec(&self) -> Result<&Arc<Spec>> {
        self.key_spec.as_ref().ok_or_else(|| IndexStatError::usage("index not set"))
    }

    pub fn config(&self) -> &IndexStatConfig {
        &self.config
    }

    pub fn new_bound(&self) -> Result<Bound> {
        Ok(Bound::new(self.key_spec()?.clone()))
    }

    pub fn new_range(&self, low: Bound, high: Bound) -> Result<Range> {
        Range::new(low, high)
    }

    // Builds a generation and leaves it unpublished
    pub fn build_cache(&self, source: &mut dyn SampleSource) -> Result<u64> {
        let _guard = self.build_lock.try_lock().ok_or_else(|| IndexStatError::usage("cache build already running"))?;
        self.build_locked(source)
    }

    fn build_locked(&self, source: &mut dyn SampleSource) -> Result<u64> {
        let key_spec = self.key_spec()?.clone();
        let generation = self.caches.next_generation();
        let cache = CacheBuilder::build(key_spec, source, generation, &self.config)?;
        self.caches.set_building(cache);
        Ok(generation)
    }

    pub fn move_cache(&self) -> Result<u64> {
        self.caches.publish()
    }

    // Builds and publishes. On failure the published generation stays in place
    pub fn read_stat(&self, source: &mut dyn SampleSource) -> Result<u64> {
        let _guard = self.build_lock.try_lock().ok_or_else(|| IndexStatError::usage("cache build already running"))?;
        self.build_locked(source)?;
        let generation = self.caches.publish()?;
        debug!(generation, "statistics read");
        Ok(generation)
    }

    pub fn query_stat(&self, range: &Range) -> Result<StatValue> {
        for bound in [range.low(), range.high()] {
            if bound.get_data().len() > self.config.max_key_bytes {
                return Err(IndexStatError::usage(format!("bound of {} bytes exceeds {}", bound.get_data().len(), self.config.max_key_bytes)));
            }
        }
        let cache = self.current()?;
        estimate::query_stat(&cache, range)
    }

    pub fn dump_cache(&self) -> Result<CacheDump> {
        Ok(CacheDump::new(self.current()?))
    }

    fn current(&self) -> Result<Arc<SampleCache>> {
        self.caches.acquire().ok_or_else(|| IndexStatError::usage("no statistics published"))
    }

    pub fn cache_info(&self, cache_type: CacheType) -> CacheInfo {
        self.caches.info(cache_type)
    }

    pub fn clean_cache(&self) -> usize {
        self.caches.clean()
    }

    pub fn drop_cache(&self) {
        self.caches.drop_all();
    }
}

impl Default for IndexStatistics {
    fn default() -> Self {
        IndexStatistics::new(IndexStatConfig::new())
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use itertools::Itertools;

    use super::*;
    use crate::{
        cache::tests::{int_key, scenario_samples},
        dump::ResettableIterator,
        source::VecSampleSource,
        types::{ColumnType, Value},
    };

    fn stats() -> IndexStatistics {
        let mut stats = IndexStatistics::new(IndexStatConfig::default());
        stats.set_index(vec![ColumnSpec::new(ColumnType::Int, false)]).unwrap();
        stats
    }

    fn source(stats: &IndexStatistics, sample_version: u32, samples: &[(Vec<Option<Value>>, Vec<u32>)]) -> VecSampleSource {
        VecSampleSource::from_values(stats.key_spec().unwrap(), 4, sample_version, samples).unwrap()
    }

    fn inclusive(stats: &IndexStatistics, low: i64, high: i64) -> Range {
        let mut lo = stats.new_bound().unwrap();
        lo.add_value(&Value::Int(low)).unwrap();
        lo.set_strict(false).unwrap();
        let mut hi = stats.new_bound().unwrap();
        hi.add_value(&Value::Int(high)).unwrap();
        hi.set_strict(false).unwrap();
        stats.new_range(lo, hi).unwrap()
    }

    #[test]
    fn test_usage_errors() {
        let mut stats = IndexStatistics::new(IndexStatConfig::default());
        assert!(matches!(stats.new_bound(), Err(IndexStatError::Usage(_))));
        assert!(matches!(stats.set_index(vec![]), Err(IndexStatError::Usage(_))));
        stats.set_index(vec![ColumnSpec::new(ColumnType::Int, false)]).unwrap();
        assert!(matches!(stats.set_index(vec![ColumnSpec::new(ColumnType::Int, false)]), Err(IndexStatError::Usage(_))));
        let range = Range::unbounded(stats.key_spec().unwrap().clone());
        assert!(matches!(stats.query_stat(&range), Err(IndexStatError::Usage(_))));
        assert!(matches!(stats.dump_cache(), Err(IndexStatError::Usage(_))));
        assert!(matches!(stats.move_cache(), Err(IndexStatError::Usage(_))));

        stats.reset_index();
        assert!(stats.key_spec().is_err());
        stats.set_index(vec![ColumnSpec::new(ColumnType::BigInt, true)]).unwrap();
    }

    #[test]
    fn test_read_and_query() {
        let stats = stats();
        let generation = stats.read_stat(&mut source(&stats, 1, &scenario_samples())).unwrap();
        let value = stats.query_stat(&inclusive(&stats, 2, 4)).unwrap();
        assert_eq!(value.rir, 360.0);
        assert_eq!(value.generation, generation);

        let info = stats.cache_info(CacheType::Query);
        assert_eq!((info.count, info.valid, info.sample_count), (1, 1, 5));
        assert_eq!(info.total_bytes, 5 + 20 + 40);
    }

    #[test]
    fn test_failed_build_keeps_current() {
        let stats = stats();
        stats.read_stat(&mut source(&stats, 1, &scenario_samples())).unwrap();
        let broken = vec![(int_key(&[1]), vec![10, 5]), (int_key(&[2]), vec![8, 6])];
        let err = stats.read_stat(&mut source(&stats, 2, &broken)).unwrap_err();
        assert!(matches!(err, IndexStatError::InvalidCache(_)));
        let value = stats.query_stat(&Range::unbounded(stats.key_spec().unwrap().clone())).unwrap();
        assert_eq!(value.sample_version, 1);
        assert_eq!(value.rir, 600.0);
    }

    #[test]
    fn test_build_then_move() {
        let stats = stats();
        let generation = stats.build_cache(&mut source(&stats, 1, &scenario_samples())).unwrap();
        assert_eq!(stats.cache_info(CacheType::Build).count, 1);
        assert!(stats.dump_cache().is_err());
        assert_eq!(stats.move_cache().unwrap(), generation);
        assert_eq!(stats.cache_info(CacheType::Build).count, 0);
        assert_eq!(stats.cache_info(CacheType::Query).count, 1);
    }

    #[test]
    fn test_dump_survives_rebuild() {
        let stats = stats();
        stats.read_stat(&mut source(&stats, 1, &scenario_samples())).unwrap();
        let mut dump = stats.dump_cache().unwrap();
        stats.read_stat(&mut source(&stats, 2, &scenario_samples())).unwrap();
        assert_eq!(stats.cache_info(CacheType::Clean).count, 1);

        let keys = dump.by_ref().map(|e| e.unwrap().key).collect_vec();
        assert_eq!(keys, (1..=5).map(|k| int_key(&[k])).collect_vec());
        dump.reset();
        assert_eq!(dump.count(), 5);
        assert_eq!(stats.clean_cache(), 1);

        stats.drop_cache();
        assert!(matches!(stats.dump_cache(), Err(IndexStatError::Usage(_))));
    }

    #[test]
    fn test_bound_too_long() {
        let mut stats = IndexStatistics::new(IndexStatConfig { max_key_bytes: 8, ..IndexStatConfig::default() });
        stats.set_index(vec![ColumnSpec::new(ColumnType::VarChar(100), false)]).unwrap();
        let mut low = stats.new_bound().unwrap();
        low.add_value(&Value::String("x".repeat(20))).unwrap();
        low.set_strict(false).unwrap();
        let high = stats.new_bound().unwrap();
        let range = stats.new_range(low, high).unwrap();
        assert!(matches!(stats.query_stat(&range), Err(IndexStatError::Usage(_))));
    }

    // Generation g has rir = g * 1000 at the last sample, every estimate must come from one of them
    fn tagged_samples(g: u32) -> Vec<(Vec<Option<Value>>, Vec<u32>)> {
        (1..=20u32).map(|i| (int_key(&[i as i64]), vec![i * g * 50, i])).collect()
    }

    #[test]
    fn test_queries_during_rebuilds() {
        let stats = Arc::new(stats());
        stats.read_stat(&mut source(&stats, 1, &tagged_samples(1))).unwrap();
        let rebuilds = 20u32;
        let readers = (0..4)
            .map(|_| {
                let stats = stats.clone();
                thread::spawn(move || {
                    let range = Range::unbounded(stats.key_spec().unwrap().clone());
                    let mut seen = Vec::new();
                    for _ in 0..200 {
                        let value = stats.query_stat(&range).unwrap();
                        let tag = value.sample_version as f64;
                        assert_eq!(value.num_rows, tag * 1000.0);
                        assert_eq!(value.rir, tag * 1000.0 * 4.0);
                        seen.push(value.generation);
                    }
                    seen
                })
            })
            .collect_vec();
        for g in 2..=rebuilds {
            stats.read_stat(&mut source(&stats, g, &tagged_samples(g))).unwrap();
        }
        for reader in readers {
            let seen = reader.join().unwrap();
            assert!(seen.iter().tuple_windows().all(|(a, b)| a <= b));
        }
        assert_eq!(stats.query_stat(&Range::unbounded(stats.key_spec().unwrap().clone())).unwrap().sample_version, rebuilds);
        stats.clean_cache();
        assert_eq!(stats.cache_info(CacheType::Clean).count, 0);
    }
}

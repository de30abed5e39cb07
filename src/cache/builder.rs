use std::{sync::Arc, time::Instant};

use tracing::{debug, warn};

use crate::{
    config::IndexStatConfig,
    error::{IndexStatError, Result},
    pack::Spec,
    source::{RawSample, SampleSource},
};

use super::SampleCache;

/*
    Builds one cache generation from a sample source:

        start   read the head and size the cache from its totals
        insert  append samples one by one as the source yields them
        commit  sort, verify, mark valid

    A failure anywhere drops the half built cache. Nothing published is touched.
 */
pub struct CacheBuilder {
    cache: SampleCache,
    max_key_bytes: usize,
    started: Instant,
}

impl CacheBuilder {
    pub fn start(key_spec: Arc<Spec>, source: &mut dyn SampleSource, generation: u64, config: &IndexStatConfig) -> Result<CacheBuilder> {
        let head = source.read_head()?;
        debug!(
            index_id = head.index_id,
            sample_version = head.sample_version,
            sample_count = head.sample_count,
            key_bytes = head.key_bytes,
            frag_count = head.frag_count,
            generation,
            "start cache build"
        );
        let cache = SampleCache::init(key_spec, &head, generation, config.max_cache_bytes)?;
        Ok(CacheBuilder { cache, max_key_bytes: config.max_key_bytes, started: Instant::now() })
    }

    pub fn insert(&mut self, sample: &RawSample) -> Result<()> {
        if sample.key.len() > self.max_key_bytes {
            return Err(IndexStatError::internal(format!("sample key of {} bytes exceeds {}", sample.key.len(), self.max_key_bytes)));
        }
        self.cache.insert(&sample.key, &sample.value)
    }

    // Pulls the next sample from the source and inserts it. False once the source is drained
    pub fn next(&mut self, source: &mut dyn SampleSource) -> Result<bool> {
        match source.next_sample()? {
            Some(sample) => {
                self.insert(&sample)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn commit(mut self) -> Result<SampleCache> {
        let cache = &mut self.cache;
        cache.check_complete()?;
        cache.save_time = self.started.elapsed();
        let sort_start = Instant::now();
        cache.sort()?;
        cache.sort_time = sort_start.elapsed();
        if let Err(e) = cache.verify() {
            warn!(generation = cache.generation(), error = %e, "cache rejected");
            return Err(e);
        }
        debug!(
            generation = cache.generation(),
            sample_count = cache.sample_count(),
            total_bytes = cache.total_bytes(),
            sort_steps = cache.sort_steps(),
            save_us = cache.save_time.as_micros() as u64,
            sort_us = cache.sort_time.as_micros() as u64,
            "cache committed"
        );
        Ok(self.cache)
    }

    // The whole protocol over a source
    pub fn build(key_spec: Arc<Spec>, source: &mut dyn SampleSource, generation: u64, config: &IndexStatConfig) -> Result<SampleCache> {
        let mut builder = CacheBuilder::start(key_spec, source, generation, config)?;
        while builder.next(source)? {}
        builder.commit()
    }
}

#[cfg(test)]
mod tests {
    use mockall::Sequence;

    use super::*;
    use crate::{
        cache::tests::{int_key, int_spec, scenario_samples},
        source::{MockSampleSource, SampleHead, VecSampleSource},
    };

    fn config() -> IndexStatConfig {
        IndexStatConfig::default()
    }

    #[test]
    fn test_build_scenario() {
        let spec = int_spec(1);
        let mut source = VecSampleSource::from_values(&spec, 4, 3, &scenario_samples()).unwrap();
        let cache = CacheBuilder::build(spec, &mut source, 9, &config()).unwrap();
        assert!(cache.is_valid());
        assert_eq!(cache.generation(), 9);
        assert_eq!(cache.sample_version(), 3);
        assert_eq!(cache.sample_count(), 5);
        assert_eq!(cache.frag_count(), 4);
    }

    #[test]
    fn test_build_sorts_unordered_source() {
        let spec = int_spec(1);
        let mut source = VecSampleSource::from_values(&spec, 4, 1, &scenario_samples()).unwrap();
        source.samples_mut().reverse();
        let cache = CacheBuilder::build(spec, &mut source, 1, &config()).unwrap();
        assert_eq!(cache.get_key(0).unwrap().values().unwrap(), int_key(&[1]));
        assert_eq!(cache.get_rir1(4), 150.0);
    }

    #[test]
    fn test_build_with_mock_source() {
        let spec = int_spec(1);
        let mut reference = VecSampleSource::from_values(&spec, 2, 1, &scenario_samples()[..2]).unwrap();
        let head = reference.read_head().unwrap();
        let first = reference.next_sample().unwrap();
        let second = reference.next_sample().unwrap();

        let mut seq = Sequence::new();
        let mut source = MockSampleSource::new();
        source.expect_read_head().times(1).in_sequence(&mut seq).return_once(move || Ok(head));
        source.expect_next_sample().times(1).in_sequence(&mut seq).return_once(move || Ok(first));
        source.expect_next_sample().times(1).in_sequence(&mut seq).return_once(move || Ok(second));
        source.expect_next_sample().times(1).in_sequence(&mut seq).return_once(|| Ok(None));

        let cache = CacheBuilder::build(spec, &mut source, 1, &config()).unwrap();
        assert_eq!(cache.sample_count(), 2);
        assert_eq!(cache.get_rir(1), 60.0);
    }

    #[test]
    fn test_source_error_aborts() {
        let spec = int_spec(1);
        let head = SampleHead { frag_count: 1, value_format: 1, sample_count: 3, key_bytes: 12, ..Default::default() };
        let mut source = MockSampleSource::new();
        source.expect_read_head().return_once(move || Ok(head));
        source.expect_next_sample().return_once(|| Err(IndexStatError::internal("scan failed")));
        let err = CacheBuilder::build(spec, &mut source, 1, &config()).unwrap_err();
        assert_eq!(err, IndexStatError::internal("scan failed"));
    }

    #[test]
    fn test_short_source_is_invalid() {
        let spec = int_spec(1);
        let mut source = VecSampleSource::from_values(&spec, 4, 1, &scenario_samples()).unwrap();
        source.samples_mut().pop();
        let err = CacheBuilder::build(spec, &mut source, 1, &config()).unwrap_err();
        assert!(matches!(err, IndexStatError::InvalidCache(_)));
    }

    #[test]
    fn test_rejected_by_verify() {
        let spec = int_spec(1);
        let samples = vec![(int_key(&[1]), vec![10, 5]), (int_key(&[2]), vec![8, 6])];
        let mut source = VecSampleSource::from_values(&spec, 4, 1, &samples).unwrap();
        let err = CacheBuilder::build(spec, &mut source, 1, &config()).unwrap_err();
        assert!(matches!(err, IndexStatError::InvalidCache(_)));
    }

    #[test]
    fn test_key_too_long() {
        let spec = int_spec(1);
        let mut source = VecSampleSource::from_values(&spec, 4, 1, &scenario_samples()).unwrap();
        let config = IndexStatConfig { max_key_bytes: 3, ..IndexStatConfig::default() };
        let err = CacheBuilder::build(spec, &mut source, 1, &config).unwrap_err();
        assert!(matches!(err, IndexStatError::Internal(_)));
    }

    #[test]
    fn test_cache_limit() {
        let spec = int_spec(1);
        let mut source = VecSampleSource::from_values(&spec, 4, 1, &scenario_samples()).unwrap();
        let config = IndexStatConfig { max_cache_bytes: 16, ..IndexStatConfig::default() };
        let err = CacheBuilder::build(spec, &mut source, 1, &config).unwrap_err();
        assert!(matches!(err, IndexStatError::NoMem(_)));
    }
}

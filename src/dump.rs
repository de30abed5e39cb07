use std::{fmt::Display, sync::Arc};

use crate::{cache::SampleCache, error::Result, types::Value};

pub trait ResettableIterator: Iterator {
    fn reset(&mut self);
}

// One sample of a cache in sorted order
#[derive(Debug, Clone, PartialEq)]
pub struct DumpEntry {
    pub pos: usize,
    pub key: Vec<Option<Value>>,
    // rir followed by unq per key column, single fragment
    pub value: Vec<u32>,
}

impl Display for DumpEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: (", self.pos)?;
        for (i, value) in self.key.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match value {
                Some(value) => write!(f, "{}", value)?,
                None => write!(f, "NULL")?,
            }
        }
        write!(f, ") rir={} unq=", self.value[0])?;
        write!(f, "{:?}", &self.value[1..])
    }
}

// Walks one generation. The cache stays alive as long as the dump does
pub struct CacheDump {
    cache: Arc<SampleCache>,
    pos: usize,
}

impl CacheDump {
    pub fn new(cache: Arc<SampleCache>) -> CacheDump {
        CacheDump { cache, pos: 0 }
    }

    pub fn generation(&self) -> u64 {
        self.cache.generation()
    }
}

impl Iterator for CacheDump {
    type Item = Result<DumpEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.cache.sample_count() {
            return None;
        }
        let pos = self.pos;
        self.pos += 1;
        let key = match self.cache.get_key(pos).and_then(|key| key.values()) {
            Ok(key) => key,
            Err(e) => return Some(Err(e)),
        };
        Some(Ok(DumpEntry { pos, key, value: self.cache.get_values(pos).to_vec() }))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.cache.sample_count() - self.pos;
        (left, Some(left))
    }
}

impl ResettableIterator for CacheDump {
    fn reset(&mut self) {
        self.pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::{builder::CacheBuilder, tests::{int_key, int_spec, scenario_samples}},
        config::IndexStatConfig,
        source::VecSampleSource,
    };

    #[test]
    fn test_dump_and_reset() {
        let spec = int_spec(1);
        let mut source = VecSampleSource::from_values(&spec, 4, 1, &scenario_samples()).unwrap();
        let cache = CacheBuilder::build(spec, &mut source, 1, &IndexStatConfig::default()).unwrap();
        let mut dump = CacheDump::new(Arc::new(cache));
        assert_eq!(dump.size_hint(), (5, Some(5)));
        let entries: Vec<DumpEntry> = dump.by_ref().collect::<Result<_>>().unwrap();
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[2], DumpEntry { pos: 2, key: int_key(&[3]), value: vec![60, 40] });
        assert_eq!(entries[2].to_string(), "2: (3) rir=60 unq=[40]");
        assert!(dump.next().is_none());

        dump.reset();
        assert_eq!(dump.next().unwrap().unwrap().pos, 0);
    }
}

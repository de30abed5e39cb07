use std::sync::Arc;

use crate::{
    error::{IndexStatError, Result},
    pack::{Data, Endian, Spec},
    types::Value,
};

// The only value tuple layout: rir followed by one unique count per key column
pub const VALUE_FORMAT: u32 = 1;

// Summary record written next to the samples of one sample version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SampleHead {
    pub index_id: u32,
    pub index_version: u32,
    pub table_id: u32,
    pub frag_count: u32,
    pub value_format: u32,
    pub sample_version: u32,
    pub load_time: u32,
    pub sample_count: u32,
    pub key_bytes: u32,
}

// Packed key and value as stored, both little-endian
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSample {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/*
    Where samples come from. Implementations typically scan the sample table of an index
    ordered by (sample_version, key). The head is read first, then samples until None.
 */
#[cfg_attr(test, mockall::automock)]
pub trait SampleSource {
    fn read_head(&mut self) -> Result<SampleHead>;
    fn next_sample(&mut self) -> Result<Option<RawSample>>;
}

#[derive(Debug, Clone)]
pub struct VecSampleSource {
    head: SampleHead,
    samples: Vec<RawSample>,
    pos: usize,
}

impl VecSampleSource {
    pub fn new(head: SampleHead, samples: Vec<RawSample>) -> Self {
        Self { head, samples, pos: 0 }
    }

    // Encode typed keys and counters the way they are stored and derive the head totals
    pub fn from_values(key_spec: &Arc<Spec>, frag_count: u32, sample_version: u32, samples: &[(Vec<Option<Value>>, Vec<u32>)]) -> Result<Self> {
        let value_spec = Arc::new(Spec::value_spec(key_spec.get_count()));
        let mut raw = Vec::with_capacity(samples.len());
        let mut key_bytes = 0usize;
        for (key_values, counters) in samples {
            raw.push(RawSample {
                key: encode_key(key_spec, key_values)?,
                value: encode_value(&value_spec, counters)?,
            });
            key_bytes += raw.last().map(|s| s.key.len()).unwrap_or(0);
        }
        let head = SampleHead {
            frag_count,
            value_format: VALUE_FORMAT,
            sample_version,
            sample_count: raw.len() as u32,
            key_bytes: key_bytes as u32,
            ..SampleHead::default()
        };
        Ok(Self::new(head, raw))
    }

    pub fn samples_mut(&mut self) -> &mut Vec<RawSample> {
        &mut self.samples
    }

    pub fn rewind(&mut self) {
        self.pos = 0;
    }
}

impl SampleSource for VecSampleSource {
    fn read_head(&mut self) -> Result<SampleHead> {
        self.pos = 0;
        Ok(self.head)
    }

    fn next_sample(&mut self) -> Result<Option<RawSample>> {
        let sample = self.samples.get(self.pos).cloned();
        if sample.is_some() {
            self.pos += 1;
        }
        Ok(sample)
    }
}

pub fn encode_key(key_spec: &Arc<Spec>, values: &[Option<Value>]) -> Result<Vec<u8>> {
    if values.len() != key_spec.get_count() {
        return Err(IndexStatError::usage(format!("sample key has {} of {} components", values.len(), key_spec.get_count())));
    }
    let mut data = Data::new(key_spec.clone(), Endian::Little);
    for value in values {
        match value {
            Some(value) => data.add(value)?,
            None => data.add_null()?,
        }
    }
    Ok(data.as_bytes().to_vec())
}

pub fn encode_value(value_spec: &Arc<Spec>, counters: &[u32]) -> Result<Vec<u8>> {
    let mut data = Data::new(value_spec.clone(), Endian::Little);
    for counter in counters {
        data.add(&Value::Unsigned(*counter as u64))?;
    }
    if !data.is_full() {
        return Err(IndexStatError::usage(format!("sample value has {} of {} counters", counters.len(), value_spec.get_count())));
    }
    Ok(data.as_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{pack::ColumnSpec, types::ColumnType};

    #[test]
    fn test_from_values_totals() {
        let spec = Arc::new(Spec::new(vec![ColumnSpec::new(ColumnType::VarChar(10), false)]).unwrap());
        let samples = vec![
            (vec![Some(Value::String("a".to_string()))], vec![1, 1]),
            (vec![Some(Value::String("bcd".to_string()))], vec![4, 2]),
        ];
        let mut source = VecSampleSource::from_values(&spec, 2, 7, &samples).unwrap();
        let head = source.read_head().unwrap();
        assert_eq!(head.sample_count, 2);
        assert_eq!(head.key_bytes, 2 + 4);
        assert_eq!(head.sample_version, 7);
        let first = source.next_sample().unwrap().unwrap();
        assert_eq!(first.key, vec![1, b'a']);
        assert_eq!(first.value, vec![1, 0, 0, 0, 1, 0, 0, 0]);
        assert!(source.next_sample().unwrap().is_some());
        assert!(source.next_sample().unwrap().is_none());
        source.rewind();
        assert!(source.next_sample().unwrap().is_some());
    }

    #[test]
    fn test_encode_value_count_mismatch() {
        let value_spec = Arc::new(Spec::value_spec(2));
        assert!(matches!(encode_value(&value_spec, &[1, 1]), Err(IndexStatError::Usage(_))));
        assert!(matches!(encode_value(&value_spec, &[1, 1, 1, 1]), Err(IndexStatError::Internal(_))));
    }
}

pub mod builder;
mod heap_sort;

use std::{cmp::Ordering, sync::Arc, time::Duration};

use byteorder::{ByteOrder, NativeEndian};

use crate::{
    error::{IndexStatError, Result},
    estimate::solver::unq_factor,
    pack::{convert, DataRef, Endian, Spec},
    source::{SampleHead, VALUE_FORMAT},
    types::Value,
};

/*
    One generation of index statistics samples.

    Keys have variable length, so they are appended to a single key blob and located
    through an address array holding the start offset of each key. The address width
    (1 to 4 bytes) is the smallest that can address the whole blob. Value tuples have a
    fixed length and live in a value array aligned with the address array: entry i of
    both belongs to the same sample. Sorting permutes address and value entries together
    and never moves key bytes.

    Keys and values arrive little-endian and are converted to native order on insert.
    Counters are cumulative over the scanned fragment:
        value[0]     rows up to and including the sample (rir)
        value[1 + k] distinct values of the first k+1 key columns up to the sample (unq[k])
 */
#[derive(Debug)]
pub struct SampleCache {
    key_spec: Arc<Spec>,
    value_spec: Spec,
    key_attrs: usize,
    value_len: usize,
    frag_count: u32,
    sample_version: u32,
    generation: u64,
    sample_count: usize,
    key_bytes: usize,
    addr_len: usize,
    addr_array: Vec<u8>,
    key_array: Vec<u8>,
    value_array: Vec<u32>,
    insert_pos: usize,
    key_pos: usize,
    sorted: bool,
    valid: bool,
    sort_steps: u64,
    pub(crate) save_time: Duration,
    pub(crate) sort_time: Duration,
}

fn addr_len_for(key_bytes: usize) -> usize {
    if key_bytes < 1 << 8 {
        1
    } else if key_bytes < 1 << 16 {
        2
    } else if key_bytes < 1 << 24 {
        3
    } else {
        4
    }
}

impl SampleCache {
    // Sizes every array from the head totals, nothing grows afterwards
    pub fn init(key_spec: Arc<Spec>, head: &SampleHead, generation: u64, max_cache_bytes: usize) -> Result<SampleCache> {
        let key_attrs = key_spec.get_count();
        if key_attrs == 0 {
            return Err(IndexStatError::usage("index has no key columns"));
        }
        if head.frag_count == 0 {
            return Err(IndexStatError::invalid_cache("head has zero fragments"));
        }
        if head.value_format != VALUE_FORMAT {
            return Err(IndexStatError::invalid_cache(format!("unknown value format {}", head.value_format)));
        }
        let value_len = 1 + key_attrs;
        let sample_count = head.sample_count as usize;
        let key_bytes = head.key_bytes as usize;
        let addr_len = addr_len_for(key_bytes);
        let total_bytes = sample_count * addr_len + key_bytes + sample_count * value_len * 4;
        if total_bytes > max_cache_bytes {
            return Err(IndexStatError::no_mem(format!("cache of {} bytes exceeds limit of {}", total_bytes, max_cache_bytes)));
        }
        let mut addr_array = Vec::new();
        addr_array.try_reserve_exact(sample_count * addr_len)?;
        addr_array.resize(sample_count * addr_len, 0);
        let mut key_array = Vec::new();
        key_array.try_reserve_exact(key_bytes)?;
        let mut value_array = Vec::new();
        value_array.try_reserve_exact(sample_count * value_len)?;
        Ok(SampleCache {
            key_spec,
            value_spec: Spec::value_spec(key_attrs),
            key_attrs,
            value_len,
            frag_count: head.frag_count,
            sample_version: head.sample_version,
            generation,
            sample_count,
            key_bytes,
            addr_len,
            addr_array,
            key_array,
            value_array,
            insert_pos: 0,
            key_pos: 0,
            sorted: false,
            valid: false,
            sort_steps: 0,
            save_time: Duration::ZERO,
            sort_time: Duration::ZERO,
        })
    }

    pub fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if self.insert_pos >= self.sample_count {
            return Err(IndexStatError::invalid_cache(format!("more than {} samples", self.sample_count)));
        }
        if self.key_pos + key.len() > self.key_bytes {
            return Err(IndexStatError::invalid_cache(format!("sample keys exceed {} bytes", self.key_bytes)));
        }
        let key_len = DataRef::from_buf(&self.key_spec, key, self.key_attrs, Endian::Little)?.len();
        if key_len != key.len() {
            return Err(IndexStatError::invalid_cache(format!("sample key of {} bytes has {} trailing bytes", key_len, key.len() - key_len)));
        }
        let value_ref = DataRef::from_buf(&self.value_spec, value, self.value_len, Endian::Little)?;
        if value_ref.len() != value.len() {
            return Err(IndexStatError::invalid_cache(format!("sample value of {} bytes, expected {}", value.len(), value_ref.len())));
        }
        let counters = value_ref.values()?;
        let counters: Vec<u32> = counters.iter()
            .map(|c| match c {
                Some(Value::Unsigned(v)) => Ok(*v as u32),
                _ => Err(IndexStatError::internal("sample value is not a counter tuple")),
            })
            .collect::<Result<_>>()?;
        check_counters(&counters)?;

        let addr = self.key_pos;
        self.key_array.extend_from_slice(key);
        convert(&self.key_spec, &mut self.key_array[addr..], self.key_attrs, Endian::Little, Endian::Native)?;
        self.set_keyaddr(self.insert_pos, addr);
        self.value_array.extend_from_slice(&counters);
        self.key_pos += key.len();
        self.insert_pos += 1;
        Ok(())
    }

    // All samples and key bytes announced by the head must have arrived
    pub(crate) fn check_complete(&self) -> Result<()> {
        if self.insert_pos != self.sample_count {
            return Err(IndexStatError::invalid_cache(format!("got {} of {} samples", self.insert_pos, self.sample_count)));
        }
        if self.key_pos != self.key_bytes {
            return Err(IndexStatError::invalid_cache(format!("got {} of {} key bytes", self.key_pos, self.key_bytes)));
        }
        Ok(())
    }

    pub fn sort(&mut self) -> Result<()> {
        self.sort_steps = heap_sort::sort(self)?;
        self.sorted = true;
        Ok(())
    }

    pub fn verify(&mut self) -> Result<()> {
        if !self.sorted {
            return Err(IndexStatError::internal("verify before sort"));
        }
        let last = self.key_attrs - 1;
        for pos in 0..self.sample_count {
            check_counters(self.get_values(pos))?;
            if pos == 0 {
                continue;
            }
            let (ord, _) = self.get_key(pos - 1)?.cmp(&self.get_key(pos)?, self.key_attrs);
            if ord != Ordering::Less {
                return Err(IndexStatError::invalid_cache(format!("keys not increasing at sample {}", pos)));
            }
            let (prev, cur) = (self.get_values(pos - 1), self.get_values(pos));
            if prev[0] >= cur[0] {
                return Err(IndexStatError::invalid_cache(format!("rir not increasing at sample {}", pos)));
            }
            if (0..self.key_attrs).any(|k| prev[1 + k] > cur[1 + k]) {
                return Err(IndexStatError::invalid_cache(format!("unq decreasing at sample {}", pos)));
            }
            if prev[1 + last] >= cur[1 + last] {
                return Err(IndexStatError::invalid_cache(format!("full key unq not increasing at sample {}", pos)));
            }
        }
        self.valid = true;
        Ok(())
    }

    fn get_keyaddr(&self, pos: usize) -> usize {
        NativeEndian::read_uint(&self.addr_array[pos * self.addr_len..], self.addr_len) as usize
    }

    fn set_keyaddr(&mut self, pos: usize, addr: usize) {
        let start = pos * self.addr_len;
        NativeEndian::write_uint(&mut self.addr_array[start..start + self.addr_len], addr as u64, self.addr_len);
    }

    pub(crate) fn swap_entry(&mut self, pos1: usize, pos2: usize) {
        for i in 0..self.addr_len {
            self.addr_array.swap(pos1 * self.addr_len + i, pos2 * self.addr_len + i);
        }
        for i in 0..self.value_len {
            self.value_array.swap(pos1 * self.value_len + i, pos2 * self.value_len + i);
        }
    }

    pub(crate) fn cmp_entries(&self, pos1: usize, pos2: usize) -> Result<Ordering> {
        Ok(self.get_key(pos1)?.cmp(&self.get_key(pos2)?, self.key_attrs).0)
    }

    // Native order key of sample `pos`
    pub fn get_key(&self, pos: usize) -> Result<DataRef<'_>> {
        let addr = self.get_keyaddr(pos);
        DataRef::from_buf(&self.key_spec, &self.key_array[addr..], self.key_attrs, Endian::Native)
    }

    pub fn get_values(&self, pos: usize) -> &[u32] {
        &self.value_array[pos * self.value_len..(pos + 1) * self.value_len]
    }

    pub fn get_rir1(&self, pos: usize) -> f64 {
        self.get_values(pos)[0] as f64
    }

    pub fn get_rir1_between(&self, pos1: usize, pos2: usize) -> f64 {
        self.get_rir1(pos2) - self.get_rir1(pos1)
    }

    pub fn get_rir(&self, pos: usize) -> f64 {
        self.get_rir1(pos) * self.frag_count as f64
    }

    pub fn get_rir_between(&self, pos1: usize, pos2: usize) -> f64 {
        self.get_rir1_between(pos1, pos2) * self.frag_count as f64
    }

    pub fn get_unq1(&self, pos: usize, k: usize) -> f64 {
        self.get_values(pos)[1 + k] as f64
    }

    pub fn get_unq1_between(&self, pos1: usize, pos2: usize, k: usize) -> f64 {
        self.get_unq1(pos2, k) - self.get_unq1(pos1, k)
    }

    // Records per key correction for unq1 distinct keys seen among rir1 rows of one fragment
    pub fn get_unq_factor(&self, rir1: f64, unq1: f64) -> f64 {
        unq_factor(self.frag_count, rir1, unq1)
    }

    // Table wide distinct keys for any single fragment observation
    pub fn get_unq_scaled(&self, rir1: f64, unq1: f64) -> f64 {
        unq1 * self.get_unq_factor(rir1, unq1)
    }

    pub fn get_unq(&self, pos: usize, k: usize) -> f64 {
        self.get_unq_scaled(self.get_rir1(pos), self.get_unq1(pos, k))
    }

    pub fn get_unq_between(&self, pos1: usize, pos2: usize, k: usize) -> f64 {
        self.get_unq_scaled(self.get_rir1_between(pos1, pos2), self.get_unq1_between(pos1, pos2, k))
    }

    pub fn get_rpk(&self, pos: usize, k: usize) -> f64 {
        self.get_rir(pos) / self.get_unq(pos, k)
    }

    pub fn get_rpk_between(&self, pos1: usize, pos2: usize, k: usize) -> f64 {
        self.get_rir_between(pos1, pos2) / self.get_unq_between(pos1, pos2, k)
    }

    #[inline]
    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    #[inline]
    pub fn key_attrs(&self) -> usize {
        self.key_attrs
    }

    #[inline]
    pub fn frag_count(&self) -> u32 {
        self.frag_count
    }

    #[inline]
    pub fn sample_version(&self) -> u32 {
        self.sample_version
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn key_spec(&self) -> &Arc<Spec> {
        &self.key_spec
    }

    pub fn sort_steps(&self) -> u64 {
        self.sort_steps
    }

    pub fn total_bytes(&self) -> usize {
        self.addr_array.len() + self.key_array.len() + self.value_array.len() * 4
    }
}

// A single sample: nonzero counters with rir >= unq[last] >= ... >= unq[0]
fn check_counters(counters: &[u32]) -> Result<()> {
    let (rir, unq) = counters.split_first().ok_or_else(|| IndexStatError::internal("empty counter tuple"))?;
    if *rir == 0 {
        return Err(IndexStatError::invalid_cache("zero rir"));
    }
    if unq.iter().any(|u| *u == 0) {
        return Err(IndexStatError::invalid_cache("zero unq"));
    }
    if unq.last().map_or(false, |u| rir < u) {
        return Err(IndexStatError::invalid_cache(format!("rir {} below unq {:?}", rir, unq)));
    }
    if unq.windows(2).any(|w| w[0] > w[1]) {
        return Err(IndexStatError::invalid_cache(format!("unq {:?} decreasing over key columns", unq)));
    }
    Ok(())
}

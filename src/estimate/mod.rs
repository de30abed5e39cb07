pub mod interpolate;
pub mod search;
pub mod solver;

use std::fmt::Display;

use tracing::trace;

use crate::{
    bound::Range,
    cache::SampleCache,
    error::{IndexStatError, Result},
};

use self::interpolate::{interpolate_range, Counters};

// Estimate for one range, scaled to the whole table
#[derive(Debug, Clone, PartialEq)]
pub struct StatValue {
    // Rows in range
    pub rir: f64,
    // Distinct values of the first k+1 key columns in range
    pub unq: Vec<f64>,
    // Correction applied to each single fragment unique count
    pub unq_factor: Vec<f64>,
    // Rows in the sampled fragment
    pub num_rows: f64,
    pub num_fragments: u32,
    pub empty: bool,
    // Lower bound, upper bound and range rule
    pub rule: [&'static str; 3],
    pub generation: u64,
    pub sample_version: u32,
}

impl StatValue {
    fn empty(cache: &SampleCache, rule: [&'static str; 3]) -> StatValue {
        let k = cache.key_attrs();
        StatValue {
            rir: 1.0,
            unq: vec![1.0; k],
            unq_factor: vec![1.0; k],
            num_rows: Self::num_rows(cache),
            num_fragments: cache.frag_count(),
            empty: true,
            rule,
            generation: cache.generation(),
            sample_version: cache.sample_version(),
        }
    }

    fn num_rows(cache: &SampleCache) -> f64 {
        match cache.sample_count() {
            0 => 0.0,
            n => cache.get_rir1(n - 1),
        }
    }

    // Scales single fragment counters and floors everything at one
    fn from_counters(cache: &SampleCache, counters: &Counters, rule: [&'static str; 3]) -> StatValue {
        let frags = cache.frag_count();
        let rir = (counters.rir * frags as f64).max(1.0);
        let unq_factor: Vec<f64> = counters.unq.iter()
            .map(|unq| cache.get_unq_factor(counters.rir, *unq))
            .collect();
        let unq = counters.unq.iter()
            .zip(&unq_factor)
            .map(|(unq, factor)| (unq * factor).max(1.0).min(rir))
            .collect();
        StatValue {
            rir,
            unq,
            unq_factor,
            num_rows: Self::num_rows(cache),
            num_fragments: frags,
            empty: false,
            rule,
            generation: cache.generation(),
            sample_version: cache.sample_version(),
        }
    }

    #[inline]
    pub fn rir(&self) -> f64 {
        self.rir
    }

    // Records per key over the first k+1 key columns
    pub fn rpk(&self, k: usize) -> f64 {
        self.rir / self.unq[k]
    }

    // Fraction of the table in range
    pub fn selectivity(&self) -> f64 {
        let total = self.num_rows * self.num_fragments as f64;
        if total <= 0.0 {
            return 1.0;
        }
        (self.rir / total).min(1.0)
    }
}

impl Display for StatValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rir={:.2} unq=[", self.rir)?;
        for (i, unq) in self.unq.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:.2}", unq)?;
        }
        write!(f, "] rule={}/{}/{}", self.rule[0], self.rule[1], self.rule[2])?;
        if self.empty {
            write!(f, " empty")?;
        }
        Ok(())
    }
}

pub fn query_stat(cache: &SampleCache, range: &Range) -> Result<StatValue> {
    if !cache.is_valid() {
        return Err(IndexStatError::invalid_cache(format!("generation {} is not valid", cache.generation())));
    }
    if range.low().get_data().spec() != cache.key_spec().as_ref() {
        return Err(IndexStatError::usage("range built for another index"));
    }
    let result = interpolate_range(cache, range)?;
    let value = match &result.value {
        Some(counters) => StatValue::from_counters(cache, counters, result.rule),
        None => StatValue::empty(cache, result.rule),
    };
    trace!(range = %range, generation = cache.generation(), value = %value, "query stat");
    Ok(value)
}

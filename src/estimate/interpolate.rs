use crate::{bound::Range, cache::SampleCache, error::Result};

use super::search::{search, BoundPos};

/*
    Interpolation rules. All counters here are single fragment values, scaling to the
    table happens afterwards. The first rule that applies wins, the order is fixed.

    A single bound yields the counters of everything sorting before it. With L and H the
    cumulative counters of the samples around pos and K the number of key columns:

        b2    pos at the end                       last sample
        b1.1  pos at the start, bound is key(0)    zero
        b1.2  pos at the start                     half of the first sample
        b3.1  full bound equal to key(pos-1)       L
        b3.2  full bound equal to key(pos)         L
        b3.3  full bound inside the gap            L + (1 - 1/d)/2 * (H - L), d keys in gap
        b4    prefix bound inside the gap          L + (H - L)/2

    A range combines its two bounds:

        r1.1  no samples                           empty
        r1.2  both unbounded                       last sample
        r1.3  low unbounded                        high
        r1.4  high unbounded                       last sample - low
        r1.5  low after high                       empty
        r1.6  bounds cross                         empty
        r1.7  low at the start                     high - low
        r1.8  high at the end                      high - low
        r2.1  one gap, exact at both ends          gap without key(pos), rpk of the gap
        r2.2  one gap, exact at one end            half of r2.1
        r2.3  one gap                              half the gap
        r3.1  one sample, exact at both ends       high - low
        r3.2  one sample, exact at one end         high - low
        r3.3  one sample                           half of high - low
        r4                                         high - low

    Differences never go below zero.
 */

#[derive(Debug, Clone, PartialEq)]
pub struct Counters {
    pub rir: f64,
    pub unq: Vec<f64>,
}

impl Counters {
    pub fn zero(key_attrs: usize) -> Counters {
        Counters { rir: 0.0, unq: vec![0.0; key_attrs] }
    }

    pub fn at(cache: &SampleCache, pos: usize) -> Counters {
        Counters {
            rir: cache.get_rir1(pos),
            unq: (0..cache.key_attrs()).map(|k| cache.get_unq1(pos, k)).collect(),
        }
    }

    pub fn sub(&self, other: &Counters) -> Counters {
        Counters {
            rir: (self.rir - other.rir).max(0.0),
            unq: self.unq.iter().zip(&other.unq).map(|(a, b)| (a - b).max(0.0)).collect(),
        }
    }

    pub fn scale(&self, w: f64) -> Counters {
        Counters { rir: self.rir * w, unq: self.unq.iter().map(|u| u * w).collect() }
    }

    // self + w * (other - self)
    pub fn blend(&self, other: &Counters, w: f64) -> Counters {
        Counters {
            rir: self.rir + w * (other.rir - self.rir),
            unq: self.unq.iter().zip(&other.unq).map(|(a, b)| a + w * (b - a)).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundValue {
    pub pos: BoundPos,
    pub value: Counters,
    pub rule: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RangeValue {
    // None for an empty range
    pub value: Option<Counters>,
    pub rule: [&'static str; 3],
}

pub fn interpolate_bound(cache: &SampleCache, pos: BoundPos, count: usize) -> BoundValue {
    let n = cache.sample_count();
    let k = cache.key_attrs();
    let full = count == k;
    let (value, rule) = if pos.pos == n {
        (Counters::at(cache, n - 1), "b2")
    } else if pos.pos == 0 {
        if full && pos.num_eq_high == k {
            (Counters::zero(k), "b1.1")
        } else {
            (Counters::at(cache, 0).scale(0.5), "b1.2")
        }
    } else {
        let low = Counters::at(cache, pos.pos - 1);
        if full && pos.num_eq_low == k {
            (low, "b3.1")
        } else if full && pos.num_eq_high == k {
            (low, "b3.2")
        } else if full {
            let high = Counters::at(cache, pos.pos);
            let keys = cache.get_unq1_between(pos.pos - 1, pos.pos, k - 1);
            (low.blend(&high, 0.5 * (1.0 - 1.0 / keys)), "b3.3")
        } else {
            let high = Counters::at(cache, pos.pos);
            (low.blend(&high, 0.5), "b4")
        }
    };
    BoundValue { pos, value, rule }
}

pub fn interpolate_range(cache: &SampleCache, range: &Range) -> Result<RangeValue> {
    let n = cache.sample_count();
    let k = cache.key_attrs();
    if n == 0 {
        return Ok(RangeValue { value: None, rule: ["-", "-", "r1.1"] });
    }
    let total = Counters::at(cache, n - 1);
    let (low_bound, high_bound) = (range.low(), range.high());
    if low_bound.is_empty() && high_bound.is_empty() {
        return Ok(RangeValue { value: Some(total), rule: ["-", "-", "r1.2"] });
    }
    if low_bound.is_empty() {
        let high = interpolate_bound(cache, search(cache, high_bound)?, high_bound.get_count());
        return Ok(RangeValue { value: Some(high.value), rule: ["-", high.rule, "r1.3"] });
    }
    let low = interpolate_bound(cache, search(cache, low_bound)?, low_bound.get_count());
    if high_bound.is_empty() {
        return Ok(RangeValue { value: Some(total.sub(&low.value)), rule: [low.rule, "-", "r1.4"] });
    }
    let high = interpolate_bound(cache, search(cache, high_bound)?, high_bound.get_count());
    let rule = |r| [low.rule, high.rule, r];
    let (pos1, pos2) = (low.pos.pos, high.pos.pos);

    if pos1 > pos2 {
        return Ok(RangeValue { value: None, rule: rule("r1.5") });
    }
    if range.is_empty() {
        return Ok(RangeValue { value: None, rule: rule("r1.6") });
    }
    if pos1 == 0 {
        return Ok(RangeValue { value: Some(high.value.sub(&low.value)), rule: rule("r1.7") });
    }
    if pos2 == n {
        return Ok(RangeValue { value: Some(high.value.sub(&low.value)), rule: rule("r1.8") });
    }

    if pos1 == pos2 {
        let exact_low = low_bound.get_count() == k && low.pos.num_eq_low == k;
        let exact_high = high_bound.get_count() == k && high.pos.num_eq_high == k;
        let gap = Counters::at(cache, pos1).sub(&Counters::at(cache, pos1 - 1));
        // Table rows of the gap are (keys - 1) * rpk once key(pos) is left out
        let rows = cache.get_rir_between(pos1 - 1, pos1);
        let rpk = cache.get_rpk_between(pos1 - 1, pos1, k - 1);
        let without_key = gap.scale((rows - rpk) / rows);
        let (value, r) = match (exact_low, exact_high) {
            (true, true) => (without_key, "r2.1"),
            (true, false) | (false, true) => (without_key.scale(0.5), "r2.2"),
            (false, false) => (gap.scale(0.5), "r2.3"),
        };
        return Ok(RangeValue { value: Some(value), rule: rule(r) });
    }

    if pos1 + 1 == pos2 {
        let exact_low = low_bound.get_count() == k && low.pos.num_eq_high == k;
        let exact_high = high_bound.get_count() == k && high.pos.num_eq_low == k;
        let diff = high.value.sub(&low.value);
        let (value, r) = match (exact_low, exact_high) {
            (true, true) => (diff, "r3.1"),
            (true, false) | (false, true) => (diff, "r3.2"),
            (false, false) => (diff.scale(0.5), "r3.3"),
        };
        return Ok(RangeValue { value: Some(value), rule: rule(r) });
    }

    Ok(RangeValue { value: Some(high.value.sub(&low.value)), rule: rule("r4") })
}

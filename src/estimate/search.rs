use std::cmp::Ordering;

use crate::{bound::Bound, cache::SampleCache, error::Result};

// Where a bound falls among the sorted samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundPos {
    // Number of samples sorting before the bound
    pub pos: usize,
    // Leading components equal between the bound and the sample just below it
    pub num_eq_low: usize,
    // Same for the sample at pos
    pub num_eq_high: usize,
}

pub fn search(cache: &SampleCache, bound: &Bound) -> Result<BoundPos> {
    let n = cache.sample_count();
    let (mut lo, mut hi) = (0, n);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let (ord, _) = bound.cmp_key(&cache.get_key(mid)?);
        if ord == Ordering::Less {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    let pos = lo;
    let num_eq_low = if pos > 0 { bound.cmp_key(&cache.get_key(pos - 1)?).1 } else { 0 };
    let num_eq_high = if pos < n { bound.cmp_key(&cache.get_key(pos)?).1 } else { 0 };
    Ok(BoundPos { pos, num_eq_low, num_eq_high })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bound::BoundType,
        cache::{builder::CacheBuilder, tests::int_spec},
        config::IndexStatConfig,
        source::VecSampleSource,
        types::Value,
    };

    fn cache() -> SampleCache {
        let spec = int_spec(2);
        let key = |a, b| vec![Some(Value::Int(a)), Some(Value::Int(b))];
        let samples = vec![
            (key(1, 1), vec![5, 1, 1]),
            (key(1, 5), vec![10, 1, 2]),
            (key(3, 2), vec![20, 2, 3]),
            (key(7, 7), vec![40, 3, 4]),
        ];
        let mut source = VecSampleSource::from_values(&spec, 2, 1, &samples).unwrap();
        CacheBuilder::build(spec, &mut source, 1, &IndexStatConfig::default()).unwrap()
    }

    fn bound(cache: &SampleCache, values: &[i64], strict: bool, bound_type: BoundType) -> Bound {
        let mut b = Bound::new(cache.key_spec().clone());
        for v in values {
            b.add_value(&Value::Int(*v)).unwrap();
        }
        if !values.is_empty() {
            b.set_strict(strict).unwrap();
        }
        b.finalize(bound_type).unwrap();
        b
    }

    #[test]
    fn test_positions() {
        let cache = cache();
        let at = |values: &[i64], strict, bound_type| search(&cache, &bound(&cache, values, strict, bound_type)).unwrap();
        assert_eq!(at(&[], false, BoundType::Low), BoundPos { pos: 0, num_eq_low: 0, num_eq_high: 0 });
        assert_eq!(at(&[], false, BoundType::High), BoundPos { pos: 4, num_eq_low: 0, num_eq_high: 0 });
        assert_eq!(at(&[1], false, BoundType::Low), BoundPos { pos: 0, num_eq_low: 0, num_eq_high: 1 });
        assert_eq!(at(&[1], false, BoundType::High), BoundPos { pos: 2, num_eq_low: 1, num_eq_high: 0 });
        assert_eq!(at(&[3, 2], false, BoundType::Low), BoundPos { pos: 2, num_eq_low: 0, num_eq_high: 2 });
        assert_eq!(at(&[3, 2], true, BoundType::Low), BoundPos { pos: 3, num_eq_low: 2, num_eq_high: 0 });
        assert_eq!(at(&[3, 3], false, BoundType::High), BoundPos { pos: 3, num_eq_low: 1, num_eq_high: 0 });
        assert_eq!(at(&[9], true, BoundType::High), BoundPos { pos: 4, num_eq_low: 0, num_eq_high: 0 });
    }
}

use std::cmp::Ordering;

use crate::error::Result;

use super::SampleCache;

/*
    In place heap sort over cache positions. Entries are only ever compared and swapped
    through the cache, so the key blob stays where it was written.
    Samples mostly arrive in key order already, heap sort keeps the worst case at
    O(n log n) regardless. Returns the number of sift steps taken.
 */
pub(super) fn sort(cache: &mut SampleCache) -> Result<u64> {
    let n = cache.sample_count();
    let mut steps = 0;
    if n < 2 {
        return Ok(steps);
    }
    for start in (0..n / 2).rev() {
        steps += sift_down(cache, start, n)?;
    }
    for end in (1..n).rev() {
        cache.swap_entry(0, end);
        steps += sift_down(cache, 0, end)?;
    }
    Ok(steps)
}

fn sift_down(cache: &mut SampleCache, mut idx: usize, len: usize) -> Result<u64> {
    let mut steps = 0;
    loop {
        steps += 1;
        let left = 2 * idx + 1;
        let right = 2 * idx + 2;
        let mut largest = idx;
        if left < len && cache.cmp_entries(left, largest)? == Ordering::Greater {
            largest = left;
        }
        if right < len && cache.cmp_entries(right, largest)? == Ordering::Greater {
            largest = right;
        }
        if largest == idx {
            return Ok(steps);
        }
        cache.swap_entry(idx, largest);
        idx = largest;
    }
}

use std::{cmp::Ordering, fmt::Display, sync::Arc};

use crate::{
    error::{IndexStatError, Result},
    pack::{Data, DataRef, Endian, Spec},
    types::Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundType {
    Low,
    High,
}

/*
    A bound is a prefix of key values plus a strict flag. Once finalized it gets a side:
    -1 puts the bound just before all keys starting with the prefix, +1 just after them.

        lower, inclusive (>=)  -> -1      upper, inclusive (<=)  -> +1
        lower, strict    (>)   -> +1      upper, strict    (<)   -> -1

    An empty bound is unbounded: -1 as lower bound, +1 as upper bound.
    With the side every bound lies strictly between two keys, so comparing a stored
    key against a bound never ends in a tie.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bound {
    data: Data,
    strict: Option<bool>,
    bound_type: Option<BoundType>,
    side: i32,
}

impl Bound {
    pub fn new(spec: Arc<Spec>) -> Bound {
        Bound { data: Data::new(spec, Endian::Native), strict: None, bound_type: None, side: 0 }
    }

    pub fn add_value(&mut self, value: &Value) -> Result<()> {
        self.check_open()?;
        self.data.add(value)
    }

    pub fn add_null(&mut self) -> Result<()> {
        self.check_open()?;
        self.data.add_null()
    }

    pub fn set_strict(&mut self, strict: bool) -> Result<()> {
        self.check_open()?;
        if self.strict.is_some() {
            return Err(IndexStatError::usage("bound strictness set twice"));
        }
        self.strict = Some(strict);
        Ok(())
    }

    fn check_open(&self) -> Result<()> {
        if self.bound_type.is_some() {
            return Err(IndexStatError::usage("bound already finalized"));
        }
        Ok(())
    }

    pub fn finalize(&mut self, bound_type: BoundType) -> Result<()> {
        if let Some(current) = self.bound_type {
            if current == bound_type {
                return Ok(());
            }
            return Err(IndexStatError::usage(format!("bound already finalized as {:?}", current)));
        }
        let side = if self.data.is_empty() {
            if self.strict.is_some() {
                return Err(IndexStatError::usage("strictness set on an empty bound"));
            }
            match bound_type {
                BoundType::Low => -1,
                BoundType::High => 1,
            }
        } else {
            let strict = self.strict.ok_or_else(|| IndexStatError::usage("bound strictness not set"))?;
            match (bound_type, strict) {
                (BoundType::Low, false) | (BoundType::High, true) => -1,
                (BoundType::Low, true) | (BoundType::High, false) => 1,
            }
        };
        self.side = side;
        self.bound_type = Some(bound_type);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.data.reset();
        self.strict = None;
        self.bound_type = None;
        self.side = 0;
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn is_finalized(&self) -> bool {
        self.bound_type.is_some()
    }

    #[inline]
    pub fn get_side(&self) -> i32 {
        self.side
    }

    #[inline]
    pub fn get_count(&self) -> usize {
        self.data.get_count()
    }

    #[inline]
    pub fn is_strict(&self) -> bool {
        self.strict.unwrap_or(false)
    }

    pub fn get_data(&self) -> DataRef<'_> {
        self.data.as_data_ref()
    }

    // Where a stored key lies relative to the bound: Less if before, Greater if after.
    // Also returns the number of leading key components equal to the bound
    pub fn cmp_key(&self, key: &DataRef) -> (Ordering, usize) {
        debug_assert!(self.side != 0);
        let (ord, num_eq) = key.cmp(&self.data.as_data_ref(), self.data.get_count());
        if ord != Ordering::Equal {
            return (ord, num_eq);
        }
        if self.side < 0 {
            (Ordering::Greater, num_eq)
        } else {
            (Ordering::Less, num_eq)
        }
    }

    // Position of this bound relative to another finalized bound
    pub fn cmp_bound(&self, other: &Bound) -> Ordering {
        let count = self.get_count().min(other.get_count());
        let (ord, _) = self.data.as_data_ref().cmp(&other.data.as_data_ref(), count);
        if ord != Ordering::Equal {
            return ord;
        }
        match self.get_count().cmp(&other.get_count()) {
            Ordering::Equal => self.side.cmp(&other.side),
            // The shorter bound lies before or after every extension of its prefix
            Ordering::Less => if self.side > 0 { Ordering::Greater } else { Ordering::Less },
            Ordering::Greater => if other.side < 0 { Ordering::Greater } else { Ordering::Less },
        }
    }
}

impl Display for Bound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return match self.bound_type {
                Some(BoundType::High) => write!(f, "+inf"),
                _ => write!(f, "-inf"),
            };
        }
        let op = match (self.bound_type, self.is_strict()) {
            (Some(BoundType::High), true) => "<",
            (Some(BoundType::High), false) => "<=",
            (_, true) => ">",
            (_, false) => ">=",
        };
        write!(f, "{} {}", op, self.data.as_data_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
    low: Bound,
    high: Bound,
}

impl Range {
    pub fn new(mut low: Bound, mut high: Bound) -> Result<Range> {
        if low.data.spec() != high.data.spec() {
            return Err(IndexStatError::usage("range bounds built for different key specs"));
        }
        low.finalize(BoundType::Low)?;
        high.finalize(BoundType::High)?;
        Ok(Range { low, high })
    }

    pub fn unbounded(spec: Arc<Spec>) -> Range {
        let mut low = Bound::new(spec.clone());
        let mut high = Bound::new(spec);
        low.side = -1;
        low.bound_type = Some(BoundType::Low);
        high.side = 1;
        high.bound_type = Some(BoundType::High);
        Range { low, high }
    }

    pub fn low(&self) -> &Bound {
        &self.low
    }

    pub fn high(&self) -> &Bound {
        &self.high
    }

    pub fn bound(&self, bound_type: BoundType) -> &Bound {
        match bound_type {
            BoundType::Low => &self.low,
            BoundType::High => &self.high,
        }
    }

    // True when no key can satisfy both bounds
    pub fn is_empty(&self) -> bool {
        self.low.cmp_bound(&self.high) != Ordering::Less
    }
}

impl Display for Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} .. {}]", self.low, self.high)
    }
}

/*
    Index statistics for range selectivity estimation.

    Samples taken while scanning one fragment of an ordered index are loaded into an
    immutable cache generation. Range queries are answered by a binary search over the
    sorted sample keys followed by interpolation between the two samples around each
    bound. Single fragment counts are scaled to the whole table, unique key counts
    through a records per key correction.
 */

pub mod bound;
pub mod cache;
pub mod config;
pub mod dump;
pub mod error;
pub mod estimate;
pub mod index_stat;
pub mod lifecycle;
pub mod pack;
pub mod source;
pub mod types;

pub use bound::{Bound, BoundType, Range};
pub use config::IndexStatConfig;
pub use dump::{CacheDump, DumpEntry, ResettableIterator};
pub use error::{IndexStatError, Result};
pub use estimate::StatValue;
pub use index_stat::IndexStatistics;
pub use lifecycle::{CacheInfo, CacheType};
pub use pack::{ColumnSpec, Spec};
pub use source::{RawSample, SampleHead, SampleSource, VecSampleSource};
pub use types::{Collation, ColumnType, Value};

pub mod spec;
pub mod data;

pub use spec::{ColumnSpec, Spec};
pub use data::{convert, Data, DataRef, Endian};

/*
    Packed key/value format.

    A packed tuple is the concatenation of:
    1. a null mask of ceil(n/8) bytes where n is the number of nullable columns in the spec.
       The first bit of the first byte belongs to the first nullable column and so on
       (most significant bit first). The mask always has the length derived from the full
       spec, also for partial tuples (bounds only carry a prefix of the key columns).
    2. for each non null column of the (possibly partial) tuple its bytes:
       fixed size columns take exactly their width, variable size columns start with a
       1 or 2 byte little-endian length prefix followed by that many bytes.

    A tuple is not self delimiting, its length is recovered by walking the spec.
    Numeric and temporal fields are written in the byte order of the tuple. Stored samples
    are little-endian, everything that gets compared is converted to native order first.
    Length prefixes are little-endian in both cases and are never swapped.
 */

use std::{cmp::Ordering, fmt::Display, sync::Arc};

use bitvec::{order::Msb0, slice::BitSlice};
use chrono::Datelike;
use byteorder::{BigEndian, ByteOrder, LittleEndian, NativeEndian, WriteBytesExt};

use crate::{
    error::{IndexStatError, Result},
    types::{pack_date, pack_datetime, pack_time, unpack_date, unpack_datetime, unpack_time, ColumnType, Value},
};

use super::spec::{ColumnSpec, Spec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endian {
    Native,
    Little,
    Big,
}

impl Endian {
    pub fn resolve(self) -> Endian {
        match self {
            Endian::Native => if cfg!(target_endian = "little") { Endian::Little } else { Endian::Big },
            other => other,
        }
    }
}

fn read_uint(bytes: &[u8], endian: Endian) -> u64 {
    match endian.resolve() {
        Endian::Big => BigEndian::read_uint(bytes, bytes.len()),
        _ => LittleEndian::read_uint(bytes, bytes.len()),
    }
}

fn read_int(bytes: &[u8], endian: Endian) -> i64 {
    match endian.resolve() {
        Endian::Big => BigEndian::read_int(bytes, bytes.len()),
        _ => LittleEndian::read_int(bytes, bytes.len()),
    }
}

fn put_uint(out: &mut Vec<u8>, value: u64, width: usize, endian: Endian) -> Result<()> {
    let res = match endian.resolve() {
        Endian::Big => out.write_uint::<BigEndian>(value, width),
        _ => out.write_uint::<LittleEndian>(value, width),
    };
    res.map_err(|e| IndexStatError::internal(e.to_string()))
}

fn put_int(out: &mut Vec<u8>, value: i64, width: usize, endian: Endian) -> Result<()> {
    let res = match endian.resolve() {
        Endian::Big => out.write_int::<BigEndian>(value, width),
        _ => out.write_int::<LittleEndian>(value, width),
    };
    res.map_err(|e| IndexStatError::internal(e.to_string()))
}

fn check_signed(value: i64, width: usize) -> Result<()> {
    if width < 8 {
        let bound = 1i64 << (8 * width - 1);
        if value < -bound || value >= bound {
            return Err(IndexStatError::internal(format!("value {} does not fit {} bytes", value, width)));
        }
    }
    Ok(())
}

fn check_unsigned(value: u64, width: usize) -> Result<()> {
    if width < 8 && value >= 1u64 << (8 * width) {
        return Err(IndexStatError::internal(format!("value {} does not fit {} bytes", value, width)));
    }
    Ok(())
}

// Walks the columns of a packed tuple yielding the payload of each column, None for NULL
struct Columns<'a> {
    spec: &'a Spec,
    buf: &'a [u8],
    pos: usize,
    index: usize,
    nullable_index: usize,
    count: usize,
}

impl<'a> Columns<'a> {
    fn new(spec: &'a Spec, buf: &'a [u8], count: usize) -> Result<Columns<'a>> {
        let mask_len = spec.get_null_mask_len();
        if buf.len() < mask_len {
            return Err(IndexStatError::internal("buffer shorter than null mask"));
        }
        Ok(Columns { spec, buf, pos: mask_len, index: 0, nullable_index: 0, count })
    }

    fn position(&self) -> usize {
        self.pos
    }
}

impl<'a> Iterator for Columns<'a> {
    type Item = Result<(usize, Option<&'a [u8]>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.count {
            return None;
        }
        let index = self.index;
        let column = self.spec.get_column(index);
        self.index += 1;
        if column.nullable {
            let mask = BitSlice::<u8, Msb0>::from_slice(&self.buf[..self.spec.get_null_mask_len()]);
            let is_null = mask[self.nullable_index];
            self.nullable_index += 1;
            if is_null {
                return Some(Ok((self.pos, None)));
            }
        }
        let length_bytes = column.column_type.get_length_bytes();
        let (start, len) = match column.column_type.get_fixed_size() {
            Some(size) => (self.pos, size),
            None => {
                if self.pos + length_bytes > self.buf.len() {
                    self.index = self.count;
                    return Some(Err(IndexStatError::internal(format!("truncated length prefix of column {}", index))));
                }
                let len = LittleEndian::read_uint(&self.buf[self.pos..], length_bytes) as usize;
                (self.pos + length_bytes, len)
            }
        };
        if start + len > self.buf.len() {
            self.index = self.count;
            return Some(Err(IndexStatError::internal(format!("truncated column {}", index))));
        }
        let field_start = self.pos;
        self.pos = start + len;
        Some(Ok((field_start, Some(&self.buf[start..start + len]))))
    }
}

fn cmp_column(column: &ColumnSpec, a: Option<&[u8]>, b: Option<&[u8]>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match column.column_type {
            ColumnType::TinyInt | ColumnType::SmallInt | ColumnType::MediumInt
            | ColumnType::Int | ColumnType::BigInt | ColumnType::Decimal { .. } => {
                NativeEndian::read_int(a, a.len()).cmp(&NativeEndian::read_int(b, b.len()))
            }
            ColumnType::TinyUnsigned | ColumnType::SmallUnsigned | ColumnType::MediumUnsigned
            | ColumnType::Unsigned | ColumnType::BigUnsigned
            | ColumnType::Date | ColumnType::Time | ColumnType::Datetime | ColumnType::Timestamp => {
                NativeEndian::read_uint(a, a.len()).cmp(&NativeEndian::read_uint(b, b.len()))
            }
            ColumnType::Char(_) | ColumnType::VarChar(_) => column.collation.compare(a, b),
            ColumnType::Binary(_) | ColumnType::VarBinary(_) => a.cmp(b),
        },
    }
}

fn decode_column(column: &ColumnSpec, bytes: &[u8], endian: Endian) -> Result<Value> {
    let bad_value = || IndexStatError::internal(format!("undecodable {} value 0x{}", column.column_type, hex::encode(bytes)));
    let value = match column.column_type {
        ColumnType::TinyInt | ColumnType::SmallInt | ColumnType::MediumInt
        | ColumnType::Int | ColumnType::BigInt => Value::Int(read_int(bytes, endian)),
        ColumnType::TinyUnsigned | ColumnType::SmallUnsigned | ColumnType::MediumUnsigned
        | ColumnType::Unsigned | ColumnType::BigUnsigned => Value::Unsigned(read_uint(bytes, endian)),
        ColumnType::Char(_) => {
            let end = bytes.iter().rposition(|b| *b != b' ').map(|p| p + 1).unwrap_or(0);
            Value::String(String::from_utf8(bytes[..end].to_vec()).map_err(|_| bad_value())?)
        }
        ColumnType::VarChar(_) => Value::String(String::from_utf8(bytes.to_vec()).map_err(|_| bad_value())?),
        ColumnType::Binary(_) | ColumnType::VarBinary(_) => Value::Bytes(bytes.to_vec()),
        ColumnType::Date => Value::Date(unpack_date(read_uint(bytes, endian) as u32).ok_or_else(bad_value)?),
        ColumnType::Time => Value::Time(unpack_time(read_uint(bytes, endian) as u32).ok_or_else(bad_value)?),
        ColumnType::Datetime => Value::Datetime(unpack_datetime(read_uint(bytes, endian)).ok_or_else(bad_value)?),
        ColumnType::Timestamp => Value::Timestamp(read_uint(bytes, endian) as u32),
        ColumnType::Decimal { scale, .. } => Value::Decimal { unscaled: read_int(bytes, endian), scale },
    };
    Ok(value)
}

fn encode_column(column: &ColumnSpec, value: &Value, endian: Endian, out: &mut Vec<u8>) -> Result<()> {
    if !column.column_type.is_comparable_to_value(value) {
        return Err(IndexStatError::internal(format!("value {} does not match column type {}", value, column.column_type)));
    }
    let width = column.column_type.get_fixed_size().unwrap_or(0);
    match (column.column_type, value) {
        (ColumnType::Decimal { precision, .. }, Value::Decimal { unscaled, .. }) => {
            if unscaled.unsigned_abs() >= 10u64.pow(precision as u32) {
                return Err(IndexStatError::internal(format!("{} exceeds {}", value, column.column_type)));
            }
            put_int(out, *unscaled, width, endian)
        }
        (_, Value::Int(v)) => {
            check_signed(*v, width)?;
            put_int(out, *v, width, endian)
        }
        (_, Value::Unsigned(v)) => {
            check_unsigned(*v, width)?;
            put_uint(out, *v, width, endian)
        }
        (ColumnType::Char(len), Value::String(s)) => pad_into(out, s.as_bytes(), len as usize, b' ', column),
        (ColumnType::Binary(len), Value::Bytes(b)) => pad_into(out, b, len as usize, 0, column),
        (ColumnType::VarChar(max), Value::String(s)) => var_into(out, s.as_bytes(), max as usize, column),
        (ColumnType::VarBinary(max), Value::Bytes(b)) => var_into(out, b, max as usize, column),
        (ColumnType::Date, Value::Date(d)) => {
            if !(0..=9999).contains(&d.year()) {
                return Err(IndexStatError::internal(format!("date {} out of range", value)));
            }
            put_uint(out, pack_date(d) as u64, width, endian)
        }
        (ColumnType::Time, Value::Time(t)) => put_uint(out, pack_time(t) as u64, width, endian),
        (ColumnType::Datetime, Value::Datetime(dt)) => {
            if !(0..=9999).contains(&dt.date().year()) {
                return Err(IndexStatError::internal(format!("datetime {} out of range", value)));
            }
            put_uint(out, pack_datetime(dt), width, endian)
        }
        (ColumnType::Timestamp, Value::Timestamp(ts)) => put_uint(out, *ts as u64, width, endian),
        _ => Err(IndexStatError::internal(format!("value {} does not match column type {}", value, column.column_type))),
    }
}

fn pad_into(out: &mut Vec<u8>, bytes: &[u8], len: usize, pad: u8, column: &ColumnSpec) -> Result<()> {
    if bytes.len() > len {
        return Err(IndexStatError::internal(format!("{} bytes do not fit {}", bytes.len(), column.column_type)));
    }
    out.extend_from_slice(bytes);
    out.resize(out.len() + len - bytes.len(), pad);
    Ok(())
}

fn var_into(out: &mut Vec<u8>, bytes: &[u8], max: usize, column: &ColumnSpec) -> Result<()> {
    if bytes.len() > max {
        return Err(IndexStatError::internal(format!("{} bytes do not fit {}", bytes.len(), column.column_type)));
    }
    // Length prefixes stay little-endian regardless of the tuple byte order
    put_uint(out, bytes.len() as u64, column.column_type.get_length_bytes(), Endian::Little)?;
    out.extend_from_slice(bytes);
    Ok(())
}

fn encoded_len(column: &ColumnSpec, value: &Value) -> usize {
    match column.column_type.get_fixed_size() {
        Some(size) => size,
        None => column.column_type.get_length_bytes() + match value {
            Value::String(s) => s.len(),
            Value::Bytes(b) => b.len(),
            _ => 0,
        },
    }
}

// Byte swap all numeric and temporal fields of the first `count` columns in place
pub fn convert(spec: &Spec, buf: &mut [u8], count: usize, from: Endian, to: Endian) -> Result<()> {
    if from.resolve() == to.resolve() {
        return Ok(());
    }
    let mut fields = Vec::with_capacity(count);
    for (i, column) in Columns::new(spec, buf, count)?.enumerate() {
        let (start, payload) = column?;
        let width = spec.get_column(i).column_type.get_swap_width();
        if payload.is_some() && width > 1 {
            fields.push((start, width));
        }
    }
    for (start, width) in fields {
        buf[start..start + width].reverse();
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
pub struct DataRef<'a> {
    spec: &'a Spec,
    buf: &'a [u8],
    count: usize,
    endian: Endian,
}

impl<'a> DataRef<'a> {
    // Borrow already encoded bytes. The buffer may be longer than the tuple,
    // the tuple length is found by walking the first `count` columns
    pub fn from_buf(spec: &'a Spec, buf: &'a [u8], count: usize, endian: Endian) -> Result<DataRef<'a>> {
        if count > spec.get_count() {
            return Err(IndexStatError::internal(format!("{} components exceed spec of {}", count, spec.get_count())));
        }
        let mut columns = Columns::new(spec, buf, count)?;
        for column in columns.by_ref() {
            column?;
        }
        let len = columns.position();
        Ok(DataRef { spec, buf: &buf[..len], count, endian })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn get_count(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn get_endian(&self) -> Endian {
        self.endian
    }

    #[inline]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.buf
    }

    pub fn spec(&self) -> &'a Spec {
        self.spec
    }

    /*
        Compares the first `count` components (capped by both tuples) in native byte order.
        Returns the ordering and the number of leading components that are equal.
        NULL sorts before every non NULL value.

        Both tuples must be well formed, as checked by from_buf or written by Data.
        A column that fails to decode ends the comparison there.
     */
    pub fn cmp(&self, other: &DataRef, count: usize) -> (Ordering, usize) {
        debug_assert_eq!(self.endian.resolve(), Endian::Native.resolve());
        debug_assert_eq!(other.endian.resolve(), Endian::Native.resolve());
        let count = count.min(self.count).min(other.count);
        let (mut left, mut right) = match (Columns::new(self.spec, self.buf, count), Columns::new(other.spec, other.buf, count)) {
            (Ok(left), Ok(right)) => (left, right),
            _ => {
                debug_assert!(false, "compared tuple shorter than its null mask");
                return (Ordering::Equal, 0);
            }
        };
        let mut num_eq = 0;
        while num_eq < count {
            let (a, b) = match (left.next(), right.next()) {
                (Some(Ok((_, a))), Some(Ok((_, b)))) => (a, b),
                _ => {
                    debug_assert!(false, "compared tuple truncated at column {}", num_eq);
                    break;
                }
            };
            let ord = cmp_column(self.spec.get_column(num_eq), a, b);
            if ord != Ordering::Equal {
                return (ord, num_eq);
            }
            num_eq += 1;
        }
        (Ordering::Equal, num_eq)
    }

    pub fn values(&self) -> Result<Vec<Option<Value>>> {
        let mut values = Vec::with_capacity(self.count);
        for (i, column) in Columns::new(self.spec, self.buf, self.count)?.enumerate() {
            let (_, payload) = column?;
            values.push(match payload {
                Some(bytes) => Some(decode_column(self.spec.get_column(i), bytes, self.endian)?),
                None => None,
            });
        }
        Ok(values)
    }
}

impl<'a> Display for DataRef<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.values() {
            Ok(values) => {
                write!(f, "(")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match value {
                        Some(value) => write!(f, "{}", value)?,
                        None => write!(f, "NULL")?,
                    }
                }
                write!(f, ")")
            }
            Err(_) => write!(f, "0x{}", hex::encode(self.buf)),
        }
    }
}

// Owned packed tuple that components get appended to one by one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Data {
    spec: Arc<Spec>,
    buf: Vec<u8>,
    count: usize,
    nullable_index: usize,
    max_len: usize,
    endian: Endian,
}

impl Data {
    pub fn new(spec: Arc<Spec>, endian: Endian) -> Data {
        let max_len = spec.get_max_data_len();
        Self::with_max_len(spec, endian, max_len)
    }

    pub fn with_max_len(spec: Arc<Spec>, endian: Endian, max_len: usize) -> Data {
        let buf = vec![0u8; spec.get_null_mask_len()];
        Data { spec, buf, count: 0, nullable_index: 0, max_len, endian }
    }

    // Copy already encoded bytes
    pub fn from_bytes(spec: Arc<Spec>, bytes: &[u8], count: usize, endian: Endian) -> Result<Data> {
        let len = DataRef::from_buf(&spec, bytes, count, endian)?.len();
        let nullable_index = spec.columns()[..count].iter().filter(|c| c.nullable).count();
        let max_len = spec.get_max_data_len();
        Ok(Data { spec, buf: bytes[..len].to_vec(), count, nullable_index, max_len, endian })
    }

    pub fn add(&mut self, value: &Value) -> Result<()> {
        let column = self.next_column()?;
        let len = encoded_len(&column, value);
        if self.buf.len() + len > self.max_len {
            return Err(IndexStatError::internal(format!("data overflow: {} + {} > {}", self.buf.len(), len, self.max_len)));
        }
        encode_column(&column, value, self.endian, &mut self.buf)?;
        if column.nullable {
            self.nullable_index += 1;
        }
        self.count += 1;
        Ok(())
    }

    pub fn add_null(&mut self) -> Result<()> {
        let column = self.next_column()?;
        if !column.nullable {
            return Err(IndexStatError::internal(format!("column {} is not nullable", self.count)));
        }
        let mask_len = self.spec.get_null_mask_len();
        BitSlice::<u8, Msb0>::from_slice_mut(&mut self.buf[..mask_len]).set(self.nullable_index, true);
        self.nullable_index += 1;
        self.count += 1;
        Ok(())
    }

    fn next_column(&self) -> Result<ColumnSpec> {
        if self.count >= self.spec.get_count() {
            return Err(IndexStatError::internal(format!("all {} components already added", self.spec.get_count())));
        }
        Ok(*self.spec.get_column(self.count))
    }

    pub fn reset(&mut self) {
        self.buf.clear();
        self.buf.resize(self.spec.get_null_mask_len(), 0);
        self.count = 0;
        self.nullable_index = 0;
    }

    pub fn convert(&mut self, to: Endian) -> Result<()> {
        convert(&self.spec, &mut self.buf, self.count, self.endian, to)?;
        self.endian = to;
        Ok(())
    }

    #[inline]
    pub fn get_data_len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn get_count(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.count == self.spec.get_count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn get_endian(&self) -> Endian {
        self.endian
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn spec(&self) -> &Arc<Spec> {
        &self.spec
    }

    pub fn as_data_ref(&self) -> DataRef<'_> {
        DataRef { spec: &self.spec, buf: &self.buf, count: self.count, endian: self.endian }
    }

    pub fn values(&self) -> Result<Vec<Option<Value>>> {
        self.as_data_ref().values()
    }
}

use std::{cmp::Ordering, fmt::Display};

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    TinyInt,
    SmallInt,
    MediumInt,
    Int,
    BigInt,
    TinyUnsigned,
    SmallUnsigned,
    MediumUnsigned,
    Unsigned,
    BigUnsigned,
    Char(u16),
    VarChar(u16),
    Binary(u16),
    VarBinary(u16),
    Date,
    Time,
    Datetime,
    Timestamp,
    // Stored as an unscaled 64 bit value, so precision is capped at 18
    Decimal { precision: u8, scale: u8 },
}

impl ColumnType {
    pub fn get_fixed_size(&self) -> Option<usize> {
        match self {
            ColumnType::TinyInt | ColumnType::TinyUnsigned => Some(1),
            ColumnType::SmallInt | ColumnType::SmallUnsigned => Some(2),
            ColumnType::MediumInt | ColumnType::MediumUnsigned => Some(3),
            ColumnType::Int | ColumnType::Unsigned => Some(4),
            ColumnType::BigInt | ColumnType::BigUnsigned => Some(8),
            ColumnType::Char(len) | ColumnType::Binary(len) => Some(*len as usize),
            ColumnType::VarChar(_) | ColumnType::VarBinary(_) => None,
            ColumnType::Date | ColumnType::Time => Some(3),
            ColumnType::Datetime => Some(8),
            ColumnType::Timestamp => Some(4),
            ColumnType::Decimal { .. } => Some(8),
        }
    }

    pub fn get_max_size(&self) -> usize {
        match self {
            ColumnType::VarChar(len) | ColumnType::VarBinary(len) => self.get_length_bytes() + *len as usize,
            _ => self.get_fixed_size().unwrap_or(0),
        }
    }

    // Variable sized columns carry a little-endian length prefix of 1 or 2 bytes
    pub fn get_length_bytes(&self) -> usize {
        match self {
            ColumnType::VarChar(len) | ColumnType::VarBinary(len) => if *len < 256 { 1 } else { 2 },
            _ => 0,
        }
    }

    // Width of the field that differs between little-endian storage and native order
    pub fn get_swap_width(&self) -> usize {
        match self {
            ColumnType::Char(_) | ColumnType::VarChar(_)
            | ColumnType::Binary(_) | ColumnType::VarBinary(_) => 0,
            _ => self.get_fixed_size().unwrap_or(0),
        }
    }

    pub fn is_character(&self) -> bool {
        matches!(self, ColumnType::Char(_) | ColumnType::VarChar(_))
    }

    pub fn is_comparable_to_value(&self, value: &Value) -> bool {
        match self {
            ColumnType::TinyInt | ColumnType::SmallInt | ColumnType::MediumInt
            | ColumnType::Int | ColumnType::BigInt => matches!(value, Value::Int(_)),
            ColumnType::TinyUnsigned | ColumnType::SmallUnsigned | ColumnType::MediumUnsigned
            | ColumnType::Unsigned | ColumnType::BigUnsigned => matches!(value, Value::Unsigned(_)),
            ColumnType::Char(_) | ColumnType::VarChar(_) => matches!(value, Value::String(_)),
            ColumnType::Binary(_) | ColumnType::VarBinary(_) => matches!(value, Value::Bytes(_)),
            ColumnType::Date => matches!(value, Value::Date(_)),
            ColumnType::Time => matches!(value, Value::Time(_)),
            ColumnType::Datetime => matches!(value, Value::Datetime(_)),
            ColumnType::Timestamp => matches!(value, Value::Timestamp(_)),
            ColumnType::Decimal { scale, .. } => match value {
                Value::Decimal { scale: value_scale, .. } => value_scale == scale,
                _ => false
            },
        }
    }
}

impl Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnType::TinyInt => write!(f, "TINYINT"),
            ColumnType::SmallInt => write!(f, "SMALLINT"),
            ColumnType::MediumInt => write!(f, "MEDIUMINT"),
            ColumnType::Int => write!(f, "INT"),
            ColumnType::BigInt => write!(f, "BIGINT"),
            ColumnType::TinyUnsigned => write!(f, "TINYINT UNSIGNED"),
            ColumnType::SmallUnsigned => write!(f, "SMALLINT UNSIGNED"),
            ColumnType::MediumUnsigned => write!(f, "MEDIUMINT UNSIGNED"),
            ColumnType::Unsigned => write!(f, "INT UNSIGNED"),
            ColumnType::BigUnsigned => write!(f, "BIGINT UNSIGNED"),
            ColumnType::Char(size) => write!(f, "CHAR({})", size),
            ColumnType::VarChar(size) => write!(f, "VARCHAR({})", size),
            ColumnType::Binary(size) => write!(f, "BINARY({})", size),
            ColumnType::VarBinary(size) => write!(f, "VARBINARY({})", size),
            ColumnType::Date => write!(f, "DATE"),
            ColumnType::Time => write!(f, "TIME"),
            ColumnType::Datetime => write!(f, "DATETIME"),
            ColumnType::Timestamp => write!(f, "TIMESTAMP"),
            ColumnType::Decimal { precision, scale } => write!(f, "DECIMAL({},{})", precision, scale),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collation {
    Binary,
    Utf8Bin,
    Utf8GeneralCi,
}

impl Collation {
    pub fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        match self {
            Collation::Binary => a.cmp(b),
            Collation::Utf8Bin => trim_pad(a).cmp(trim_pad(b)),
            Collation::Utf8GeneralCi => {
                let (a, b) = (trim_pad(a), trim_pad(b));
                match (std::str::from_utf8(a), std::str::from_utf8(b)) {
                    (Ok(a), Ok(b)) => a.chars().flat_map(char::to_lowercase)
                        .cmp(b.chars().flat_map(char::to_lowercase)),
                    // Not valid utf8, nothing better than a byte compare
                    _ => a.cmp(b)
                }
            }
        }
    }
}

// PAD SPACE semantics: trailing blanks never take part in a comparison
fn trim_pad(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|b| *b != b' ').map(|p| p + 1).unwrap_or(0);
    &bytes[..end]
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Int(i64),
    Unsigned(u64),
    String(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    Datetime(NaiveDateTime),
    // Seconds since the unix epoch
    Timestamp(u32),
    Decimal { unscaled: i64, scale: u8 },
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }
}

// Packed date layout: day + month * 32 + year * 512
pub(crate) fn pack_date(date: &NaiveDate) -> u32 {
    date.day() + date.month() * 32 + (date.year() as u32) * 512
}

pub(crate) fn unpack_date(packed: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt((packed / 512) as i32, (packed / 32) % 16, packed % 32)
}

pub(crate) fn pack_time(time: &NaiveTime) -> u32 {
    time.num_seconds_from_midnight()
}

pub(crate) fn unpack_time(packed: u32) -> Option<NaiveTime> {
    NaiveTime::from_num_seconds_from_midnight_opt(packed, 0)
}

// Packed datetime layout: decimal digits YYYYMMDDhhmmss
pub(crate) fn pack_datetime(datetime: &NaiveDateTime) -> u64 {
    let date = datetime.date();
    let time = datetime.time();
    let ymd = date.year() as u64 * 10_000 + date.month() as u64 * 100 + date.day() as u64;
    let hms = time.hour() as u64 * 10_000 + time.minute() as u64 * 100 + time.second() as u64;
    ymd * 1_000_000 + hms
}

pub(crate) fn unpack_datetime(packed: u64) -> Option<NaiveDateTime> {
    let ymd = packed / 1_000_000;
    let hms = packed % 1_000_000;
    let date = NaiveDate::from_ymd_opt((ymd / 10_000) as i32, ((ymd / 100) % 100) as u32, (ymd % 100) as u32)?;
    let time = NaiveTime::from_hms_opt((hms / 10_000) as u32, ((hms / 100) % 100) as u32, (hms % 100) as u32)?;
    Some(NaiveDateTime::new(date, time))
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Unsigned(u) => write!(f, "{}", u),
            Value::String(s) => write!(f, "\"{}\"", s.escape_debug()),
            Value::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Time(t) => write!(f, "{}", t.format("%H:%M:%S")),
            Value::Datetime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            Value::Timestamp(ts) => write!(f, "@{}", ts),
            Value::Decimal { unscaled, scale } => {
                if *scale == 0 {
                    return write!(f, "{}", unscaled);
                }
                let divisor = 10i64.pow(*scale as u32);
                let sign = if *unscaled < 0 { "-" } else { "" };
                let abs = unscaled.unsigned_abs();
                write!(f, "{}{}.{:0width$}", sign, abs / divisor as u64, abs % divisor as u64, width = *scale as usize)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_sizes() {
        assert_eq!(ColumnType::MediumInt.get_fixed_size(), Some(3));
        assert_eq!(ColumnType::Char(10).get_fixed_size(), Some(10));
        assert_eq!(ColumnType::VarChar(10).get_fixed_size(), None);
        assert_eq!(ColumnType::VarChar(10).get_max_size(), 11);
        assert_eq!(ColumnType::VarChar(300).get_max_size(), 302);
        assert_eq!(ColumnType::Decimal { precision: 10, scale: 2 }.get_fixed_size(), Some(8));
    }

    #[test]
    fn test_swap_width() {
        assert_eq!(ColumnType::BigInt.get_swap_width(), 8);
        assert_eq!(ColumnType::Date.get_swap_width(), 3);
        assert_eq!(ColumnType::Char(4).get_swap_width(), 0);
        assert_eq!(ColumnType::VarBinary(4).get_swap_width(), 0);
    }

    #[test]
    fn test_is_comparable_to_value() {
        assert!(ColumnType::Int.is_comparable_to_value(&Value::Int(10)));
        assert!(!ColumnType::Int.is_comparable_to_value(&Value::Unsigned(10)));
        assert!(ColumnType::VarChar(10).is_comparable_to_value(&Value::String("a".to_string())));
        assert!(!ColumnType::Binary(4).is_comparable_to_value(&Value::String("a".to_string())));
        let decimal = ColumnType::Decimal { precision: 10, scale: 2 };
        assert!(decimal.is_comparable_to_value(&Value::Decimal { unscaled: 1050, scale: 2 }));
        assert!(!decimal.is_comparable_to_value(&Value::Decimal { unscaled: 1050, scale: 3 }));
    }

    #[test]
    fn test_collation_compare() {
        assert_eq!(Collation::Binary.compare(b"ab ", b"ab"), Ordering::Greater);
        assert_eq!(Collation::Utf8Bin.compare(b"ab ", b"ab"), Ordering::Equal);
        assert_eq!(Collation::Utf8Bin.compare(b"Ab", b"ab"), Ordering::Less);
        assert_eq!(Collation::Utf8GeneralCi.compare(b"Ab", b"aB  "), Ordering::Equal);
        assert_eq!(Collation::Utf8GeneralCi.compare("Ä".as_bytes(), "ä".as_bytes()), Ordering::Equal);
        assert_eq!(Collation::Utf8GeneralCi.compare(b"abc", b"ABD"), Ordering::Less);
    }

    #[test]
    fn test_temporal_packing_preserves_order() {
        let d1 = NaiveDate::from_ymd_opt(2021, 12, 31).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        assert!(pack_date(&d1) < pack_date(&d2));
        assert_eq!(unpack_date(pack_date(&d2)), Some(d2));

        let dt = NaiveDate::from_ymd_opt(2023, 4, 5).unwrap().and_hms_opt(6, 7, 8).unwrap();
        assert_eq!(pack_datetime(&dt), 20230405060708);
        assert_eq!(unpack_datetime(20230405060708), Some(dt));

        let t = NaiveTime::from_hms_opt(23, 59, 1).unwrap();
        assert_eq!(unpack_time(pack_time(&t)), Some(t));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Decimal { unscaled: -1205, scale: 2 }.to_string(), "-12.05");
        assert_eq!(Value::Decimal { unscaled: 7, scale: 0 }.to_string(), "7");
        assert_eq!(Value::Bytes(vec![0xab, 0x01]).to_string(), "0xab01");
        assert_eq!(Value::String("x\"y".to_string()).to_string(), "\"x\\\"y\"");
    }
}

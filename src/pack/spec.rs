use crate::{error::{IndexStatError, Result}, types::{Collation, ColumnType}};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnSpec {
    pub column_type: ColumnType,
    pub nullable: bool,
    pub collation: Collation,
}

impl ColumnSpec {
    pub fn new(column_type: ColumnType, nullable: bool) -> Self {
        let collation = if column_type.is_character() { Collation::Utf8Bin } else { Collation::Binary };
        Self { column_type, nullable, collation }
    }

    pub fn with_collation(column_type: ColumnType, nullable: bool, collation: Collation) -> Self {
        Self { column_type, nullable, collation }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Spec {
    columns: Vec<ColumnSpec>,
    nullable_count: usize,
}

impl Spec {
    pub fn new(columns: Vec<ColumnSpec>) -> Result<Spec> {
        for (i, column) in columns.iter().enumerate() {
            match column.column_type {
                ColumnType::Decimal { precision, scale } if precision == 0 || precision > 18 || scale > precision => {
                    return Err(IndexStatError::usage(format!("column {}: unsupported {}", i, column.column_type)));
                }
                ColumnType::Char(0) | ColumnType::Binary(0) => {
                    return Err(IndexStatError::usage(format!("column {}: zero width {}", i, column.column_type)));
                }
                _ => {}
            }
            if column.collation != Collation::Binary && !column.column_type.is_character() {
                return Err(IndexStatError::usage(format!("column {}: collation on non character type {}", i, column.column_type)));
            }
        }
        let nullable_count = columns.iter().filter(|c| c.nullable).count();
        Ok(Spec { columns, nullable_count })
    }

    // The value tuple of a sample: rir followed by one unique count per key column
    pub fn value_spec(key_attrs: usize) -> Spec {
        let columns = vec![ColumnSpec::new(ColumnType::Unsigned, false); 1 + key_attrs];
        Spec { columns, nullable_count: 0 }
    }

    #[inline]
    pub fn get_count(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    pub fn get_column(&self, i: usize) -> &ColumnSpec {
        &self.columns[i]
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    #[inline]
    pub fn get_nullable_count(&self) -> usize {
        self.nullable_count
    }

    #[inline]
    pub fn get_null_mask_len(&self) -> usize {
        (self.nullable_count + 7) / 8
    }

    pub fn get_max_data_len(&self) -> usize {
        self.get_null_mask_len() + self.columns.iter().map(|c| c.column_type.get_max_size()).sum::<usize>()
    }
}

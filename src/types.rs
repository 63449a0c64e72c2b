//! Core table types shared by every stage.
//!
//! The pipeline works on one in-memory [`DataSet`]: a [`Schema`] (a list of typed
//! [`Field`]s) plus row-major [`Value`] storage. Stages extend the table by appending
//! columns; nulls are an explicit [`Value::Null`], never a zero or a NaN.

use std::fmt;

use chrono::NaiveDate;

use crate::error::{PipelineError, PipelineResult};

/// Format used for every date cell (ingestion, exports, logs).
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Logical data type for a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point number.
    Float64,
    /// Boolean.
    Bool,
    /// UTF-8 string.
    Utf8,
    /// Calendar date without time zone.
    Date,
}

impl DataType {
    /// Whether values of this type take part in numeric reductions.
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Int64 | Self::Float64)
    }
}

/// A single named, typed field in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field/column name.
    pub name: String,
    /// Field data type.
    pub data_type: DataType,
}

impl Field {
    /// Create a new field.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// A list of fields describing the shape of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    /// Ordered list of fields.
    pub fields: Vec<Field>,
}

impl Schema {
    /// Create a new schema from fields.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Iterate field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Returns the index of a field by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Like [`Schema::index_of`], but a missing field is a [`PipelineError::MissingColumn`].
    pub fn require(&self, name: &str) -> PipelineResult<usize> {
        self.index_of(name).ok_or_else(|| PipelineError::MissingColumn {
            column: name.to_owned(),
        })
    }
}

/// A single typed value in a [`DataSet`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing/empty value.
    Null,
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    Utf8(String),
    /// Calendar date.
    Date(NaiveDate),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric view of the value. Integers widen to `f64`; non-numeric values are `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int64(v) => Some(*v as f64),
            Self::Float64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Utf8(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Wrap an optional float; non-finite values become [`Value::Null`].
    pub fn from_f64(v: Option<f64>) -> Self {
        match v {
            Some(x) if x.is_finite() => Self::Float64(x),
            _ => Self::Null,
        }
    }

    pub fn from_i64(v: Option<i64>) -> Self {
        v.map_or(Self::Null, Self::Int64)
    }
}

impl fmt::Display for Value {
    /// CSV cell rendering: null is the empty string, dates are ISO formatted.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Utf8(s) => f.write_str(s),
            Self::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
        }
    }
}

/// In-memory tabular dataset.
///
/// Rows are stored as `Vec<Vec<Value>>` in the same order as the [`Schema`] fields.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet {
    /// Schema describing row shape.
    pub schema: Schema,
    /// Row-major value storage.
    pub rows: Vec<Vec<Value>>,
}

impl DataSet {
    /// Create a dataset from schema and rows.
    pub fn new(schema: Schema, rows: Vec<Vec<Value>>) -> Self {
        Self { schema, rows }
    }

    /// Number of rows in the dataset.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Create a new dataset containing only rows that match `predicate`.
    ///
    /// The returned dataset preserves the original schema.
    pub fn filter_rows<F>(&self, mut predicate: F) -> Self
    where
        F: FnMut(&[Value]) -> bool,
    {
        let rows = self
            .rows
            .iter()
            .filter(|row| predicate(row.as_slice()))
            .cloned()
            .collect();
        Self {
            schema: self.schema.clone(),
            rows,
        }
    }

    /// Create a new dataset by applying `mapper` to every row.
    ///
    /// The returned dataset preserves the original schema.
    ///
    /// # Panics
    ///
    /// Panics if `mapper` returns a row with a different length than the schema field count.
    pub fn map_rows<F>(&self, mut mapper: F) -> Self
    where
        F: FnMut(&[Value]) -> Vec<Value>,
    {
        let expected_len = self.schema.fields.len();
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let out = mapper(row.as_slice());
                assert!(
                    out.len() == expected_len,
                    "mapped row length {} does not match schema length {}",
                    out.len(),
                    expected_len
                );
                out
            })
            .collect();

        Self {
            schema: self.schema.clone(),
            rows,
        }
    }

    /// Numeric view of one column (`None` for nulls and non-numeric cells).
    pub fn numeric_column(&self, name: &str) -> PipelineResult<Vec<Option<f64>>> {
        let idx = self.schema.require(name)?;
        Ok(self.rows.iter().map(|row| row[idx].as_f64()).collect())
    }

    /// Set a column, appending it when absent and replacing it (type included) otherwise.
    ///
    /// # Panics
    ///
    /// Panics if `values` does not have one entry per row.
    pub fn set_column(&mut self, field: Field, values: Vec<Value>) {
        assert!(
            values.len() == self.rows.len(),
            "column '{}' has {} values for {} rows",
            field.name,
            values.len(),
            self.rows.len()
        );
        match self.schema.index_of(&field.name) {
            Some(idx) => {
                self.schema.fields[idx] = field;
                for (row, v) in self.rows.iter_mut().zip(values) {
                    row[idx] = v;
                }
            }
            None => {
                self.schema.fields.push(field);
                for (row, v) in self.rows.iter_mut().zip(values) {
                    row.push(v);
                }
            }
        }
    }

    /// Project (and reorder) columns by name.
    pub fn select(&self, columns: &[&str]) -> PipelineResult<Self> {
        let idxs = columns
            .iter()
            .map(|c| self.schema.require(c))
            .collect::<PipelineResult<Vec<_>>>()?;
        let schema = Schema::new(idxs.iter().map(|&i| self.schema.fields[i].clone()).collect());
        let rows = self
            .rows
            .iter()
            .map(|row| idxs.iter().map(|&i| row[i].clone()).collect())
            .collect();
        Ok(Self { schema, rows })
    }

    /// Reorder rows so that row `i` of the result is row `order[i]` of `self`.
    pub fn take_rows(&self, order: &[usize]) -> Self {
        Self {
            schema: self.schema.clone(),
            rows: order.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }
}

//! Reduction operations for [`crate::types::DataSet`].

use crate::types::{DataSet, DataType, Value};

/// Built-in reduction operations over a single column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    /// Count all rows (including nulls).
    Count,
    /// Sum numeric values, ignoring nulls.
    Sum,
    /// Minimum numeric value, ignoring nulls.
    Min,
    /// Maximum numeric value, ignoring nulls.
    Max,
}

/// Reduce a column using a built-in [`ReduceOp`].
///
/// - Returns `None` if `column` does not exist in the schema.
/// - For `Sum`/`Min`/`Max`, returns `Some(Value::Null)` if there are no non-null values.
/// - For `Count`, always returns `Some(Value::Int64(row_count))`.
pub fn reduce(dataset: &DataSet, column: &str, op: ReduceOp) -> Option<Value> {
    let all: Vec<usize> = (0..dataset.row_count()).collect();
    reduce_rows(dataset, &all, column, op)
}

/// Like [`reduce`], restricted to the rows at `rows`.
///
/// This is what the aggregate synthesizer uses to sum one date group.
pub fn reduce_rows(dataset: &DataSet, rows: &[usize], column: &str, op: ReduceOp) -> Option<Value> {
    let idx = dataset.schema.index_of(column)?;

    match op {
        ReduceOp::Count => Some(Value::Int64(rows.len() as i64)),
        ReduceOp::Sum | ReduceOp::Min | ReduceOp::Max => match dataset.schema.fields.get(idx) {
            Some(field) => reduce_numeric_typed(dataset, rows, idx, field.data_type, op),
            None => None,
        },
    }
}

fn reduce_numeric_typed(
    dataset: &DataSet,
    rows: &[usize],
    idx: usize,
    data_type: DataType,
    op: ReduceOp,
) -> Option<Value> {
    let cells = rows.iter().filter_map(|&r| dataset.rows.get(r)).map(|row| row.get(idx));
    match data_type {
        DataType::Int64 => {
            let mut acc: Option<i64> = None;
            for cell in cells {
                if let Some(Value::Int64(v)) = cell {
                    acc = Some(match (op, acc) {
                        (ReduceOp::Sum, Some(a)) => a + v,
                        (ReduceOp::Min, Some(a)) => a.min(*v),
                        (ReduceOp::Max, Some(a)) => a.max(*v),
                        (_, None) => *v,
                        (ReduceOp::Count, Some(a)) => a,
                    });
                }
            }
            Some(acc.map(Value::Int64).unwrap_or(Value::Null))
        }
        DataType::Float64 => {
            let mut acc: Option<f64> = None;
            for cell in cells {
                if let Some(Value::Float64(v)) = cell {
                    acc = Some(match (op, acc) {
                        (ReduceOp::Sum, Some(a)) => a + v,
                        (ReduceOp::Min, Some(a)) => a.min(*v),
                        (ReduceOp::Max, Some(a)) => a.max(*v),
                        (_, None) => *v,
                        (ReduceOp::Count, Some(a)) => a,
                    });
                }
            }
            Some(acc.map(Value::Float64).unwrap_or(Value::Null))
        }
        _ => Some(Value::Null),
    }
}

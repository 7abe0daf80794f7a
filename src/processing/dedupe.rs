//! Exact duplicate-row detection.
//!
//! Two rows are duplicates when every column is equal. Nulls equal nulls, `NaN` equals `NaN`,
//! `-0.0` equals `0.0`, and an integral float equals the same integer. The duplicate count is
//! the number of *excess* rows: rows equal to some earlier row.

use std::collections::HashSet;

use crate::types::{DataSet, Value};

#[derive(Debug, PartialEq, Eq, Hash)]
enum KeyCell<'a> {
    Null,
    Int(i64),
    Float(u64),
    Bool(bool),
    Text(&'a str),
}

fn key_cell(v: &Value) -> KeyCell<'_> {
    match v {
        Value::Null => KeyCell::Null,
        Value::Int64(i) => KeyCell::Int(*i),
        Value::Float64(f) if f.is_nan() => KeyCell::Float(f64::NAN.to_bits()),
        Value::Float64(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => KeyCell::Int(*f as i64),
        Value::Float64(f) => KeyCell::Float(f.to_bits()),
        Value::Bool(b) => KeyCell::Bool(*b),
        Value::Utf8(s) => KeyCell::Text(s.as_str()),
    }
}

fn row_key(row: &[Value]) -> Vec<KeyCell<'_>> {
    row.iter().map(key_cell).collect()
}

/// For each row, whether it repeats an earlier row.
pub fn duplicated_mask(table: &DataSet) -> Vec<bool> {
    let mut seen: HashSet<Vec<KeyCell<'_>>> = HashSet::with_capacity(table.row_count());
    table.rows.iter().map(|row| !seen.insert(row_key(row))).collect()
}

/// Number of rows equal to an earlier row.
pub fn duplicate_count(table: &DataSet) -> usize {
    duplicated_mask(table).into_iter().filter(|d| *d).count()
}

/// Keep the first occurrence of each group of identical rows, preserving order.
pub fn drop_duplicates(table: &DataSet) -> DataSet {
    let mask = duplicated_mask(table);
    let mut idx = 0usize;
    table.filter_rows(|_| {
        let keep = !mask[idx];
        idx += 1;
        keep
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: Vec<Vec<Value>>) -> DataSet {
        DataSet::new(vec!["a".to_string(), "b".to_string()], rows)
    }

    #[test]
    fn counts_excess_rows_not_groups() {
        let t = table(vec![
            vec![Value::Int64(1), Value::Null],
            vec![Value::Int64(1), Value::Null],
            vec![Value::Int64(1), Value::Null],
            vec![Value::Int64(2), Value::Null],
        ]);
        assert_eq!(duplicate_count(&t), 2);
        assert_eq!(duplicated_mask(&t), vec![false, true, true, false]);
    }

    #[test]
    fn drop_keeps_first_occurrence_in_order() {
        let t = table(vec![
            vec![Value::Utf8("x".into()), Value::Int64(1)],
            vec![Value::Utf8("y".into()), Value::Int64(2)],
            vec![Value::Utf8("x".into()), Value::Int64(1)],
        ]);
        let out = drop_duplicates(&t);
        assert_eq!(out.row_count(), 2);
        assert_eq!(out.rows, t.rows[..2].to_vec());
        assert_eq!(out.columns, t.columns);
    }

    #[test]
    fn float_edge_cases_compare_equal() {
        let t = table(vec![
            vec![Value::Float64(f64::NAN), Value::Float64(-0.0)],
            vec![Value::Float64(f64::NAN), Value::Float64(0.0)],
            vec![Value::Int64(3), Value::Float64(3.0)],
            vec![Value::Float64(3.0), Value::Int64(3)],
        ]);
        assert_eq!(duplicate_count(&t), 2);
    }

    #[test]
    fn text_and_number_differ() {
        let t = table(vec![
            vec![Value::Utf8("1".into()), Value::Null],
            vec![Value::Int64(1), Value::Null],
        ]);
        assert_eq!(duplicate_count(&t), 0);
        assert_eq!(drop_duplicates(&t).row_count(), 2);
    }
}

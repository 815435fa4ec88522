//! Structural and value equality between tables.

use std::collections::BTreeSet;

use super::{ColumnData, Table};

/// Knobs for table and container equality.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EqualOptions {
    pub col_order: bool,
    pub col_attrs: bool,
    pub tbl_names: bool,
    pub tbl_attrs: bool,
    pub inexact_float: bool,
    pub rel_tol: f64,
    pub abs_tol: f64,
}

impl Default for EqualOptions {
    fn default() -> Self {
        EqualOptions {
            col_order: true,
            col_attrs: true,
            tbl_names: true,
            tbl_attrs: true,
            inexact_float: false,
            rel_tol: 1e-5,
            abs_tol: 1e-8,
        }
    }
}

/// Compare two tables. `Err` carries a description of the first mismatch.
pub fn compare_tables(a: &Table, b: &Table, opts: &EqualOptions) -> Result<(), String> {
    let cols_a: BTreeSet<&str> = a.column_names().collect();
    let cols_b: BTreeSet<&str> = b.column_names().collect();
    if cols_a != cols_b {
        let only_a: Vec<&str> = cols_a.difference(&cols_b).copied().collect();
        if !only_a.is_empty() {
            return Err(format!(
                "Tables are not equal. Some columns only exist in table A: {only_a:?}"
            ));
        }
        let only_b: Vec<&str> = cols_b.difference(&cols_a).copied().collect();
        return Err(format!(
            "Tables are not equal. Some columns only exist in table B: {only_b:?}"
        ));
    }
    if opts.col_order && !a.column_names().eq(b.column_names()) {
        return Err("Tables are not equal. Different column order.".into());
    }
    if a.number_of_rows() != b.number_of_rows() {
        return Err("Tables are not equal. Different number of rows.".into());
    }

    for (name, col_a) in a.columns() {
        // Column sets are equal, so the lookup can't miss.
        let Some(col_b) = b.column(name) else { continue };
        if col_a.dtype().kind() != col_b.dtype().kind() {
            return Err(format!(
                "Tables are not equal. Different column data type for column '{name}'."
            ));
        }
        let rows = col_a.len();
        if (0..rows).any(|i| col_a.is_masked(i) != col_b.is_masked(i)) {
            return Err(format!(
                "Tables are not equal. Different masks for column '{name}'."
            ));
        }
        let first_diff = (0..rows)
            .filter(|&i| !col_a.is_masked(i))
            .find(|&i| !value_eq(col_a.data(), col_b.data(), i, opts));
        if let Some(row) = first_diff {
            return Err(format!(
                "Tables are not equal. Different values in column '{name}' \
                 (first difference at row {row})."
            ));
        }
        if opts.col_attrs && !col_a.attrs().iter().eq(col_b.attrs().iter()) {
            return Err(format!(
                "Tables are not equal. Different attributes for column '{name}'."
            ));
        }
    }

    if opts.tbl_names && a.name() != b.name() {
        return Err("Tables are not equal. Different table names.".into());
    }
    if opts.tbl_attrs && !a.attrs().iter().eq(b.attrs().iter()) {
        return Err("Tables are not equal. Different table attributes.".into());
    }
    Ok(())
}

fn value_eq(a: &ColumnData, b: &ColumnData, i: usize, opts: &EqualOptions) -> bool {
    match (a, b) {
        (ColumnData::Float(x), ColumnData::Float(y)) => {
            let (x, y) = (x[i], y[i]);
            if x.is_nan() || y.is_nan() {
                x.is_nan() && y.is_nan()
            } else if opts.inexact_float {
                (x - y).abs() <= opts.abs_tol + opts.rel_tol * y.abs()
            } else {
                x == y
            }
        }
        (ColumnData::Bool(x), ColumnData::Bool(y)) => x[i] == y[i],
        (ColumnData::Int(x), ColumnData::Int(y)) => x[i] == y[i],
        (ColumnData::Text(x), ColumnData::Text(y)) => x[i] == y[i],
        (ColumnData::Bytes(x), ColumnData::Bytes(y)) => x[i] == y[i],
        (ColumnData::DateTime(x), ColumnData::DateTime(y))
        | (ColumnData::TimeDelta(x), ColumnData::TimeDelta(y)) => x[i] == y[i],
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;

    fn table(values: Vec<f64>) -> Table {
        let mut t = Table::with_name("t");
        t.set_column("x", values).unwrap();
        t
    }

    #[test]
    fn test_nan_equals_nan() {
        let a = table(vec![1.0, f64::NAN]);
        assert!(compare_tables(&a, &a.clone(), &EqualOptions::default()).is_ok());
    }

    #[test]
    fn test_first_difference_reported() {
        let a = table(vec![1.0, 2.0, 3.0]);
        let b = table(vec![1.0, 2.5, 3.5]);
        let msg = compare_tables(&a, &b, &EqualOptions::default()).unwrap_err();
        assert_eq!(
            msg,
            "Tables are not equal. Different values in column 'x' (first difference at row 1)."
        );
    }

    #[test]
    fn test_inexact_float() {
        let a = table(vec![1.0]);
        let b = table(vec![1.0 + 1e-9]);
        assert!(compare_tables(&a, &b, &EqualOptions::default()).is_err());
        let opts = EqualOptions {
            inexact_float: true,
            ..EqualOptions::default()
        };
        assert!(compare_tables(&a, &b, &opts).is_ok());
    }

    #[test]
    fn test_column_order_option() {
        let mut a = Table::new();
        a.set_column("x", vec![1i64]).unwrap();
        a.set_column("y", vec![2i64]).unwrap();
        let mut b = Table::new();
        b.set_column("y", vec![2i64]).unwrap();
        b.set_column("x", vec![1i64]).unwrap();

        assert!(compare_tables(&a, &b, &EqualOptions::default()).is_err());
        let opts = EqualOptions {
            col_order: false,
            ..EqualOptions::default()
        };
        assert!(compare_tables(&a, &b, &opts).is_ok());
    }

    #[test]
    fn test_masked_values_ignored() {
        let mut a = Table::new();
        a.set_column("x", Column::with_mask(vec![1i64, 5], vec![false, true]).unwrap())
            .unwrap();
        let mut b = Table::new();
        b.set_column("x", Column::with_mask(vec![1i64, 9], vec![false, true]).unwrap())
            .unwrap();
        assert!(compare_tables(&a, &b, &EqualOptions::default()).is_ok());
    }

    #[test]
    fn test_only_in_a() {
        let mut a = table(vec![1.0]);
        a.set_column("extra", vec![1i64]).unwrap();
        let msg = compare_tables(&a, &table(vec![1.0]), &EqualOptions::default()).unwrap_err();
        assert!(msg.contains("only exist in table A"));
    }
}

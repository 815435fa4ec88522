//! Table-level hjoin, vjoin and vsplit.

use std::collections::HashMap;

use super::{Fill, HJoinPolicy, VJoinOptions, VSplitOptions};
use crate::error::{AdafError, Result};
use crate::table::{Attributes, Column, ColumnData, DType, Table};

// ── hjoin ─────────────────────────────────────────────────────────

/// Merge every column of `other` into `target`.
pub fn hjoin(target: &mut Table, other: &Table, policy: HJoinPolicy) -> Result<()> {
    let rows = target.number_of_rows();
    let other_rows = other.number_of_rows();
    let row_mismatch = !target.is_empty() && !other.is_empty() && rows != other_rows;
    if row_mismatch && !policy.mask {
        return Err(AdafError::LengthMismatch {
            what: "hjoined table".into(),
            expected: rows,
            actual: other_rows,
        });
    }

    let total = if row_mismatch { rows.max(other_rows) } else { rows };
    if row_mismatch && rows < total {
        let names: Vec<String> = target.column_names().map(str::to_string).collect();
        let mut padded = Table::with_name(target.name());
        padded.set_attrs(target.attrs().clone());
        for name in names {
            let mut column = target.get_column(&name)?.clone();
            column.pad_masked(total - rows)?;
            padded.set_column(&name, column)?;
        }
        *target = padded;
    }

    for (name, column) in other.columns() {
        let mut column = column.clone();
        if row_mismatch {
            column.pad_masked(total - other_rows)?;
        }
        let name = if policy.rename && target.has_column(name) {
            free_name(target, name)
        } else {
            name.to_string()
        };
        target.set_column(&name, column)?;
    }
    target.attrs_mut().update(other.attrs());
    Ok(())
}

fn free_name(table: &Table, name: &str) -> String {
    (1..)
        .map(|n| format!("{name} ({n})"))
        .find(|candidate| !table.has_column(candidate))
        .unwrap_or_else(|| name.to_string())
}

// ── vjoin ─────────────────────────────────────────────────────────

/// Stack the rows of `tables`.
///
/// Each input contributes index values `index - min(index) + offset`, where
/// `index` is its `input_index` column (zeros when absent). The offset then
/// advances by `max - min + 1`, or by `minimum_increment` for an empty
/// input. The generated index is written to `output_index` when the result
/// has columns.
pub fn vjoin(tables: &[&Table], options: &VJoinOptions) -> Result<Table> {
    let mut order: Vec<&str> = Vec::new();
    let mut indices: Vec<i64> = Vec::new();
    let mut offset = 0i64;
    let mut attrs = Attributes::new();

    for table in tables {
        for name in table.column_names() {
            if !order.contains(&name) {
                order.push(name);
            }
        }
        attrs.update(table.attrs());

        let index = input_index(table, options.input_index.as_deref())?;
        offset = match (index.iter().min(), index.iter().max()) {
            (Some(&min), Some(&max)) => {
                for v in &index {
                    indices.push(shifted(*v, min, offset)?);
                }
                shifted(max, min, offset)?
                    .checked_add(1)
                    .ok_or_else(index_overflow)?
            }
            _ => offset
                .checked_add(options.minimum_increment)
                .ok_or_else(index_overflow)?,
        };
    }

    if options.fill == Fill::Intersect {
        let with_columns: Vec<&&Table> = tables.iter().filter(|t| !t.is_empty()).collect();
        order.retain(|name| with_columns.iter().all(|t| t.has_column(name)));
    }
    if let Some(index_name) = options.output_index.as_deref() {
        order.retain(|name| *name != index_name);
    }

    let mut output = Table::new();
    for name in &order {
        let column = stack_column(name, tables, options.fill)?;
        output.set_column(name, column)?;
    }
    if let Some(index_name) = options.output_index.as_deref() {
        if !output.is_empty() {
            output.set_column(index_name, Column::new(indices))?;
        }
    }
    output.set_attrs(attrs);
    Ok(output)
}

fn shifted(value: i64, min: i64, offset: i64) -> Result<i64> {
    value
        .checked_sub(min)
        .and_then(|v| v.checked_add(offset))
        .ok_or_else(index_overflow)
}

fn index_overflow() -> AdafError {
    AdafError::ColumnType("generated index overflows i64".into())
}

fn input_index(table: &Table, name: Option<&str>) -> Result<Vec<i64>> {
    let rows = table.number_of_rows();
    match name.and_then(|n| table.column(n)) {
        Some(column) => (0..rows)
            .map(|i| {
                column.data().index_at(i).ok_or_else(|| {
                    AdafError::ColumnType(format!(
                        "index column must hold integers, got {}",
                        column.dtype().name()
                    ))
                })
            })
            .collect(),
        None => Ok(vec![0; rows]),
    }
}

fn stack_column(name: &str, tables: &[&Table], fill: Fill) -> Result<Column> {
    let present: Vec<&Column> = tables.iter().filter_map(|t| t.column(name)).collect();
    let dtype = stacked_dtype(name, &present)?;

    let mut attrs = Attributes::new();
    let mut data = ColumnData::empty(dtype);
    let mut mask: Vec<bool> = Vec::new();
    for table in tables {
        let rows = table.number_of_rows();
        match table.column(name) {
            Some(column) => {
                data.append(&column.data().cast(dtype)?)?;
                mask.extend((0..rows).map(|i| column.is_masked(i)));
                attrs.update(column.attrs());
            }
            None if fill == Fill::Intersect => {}
            None => {
                data.append(&ColumnData::filler(dtype, rows))?;
                let masked = fill == Fill::Mask || dtype.needs_mask();
                mask.extend(std::iter::repeat(masked).take(rows));
            }
        }
    }
    Ok(Column::with_mask(data, mask)?.with_attrs(attrs))
}

/// Promoted dtype over the inputs holding rows; an input with no rows only
/// decides the dtype when nothing else does.
fn stacked_dtype(name: &str, present: &[&Column]) -> Result<DType> {
    let mut dtype: Option<DType> = None;
    for column in present.iter().filter(|c| !c.is_empty()) {
        dtype = Some(match dtype {
            Some(d) => d.promote(column.dtype()).map_err(|e| {
                AdafError::ColumnType(format!("column '{name}': {e}"))
            })?,
            None => column.dtype(),
        });
    }
    dtype
        .or_else(|| present.last().map(|c| c.dtype()))
        .ok_or_else(|| AdafError::not_found("Column", name))
}

// ── vsplit ────────────────────────────────────────────────────────

/// Split `table` into one table per distinct `input_index` value, in order
/// of first occurrence. Without an index column every row is its own group.
/// The index column itself is not part of the output.
///
/// With `remove_fill`, a column whose slice for a group is entirely filler
/// (NaN, empty text or bytes, masked) is left out of that group. This is
/// lossy: a column that really held only NaN or empty strings is dropped
/// too, since it can't be told apart from filler.
pub fn vsplit(table: &Table, options: &VSplitOptions) -> Result<Vec<(i64, Table)>> {
    let rows = table.number_of_rows();
    let index = options.input_index.as_deref().and_then(|n| table.column(n));

    let mut groups: Vec<(i64, Vec<usize>)> = Vec::new();
    let mut positions: HashMap<i64, usize> = HashMap::new();
    let mut dropped = 0usize;
    for row in 0..rows {
        let key = match index {
            Some(column) => match column.index_at(row) {
                Some(key) => key,
                None if column.is_masked(row) => {
                    dropped += 1;
                    continue;
                }
                None => {
                    return Err(AdafError::ColumnType(format!(
                        "index column must hold integers, got {}",
                        column.dtype().name()
                    )))
                }
            },
            None => row as i64,
        };
        match positions.get(&key) {
            Some(&at) => groups[at].1.push(row),
            None => {
                positions.insert(key, groups.len());
                groups.push((key, vec![row]));
            }
        }
    }
    if dropped > 0 {
        tracing::debug!(dropped, "vsplit skipped rows with masked index");
    }

    let index_name = index.and(options.input_index.as_deref());
    groups
        .into_iter()
        .map(|(key, rows)| {
            let mut part = Table::with_name(table.name());
            part.set_attrs(table.attrs().clone());
            for (name, column) in table.columns() {
                if Some(name) == index_name {
                    continue;
                }
                let slice = column.take(&rows);
                if options.remove_fill && slice.is_all_fill() {
                    continue;
                }
                part.set_column(name, slice)?;
            }
            Ok((key, part))
        })
        .collect()
}

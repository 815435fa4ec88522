//! Columnar table primitive
//!
//! A `Table` is an insertion-ordered set of named, equal-length columns with
//! table-level attributes and a name. Everything above it (scalar tables,
//! rasters, the root table) is built from tables.

pub mod attributes;
pub mod column;
pub mod compare;

use serde::{Deserialize, Serialize};

pub use attributes::{AttrValue, Attributes};
pub use column::{Column, ColumnData, DType, NAT};
pub use compare::EqualOptions;

use crate::error::{AdafError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    name: String,
    columns: Vec<(String, Column)>,
    attrs: Attributes,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Table {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn number_of_rows(&self) -> usize {
        self.columns.first().map_or(0, |(_, c)| c.len())
    }

    pub fn number_of_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.columns.iter().map(|(n, c)| (n.as_str(), c))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.position(name).map(|i| &self.columns[i].1)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.position(name).map(move |i| &mut self.columns[i].1)
    }

    pub fn get_column(&self, name: &str) -> Result<&Column> {
        self.column(name)
            .ok_or_else(|| AdafError::not_found("Column", name))
    }

    pub fn column_type(&self, name: &str) -> Option<DType> {
        self.column(name).map(Column::dtype)
    }

    /// Insert or replace a column. The length must match the other columns.
    pub fn set_column(&mut self, name: &str, column: impl Into<Column>) -> Result<()> {
        let column = column.into();
        let existing = self
            .columns
            .iter()
            .find(|(n, _)| n != name)
            .map(|(_, c)| c.len());
        if let Some(expected) = existing {
            if expected != column.len() {
                return Err(AdafError::LengthMismatch {
                    what: format!("column '{name}'"),
                    expected,
                    actual: column.len(),
                });
            }
        }
        match self.position(name) {
            Some(i) => self.columns[i].1 = column,
            None => self.columns.push((name.to_string(), column)),
        }
        Ok(())
    }

    pub fn remove_column(&mut self, name: &str) -> Option<Column> {
        self.position(name).map(|i| self.columns.remove(i).1)
    }

    pub fn rename_column(&mut self, old: &str, new: &str) -> Result<()> {
        if old == new {
            return self.get_column(old).map(|_| ());
        }
        if self.has_column(new) {
            return Err(AdafError::duplicate("Column", new));
        }
        let i = self
            .position(old)
            .ok_or_else(|| AdafError::not_found("Column", old))?;
        self.columns[i].0 = new.to_string();
        Ok(())
    }

    /// Copy column `source` (default: `name`) of `other` into self as `name`.
    pub fn update_column(&mut self, name: &str, other: &Table, source: Option<&str>) -> Result<()> {
        let column = other.get_column(source.unwrap_or(name))?.clone();
        self.set_column(name, column)
    }

    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    pub fn attrs_mut(&mut self) -> &mut Attributes {
        &mut self.attrs
    }

    pub fn set_attrs(&mut self, attrs: Attributes) {
        self.attrs = attrs;
    }

    /// New table holding `rows` of every column, in that order.
    pub fn take_rows(&self, rows: &[usize]) -> Table {
        Table {
            name: self.name.clone(),
            columns: self
                .columns
                .iter()
                .map(|(n, c)| (n.clone(), c.take(rows)))
                .collect(),
            attrs: self.attrs.clone(),
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|(n, _)| n == name)
    }
}

//! Scalar tables: the `meta` and `res` groups of a container.

use crate::error::{AdafError, Result};
use crate::join::HJoinPolicy;
use crate::table::{Attributes, Column, Table};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScalarTable {
    table: Table,
}

impl ScalarTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_table(table: Table) -> Self {
        ScalarTable { table }
    }

    pub fn as_table(&self) -> &Table {
        &self.table
    }

    pub fn into_table(self) -> Table {
        self.table
    }

    /// Flat copy of the group for viewers.
    pub fn to_table(&self) -> Table {
        self.table.clone()
    }

    pub fn keys(&self) -> Vec<&str> {
        self.table.column_names().collect()
    }

    pub fn number_of_rows(&self) -> usize {
        self.table.number_of_rows()
    }

    pub fn number_of_columns(&self) -> usize {
        self.table.number_of_columns()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn create_column(
        &mut self,
        name: &str,
        data: impl Into<Column>,
        attrs: Attributes,
    ) -> Result<()> {
        if self.table.has_column(name) {
            return Err(AdafError::duplicate("Column", name));
        }
        self.table.set_column(name, data.into().with_attrs(attrs))
    }

    /// Create or replace a column.
    pub fn set_column(&mut self, name: &str, column: impl Into<Column>) -> Result<()> {
        self.table.set_column(name, column)
    }

    pub fn delete_column(&mut self, name: &str) -> Result<Column> {
        self.table
            .remove_column(name)
            .ok_or_else(|| AdafError::not_found("Column", name))
    }

    pub fn rename_column(&mut self, old: &str, new: &str) -> Result<()> {
        self.table.rename_column(old, new)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.table.column(name)
    }

    pub fn get_column(&self, name: &str) -> Result<&Column> {
        self.table.get_column(name)
    }

    pub fn column_attrs(&self, name: &str) -> Result<&Attributes> {
        Ok(self.get_column(name)?.attrs())
    }

    pub fn set_column_attribute(
        &mut self,
        column: &str,
        key: &str,
        value: impl Into<crate::table::AttrValue>,
    ) -> Result<()> {
        self.table
            .column_mut(column)
            .ok_or_else(|| AdafError::not_found("Column", column))?
            .attrs_mut()
            .set(key, value);
        Ok(())
    }

    pub fn attrs(&self) -> &Attributes {
        self.table.attrs()
    }

    pub fn attrs_mut(&mut self) -> &mut Attributes {
        self.table.attrs_mut()
    }

    pub fn hjoin(&mut self, other: &ScalarTable, policy: HJoinPolicy) -> Result<()> {
        crate::join::table::hjoin(&mut self.table, &other.table, policy)
    }

    pub(crate) fn table_mut(&mut self) -> &mut Table {
        &mut self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_rename() {
        let mut meta = ScalarTable::new();
        meta.create_column("speed", vec![1.5f64], [("unit", "m/s")].into_iter().collect())
            .unwrap();
        assert!(meta
            .create_column("speed", vec![2.0f64], Attributes::new())
            .is_err());
        meta.rename_column("speed", "velocity").unwrap();
        assert_eq!(meta.keys(), vec!["velocity"]);
        assert_eq!(
            meta.column_attrs("velocity").unwrap().get_text("unit"),
            Some("m/s")
        );
    }

    #[test]
    fn test_uniform_rows() {
        let mut res = ScalarTable::new();
        res.create_column("a", vec![1i64, 2], Attributes::new()).unwrap();
        assert!(res.create_column("b", vec![1i64], Attributes::new()).is_err());
        res.delete_column("a").unwrap();
        assert!(res.delete_column("a").is_err());
        assert!(res.is_empty());
    }
}

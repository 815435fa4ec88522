//! Raster: one reserved basis column plus equal-length signal columns.

use super::natural::sort_naturally;
use crate::error::{AdafError, Result};
use crate::join::HJoinPolicy;
use crate::table::{AttrValue, Attributes, Column, Table};

/// Reserved column name of the basis inside a raster.
pub const BASIS_NAME: &str = "!ADAF_Basis!";

/// Internal attribute recording the basis column name a raster was built from.
const BASIS_LABEL_ATTR: &str = "__basis_name__";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Raster {
    name: String,
    table: Table,
}

impl Raster {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Raster {
            table: Table::with_name(name.clone()),
            name,
        }
    }

    pub(crate) fn from_stored(name: &str, mut table: Table) -> Self {
        table.set_name(name);
        Raster {
            name: name.to_string(),
            table,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
        self.table.set_name(name);
    }

    pub(crate) fn table(&self) -> &Table {
        &self.table
    }

    pub fn number_of_rows(&self) -> usize {
        self.table.number_of_rows()
    }

    /// Number of signals, not counting the basis.
    pub fn number_of_columns(&self) -> usize {
        self.table.number_of_columns() - usize::from(self.has_basis())
    }

    pub fn attrs(&self) -> &Attributes {
        self.table.attrs()
    }

    pub fn attrs_mut(&mut self) -> &mut Attributes {
        self.table.attrs_mut()
    }

    pub fn has_basis(&self) -> bool {
        self.table.has_column(BASIS_NAME)
    }

    pub fn basis(&self) -> Option<&Column> {
        self.table.column(BASIS_NAME)
    }

    pub fn basis_column(&self) -> Result<&Column> {
        self.basis()
            .ok_or_else(|| AdafError::MissingBasis(self.name.clone()))
    }

    /// Name of the table column the basis was taken from, if known.
    pub fn basis_label(&self) -> Option<&str> {
        self.table.attrs().get_text(BASIS_LABEL_ATTR)
    }

    pub(crate) fn clear_basis_label(&mut self) {
        self.table.attrs_mut().remove(BASIS_LABEL_ATTR);
    }

    pub fn create_basis(&mut self, data: impl Into<Column>, attrs: Attributes) -> Result<()> {
        let column = with_checked_attrs(data.into(), attrs)?;
        self.check_length("basis", BASIS_NAME, column.len())?;
        self.table.set_column(BASIS_NAME, column)
    }

    /// Replace the basis. Same rules as [`Raster::create_basis`].
    pub fn update_basis(&mut self, data: impl Into<Column>, attrs: Attributes) -> Result<()> {
        self.create_basis(data, attrs)
    }

    pub fn create_signal(
        &mut self,
        name: &str,
        data: impl Into<Column>,
        attrs: Attributes,
    ) -> Result<()> {
        if name == BASIS_NAME {
            return Err(AdafError::ReservedName(name.to_string()));
        }
        if self.table.has_column(name) {
            return Err(AdafError::duplicate("Signal", name));
        }
        self.update_signal(name, data, attrs)
    }

    /// Create or replace a signal.
    pub fn update_signal(
        &mut self,
        name: &str,
        data: impl Into<Column>,
        attrs: Attributes,
    ) -> Result<()> {
        if name == BASIS_NAME {
            return Err(AdafError::ReservedName(name.to_string()));
        }
        let column = with_checked_attrs(data.into(), attrs)?;
        self.check_length(&format!("signal '{name}'"), name, column.len())?;
        self.table.set_column(name, column)
    }

    pub fn delete_signal(&mut self, name: &str) -> Result<Column> {
        if name == BASIS_NAME {
            return Err(AdafError::ReservedName(name.to_string()));
        }
        self.table
            .remove_column(name)
            .ok_or_else(|| AdafError::not_found("Signal", name))
    }

    pub fn signal(&self, name: &str) -> Result<Timeseries<'_>> {
        if name == BASIS_NAME {
            return Err(AdafError::ReservedName(name.to_string()));
        }
        let (name, column) = self
            .table
            .columns()
            .find(|(n, _)| *n == name)
            .ok_or_else(|| AdafError::not_found("Signal", name))?;
        Ok(Timeseries {
            name,
            raster: self,
            column,
        })
    }

    /// Signal names in natural order.
    pub fn signal_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .table
            .column_names()
            .filter(|n| *n != BASIS_NAME)
            .collect();
        sort_naturally(&mut names);
        names
    }

    pub fn signals(&self) -> impl Iterator<Item = Timeseries<'_>> {
        self.signal_names()
            .into_iter()
            .filter_map(move |name| self.signal(name).ok())
    }

    /// Flatten into a plain table; the basis is included when `basis_name`
    /// is given and the raster has one.
    pub fn to_table(&self, basis_name: Option<&str>) -> Result<Table> {
        let mut table = Table::with_name(self.name.clone());
        if let (Some(label), Some(basis)) = (basis_name, self.basis()) {
            if self.table.has_column(label) {
                return Err(AdafError::duplicate("Column", label));
            }
            table.set_column(label, basis.clone())?;
        }
        for name in self.signal_names() {
            table.update_column(name, &self.table, None)?;
        }
        table.set_attrs(self.table.attrs().clone());
        Ok(table)
    }

    /// Build a raster from a flat table, taking `basis_name` as the basis.
    pub fn from_table(name: &str, table: &Table, basis_name: Option<&str>) -> Result<Raster> {
        let mut raster = Raster::new(name);
        if let Some(label) = basis_name {
            let basis = table.get_column(label)?.clone();
            raster.table.set_column(BASIS_NAME, basis)?;
        }
        for (column_name, column) in table.columns() {
            if Some(column_name) == basis_name {
                continue;
            }
            if column_name == BASIS_NAME {
                return Err(AdafError::ReservedName(column_name.to_string()));
            }
            raster.table.set_column(column_name, column.clone())?;
        }
        raster.table.set_attrs(table.attrs().clone());
        if let Some(label) = basis_name {
            raster.table.attrs_mut().set(BASIS_LABEL_ATTR, label);
        }
        Ok(raster)
    }

    /// Merge the signals of `other` into self. A missing basis is taken from
    /// `other`; an existing basis is kept.
    pub fn hjoin(&mut self, other: &Raster, policy: HJoinPolicy) -> Result<()> {
        let mut incoming = other.table.clone();
        if self.has_basis() {
            incoming.remove_column(BASIS_NAME);
        }
        crate::join::table::hjoin(&mut self.table, &incoming, policy)
    }

    /// The column being replaced doesn't constrain its own new length.
    fn check_length(&self, what: &str, replacing: &str, actual: usize) -> Result<()> {
        let existing = self
            .table
            .columns()
            .find(|(n, _)| *n != replacing)
            .map(|(_, c)| c.len());
        if let Some(expected) = existing {
            if expected != actual {
                return Err(AdafError::LengthMismatch {
                    what: what.to_string(),
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }
}

fn with_checked_attrs(column: Column, attrs: Attributes) -> Result<Column> {
    for key in ["unit", "description"] {
        match attrs.get(key) {
            None | Some(AttrValue::Text(_)) => {}
            Some(other) => {
                return Err(AdafError::InvalidAttribute(format!(
                    "'{key}' must be a string, got {other}"
                )))
            }
        }
    }
    Ok(column.with_attrs(attrs))
}

/// Borrowed view of one signal together with its raster's basis.
#[derive(Debug, Clone, Copy)]
pub struct Timeseries<'a> {
    name: &'a str,
    raster: &'a Raster,
    column: &'a Column,
}

impl<'a> Timeseries<'a> {
    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn raster_name(&self) -> &'a str {
        self.raster.name()
    }

    pub fn y(&self) -> &'a Column {
        self.column
    }

    pub fn t(&self) -> Option<&'a Column> {
        self.raster.basis()
    }

    pub fn unit(&self) -> &'a str {
        self.column.attrs().get_text("unit").unwrap_or("")
    }

    pub fn description(&self) -> &'a str {
        self.column.attrs().get_text("description").unwrap_or("")
    }

    pub fn attrs(&self) -> &'a Attributes {
        self.column.attrs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ColumnData;

    fn unit(u: &str) -> Attributes {
        [("unit", u)].into_iter().collect()
    }

    fn sample() -> Raster {
        let mut r = Raster::new("r0");
        r.create_basis(vec![0.01f64, 0.02, 0.03], unit("s")).unwrap();
        r.create_signal("Amount", vec![1i64, 2, 3], Attributes::new())
            .unwrap();
        r
    }

    #[test]
    fn test_reserved_signal_name_rejected_before_write() {
        let mut r = sample();
        let err = r
            .create_signal(BASIS_NAME, vec![9.0f64, 9.0, 9.0], Attributes::new())
            .unwrap_err();
        assert!(matches!(err, AdafError::ReservedName(_)));
        assert_eq!(
            r.basis().unwrap().data(),
            &ColumnData::Float(vec![0.01, 0.02, 0.03])
        );
        assert_eq!(r.number_of_columns(), 1);
    }

    #[test]
    fn test_length_mismatch() {
        let mut r = sample();
        assert!(r
            .create_signal("short", vec![1i64], Attributes::new())
            .is_err());
        assert!(r.create_basis(vec![1.0f64], Attributes::new()).is_err());
        assert!(!r.signal_names().contains(&"short"));
    }

    #[test]
    fn test_basis_created_after_signals() {
        let mut r = Raster::new("r");
        r.create_signal("a", vec![1i64, 2], Attributes::new()).unwrap();
        assert!(r.create_basis(vec![1.0f64, 2.0, 3.0], Attributes::new()).is_err());
        r.create_basis(vec![1.0f64, 2.0], Attributes::new()).unwrap();
        assert_eq!(r.number_of_rows(), 2);
    }

    #[test]
    fn test_lone_basis_replaced_with_new_length() {
        let mut r = Raster::new("r");
        r.create_basis(vec![1.0f64, 2.0], Attributes::new()).unwrap();
        r.update_basis(vec![1.0f64, 2.0, 3.0], unit("s")).unwrap();
        assert_eq!(r.number_of_rows(), 3);
        assert_eq!(r.basis().unwrap().attrs().get_text("unit"), Some("s"));

        r.create_signal("y", vec![0i64; 3], Attributes::new()).unwrap();
        assert!(r.update_basis(vec![1.0f64], Attributes::new()).is_err());
    }

    #[test]
    fn test_lone_signal_replaced_with_new_length() {
        let mut r = Raster::new("r");
        r.create_signal("y", vec![1i64], Attributes::new()).unwrap();
        r.update_signal("y", vec![1i64, 2], Attributes::new()).unwrap();
        assert_eq!(r.number_of_rows(), 2);
    }

    #[test]
    fn test_duplicate_signal() {
        let mut r = sample();
        let err = r
            .create_signal("Amount", vec![1i64, 2, 3], Attributes::new())
            .unwrap_err();
        assert_eq!(err.code(), "DUPLICATE_NAME");
        r.update_signal("Amount", vec![4i64, 5, 6], Attributes::new())
            .unwrap();
    }

    #[test]
    fn test_unit_must_be_string() {
        let mut r = Raster::new("r");
        let mut attrs = Attributes::new();
        attrs.set("unit", 3i64);
        let err = r.create_signal("a", vec![1i64], attrs).unwrap_err();
        assert_eq!(err.code(), "INVALID_ATTRIBUTE");
    }

    #[test]
    fn test_signal_view() {
        let r = sample();
        let ts = r.signal("Amount").unwrap();
        assert_eq!(ts.name(), "Amount");
        assert_eq!(ts.y().len(), 3);
        assert_eq!(ts.t().unwrap().attrs().get_text("unit"), Some("s"));
        assert_eq!(ts.unit(), "");
    }

    #[test]
    fn test_signal_names_natural() {
        let mut r = Raster::new("r");
        for name in ["sig2", "sig10", "sig1"] {
            r.create_signal(name, vec![0i64], Attributes::new()).unwrap();
        }
        assert_eq!(r.signal_names(), vec!["sig1", "sig2", "sig10"]);
    }

    #[test]
    fn test_table_roundtrip_with_basis_label() {
        let r = sample();
        let table = r.to_table(Some("time")).unwrap();
        assert_eq!(table.column_names().collect::<Vec<_>>(), vec!["time", "Amount"]);

        let back = Raster::from_table("r0", &table, Some("time")).unwrap();
        assert_eq!(back.basis_label(), Some("time"));
        assert_eq!(back.basis(), r.basis());
        assert!(r.to_table(None).unwrap().column("time").is_none());
    }

    #[test]
    fn test_hjoin_keeps_own_basis() {
        let mut a = sample();
        let mut b = Raster::new("other");
        b.create_basis(vec![5.0f64, 6.0, 7.0], Attributes::new()).unwrap();
        b.create_signal("Extra", vec![true, false, true], Attributes::new())
            .unwrap();
        a.hjoin(&b, HJoinPolicy::default()).unwrap();
        assert_eq!(a.signal_names(), vec!["Amount", "Extra"]);
        assert_eq!(a.basis().unwrap().attrs().get_text("unit"), Some("s"));
    }
}

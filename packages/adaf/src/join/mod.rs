//! Join engine: horizontal merge, vertical stacking and splitting
//!
//! Table-level algorithms live in [`table`]; [`container`] lifts them to
//! whole containers, including reference-time alignment of rasters. The
//! [`Stack`] and [`Split`] traits give every joinable structure the same
//! entry points, each with its own options type.

pub mod container;
pub mod table;

use crate::error::Result;
use crate::model::{Raster, ScalarTable};
use crate::table::Table;

/// How vjoin treats columns missing from some inputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Fill {
    /// Union of columns; missing rows get the dtype's missing value
    /// (NaN, empty string or bytes, NaT) or a masked zero for int and bool.
    #[default]
    Fill,
    /// Only columns present in every input that has columns.
    Intersect,
    /// Union of columns; missing rows are masked.
    Mask,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VJoinOptions {
    pub input_index: Option<String>,
    pub output_index: Option<String>,
    pub fill: Fill,
    /// Index increment reserved for each zero-row input.
    pub minimum_increment: i64,
}

impl Default for VJoinOptions {
    fn default() -> Self {
        VJoinOptions {
            input_index: None,
            output_index: None,
            fill: Fill::Fill,
            minimum_increment: 1,
        }
    }
}

impl VJoinOptions {
    /// Read and write the same index column, as used for round trips.
    pub fn indexed(index: &str) -> Self {
        VJoinOptions {
            input_index: Some(index.to_string()),
            output_index: Some(index.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VSplitOptions {
    pub input_index: Option<String>,
    /// Drop columns that are nothing but filler within a group.
    pub remove_fill: bool,
}

/// Column collision handling for hjoin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HJoinPolicy {
    /// Allow different row counts by padding the shorter side with masked rows.
    pub mask: bool,
    /// Rename colliding columns to `name (1)`, `name (2)`, ... instead of
    /// overwriting.
    pub rename: bool,
}

/// Structures that can be stacked row-wise.
pub trait Stack: Sized {
    type Options;
    type Output;

    fn vjoin(inputs: &[&Self], options: &Self::Options) -> Result<Self::Output>;
}

/// Structures that can be split by an index column.
pub trait Split: Sized {
    type Options;

    fn vsplit(&self, options: &Self::Options) -> Result<Vec<(i64, Self)>>;
}

impl Stack for Table {
    type Options = VJoinOptions;
    type Output = Table;

    fn vjoin(inputs: &[&Table], options: &VJoinOptions) -> Result<Table> {
        table::vjoin(inputs, options)
    }
}

impl Split for Table {
    type Options = VSplitOptions;

    fn vsplit(&self, options: &VSplitOptions) -> Result<Vec<(i64, Table)>> {
        table::vsplit(self, options)
    }
}

impl Stack for ScalarTable {
    type Options = VJoinOptions;
    type Output = ScalarTable;

    fn vjoin(inputs: &[&ScalarTable], options: &VJoinOptions) -> Result<ScalarTable> {
        let tables: Vec<&Table> = inputs.iter().map(|s| s.as_table()).collect();
        Ok(ScalarTable::from_table(table::vjoin(&tables, options)?))
    }
}

impl Split for ScalarTable {
    type Options = VSplitOptions;

    fn vsplit(&self, options: &VSplitOptions) -> Result<Vec<(i64, ScalarTable)>> {
        Ok(table::vsplit(self.as_table(), options)?
            .into_iter()
            .map(|(key, t)| (key, ScalarTable::from_table(t)))
            .collect())
    }
}

/// Rasters stack through their flat table form with the basis kept under a
/// temporary column name.
impl Stack for Raster {
    type Options = VJoinOptions;
    type Output = Raster;

    fn vjoin(inputs: &[&Raster], options: &VJoinOptions) -> Result<Raster> {
        let name = inputs.first().map_or("", |r| r.name());
        let tables = inputs
            .iter()
            .map(|r| r.to_table(Some(container::TEMP_BASIS)))
            .collect::<Result<Vec<_>>>()?;
        let refs: Vec<&Table> = tables.iter().collect();
        let joined = table::vjoin(&refs, options)?;
        let basis = joined.has_column(container::TEMP_BASIS).then_some(container::TEMP_BASIS);
        let mut raster = Raster::from_table(name, &joined, basis)?;
        raster.clear_basis_label();
        Ok(raster)
    }
}

impl Split for Raster {
    type Options = VSplitOptions;

    fn vsplit(&self, options: &VSplitOptions) -> Result<Vec<(i64, Raster)>> {
        let flat = self.to_table(Some(container::TEMP_BASIS))?;
        table::vsplit(&flat, options)?
            .into_iter()
            .map(|(key, t)| {
                let basis = t.has_column(container::TEMP_BASIS).then_some(container::TEMP_BASIS);
                let mut raster = Raster::from_table(self.name(), &t, basis)?;
                raster.clear_basis_label();
                Ok((key, raster))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Attributes, ColumnData};

    fn raster(basis: Vec<f64>, amount: Vec<i64>) -> Raster {
        let mut r = Raster::new("r");
        r.create_basis(basis, Attributes::new()).unwrap();
        r.create_signal("Amount", amount, Attributes::new()).unwrap();
        r
    }

    #[test]
    fn test_raster_stack_and_split() {
        let a = raster(vec![0.01, 0.02, 0.03], vec![1, 2, 3]);
        let b = raster(vec![0.5], vec![9]);
        let joined = Raster::vjoin(&[&a, &b], &VJoinOptions::indexed("idx")).unwrap();

        assert_eq!(joined.number_of_rows(), 4);
        assert_eq!(joined.basis().unwrap().len(), 4);
        assert_eq!(joined.basis_label(), None);
        assert_eq!(
            joined.signal("idx").unwrap().y().data(),
            &ColumnData::Int(vec![0, 0, 0, 1])
        );

        let parts = joined
            .vsplit(&VSplitOptions {
                input_index: Some("idx".into()),
                remove_fill: true,
            })
            .unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].1.basis(), a.basis());
        assert_eq!(parts[1].1.signal_names(), vec!["Amount"]);
    }

    #[test]
    fn test_scalar_stack() {
        let mut a = ScalarTable::new();
        a.create_column("x", vec![1i64], Attributes::new()).unwrap();
        let mut b = ScalarTable::new();
        b.create_column("y", vec![2.0f64], Attributes::new()).unwrap();

        let joined = ScalarTable::vjoin(&[&a, &b], &VJoinOptions::default()).unwrap();
        assert_eq!(joined.keys(), vec!["x", "y"]);
        assert_eq!(joined.number_of_rows(), 2);
    }
}

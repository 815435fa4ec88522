//! Structural index: a payload-free summary of a container
//!
//! The index mirrors the container shape (column names, dtypes, shapes and,
//! depending on the [`IndexLimit`], attributes) so `info()` and `names()`
//! can be answered without decoding raster payloads. A compressed copy is
//! stored in the root table on every `sync()`; see [`codec`].

pub mod codec;
pub mod info;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use info::{ContainerInfo, GroupInfo, RasterInfo};

use crate::model::Raster;
use crate::table::{Column, Table};

/// Which attribute dumps to include under `sys`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexLimit {
    pub system_attrs: bool,
    pub raster_attrs: bool,
    pub signal_attrs: bool,
}

impl IndexLimit {
    pub fn full() -> Self {
        IndexLimit {
            system_attrs: true,
            raster_attrs: true,
            signal_attrs: true,
        }
    }

    /// The limit used for the copy persisted by `sync()`.
    pub fn persisted() -> Self {
        IndexLimit {
            system_attrs: false,
            raster_attrs: false,
            signal_attrs: false,
        }
    }
}

impl Default for IndexLimit {
    fn default() -> Self {
        Self::persisted()
    }
}

type AttrDump = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnIndex {
    pub name: String,
    pub dtype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<AttrDump>,
}

impl ColumnIndex {
    fn of(name: &str, column: &Column, with_attrs: bool) -> Self {
        ColumnIndex {
            name: name.to_string(),
            dtype: column.dtype().name().to_string(),
            attrs: with_attrs.then(|| column.attrs().stringified()),
        }
    }

    fn limited(&self, with_attrs: bool) -> Self {
        ColumnIndex {
            attrs: if with_attrs { self.attrs.clone() } else { None },
            ..self.clone()
        }
    }
}

/// Index of a meta or res group. Shape is `[rows, columns]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupIndex {
    pub columns: Vec<ColumnIndex>,
    pub shape: [usize; 2],
}

impl GroupIndex {
    pub fn of(table: &Table) -> Self {
        GroupIndex {
            columns: table
                .columns()
                .map(|(name, column)| ColumnIndex::of(name, column, true))
                .collect(),
            shape: [table.number_of_rows(), table.number_of_columns()],
        }
    }
}

/// Index of a raster. Shape is `[rows, signals]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RasterIndex {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<AttrDump>,
    pub basis: Option<ColumnIndex>,
    pub signals: Vec<ColumnIndex>,
    pub shape: [usize; 2],
}

impl RasterIndex {
    pub fn of(raster: &Raster, limit: &IndexLimit) -> Self {
        RasterIndex {
            attrs: limit.raster_attrs.then(|| raster.attrs().stringified()),
            basis: raster
                .basis()
                .map(|b| ColumnIndex::of(crate::model::BASIS_NAME, b, limit.signal_attrs)),
            signals: raster
                .signals()
                .map(|ts| ColumnIndex::of(ts.name(), ts.y(), limit.signal_attrs))
                .collect(),
            shape: [raster.number_of_rows(), raster.number_of_columns()],
        }
    }

    /// True when this summary carries everything `limit` asks for.
    pub fn satisfies(&self, limit: &IndexLimit) -> bool {
        let columns_ok = !limit.signal_attrs
            || self
                .basis
                .iter()
                .chain(&self.signals)
                .all(|c| c.attrs.is_some());
        columns_ok && (!limit.raster_attrs || self.attrs.is_some())
    }

    /// Copy with the parts `limit` leaves out removed.
    pub fn limited(&self, limit: &IndexLimit) -> Self {
        RasterIndex {
            attrs: if limit.raster_attrs { self.attrs.clone() } else { None },
            basis: self.basis.as_ref().map(|b| b.limited(limit.signal_attrs)),
            signals: self
                .signals
                .iter()
                .map(|s| s.limited(limit.signal_attrs))
                .collect(),
            shape: self.shape,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemIndex {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<AttrDump>,
    pub rasters: BTreeMap<String, RasterIndex>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuralIndex {
    pub version: String,
    pub meta: GroupIndex,
    pub res: GroupIndex,
    pub sys: BTreeMap<String, SystemIndex>,
}

impl StructuralIndex {
    pub fn raster(&self, system: &str, raster: &str) -> Option<&RasterIndex> {
        self.sys.get(system).and_then(|s| s.rasters.get(raster))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Attributes;

    fn raster() -> Raster {
        let mut r = Raster::new("r");
        r.create_basis(vec![0.0f64, 1.0], [("unit", "s")].into_iter().collect())
            .unwrap();
        r.create_signal("v", vec![1i64, 2], [("unit", "V")].into_iter().collect())
            .unwrap();
        r.attrs_mut().set("reference_time", "2020-01-01T00:00:00");
        r
    }

    #[test]
    fn test_raster_index_full_and_persisted() {
        let r = raster();
        let full = RasterIndex::of(&r, &IndexLimit::full());
        assert_eq!(full.shape, [2, 1]);
        assert_eq!(full.basis.as_ref().unwrap().dtype, "float64");
        assert!(full.satisfies(&IndexLimit::full()));

        let persisted = RasterIndex::of(&r, &IndexLimit::persisted());
        assert!(persisted.attrs.is_none());
        assert!(!persisted.satisfies(&IndexLimit::full()));
        assert!(persisted.satisfies(&IndexLimit::persisted()));
        assert_eq!(full.limited(&IndexLimit::persisted()), persisted);
    }

    #[test]
    fn test_group_index() {
        let mut t = Table::new();
        t.set_column("a", Column::new(vec!["x"]).with_attrs(Attributes::new()))
            .unwrap();
        let g = GroupIndex::of(&t);
        assert_eq!(g.shape, [1, 1]);
        assert_eq!(g.columns[0].dtype, "str");
    }
}

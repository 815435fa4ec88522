//! Name listings for tooling: column, signal and raster names with optional
//! type, access path and access expression.
//!
//! Listings are answered from the structural index, so stored rasters are
//! only decoded when the cached index can't describe them.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use super::container::DataContainer;
use super::natural::sort_naturally;
use crate::error::Result;
use crate::index::{ColumnIndex, IndexLimit};
use crate::table::DType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    /// Meta and res columns, raster signals and each raster basis as `t`.
    Columns,
    /// Sorted unique signal names over all rasters.
    Signals,
    /// Sorted `system/raster` names.
    Rasters,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameField {
    Name,
    Type,
    Path,
    Expr,
}

/// One step of an access path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PathSegment {
    Attr(String),
    Item(String),
    Call,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum NameValue {
    Name(String),
    Type(DType),
    Path(Vec<PathSegment>),
    Expr(String),
    /// Field not available for the requested kind.
    Missing,
}

impl fmt::Display for NameValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameValue::Name(s) | NameValue::Expr(s) => f.write_str(s),
            NameValue::Type(dtype) => f.write_str(dtype.name()),
            NameValue::Path(segments) => {
                for segment in segments {
                    match segment {
                        PathSegment::Attr(a) => write!(f, ".{a}")?,
                        PathSegment::Item(i) => write!(f, "[{}]", quote(i))?,
                        PathSegment::Call => f.write_str("()")?,
                    }
                }
                Ok(())
            }
            NameValue::Missing => Ok(()),
        }
    }
}

/// A single field gives a flat list; several fields give one tuple per item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Names {
    Flat(Vec<NameValue>),
    Tuples(Vec<Vec<NameValue>>),
}

impl Names {
    pub fn len(&self) -> usize {
        match self {
            Names::Flat(v) => v.len(),
            Names::Tuples(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything known about one listed name.
struct Entry {
    name: String,
    dtype: Option<DType>,
    path: Vec<PathSegment>,
}

impl Entry {
    fn scalar(group: &str, column: &ColumnIndex) -> Self {
        Entry {
            name: column.name.clone(),
            dtype: DType::from_name(&column.dtype),
            path: vec![
                PathSegment::Attr(group.to_string()),
                PathSegment::Item(column.name.clone()),
                PathSegment::Attr("value".into()),
                PathSegment::Call,
            ],
        }
    }

    fn signal(system: &str, raster: &str, column: &ColumnIndex) -> Self {
        Entry {
            name: column.name.clone(),
            dtype: DType::from_name(&column.dtype),
            path: vec![
                PathSegment::Attr("sys".into()),
                PathSegment::Item(system.to_string()),
                PathSegment::Item(raster.to_string()),
                PathSegment::Item(column.name.clone()),
                PathSegment::Attr("y".into()),
            ],
        }
    }

    fn basis(system: &str, raster: &str, column: &ColumnIndex) -> Self {
        Entry {
            name: "t".into(),
            dtype: DType::from_name(&column.dtype),
            path: vec![
                PathSegment::Attr("sys".into()),
                PathSegment::Item(system.to_string()),
                PathSegment::Item(raster.to_string()),
                PathSegment::Attr("t".into()),
            ],
        }
    }

    fn named(name: String) -> Self {
        Entry {
            name,
            dtype: None,
            path: Vec::new(),
        }
    }

    fn field(&self, field: NameField) -> NameValue {
        match field {
            NameField::Name => NameValue::Name(self.name.clone()),
            NameField::Type => self.dtype.map_or(NameValue::Missing, NameValue::Type),
            NameField::Path if !self.path.is_empty() => NameValue::Path(self.path.clone()),
            NameField::Expr if !self.path.is_empty() => {
                NameValue::Expr(NameValue::Path(self.path.clone()).to_string())
            }
            NameField::Path | NameField::Expr => NameValue::Missing,
        }
    }
}

impl DataContainer {
    /// List names of `kind`. An empty `fields` slice means `[Name]`.
    pub fn names(&self, kind: NameKind, fields: &[NameField]) -> Result<Names> {
        let index = self.index(Some(&IndexLimit::persisted()))?;
        let mut entries = Vec::new();
        match kind {
            NameKind::Columns => {
                for (group, gindex) in [("meta", &index.meta), ("res", &index.res)] {
                    entries.extend(gindex.columns.iter().map(|c| Entry::scalar(group, c)));
                }
                for system in self.sys.keys() {
                    let Some(sindex) = index.sys.get(system) else { continue };
                    let mut rasters: Vec<&str> = sindex.rasters.keys().map(String::as_str).collect();
                    sort_naturally(&mut rasters);
                    for raster in rasters {
                        let rindex = &sindex.rasters[raster];
                        entries.extend(
                            rindex
                                .signals
                                .iter()
                                .map(|c| Entry::signal(system, raster, c)),
                        );
                        if let Some(basis) = &rindex.basis {
                            entries.push(Entry::basis(system, raster, basis));
                        }
                    }
                }
            }
            NameKind::Signals => {
                let unique: BTreeSet<&str> = index
                    .sys
                    .values()
                    .flat_map(|s| s.rasters.values())
                    .flat_map(|r| r.signals.iter().map(|c| c.name.as_str()))
                    .collect();
                entries.extend(unique.into_iter().map(|n| Entry::named(n.to_string())));
            }
            NameKind::Rasters => {
                for (system, sindex) in &index.sys {
                    entries.extend(
                        sindex
                            .rasters
                            .keys()
                            .map(|raster| Entry::named(format!("{system}/{raster}"))),
                    );
                }
            }
        }

        let fields = if fields.is_empty() { &[NameField::Name][..] } else { fields };
        Ok(match fields {
            [single] => Names::Flat(entries.iter().map(|e| e.field(*single)).collect()),
            _ => Names::Tuples(
                entries
                    .iter()
                    .map(|e| fields.iter().map(|f| e.field(*f)).collect())
                    .collect(),
            ),
        })
    }
}

fn quote(name: &str) -> String {
    format!("'{}'", name.replace('\\', "\\\\").replace('\'', "\\'"))
}

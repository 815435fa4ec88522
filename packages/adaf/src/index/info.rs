//! Display-oriented summary derived from the structural index.

use std::collections::BTreeMap;

use serde::Serialize;

use super::{GroupIndex, StructuralIndex};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupInfo {
    pub columns: BTreeMap<String, String>,
    pub shape: [usize; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RasterInfo {
    pub signals: BTreeMap<String, String>,
    pub basis: Option<String>,
    pub shape: [usize; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerInfo {
    pub meta: GroupInfo,
    pub res: GroupInfo,
    pub sys: BTreeMap<String, BTreeMap<String, RasterInfo>>,
}

impl From<&GroupIndex> for GroupInfo {
    fn from(group: &GroupIndex) -> Self {
        GroupInfo {
            columns: group
                .columns
                .iter()
                .map(|c| (c.name.clone(), c.dtype.clone()))
                .collect(),
            shape: group.shape,
        }
    }
}

impl From<&StructuralIndex> for ContainerInfo {
    fn from(index: &StructuralIndex) -> Self {
        let sys = index
            .sys
            .iter()
            .map(|(system, sindex)| {
                let rasters = sindex
                    .rasters
                    .iter()
                    .map(|(name, r)| {
                        let info = RasterInfo {
                            signals: r
                                .signals
                                .iter()
                                .map(|c| (c.name.clone(), c.dtype.clone()))
                                .collect(),
                            basis: r.basis.as_ref().map(|b| b.dtype.clone()),
                            shape: r.shape,
                        };
                        (name.clone(), info)
                    })
                    .collect();
                (system.clone(), rasters)
            })
            .collect();
        ContainerInfo {
            meta: GroupInfo::from(&index.meta),
            res: GroupInfo::from(&index.res),
            sys,
        }
    }
}

//! ADAF - hierarchical container for scalar tables and time-series rasters
//!
//! A [`DataContainer`] holds two scalar tables (`meta` and `res`) and a
//! [`SystemTree`] of systems, each a set of named [`Raster`]s: one basis
//! column plus equal-length signal columns. Containers are stored in a
//! single file with a compressed structural index so summaries can be
//! answered without decoding raster payloads; rasters may live in other
//! files, reached through a bounded [`LinkCache`].
//!
//! The join engine stacks ([`Stack`]) and splits ([`Split`]) tables,
//! rasters and whole containers by an integer index column, optionally
//! aligning rasters on their reference time.

pub mod config;
pub mod error;
pub mod index;
pub mod join;
pub mod link;
pub mod model;
pub mod resource;
pub mod storage;
pub mod table;

pub use config::AdafConfig;
pub use error::{AdafError, Result};
pub use index::{ContainerInfo, IndexLimit, StructuralIndex};
pub use join::container::{
    ContainerVJoinOptions, ContainerVSplitOptions, ExclusionReason, JoinReport, UnitPolicy,
};
pub use join::{Fill, HJoinPolicy, Split, Stack, VJoinOptions, VSplitOptions};
pub use link::{LinkCache, LinkScope, OpenMode};
pub use model::{
    DataContainer, NameField, NameKind, Names, Raster, ScalarTable, System, SystemTree,
    Timeseries, BASIS_NAME,
};
pub use resource::HandleBudget;
pub use table::{AttrValue, Attributes, Column, ColumnData, DType, EqualOptions, Table};

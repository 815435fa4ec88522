//! Container model: scalar tables, rasters and the system tree.

pub mod container;
mod equal;
pub mod names;
pub mod natural;
pub mod raster;
pub mod scalar;
pub mod system;

pub use container::{DataContainer, LEGACY_VERSION, VERSION};
pub use names::{NameField, NameKind, NameValue, Names, PathSegment};
pub use raster::{Raster, Timeseries, BASIS_NAME};
pub use scalar::ScalarTable;
pub use system::{System, SystemTree};

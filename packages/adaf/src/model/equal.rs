//! Container equality with a description of the first difference.

use super::container::DataContainer;
use crate::error::{AdafError, Result};
use crate::table::compare::compare_tables;
use crate::table::EqualOptions;

impl DataContainer {
    pub fn equal_to(&self, other: &DataContainer, options: &EqualOptions) -> bool {
        self.check_equal(other, options).is_ok()
    }

    /// Compare meta, res, then every raster of every system. The error
    /// names the first difference found.
    pub fn check_equal(&self, other: &DataContainer, options: &EqualOptions) -> Result<()> {
        self.first_difference(other, options)
            .map_err(|msg| AdafError::NotEqual(format!("ADAFs are not equal. {msg}")))
    }

    fn first_difference(&self, other: &DataContainer, options: &EqualOptions) -> std::result::Result<(), String> {
        compare_tables(self.meta.as_table(), other.meta.as_table(), options)
            .map_err(|msg| format!("Meta differs. {msg}"))?;
        compare_tables(self.res.as_table(), other.res.as_table(), options)
            .map_err(|msg| format!("Res differs. {msg}"))?;

        let systems_a = self.sys.keys();
        let systems_b = other.sys.keys();
        if systems_a.len() != systems_b.len() {
            return Err("The number of systems differ.".into());
        }
        if systems_a != systems_b {
            return Err(format!("The systems differ, {systems_a:?} vs {systems_b:?}."));
        }

        for system in systems_a {
            let (sa, sb) = match (self.sys.get(system), other.sys.get(system)) {
                (Ok(a), Ok(b)) => (a, b),
                _ => return Err(format!("System {system} is missing.")),
            };
            if options.tbl_attrs && sa.attrs() != sb.attrs() {
                return Err(format!("The attributes of system {system} differ."));
            }
            let rasters_a = sa.keys();
            let rasters_b = sb.keys();
            if rasters_a.len() != rasters_b.len() {
                return Err(format!("The number of rasters in system {system} differ."));
            }
            if rasters_a != rasters_b {
                return Err(format!(
                    "The rasters in system {system} differ, {rasters_a:?} vs {rasters_b:?}."
                ));
            }
            for raster in rasters_a {
                let a = sa.raster(raster).map_err(|e| e.to_string())?;
                let b = sb.raster(raster).map_err(|e| e.to_string())?;
                compare_tables(a.table(), b.table(), options)
                    .map_err(|msg| format!("raster {raster} in system {system} differs. {msg}"))?;
            }
        }
        Ok(())
    }
}

//! System tree: systems of named rasters, iterated in natural order.
//!
//! Rasters read from a file are kept as mapped blobs and decoded on first
//! access. A decoded raster is memoized in its slot; mutable access detaches
//! the slot from the file so it gets written out as data on the next save.

use std::cell::OnceCell;
use std::collections::BTreeMap;

use super::natural::sort_naturally;
use super::raster::Raster;
use crate::error::{AdafError, Result};
use crate::index::{IndexLimit, RasterIndex};
use crate::storage::StoredRaster;
use crate::table::Attributes;

#[derive(Debug, Clone)]
pub(crate) struct RasterSlot {
    cell: OnceCell<Raster>,
    stored: Option<StoredRaster>,
    summary: Option<RasterIndex>,
}

impl RasterSlot {
    fn ready(raster: Raster) -> Self {
        RasterSlot {
            cell: OnceCell::from(raster),
            stored: None,
            summary: None,
        }
    }

    pub(crate) fn stored(stored: StoredRaster, summary: Option<RasterIndex>) -> Self {
        RasterSlot {
            cell: OnceCell::new(),
            stored: Some(stored),
            summary,
        }
    }

    fn get(&self, name: &str) -> Result<&Raster> {
        if let Some(raster) = self.cell.get() {
            return Ok(raster);
        }
        let stored = self
            .stored
            .as_ref()
            .ok_or_else(|| AdafError::not_found("Raster", name))?;
        let raster = Raster::from_stored(name, stored.blob.decode_table()?);
        tracing::debug!(raster = name, rows = raster.number_of_rows(), "Materialized raster");
        Ok(self.cell.get_or_init(|| raster))
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut Raster> {
        self.get(name)?;
        self.stored = None;
        self.summary = None;
        self.cell
            .get_mut()
            .ok_or_else(|| AdafError::not_found("Raster", name))
    }

    /// Payload still identical to its stored origin.
    pub(crate) fn unmodified(&self) -> Option<&StoredRaster> {
        self.stored.as_ref()
    }

    pub(crate) fn is_materialized(&self) -> bool {
        self.cell.get().is_some()
    }

    pub(crate) fn index(&self, name: &str, limit: &IndexLimit) -> Result<RasterIndex> {
        if !self.is_materialized() {
            if let Some(summary) = self.summary.as_ref().filter(|s| s.satisfies(limit)) {
                return Ok(summary.limited(limit));
            }
        }
        Ok(RasterIndex::of(self.get(name)?, limit))
    }

    fn renamed(&self, name: &str) -> Self {
        let mut slot = self.clone();
        if let Some(raster) = slot.cell.get_mut() {
            raster.set_name(name);
        }
        slot
    }
}

// ── System ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct System {
    name: String,
    rasters: BTreeMap<String, RasterSlot>,
    attrs: Attributes,
}

impl System {
    pub fn new(name: impl Into<String>) -> Self {
        System {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    pub fn attrs_mut(&mut self) -> &mut Attributes {
        &mut self.attrs
    }

    pub(crate) fn set_attrs(&mut self, attrs: Attributes) {
        self.attrs = attrs;
    }

    pub fn len(&self) -> usize {
        self.rasters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rasters.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rasters.contains_key(name)
    }

    /// Raster names in natural order.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.rasters.keys().map(String::as_str).collect();
        sort_naturally(&mut keys);
        keys
    }

    pub fn create(&mut self, name: &str) -> Result<&mut Raster> {
        if self.rasters.contains_key(name) {
            return Err(AdafError::duplicate("Raster", name));
        }
        let slot = self
            .rasters
            .entry(name.to_string())
            .or_insert_with(|| RasterSlot::ready(Raster::new(name)));
        slot.get_mut(name)
    }

    /// Insert `raster` under its own name, replacing any existing one.
    pub fn insert(&mut self, mut raster: Raster) {
        let name = raster.name().to_string();
        raster.set_name(&name);
        self.rasters.insert(name, RasterSlot::ready(raster));
    }

    pub fn raster(&self, name: &str) -> Result<&Raster> {
        self.slot(name)?.get(name)
    }

    pub fn raster_mut(&mut self, name: &str) -> Result<&mut Raster> {
        self.rasters
            .get_mut(name)
            .ok_or_else(|| AdafError::not_found("Raster", name))?
            .get_mut(name)
    }

    /// Rasters in natural order, decoding any that are still stored.
    pub fn rasters(&self) -> Result<Vec<&Raster>> {
        self.keys().into_iter().map(|k| self.raster(k)).collect()
    }

    pub fn remove(&mut self, name: &str) -> Result<()> {
        self.rasters
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| AdafError::not_found("Raster", name))
    }

    /// Copy raster `name` of `other` into self as `new_name` (default
    /// `name`). Stored rasters are copied without decoding.
    pub fn copy_from(&mut self, other: &System, name: &str, new_name: Option<&str>) -> Result<()> {
        let target = new_name.unwrap_or(name);
        let slot = other.slot(name)?.renamed(target);
        self.rasters.insert(target.to_string(), slot);
        Ok(())
    }

    pub fn is_materialized(&self, name: &str) -> bool {
        self.rasters.get(name).map_or(false, RasterSlot::is_materialized)
    }

    pub(crate) fn slot(&self, name: &str) -> Result<&RasterSlot> {
        self.rasters
            .get(name)
            .ok_or_else(|| AdafError::not_found("Raster", name))
    }

    pub(crate) fn insert_slot(&mut self, name: String, slot: RasterSlot) {
        self.rasters.insert(name, slot);
    }
}

// ── SystemTree ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct SystemTree {
    systems: BTreeMap<String, System>,
}

impl SystemTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.systems.contains_key(name)
    }

    /// System names in natural order.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.systems.keys().map(String::as_str).collect();
        sort_naturally(&mut keys);
        keys
    }

    /// Systems in natural order.
    pub fn iter(&self) -> impl Iterator<Item = &System> {
        self.keys().into_iter().filter_map(move |k| self.systems.get(k))
    }

    pub fn create(&mut self, name: &str) -> Result<&mut System> {
        if self.systems.contains_key(name) {
            return Err(AdafError::duplicate("System", name));
        }
        Ok(self
            .systems
            .entry(name.to_string())
            .or_insert_with(|| System::new(name)))
    }

    pub fn get(&self, name: &str) -> Result<&System> {
        self.systems
            .get(name)
            .ok_or_else(|| AdafError::not_found("System", name))
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut System> {
        self.systems
            .get_mut(name)
            .ok_or_else(|| AdafError::not_found("System", name))
    }

    /// Existing system `name`, created when missing.
    pub fn get_or_create(&mut self, name: &str) -> &mut System {
        self.systems
            .entry(name.to_string())
            .or_insert_with(|| System::new(name))
    }

    pub fn remove(&mut self, name: &str) -> Result<System> {
        self.systems
            .remove(name)
            .ok_or_else(|| AdafError::not_found("System", name))
    }

    /// Copy system `name` of `other` into self as `new_name`, replacing any
    /// existing system of that name.
    pub fn copy_from(&mut self, other: &SystemTree, name: &str, new_name: Option<&str>) -> Result<()> {
        let mut system = other.get(name)?.clone();
        let target = new_name.unwrap_or(name);
        system.name = target.to_string();
        self.systems.insert(target.to_string(), system);
        Ok(())
    }

    /// Copy every system of `other` into self; same-named systems are
    /// replaced.
    pub fn hjoin(&mut self, other: &SystemTree) -> Result<()> {
        for name in other.keys() {
            self.copy_from(other, name, None)?;
        }
        Ok(())
    }
}

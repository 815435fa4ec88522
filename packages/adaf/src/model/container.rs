//! The top-level container: `meta`, `res` and `sys` plus a root table
//!
//! The root table carries file attributes (package id, timestamp, user id,
//! source id, version) and the compressed structural index. Older files kept
//! file attributes as single-row root columns; reads fall back to those and
//! `sync()` moves them to attributes.

use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::scalar::ScalarTable;
use super::system::{RasterSlot, SystemTree};
use crate::config::AdafConfig;
use crate::error::Result;
use crate::index::{codec, ContainerInfo, GroupIndex, IndexLimit, StructuralIndex, SystemIndex};
use crate::join::HJoinPolicy;
use crate::link::{normalize_path, FileHandle, LinkCache};
use crate::storage::{reader, writer};
use crate::table::{Column, ColumnData};

/// Version written by this crate.
pub const VERSION: &str = "2.1";

/// Version assumed for files without a version tag.
pub const LEGACY_VERSION: &str = "1.2";

const INDEX_COLUMN: &str = "gzip_index";

const FILE_ATTRIBUTES: [&str; 4] = ["package_id", "timestamp", "user_id", "source_id"];

#[derive(Debug, Clone, Default)]
pub struct DataContainer {
    pub meta: ScalarTable,
    pub res: ScalarTable,
    pub sys: SystemTree,
    root: ScalarTable,
    source: Option<PathBuf>,
}

impl DataContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deep copy of `source`. Stored rasters stay lazily decoded.
    pub fn from_source(source: &DataContainer) -> Self {
        source.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.meta.is_empty() && self.res.is_empty() && self.sys.is_empty()
    }

    /// File this container was opened from.
    pub fn source_path(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    // ── File attributes ──────────────────────────────────────────

    pub fn version(&self) -> String {
        if self.source.is_none() {
            return VERSION.to_string();
        }
        let version = self.file_attribute("version");
        if version.is_empty() {
            LEGACY_VERSION.to_string()
        } else {
            version
        }
    }

    pub fn package_id(&self) -> String {
        self.file_attribute("package_id")
    }

    pub fn timestamp(&self) -> String {
        self.file_attribute("timestamp")
    }

    pub fn user_id(&self) -> String {
        self.file_attribute("user_id")
    }

    pub fn source_id(&self) -> String {
        self.file_attribute("source_id")
    }

    pub fn set_source_id(&mut self, source_id: &str) {
        self.set_file_attribute("source_id", source_id);
    }

    /// Attribute storage first, legacy root column second, empty otherwise.
    fn file_attribute(&self, key: &str) -> String {
        if let Some(value) = self.root.attrs().get(key) {
            return value.to_string();
        }
        self.root
            .column(key)
            .and_then(legacy_value)
            .unwrap_or_default()
    }

    fn set_file_attribute(&mut self, key: &str, value: &str) {
        self.root.table_mut().remove_column(key);
        self.root.attrs_mut().set(key, value);
    }

    fn pop_legacy(&mut self, key: &str) -> Option<String> {
        self.root
            .table_mut()
            .remove_column(key)
            .and_then(|c| legacy_value(&c))
    }

    // ── Sync and index ───────────────────────────────────────────

    pub fn sync(&mut self) -> Result<()> {
        self.sync_with(&AdafConfig::default())
    }

    /// Normalize file attributes, then refresh the stored index and version.
    pub fn sync_with(&mut self, config: &AdafConfig) -> Result<()> {
        for key in FILE_ATTRIBUTES {
            let legacy = self.pop_legacy(key).filter(|v| !v.is_empty());
            if !self.file_attribute(key).is_empty() {
                continue;
            }
            match legacy {
                Some(old) => self.set_file_attribute(key, &old),
                None => {
                    if let Some(fresh) = generate_attribute(key, config) {
                        self.set_file_attribute(key, &fresh);
                    }
                }
            }
        }

        self.pop_legacy("version");
        self.root.attrs_mut().set("version", VERSION);

        let bytes = codec::encode(&self.index(Some(&config.index_limit))?)?;
        let root = self.root.table_mut();
        root.remove_column(INDEX_COLUMN);
        root.set_column(INDEX_COLUMN, Column::new(vec![bytes]))?;
        Ok(())
    }

    /// Structural index. `None` includes every attribute.
    pub fn index(&self, limit: Option<&IndexLimit>) -> Result<StructuralIndex> {
        let full = IndexLimit::full();
        let limit = limit.unwrap_or(&full);
        let mut sys = std::collections::BTreeMap::new();
        for system in self.sys.iter() {
            let mut rasters = std::collections::BTreeMap::new();
            for name in system.keys() {
                rasters.insert(name.to_string(), system.slot(name)?.index(name, limit)?);
            }
            let attrs = limit.system_attrs.then(|| system.attrs().stringified());
            sys.insert(system.name().to_string(), SystemIndex { attrs, rasters });
        }
        Ok(StructuralIndex {
            version: self.version(),
            meta: GroupIndex::of(self.meta.as_table()),
            res: GroupIndex::of(self.res.as_table()),
            sys,
        })
    }

    /// Index stored by the last `sync()`, if readable.
    pub fn cached_index(&self) -> Option<StructuralIndex> {
        match self.root.column(INDEX_COLUMN)?.data() {
            ColumnData::Bytes(v) => v.first().and_then(|b| codec::decode_cached(b)),
            _ => None,
        }
    }

    pub fn info(&self) -> Result<ContainerInfo> {
        Ok(ContainerInfo::from(&self.index(Some(&IndexLimit::persisted()))?))
    }

    // ── Joins ────────────────────────────────────────────────────

    /// Merge `other` into self: meta and res columns are hjoined, systems
    /// are copied over.
    pub fn hjoin(&mut self, other: &DataContainer, policy: HJoinPolicy) -> Result<()> {
        self.meta.hjoin(&other.meta, policy)?;
        self.res.hjoin(&other.res, policy)?;
        self.sys.hjoin(&other.sys)
    }

    // ── Persistence ──────────────────────────────────────────────

    /// Open a container file. The file becomes an owned handle of `cache`;
    /// linked files are opened through it.
    pub fn open(path: &Path, cache: &mut LinkCache) -> Result<Self> {
        let key = normalize_path(path);
        let handle = Rc::new(FileHandle::open_read(&key)?);
        cache.add(&key, handle.clone());
        let stored = match reader::read_container(&handle, cache) {
            Ok(stored) => stored,
            Err(e) => {
                if let Err(close_err) = cache.close(&key) {
                    tracing::warn!(
                        path = %key.display(),
                        error = %close_err,
                        "Failed to close handle after unreadable container"
                    );
                }
                return Err(e);
            }
        };

        let mut container = DataContainer {
            meta: ScalarTable::from_table(stored.meta),
            res: ScalarTable::from_table(stored.res),
            sys: SystemTree::new(),
            root: ScalarTable::from_table(stored.root),
            source: Some(key),
        };
        let cached = container.cached_index();
        for stored_system in stored.systems {
            let system = container.sys.get_or_create(&stored_system.name);
            system.set_attrs(stored_system.attrs);
            for (name, raster) in stored_system.rasters {
                let summary = cached
                    .as_ref()
                    .and_then(|idx| idx.raster(&stored_system.name, &name))
                    .cloned();
                system.insert_slot(name, RasterSlot::stored(raster, summary));
            }
        }
        tracing::debug!(
            path = %path.display(),
            systems = container.sys.len(),
            cached_index = cached.is_some(),
            "Opened container"
        );
        Ok(container)
    }

    pub fn save(&mut self, path: &Path, cache: &mut LinkCache) -> Result<()> {
        self.save_with(path, cache, &AdafConfig::default())
    }

    /// Sync and write to `path`. The file is written next to `path` and
    /// renamed into place once complete.
    pub fn save_with(&mut self, path: &Path, cache: &mut LinkCache, config: &AdafConfig) -> Result<()> {
        self.sync_with(config)?;
        let dest = normalize_path(path);
        let tmp = temp_sibling(&dest);
        let handle = Rc::new(FileHandle::create(&tmp)?);
        cache.add(&tmp, handle.clone());

        let written = writer::write_container(&handle, self, &dest, config.link_external);
        let closed = cache.close(&tmp);
        if let Err(e) = written.and(closed) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e);
        }
        let overwrites_source = self.source.as_deref() == Some(dest.as_path());
        if overwrites_source {
            // Stored rasters still point into the old file image.
            self.materialize_all()?;
        }
        std::fs::rename(&tmp, &dest)?;
        if overwrites_source {
            cache.add(&dest, Rc::new(FileHandle::open_read(&dest)?));
        }
        tracing::debug!(path = %dest.display(), "Saved container");
        Ok(())
    }

    /// Release the owned handle of the file this container was opened from.
    pub fn close(&mut self, cache: &mut LinkCache) -> Result<()> {
        match &self.source {
            Some(path) => cache.close(path),
            None => Ok(()),
        }
    }

    pub(crate) fn root(&self) -> &ScalarTable {
        &self.root
    }

    fn materialize_all(&mut self) -> Result<()> {
        let systems: Vec<String> = self.sys.keys().into_iter().map(str::to_string).collect();
        for system_name in systems {
            let system = self.sys.get_mut(&system_name)?;
            let rasters: Vec<String> = system.keys().into_iter().map(str::to_string).collect();
            for raster in rasters {
                system.raster_mut(&raster)?;
            }
        }
        Ok(())
    }

    // ── Diagnostics ──────────────────────────────────────────────

    /// Structural oddities worth reporting: rasters without a basis and
    /// signal names that occur in more than one raster.
    pub fn warnings(&self) -> Result<Vec<String>> {
        let index = self.index(Some(&IndexLimit::persisted()))?;
        let mut warnings = Vec::new();
        let mut seen: std::collections::BTreeMap<&str, Vec<String>> = Default::default();
        for system in self.sys.keys() {
            let Some(sindex) = index.sys.get(system) else { continue };
            for raster in self.sys.get(system)?.keys() {
                let Some(rindex) = sindex.rasters.get(raster) else { continue };
                if rindex.basis.is_none() && !rindex.signals.is_empty() {
                    warnings.push(format!("Raster {system}/{raster} has no basis."));
                }
                for signal in &rindex.signals {
                    seen.entry(signal.name.as_str())
                        .or_default()
                        .push(format!("{system}/{raster}"));
                }
            }
        }
        for (signal, places) in seen {
            if places.len() > 1 {
                warnings.push(format!(
                    "Signal '{signal}' occurs in several rasters: {}.",
                    places.join(", ")
                ));
            }
        }
        Ok(warnings)
    }
}

impl fmt::Display for DataContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let info = self.info().map_err(|_| fmt::Error)?;
        writeln!(f, "ADAF {}", self.version())?;
        writeln!(f, "  meta: {} columns, {} rows", info.meta.shape[1], info.meta.shape[0])?;
        writeln!(f, "  res: {} columns, {} rows", info.res.shape[1], info.res.shape[0])?;
        for system in self.sys.keys() {
            writeln!(f, "  system {system}")?;
            if let Some(rasters) = info.sys.get(system) {
                for (name, raster) in rasters {
                    writeln!(
                        f,
                        "    raster {name}: {} signals, {} rows",
                        raster.shape[1], raster.shape[0]
                    )?;
                }
            }
        }
        for warning in self.warnings().map_err(|_| fmt::Error)? {
            writeln!(f, "  warning: {warning}")?;
        }
        Ok(())
    }
}

fn legacy_value(column: &Column) -> Option<String> {
    if column.is_empty() || column.is_masked(0) {
        return None;
    }
    match column.data() {
        ColumnData::Text(v) => Some(v[0].clone()),
        ColumnData::Bytes(v) => Some(String::from_utf8_lossy(&v[0]).into_owned()),
        _ => None,
    }
}

fn generate_attribute(key: &str, config: &AdafConfig) -> Option<String> {
    match key {
        "package_id" => Some(config.package_id.clone()),
        "timestamp" => Some(
            chrono::Local::now()
                .format("%Y-%m-%dT%H:%M:%S%.6f")
                .to_string(),
        ),
        "user_id" => Some(crate::resource::login_name()),
        _ => None,
    }
}

fn temp_sibling(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}.tmp", std::process::id()));
    dest.with_file_name(name)
}

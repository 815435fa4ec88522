//! Container-level vjoin and vsplit
//!
//! Meta and res are stacked or split as tables. With `include_rasters`,
//! rasters that share a system and raster name are flattened with their basis
//! under [`TEMP_BASIS`], processed as tables and rebuilt. Positions of
//! containers lacking a raster are held by empty tables so generated index
//! values line up with container positions.
//!
//! Reference-time alignment shifts each raster's basis by the distance between
//! its `reference_time` attribute and the earliest one among the accepted
//! rasters of that name, in the basis unit. Rasters that can't be aligned are
//! left out and listed in the [`JoinReport`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDateTime;

use super::{table, Split, Stack, VJoinOptions, VSplitOptions};
use crate::error::{AdafError, Result};
use crate::model::{DataContainer, Raster, ScalarTable};
use crate::table::{ColumnData, Table};

/// Column name a raster basis takes while the raster is handled as a table.
pub const TEMP_BASIS: &str = "__hopefully_unique_adaf_basis_name__";

const REFERENCE_TIME: &str = "reference_time";

/// Time units a basis can be aligned in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Seconds,
    Millis,
    Micros,
}

impl TimeUnit {
    pub fn parse(unit: &str) -> Option<TimeUnit> {
        match unit {
            "s" => Some(TimeUnit::Seconds),
            "ms" => Some(TimeUnit::Millis),
            "us" => Some(TimeUnit::Micros),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeUnit::Seconds => "s",
            TimeUnit::Millis => "ms",
            TimeUnit::Micros => "us",
        }
    }

    /// Ticks of this unit in one second.
    pub fn per_second(self) -> f64 {
        match self {
            TimeUnit::Seconds => 1.0,
            TimeUnit::Millis => 1e3,
            TimeUnit::Micros => 1e6,
        }
    }
}

/// What to do with a raster whose basis unit differs from the first
/// accepted raster of the same name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnitPolicy {
    #[default]
    ExcludeMismatched,
    /// Rescale the basis to the first accepted unit.
    Convert,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerVJoinOptions {
    pub table: VJoinOptions,
    pub include_rasters: bool,
    pub use_reference_time: bool,
    pub unit_policy: UnitPolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerVSplitOptions {
    pub split: VSplitOptions,
    /// Fail when meta or res has columns but no input index column.
    pub require_index: bool,
    pub include_rasters: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusionReason {
    MissingReferenceTime,
    MissingUnit,
    UnknownUnit(String),
    InvalidReferenceTime(String),
    UnitMismatch { expected: String, found: String },
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExclusionReason::MissingReferenceTime => f.write_str("missing reference_time"),
            ExclusionReason::MissingUnit => f.write_str("missing basis unit"),
            ExclusionReason::UnknownUnit(unit) => write!(f, "unknown basis unit '{unit}'"),
            ExclusionReason::InvalidReferenceTime(value) => {
                write!(f, "unparsable reference_time '{value}'")
            }
            ExclusionReason::UnitMismatch { expected, found } => {
                write!(f, "basis unit '{found}' differs from '{expected}'")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludedRaster {
    pub system: String,
    pub raster: String,
    /// Position of the container the raster came from.
    pub container_index: usize,
    pub reason: ExclusionReason,
}

/// Rasters left out of a reference-time join.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinReport {
    pub excluded: Vec<ExcludedRaster>,
}

impl JoinReport {
    pub fn is_clean(&self) -> bool {
        self.excluded.is_empty()
    }
}

// ── vjoin ─────────────────────────────────────────────────────────

pub fn vjoin(
    inputs: &[&DataContainer],
    options: &ContainerVJoinOptions,
) -> Result<(DataContainer, JoinReport)> {
    let mut out = DataContainer::new();
    let metas: Vec<&Table> = inputs.iter().map(|c| c.meta.as_table()).collect();
    out.meta = ScalarTable::from_table(table::vjoin(&metas, &options.table)?);
    let res: Vec<&Table> = inputs.iter().map(|c| c.res.as_table()).collect();
    out.res = ScalarTable::from_table(table::vjoin(&res, &options.table)?);

    let mut report = JoinReport::default();
    if !options.include_rasters {
        return Ok((out, report));
    }

    let mut lookup: BTreeMap<&str, BTreeMap<&str, Vec<(usize, &Raster)>>> = BTreeMap::new();
    for (i, container) in inputs.iter().enumerate() {
        for system in container.sys.iter() {
            let rasters = lookup.entry(system.name()).or_default();
            for raster in system.rasters()? {
                rasters.entry(raster.name()).or_default().push((i, raster));
            }
        }
    }

    for (system_name, rasters) in lookup {
        let system = out.sys.get_or_create(system_name);
        for (raster_name, members) in rasters {
            let joined = join_rasters(system_name, raster_name, &members, options, &mut report)?;
            system.insert(joined);
        }
    }
    Ok((out, report))
}

/// A raster accepted for stacking, flattened.
struct Contribution {
    position: usize,
    table: Table,
    reference: Option<(NaiveDateTime, String)>,
}

fn join_rasters(
    system: &str,
    raster: &str,
    members: &[(usize, &Raster)],
    options: &ContainerVJoinOptions,
    report: &mut JoinReport,
) -> Result<Raster> {
    let mut accepted = Vec::with_capacity(members.len());
    if options.use_reference_time {
        let mut target: Option<TimeUnit> = None;
        for &(position, member) in members {
            let checked = reference_of(member).and_then(|(time, raw, unit)| {
                let expected = *target.get_or_insert(unit);
                if unit != expected && options.unit_policy == UnitPolicy::ExcludeMismatched {
                    return Err(ExclusionReason::UnitMismatch {
                        expected: expected.as_str().to_string(),
                        found: unit.as_str().to_string(),
                    });
                }
                Ok((time, raw, expected.per_second() / unit.per_second()))
            });
            match checked {
                Ok((time, raw, scale)) => {
                    let mut table = member.to_table(Some(TEMP_BASIS))?;
                    scale_basis(&mut table, scale)?;
                    accepted.push(Contribution {
                        position,
                        table,
                        reference: Some((time, raw)),
                    });
                }
                Err(reason) => {
                    tracing::warn!(
                        system,
                        raster,
                        container = position,
                        reason = %reason,
                        "Excluding raster from reference-time join"
                    );
                    report.excluded.push(ExcludedRaster {
                        system: system.to_string(),
                        raster: raster.to_string(),
                        container_index: position,
                        reason,
                    });
                }
            }
        }
        if let Some(unit) = target {
            align_to_earliest(&mut accepted, unit)?;
        }
    } else {
        for &(position, member) in members {
            accepted.push(Contribution {
                position,
                table: member.to_table(Some(TEMP_BASIS))?,
                reference: None,
            });
        }
    }

    let Some(first) = accepted.first() else {
        return Ok(Raster::new(raster));
    };
    let first_table = first.table.clone();
    let earliest = accepted
        .iter()
        .filter_map(|c| c.reference.as_ref())
        .min_by_key(|(time, _)| *time)
        .map(|(_, raw)| raw.clone());

    let mut slots = Vec::new();
    let empty = Table::new();
    let mut next = 0;
    for contribution in &accepted {
        slots.extend(std::iter::repeat(&empty).take(contribution.position - next));
        slots.push(&contribution.table);
        next = contribution.position + 1;
    }
    let mut joined = table::vjoin(&slots, &options.table)?;

    if options.use_reference_time && joined.number_of_columns() > 0 {
        if let Some(basis) = joined.column(TEMP_BASIS) {
            let order = basis.data().argsort();
            joined = joined.take_rows(&order);
        }
    }

    let names: Vec<String> = joined.column_names().map(str::to_string).collect();
    for name in names {
        if let (Some(source), Some(column)) = (first_table.column(&name), joined.column_mut(&name)) {
            *column.attrs_mut() = source.attrs().clone();
        }
    }

    let basis = joined.has_column(TEMP_BASIS).then_some(TEMP_BASIS);
    let mut result = Raster::from_table(raster, &joined, basis)?;
    result.clear_basis_label();
    if let Some(earliest) = earliest {
        result.attrs_mut().set(REFERENCE_TIME, earliest);
    }
    Ok(result)
}

fn reference_of(
    raster: &Raster,
) -> std::result::Result<(NaiveDateTime, String, TimeUnit), ExclusionReason> {
    let raw = raster
        .attrs()
        .get(REFERENCE_TIME)
        .map(ToString::to_string)
        .filter(|s| !s.is_empty())
        .ok_or(ExclusionReason::MissingReferenceTime)?;
    let unit = raster
        .basis()
        .and_then(|b| b.attrs().get_text("unit"))
        .filter(|u| !u.is_empty())
        .ok_or(ExclusionReason::MissingUnit)?;
    let unit = TimeUnit::parse(unit).ok_or_else(|| ExclusionReason::UnknownUnit(unit.to_string()))?;
    let time = parse_reference_time(&raw)
        .ok_or_else(|| ExclusionReason::InvalidReferenceTime(raw.clone()))?;
    Ok((time, raw, unit))
}

/// ISO-8601 date and time, with or without fractional seconds.
pub fn parse_reference_time(value: &str) -> Option<NaiveDateTime> {
    [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
    ]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

fn align_to_earliest(accepted: &mut [Contribution], unit: TimeUnit) -> Result<()> {
    let Some(earliest) = accepted
        .iter()
        .filter_map(|c| c.reference.as_ref().map(|(t, _)| *t))
        .min()
    else {
        return Ok(());
    };
    for contribution in accepted.iter_mut() {
        let Some((time, _)) = &contribution.reference else { continue };
        let delta = *time - earliest;
        let seconds = delta
            .num_microseconds()
            .map_or(delta.num_seconds() as f64, |us| us as f64 / 1e6);
        shift_basis(&mut contribution.table, seconds * unit.per_second())?;
    }
    Ok(())
}

fn scale_basis(table: &mut Table, scale: f64) -> Result<()> {
    if scale == 1.0 {
        return Ok(());
    }
    map_basis(table, |x| x * scale)
}

fn shift_basis(table: &mut Table, offset: f64) -> Result<()> {
    if offset == 0.0 {
        return Ok(());
    }
    map_basis(table, |x| x + offset)
}

fn map_basis(table: &mut Table, f: impl Fn(f64) -> f64) -> Result<()> {
    let Some(column) = table.column_mut(TEMP_BASIS) else {
        return Ok(());
    };
    let data = match column.data() {
        ColumnData::Float(v) => v.iter().map(|&x| f(x)).collect(),
        ColumnData::Int(v) => v.iter().map(|&x| f(x as f64)).collect(),
        other => {
            return Err(AdafError::ColumnType(format!(
                "Basis of dtype {} can't be aligned in time",
                other.dtype().name()
            )))
        }
    };
    column.set_data(ColumnData::Float(data));
    Ok(())
}

// ── vsplit ────────────────────────────────────────────────────────

pub fn vsplit(
    container: &DataContainer,
    options: &ContainerVSplitOptions,
) -> Result<Vec<(i64, DataContainer)>> {
    if let (true, Some(index)) = (options.require_index, &options.split.input_index) {
        for (group, scalar) in [("Meta", &container.meta), ("Res", &container.res)] {
            if scalar.number_of_columns() > 0 && scalar.column(index).is_none() {
                return Err(AdafError::MissingIndex {
                    group,
                    index: index.clone(),
                });
            }
        }
    }

    let mut meta: BTreeMap<i64, Table> = table::vsplit(container.meta.as_table(), &options.split)?
        .into_iter()
        .collect();
    let mut res: BTreeMap<i64, Table> = table::vsplit(container.res.as_table(), &options.split)?
        .into_iter()
        .collect();

    let mut rasters: BTreeMap<i64, Vec<(&str, Raster)>> = BTreeMap::new();
    if options.include_rasters {
        for system in container.sys.iter() {
            for raster in system.rasters()? {
                for (key, part) in raster.vsplit(&options.split)? {
                    rasters.entry(key).or_default().push((system.name(), part));
                }
            }
        }
    }

    let keys: BTreeSet<i64> = meta
        .keys()
        .chain(res.keys())
        .chain(rasters.keys())
        .copied()
        .collect();
    let mut out = Vec::with_capacity(keys.len());
    for key in keys {
        let mut part = DataContainer::new();
        if let Some(t) = meta.remove(&key) {
            part.meta = ScalarTable::from_table(t);
        }
        if let Some(t) = res.remove(&key) {
            part.res = ScalarTable::from_table(t);
        }
        for (system, raster) in rasters.remove(&key).unwrap_or_default() {
            part.sys.get_or_create(system).insert(raster);
        }
        out.push((key, part));
    }
    Ok(out)
}

impl Stack for DataContainer {
    type Options = ContainerVJoinOptions;
    type Output = (DataContainer, JoinReport);

    fn vjoin(inputs: &[&DataContainer], options: &ContainerVJoinOptions) -> Result<Self::Output> {
        vjoin(inputs, options)
    }
}

impl Split for DataContainer {
    type Options = ContainerVSplitOptions;

    fn vsplit(&self, options: &ContainerVSplitOptions) -> Result<Vec<(i64, DataContainer)>> {
        vsplit(self, options)
    }
}

impl DataContainer {
    /// Split by the input index and append the parts to `out` in index order.
    pub fn vsplit_into(&self, out: &mut Vec<DataContainer>, options: &ContainerVSplitOptions) -> Result<()> {
        out.extend(vsplit(self, options)?.into_iter().map(|(_, c)| c));
        Ok(())
    }
}

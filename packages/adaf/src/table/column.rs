//! Typed column storage with optional masks.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::attributes::Attributes;
use crate::error::{AdafError, Result};

/// Missing value for datetime and timedelta columns (microsecond ticks).
pub const NAT: i64 = i64::MIN;

// ── DType ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    Bool,
    Int,
    Float,
    Text,
    Bytes,
    DateTime,
    TimeDelta,
}

impl DType {
    pub const ALL: [DType; 7] = [
        DType::Bool,
        DType::Int,
        DType::Float,
        DType::Text,
        DType::Bytes,
        DType::DateTime,
        DType::TimeDelta,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::Int => "int64",
            DType::Float => "float64",
            DType::Text => "str",
            DType::Bytes => "bytes",
            DType::DateTime => "datetime64[us]",
            DType::TimeDelta => "timedelta64[us]",
        }
    }

    pub fn from_name(name: &str) -> Option<DType> {
        DType::ALL.into_iter().find(|d| d.name() == name)
    }

    /// Single letter kind code.
    pub fn kind(self) -> char {
        match self {
            DType::Bool => 'b',
            DType::Int => 'i',
            DType::Float => 'f',
            DType::Text => 'U',
            DType::Bytes => 'S',
            DType::DateTime => 'M',
            DType::TimeDelta => 'm',
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, DType::Bool | DType::Int | DType::Float)
    }

    /// Common dtype when stacking columns of type `self` and `other`.
    pub fn promote(self, other: DType) -> Result<DType> {
        use DType::*;
        if self == other {
            return Ok(self);
        }
        match (self, other) {
            (Bool, Int) | (Int, Bool) => Ok(Int),
            (Bool, Float) | (Float, Bool) | (Int, Float) | (Float, Int) => Ok(Float),
            (Text, Bytes) | (Bytes, Text) => Ok(Text),
            _ => Err(AdafError::ColumnType(format!(
                "can't combine {} with {}",
                self.name(),
                other.name()
            ))),
        }
    }

    /// Int and bool have no in-band missing value and need a mask.
    pub fn needs_mask(self) -> bool {
        matches!(self, DType::Bool | DType::Int)
    }
}

// ── ColumnData ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnData {
    Bool(Vec<bool>),
    Int(Vec<i64>),
    Float(Vec<f64>),
    Text(Vec<String>),
    Bytes(Vec<Vec<u8>>),
    DateTime(Vec<i64>),
    TimeDelta(Vec<i64>),
}

macro_rules! dispatch {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            ColumnData::Bool($v) => $body,
            ColumnData::Int($v) => $body,
            ColumnData::Float($v) => $body,
            ColumnData::Text($v) => $body,
            ColumnData::Bytes($v) => $body,
            ColumnData::DateTime($v) => $body,
            ColumnData::TimeDelta($v) => $body,
        }
    };
}

macro_rules! rebuild {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            ColumnData::Bool($v) => ColumnData::Bool($body),
            ColumnData::Int($v) => ColumnData::Int($body),
            ColumnData::Float($v) => ColumnData::Float($body),
            ColumnData::Text($v) => ColumnData::Text($body),
            ColumnData::Bytes($v) => ColumnData::Bytes($body),
            ColumnData::DateTime($v) => ColumnData::DateTime($body),
            ColumnData::TimeDelta($v) => ColumnData::TimeDelta($body),
        }
    };
}

impl ColumnData {
    pub fn dtype(&self) -> DType {
        match self {
            ColumnData::Bool(_) => DType::Bool,
            ColumnData::Int(_) => DType::Int,
            ColumnData::Float(_) => DType::Float,
            ColumnData::Text(_) => DType::Text,
            ColumnData::Bytes(_) => DType::Bytes,
            ColumnData::DateTime(_) => DType::DateTime,
            ColumnData::TimeDelta(_) => DType::TimeDelta,
        }
    }

    pub fn len(&self) -> usize {
        dispatch!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn empty(dtype: DType) -> Self {
        Self::filler(dtype, 0)
    }

    /// `n` missing values of `dtype`: NaN, empty string/bytes, NaT, or zero
    /// for int and bool (which rely on a mask instead).
    pub fn filler(dtype: DType, n: usize) -> Self {
        match dtype {
            DType::Bool => ColumnData::Bool(vec![false; n]),
            DType::Int => ColumnData::Int(vec![0; n]),
            DType::Float => ColumnData::Float(vec![f64::NAN; n]),
            DType::Text => ColumnData::Text(vec![String::new(); n]),
            DType::Bytes => ColumnData::Bytes(vec![Vec::new(); n]),
            DType::DateTime => ColumnData::DateTime(vec![NAT; n]),
            DType::TimeDelta => ColumnData::TimeDelta(vec![NAT; n]),
        }
    }

    pub fn cast(&self, to: DType) -> Result<ColumnData> {
        let from = self.dtype();
        if from == to {
            return Ok(self.clone());
        }
        let cast = match (self, to) {
            (ColumnData::Bool(v), DType::Int) => ColumnData::Int(v.iter().map(|&b| b as i64).collect()),
            (ColumnData::Bool(v), DType::Float) => {
                ColumnData::Float(v.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect())
            }
            (ColumnData::Int(v), DType::Float) => ColumnData::Float(v.iter().map(|&x| x as f64).collect()),
            (ColumnData::Bytes(v), DType::Text) => ColumnData::Text(
                v.iter()
                    .map(|b| String::from_utf8_lossy(b).into_owned())
                    .collect(),
            ),
            _ => {
                return Err(AdafError::ColumnType(format!(
                    "can't cast {} to {}",
                    from.name(),
                    to.name()
                )))
            }
        };
        Ok(cast)
    }

    pub fn take(&self, rows: &[usize]) -> ColumnData {
        rebuild!(self, v => rows.iter().map(|&i| v[i].clone()).collect())
    }

    /// Append `other`, which must have the same dtype.
    pub fn append(&mut self, other: &ColumnData) -> Result<()> {
        match (self, other) {
            (ColumnData::Bool(a), ColumnData::Bool(b)) => a.extend_from_slice(b),
            (ColumnData::Int(a), ColumnData::Int(b)) => a.extend_from_slice(b),
            (ColumnData::Float(a), ColumnData::Float(b)) => a.extend_from_slice(b),
            (ColumnData::Text(a), ColumnData::Text(b)) => a.extend_from_slice(b),
            (ColumnData::Bytes(a), ColumnData::Bytes(b)) => a.extend_from_slice(b),
            (ColumnData::DateTime(a), ColumnData::DateTime(b)) => a.extend_from_slice(b),
            (ColumnData::TimeDelta(a), ColumnData::TimeDelta(b)) => a.extend_from_slice(b),
            (a, b) => {
                return Err(AdafError::ColumnType(format!(
                    "can't append {} to {}",
                    b.dtype().name(),
                    a.dtype().name()
                )))
            }
        }
        Ok(())
    }

    /// True when row `i` holds the in-band missing value of its dtype.
    pub fn is_fill_at(&self, i: usize) -> bool {
        match self {
            ColumnData::Float(v) => v[i].is_nan(),
            ColumnData::Text(v) => v[i].is_empty(),
            ColumnData::Bytes(v) => v[i].is_empty(),
            ColumnData::DateTime(v) | ColumnData::TimeDelta(v) => v[i] == NAT,
            ColumnData::Bool(_) | ColumnData::Int(_) => false,
        }
    }

    /// Row `i` as an integral index value, if it has one.
    pub fn index_at(&self, i: usize) -> Option<i64> {
        match self {
            ColumnData::Int(v) => Some(v[i]),
            ColumnData::Bool(v) => Some(v[i] as i64),
            ColumnData::Float(v) if v[i].is_finite() && v[i].fract() == 0.0 => Some(v[i] as i64),
            _ => None,
        }
    }

    /// Numeric view of row `i`, used for basis arithmetic.
    pub fn float_at(&self, i: usize) -> Option<f64> {
        match self {
            ColumnData::Int(v) => Some(v[i] as f64),
            ColumnData::Bool(v) => Some(v[i] as i64 as f64),
            ColumnData::Float(v) => Some(v[i]),
            ColumnData::DateTime(v) | ColumnData::TimeDelta(v) if v[i] != NAT => Some(v[i] as f64),
            _ => None,
        }
    }

    /// Stable sort permutation. NaN and NaT sort last.
    pub fn argsort(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.len()).collect();
        match self {
            ColumnData::Bool(v) => order.sort_by_key(|&i| v[i]),
            ColumnData::Int(v) => order.sort_by_key(|&i| v[i]),
            ColumnData::Float(v) => order.sort_by(|&a, &b| cmp_float(v[a], v[b])),
            ColumnData::Text(v) => order.sort_by(|&a, &b| v[a].cmp(&v[b])),
            ColumnData::Bytes(v) => order.sort_by(|&a, &b| v[a].cmp(&v[b])),
            ColumnData::DateTime(v) | ColumnData::TimeDelta(v) => {
                order.sort_by_key(|&i| (v[i] == NAT, v[i]))
            }
        }
        order
    }

    pub fn to_json(&self, i: usize) -> serde_json::Value {
        use serde_json::Value;
        match self {
            ColumnData::Bool(v) => Value::from(v[i]),
            ColumnData::Int(v) => Value::from(v[i]),
            ColumnData::Float(v) => serde_json::Number::from_f64(v[i])
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ColumnData::Text(v) => Value::from(v[i].clone()),
            ColumnData::Bytes(v) => Value::from(String::from_utf8_lossy(&v[i]).into_owned()),
            ColumnData::DateTime(v) | ColumnData::TimeDelta(v) => {
                if v[i] == NAT {
                    Value::Null
                } else {
                    Value::from(v[i])
                }
            }
        }
    }
}

fn cmp_float(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (false, false) => a.total_cmp(&b),
        (a_nan, b_nan) => a_nan.cmp(&b_nan),
    }
}

macro_rules! impl_from_vec {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<Vec<$t>> for ColumnData {
                fn from(v: Vec<$t>) -> Self {
                    ColumnData::$variant(v)
                }
            }

            impl From<Vec<$t>> for Column {
                fn from(v: Vec<$t>) -> Self {
                    Column::new(ColumnData::$variant(v))
                }
            }
        )*
    };
}

impl_from_vec!(
    bool => Bool,
    i64 => Int,
    f64 => Float,
    String => Text,
    Vec<u8> => Bytes,
);

impl From<Vec<&str>> for ColumnData {
    fn from(v: Vec<&str>) -> Self {
        ColumnData::Text(v.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<&str>> for Column {
    fn from(v: Vec<&str>) -> Self {
        Column::new(ColumnData::from(v))
    }
}

impl From<ColumnData> for Column {
    fn from(data: ColumnData) -> Self {
        Column::new(data)
    }
}

// ── Column ─────────────────────────────────────────────────────────

/// Column payload plus an optional missing-value mask and attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    data: ColumnData,
    mask: Option<Vec<bool>>,
    attrs: Attributes,
}

impl Column {
    pub fn new(data: impl Into<ColumnData>) -> Self {
        Column {
            data: data.into(),
            mask: None,
            attrs: Attributes::new(),
        }
    }

    /// `mask[i] == true` marks row `i` as missing.
    pub fn with_mask(data: impl Into<ColumnData>, mask: Vec<bool>) -> Result<Self> {
        let data = data.into();
        if mask.len() != data.len() {
            return Err(AdafError::LengthMismatch {
                what: "mask".into(),
                expected: data.len(),
                actual: mask.len(),
            });
        }
        let mut column = Column::new(data);
        column.mask = Some(mask);
        column.normalize_mask();
        Ok(column)
    }

    /// Fully masked column of `n` rows.
    pub fn masked(dtype: DType, n: usize) -> Self {
        let mut column = Column::new(ColumnData::filler(dtype, n));
        if n > 0 {
            column.mask = Some(vec![true; n]);
        }
        column
    }

    pub fn with_attrs(mut self, attrs: Attributes) -> Self {
        self.attrs.update(&attrs);
        self
    }

    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    pub fn into_data(self) -> ColumnData {
        self.data
    }

    pub fn mask(&self) -> Option<&[bool]> {
        self.mask.as_deref()
    }

    pub fn is_masked(&self, i: usize) -> bool {
        self.mask.as_ref().map_or(false, |m| m[i])
    }

    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    pub fn attrs_mut(&mut self) -> &mut Attributes {
        &mut self.attrs
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn take(&self, rows: &[usize]) -> Column {
        let mut column = Column {
            data: self.data.take(rows),
            mask: self
                .mask
                .as_ref()
                .map(|m| rows.iter().map(|&i| m[i]).collect()),
            attrs: self.attrs.clone(),
        };
        column.normalize_mask();
        column
    }

    pub fn cast(&self, dtype: DType) -> Result<Column> {
        Ok(Column {
            data: self.data.cast(dtype)?,
            mask: self.mask.clone(),
            attrs: self.attrs.clone(),
        })
    }

    /// Append rows of `other`, promoting the dtype when needed.
    pub fn append(&mut self, other: &Column) -> Result<()> {
        let dtype = self.dtype().promote(other.dtype())?;
        if dtype != self.dtype() {
            self.data = self.data.cast(dtype)?;
        }
        let len = self.len();
        self.data.append(&other.data.cast(dtype)?)?;
        if self.mask.is_some() || other.mask.is_some() {
            let mut mask = self.mask.take().unwrap_or_else(|| vec![false; len]);
            match &other.mask {
                Some(m) => mask.extend_from_slice(m),
                None => mask.resize(mask.len() + other.len(), false),
            }
            self.mask = Some(mask);
        }
        Ok(())
    }

    /// Extend with `n` masked rows.
    pub fn pad_masked(&mut self, n: usize) -> Result<()> {
        if n == 0 {
            return Ok(());
        }
        let filler = Column::masked(self.dtype(), n);
        self.append(&filler)
    }

    /// True when every row is masked or holds its dtype's missing value.
    pub fn is_all_fill(&self) -> bool {
        (0..self.len()).all(|i| self.is_masked(i) || self.data.is_fill_at(i))
    }

    /// Integral value of row `i`; `None` for masked or non-integral rows.
    pub fn index_at(&self, i: usize) -> Option<i64> {
        if self.is_masked(i) {
            None
        } else {
            self.data.index_at(i)
        }
    }

    pub(crate) fn set_data(&mut self, data: ColumnData) {
        debug_assert_eq!(data.len(), self.data.len());
        self.data = data;
    }

    fn normalize_mask(&mut self) {
        if self.mask.as_ref().map_or(false, |m| !m.iter().any(|&b| b)) {
            self.mask = None;
        }
    }
}

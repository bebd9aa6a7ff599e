use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::io::fits::Header;
use crate::units::Unit;
use crate::wcs::Wcs;

// ---------------------------------------------------------------------------
// MetadataValue – a single metadata entry
// ---------------------------------------------------------------------------

/// A dynamically-typed metadata value, as found in FITS cards and ECSV `meta`.
///
/// Values are totally ordered, kinds first (null, bool, integer, float,
/// string, date), so they can key `BTreeMap` / `BTreeSet`.
#[derive(Debug, Clone)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    /// ISO-8601 date string kept as text (FITS `DATE-OBS`).
    Date(String),
    Null,
}

impl MetadataValue {
    fn rank(&self) -> u8 {
        match self {
            MetadataValue::Null => 0,
            MetadataValue::Bool(_) => 1,
            MetadataValue::Integer(_) => 2,
            MetadataValue::Float(_) => 3,
            MetadataValue::String(_) => 4,
            MetadataValue::Date(_) => 5,
        }
    }
}

// Equality follows the ordering, so NaN equals itself.
impl PartialEq for MetadataValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MetadataValue {}

impl PartialOrd for MetadataValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MetadataValue {
    fn cmp(&self, other: &Self) -> Ordering {
        use MetadataValue::*;
        match (self, other) {
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) | (Date(a), Date(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for MetadataValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            MetadataValue::String(s) | MetadataValue::Date(s) => s.hash(state),
            MetadataValue::Integer(i) => i.hash(state),
            MetadataValue::Float(f) => f.to_bits().hash(state),
            MetadataValue::Bool(b) => b.hash(state),
            MetadataValue::Null => {}
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => write!(f, "{s}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v}"),
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Date(d) => write!(f, "{d}"),
            MetadataValue::Null => write!(f, "<null>"),
        }
    }
}

impl MetadataValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Float(v) => Some(*v),
            MetadataValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Meta – free-form metadata plus the originating FITS header
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Meta {
    pub entries: BTreeMap<String, MetadataValue>,
    /// Primary header of the file the data came from, if it was FITS.
    pub header: Option<Header>,
}

impl Meta {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.header.is_none()
    }

    /// Flattened `(key, value)` rows for display: entries first, then header cards.
    pub fn rows(&self) -> Vec<(String, MetadataValue)> {
        let mut rows: Vec<(String, MetadataValue)> = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if let Some(header) = &self.header {
            rows.extend(header.to_metadata());
        }
        rows
    }
}

// ---------------------------------------------------------------------------
// Uncertainty
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UncertaintyKind {
    StdDev,
    Variance,
    InverseVariance,
}

/// Per-sample uncertainty, same length as the flux it accompanies.
#[derive(Debug, Clone, PartialEq)]
pub struct Uncertainty {
    pub kind: UncertaintyKind,
    pub values: Vec<f64>,
}

impl Uncertainty {
    pub fn std_dev(values: Vec<f64>) -> Self {
        Uncertainty {
            kind: UncertaintyKind::StdDev,
            values,
        }
    }

    /// Values expressed as standard deviations. A non-positive inverse
    /// variance maps to infinity.
    pub fn to_std_dev(&self) -> Vec<f64> {
        match self.kind {
            UncertaintyKind::StdDev => self.values.clone(),
            UncertaintyKind::Variance => self.values.iter().map(|v| v.sqrt()).collect(),
            UncertaintyKind::InverseVariance => self
                .values
                .iter()
                .map(|&v| if v > 0.0 { 1.0 / v.sqrt() } else { f64::INFINITY })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Spectrum – what a format loader produces
// ---------------------------------------------------------------------------

/// A one-dimensional spectrum as parsed from a file.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    pub flux: Vec<f64>,
    pub flux_unit: Unit,
    /// Explicit dispersion values; when absent the WCS describes the axis.
    pub spectral_axis: Option<Vec<f64>>,
    pub spectral_axis_unit: Option<Unit>,
    pub wcs: Option<Wcs>,
    pub uncertainty: Option<Uncertainty>,
    /// `true` marks a bad sample.
    pub mask: Option<Vec<bool>>,
    pub meta: Meta,
}

impl Spectrum {
    pub fn new(flux: Vec<f64>, flux_unit: Unit) -> Self {
        Spectrum {
            flux,
            flux_unit,
            spectral_axis: None,
            spectral_axis_unit: None,
            wcs: None,
            uncertainty: None,
            mask: None,
            meta: Meta::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.flux.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flux.is_empty()
    }
}

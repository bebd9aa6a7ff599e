use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::path::Path;

use thiserror::Error;

use super::model::{Meta, Spectrum, Uncertainty};
use crate::io::{LoadError, LoaderRegistry, ReadOptions};
use crate::units::{Unit, UnitError};
use crate::wcs::{Wcs, WcsError};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("mask has {found} entries but data has {expected}")]
    MaskLength { expected: usize, found: usize },
    #[error("data {0} no longer exists")]
    MissingSource(DataId),
    #[error("range {start}..{end} out of bounds for length {len}")]
    OutOfBounds { start: usize, end: usize, len: usize },
    #[error("operands have lengths {left} and {right}")]
    LengthMismatch { left: usize, right: usize },
    #[error(transparent)]
    Unit(#[from] UnitError),
}

// ---------------------------------------------------------------------------
// Data – flux plus lazily derived dispersion
// ---------------------------------------------------------------------------

/// A loaded spectrum as the application sees it.
///
/// The dispersion axis is computed on first access and cached for the
/// lifetime of the value; later edits to the flux or WCS do not invalidate it.
#[derive(Debug, Clone)]
pub struct Data {
    flux: Vec<f64>,
    unit: Unit,
    wcs: Option<Wcs>,
    uncertainty: Option<Uncertainty>,
    mask: Option<Vec<bool>>,
    meta: Meta,
    name: String,
    dispersion_unit: Option<Unit>,
    dispersion: OnceCell<Vec<f64>>,
}

impl Data {
    pub fn new(flux: Vec<f64>, unit: Unit) -> Self {
        Data {
            flux,
            unit,
            wcs: None,
            uncertainty: None,
            mask: None,
            meta: Meta::default(),
            name: "New Data Object".to_string(),
            dispersion_unit: None,
            dispersion: OnceCell::new(),
        }
    }

    pub fn with_wcs(mut self, wcs: Wcs) -> Self {
        self.wcs = Some(wcs);
        self
    }

    pub fn with_uncertainty(mut self, uncertainty: Uncertainty) -> Self {
        self.uncertainty = Some(uncertainty);
        self
    }

    pub fn with_mask(mut self, mask: Vec<bool>) -> Self {
        self.mask = Some(mask);
        self
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Supply the dispersion up front instead of deriving it from the WCS.
    pub fn with_dispersion(self, dispersion: Vec<f64>) -> Self {
        let cell = OnceCell::new();
        let _ = cell.set(dispersion);
        Data {
            dispersion: cell,
            ..self
        }
    }

    pub fn with_dispersion_unit(mut self, unit: Unit) -> Self {
        self.dispersion_unit = Some(unit);
        self
    }

    pub fn from_spectrum(spectrum: Spectrum) -> Self {
        let Spectrum {
            flux,
            flux_unit,
            spectral_axis,
            spectral_axis_unit,
            wcs,
            uncertainty,
            mask,
            meta,
        } = spectrum;

        let mut data = Data::new(flux, flux_unit).with_meta(meta);
        data.wcs = wcs;
        data.uncertainty = uncertainty;
        data.mask = mask;
        data.dispersion_unit = spectral_axis_unit;
        if let Some(axis) = spectral_axis {
            data = data.with_dispersion(axis);
        }
        data
    }

    /// Read a file through the default loader registry.
    pub fn read(path: &Path, opts: &ReadOptions) -> Result<Data, LoadError> {
        Data::read_with(&LoaderRegistry::default(), path, opts)
    }

    pub fn read_with(
        registry: &LoaderRegistry,
        path: &Path,
        opts: &ReadOptions,
    ) -> Result<Data, LoadError> {
        let spectrum = registry.read(path, opts)?;
        let mut data = Data::from_spectrum(spectrum);
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            data.name = stem.to_string();
        }
        Ok(data)
    }

    // -- dispersion ----------------------------------------------------------

    /// Dispersion axis, computed at most once.
    ///
    /// Uses the supplied axis if any, else `crval + i·cdelt` from the first
    /// WCS axis. A missing or unusable WCS logs a warning and yields
    /// `0, 1, ..., len-1`.
    pub fn dispersion(&self) -> &[f64] {
        self.dispersion.get_or_init(|| self.derive_dispersion())
    }

    pub fn is_dispersion_cached(&self) -> bool {
        self.dispersion.get().is_some()
    }

    fn derive_dispersion(&self) -> Vec<f64> {
        let len = self.flux.len();
        let derived = match &self.wcs {
            Some(wcs) => wcs.spectral_axis(len),
            None => Err(WcsError::NoAxes),
        };
        derived.unwrap_or_else(|e| {
            log::warn!("Invalid FITS headers ({e}); constructing default dispersion array.");
            (0..len).map(|i| i as f64).collect()
        })
    }

    /// Explicit unit, else `CUNIT1`, else dimensionless with a warning.
    pub fn dispersion_unit(&self) -> Unit {
        self.known_dispersion_unit().unwrap_or_else(|| {
            log::warn!("No dispersion unit information in WCS.");
            Unit::dimensionless()
        })
    }

    pub(super) fn known_dispersion_unit(&self) -> Option<Unit> {
        self.dispersion_unit
            .clone()
            .or_else(|| self.wcs.as_ref().and_then(|w| w.cunit(0)))
    }

    // -- accessors -------------------------------------------------------------

    pub fn flux(&self) -> &[f64] {
        &self.flux
    }

    pub fn flux_mut(&mut self) -> &mut Vec<f64> {
        &mut self.flux
    }

    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    /// Re-tag the flux with a new unit. Values are not rescaled.
    pub fn set_unit(&mut self, unit: Unit) {
        self.unit = unit;
    }

    pub fn wcs(&self) -> Option<&Wcs> {
        self.wcs.as_ref()
    }

    pub fn set_wcs(&mut self, wcs: Option<Wcs>) {
        self.wcs = wcs;
    }

    pub fn uncertainty(&self) -> Option<&Uncertainty> {
        self.uncertainty.as_ref()
    }

    pub fn mask(&self) -> Option<&[bool]> {
        self.mask.as_deref()
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.flux.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flux.is_empty()
    }

    /// Copy of samples `range`, carrying the matching dispersion values.
    pub fn slice(&self, range: Range<usize>) -> Result<Data, DataError> {
        let len = self.len();
        if range.start > range.end || range.end > len {
            return Err(DataError::OutOfBounds {
                start: range.start,
                end: range.end,
                len,
            });
        }

        let dispersion = self.dispersion()[range.clone()].to_vec();
        let mut out = Data::new(self.flux[range.clone()].to_vec(), self.unit.clone())
            .with_meta(self.meta.clone())
            .with_name(format!("{} [{}..{}]", self.name, range.start, range.end))
            .with_dispersion(dispersion);
        out.dispersion_unit = self.known_dispersion_unit();
        out.wcs = self.wcs.as_ref().map(|w| w.shifted(range.start));
        out.uncertainty = self.uncertainty.as_ref().map(|u| Uncertainty {
            kind: u.kind,
            values: u.values[range.clone()].to_vec(),
        });
        out.mask = self.mask.as_ref().map(|m| m[range.clone()].to_vec());
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// DataStore – owner of all Data, addressed by id
// ---------------------------------------------------------------------------

/// Handle to a [`Data`] inside a [`DataStore`]. Ids are never reused, so a
/// handle to removed data stays dangling instead of aliasing new data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DataId(u64);

impl fmt::Display for DataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct DataStore {
    next_id: u64,
    items: BTreeMap<DataId, Data>,
}

impl DataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, data: Data) -> DataId {
        let id = DataId(self.next_id);
        self.next_id += 1;
        self.items.insert(id, data);
        id
    }

    pub fn get(&self, id: DataId) -> Option<&Data> {
        self.items.get(&id)
    }

    pub fn get_mut(&mut self, id: DataId) -> Option<&mut Data> {
        self.items.get_mut(&id)
    }

    pub fn require(&self, id: DataId) -> Result<&Data, DataError> {
        self.get(id).ok_or(DataError::MissingSource(id))
    }

    pub fn remove(&mut self, id: DataId) -> Option<Data> {
        self.items.remove(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (DataId, &Data)> {
        self.items.iter().map(|(id, d)| (*id, d))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_name() {
        assert_eq!(Data::new(vec![], Unit::jansky()).name(), "New Data Object");
    }

    #[test]
    fn test_dispersion_without_wcs_is_index() {
        let data = Data::new(vec![5.0; 4], Unit::jansky());
        assert!(!data.is_dispersion_cached());
        assert_eq!(data.dispersion(), &[0.0, 1.0, 2.0, 3.0]);
        assert!(data.is_dispersion_cached());
    }

    #[test]
    fn test_dispersion_from_wcs() {
        let data = Data::new(vec![0.0; 5], Unit::jansky()).with_wcs(Wcs::linear(6000.0, -0.5, None));
        let d = data.dispersion();
        for (i, v) in d.iter().enumerate() {
            assert_eq!(*v, 6000.0 + i as f64 * -0.5);
        }
        assert_eq!(d.len(), 5);
    }

    #[test]
    fn test_malformed_wcs_falls_back() {
        let data = Data::new(vec![0.0; 3], Unit::jansky()).with_wcs(Wcs::default());
        assert_eq!(data.dispersion(), &[0.0, 1.0, 2.0]);

        let data = Data::new(vec![0.0; 2], Unit::jansky()).with_wcs(Wcs::linear(f64::NAN, 1.0, None));
        assert_eq!(data.dispersion(), &[0.0, 1.0]);
    }

    #[test]
    fn test_dispersion_first_access_wins() {
        let mut data = Data::new(vec![1.0, 2.0], Unit::jansky()).with_wcs(Wcs::linear(10.0, 1.0, None));
        let first = data.dispersion().to_vec();

        data.flux_mut().push(3.0);
        data.set_wcs(Some(Wcs::linear(99.0, 5.0, None)));

        assert_eq!(data.dispersion(), first.as_slice());
        assert_eq!(first, vec![10.0, 11.0]);
    }

    #[test]
    fn test_supplied_dispersion_is_kept() {
        let data = Data::new(vec![1.0, 2.0], Unit::jansky())
            .with_wcs(Wcs::linear(10.0, 1.0, None))
            .with_dispersion(vec![3.0, 7.0]);
        assert_eq!(data.dispersion(), &[3.0, 7.0]);
    }

    #[test]
    fn test_dispersion_unit_sources() {
        let explicit = Data::new(vec![], Unit::jansky()).with_dispersion_unit(Unit::angstrom());
        assert_eq!(explicit.dispersion_unit(), Unit::angstrom());

        let from_wcs = Data::new(vec![], Unit::jansky()).with_wcs(Wcs::linear(0.0, 1.0, Some("nm")));
        assert_eq!(from_wcs.dispersion_unit(), Unit::parse("nm").unwrap());

        let none = Data::new(vec![], Unit::jansky());
        assert!(none.dispersion_unit().is_dimensionless());
    }

    #[test]
    fn test_from_spectrum_prefers_explicit_axis() {
        let mut sp = Spectrum::new(vec![1.0, 2.0], Unit::jansky());
        sp.spectral_axis = Some(vec![500.0, 510.0]);
        sp.spectral_axis_unit = Some(Unit::parse("nm").unwrap());
        let data = Data::from_spectrum(sp);
        assert!(data.is_dispersion_cached());
        assert_eq!(data.dispersion(), &[500.0, 510.0]);
        assert_eq!(data.dispersion_unit().symbol(), "nm");
    }

    #[test]
    fn test_slice() {
        let data = Data::new(vec![1.0, 2.0, 3.0, 4.0], Unit::jansky())
            .with_wcs(Wcs::linear(100.0, 2.0, Some("Angstrom")))
            .with_uncertainty(Uncertainty::std_dev(vec![0.1, 0.2, 0.3, 0.4]))
            .with_mask(vec![false, true, false, false]);

        let part = data.slice(1..3).unwrap();
        assert_eq!(part.flux(), &[2.0, 3.0]);
        assert_eq!(part.dispersion(), &[102.0, 104.0]);
        assert_eq!(part.uncertainty().unwrap().values, vec![0.2, 0.3]);
        assert_eq!(part.mask(), Some(&[true, false][..]));
        assert_eq!(part.wcs().unwrap().axes[0].crval, 102.0);
        assert_eq!(part.dispersion_unit(), Unit::angstrom());

        assert!(matches!(
            data.slice(2..9),
            Err(DataError::OutOfBounds { len: 4, .. })
        ));
    }

    #[test]
    fn test_store_ids_not_reused() {
        let mut store = DataStore::new();
        let a = store.insert(Data::new(vec![1.0], Unit::jansky()));
        store.remove(a);
        let b = store.insert(Data::new(vec![2.0], Unit::jansky()));
        assert_ne!(a, b);
        assert_eq!(store.require(a).unwrap_err(), DataError::MissingSource(a));
        assert_eq!(store.get(b).unwrap().flux(), &[2.0]);
        assert_eq!(store.len(), 1);
    }
}

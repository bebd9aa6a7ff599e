use std::path::Path;

use super::fits::{FitsError, FitsFile};
use super::registry::LoadError;
use crate::data::model::{Meta, Spectrum, Uncertainty};
use crate::units::Unit;
use crate::wcs::Wcs;

/// `.fits` extension and HDU 1 is a binary table.
///
/// The file is opened as soon as the extension matches, so a missing or
/// unreadable `.fits` path is an error rather than `false`. A file with only
/// a primary HDU is not tabular.
pub fn identify_tabular_fits(path: &Path) -> Result<bool, LoadError> {
    let is_fits = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("fits"));
    if !is_fits {
        return Ok(false);
    }
    let file = FitsFile::open(path)?;
    Ok(file.is_bintable(1))
}

/// Read a spectrum stored as `flux` / `err` columns of the first binary
/// table, with the spectral WCS in the primary header.
///
/// The flux unit is always Jansky; a `TUNIT` on the flux column is not
/// consulted.
pub fn tabular_fits(path: &Path) -> Result<Spectrum, LoadError> {
    let file = FitsFile::open(path)?;
    let header = file.primary_header();
    let (index, table) = file.first_bintable()?;

    let column = |name: &str| -> Result<Vec<f64>, FitsError> {
        table
            .column(name)
            .and_then(|c| c.as_f64())
            .ok_or_else(|| FitsError::MissingColumn(name.to_string()))
    };
    let flux = column("flux")?;
    let err = column("err")?;

    if let Some(unit) = table.column("flux").and_then(|c| c.unit.as_deref()) {
        if Unit::parse(unit).ok() != Some(Unit::jansky()) {
            log::debug!("flux column declares '{unit}', reading as Jy regardless");
        }
    }
    log::debug!(
        "tabular FITS {}: HDU {index}, {} rows",
        path.display(),
        flux.len()
    );

    let wcs = Wcs::from_header(&header)?;
    let mut spectrum = Spectrum::new(flux, Unit::jansky());
    spectrum.wcs = Some(wcs);
    spectrum.uncertainty = Some(Uncertainty::std_dev(err));
    spectrum.meta = Meta {
        header: Some(header),
        ..Meta::default()
    };
    Ok(spectrum)
}

use std::collections::BTreeMap;
use std::str::FromStr;

use thiserror::Error;

use super::table::{Column, Table};
use crate::data::model::{Spectrum, Uncertainty, UncertaintyKind};
use crate::units::{PhysicalType, Unit, UnitError};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no column usable as {0}")]
    MissingColumn(String),
    #[error("unknown spectrum field '{0}'")]
    UnknownField(String),
    #[error("column '{0}' is not numeric")]
    NonNumeric(String),
    #[error("column '{column}' has {found} rows, flux has {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },
    #[error("column '{column}': {source}")]
    Unit {
        column: String,
        #[source]
        source: UnitError,
    },
}

// ---------------------------------------------------------------------------
// Column mapping
// ---------------------------------------------------------------------------

/// Spectrum field a mapped column feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectrumField {
    Flux,
    SpectralAxis,
    /// Standard deviation.
    Uncertainty,
    /// Non-zero marks a bad sample.
    Mask,
}

impl FromStr for SpectrumField {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flux" => Ok(SpectrumField::Flux),
            "spectral_axis" | "dispersion" => Ok(SpectrumField::SpectralAxis),
            "uncertainty" => Ok(SpectrumField::Uncertainty),
            "mask" => Ok(SpectrumField::Mask),
            other => Err(ParseError::UnknownField(other.to_string())),
        }
    }
}

/// Source column name → (target field name, unit string).
///
/// ```text
/// { "FLUX": ("flux", "Jy"), "LAMBDA": ("spectral_axis", "Angstrom") }
/// ```
pub type ColumnMapping = BTreeMap<String, (String, String)>;

// ---------------------------------------------------------------------------
// Heuristic assignment
// ---------------------------------------------------------------------------

const SPECTRAL_AXIS_NAMES: &[&str] = &[
    "wavelength",
    "wave",
    "lambda",
    "wl",
    "dispersion",
    "spectral_axis",
    "frequency",
    "freq",
    "energy",
];

const FLUX_NAMES: &[&str] = &["flux", "flux_density", "intensity", "counts", "data"];

fn column_unit(column: &Column) -> Result<Option<Unit>, ParseError> {
    column
        .unit
        .as_deref()
        .map(Unit::parse)
        .transpose()
        .map_err(|source| ParseError::Unit {
            column: column.name.clone(),
            source,
        })
}

/// Physical type of a column's unit; unparsable units count as unknown.
fn unit_type(column: &Column) -> Option<PhysicalType> {
    column
        .unit
        .as_deref()
        .and_then(|u| Unit::parse(u).ok())
        .map(|u| u.physical_type())
}

fn numeric(column: &Column) -> Result<Vec<f64>, ParseError> {
    column
        .as_f64()
        .ok_or_else(|| ParseError::NonNumeric(column.name.clone()))
}

fn check_len(column: &str, values: &[f64], expected: usize) -> Result<(), ParseError> {
    if values.len() != expected {
        return Err(ParseError::LengthMismatch {
            column: column.to_string(),
            expected,
            found: values.len(),
        });
    }
    Ok(())
}

/// Find the spectral axis, flux and uncertainty columns without guidance.
///
/// * spectral axis: first column with a length/frequency/energy unit, else
///   first with a conventional name (`wavelength`, `freq`, ...)
/// * flux: first other column with a flux-density or counts unit, else
///   first with a conventional name (`flux`, `intensity`, ...)
/// * uncertainty: first other column whose name mentions `ivar`, `var`,
///   or `err`/`unc`/`sigma`, checked in that order
pub fn generic_spectrum_from_table(table: &Table) -> Result<Spectrum, ParseError> {
    let numeric_columns: Vec<&Column> = table
        .columns
        .iter()
        .filter(|c| c.data.is_numeric())
        .collect();

    let axis = numeric_columns
        .iter()
        .find(|c| unit_type(c) == Some(PhysicalType::SpectralAxis))
        .or_else(|| {
            numeric_columns
                .iter()
                .find(|c| SPECTRAL_AXIS_NAMES.contains(&c.name.to_ascii_lowercase().as_str()))
        })
        .copied()
        .ok_or_else(|| ParseError::MissingColumn("spectral axis".to_string()))?;

    let rest: Vec<&Column> = numeric_columns
        .iter()
        .copied()
        .filter(|c| !std::ptr::eq(*c, axis))
        .collect();

    let flux = rest
        .iter()
        .find(|c| {
            matches!(
                unit_type(c),
                Some(PhysicalType::FluxDensity) | Some(PhysicalType::Counts)
            )
        })
        .or_else(|| {
            rest.iter()
                .find(|c| FLUX_NAMES.contains(&c.name.to_ascii_lowercase().as_str()))
        })
        .copied()
        .ok_or_else(|| ParseError::MissingColumn("flux".to_string()))?;

    let uncertainty = find_uncertainty(&rest, flux);

    log::debug!(
        "generic table mapping: axis='{}', flux='{}', uncertainty={:?}",
        axis.name,
        flux.name,
        uncertainty.map(|(c, _)| &c.name)
    );

    let flux_values = numeric(flux)?;
    let n = flux_values.len();
    let axis_values = numeric(axis)?;
    check_len(&axis.name, &axis_values, n)?;

    let mut spectrum = Spectrum::new(flux_values, column_unit(flux)?.unwrap_or_default());
    spectrum.spectral_axis = Some(axis_values);
    spectrum.spectral_axis_unit = column_unit(axis)?;
    if let Some((column, kind)) = uncertainty {
        let values = numeric(column)?;
        check_len(&column.name, &values, n)?;
        spectrum.uncertainty = Some(Uncertainty { kind, values });
    }
    spectrum.meta = table.meta.clone();
    Ok(spectrum)
}

fn find_uncertainty<'a>(
    columns: &[&'a Column],
    flux: &Column,
) -> Option<(&'a Column, UncertaintyKind)> {
    let candidates: Vec<(&'a Column, String)> = columns
        .iter()
        .filter(|c| !std::ptr::eq(**c, flux))
        .map(|c| (*c, c.name.to_ascii_lowercase()))
        .collect();
    let by = |pred: &dyn Fn(&str) -> bool| {
        candidates
            .iter()
            .find(|(_, name)| pred(name.as_str()))
            .map(|(c, _)| *c)
    };

    by(&|n| n.contains("ivar"))
        .map(|c| (c, UncertaintyKind::InverseVariance))
        .or_else(|| by(&|n| n.contains("var")).map(|c| (c, UncertaintyKind::Variance)))
        .or_else(|| {
            by(&|n| n.contains("err") || n.contains("unc") || n.contains("sigma"))
                .map(|c| (c, UncertaintyKind::StdDev))
        })
}

// ---------------------------------------------------------------------------
// Explicit mapping
// ---------------------------------------------------------------------------

/// Build a spectrum from an explicit column mapping. Units in the mapping
/// override whatever the file declares.
pub fn spectrum_from_column_mapping(
    table: &Table,
    mapping: &ColumnMapping,
) -> Result<Spectrum, ParseError> {
    let mut flux: Option<(Vec<f64>, Unit)> = None;
    let mut axis: Option<(Vec<f64>, Unit)> = None;
    let mut uncertainty: Option<(String, Vec<f64>)> = None;
    let mut mask: Option<(String, Vec<bool>)> = None;

    for (name, (field, unit)) in mapping {
        let field: SpectrumField = field.parse()?;
        let column = table
            .column(name)
            .ok_or_else(|| ParseError::MissingColumn(name.clone()))?;
        let unit = Unit::parse(unit).map_err(|source| ParseError::Unit {
            column: name.clone(),
            source,
        })?;

        match field {
            SpectrumField::Flux => flux = Some((numeric(column)?, unit)),
            SpectrumField::SpectralAxis => axis = Some((numeric(column)?, unit)),
            SpectrumField::Uncertainty => uncertainty = Some((name.clone(), numeric(column)?)),
            SpectrumField::Mask => {
                let values = column
                    .as_bool()
                    .ok_or_else(|| ParseError::NonNumeric(name.clone()))?;
                mask = Some((name.clone(), values));
            }
        }
    }

    let (flux_values, flux_unit) = flux.ok_or_else(|| ParseError::MissingColumn("flux".to_string()))?;
    let n = flux_values.len();
    let mut spectrum = Spectrum::new(flux_values, flux_unit);

    if let Some((values, unit)) = axis {
        check_len("spectral_axis", &values, n)?;
        spectrum.spectral_axis = Some(values);
        spectrum.spectral_axis_unit = Some(unit);
    }
    if let Some((name, values)) = uncertainty {
        check_len(&name, &values, n)?;
        spectrum.uncertainty = Some(Uncertainty::std_dev(values));
    }
    if let Some((name, values)) = mask {
        if values.len() != n {
            return Err(ParseError::LengthMismatch {
                column: name,
                expected: n,
                found: values.len(),
            });
        }
        spectrum.mask = Some(values);
    }
    spectrum.meta = table.meta.clone();
    Ok(spectrum)
}

//! Element-wise arithmetic between [`Data`] values.
//!
//! The result always inherits the left operand's dispersion, WCS, meta and
//! dispersion unit. Standard-deviation uncertainties are propagated to first
//! order assuming uncorrelated operands, and bad-sample masks are OR-ed.

use super::container::{Data, DataError};
use super::model::Uncertainty;
use crate::units::{Unit, UnitError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Op {
    fn symbol(self) -> &'static str {
        match self {
            Op::Add => "+",
            Op::Subtract => "-",
            Op::Multiply => "*",
            Op::Divide => "/",
        }
    }
}

pub fn add(left: &Data, right: &Data) -> Result<Data, DataError> {
    combine(left, right, Op::Add)
}

pub fn subtract(left: &Data, right: &Data) -> Result<Data, DataError> {
    combine(left, right, Op::Subtract)
}

pub fn multiply(left: &Data, right: &Data) -> Result<Data, DataError> {
    combine(left, right, Op::Multiply)
}

pub fn divide(left: &Data, right: &Data) -> Result<Data, DataError> {
    combine(left, right, Op::Divide)
}

/// Multiply flux and uncertainty by a constant.
pub fn scale(data: &Data, factor: f64) -> Data {
    let flux = data.flux().iter().map(|v| v * factor).collect();
    let uncertainty = data
        .uncertainty()
        .map(|u| u.to_std_dev().iter().map(|s| s * factor.abs()).collect());
    inherit(data, flux, data.unit().clone(), uncertainty, data.mask().map(<[bool]>::to_vec))
        .with_name(format!("{} * {factor}", data.name()))
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

/// Result unit and the factor applied to the right operand's values.
fn resolve_units(left: &Unit, right: &Unit, op: Op) -> Result<(Unit, f64), UnitError> {
    match op {
        Op::Add | Op::Subtract => Ok((left.clone(), right.conversion_factor(left)?)),
        Op::Multiply | Op::Divide if right.is_dimensionless() => Ok((
            left.clone(),
            right.conversion_factor(&Unit::dimensionless())?,
        )),
        Op::Divide if right.is_convertible(left) => {
            Ok((Unit::dimensionless(), right.conversion_factor(left)?))
        }
        _ => Err(UnitError::Unsupported(format!(
            "{} {} {}",
            left,
            op.symbol(),
            right
        ))),
    }
}

fn combine(left: &Data, right: &Data, op: Op) -> Result<Data, DataError> {
    if left.len() != right.len() {
        return Err(DataError::LengthMismatch {
            left: left.len(),
            right: right.len(),
        });
    }
    let (unit, k) = resolve_units(left.unit(), right.unit(), op)?;

    let a = left.flux();
    let b: Vec<f64> = right.flux().iter().map(|v| v * k).collect();
    let flux: Vec<f64> = a
        .iter()
        .zip(&b)
        .map(|(&x, &y)| match op {
            Op::Add => x + y,
            Op::Subtract => x - y,
            Op::Multiply => x * y,
            Op::Divide => x / y,
        })
        .collect();

    let sa = left.uncertainty().map(Uncertainty::to_std_dev);
    let sb = right
        .uncertainty()
        .map(|u| u.to_std_dev().iter().map(|s| s * k.abs()).collect::<Vec<_>>());
    let uncertainty = match (sa, sb) {
        (None, None) => None,
        (sa, sb) => {
            let zeros = vec![0.0; a.len()];
            let sa = sa.unwrap_or_else(|| zeros.clone());
            let sb = sb.unwrap_or(zeros);
            Some(
                (0..a.len())
                    .map(|i| propagate(op, a[i], sa[i], b[i], sb[i], flux[i]))
                    .collect(),
            )
        }
    };

    let mask = match (left.mask(), right.mask()) {
        (None, None) => None,
        (l, r) => Some(
            (0..a.len())
                .map(|i| l.is_some_and(|m| m[i]) || r.is_some_and(|m| m[i]))
                .collect(),
        ),
    };

    Ok(inherit(left, flux, unit, uncertainty, mask)
        .with_name(format!("{} {} {}", left.name(), op.symbol(), right.name())))
}

fn propagate(op: Op, a: f64, sa: f64, b: f64, sb: f64, result: f64) -> f64 {
    match op {
        Op::Add | Op::Subtract => sa.hypot(sb),
        Op::Multiply | Op::Divide => result.abs() * (sa / a).hypot(sb / b),
    }
}

fn inherit(
    source: &Data,
    flux: Vec<f64>,
    unit: Unit,
    uncertainty: Option<Vec<f64>>,
    mask: Option<Vec<bool>>,
) -> Data {
    let mut out = Data::new(flux, unit)
        .with_meta(source.meta().clone())
        .with_dispersion(source.dispersion().to_vec());
    if let Some(wcs) = source.wcs() {
        out = out.with_wcs(wcs.clone());
    }
    if let Some(unit) = source.known_dispersion_unit() {
        out = out.with_dispersion_unit(unit);
    }
    if let Some(values) = uncertainty {
        out = out.with_uncertainty(Uncertainty::std_dev(values));
    }
    if let Some(mask) = mask {
        out = out.with_mask(mask);
    }
    out
}

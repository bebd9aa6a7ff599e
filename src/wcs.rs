//! Linear world coordinate system read from FITS header keywords.
//!
//! Only the linear part of the standard is modelled: per axis a reference
//! value (`CRVALn`), a step (`CDELTn`, falling back to `CDn_n`), a reference
//! pixel (`CRPIXn`), a type (`CTYPEn`) and a unit (`CUNITn`).

use thiserror::Error;

use crate::io::fits::{FitsError, Header};
use crate::units::Unit;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WcsError {
    #[error("WCS has no axes")]
    NoAxes,
    #[error("invalid WCS keyword '{keyword}': {reason}")]
    InvalidKeyword { keyword: String, reason: String },
    #[error("degenerate spectral axis (crval={crval}, cdelt={cdelt})")]
    Degenerate { crval: f64, cdelt: f64 },
}

impl From<FitsError> for WcsError {
    fn from(err: FitsError) -> Self {
        match err {
            FitsError::InvalidKeyword { keyword, reason } => {
                WcsError::InvalidKeyword { keyword, reason }
            }
            other => WcsError::InvalidKeyword {
                keyword: String::new(),
                reason: other.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WcsAxis {
    pub crval: f64,
    pub cdelt: f64,
    pub crpix: f64,
    pub ctype: Option<String>,
    /// Unit string as written; parsed lazily by [`Wcs::cunit`].
    pub cunit: Option<String>,
}

impl Default for WcsAxis {
    fn default() -> Self {
        WcsAxis {
            crval: 0.0,
            cdelt: 1.0,
            crpix: 1.0,
            ctype: None,
            cunit: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Wcs {
    pub axes: Vec<WcsAxis>,
}

const AXIS_KEYS: &[&str] = &["CRVAL", "CDELT", "CRPIX", "CTYPE", "CUNIT"];

impl Wcs {
    /// Single-axis linear WCS.
    pub fn linear(crval: f64, cdelt: f64, cunit: Option<&str>) -> Wcs {
        Wcs {
            axes: vec![WcsAxis {
                crval,
                cdelt,
                cunit: cunit.map(str::to_string),
                ..WcsAxis::default()
            }],
        }
    }

    /// Build a WCS from header keywords.
    ///
    /// The axis count is `WCSAXES` when present, otherwise the highest axis
    /// index used by any per-axis keyword. A header with no WCS keywords
    /// yields a WCS with no axes.
    pub fn from_header(header: &Header) -> Result<Wcs, WcsError> {
        let n_axes = match header.opt_i64("WCSAXES")? {
            Some(n) => usize::try_from(n).map_err(|_| WcsError::InvalidKeyword {
                keyword: "WCSAXES".to_string(),
                reason: format!("expected non-negative integer, found '{n}'"),
            })?,
            None => highest_axis_index(header),
        };

        let mut axes = Vec::with_capacity(n_axes);
        for n in 1..=n_axes {
            let mut axis = WcsAxis::default();
            if let Some(crval) = header.opt_f64(&format!("CRVAL{n}"))? {
                axis.crval = crval;
            }
            if let Some(cdelt) = header.opt_f64(&format!("CDELT{n}"))? {
                axis.cdelt = cdelt;
            } else if let Some(cd) = header.opt_f64(&format!("CD{n}_{n}"))? {
                axis.cdelt = cd;
            }
            if let Some(crpix) = header.opt_f64(&format!("CRPIX{n}"))? {
                axis.crpix = crpix;
            }
            axis.ctype = header
                .get_str(&format!("CTYPE{n}"))
                .map(|s| s.trim().to_string());
            axis.cunit = header
                .get_str(&format!("CUNIT{n}"))
                .map(|s| s.trim().to_string());
            axes.push(axis);
        }
        Ok(Wcs { axes })
    }

    pub fn naxis(&self) -> usize {
        self.axes.len()
    }

    /// Parsed unit of `axis`, or `None` when absent or unparsable.
    pub fn cunit(&self, axis: usize) -> Option<Unit> {
        let raw = self.axes.get(axis)?.cunit.as_deref()?;
        match Unit::parse(raw) {
            Ok(unit) => Some(unit),
            Err(e) => {
                log::debug!("ignoring CUNIT{}: {e}", axis + 1);
                None
            }
        }
    }

    /// `axis[i] = crval + i·cdelt` for `i` in `[0, len)`, from the first axis.
    pub fn spectral_axis(&self, len: usize) -> Result<Vec<f64>, WcsError> {
        let axis = self.axes.first().ok_or(WcsError::NoAxes)?;
        if !axis.crval.is_finite() || !axis.cdelt.is_finite() || axis.cdelt == 0.0 {
            return Err(WcsError::Degenerate {
                crval: axis.crval,
                cdelt: axis.cdelt,
            });
        }
        Ok((0..len)
            .map(|i| axis.crval + i as f64 * axis.cdelt)
            .collect())
    }

    /// Copy with the first axis' reference value moved `offset` samples along.
    pub fn shifted(&self, offset: usize) -> Wcs {
        let mut out = self.clone();
        if let Some(axis) = out.axes.first_mut() {
            axis.crval += offset as f64 * axis.cdelt;
        }
        out
    }
}

fn highest_axis_index(header: &Header) -> usize {
    header
        .cards()
        .iter()
        .filter_map(|c| {
            let keyword = c.keyword_str();
            let key = AXIS_KEYS.iter().find(|k| keyword.starts_with(*k))?;
            keyword[key.len()..].parse::<usize>().ok()
        })
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::fits::HeaderValue;

    #[test]
    fn test_from_header_linear() {
        let mut h = Header::default();
        h.set("CRVAL1", HeaderValue::Float(3500.0)).unwrap();
        h.set("CDELT1", HeaderValue::Float(2.5)).unwrap();
        h.set("CUNIT1", HeaderValue::String("Angstrom".into())).unwrap();
        h.set("CTYPE1", HeaderValue::String("WAVE".into())).unwrap();

        let wcs = Wcs::from_header(&h).unwrap();
        assert_eq!(wcs.naxis(), 1);
        assert_eq!(wcs.cunit(0), Some(Unit::angstrom()));
        assert_eq!(wcs.spectral_axis(3).unwrap(), vec![3500.0, 3502.5, 3505.0]);
    }

    #[test]
    fn test_cd_matrix_fallback() {
        let mut h = Header::default();
        h.set("CRVAL1", HeaderValue::Integer(10)).unwrap();
        h.set("CD1_1", HeaderValue::Float(0.5)).unwrap();
        let wcs = Wcs::from_header(&h).unwrap();
        assert_eq!(wcs.spectral_axis(2).unwrap(), vec![10.0, 10.5]);
    }

    #[test]
    fn test_empty_header_has_no_axes() {
        let wcs = Wcs::from_header(&Header::default()).unwrap();
        assert_eq!(wcs.naxis(), 0);
        assert_eq!(wcs.spectral_axis(4), Err(WcsError::NoAxes));
    }

    #[test]
    fn test_zero_step_is_degenerate() {
        let wcs = Wcs::linear(1.0, 0.0, None);
        assert!(matches!(wcs.spectral_axis(3), Err(WcsError::Degenerate { .. })));
    }

    #[test]
    fn test_invalid_keyword_value() {
        let mut h = Header::default();
        h.set("CRVAL1", HeaderValue::String("soon".into())).unwrap();
        assert!(matches!(
            Wcs::from_header(&h),
            Err(WcsError::InvalidKeyword { .. })
        ));
    }

    #[test]
    fn test_wcsaxes_sets_axis_count() {
        let mut h = Header::default();
        h.set("WCSAXES", HeaderValue::Integer(2)).unwrap();
        h.set("CRVAL1", HeaderValue::Float(1.0)).unwrap();
        assert_eq!(Wcs::from_header(&h).unwrap().naxis(), 2);

        h.set("WCSAXES", HeaderValue::Integer(-1)).unwrap();
        assert!(matches!(
            Wcs::from_header(&h),
            Err(WcsError::InvalidKeyword { ref keyword, .. }) if keyword == "WCSAXES"
        ));
    }

    #[test]
    fn test_unparsable_cunit_is_none() {
        let wcs = Wcs::linear(0.0, 1.0, Some("parsec-ish"));
        assert_eq!(wcs.cunit(0), None);
    }
}

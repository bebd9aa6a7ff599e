//! Spectrum loading and inspection: units, linear WCS, ECSV and tabular
//! FITS readers, the `Data` container and masked `Layer` views.

pub mod data;
pub mod io;
pub mod units;
pub mod wcs;

//! FITS access on top of `fitsio-pure`: headers, HDU lookup and binary
//! tables converted to and from [`Table`](crate::io::table::Table).
//!
//! ```text
//!  bytes ──► fitsio_pure::hdu::parse_fits ──► FitsFile
//!                                              │
//!             primary cards ──► Header ──► Wcs / Meta
//!             first BINTABLE ──► bintable::read_table ──► Table
//! ```
//!
//! Image data is never decoded.

pub mod bintable;
pub mod header;
pub mod writer;

use std::path::Path;

use fitsio_pure::hdu::{FitsData, HduInfo};
use thiserror::Error;

pub use header::{Header, HeaderValue};

use crate::io::table::Table;

#[derive(Debug, Error)]
pub enum FitsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed FITS: {0}")]
    Codec(#[from] fitsio_pure::Error),
    #[error("missing required keyword '{0}'")]
    MissingKeyword(String),
    #[error("invalid value for keyword '{keyword}': {reason}")]
    InvalidKeyword { keyword: String, reason: String },
    #[error("no binary table extension in file")]
    NoBinTable,
    #[error("no column named '{0}'")]
    MissingColumn(String),
}

/// A FITS file read fully into memory, with its HDUs located.
#[derive(Debug)]
pub struct FitsFile {
    bytes: Vec<u8>,
    data: FitsData,
}

impl FitsFile {
    pub fn open(path: &Path) -> Result<FitsFile, FitsError> {
        let bytes = std::fs::read(path)?;
        log::debug!("read {} bytes from {}", bytes.len(), path.display());
        FitsFile::from_bytes(bytes)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<FitsFile, FitsError> {
        let data = fitsio_pure::hdu::parse_fits(&bytes)?;
        Ok(FitsFile { bytes, data })
    }

    pub fn num_hdus(&self) -> usize {
        self.data.len()
    }

    pub fn header(&self, index: usize) -> Option<Header> {
        self.data
            .get(index)
            .map(|hdu| Header::from_cards(hdu.cards.clone()))
    }

    pub fn primary_header(&self) -> Header {
        self.header(0).unwrap_or_default()
    }

    pub fn is_bintable(&self, index: usize) -> bool {
        self.data
            .get(index)
            .is_some_and(|hdu| matches!(hdu.info, HduInfo::BinaryTable { .. }))
    }

    /// Index and decoded contents of the first `BINTABLE` extension.
    pub fn first_bintable(&self) -> Result<(usize, Table), FitsError> {
        let (index, hdu) = self
            .data
            .iter()
            .enumerate()
            .find(|(_, hdu)| matches!(hdu.info, HduInfo::BinaryTable { .. }))
            .ok_or(FitsError::NoBinTable)?;
        let table = bintable::read_table(&self.bytes, hdu)?;
        Ok((index, table))
    }
}

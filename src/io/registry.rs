use std::path::{Path, PathBuf};

use thiserror::Error;

use super::ecsv::{self, EcsvError};
use super::fits::FitsError;
use super::parsing::{ColumnMapping, ParseError};
use super::tabular_fits;
use crate::data::model::Spectrum;
use crate::wcs::WcsError;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Fits(#[from] FitsError),
    #[error(transparent)]
    Ecsv(#[from] EcsvError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Wcs(#[from] WcsError),
    #[error("no registered loader recognises '{}'", .0.display())]
    NoMatchingLoader(PathBuf),
    #[error("unknown format '{0}'")]
    UnknownFormat(String),
}

/// Caller-supplied knobs passed through to the chosen loader.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Force a loader by name instead of running the identifiers.
    pub format: Option<String>,
    /// ECSV only: explicit column → (field, unit) assignment.
    pub column_mapping: Option<ColumnMapping>,
}

pub type IdentifyFn = fn(&Path) -> Result<bool, LoadError>;
pub type ReadFn = fn(&Path, &ReadOptions) -> Result<Spectrum, LoadError>;

#[derive(Clone, Copy)]
pub struct Loader {
    pub name: &'static str,
    pub identify: IdentifyFn,
    pub read: ReadFn,
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader").field("name", &self.name).finish()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Ordered list of loaders. When several identifiers accept a file, the one
/// registered first wins.
#[derive(Debug, Clone)]
pub struct LoaderRegistry {
    loaders: Vec<Loader>,
}

impl Default for LoaderRegistry {
    /// ECSV first, then tabular FITS.
    fn default() -> Self {
        let mut registry = LoaderRegistry::empty();
        registry.register(Loader {
            name: "ECSV",
            identify: ecsv::identify_ecsv,
            read: |path, opts| ecsv::generic_ecsv(path, opts.column_mapping.as_ref()),
        });
        registry.register(Loader {
            name: "tabular-fits",
            identify: tabular_fits::identify_tabular_fits,
            read: |path, _| tabular_fits::tabular_fits(path),
        });
        registry
    }
}

impl LoaderRegistry {
    pub fn empty() -> Self {
        LoaderRegistry {
            loaders: Vec::new(),
        }
    }

    pub fn register(&mut self, loader: Loader) {
        log::debug!("registering loader '{}'", loader.name);
        self.loaders.push(loader);
    }

    pub fn loaders(&self) -> &[Loader] {
        &self.loaders
    }

    /// Names of every loader whose identifier accepts `path`, in
    /// registration order. Identifier errors propagate.
    pub fn identify_format(&self, path: &Path) -> Result<Vec<&'static str>, LoadError> {
        let mut names = Vec::new();
        for loader in &self.loaders {
            if (loader.identify)(path)? {
                names.push(loader.name);
            }
        }
        Ok(names)
    }

    /// Read `path` with the forced format, or the first loader that
    /// identifies it.
    pub fn read(&self, path: &Path, opts: &ReadOptions) -> Result<Spectrum, LoadError> {
        let loader = match &opts.format {
            Some(format) => self
                .loaders
                .iter()
                .find(|l| l.name.eq_ignore_ascii_case(format))
                .ok_or_else(|| LoadError::UnknownFormat(format.clone()))?,
            None => self.find(path)?,
        };
        log::info!("reading {} as {}", path.display(), loader.name);
        (loader.read)(path, opts)
    }

    fn find(&self, path: &Path) -> Result<&Loader, LoadError> {
        for loader in &self.loaders {
            if (loader.identify)(path)? {
                return Ok(loader);
            }
        }
        Err(LoadError::NoMatchingLoader(path.to_path_buf()))
    }
}

//! File formats: identification, parsing and the loader registry.
//!
//! ```text
//!   path ──► LoaderRegistry ──► identify (in registration order)
//!                 │
//!       ┌─────────┴──────────┐
//!       ▼                    ▼
//!   ecsv (YAML + csv)   tabular_fits (fits::bintable)
//!       │                    │
//!       └──► Table ──► parsing ──► Spectrum
//! ```

pub mod ecsv;
pub mod fits;
pub mod parsing;
pub mod registry;
pub mod table;
pub mod tabular_fits;

pub use registry::{LoadError, Loader, LoaderRegistry, ReadOptions};

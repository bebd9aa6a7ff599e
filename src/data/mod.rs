//! Data layer: spectrum model, the `Data` container and layers over it.
//!
//! Architecture:
//! ```text
//!   io::LoaderRegistry ──► Spectrum
//!                             │
//!                             ▼
//!   ┌───────────┐      ┌─────────────┐
//!   │ DataStore  │ ───► │    Data      │  flux, unit, WCS, lazy dispersion
//!   └───────────┘      └─────────────┘
//!         ▲                   │
//!         │ DataId            ▼
//!   ┌───────────┐      ┌─────────────┐
//!   │   Layer    │      │ arithmetic   │  new Data from two operands
//!   └───────────┘      └─────────────┘
//!   mask + frozen units, re-reads the source on every access
//! ```

pub mod arithmetic;
pub mod container;
pub mod layer;
pub mod model;

pub use container::{Data, DataError, DataId, DataStore};
pub use layer::Layer;

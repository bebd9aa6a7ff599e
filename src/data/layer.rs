use super::container::{DataError, DataId, DataStore};
use super::model::Meta;
use crate::units::{Quantity, Unit};
use crate::wcs::Wcs;

/// A masked view into a [`Data`](super::container::Data) held by a
/// [`DataStore`].
///
/// A layer stores no samples of its own, only the source id, a selection
/// mask and the (flux, dispersion) units captured when it was created.
/// Every accessor re-reads the source, so edits to the source's arrays show
/// through while the units stay frozen.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    source: DataId,
    mask: Vec<bool>,
    units: (Unit, Unit),
    pub name: String,
}

impl Layer {
    /// Layer selecting samples where `mask` is `true`.
    ///
    /// The mask length is not checked here; a mismatch surfaces as
    /// [`DataError::MaskLength`] from the accessors.
    pub fn new(store: &DataStore, source: DataId, mask: Vec<bool>) -> Result<Layer, DataError> {
        let data = store.require(source)?;
        Ok(Layer {
            source,
            mask,
            units: (data.unit().clone(), data.dispersion_unit()),
            name: format!("{} Layer", data.name()),
        })
    }

    /// Layer over every sample of `source`.
    pub fn full(store: &DataStore, source: DataId) -> Result<Layer, DataError> {
        let len = store.require(source)?.len();
        Layer::new(store, source, vec![true; len])
    }

    /// Layer over samples whose dispersion lies in `[lo, hi]`.
    pub fn from_range(
        store: &DataStore,
        source: DataId,
        lo: f64,
        hi: f64,
    ) -> Result<Layer, DataError> {
        let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        let mask = store
            .require(source)?
            .dispersion()
            .iter()
            .map(|&x| x >= lo && x <= hi)
            .collect();
        let mut layer = Layer::new(store, source, mask)?;
        layer.name = format!("{} [{lo:.2}, {hi:.2}]", layer.name);
        Ok(layer)
    }

    pub fn source(&self) -> DataId {
        self.source
    }

    /// The selection mask itself (`true` = included).
    pub fn selection(&self) -> &[bool] {
        &self.mask
    }

    pub fn flux_unit(&self) -> &Unit {
        &self.units.0
    }

    pub fn dispersion_unit(&self) -> &Unit {
        &self.units.1
    }

    /// Number of selected samples.
    pub fn len(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn select<T: Copy>(&self, values: &[T]) -> Result<Vec<T>, DataError> {
        if values.len() != self.mask.len() {
            return Err(DataError::MaskLength {
                expected: values.len(),
                found: self.mask.len(),
            });
        }
        Ok(values
            .iter()
            .zip(&self.mask)
            .filter(|&(_, &keep)| keep)
            .map(|(v, _)| *v)
            .collect())
    }

    /// Selected flux in the captured flux unit.
    pub fn data(&self, store: &DataStore) -> Result<Quantity, DataError> {
        let source = store.require(self.source)?;
        let values = self.select(source.flux())?;
        Ok(Quantity::new(values, source.unit().clone()).to(&self.units.0)?)
    }

    /// Selected dispersion in the captured dispersion unit.
    ///
    /// A source without a dispersion unit was already reported when the
    /// layer was created, so this accessor stays quiet.
    pub fn dispersion(&self, store: &DataStore) -> Result<Quantity, DataError> {
        let source = store.require(self.source)?;
        let values = self.select(source.dispersion())?;
        let unit = source.known_dispersion_unit().unwrap_or_default();
        Ok(Quantity::new(values, unit).to(&self.units.1)?)
    }

    /// The source's bad-sample mask at the selected positions. A source
    /// without a mask has no bad samples.
    pub fn mask(&self, store: &DataStore) -> Result<Vec<bool>, DataError> {
        let source = store.require(self.source)?;
        match source.mask() {
            Some(mask) => self.select(mask),
            None => {
                self.select(source.flux())?;
                Ok(vec![false; self.len()])
            }
        }
    }

    /// Selected standard deviations in the captured flux unit.
    pub fn uncertainty(&self, store: &DataStore) -> Result<Option<Quantity>, DataError> {
        let source = store.require(self.source)?;
        let Some(uncertainty) = source.uncertainty() else {
            return Ok(None);
        };
        let values = self.select(&uncertainty.to_std_dev())?;
        Ok(Some(
            Quantity::new(values, source.unit().clone()).to(&self.units.0)?,
        ))
    }

    pub fn meta<'s>(&self, store: &'s DataStore) -> Result<&'s Meta, DataError> {
        Ok(store.require(self.source)?.meta())
    }

    pub fn wcs<'s>(&self, store: &'s DataStore) -> Result<Option<&'s Wcs>, DataError> {
        Ok(store.require(self.source)?.wcs())
    }
}

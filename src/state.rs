use std::path::Path;

use anyhow::{anyhow, Context, Result};
use eframe::egui::Color32;

use pyfocal::data::{Data, DataId, DataStore, Layer};
use pyfocal::io::ReadOptions;

use crate::color::{generate_palette, nth_color};

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// A layer as shown in the viewer.
pub struct LayerEntry {
    pub layer: Layer,
    pub visible: bool,
    pub color: Color32,
}

/// The full UI state, independent of rendering.
#[derive(Default)]
pub struct AppState {
    /// Every loaded data object. Layers refer into it by id.
    pub store: DataStore,

    pub layers: Vec<LayerEntry>,

    /// Index into `layers` of the layer whose metadata is shown.
    pub selected: Option<usize>,

    /// Loader name forced for the next open, `None` = identify.
    pub format: Option<String>,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,

    /// Dispersion range currently visible in the plot.
    pub view_range: Option<(f64, f64)>,

    colors_used: usize,
}

impl AppState {
    /// Read a file, store it and add a full layer over it. Failures end up in
    /// the status line.
    pub fn open_path(&mut self, path: &Path) {
        match self.load(path) {
            Ok(id) => {
                if let Some(data) = self.store.get(id) {
                    log::info!("Loaded '{}' ({} samples)", data.name(), data.len());
                }
                self.status_message = None;
            }
            Err(e) => {
                log::error!("Failed to load file: {e:#}");
                self.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }

    fn load(&mut self, path: &Path) -> Result<DataId> {
        let opts = ReadOptions {
            format: self.format.clone(),
            ..ReadOptions::default()
        };
        let data = Data::read(path, &opts)
            .with_context(|| format!("could not read {}", path.display()))?;
        self.add_data(data)
    }

    /// Store `data` and add a layer covering all of it.
    pub fn add_data(&mut self, data: Data) -> Result<DataId> {
        let id = self.store.insert(data);
        let layer = Layer::full(&self.store, id)?;
        self.push_layer(layer);
        Ok(id)
    }

    fn push_layer(&mut self, layer: Layer) {
        let color = nth_color(self.colors_used);
        self.colors_used += 1;
        self.layers.push(LayerEntry {
            layer,
            visible: true,
            color,
        });
        self.selected = Some(self.layers.len() - 1);
    }

    /// New layer over the selected layer's source, restricted to
    /// dispersion values in `[lo, hi]`.
    pub fn add_range_layer(&mut self, lo: f64, hi: f64) -> Result<()> {
        let entry = self
            .selected
            .and_then(|i| self.layers.get(i))
            .ok_or_else(|| anyhow!("no layer selected"))?;
        let layer = Layer::from_range(&self.store, entry.layer.source(), lo, hi)
            .context("could not create layer")?;
        log::info!("Added layer '{}' with {} samples", layer.name, layer.len());
        self.push_layer(layer);
        Ok(())
    }

    /// Drop a layer. Its data is dropped too once no layer refers to it.
    pub fn remove_layer(&mut self, index: usize) {
        if index >= self.layers.len() {
            return;
        }
        let entry = self.layers.remove(index);
        let source = entry.layer.source();
        if !self.layers.iter().any(|e| e.layer.source() == source) {
            self.store.remove(source);
        }

        self.selected = match self.selected {
            Some(s) if s == index => None,
            Some(s) if s > index => Some(s - 1),
            other => other,
        };
    }

    pub fn toggle_visibility(&mut self, index: usize) {
        if let Some(entry) = self.layers.get_mut(index) {
            entry.visible = !entry.visible;
        }
    }

    pub fn select_layer(&mut self, index: usize) {
        if index < self.layers.len() {
            self.selected = Some(index);
        }
    }

    pub fn selected_layer(&self) -> Option<&LayerEntry> {
        self.selected.and_then(|i| self.layers.get(i))
    }

    /// Spread the current layers evenly around the colour wheel.
    pub fn recolor(&mut self) {
        let palette = generate_palette(self.layers.len());
        for (entry, color) in self.layers.iter_mut().zip(palette) {
            entry.color = color;
        }
    }
}

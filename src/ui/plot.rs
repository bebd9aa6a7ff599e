use eframe::egui::Ui;
use egui_plot::{Legend, Line, Plot, PlotPoints};

use crate::state::AppState;

// ---------------------------------------------------------------------------
// Spectral plot (central panel)
// ---------------------------------------------------------------------------

fn axis_label(name: &str, unit: &str) -> String {
    if unit.is_empty() {
        name.to_string()
    } else {
        format!("{name} [{unit}]")
    }
}

/// Plot every visible layer and record the visible dispersion range.
pub fn spectral_plot(ui: &mut Ui, state: &mut AppState) {
    if state.layers.is_empty() {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open a file to view spectra  (File → Open…)");
        });
        return;
    }

    // Axis labels follow the selected layer, else the first one.
    let labelled = state.selected_layer().or(state.layers.first());
    let (x_label, y_label) = match labelled {
        Some(entry) => (
            axis_label("Dispersion", entry.layer.dispersion_unit().symbol()),
            axis_label("Flux", entry.layer.flux_unit().symbol()),
        ),
        None => ("Dispersion".to_string(), "Flux".to_string()),
    };

    let store = &state.store;
    let layers = &state.layers;
    let response = Plot::new("spectral_plot")
        .legend(Legend::default())
        .x_axis_label(x_label)
        .y_axis_label(y_label)
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
        .show(ui, |plot_ui| {
            for entry in layers.iter().filter(|e| e.visible) {
                let layer = &entry.layer;
                let series = layer.dispersion(store).and_then(|x| {
                    let y = layer.data(store)?;
                    let bad = layer.mask(store)?;
                    Ok((x, y, bad))
                });
                let (x, y, bad) = match series {
                    Ok(series) => series,
                    Err(e) => {
                        log::debug!("skipping layer '{}': {e}", layer.name);
                        continue;
                    }
                };

                let points: PlotPoints = x
                    .values
                    .iter()
                    .zip(&y.values)
                    .zip(&bad)
                    .filter(|&(_, &masked)| !masked)
                    .map(|((&xi, &yi), _)| [xi, yi])
                    .collect();

                let line = Line::new(points)
                    .name(&layer.name)
                    .color(entry.color)
                    .width(1.5);

                plot_ui.line(line);
            }
            plot_ui.plot_bounds()
        });

    let bounds = response.inner;
    state.view_range = Some((bounds.min()[0], bounds.max()[0]));
}

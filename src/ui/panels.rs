use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use egui_extras::{Column, TableBuilder};

use pyfocal::io::LoaderRegistry;

use crate::state::AppState;

// ---------------------------------------------------------------------------
// Left side panel – layer list and metadata
// ---------------------------------------------------------------------------

enum LayerAction {
    Select(usize),
    Toggle(usize),
    Remove(usize),
}

/// Render the left panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Layers");
    ui.separator();

    if state.layers.is_empty() {
        ui.label("No data loaded.");
        return;
    }

    // Collect clicks first; the list borrows `state`.
    let mut actions = Vec::new();
    for (i, entry) in state.layers.iter().enumerate() {
        ui.horizontal(|ui: &mut Ui| {
            let mut visible = entry.visible;
            if ui.checkbox(&mut visible, "").changed() {
                actions.push(LayerAction::Toggle(i));
            }
            let text = RichText::new(&entry.layer.name).color(entry.color);
            if ui
                .selectable_label(state.selected == Some(i), text)
                .clicked()
            {
                actions.push(LayerAction::Select(i));
            }
            if ui.small_button("✕").clicked() {
                actions.push(LayerAction::Remove(i));
            }
        });
    }
    // Removing shifts indices, so apply in reverse.
    for action in actions.into_iter().rev() {
        match action {
            LayerAction::Select(i) => state.select_layer(i),
            LayerAction::Toggle(i) => state.toggle_visibility(i),
            LayerAction::Remove(i) => state.remove_layer(i),
        }
    }

    ui.horizontal(|ui: &mut Ui| {
        let can_slice = state.selected.is_some() && state.view_range.is_some();
        if ui
            .add_enabled(can_slice, egui::Button::new("Layer from view"))
            .clicked()
        {
            if let Some((lo, hi)) = state.view_range {
                if let Err(e) = state.add_range_layer(lo, hi) {
                    log::error!("{e:#}");
                    state.status_message = Some(format!("Error: {e:#}"));
                }
            }
        }
        if ui.button("Recolor").clicked() {
            state.recolor();
        }
    });

    ui.separator();
    metadata_table(ui, state);
}

fn metadata_table(ui: &mut Ui, state: &AppState) {
    ui.strong("Metadata");
    let Some(entry) = state.selected_layer() else {
        ui.label("Select a layer.");
        return;
    };
    let rows = match entry.layer.meta(&state.store) {
        Ok(meta) => meta.rows(),
        Err(e) => {
            ui.label(RichText::new(e.to_string()).color(Color32::RED));
            return;
        }
    };
    if rows.is_empty() {
        ui.label("(none)");
        return;
    }

    ScrollArea::horizontal().show(ui, |ui: &mut Ui| {
        TableBuilder::new(ui)
            .striped(true)
            .column(Column::auto().resizable(true))
            .column(Column::remainder())
            .header(20.0, |mut header| {
                header.col(|ui| {
                    ui.strong("Key");
                });
                header.col(|ui| {
                    ui.strong("Value");
                });
            })
            .body(|body| {
                body.rows(18.0, rows.len(), |mut row| {
                    let (key, value) = &rows[row.index()];
                    row.col(|ui| {
                        ui.label(key);
                    });
                    row.col(|ui| {
                        ui.label(value.to_string());
                    });
                });
            });
    });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        let current = state.format.clone().unwrap_or_else(|| "auto".to_string());
        egui::ComboBox::from_id_salt("format")
            .selected_text(format!("Format: {current}"))
            .show_ui(ui, |ui: &mut Ui| {
                if ui.selectable_label(state.format.is_none(), "auto").clicked() {
                    state.format = None;
                }
                for loader in LoaderRegistry::default().loaders() {
                    let selected = state.format.as_deref() == Some(loader.name);
                    if ui.selectable_label(selected, loader.name).clicked() {
                        state.format = Some(loader.name.to_string());
                    }
                }
            });

        ui.separator();
        ui.label(format!(
            "{} data, {} layers",
            state.store.len(),
            state.layers.len()
        ));

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialog
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open spectrum")
        .add_filter("Supported files", &["ecsv", "fits"])
        .add_filter("ECSV", &["ecsv"])
        .add_filter("FITS", &["fits"])
        .pick_file();

    if let Some(path) = file {
        state.open_path(&path);
    }
}

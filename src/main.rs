mod app;
mod color;
mod state;
mod ui;

use std::path::PathBuf;

use app::PyfocalApp;
use clap::Parser;
use eframe::egui;
use state::AppState;

#[derive(Parser, Debug)]
#[command(author, version, about = "Pyfocal - spectra viewer")]
struct Args {
    /// Spectrum files to open at start-up (.ecsv, .fits).
    files: Vec<PathBuf>,

    /// Loader to use instead of identifying each file (e.g. ECSV, tabular-fits).
    #[arg(short, long)]
    format: Option<String>,
}

fn main() -> eframe::Result {
    env_logger::init();
    let args = Args::parse();

    let mut state = AppState::default();
    state.format = args.format;
    for path in &args.files {
        state.open_path(path);
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Pyfocal – Spectra Viewer",
        options,
        Box::new(|_cc| Ok(Box::new(PyfocalApp::new(state)))),
    )
}

use std::path::Path;

use anyhow::{Context, Result};

use pyfocal::data::model::MetadataValue;
use pyfocal::io::ecsv;
use pyfocal::io::fits::writer::write_tabular;
use pyfocal::io::fits::{Header, HeaderValue};
use pyfocal::io::table::{Column, ColumnData, Table};

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Continuum plus emission lines plus noise. Returns (flux, 1-sigma error).
fn generate_spectrum(
    wavelengths: &[f64],
    continuum: f64,
    lines: &[(f64, f64, f64)],
    noise_level: f64,
    rng: &mut SimpleRng,
) -> (Vec<f64>, Vec<f64>) {
    wavelengths
        .iter()
        .map(|&wl| {
            let signal: f64 = lines
                .iter()
                .map(|&(mu, sigma, amp)| gaussian(wl, mu, sigma, amp))
                .sum::<f64>()
                + continuum;
            (signal + rng.gauss(0.0, noise_level), noise_level)
        })
        .unzip()
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

// Hα, [N II] 6583, [S II] 6716/6731
const LINES: [(f64, f64, f64); 4] = [
    (6562.8, 3.0, 2.5e-3),
    (6583.4, 2.5, 0.9e-3),
    (6716.4, 2.0, 0.6e-3),
    (6730.8, 2.0, 0.5e-3),
];

const CRVAL: f64 = 6400.0;
const CDELT: f64 = 0.5;
const N_PIX: usize = 800;

/// ECSV with explicit wavelength column.
fn write_ecsv(path: &Path, wavelengths: &[f64], flux: Vec<f64>, err: Vec<f64>) -> Result<()> {
    let mut table = Table::new(vec![
        Column::new("wavelength", ColumnData::Float(wavelengths.to_vec())).with_unit("Angstrom"),
        Column::new("flux", ColumnData::Float(flux)).with_unit("Jy"),
        Column::new("err", ColumnData::Float(err)).with_unit("Jy"),
    ]);
    table
        .meta
        .entries
        .insert("OBJECT".to_string(), MetadataValue::String("synthetic".to_string()));
    ecsv::write_table(&table, path).with_context(|| format!("writing {}", path.display()))
}

/// Tabular FITS: flux / err columns, dispersion in the primary WCS.
fn write_fits(path: &Path, flux: Vec<f64>, err: Vec<f64>) -> Result<()> {
    let mut primary = Header::default();
    primary.set("OBJECT", HeaderValue::String("synthetic".to_string()))?;
    primary.set("CRVAL1", HeaderValue::Float(CRVAL))?;
    primary.set("CDELT1", HeaderValue::Float(CDELT))?;
    primary.set("CRPIX1", HeaderValue::Float(1.0))?;
    primary.set("CTYPE1", HeaderValue::String("WAVE".to_string()))?;
    primary.set("CUNIT1", HeaderValue::String("Angstrom".to_string()))?;

    let table = Table::new(vec![
        Column::new("flux", ColumnData::Float(flux)).with_unit("Jy"),
        Column::new("err", ColumnData::Float(err)).with_unit("Jy"),
    ]);
    write_tabular(path, &primary, &table).with_context(|| format!("writing {}", path.display()))
}

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);

    let wavelengths: Vec<f64> = (0..N_PIX).map(|i| CRVAL + i as f64 * CDELT).collect();
    let (flux, err) = generate_spectrum(&wavelengths, 1.0e-3, &LINES, 5.0e-5, &mut rng);

    write_ecsv(Path::new("sample.ecsv"), &wavelengths, flux.clone(), err.clone())?;
    write_fits(Path::new("sample.fits"), flux, err)?;

    println!("Wrote sample.ecsv and sample.fits ({N_PIX} samples each)");
    Ok(())
}

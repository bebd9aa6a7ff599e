use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use pyfocal::data::model::{MetadataValue, UncertaintyKind};
use pyfocal::data::{Data, DataStore, Layer};
use pyfocal::io::ecsv::identify_ecsv;
use pyfocal::io::fits::writer::write_tabular;
use pyfocal::io::fits::{FitsError, Header, HeaderValue};
use pyfocal::io::table::{Column, ColumnData, Table};
use pyfocal::io::tabular_fits::identify_tabular_fits;
use pyfocal::io::{LoadError, LoaderRegistry, ReadOptions};
use pyfocal::units::Unit;

/// Fresh scratch directory per test, removed on drop.
struct Scratch(PathBuf);

impl Scratch {
    fn new(test: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("pyfocal-{}-{test}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        Scratch(dir)
    }

    fn path(&self, name: &str) -> PathBuf {
        self.0.join(name)
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}

const ECSV: &str = "\
# %ECSV 1.0
# ---
# datatype:
# - {name: wavelength, unit: Angstrom, datatype: float64}
# - {name: flux, unit: Jy, datatype: float64}
# - {name: ivar, datatype: float64}
# meta:
#   OBJECT: M31
wavelength flux ivar
5000.0 1.0 4.0
5001.5 2.0 25.0
5003.0 3.0 100.0
";

fn wcs_header(crval: f64, cdelt: f64) -> Header {
    let mut header = Header::default();
    header.set("OBJECT", HeaderValue::String("HD 1".to_string())).unwrap();
    header.set("CRVAL1", HeaderValue::Float(crval)).unwrap();
    header.set("CDELT1", HeaderValue::Float(cdelt)).unwrap();
    header.set("CUNIT1", HeaderValue::String("Angstrom".to_string())).unwrap();
    header
}

fn flux_err_table(flux: Vec<f64>, err: Vec<f64>, flux_unit: &str) -> Table {
    Table::new(vec![
        Column::new("flux", ColumnData::Float(flux)).with_unit(flux_unit),
        Column::new("err", ColumnData::Float(err)),
    ])
}

// ---------------------------------------------------------------------------
// ECSV
// ---------------------------------------------------------------------------

#[test]
fn ecsv_wavelength_and_flux_in_file_order() {
    let scratch = Scratch::new("ecsv-order");
    let path = scratch.path("galaxy.ecsv");
    fs::write(&path, ECSV).unwrap();

    let data = Data::read(&path, &ReadOptions::default()).unwrap();
    assert_eq!(data.name(), "galaxy");
    assert_eq!(data.flux(), &[1.0, 2.0, 3.0]);
    assert_eq!(data.unit(), &Unit::jansky());
    assert_eq!(data.dispersion(), &[5000.0, 5001.5, 5003.0]);
    assert_eq!(data.dispersion_unit(), Unit::angstrom());

    let uncertainty = data.uncertainty().unwrap();
    assert_eq!(uncertainty.kind, UncertaintyKind::InverseVariance);
    assert_eq!(uncertainty.to_std_dev(), vec![0.5, 0.2, 0.1]);
    assert_eq!(
        data.meta().entries.get("OBJECT"),
        Some(&MetadataValue::String("M31".to_string()))
    );
}

#[test]
fn ecsv_with_column_mapping() {
    let scratch = Scratch::new("ecsv-mapping");
    let path = scratch.path("mapped.ecsv");
    fs::write(&path, ECSV).unwrap();

    let mut mapping = BTreeMap::new();
    mapping.insert("ivar".to_string(), ("flux".to_string(), "mJy".to_string()));
    mapping.insert(
        "flux".to_string(),
        ("spectral_axis".to_string(), "nm".to_string()),
    );
    let opts = ReadOptions {
        column_mapping: Some(mapping),
        ..ReadOptions::default()
    };

    let data = Data::read(&path, &opts).unwrap();
    assert_eq!(data.flux(), &[4.0, 25.0, 100.0]);
    assert_eq!(data.unit().symbol(), "mJy");
    assert_eq!(data.dispersion(), &[1.0, 2.0, 3.0]);
    assert_eq!(data.dispersion_unit().symbol(), "nm");
}

#[test]
fn written_ecsv_reads_back_as_spectrum() {
    let scratch = Scratch::new("ecsv-write");
    let path = scratch.path("out.ecsv");
    let table = Table::new(vec![
        Column::new("wave", ColumnData::Float(vec![1.0, 2.0])).with_unit("um"),
        Column::new("flux", ColumnData::Float(vec![0.5, f64::NAN])).with_unit("Jy"),
    ]);
    pyfocal::io::ecsv::write_table(&table, &path).unwrap();

    let data = Data::read(&path, &ReadOptions::default()).unwrap();
    assert_eq!(data.dispersion(), &[1.0, 2.0]);
    assert_eq!(data.dispersion_unit().symbol(), "um");
    assert_eq!(data.flux()[0], 0.5);
    assert!(data.flux()[1].is_nan());
}

#[test]
fn ecsv_with_out_of_range_unit_exponent_is_an_error() {
    let scratch = Scratch::new("ecsv-unit-overflow");
    let path = scratch.path("overflow.ecsv");
    fs::write(
        &path,
        "\
# %ECSV 1.0
# ---
# datatype:
# - {name: wavelength, unit: Angstrom, datatype: float64}
# - {name: flux, unit: '(cm2)**100', datatype: float64}
wavelength flux
5000.0 1.0
",
    )
    .unwrap();

    let result = Data::read(&path, &ReadOptions::default());
    assert!(
        matches!(result, Err(LoadError::Parse(_))),
        "{result:?}"
    );
}

// ---------------------------------------------------------------------------
// Tabular FITS
// ---------------------------------------------------------------------------

#[test]
fn tabular_fits_flux_is_jansky_with_wcs_dispersion() {
    let scratch = Scratch::new("fits-read");
    let path = scratch.path("star.fits");
    let table = flux_err_table(vec![10.0, 11.0, 12.0, 13.0], vec![0.1, 0.2, 0.3, 0.4], "mJy");
    write_tabular(&path, &wcs_header(4000.0, 2.0), &table).unwrap();

    let data = Data::read(&path, &ReadOptions::default()).unwrap();
    assert_eq!(data.name(), "star");
    // The flux column's own unit is ignored.
    assert_eq!(data.unit(), &Unit::jansky());
    assert_eq!(data.flux(), &[10.0, 11.0, 12.0, 13.0]);

    let uncertainty = data.uncertainty().unwrap();
    assert_eq!(uncertainty.kind, UncertaintyKind::StdDev);
    assert_eq!(uncertainty.values, vec![0.1, 0.2, 0.3, 0.4]);

    assert_eq!(data.dispersion(), &[4000.0, 4002.0, 4004.0, 4006.0]);
    assert_eq!(data.dispersion_unit(), Unit::angstrom());

    let header = data.meta().header.as_ref().unwrap();
    assert_eq!(header.get_str("OBJECT"), Some("HD 1"));
}

#[test]
fn tabular_fits_without_wcs_falls_back_to_pixel_index() {
    let scratch = Scratch::new("fits-no-wcs");
    let path = scratch.path("bare.fits");
    let table = flux_err_table(vec![1.0, 2.0, 3.0], vec![0.1; 3], "Jy");
    write_tabular(&path, &Header::default(), &table).unwrap();

    let data = Data::read(&path, &ReadOptions::default()).unwrap();
    assert_eq!(data.wcs().unwrap().naxis(), 0);
    assert_eq!(data.dispersion(), &[0.0, 1.0, 2.0]);
    assert!(data.dispersion_unit().is_dimensionless());
}

#[test]
fn tabular_fits_missing_err_column() {
    let scratch = Scratch::new("fits-no-err");
    let path = scratch.path("noerr.fits");
    let table = Table::new(vec![Column::new("flux", ColumnData::Float(vec![1.0]))]);
    write_tabular(&path, &wcs_header(1.0, 1.0), &table).unwrap();

    let result = Data::read(&path, &ReadOptions::default());
    assert!(
        matches!(result, Err(LoadError::Fits(FitsError::MissingColumn(ref c))) if c == "err"),
        "{result:?}"
    );
}

/// Header blocks for `cards`, END-terminated and padded.
fn header_blocks(cards: &[&str]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for card in cards.iter().chain(&["END"]) {
        bytes.extend_from_slice(format!("{card:<80}").as_bytes());
    }
    bytes.resize(bytes.len().div_ceil(2880) * 2880, b' ');
    bytes
}

#[test]
fn tabular_fits_with_oversized_column_format_is_an_error() {
    let scratch = Scratch::new("fits-tform");
    let path = scratch.path("hostile.fits");
    let mut bytes = header_blocks(&[
        "SIMPLE  =                    T",
        "BITPIX  =                    8",
        "NAXIS   =                    0",
        "EXTEND  =                    T",
    ]);
    bytes.extend(header_blocks(&[
        "XTENSION= 'BINTABLE'",
        "BITPIX  =                    8",
        "NAXIS   =                    2",
        "NAXIS1  =                   16",
        "NAXIS2  =                    1",
        "PCOUNT  =                    0",
        "GCOUNT  =                    1",
        "TFIELDS =                    2",
        "TTYPE1  = 'flux'",
        "TFORM1  = '4611686018427387904D'",
        "TTYPE2  = 'err'",
        "TFORM2  = 'D'",
    ]));
    bytes.extend(vec![0u8; 2880]);
    fs::write(&path, bytes).unwrap();

    assert!(identify_tabular_fits(&path).unwrap());
    let result = Data::read(&path, &ReadOptions::default());
    assert!(
        matches!(
            result,
            Err(LoadError::Fits(FitsError::InvalidKeyword { ref keyword, .. })) if keyword == "TFORM1"
        ),
        "{result:?}"
    );
}

// ---------------------------------------------------------------------------
// Identification
// ---------------------------------------------------------------------------

/// A primary HDU with no extensions.
fn primary_only_fits() -> Vec<u8> {
    header_blocks(&[
        "SIMPLE  =                    T",
        "BITPIX  =                    8",
        "NAXIS   =                    0",
    ])
}

#[test]
fn identifiers() {
    let scratch = Scratch::new("identify");

    let missing = scratch.path("missing.fits");
    assert!(identify_tabular_fits(&missing).is_err());
    assert!(matches!(
        LoaderRegistry::default().identify_format(&missing),
        Err(LoadError::Fits(FitsError::Io(_)))
    ));

    let image = scratch.path("image.fits");
    fs::write(&image, primary_only_fits()).unwrap();
    assert!(!identify_tabular_fits(&image).unwrap());

    let text = scratch.path("spectrum.txt");
    fs::write(&text, "1 2 3\n").unwrap();
    assert!(!identify_tabular_fits(&text).unwrap());
    assert!(!identify_ecsv(&text).unwrap());
    assert!(matches!(
        Data::read(&text, &ReadOptions::default()),
        Err(LoadError::NoMatchingLoader(_))
    ));

    let ecsv = scratch.path("a.ecsv");
    fs::write(&ecsv, ECSV).unwrap();
    assert_eq!(
        LoaderRegistry::default().identify_format(&ecsv).unwrap(),
        vec!["ECSV"]
    );
}

#[test]
fn forced_format_skips_identification() {
    let scratch = Scratch::new("forced");
    let path = scratch.path("spectrum.dat");
    fs::write(&path, ECSV).unwrap();

    let opts = ReadOptions {
        format: Some("ecsv".to_string()),
        ..ReadOptions::default()
    };
    let data = Data::read(&path, &opts).unwrap();
    assert_eq!(data.len(), 3);
    assert_eq!(data.name(), "spectrum");
}

// ---------------------------------------------------------------------------
// Layers over loaded data
// ---------------------------------------------------------------------------

#[test]
fn layer_over_fits_data() {
    let scratch = Scratch::new("layer");
    let path = scratch.path("layered.fits");
    let table = flux_err_table(vec![1.0, 2.0, 3.0, 4.0, 5.0], vec![0.5; 5], "Jy");
    write_tabular(&path, &wcs_header(100.0, 10.0), &table).unwrap();

    let mut store = DataStore::new();
    let id = store.insert(Data::read(&path, &ReadOptions::default()).unwrap());
    let layer = Layer::from_range(&store, id, 115.0, 135.0).unwrap();

    assert_eq!(layer.data(&store).unwrap().values, vec![3.0, 4.0]);
    assert_eq!(layer.dispersion(&store).unwrap().values, vec![120.0, 130.0]);
    assert_eq!(layer.dispersion_unit(), &Unit::angstrom());
    assert_eq!(
        layer.uncertainty(&store).unwrap().unwrap().values,
        vec![0.5, 0.5]
    );
    assert_eq!(
        layer.meta(&store).unwrap().header.as_ref().unwrap().get_str("OBJECT"),
        Some("HD 1")
    );
}

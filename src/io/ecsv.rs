//! ECSV (Enhanced Character Separated Values) tables.
//!
//! ```text
//! # %ECSV 1.0
//! # ---
//! # datatype:
//! # - {name: wavelength, unit: Angstrom, datatype: float64}
//! # - {name: flux, unit: Jy, datatype: float64}
//! # meta: {OBJECT: NGC 1068}
//! wavelength flux
//! 4000.0 1.25
//! 4001.0 1.31
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::parsing::{generic_spectrum_from_table, spectrum_from_column_mapping, ColumnMapping};
use super::registry::LoadError;
use super::table::{Column, ColumnData, Table};
use crate::data::model::{Meta, MetadataValue, Spectrum};

#[derive(Debug, Error)]
pub enum EcsvError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("missing '# %ECSV' signature line")]
    MissingSignature,
    #[error("invalid ECSV header: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid ECSV body: {0}")]
    Csv(#[from] csv::Error),
    #[error("unsupported delimiter '{0}'")]
    BadDelimiter(String),
    #[error("column names {found:?} do not match header {expected:?}")]
    HeaderMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("column '{column}', row {row}: cannot parse '{value}' as {datatype}")]
    InvalidValue {
        column: String,
        row: usize,
        value: String,
        datatype: String,
    },
}

// ---------------------------------------------------------------------------
// YAML header
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ColumnSpec {
    name: String,
    datatype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EcsvHeader {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    delimiter: Option<String>,
    datatype: Vec<ColumnSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    meta: Option<serde_yaml::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Float,
    Int,
    Bool,
    Str,
}

fn kind_of(datatype: &str) -> Kind {
    match datatype {
        "float16" | "float32" | "float64" | "float128" => Kind::Float,
        "int8" | "int16" | "int32" | "int64" | "uint8" | "uint16" | "uint32" | "uint64" => {
            Kind::Int
        }
        "bool" => Kind::Bool,
        _ => Kind::Str,
    }
}

// ---------------------------------------------------------------------------
// Identify / read
// ---------------------------------------------------------------------------

/// True when the extension is `.ecsv` (any case). Never touches the file.
pub fn identify_ecsv(path: &Path) -> Result<bool, LoadError> {
    Ok(path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("ecsv")))
}

/// Read a spectrum from an ECSV file.
///
/// Without a mapping, columns are assigned by unit and name heuristics.
/// With one, each mapped column feeds the named spectrum field in the given
/// unit.
pub fn generic_ecsv(
    path: &Path,
    column_mapping: Option<&ColumnMapping>,
) -> Result<Spectrum, LoadError> {
    let table = read_table(path)?;
    let spectrum = match column_mapping {
        None => generic_spectrum_from_table(&table)?,
        Some(mapping) => spectrum_from_column_mapping(&table, mapping)?,
    };
    Ok(spectrum)
}

pub fn read_table(path: &Path) -> Result<Table, EcsvError> {
    let text = std::fs::read_to_string(path)?;
    parse_table(&text)
}

pub fn parse_table(text: &str) -> Result<Table, EcsvError> {
    let mut lines = text.lines();
    let signature = lines.next().unwrap_or("");
    if !signature.trim_start_matches('#').trim().starts_with("%ECSV") {
        return Err(EcsvError::MissingSignature);
    }

    let mut yaml = String::new();
    let mut rows = Vec::new();
    for line in lines {
        if let Some(comment) = line.strip_prefix('#') {
            let content = comment.strip_prefix(' ').unwrap_or(comment);
            if content.trim() == "---" {
                continue;
            }
            yaml.push_str(content);
            yaml.push('\n');
        } else if !line.trim().is_empty() {
            rows.push(line);
        }
    }

    let header: EcsvHeader = serde_yaml::from_str(&yaml)?;
    let delimiter = match header.delimiter.as_deref() {
        None | Some(" ") => b' ',
        Some(",") => b',',
        Some(other) => return Err(EcsvError::BadDelimiter(other.to_string())),
    };

    let mut body = String::new();
    for row in rows {
        if delimiter == b' ' {
            body.push_str(&collapse_spaces(row));
        } else {
            body.push_str(row);
        }
        body.push('\n');
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_reader(body.as_bytes());

    let found: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let expected: Vec<String> = header.datatype.iter().map(|c| c.name.clone()).collect();
    if found != expected {
        return Err(EcsvError::HeaderMismatch { expected, found });
    }

    let mut cells: Vec<Vec<String>> = vec![Vec::new(); expected.len()];
    for record in reader.records() {
        let record = record?;
        for (column, value) in cells.iter_mut().zip(record.iter()) {
            column.push(value.to_string());
        }
    }

    let columns = header
        .datatype
        .iter()
        .zip(cells)
        .map(|(spec, values)| build_column(spec, values))
        .collect::<Result<Vec<_>, _>>()?;

    let mut table = Table::new(columns);
    table.meta = Meta {
        entries: header.meta.map(yaml_meta).unwrap_or_default(),
        header: None,
    };
    Ok(table)
}

/// Space-delimited rows may align columns with runs of spaces. Outside
/// double quotes, runs collapse to one space and the ends are trimmed, so a
/// missing value has to be written as `""`.
fn collapse_spaces(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut quoted = false;
    let mut pending_space = false;
    for c in line.chars() {
        if !quoted && c == ' ' {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        if c == '"' {
            quoted = !quoted;
        }
        out.push(c);
    }
    out
}

fn build_column(spec: &ColumnSpec, values: Vec<String>) -> Result<Column, EcsvError> {
    let invalid = |row: usize, value: &str| EcsvError::InvalidValue {
        column: spec.name.clone(),
        row,
        value: value.to_string(),
        datatype: spec.datatype.clone(),
    };

    let data = match kind_of(&spec.datatype) {
        Kind::Float => ColumnData::Float(
            values
                .iter()
                .enumerate()
                .map(|(row, v)| {
                    // Masked cells are written empty.
                    if v.is_empty() {
                        Ok(f64::NAN)
                    } else {
                        v.parse::<f64>().map_err(|_| invalid(row, v))
                    }
                })
                .collect::<Result<_, _>>()?,
        ),
        Kind::Int => {
            let parsed: Vec<Option<i64>> = values
                .iter()
                .enumerate()
                .map(|(row, v)| {
                    if v.is_empty() {
                        Ok(None)
                    } else {
                        v.parse::<i64>().map(Some).map_err(|_| invalid(row, v))
                    }
                })
                .collect::<Result<_, _>>()?;
            if parsed.iter().all(Option::is_some) {
                ColumnData::Int(parsed.into_iter().flatten().collect())
            } else {
                ColumnData::Float(
                    parsed
                        .into_iter()
                        .map(|v| v.map(|i| i as f64).unwrap_or(f64::NAN))
                        .collect(),
                )
            }
        }
        Kind::Bool => ColumnData::Bool(
            values
                .iter()
                .enumerate()
                .map(|(row, v)| match v.to_ascii_lowercase().as_str() {
                    "true" | "1" => Ok(true),
                    "false" | "0" => Ok(false),
                    _ => Err(invalid(row, v)),
                })
                .collect::<Result<_, _>>()?,
        ),
        Kind::Str => ColumnData::Str(values),
    };

    Ok(Column {
        name: spec.name.clone(),
        unit: spec.unit.clone().filter(|u| !u.is_empty()),
        description: spec.description.clone(),
        data,
    })
}

// ---------------------------------------------------------------------------
// YAML meta <-> MetadataValue
// ---------------------------------------------------------------------------

fn yaml_scalar(value: &serde_yaml::Value) -> MetadataValue {
    use serde_yaml::Value;
    match value {
        Value::Null => MetadataValue::Null,
        Value::Bool(b) => MetadataValue::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => MetadataValue::Integer(i),
            None => MetadataValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => MetadataValue::String(s.clone()),
        Value::Tagged(tagged) => yaml_scalar(&tagged.value),
        nested => MetadataValue::String(
            serde_yaml::to_string(nested)
                .map(|s| s.trim().to_string())
                .unwrap_or_default(),
        ),
    }
}

/// Flatten the header `meta` block. Both plain mappings and astropy's
/// `!!omap` form (a sequence of single-key mappings) are understood.
fn yaml_meta(value: serde_yaml::Value) -> std::collections::BTreeMap<String, MetadataValue> {
    use serde_yaml::Value;
    let mut out = std::collections::BTreeMap::new();
    let mut insert = |key: &Value, value: &Value| {
        let key = match key {
            Value::String(s) => s.clone(),
            other => yaml_scalar(other).to_string(),
        };
        out.insert(key, yaml_scalar(value));
    };

    let value = match value {
        Value::Tagged(tagged) => tagged.value,
        other => other,
    };
    match &value {
        Value::Mapping(map) => map.iter().for_each(|(k, v)| insert(k, v)),
        Value::Sequence(items) => {
            for item in items {
                if let Value::Mapping(map) = item {
                    map.iter().for_each(|(k, v)| insert(k, v));
                }
            }
        }
        other => log::debug!("ignoring non-mapping ECSV meta: {other:?}"),
    }
    out
}

fn metadata_to_yaml(value: &MetadataValue) -> serde_yaml::Value {
    use serde_yaml::Value;
    match value {
        MetadataValue::String(s) | MetadataValue::Date(s) => Value::String(s.clone()),
        MetadataValue::Integer(i) => Value::Number((*i).into()),
        MetadataValue::Float(f) => Value::Number((*f).into()),
        MetadataValue::Bool(b) => Value::Bool(*b),
        MetadataValue::Null => Value::Null,
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Write `table` as space-delimited ECSV 1.0.
pub fn write_table(table: &Table, path: &Path) -> Result<(), EcsvError> {
    let header = EcsvHeader {
        delimiter: None,
        datatype: table
            .columns
            .iter()
            .map(|c| ColumnSpec {
                name: c.name.clone(),
                datatype: match &c.data {
                    ColumnData::Float(_) => "float64",
                    ColumnData::Int(_) => "int64",
                    ColumnData::Bool(_) => "bool",
                    ColumnData::Str(_) => "string",
                }
                .to_string(),
                unit: c.unit.clone(),
                description: c.description.clone(),
            })
            .collect(),
        meta: (!table.meta.entries.is_empty()).then(|| {
            serde_yaml::Value::Mapping(
                table
                    .meta
                    .entries
                    .iter()
                    .map(|(k, v)| (serde_yaml::Value::String(k.clone()), metadata_to_yaml(v)))
                    .collect(),
            )
        }),
    };

    let mut out = String::from("# %ECSV 1.0\n# ---\n");
    for line in serde_yaml::to_string(&header)?.lines() {
        out.push_str("# ");
        out.push_str(line);
        out.push('\n');
    }

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b' ')
        .from_writer(Vec::new());
    writer.write_record(table.columns.iter().map(|c| c.name.as_str()))?;
    let names = writer
        .into_inner()
        .map_err(|e| EcsvError::Io(e.into_error()))?;

    // Masked cells are empty and must be quoted to survive space collapsing.
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b' ')
        .quote_style(csv::QuoteStyle::NonNumeric)
        .from_writer(names);
    for row in 0..table.num_rows() {
        let record: Vec<String> = table
            .columns
            .iter()
            .map(|c| match &c.data {
                ColumnData::Float(v) if v[row].is_nan() => String::new(),
                ColumnData::Float(v) => v[row].to_string(),
                ColumnData::Int(v) => v[row].to_string(),
                ColumnData::Bool(v) => (if v[row] { "True" } else { "False" }).to_string(),
                ColumnData::Str(v) => v[row].clone(),
            })
            .collect();
        writer.write_record(&record)?;
    }
    let body = writer
        .into_inner()
        .map_err(|e| EcsvError::Io(e.into_error()))?;
    out.push_str(&String::from_utf8_lossy(&body));

    std::fs::write(path, out)?;
    Ok(())
}

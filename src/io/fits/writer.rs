use std::path::Path;

use fitsio_pure::bintable::{self as codec, BinaryColumnData, BinaryColumnDescriptor, BinaryColumnType};
use fitsio_pure::header::{serialize_header, Card};

use super::{FitsError, Header, HeaderValue};
use crate::io::table::{Column, ColumnData, Table};

/// Keywords the writer owns; copies from a caller's header are dropped.
const STRUCTURAL: &[&str] = &["SIMPLE", "BITPIX", "NAXIS", "EXTEND", "END"];

fn is_structural(keyword: &str) -> bool {
    STRUCTURAL.contains(&keyword) || keyword.starts_with("NAXIS")
}

/// FITS headers are ASCII only.
fn check_ascii(cards: &[Card]) -> Result<(), FitsError> {
    for card in cards {
        let text_ok = match &card.value {
            Some(HeaderValue::String(s)) => s.is_ascii(),
            _ => true,
        } && card.comment.as_deref().map_or(true, str::is_ascii);
        if !text_ok {
            return Err(FitsError::InvalidKeyword {
                keyword: card.keyword_str().to_string(),
                reason: "header text must be ASCII".to_string(),
            });
        }
    }
    Ok(())
}

/// Float columns are written as `D`, integer as `K`, boolean as `L` and
/// strings as fixed-width `A` sized to the longest value.
fn encode_column(column: &Column) -> (BinaryColumnDescriptor, BinaryColumnData) {
    let (repeat, col_type, data) = match &column.data {
        ColumnData::Float(v) => (1, BinaryColumnType::Double, BinaryColumnData::Double(v.clone())),
        ColumnData::Int(v) => (1, BinaryColumnType::Long, BinaryColumnData::Long(v.clone())),
        ColumnData::Bool(v) => (1, BinaryColumnType::Logical, BinaryColumnData::Logical(v.clone())),
        ColumnData::Str(v) => {
            let width = v.iter().map(String::len).max().unwrap_or(0).max(1);
            (width, BinaryColumnType::Ascii, BinaryColumnData::Ascii(v.clone()))
        }
    };
    let descriptor = BinaryColumnDescriptor {
        name: Some(column.name.clone()),
        repeat,
        byte_width: repeat * codec::binary_type_byte_size(&col_type),
        col_type,
        tdim: None,
    };
    (descriptor, data)
}

/// Bytes of a primary HDU without data followed by one `BINTABLE` extension.
pub fn tabular_bytes(primary: &Header, table: &Table) -> Result<Vec<u8>, FitsError> {
    let n_rows = table.num_rows();
    for column in &table.columns {
        if column.len() != n_rows {
            return Err(FitsError::InvalidKeyword {
                keyword: "NAXIS2".to_string(),
                reason: format!(
                    "column '{}' has {} rows, expected {n_rows}",
                    column.name,
                    column.len()
                ),
            });
        }
        if !column.name.is_ascii() {
            return Err(FitsError::InvalidKeyword {
                keyword: "TTYPE".to_string(),
                reason: format!("column name '{}' is not ASCII", column.name),
            });
        }
        if let ColumnData::Str(values) = &column.data {
            if !values.iter().all(|s| s.is_ascii()) {
                return Err(FitsError::InvalidKeyword {
                    keyword: "TFORM".to_string(),
                    reason: format!("column '{}' holds non-ASCII text", column.name),
                });
            }
        }
    }

    // -- primary HDU --
    let mut cards = vec![
        Card::new("SIMPLE", HeaderValue::Logical(true))?,
        Card::new("BITPIX", HeaderValue::Integer(8))?,
        Card::new("NAXIS", HeaderValue::Integer(0))?,
        Card::new("EXTEND", HeaderValue::Logical(true))?,
    ];
    cards.extend(
        primary
            .cards()
            .iter()
            .filter(|c| !is_structural(c.keyword_str()))
            .cloned(),
    );
    check_ascii(&cards)?;
    let mut out = serialize_header(&cards)?;

    // -- table extension --
    let (descriptors, data): (Vec<_>, Vec<_>) = table.columns.iter().map(encode_column).unzip();
    let mut cards = codec::build_binary_table_cards(&descriptors, n_rows, 0)?;
    for (i, column) in table.columns.iter().enumerate() {
        if let Some(unit) = &column.unit {
            cards.push(Card::new(
                &format!("TUNIT{}", i + 1),
                HeaderValue::String(unit.clone()),
            )?);
        }
    }
    check_ascii(&cards)?;
    out.extend(serialize_header(&cards)?);
    out.extend(codec::serialize_binary_table(&descriptors, &data, n_rows)?);
    Ok(out)
}

/// Write [`tabular_bytes`] to `path`.
pub fn write_tabular(path: &Path, primary: &Header, table: &Table) -> Result<(), FitsError> {
    let bytes = tabular_bytes(primary, table)?;
    std::fs::write(path, bytes)?;
    log::debug!("wrote {}-row table to {}", table.num_rows(), path.display());
    Ok(())
}

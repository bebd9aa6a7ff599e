use fitsio_pure::bintable::{self as codec, BinaryColumnData, BinaryColumnType};
use fitsio_pure::hdu::{Hdu, HduInfo};

use super::{FitsError, Header};
use crate::io::table::{Column, ColumnData, Table};

fn invalid(keyword: &str, reason: String) -> FitsError {
    FitsError::InvalidKeyword {
        keyword: keyword.to_string(),
        reason,
    }
}

/// The `TFORMn` widths must add up to `NAXIS1` and every row must be
/// present. All sizes use checked arithmetic.
fn check_layout(
    header: &Header,
    naxis1: usize,
    naxis2: usize,
    tfields: usize,
    available: usize,
) -> Result<(), FitsError> {
    let mut width = 0usize;
    for n in 1..=tfields {
        let keyword = format!("TFORM{n}");
        let tform = header
            .get_str(&keyword)
            .ok_or_else(|| FitsError::MissingKeyword(keyword.clone()))?;
        let code = tform.trim().split('(').next().unwrap_or_default();
        if code.is_empty() || !tform.is_ascii() {
            return Err(invalid(&keyword, format!("'{tform}' is not a column format")));
        }
        let (repeat, kind) = codec::parse_tform_binary(tform)?;
        let cell = match kind {
            BinaryColumnType::Bit => Some(repeat.div_ceil(8)),
            other => repeat.checked_mul(codec::binary_type_byte_size(&other)),
        };
        width = cell
            .and_then(|cell| width.checked_add(cell))
            .ok_or_else(|| invalid(&keyword, format!("'{tform}' overflows the row width")))?;
    }
    if width != naxis1 {
        return Err(invalid(
            "NAXIS1",
            format!("row is {naxis1} bytes but columns need {width}"),
        ));
    }
    let needed = naxis1
        .checked_mul(naxis2)
        .ok_or_else(|| invalid("NAXIS2", format!("{naxis2} rows of {naxis1} bytes overflow")))?;
    if needed > available {
        return Err(invalid(
            "NAXIS2",
            format!("table needs {needed} bytes, have {available}"),
        ));
    }
    Ok(())
}

fn integers(raw: &BinaryColumnData) -> Option<Vec<i64>> {
    Some(match raw {
        BinaryColumnData::Byte(v) => v.iter().map(|&x| x as i64).collect(),
        BinaryColumnData::Short(v) => v.iter().map(|&x| x as i64).collect(),
        BinaryColumnData::Int(v) => v.iter().map(|&x| x as i64).collect(),
        BinaryColumnData::Long(v) => v.clone(),
        _ => return None,
    })
}

/// Map decoded cells onto a table column. `None` for kinds the table model
/// has no place for (complex, bit arrays, heap descriptors).
fn column_data(raw: BinaryColumnData, tscal: f64, tzero: f64) -> Option<ColumnData> {
    match raw {
        BinaryColumnData::Ascii(v) => Some(ColumnData::Str(
            v.into_iter()
                .map(|s| s.trim_end_matches(['\0', ' ']).to_string())
                .collect(),
        )),
        BinaryColumnData::Logical(v) => Some(ColumnData::Bool(v)),
        BinaryColumnData::Float(_) | BinaryColumnData::Double(_) => Some(ColumnData::Float(
            codec::apply_column_scaling(&raw, tscal, tzero),
        )),
        ref other => {
            let values = integers(other)?;
            if tscal != 1.0 || tzero.fract() != 0.0 {
                Some(ColumnData::Float(codec::apply_column_scaling(
                    other, tscal, tzero,
                )))
            } else {
                let zero = tzero as i64;
                Some(ColumnData::Int(
                    values.iter().map(|&v| v.wrapping_add(zero)).collect(),
                ))
            }
        }
    }
}

/// Decode a `BINTABLE` HDU of `bytes` into a [`Table`].
///
/// Vector columns (repeat > 1) come back flattened row by row, so a
/// single-row table holding a whole spectrum in one cell reads as a plain
/// column.
pub fn read_table(bytes: &[u8], hdu: &Hdu) -> Result<Table, FitsError> {
    let HduInfo::BinaryTable {
        naxis1,
        naxis2,
        tfields,
        ..
    } = hdu.info
    else {
        return Err(FitsError::NoBinTable);
    };
    let header = Header::from_cards(hdu.cards.clone());
    let available = bytes.len().saturating_sub(hdu.data_start);
    check_layout(&header, naxis1, naxis2, tfields, available)?;

    let descriptors = codec::parse_binary_table_columns(&hdu.cards, tfields)?;
    let mut columns = Vec::with_capacity(descriptors.len());
    for (index, descriptor) in descriptors.iter().enumerate() {
        let n = index + 1;
        let name = descriptor
            .name
            .as_deref()
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| format!("col{n}"));

        let kept = match descriptor.col_type {
            BinaryColumnType::VarArrayP(_) | BinaryColumnType::VarArrayQ(_) => None,
            _ => {
                let raw = codec::read_binary_column(bytes, hdu, index)?;
                let (tscal, tzero) = codec::extract_column_scaling(&hdu.cards, n);
                column_data(raw, tscal, tzero)
            }
        };
        let Some(data) = kept else {
            log::warn!("skipping column '{name}' with unsupported format");
            continue;
        };

        columns.push(Column {
            name,
            unit: header
                .get_str(&format!("TUNIT{n}"))
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            description: None,
            data,
        });
    }

    Ok(Table::new(columns))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::fits::FitsFile;

    fn table_bytes(cards: &[String], data: &[u8]) -> Vec<u8> {
        fn block(cards: &[String]) -> Vec<u8> {
            let mut out = Vec::new();
            for c in cards {
                out.extend(format!("{c:<80}").as_bytes());
            }
            out.extend(format!("{:<80}", "END").as_bytes());
            out.resize(out.len().div_ceil(2880) * 2880, b' ');
            out
        }
        let mut bytes = block(&[
            "SIMPLE  =                    T".to_string(),
            "BITPIX  =                    8".to_string(),
            "NAXIS   =                    0".to_string(),
            "EXTEND  =                    T".to_string(),
        ]);
        bytes.extend(block(cards));
        let mut data = data.to_vec();
        data.resize(data.len().div_ceil(2880).max(1) * 2880, 0);
        bytes.extend(data);
        bytes
    }

    fn bintable_cards(forms: &[(&str, &str)], row_len: usize, rows: usize) -> Vec<String> {
        let mut cards = vec![
            "XTENSION= 'BINTABLE'".to_string(),
            "BITPIX  =                    8".to_string(),
            "NAXIS   =                    2".to_string(),
            format!("NAXIS1  = {row_len:>20}"),
            format!("NAXIS2  = {rows:>20}"),
            "PCOUNT  =                    0".to_string(),
            "GCOUNT  =                    1".to_string(),
            format!("TFIELDS = {:>20}", forms.len()),
        ];
        for (i, (name, form)) in forms.iter().enumerate() {
            cards.push(format!("{:<8}= '{name}'", format!("TTYPE{}", i + 1)));
            cards.push(format!("{:<8}= '{form}'", format!("TFORM{}", i + 1)));
        }
        cards
    }

    fn read(cards: &[String], data: &[u8]) -> Result<Table, FitsError> {
        let file = FitsFile::from_bytes(table_bytes(cards, data))?;
        file.first_bintable().map(|(_, table)| table)
    }

    #[test]
    fn test_scalar_columns() {
        let cards = bintable_cards(&[("flux", "E"), ("n", "J"), ("ok", "L"), ("tag", "3A")], 12, 2);
        let mut data = Vec::new();
        data.extend(1.5f32.to_be_bytes());
        data.extend(7i32.to_be_bytes());
        data.push(b'T');
        data.extend(b"ab ");
        data.extend((-2.0f32).to_be_bytes());
        data.extend((-1i32).to_be_bytes());
        data.push(b'F');
        data.extend(b"xyz");

        let table = read(&cards, &data).unwrap();
        assert_eq!(table.column_names(), vec!["flux", "n", "ok", "tag"]);
        assert_eq!(table.column("flux").unwrap().data, ColumnData::Float(vec![1.5, -2.0]));
        assert_eq!(table.column("n").unwrap().data, ColumnData::Int(vec![7, -1]));
        assert_eq!(table.column("ok").unwrap().data, ColumnData::Bool(vec![true, false]));
        assert_eq!(
            table.column("tag").unwrap().data,
            ColumnData::Str(vec!["ab".into(), "xyz".into()])
        );
    }

    #[test]
    fn test_vector_column_flattened() {
        let cards = bintable_cards(&[("flux", "3D")], 24, 1);
        let data: Vec<u8> = [1.0f64, 2.0, 3.0]
            .iter()
            .flat_map(|v| v.to_be_bytes())
            .collect();
        let table = read(&cards, &data).unwrap();
        assert_eq!(
            table.column("flux").unwrap().data,
            ColumnData::Float(vec![1.0, 2.0, 3.0])
        );
    }

    #[test]
    fn test_scaled_integers_become_floats() {
        let mut cards = bintable_cards(&[("flux", "I")], 2, 1);
        cards.push("TSCAL1  =                  0.5".to_string());
        cards.push("TZERO1  =                 10.0".to_string());
        let table = read(&cards, &4i16.to_be_bytes()).unwrap();
        assert_eq!(table.column("flux").unwrap().data, ColumnData::Float(vec![12.0]));
    }

    #[test]
    fn test_row_width_mismatch() {
        let cards = bintable_cards(&[("flux", "D")], 4, 1);
        assert!(matches!(
            read(&cards, &[0u8; 4]),
            Err(FitsError::InvalidKeyword { ref keyword, .. }) if keyword == "NAXIS1"
        ));
    }

    #[test]
    fn test_huge_repeat_count_is_an_error() {
        let cards = bintable_cards(&[("flux", "4611686018427387904D")], 8, 1);
        assert!(matches!(
            read(&cards, &[0u8; 8]),
            Err(FitsError::InvalidKeyword { ref keyword, .. }) if keyword == "TFORM1"
        ));
    }

    #[test]
    fn test_malformed_tform_is_an_error() {
        for form in ["(5)", "Z", "2"] {
            let cards = bintable_cards(&[("flux", form)], 8, 1);
            assert!(read(&cards, &[0u8; 8]).is_err(), "{form}");
        }
    }

    #[test]
    fn test_missing_tform_is_an_error() {
        let mut cards = bintable_cards(&[("flux", "D")], 8, 1);
        cards.retain(|c| !c.starts_with("TFORM1"));
        assert!(matches!(
            read(&cards, &[0u8; 8]),
            Err(FitsError::MissingKeyword(ref k)) if k == "TFORM1"
        ));
    }
}

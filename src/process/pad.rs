use crate::process::utils;
use crate::process::MUNICIPALITY;
use anyhow::{anyhow, bail, Result};
use arrow::{
    array::{Array, StringArray},
    datatypes::{DataType, Field},
    record_batch::RecordBatch,
};
use std::sync::Arc;

/// Left-pad `code` with `'0'` to `width`. Codes must be ASCII digits, and
/// codes already wider are rejected: the geographic catalog keys are exactly
/// `width` digits and truncating would silently point at another municipality.
pub fn pad_code(code: &str, width: usize) -> Result<String> {
    let code = code.trim();
    if code.is_empty() || !code.bytes().all(|b| b.is_ascii_digit()) {
        bail!("municipality code `{}` is not numeric", code);
    }
    let len = code.chars().count();
    if len > width {
        bail!(
            "municipality code `{}` has {} characters, wider than {}",
            code,
            len,
            width
        );
    }
    Ok(format!("{:0>width$}", code, width = width))
}

/// Key Padder: the municipality column (string or integer) becomes a Utf8
/// column of zero-padded, fixed-width codes.
#[tracing::instrument(level = "debug", skip_all, fields(rows = batch.num_rows()))]
pub fn pad_municipality_codes(batch: &RecordBatch, width: usize) -> Result<RecordBatch> {
    let codes = utils::cast_column(batch, MUNICIPALITY, &DataType::Utf8)?;
    let codes = codes
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| anyhow!("column `{}` did not cast to Utf8", MUNICIPALITY))?;

    let mut padded = Vec::with_capacity(codes.len());
    for row in 0..codes.len() {
        if codes.is_null(row) {
            bail!("null municipality code at row {}", row);
        }
        padded.push(pad_code(codes.value(row), width)?);
    }

    utils::with_column(
        batch,
        Field::new(MUNICIPALITY, DataType::Utf8, false),
        Arc::new(StringArray::from(padded)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::KEY_WIDTH;
    use arrow::array::{ArrayRef, Int64Array};

    #[test]
    fn pads_to_width() -> Result<()> {
        assert_eq!(pad_code("5", KEY_WIDTH)?, "00005");
        assert_eq!(pad_code("1001", KEY_WIDTH)?, "01001");
        assert_eq!(pad_code("32058", KEY_WIDTH)?, "32058");
        assert_eq!(pad_code(" 7 ", KEY_WIDTH)?, "00007");
        Ok(())
    }

    #[test]
    fn wider_codes_are_an_error_not_truncated() {
        let err = pad_code("123456", KEY_WIDTH).unwrap_err();
        assert!(err.to_string().contains("`123456`"));
    }

    #[test]
    fn non_numeric_codes_are_an_error() {
        for code in ["-5", "X01", "1.5", "1 001", ""] {
            let err = pad_code(code, KEY_WIDTH).unwrap_err();
            assert!(err.to_string().contains("not numeric"), "{}", code);
        }
    }

    #[test]
    fn integer_column_is_converted() -> Result<()> {
        let batch = RecordBatch::try_from_iter(vec![(
            MUNICIPALITY,
            Arc::new(Int64Array::from(vec![5, 1001, 9012])) as ArrayRef,
        )])?;
        let out = pad_municipality_codes(&batch, KEY_WIDTH)?;
        let codes = utils::typed_column::<StringArray>(&out, MUNICIPALITY)?;
        let got: Vec<&str> = codes.iter().map(|c| c.unwrap()).collect();
        assert_eq!(got, vec!["00005", "01001", "09012"]);
        assert!(got.iter().all(|c| c.len() == KEY_WIDTH));
        Ok(())
    }

    #[test]
    fn overflow_in_column_aborts() -> Result<()> {
        let batch = RecordBatch::try_from_iter(vec![(
            MUNICIPALITY,
            Arc::new(StringArray::from(vec!["5", "999999"])) as ArrayRef,
        )])?;
        assert!(pad_municipality_codes(&batch, KEY_WIDTH).is_err());
        Ok(())
    }
}

use crate::process::months::MonthTable;
use crate::process::utils::{self, clean_str};
use crate::process::{MUNICIPALITY, YEAR};
use anyhow::{anyhow, Result};
use arrow::{
    array::{Array, ArrayRef, Int32Array, StringArray},
    datatypes::{DataType, Field},
    record_batch::RecordBatch,
};
use std::sync::Arc;
use tracing::debug;

/// Parse a monthly count. Accepts plain integers, integral floats (`"12.0"`)
/// and thousands separators (`"1,204"`); anything else is absent.
pub fn parse_count(raw: &str) -> Option<i32> {
    let s = clean_str(raw).replace(',', "");
    if s.is_empty() {
        return None;
    }
    if let Ok(v) = s.parse::<i32>() {
        return Some(v);
    }
    let f = s.parse::<f64>().ok()?;
    if f.is_finite() && f.fract() == 0.0 && f >= i32::MIN as f64 && f <= i32::MAX as f64 {
        Some(f as i32)
    } else {
        None
    }
}

/// Canonical form of a raw municipality code: integral values lose leading
/// zeros and decimal parts (`"05"`, `"5.0"` → `"5"`), the rest is trimmed
/// and left for the key padder to reject.
pub fn canonical_code(raw: &str) -> Option<String> {
    let s = clean_str(raw);
    if s.is_empty() {
        return None;
    }
    if let Ok(v) = s.parse::<i64>() {
        return Some(v.to_string());
    }
    match s.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
            Some((f as i64).to_string())
        }
        _ => Some(s),
    }
}

/// Coerce a column into nullable Int32. Strings are parsed leniently,
/// other numeric types are cast (overflow becomes null).
fn to_int32(batch: &RecordBatch, name: &str) -> Result<(ArrayRef, usize)> {
    let arr = utils::column(batch, name)?;
    let before = arr.null_count();
    let out: ArrayRef = match arr.as_any().downcast_ref::<StringArray>() {
        Some(sarr) => Arc::new(
            sarr.iter()
                .map(|v| v.and_then(parse_count))
                .collect::<Int32Array>(),
        ),
        None => utils::cast_column(batch, name, &DataType::Int32)?,
    };
    let coerced = out.null_count().saturating_sub(before);
    Ok((out, coerced))
}

fn to_code(batch: &RecordBatch, name: &str) -> Result<ArrayRef> {
    let sarr = utils::cast_column(batch, name, &DataType::Utf8)?;
    let sarr = sarr
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| anyhow!("column `{}` did not cast to Utf8", name))?;
    let out: StringArray = sarr.iter().map(|v| v.and_then(canonical_code)).collect();
    Ok(Arc::new(out))
}

/// Type Normalizer: month columns and year become nullable Int32, the
/// municipality code becomes its canonical string. Other columns are left alone.
#[tracing::instrument(level = "debug", skip_all, fields(rows = batch.num_rows()))]
pub fn normalize_types(batch: &RecordBatch, months: &MonthTable) -> Result<RecordBatch> {
    let mut out = batch.clone();

    for name in months.names().iter().copied().chain(std::iter::once(YEAR)) {
        let (arr, coerced) = to_int32(batch, name)?;
        if coerced > 0 {
            debug!(column = name, coerced, "unparseable values set to null");
        }
        out = utils::with_column(&out, Field::new(name, DataType::Int32, true), arr)?;
    }

    let codes = to_code(batch, MUNICIPALITY)?;
    out = utils::with_column(&out, Field::new(MUNICIPALITY, DataType::Utf8, true), codes)?;

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::load::parse_delimited;
    use crate::process::months::SPANISH_MONTHS;

    fn raw(rows: &[&str]) -> RecordBatch {
        let mut text = String::from("ano,cve_municipio,subtipo_de_delito,");
        text.push_str(&SPANISH_MONTHS.names().join(","));
        text.push('\n');
        for r in rows {
            text.push_str(r);
            text.push('\n');
        }
        parse_delimited(&text, b',').unwrap()
    }

    #[test]
    fn parse_count_cases() {
        assert_eq!(parse_count("10"), Some(10));
        assert_eq!(parse_count(" 7 "), Some(7));
        assert_eq!(parse_count("12.0"), Some(12));
        assert_eq!(parse_count("1,204"), Some(1204));
        assert_eq!(parse_count("0"), Some(0));
        assert_eq!(parse_count("1.5"), None);
        assert_eq!(parse_count("N/D"), None);
        assert_eq!(parse_count(""), None);
        assert_eq!(parse_count("99999999999"), None);
    }

    #[test]
    fn canonical_code_cases() {
        assert_eq!(canonical_code("05").as_deref(), Some("5"));
        assert_eq!(canonical_code("1001").as_deref(), Some("1001"));
        assert_eq!(canonical_code("1001.0").as_deref(), Some("1001"));
        assert_eq!(canonical_code(" X01 ").as_deref(), Some("X01"));
        assert_eq!(canonical_code("  "), None);
    }

    #[test]
    fn months_become_nullable_int32() -> Result<()> {
        let batch = raw(&["2024,5,Robo,10,5,N/D,,1,1,1,1,1,1,1,0"]);
        let typed = normalize_types(&batch, &SPANISH_MONTHS)?;

        let enero = utils::typed_column::<Int32Array>(&typed, "enero")?;
        assert_eq!(enero.value(0), 10);
        let marzo = utils::typed_column::<Int32Array>(&typed, "marzo")?;
        assert!(marzo.is_null(0));
        let abril = utils::typed_column::<Int32Array>(&typed, "abril")?;
        assert!(abril.is_null(0));
        let diciembre = utils::typed_column::<Int32Array>(&typed, "diciembre")?;
        assert_eq!(diciembre.value(0), 0);

        let year = utils::typed_column::<Int32Array>(&typed, YEAR)?;
        assert_eq!(year.value(0), 2024);
        // non-month columns untouched
        assert_eq!(
            typed.schema().field_with_name("subtipo_de_delito")?.data_type(),
            &DataType::Utf8
        );
        Ok(())
    }

    #[test]
    fn already_numeric_columns_are_cast() -> Result<()> {
        let batch = raw(&["2024,5,Robo,1,2,3,4,5,6,7,8,9,10,11,12"]);
        let once = normalize_types(&batch, &SPANISH_MONTHS)?;
        let twice = normalize_types(&once, &SPANISH_MONTHS)?;
        assert_eq!(once, twice);
        Ok(())
    }

    #[test]
    fn missing_month_column_is_fatal() {
        let batch = parse_delimited("ano,cve_municipio,enero\n2024,5,1\n", b',').unwrap();
        let err = normalize_types(&batch, &SPANISH_MONTHS).unwrap_err();
        assert!(err.to_string().contains("`febrero`"));
    }
}

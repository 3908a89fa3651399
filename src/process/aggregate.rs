use crate::process::months::MonthTable;
use crate::process::utils;
use crate::process::{MUNICIPALITY, SUBTYPE, YEAR};
use anyhow::{Context, Result};
use arrow::{
    array::{Array, ArrayRef, Int32Array, Int64Array, StringArray},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use std::{collections::BTreeMap, sync::Arc};
use tracing::{debug, warn};

type GroupKey = (i32, String, String);

/// Add `value` into `slot` with sum-skip-null semantics: a slot stays `None`
/// until the first non-null contribution.
fn accumulate(slot: &mut Option<i64>, value: Option<i32>) {
    if let Some(v) = value {
        *slot = Some(slot.unwrap_or(0) + i64::from(v));
    }
}

/// Aggregator: one row per (year, municipality code, subtype), each month
/// summed independently. A month whose contributions are all null stays null.
///
/// Rows with a null key are dropped. Output rows come out in key order, but
/// callers must not rely on it.
#[tracing::instrument(level = "debug", skip_all, fields(rows = batch.num_rows()))]
pub fn aggregate_by_subtype(batch: &RecordBatch, months: &MonthTable) -> Result<RecordBatch> {
    let years = utils::typed_column::<Int32Array>(batch, YEAR)?;
    let codes = utils::typed_column::<StringArray>(batch, MUNICIPALITY)?;
    let subtype_col = utils::cast_column(batch, SUBTYPE, &DataType::Utf8)?;
    let subtypes = subtype_col
        .as_any()
        .downcast_ref::<StringArray>()
        .context("subtype column is not Utf8")?;
    let month_cols: Vec<&Int32Array> = months
        .names()
        .iter()
        .map(|m| utils::typed_column::<Int32Array>(batch, m))
        .collect::<Result<_>>()?;

    let mut groups: BTreeMap<GroupKey, [Option<i64>; 12]> = BTreeMap::new();
    let mut dropped = 0usize;

    for row in 0..batch.num_rows() {
        if years.is_null(row) || codes.is_null(row) || subtypes.is_null(row) {
            dropped += 1;
            continue;
        }
        let key = (
            years.value(row),
            codes.value(row).to_string(),
            subtypes.value(row).to_string(),
        );
        let sums = groups.entry(key).or_insert([None; 12]);
        for (slot, col) in sums.iter_mut().zip(&month_cols) {
            accumulate(slot, (!col.is_null(row)).then(|| col.value(row)));
        }
    }

    if dropped > 0 {
        warn!(dropped, "rows with a missing year, municipality or subtype were dropped");
    }
    debug!(groups = groups.len(), "aggregated by year, municipality and subtype");

    let mut out_years = Vec::with_capacity(groups.len());
    let mut out_codes = Vec::with_capacity(groups.len());
    let mut out_subtypes = Vec::with_capacity(groups.len());
    let mut out_months: Vec<Vec<Option<i64>>> = vec![Vec::with_capacity(groups.len()); 12];
    for ((year, code, subtype), sums) in groups {
        out_years.push(year);
        out_codes.push(code);
        out_subtypes.push(subtype);
        for (col, v) in out_months.iter_mut().zip(sums) {
            col.push(v);
        }
    }

    let mut fields = vec![
        Field::new(YEAR, DataType::Int32, false),
        Field::new(MUNICIPALITY, DataType::Utf8, false),
        Field::new(SUBTYPE, DataType::Utf8, false),
    ];
    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(Int32Array::from(out_years)),
        Arc::new(StringArray::from(out_codes)),
        Arc::new(StringArray::from(out_subtypes)),
    ];
    for (name, values) in months.names().iter().zip(out_months) {
        fields.push(Field::new(*name, DataType::Int64, true));
        columns.push(Arc::new(Int64Array::from(values)));
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
        .context("building aggregated record batch")
}

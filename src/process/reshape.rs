use crate::process::months::MonthTable;
use crate::process::utils;
use crate::process::{MONTH, MUNICIPALITY, SUBTYPE, TOTAL, YEAR};
use anyhow::{Context, Result};
use arrow::{
    array::{Array, ArrayRef, StringArray, UInt32Array},
    compute::{concat, take},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use std::sync::Arc;

const ID_COLUMNS: [&str; 3] = [YEAR, MUNICIPALITY, SUBTYPE];

/// Reshaper: unpivot the twelve month columns into `mes` + `total`.
///
/// Output is month-major: every input row for `enero` in input order, then
/// every row for `febrero`, and so on. Row count is always `input × 12`.
#[tracing::instrument(level = "debug", skip_all, fields(rows = batch.num_rows()))]
pub fn pivot_months(batch: &RecordBatch, months: &MonthTable) -> Result<RecordBatch> {
    let n = batch.num_rows();
    let names = months.names();

    // row i of the output repeats input row i % n
    let indices = UInt32Array::from_iter_values((0..names.len()).flat_map(|_| 0..n as u32));

    let schema = batch.schema();
    let mut fields = Vec::with_capacity(ID_COLUMNS.len() + 2);
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(ID_COLUMNS.len() + 2);
    for name in ID_COLUMNS {
        let field = schema
            .field_with_name(name)
            .with_context(|| format!("missing expected column `{}`", name))?;
        let col = utils::column(batch, name)?;
        fields.push(field.clone());
        columns.push(take(col.as_ref(), &indices, None).with_context(|| format!("repeating `{}`", name))?);
    }

    let month_names: StringArray = names
        .iter()
        .flat_map(|m| std::iter::repeat(Some(*m)).take(n))
        .collect();
    fields.push(Field::new(MONTH, DataType::Utf8, false));
    columns.push(Arc::new(month_names));

    let values: Vec<ArrayRef> = names
        .iter()
        .map(|m| utils::cast_column(batch, m, &DataType::Int64))
        .collect::<Result<_>>()?;
    let refs: Vec<&dyn Array> = values.iter().map(|a| a.as_ref()).collect();
    let totals = concat(&refs).context("stacking month columns")?;
    fields.push(Field::new(TOTAL, DataType::Int64, true));
    columns.push(totals);

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
        .context("building long record batch")
}

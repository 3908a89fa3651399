use crate::process::months::MonthTable;
use crate::process::utils;
use crate::process::{DATE, MONTH, MONTH_NUM, YEAR};
use anyhow::{anyhow, bail, Context, Result};
use arrow::{
    array::{Array, Date32Array, Int32Array, StringArray},
    datatypes::{DataType, Field},
    record_batch::RecordBatch,
};
use chrono::NaiveDate;
use std::sync::Arc;

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).expect("unix epoch is a valid date")
}

/// Days since 1970-01-01, the Date32 representation.
pub fn days_since_epoch(date: NaiveDate) -> i32 {
    (date - epoch()).num_days() as i32
}

pub fn from_days_since_epoch(days: i32) -> Option<NaiveDate> {
    epoch().checked_add_signed(chrono::Duration::days(i64::from(days)))
}

/// First day of `month` in `year`.
pub fn first_of_month(year: i32, month: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| anyhow!("invalid date {}-{:02}-01", year, month))
}

/// Date Synthesizer: add `mes_num` (1–12) and `fecha` (first of month).
///
/// A month name outside the table means an upstream stage broke its
/// contract and aborts the run.
#[tracing::instrument(level = "debug", skip_all, fields(rows = batch.num_rows()))]
pub fn synthesize_dates(batch: &RecordBatch, months: &MonthTable) -> Result<RecordBatch> {
    let names = utils::typed_column::<StringArray>(batch, MONTH)?;
    let years = utils::typed_column::<Int32Array>(batch, YEAR)?;

    let mut numbers = Vec::with_capacity(batch.num_rows());
    let mut dates = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        if names.is_null(row) {
            bail!("null month name at row {}", row);
        }
        if years.is_null(row) {
            bail!("null year at row {}", row);
        }
        let name = names.value(row);
        let number = months
            .number(name)
            .ok_or_else(|| anyhow!("unknown month name `{}` at row {}", name, row))?;
        let date = first_of_month(years.value(row), number)
            .with_context(|| format!("row {}", row))?;
        numbers.push(number as i32);
        dates.push(days_since_epoch(date));
    }

    let out = utils::with_column(
        batch,
        Field::new(MONTH_NUM, DataType::Int32, false),
        Arc::new(Int32Array::from(numbers)),
    )?;
    utils::with_column(
        &out,
        Field::new(DATE, DataType::Date32, false),
        Arc::new(Date32Array::from(dates)),
    )
}

// src/query/mod.rs
//! The one query every dashboard runs: pick a crime subtype and an inclusive
//! date range, then sum `total` per municipality for choropleth colouring.
use crate::process::dates::{days_since_epoch, from_days_since_epoch};
use crate::process::utils;
use crate::process::{DATE, MUNICIPALITY, SUBTYPE, TOTAL};
use anyhow::{anyhow, bail, Result};
use arrow::{
    array::{Array, ArrayRef, Date32Array, Int64Array, StringArray},
    datatypes::DataType,
    record_batch::RecordBatch,
};
use chrono::NaiveDate;
use num_format::{Locale, ToFormattedString};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidenceQuery {
    pub subtype: String,
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MunicipalityTotal {
    pub cve_municipio: String,
    /// `None` when every matched month had no data.
    pub total: Option<i64>,
    /// Number of monthly rows that fell in the range.
    pub months: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult {
    #[serde(flatten)]
    pub query: IncidenceQuery,
    /// Sorted by municipality code.
    pub municipalities: Vec<MunicipalityTotal>,
    /// Sum over the whole selection; `None` when nothing in it has data.
    pub total: Option<i64>,
}

impl QueryResult {
    pub fn get(&self, cve: &str) -> Option<&MunicipalityTotal> {
        self.municipalities
            .binary_search_by(|m| m.cve_municipio.as_str().cmp(cve))
            .ok()
            .map(|idx| &self.municipalities[idx])
    }

    /// One-line summary shown under the map.
    pub fn summary(&self) -> String {
        format!(
            "{} casos de {} en el periodo seleccionado.",
            self.total.unwrap_or(0).to_formatted_string(&Locale::en),
            self.query.subtype
        )
    }
}

fn add(slot: &mut Option<i64>, value: Option<i64>) {
    if let Some(v) = value {
        *slot = Some(slot.unwrap_or(0) + v);
    }
}

/// Decoded columns the query needs, whatever their physical encoding.
struct Columns {
    subtypes: ArrayRef,
    dates: ArrayRef,
    codes: ArrayRef,
    totals: ArrayRef,
}

impl Columns {
    fn new(table: &RecordBatch) -> Result<Self> {
        Ok(Self {
            subtypes: utils::cast_column(table, SUBTYPE, &DataType::Utf8)?,
            dates: utils::cast_column(table, DATE, &DataType::Date32)?,
            codes: utils::cast_column(table, MUNICIPALITY, &DataType::Utf8)?,
            totals: utils::cast_column(table, TOTAL, &DataType::Int64)?,
        })
    }

    fn strings(arr: &ArrayRef) -> Result<&StringArray> {
        arr.as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| anyhow!("expected a Utf8 column, got {:?}", arr.data_type()))
    }

    fn dates(&self) -> Result<&Date32Array> {
        self.dates
            .as_any()
            .downcast_ref::<Date32Array>()
            .ok_or_else(|| anyhow!("expected a Date32 column, got {:?}", self.dates.data_type()))
    }

    fn totals(&self) -> Result<&Int64Array> {
        self.totals
            .as_any()
            .downcast_ref::<Int64Array>()
            .ok_or_else(|| anyhow!("expected an Int64 column, got {:?}", self.totals.data_type()))
    }
}

/// Filter by subtype (equality) and `fecha` in `[date_start, date_end]`, then
/// group-sum `total` by municipality. Null totals are skipped, so a
/// municipality whose matched months are all null reports `None`, not zero.
#[tracing::instrument(level = "debug", skip(table), fields(rows = table.num_rows()))]
pub fn run_query(table: &RecordBatch, query: &IncidenceQuery) -> Result<QueryResult> {
    if query.date_start > query.date_end {
        bail!(
            "date range is reversed: {} is after {}",
            query.date_start,
            query.date_end
        );
    }
    let start = days_since_epoch(query.date_start);
    let end = days_since_epoch(query.date_end);

    let cols = Columns::new(table)?;
    let subtypes = Columns::strings(&cols.subtypes)?;
    let codes = Columns::strings(&cols.codes)?;
    let dates = cols.dates()?;
    let totals = cols.totals()?;

    let mut groups: BTreeMap<&str, (Option<i64>, usize)> = BTreeMap::new();
    let mut grand_total = None;
    for row in 0..table.num_rows() {
        if subtypes.is_null(row) || dates.is_null(row) || codes.is_null(row) {
            continue;
        }
        if subtypes.value(row) != query.subtype {
            continue;
        }
        let day = dates.value(row);
        if day < start || day > end {
            continue;
        }
        let value = (!totals.is_null(row)).then(|| totals.value(row));
        let entry = groups.entry(codes.value(row)).or_insert((None, 0));
        add(&mut entry.0, value);
        entry.1 += 1;
        add(&mut grand_total, value);
    }
    debug!(municipalities = groups.len(), "query matched");

    let municipalities = groups
        .into_iter()
        .map(|(cve, (total, months))| MunicipalityTotal {
            cve_municipio: cve.to_string(),
            total,
            months,
        })
        .collect();

    Ok(QueryResult {
        query: query.clone(),
        municipalities,
        total: grand_total,
    })
}

/// Distinct subtypes in the table, sorted (dashboard dropdown options).
pub fn subtypes(table: &RecordBatch) -> Result<Vec<String>> {
    let arr = utils::cast_column(table, SUBTYPE, &DataType::Utf8)?;
    let arr = Columns::strings(&arr)?;
    let set: BTreeSet<&str> = arr.iter().flatten().collect();
    Ok(set.into_iter().map(str::to_string).collect())
}

/// Earliest and latest `fecha` (date picker bounds), or `None` for an empty table.
pub fn date_bounds(table: &RecordBatch) -> Result<Option<(NaiveDate, NaiveDate)>> {
    let arr = utils::cast_column(table, DATE, &DataType::Date32)?;
    let arr = arr
        .as_any()
        .downcast_ref::<Date32Array>()
        .ok_or_else(|| anyhow!("expected a Date32 column"))?;
    let (min, max) = match (
        arrow::compute::min(arr),
        arrow::compute::max(arr),
    ) {
        (Some(min), Some(max)) => (min, max),
        _ => return Ok(None),
    };
    let to_date = |d| from_days_since_epoch(d).ok_or_else(|| anyhow!("date out of range: {}", d));
    Ok(Some((to_date(min)?, to_date(max)?)))
}

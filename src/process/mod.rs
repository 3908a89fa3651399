// src/process/mod.rs
//! Raw SESNSP municipal file → long-form monthly incidence table.
//!
//! Each stage takes a whole `RecordBatch` and returns a new one:
//! load → normalize types → aggregate → pivot months → dates → pad keys
//! → categoricals → final column order.
use anyhow::Result;
use arrow::record_batch::RecordBatch;
use std::path::Path;
use tracing::info;

pub mod aggregate;
pub mod categorical;
pub mod columns;
pub mod convert;
pub mod dates;
pub mod load;
pub mod months;
pub mod names;
pub mod pad;
pub mod reshape;
pub mod utils;

pub use load::{Encoding, LoadOptions};
pub use months::{MonthTable, SPANISH_MONTHS};

pub const YEAR: &str = "ano";
pub const MONTH: &str = "mes";
pub const MONTH_NUM: &str = "mes_num";
pub const DATE: &str = "fecha";
pub const MUNICIPALITY: &str = "cve_municipio";
pub const SUBTYPE: &str = "subtipo_de_delito";
pub const TOTAL: &str = "total";

/// Width of a municipality key in the national geographic catalog (CVEGEO).
pub const KEY_WIDTH: usize = 5;

/// Output columns, in contract order.
pub const FINAL_COLUMNS: [&str; 7] = [YEAR, MONTH, MONTH_NUM, DATE, MUNICIPALITY, SUBTYPE, TOTAL];

/// Columns stored dictionary-encoded in the output.
pub const CATEGORICAL_COLUMNS: [&str; 5] = [SUBTYPE, MONTH_NUM, MONTH, YEAR, MUNICIPALITY];

/// Run every stage after loading on an already-parsed raw table.
#[tracing::instrument(level = "info", skip_all, fields(rows = raw.num_rows()))]
pub fn transform(raw: &RecordBatch, months: &MonthTable) -> Result<RecordBatch> {
    let typed = convert::normalize_types(raw, months)?;
    let wide = aggregate::aggregate_by_subtype(&typed, months)?;
    let long = reshape::pivot_months(&wide, months)?;
    let dated = dates::synthesize_dates(&long, months)?;
    let padded = pad::pad_municipality_codes(&dated, KEY_WIDTH)?;
    let encoded = categorical::encode_categoricals(&padded, &CATEGORICAL_COLUMNS)?;
    let out = columns::order_columns(&encoded)?;
    info!(
        keys = wide.num_rows(),
        rows = out.num_rows(),
        "built long-form table"
    );
    Ok(out)
}

/// Load `path` and run the full pipeline with the Spanish month table.
pub fn run_file<P: AsRef<Path>>(path: P, opts: &LoadOptions) -> Result<RecordBatch> {
    let raw = load::load_table(path, opts)?;
    transform(&raw, &SPANISH_MONTHS)
}

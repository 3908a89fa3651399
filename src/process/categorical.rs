use crate::process::utils;
use anyhow::{Context, Result};
use arrow::{
    compute::cast,
    datatypes::{DataType, Field},
    record_batch::RecordBatch,
};

/// Dictionary type used for a categorical column holding `values`.
pub fn dictionary_of(values: &DataType) -> DataType {
    DataType::Dictionary(Box::new(DataType::Int32), Box::new(values.clone()))
}

/// Categorical Optimizer: dictionary-encode each named column.
///
/// Only the physical layout changes; decoded values are identical, and
/// columns that are already dictionaries are left as they are.
#[tracing::instrument(level = "debug", skip(batch), fields(rows = batch.num_rows()))]
pub fn encode_categoricals(batch: &RecordBatch, columns: &[&str]) -> Result<RecordBatch> {
    let mut out = batch.clone();
    for name in columns {
        let schema = out.schema();
        let field = schema
            .field_with_name(name)
            .with_context(|| format!("missing expected column `{}`", name))?;
        if matches!(field.data_type(), DataType::Dictionary(_, _)) {
            continue;
        }

        let target = dictionary_of(field.data_type());
        let encoded = cast(utils::column(&out, name)?, &target)
            .with_context(|| format!("dictionary-encoding `{}`", name))?;
        let field = Field::new(*name, target, field.is_nullable());
        out = utils::with_column(&out, field, encoded)?;
    }
    Ok(out)
}

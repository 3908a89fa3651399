use anyhow::{anyhow, Context, Result};
use arrow::{
    array::{Array, ArrayRef},
    compute::cast,
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use std::sync::Arc;

/// Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Look up a column by name, failing with the column name if it is absent.
pub fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| anyhow!("missing expected column `{}`", name))
}

/// Look up a column and downcast it to its concrete array type.
pub fn typed_column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    let arr = column(batch, name)?;
    arr.as_any().downcast_ref::<T>().ok_or_else(|| {
        anyhow!(
            "column `{}` has type {:?}, expected {}",
            name,
            arr.data_type(),
            std::any::type_name::<T>()
        )
    })
}

/// Cast a column to `to`, decoding dictionaries on the way.
pub fn cast_column(batch: &RecordBatch, name: &str, to: &DataType) -> Result<ArrayRef> {
    let arr = column(batch, name)?;
    if arr.data_type() == to {
        return Ok(arr.clone());
    }
    cast(arr, to).with_context(|| format!("casting column `{}` to {:?}", name, to))
}

/// Replace the column named `field.name()` in place, or append it if absent.
pub fn with_column(batch: &RecordBatch, field: Field, array: ArrayRef) -> Result<RecordBatch> {
    let schema = batch.schema();
    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    let mut columns: Vec<ArrayRef> = batch.columns().to_vec();

    match schema.index_of(field.name()) {
        Ok(idx) => {
            fields[idx] = field;
            columns[idx] = array;
        }
        Err(_) => {
            fields.push(field);
            columns.push(array);
        }
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
        .context("rebuilding record batch")
}

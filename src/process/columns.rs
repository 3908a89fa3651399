use crate::process::FINAL_COLUMNS;
use anyhow::{Context, Result};
use arrow::record_batch::RecordBatch;

/// Column Orderer: project onto the output contract, in its order.
pub fn order_columns(batch: &RecordBatch) -> Result<RecordBatch> {
    let schema = batch.schema();
    let indices = FINAL_COLUMNS
        .iter()
        .map(|name| {
            schema
                .index_of(name)
                .with_context(|| format!("missing expected column `{}`", name))
        })
        .collect::<Result<Vec<usize>>>()?;
    batch.project(&indices).context("projecting final columns")
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Int32Array};
    use std::sync::Arc;

    fn batch_with(names: &[&str]) -> RecordBatch {
        RecordBatch::try_from_iter(
            names
                .iter()
                .map(|n| (*n, Arc::new(Int32Array::from(vec![1])) as ArrayRef)),
        )
        .unwrap()
    }

    #[test]
    fn reorders_and_drops_extras() -> Result<()> {
        let mut shuffled: Vec<&str> = FINAL_COLUMNS.iter().rev().copied().collect();
        shuffled.insert(2, "modalidad");
        let out = order_columns(&batch_with(&shuffled))?;
        let names: Vec<String> = out
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        assert_eq!(names, FINAL_COLUMNS);
        Ok(())
    }

    #[test]
    fn absent_column_is_fatal() {
        let err = order_columns(&batch_with(&FINAL_COLUMNS[..6])).unwrap_err();
        assert!(err.to_string().contains("`total`"));
    }
}

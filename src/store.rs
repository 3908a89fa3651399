// src/store.rs
//! Persistence of the long-form table as a single Parquet file.
use anyhow::{Context, Result};
use arrow::{compute::concat_batches, record_batch::RecordBatch};
use parquet::{
    arrow::{arrow_reader::ParquetRecordBatchReaderBuilder, ArrowWriter},
    basic::{BrotliLevel, Compression},
    file::properties::WriterProperties,
};
use std::{
    fs::{self, File},
    path::Path,
};
use tracing::{debug, info, warn};

fn writer_properties() -> Result<WriterProperties> {
    Ok(WriterProperties::builder()
        .set_compression(Compression::BROTLI(BrotliLevel::try_new(5)?))
        .set_dictionary_enabled(true)
        .build())
}

/// Write `batch` to `path`. The file is written under a temporary name and
/// renamed into place once closed, so readers never see a partial table.
#[tracing::instrument(level = "info", skip(batch, path), fields(path = %path.as_ref().display(), rows = batch.num_rows()))]
pub fn write_parquet<P: AsRef<Path>>(batch: &RecordBatch, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory {:?}", parent))?;
    }

    let temp_path = path.with_extension("parquet.tmp");
    let written = (|| -> Result<()> {
        let file = File::create(&temp_path)
            .with_context(|| format!("creating temporary file {:?}", temp_path))?;
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(writer_properties()?))
            .context("opening parquet writer")?;
        writer.write(batch).context("writing parquet rows")?;
        writer.close().context("closing parquet writer")?;
        fs::rename(&temp_path, path)
            .with_context(|| format!("renaming {:?} -> {:?}", temp_path, path))
    })();
    if let Err(e) = written {
        if temp_path.exists() {
            if let Err(rm) = fs::remove_file(&temp_path) {
                warn!(path = %temp_path.display(), error = %rm, "could not remove temporary file");
            }
        }
        return Err(e);
    }

    let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    info!(bytes = size, "wrote parquet table");
    Ok(())
}

/// Read a Parquet table back as one batch. The embedded Arrow schema is
/// honoured, so dictionary columns come back as dictionaries.
#[tracing::instrument(level = "debug", skip(path), fields(path = %path.as_ref().display()))]
pub fn read_parquet<P: AsRef<Path>>(path: P) -> Result<RecordBatch> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening table {:?}", path))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .with_context(|| format!("reading parquet metadata of {:?}", path))?;
    let schema = builder.schema().clone();
    let reader = builder.build().context("building parquet reader")?;

    let batches = reader
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("reading rows of {:?}", path))?;
    debug!(batches = batches.len(), "read parquet batches");
    concat_batches(&schema, &batches).context("concatenating parquet batches")
}

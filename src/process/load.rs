use anyhow::{anyhow, bail, Context, Result};
use arrow::{
    array::{ArrayRef, StringArray},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    fmt,
    fs::{self, File},
    io::Read,
    path::Path,
    str::FromStr,
    sync::Arc,
};
use tracing::{debug, info};
use zip::ZipArchive;

use crate::process::names::clean_names;

/// Text encoding the raw file is declared to be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Encoding {
    /// ISO-8859-1, what SESNSP publishes.
    #[default]
    #[serde(rename = "latin1", alias = "latin-1", alias = "iso-8859-1")]
    Latin1,
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,
}

impl Encoding {
    /// Decode the whole file. UTF-8 is strict: invalid bytes are an error, never replaced.
    pub fn decode(self, bytes: Vec<u8>) -> Result<String> {
        let text = match self {
            Encoding::Utf8 => String::from_utf8(bytes).map_err(|e| {
                anyhow!(
                    "input is not valid UTF-8 (first bad byte at offset {}); is it latin1?",
                    e.utf8_error().valid_up_to()
                )
            })?,
            // every byte is a valid Latin-1 code point
            Encoding::Latin1 => bytes.into_iter().map(char::from).collect(),
        };
        Ok(match text.strip_prefix('\u{feff}') {
            Some(rest) => rest.to_string(),
            None => text,
        })
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "latin1" | "latin-1" | "iso-8859-1" => Ok(Encoding::Latin1),
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            other => Err(format!("unsupported encoding `{}` (latin1 or utf-8)", other)),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Latin1 => write!(f, "latin1"),
            Encoding::Utf8 => write!(f, "utf-8"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub encoding: Encoding,
    pub delimiter: u8,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            encoding: Encoding::Latin1,
            delimiter: b',',
        }
    }
}

/// Read the raw bytes of the input. A `.zip` is opened and its first `.csv`
/// entry is returned; anything else is read as-is.
pub fn read_source(path: &Path) -> Result<Vec<u8>> {
    let is_zip = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("zip"))
        .unwrap_or(false);

    if !is_zip {
        return fs::read(path).with_context(|| format!("reading input file {:?}", path));
    }

    let file = File::open(path).with_context(|| format!("Failed to open ZIP file: {:?}", path))?;
    let mut archive =
        ZipArchive::new(file).with_context(|| format!("Failed to read ZIP archive: {:?}", path))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("Failed to access ZIP entry #{} in {:?}", i, path))?;
        let name = entry.name().to_string();
        if entry.is_file() && name.to_lowercase().ends_with(".csv") {
            debug!(entry = %name, "reading csv entry");
            let mut buf = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut buf)
                .with_context(|| format!("Failed to read {} into memory", name))?;
            return Ok(buf);
        }
    }
    bail!("no .csv entry found in {:?}", path)
}

/// Parse delimited text into a table of nullable Utf8 columns with cleaned
/// header names. Empty fields become nulls.
pub fn parse_delimited(text: &str, delimiter: u8) -> Result<RecordBatch> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let headers = clean_names(rdr.headers().context("reading header row")?.iter());
    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        bail!("input has no header row");
    }
    let mut seen = HashSet::new();
    for h in &headers {
        if h.is_empty() {
            bail!("input has a header that is empty after cleaning");
        }
        if !seen.insert(h.as_str()) {
            bail!("duplicate column `{}` after cleaning headers", h);
        }
    }

    let mut values: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for (idx, result) in rdr.records().enumerate() {
        // record 0 is the header, so data rows start at line 2
        let record = result.with_context(|| format!("CSV parse error at line {}", idx + 2))?;
        for (col, field) in values.iter_mut().zip(record.iter()) {
            let field = field.trim();
            col.push(if field.is_empty() {
                None
            } else {
                Some(field.to_string())
            });
        }
    }

    let fields: Vec<Field> = headers
        .iter()
        .map(|h| Field::new(h, DataType::Utf8, true))
        .collect();
    let columns: Vec<ArrayRef> = values
        .into_iter()
        .map(|v| Arc::new(StringArray::from(v)) as ArrayRef)
        .collect();

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
        .context("building raw record batch")
}

/// Loader stage: read, decode and parse the raw file.
#[tracing::instrument(level = "info", skip(path, opts), fields(path = %path.as_ref().display(), encoding = %opts.encoding))]
pub fn load_table<P: AsRef<Path>>(path: P, opts: &LoadOptions) -> Result<RecordBatch> {
    let path = path.as_ref();
    let bytes = read_source(path)?;
    let text = opts
        .encoding
        .decode(bytes)
        .with_context(|| format!("decoding {:?}", path))?;
    let batch = parse_delimited(&text, opts.delimiter)
        .with_context(|| format!("parsing {:?}", path))?;
    info!(
        rows = batch.num_rows(),
        columns = batch.num_columns(),
        "loaded raw table"
    );
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Array;
    use std::io::{Cursor, Write};
    use tempfile::{tempdir, NamedTempFile};
    use zip::write::FileOptions;
    use zip::CompressionMethod;

    const SAMPLE: &str = "Año,Cve. Municipio,Subtipo de delito,Enero\n2024,1001,Robo,3\n2024,1002,Robo,\n";

    fn strings(batch: &RecordBatch, name: &str) -> Vec<Option<String>> {
        let arr = batch
            .column_by_name(name)
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        (0..arr.len())
            .map(|i| (!arr.is_null(i)).then(|| arr.value(i).to_string()))
            .collect()
    }

    #[test]
    fn parses_and_cleans_headers() -> Result<()> {
        let batch = parse_delimited(SAMPLE, b',')?;
        let names: Vec<String> = batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        assert_eq!(names, vec!["ano", "cve_municipio", "subtipo_de_delito", "enero"]);
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(
            strings(&batch, "enero"),
            vec![Some("3".to_string()), None]
        );
        Ok(())
    }

    #[test]
    fn latin1_file_round_trips_accents() -> Result<()> {
        // "Año" and "Violación" encoded as ISO-8859-1
        let mut bytes = b"A\xf1o,cve_municipio,Subtipo de delito,Enero\n".to_vec();
        bytes.extend_from_slice(b"2024,5,Violaci\xf3n simple,1\n");
        let mut tmp = NamedTempFile::new()?;
        tmp.write_all(&bytes)?;

        let batch = load_table(tmp.path(), &LoadOptions::default())?;
        assert!(batch.column_by_name("ano").is_some());
        assert_eq!(
            strings(&batch, "subtipo_de_delito"),
            vec![Some("Violación simple".to_string())]
        );
        Ok(())
    }

    #[test]
    fn utf8_declared_but_latin1_bytes_is_fatal() -> Result<()> {
        let mut tmp = NamedTempFile::new()?;
        tmp.write_all(b"A\xf1o,enero\n2024,1\n")?;
        let opts = LoadOptions {
            encoding: Encoding::Utf8,
            ..LoadOptions::default()
        };
        let err = load_table(tmp.path(), &opts).unwrap_err();
        assert!(format!("{:#}", err).contains("not valid UTF-8"));
        Ok(())
    }

    #[test]
    fn missing_file_is_fatal() {
        let dir = tempdir().unwrap();
        let err = load_table(dir.path().join("nope.csv"), &LoadOptions::default()).unwrap_err();
        assert!(format!("{:#}", err).contains("nope.csv"));
    }

    #[test]
    fn ragged_rows_and_duplicate_headers_are_fatal() {
        assert!(parse_delimited("a,b\n1,2,3\n", b',').is_err());
        let err = parse_delimited("Año,ano\n1,2\n", b',').unwrap_err();
        assert!(err.to_string().contains("duplicate column `ano`"));
    }

    #[test]
    fn semicolon_delimiter() -> Result<()> {
        let batch = parse_delimited("ano;enero\n2024;7\n", b';')?;
        assert_eq!(strings(&batch, "enero"), vec![Some("7".to_string())]);
        Ok(())
    }

    #[test]
    fn reads_first_csv_inside_zip() -> Result<()> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
            let options: FileOptions<'_, ()> =
                FileOptions::default().compression_method(CompressionMethod::Stored);
            zip.start_file("LEEME.txt", options)?;
            zip.write_all(b"not data")?;
            zip.start_file("Municipal-Delitos.csv", options)?;
            zip.write_all(SAMPLE.as_bytes())?;
            zip.finish()?;
        }
        let dir = tempdir()?;
        let path = dir.path().join("snapshot.zip");
        std::fs::write(&path, &buf)?;

        let opts = LoadOptions {
            encoding: Encoding::Utf8,
            ..LoadOptions::default()
        };
        let batch = load_table(&path, &opts)?;
        assert_eq!(batch.num_rows(), 2);
        Ok(())
    }

    #[test]
    fn encoding_from_str() {
        assert_eq!("UTF-8".parse::<Encoding>(), Ok(Encoding::Utf8));
        assert_eq!("latin1".parse::<Encoding>(), Ok(Encoding::Latin1));
        assert!("cp1252".parse::<Encoding>().is_err());
    }
}

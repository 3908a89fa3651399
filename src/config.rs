use crate::process::{Encoding, LoadOptions};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Pipeline settings, read from a YAML file. Every field has a default, so
/// an empty file (or no file) is valid.
///
/// ```yaml
/// input: 01_datos/raw/Municipal-Delitos.csv
/// output: 01_datos/processed/Municipal-Delitos.parquet
/// encoding: latin1
/// delimiter: ","
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub encoding: Encoding,
    pub delimiter: char,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("01_datos/raw/Municipal-Delitos.csv"),
            output: PathBuf::from("01_datos/processed/Municipal-Delitos.parquet"),
            encoding: Encoding::Latin1,
            delimiter: ',',
        }
    }
}

impl PipelineConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        if s.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(s).context("parsing pipeline config")
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text =
            fs::read_to_string(path).with_context(|| format!("reading config {:?}", path))?;
        Self::from_yaml_str(&text).with_context(|| format!("{:?}", path))
    }

    pub fn load_options(&self) -> Result<LoadOptions> {
        if !self.delimiter.is_ascii() {
            bail!("delimiter {:?} must be a single ASCII character", self.delimiter);
        }
        Ok(LoadOptions {
            encoding: self.encoding,
            delimiter: self.delimiter as u8,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn empty_config_is_default() -> Result<()> {
        assert_eq!(PipelineConfig::from_yaml_str("")?, PipelineConfig::default());
        Ok(())
    }

    #[test]
    fn partial_config_keeps_defaults() -> Result<()> {
        let cfg = PipelineConfig::from_yaml_str("encoding: utf-8\ndelimiter: \";\"\n")?;
        assert_eq!(cfg.encoding, Encoding::Utf8);
        assert_eq!(cfg.delimiter, ';');
        assert_eq!(cfg.output, PipelineConfig::default().output);
        assert_eq!(cfg.load_options()?.delimiter, b';');
        Ok(())
    }

    #[test]
    fn unknown_fields_and_bad_encodings_are_rejected() {
        assert!(PipelineConfig::from_yaml_str("inptu: x.csv\n").is_err());
        assert!(PipelineConfig::from_yaml_str("encoding: cp1252\n").is_err());
    }

    #[test]
    fn non_ascii_delimiter_is_rejected() -> Result<()> {
        let cfg = PipelineConfig {
            delimiter: '¦',
            ..PipelineConfig::default()
        };
        assert!(cfg.load_options().is_err());
        Ok(())
    }

    #[test]
    fn load_from_file() -> Result<()> {
        let tmp = NamedTempFile::new()?;
        fs::write(tmp.path(), "input: raw/snapshot.zip\n")?;
        let cfg = PipelineConfig::load(tmp.path())?;
        assert_eq!(cfg.input, PathBuf::from("raw/snapshot.zip"));
        Ok(())
    }
}

// src/catalog/mod.rs
//! Municipal polygon catalog (INEGI marco geoestadístico, as GeoJSON) and
//! the left join of query totals onto it.
use crate::process::{KEY_WIDTH, MUNICIPALITY, TOTAL};
use crate::query::QueryResult;
use anyhow::{bail, Context, Result};
use geojson::{Feature, FeatureCollection, GeoJson, JsonValue};
use std::{collections::HashMap, fs, path::Path};
use tracing::{info, warn};

/// Property holding the 5-digit municipality key.
pub const CATALOG_KEY: &str = "CVEGEO";
/// Property holding the municipality name.
pub const CATALOG_NAME: &str = "NOMGEO";

/// Check a `CVEGEO` value: a string of exactly [`KEY_WIDTH`] ASCII digits.
pub fn validate_key(value: Option<&JsonValue>) -> Result<String> {
    let key = match value {
        Some(JsonValue::String(s)) => s,
        Some(other) => bail!("{} must be a string, got {}", CATALOG_KEY, other),
        None => bail!("feature has no {} property", CATALOG_KEY),
    };
    if key.len() != KEY_WIDTH || !key.bytes().all(|b| b.is_ascii_digit()) {
        bail!(
            "malformed {} `{}`: expected {} digits",
            CATALOG_KEY,
            key,
            KEY_WIDTH
        );
    }
    Ok(key.clone())
}

#[derive(Debug, Clone)]
pub struct Catalog {
    features: Vec<Feature>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// Index a feature collection by `CVEGEO`. Any malformed or repeated key
    /// rejects the whole catalog.
    pub fn from_features(collection: FeatureCollection) -> Result<Self> {
        let mut index = HashMap::with_capacity(collection.features.len());
        for (i, feature) in collection.features.iter().enumerate() {
            let key = validate_key(feature.property(CATALOG_KEY))
                .with_context(|| format!("catalog feature #{}", i))?;
            if index.insert(key.clone(), i).is_some() {
                bail!("duplicate {} `{}` in catalog", CATALOG_KEY, key);
            }
        }
        Ok(Self {
            features: collection.features,
            index,
        })
    }

    pub fn from_geojson_str(s: &str) -> Result<Self> {
        let collection: FeatureCollection = s.parse().context("parsing catalog GeoJSON")?;
        Self::from_features(collection)
    }

    #[tracing::instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text =
            fs::read_to_string(path).with_context(|| format!("reading catalog {:?}", path))?;
        let catalog = Self::from_geojson_str(&text).with_context(|| format!("{:?}", path))?;
        if catalog.is_empty() {
            bail!("catalog {:?} has no features", path);
        }
        info!(municipalities = catalog.len(), "loaded catalog");
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn contains(&self, cve: &str) -> bool {
        self.index.contains_key(cve)
    }

    /// Query municipalities that have no polygon in the catalog.
    pub fn unmatched<'a>(&self, result: &'a QueryResult) -> Vec<&'a str> {
        result
            .municipalities
            .iter()
            .map(|m| m.cve_municipio.as_str())
            .filter(|cve| !self.contains(cve))
            .collect()
    }

    /// Left join: every catalog feature with a geometry is kept, `CVEGEO` is
    /// renamed to `cve_municipio` and `total` is set from the query, `null`
    /// where the query has no data for that municipality. Other properties
    /// (`NOMGEO` for the tooltip) are carried over.
    pub fn join(&self, result: &QueryResult) -> FeatureCollection {
        let unmatched = self.unmatched(result);
        if !unmatched.is_empty() {
            warn!(
                count = unmatched.len(),
                first = unmatched[0],
                "query municipalities missing from catalog"
            );
        }

        let features = self
            .features
            .iter()
            .filter(|f| f.geometry.is_some())
            .map(|f| {
                let mut feature = f.clone();
                let key = feature
                    .properties
                    .as_mut()
                    .and_then(|p| p.remove(CATALOG_KEY))
                    .unwrap_or(JsonValue::Null);
                let total = key
                    .as_str()
                    .and_then(|cve| result.get(cve))
                    .and_then(|m| m.total);
                feature.set_property(MUNICIPALITY, key);
                feature.set_property(TOTAL, total);
                feature
            })
            .collect();

        FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }
}

pub fn write_geojson<P: AsRef<Path>>(path: P, collection: FeatureCollection) -> Result<()> {
    let path = path.as_ref();
    let out = GeoJson::from(collection);
    fs::write(path, out.to_string()).with_context(|| format!("writing {:?}", path))
}

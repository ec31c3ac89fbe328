//! Layered configuration (spec §6 "Config contract"): an ordered list of
//! maps, deserialized with `serde` the way the rest of this stack expects
//! config to arrive — as YAML or JSON, not a bespoke file format.

use dictsql_core::{Map, PatternField, Type};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PatternFieldConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: Type,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MapConfig {
    pub pattern: String,
    pub table: String,
    #[serde(default)]
    pub pattern_fields: Vec<PatternFieldConfig>,
    pub value_field: String,
    pub value_types: Vec<Type>,
    #[serde(default)]
    pub username_field: Option<String>,
    #[serde(default)]
    pub expire_field: Option<String>,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error(
        "map {pattern:?} declares {declared} pattern_fields but its pattern has {dollars} '$' markers"
    )]
    PatternFieldArityMismatch {
        pattern: String,
        declared: usize,
        dollars: usize,
    },
    #[error("map {pattern:?} has {value_field_count} value_field column(s) but {value_types_count} value_types")]
    ValueArityMismatch {
        pattern: String,
        value_field_count: usize,
        value_types_count: usize,
    },
}

impl MapConfig {
    fn into_map(self) -> Result<Map, ConfigError> {
        let dollars = self.pattern.matches('$').count();
        if dollars != self.pattern_fields.len() {
            return Err(ConfigError::PatternFieldArityMismatch {
                pattern: self.pattern,
                declared: self.pattern_fields.len(),
                dollars,
            });
        }
        let value_field_count = self.value_field.split(',').count();
        if value_field_count != self.value_types.len() {
            return Err(ConfigError::ValueArityMismatch {
                pattern: self.pattern,
                value_field_count,
                value_types_count: self.value_types.len(),
            });
        }

        Ok(Map {
            pattern: SmolStr::new(&self.pattern),
            table: SmolStr::new(&self.table),
            pattern_fields: self
                .pattern_fields
                .into_iter()
                .map(|f| PatternField::new(f.name, f.value_type))
                .collect(),
            value_field: SmolStr::new(&self.value_field),
            value_types: self.value_types,
            username_field: self.username_field.map(|s| SmolStr::new(&s)),
            expire_field: self.expire_field.map(|s| SmolStr::new(&s)),
        })
    }
}

/// The whole config document: a backend connect string plus an ordered map
/// list. The two stay decoupled, mirroring the original's separate
/// `connect` setting and map table (`sql_set.connect_string` vs. the
/// per-map `dict_sql_map` entries) — this crate never parses `connect`
/// itself, it only carries it through to whatever constructs the
/// `SqlDriver`. Map order is significant — `find_map` is first-fit.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct DictSqlConfig {
    #[serde(default)]
    pub connect: String,
    #[serde(default)]
    pub maps: Vec<MapConfig>,
}

impl DictSqlConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Validate and convert the configured maps into the in-memory list the
    /// compiler and engine expect. Order is preserved.
    pub fn build_maps(self) -> Result<Vec<Map>, ConfigError> {
        self.maps.into_iter().map(MapConfig::into_map).collect()
    }
}

use std::collections::BTreeMap;
use std::time::Duration;

use serde_derive::Deserialize;

use crate::extractor::ExtractionSchema;

/// Dotted JSON paths locating the three totals inside the API document,
/// e.g. `data.energy.solar`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct FieldPaths {
    pub solar_total_kwh: String,
    pub grid_import_kwh: String,
    pub grid_export_kwh: String,
}

/// Unit the `I` (export) field is reported in by the aggregate layout.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExportUnit {
    #[default]
    Wh,
    Kwh,
}

impl ExportUnit {
    pub fn to_kwh(self, value: f64) -> f64 {
        match self {
            ExportUnit::Wh => value / 1000.0,
            ExportUnit::Kwh => value,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub url: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub key: Option<String>,
    pub verify_ssl: bool,
    pub timeout_sec: u64,
    pub poll_interval_sec: u64,
    pub fields: Option<FieldPaths>,
    pub export_unit: ExportUnit,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            method: "GET".to_string(),
            headers: BTreeMap::new(),
            key: None,
            verify_ssl: true,
            timeout_sec: 10,
            poll_interval_sec: 900,
            fields: None,
            export_unit: ExportUnit::default(),
        }
    }
}

impl ApiConfig {
    pub fn is_valid(&self) -> bool {
        !self.url.trim().is_empty() && self.poll_interval_sec > 0
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_sec)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_sec)
    }

    /// Bearer token, if one is configured and not blank.
    pub fn bearer_token(&self) -> Option<&str> {
        self.key.as_deref().filter(|key| !key.trim().is_empty())
    }

    pub fn extraction_schema(&self) -> ExtractionSchema {
        ExtractionSchema {
            fields: self.fields.clone(),
            export_unit: self.export_unit,
        }
    }
}

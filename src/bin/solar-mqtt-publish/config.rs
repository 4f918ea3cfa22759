use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, fs};

use anyhow::{bail, Context};
use log::{debug, info, warn};
use serde_derive::Deserialize;
use serde_json::{Map, Value};
use solar2mqtt::api_config::{ApiConfig, FieldPaths};
use solar2mqtt::mqtt_config::MqttConfig;
use solar2mqtt::DeviceIdentity;

const CONFIG_FILE: &str = "config.toml";
const SUPERVISOR_OPTIONS: &str = "/data/options.json";

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mqtt: MqttConfig,
    pub device: DeviceIdentity,
    pub api: ApiConfig,
    pub log_level: Option<String>,
    pub value_eps: Option<f64>,
    pub api_fields: Vec<ApiField>,
    pub api_headers: Vec<ApiHeader>,
}

/// Array form of `api.fields`, as offered by the add-on options UI.
/// Entries the options UI left half filled are skipped, not rejected.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApiField {
    pub name: String,
    pub metric: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApiHeader {
    pub key: String,
    pub value: Option<String>,
}

impl Config {
    /// Layers `config.toml`, the supervisor options and the environment, in
    /// that order.
    pub fn load() -> anyhow::Result<Config> {
        let toml_contents = match config_toml_path() {
            Some(path) => {
                info!("loading configuration from {}", path.display());
                Some(fs::read_to_string(&path).with_context(|| format!("could not read {}", path.display()))?)
            }
            None => {
                warn!("{CONFIG_FILE} not found, relying on supervisor options and environment");
                None
            }
        };

        let supervisor_contents = if Path::new(SUPERVISOR_OPTIONS).exists() {
            info!("loading supervisor overrides from {SUPERVISOR_OPTIONS}");
            Some(fs::read_to_string(SUPERVISOR_OPTIONS).with_context(|| format!("could not read {SUPERVISOR_OPTIONS}"))?)
        } else {
            None
        };

        let mut config =
            Config::from_documents(toml_contents.as_deref(), supervisor_contents.as_deref())?;
        config.apply_env(|name| env::var(name).ok());
        config.apply_array_options();
        config.validate()?;
        Ok(config)
    }

    pub fn from_documents(toml_doc: Option<&str>, json_doc: Option<&str>) -> anyhow::Result<Config> {
        let mut merged = Value::Object(Map::new());
        if let Some(contents) = toml_doc {
            let doc: Value = toml::from_str(contents).context("toml config unparsable")?;
            merge(&mut merged, doc);
        }
        if let Some(contents) = json_doc {
            let doc: Value = serde_json::from_str(contents).context("supervisor options unparsable")?;
            merge(&mut merged, doc);
        }
        serde_json::from_value(merged).context("invalid configuration")
    }

    /// Overwrites settings from environment variables. Blank values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        // $MQTT_HOST, or $MQTT_BROKER_HOST
        if let Some(host) = var("MQTT_HOST").or_else(|| var("MQTT_BROKER_HOST")) {
            self.mqtt.host = host;
        }
        if let Some(port) = var("MQTT_PORT").and_then(|v| parse_var("MQTT_PORT", &v)) {
            self.mqtt.port = Some(port);
        }
        if let Some(username) = var("MQTT_USERNAME") {
            self.mqtt.username = Some(username);
        }
        if let Some(password) = var("MQTT_PASSWORD") {
            self.mqtt.password = Some(password);
        }
        if let Some(base_topic) = var("MQTT_BASE_TOPIC") {
            self.mqtt.base_topic = base_topic;
        }
        if let Some(url) = var("API_URL") {
            self.api.url = url;
        }
        if let Some(method) = var("API_METHOD") {
            self.api.method = method;
        }
        if let Some(timeout) = var("API_TIMEOUT_SEC").and_then(|v| parse_var("API_TIMEOUT_SEC", &v)) {
            self.api.timeout_sec = timeout;
        }
        if let Some(interval) =
            var("API_POLL_INTERVAL_SEC").and_then(|v| parse_var("API_POLL_INTERVAL_SEC", &v))
        {
            self.api.poll_interval_sec = interval;
        }
        if let Some(key) = var("API_KEY") {
            self.api.key = Some(key);
        }
        if let Some(verify) = var("API_VERIFY_SSL").and_then(|v| parse_var("API_VERIFY_SSL", &v)) {
            self.api.verify_ssl = verify;
        }
        if let Some(level) = var("LOG_LEVEL") {
            self.log_level = Some(level);
        }
        if let Some(eps) = var("VALUE_EPS").and_then(|v| parse_var("VALUE_EPS", &v)) {
            self.value_eps = Some(eps);
        }
    }

    /// Folds `api_fields` and `api_headers` into `api`.
    pub fn apply_array_options(&mut self) {
        if self.api.fields.is_none() && !self.api_fields.is_empty() {
            let metric = |name: &str| {
                self.api_fields
                    .iter()
                    .filter(|field| !field.metric.trim().is_empty())
                    .find(|field| field.name.trim().eq_ignore_ascii_case(name))
                    .map(|field| field.metric.clone())
            };
            match (
                metric("solar_total_kwh"),
                metric("grid_import_kwh"),
                metric("grid_export_kwh"),
            ) {
                (Some(solar_total_kwh), Some(grid_import_kwh), Some(grid_export_kwh)) => {
                    self.api.fields = Some(FieldPaths {
                        solar_total_kwh,
                        grid_import_kwh,
                        grid_export_kwh,
                    });
                }
                _ => warn!("api_fields does not name all three metrics, ignoring it"),
            }
        }

        for header in &self.api_headers {
            match &header.value {
                Some(value) if !header.key.trim().is_empty() && !value.is_empty() => {
                    self.api.headers.insert(header.key.clone(), value.clone());
                }
                _ => debug!("skipping incomplete api_headers entry '{}'", header.key),
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.mqtt.is_valid() {
            bail!("mqtt.host must not be empty");
        }
        if self.api.url.trim().is_empty() {
            bail!("api.url must not be empty");
        }
        if !self.api.is_valid() {
            bail!("api.poll_interval_sec must be greater than 0");
        }
        Ok(())
    }
}

/// `config.toml` in the working directory, or next to the executable.
fn config_toml_path() -> Option<PathBuf> {
    let mut candidates = Vec::new();
    if let Ok(dir) = env::current_dir() {
        candidates.push(dir.join(CONFIG_FILE));
    }
    if let Ok(mut exe) = env::current_exe() {
        exe.pop();
        candidates.push(exe.join(CONFIG_FILE));
    }
    candidates.into_iter().find(|path| path.exists())
}

fn parse_var<T>(name: &str, value: &str) -> Option<T>
where
    T: FromStr,
    T::Err: Display,
{
    match value.trim().to_ascii_lowercase().parse() {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!("ignoring ${name}={value}: {e}");
            None
        }
    }
}

/// Deep-merges `overlay` into `base`. Nulls in `overlay` keep the base value.
fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match value {
                    Value::Null => {}
                    Value::Object(_) => {
                        let entry = base
                            .entry(key)
                            .or_insert_with(|| Value::Object(Map::new()));
                        if !entry.is_object() {
                            *entry = Value::Object(Map::new());
                        }
                        merge(entry, value);
                    }
                    value => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

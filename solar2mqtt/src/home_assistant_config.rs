use serde::Serialize;
use serde_derive::Deserialize;

use crate::energy_totals::Metric;

/// Identity of the device the three sensors are grouped under.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DeviceIdentity {
    pub name: String,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub identifiers: String,
    pub unique_prefix: String,
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self {
            name: "Device".to_string(),
            manufacturer: None,
            model: None,
            identifiers: "device-1".to_string(),
            unique_prefix: "dev1_".to_string(),
        }
    }
}

impl DeviceIdentity {
    /// Object id of a metric, e.g. `dev1_solar_total`.
    pub fn object_id(&self, metric: Metric) -> String {
        format!("{}{}", self.unique_prefix, metric.slug())
    }
}

/// Device block embedded in every discovery payload; Home Assistant groups
/// the three sensors under it.
#[derive(Serialize, Clone)]
pub struct DeviceConfig {
    identifiers: Vec<String>,
    name: String,
    manufacturer: String,
    model: String,
    sw_version: String, // Software version of the application that supplies the discovered MQTT item.
}

impl DeviceConfig {
    pub fn new(identity: &DeviceIdentity) -> Self {
        Self {
            identifiers: vec![identity.identifiers.clone()],
            name: identity.name.clone(),
            manufacturer: identity.manufacturer.clone().unwrap_or_default(),
            model: identity.model.clone().unwrap_or_default(),
            sw_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Discovery payload of one energy sensor.
///
/// See https://www.home-assistant.io/integrations/sensor.mqtt/ for the fields.
#[derive(Serialize)]
pub struct SensorConfig {
    name: String,
    pub unique_id: String,
    state_topic: String,
    unit_of_measurement: &'static str,
    device_class: &'static str,
    state_class: &'static str,
    icon: &'static str,
    device: DeviceConfig,
}

impl SensorConfig {
    /// Energy sensor in kWh whose value only ever grows.
    pub fn energy_total(
        metric: Metric,
        unique_id: String,
        state_topic: String,
        device: &DeviceConfig,
    ) -> Self {
        Self {
            name: metric.display_name().to_string(),
            unique_id,
            state_topic,
            unit_of_measurement: "kWh",
            device_class: "energy",
            state_class: "total_increasing",
            icon: metric.icon(),
            device: device.clone(),
        }
    }
}

use log::{debug, info};

use crate::broker_session::{BrokerSession, STATUS_ONLINE};
use crate::energy_totals::Metric;
use crate::error::Result;
use crate::home_assistant_config::{DeviceConfig, DeviceIdentity, SensorConfig};
use crate::mqtt_wrapper::{MqttWrapper, QoS};

pub const DISCOVERY_PREFIX: &str = "homeassistant";

pub fn discovery_topic(object_id: &str) -> String {
    format!("{DISCOVERY_PREFIX}/sensor/{object_id}/config")
}

/// Announces the three energy sensors to Home Assistant, then marks the
/// status topic `online`. Called once per successful connection.
pub fn publish_discovery<MQTT: MqttWrapper>(
    session: &mut BrokerSession<MQTT>,
    device: &DeviceIdentity,
) -> Result<()> {
    let device_config = DeviceConfig::new(device);

    // configs let home assistant know what sensors are available and where to find them
    for metric in Metric::ALL {
        let object_id = device.object_id(metric);
        let sensor = SensorConfig::energy_total(
            metric,
            object_id.clone(),
            session.state_topic(&object_id),
            &device_config,
        );
        let payload = serde_json::to_string(&sensor)?;
        debug!("Discovery payload for {}: {payload}", sensor.unique_id);
        session.publish(&discovery_topic(&object_id), payload, true, QoS::AtLeastOnce)?;
    }

    session.publish_status(STATUS_ONLINE)?;
    info!("Home Assistant discovery messages published");
    Ok(())
}

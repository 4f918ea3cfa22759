use std::time::Duration;

use log::{debug, error, info, warn};

use crate::error::{flatten, Error, Result};
use crate::mqtt_config::MqttConfig;
use crate::mqtt_wrapper::{ConnectionParams, LastWill, MqttWrapper, QoS};

/// Broker host of the Home Assistant Mosquitto add-on, tried when the
/// configured host can't be reached.
pub const FALLBACK_HOST: &str = "core-mosquitto";

pub const STATUS_ONLINE: &str = "online";
pub const STATUS_OFFLINE: &str = "offline";

const KEEP_ALIVE: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Attempt {
    Primary,
    Fallback,
}

impl Attempt {
    pub fn host(self, config: &MqttConfig) -> &str {
        match self {
            Attempt::Primary => &config.host,
            Attempt::Fallback => FALLBACK_HOST,
        }
    }
}

pub fn status_topic(base_topic: &str) -> String {
    format!("{base_topic}/status")
}

/// Connection parameters for one attempt. Only the host differs between
/// the primary and the fallback attempt.
pub fn connection_params(config: &MqttConfig, attempt: Attempt) -> ConnectionParams {
    ConnectionParams {
        client_id: config.client_id().to_string(),
        host: attempt.host(config).to_string(),
        port: config.port(),
        credentials: config.credentials(),
        tls: config.use_tls(),
        keep_alive: KEEP_ALIVE,
        last_will: LastWill {
            topic: status_topic(config.base_topic()),
            payload: STATUS_OFFLINE.to_string(),
            qos: QoS::AtLeastOnce,
            retain: true,
        },
    }
}

/// A connected broker session together with the host actually in use.
pub struct BrokerSession<MQTT: MqttWrapper> {
    client: MQTT,
    host: String,
    base_topic: String,
}

impl<MQTT: MqttWrapper> BrokerSession<MQTT> {
    pub fn connect(config: &MqttConfig) -> Result<Self> {
        Self::connect_with(config, MQTT::connect)
    }

    /// Tries the configured host, then once more against [`FALLBACK_HOST`]
    /// unless that is the configured host already. When both fail the
    /// fallback's error is returned.
    pub fn connect_with<F>(config: &MqttConfig, mut connect: F) -> Result<Self>
    where
        F: FnMut(&ConnectionParams) -> anyhow::Result<MQTT>,
    {
        let params = connection_params(config, Attempt::Primary);
        info!(
            "Attempting MQTT connection host={} port={} user={}",
            params.host,
            params.port,
            config.username.as_deref().unwrap_or("<none>")
        );

        let params = match connect(&params) {
            Ok(client) => {
                info!("Connected on primary host {}", params.host);
                return Ok(Self::new(client, params.host, config));
            }
            Err(e) if config.host.eq_ignore_ascii_case(FALLBACK_HOST) => {
                error!("Connection to {} failed: {e:#}", params.host);
                return Err(connection_error(&params, e));
            }
            Err(e) => {
                warn!("Primary connection to {} failed ({e:#}) - trying fallback host {FALLBACK_HOST}", params.host);
                connection_params(config, Attempt::Fallback)
            }
        };

        match connect(&params) {
            Ok(client) => {
                info!("Connected using fallback host {}", params.host);
                Ok(Self::new(client, params.host, config))
            }
            Err(e) => {
                error!("Fallback connection failed: {e:#}");
                Err(connection_error(&params, e))
            }
        }
    }

    fn new(client: MQTT, host: String, config: &MqttConfig) -> Self {
        Self {
            client,
            host,
            base_topic: config.base_topic().to_string(),
        }
    }

    /// Host of the broker this session is connected to.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn base_topic(&self) -> &str {
        &self.base_topic
    }

    pub fn status_topic(&self) -> String {
        status_topic(&self.base_topic)
    }

    pub fn state_topic(&self, object_id: &str) -> String {
        format!("{}/state/{object_id}", self.base_topic)
    }

    pub fn client(&self) -> &MQTT {
        &self.client
    }

    pub fn publish<V>(&mut self, topic: &str, payload: V, retain: bool, qos: QoS) -> Result<()>
    where
        V: Clone + Into<Vec<u8>>,
    {
        debug!("Publishing to {topic}");
        self.client
            .publish(topic, qos, retain, payload)
            .map_err(|e| Error::Publish {
                topic: topic.to_string(),
                source: flatten(e),
            })
    }

    /// Publishes `status` retained on the status topic.
    pub fn publish_status(&mut self, status: &str) -> Result<()> {
        let topic = self.status_topic();
        self.publish(&topic, status, true, QoS::AtLeastOnce)
    }
}

fn connection_error(params: &ConnectionParams, e: anyhow::Error) -> Error {
    Error::Connection {
        host: params.host.clone(),
        port: params.port,
        source: flatten(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(host: &str) -> MqttConfig {
        MqttConfig {
            host: host.to_string(),
            username: Some("user".to_string()),
            password: Some("secret".to_string()),
            base_topic: "energy/".to_string(),
            ..MqttConfig::default()
        }
    }

    #[test]
    fn fallback_params_differ_only_in_host() {
        let config = config("broker.local");
        let primary = connection_params(&config, Attempt::Primary);
        let fallback = connection_params(&config, Attempt::Fallback);

        assert_eq!(primary.host, "broker.local");
        assert_eq!(fallback.host, FALLBACK_HOST);
        assert_eq!(
            ConnectionParams {
                host: primary.host.clone(),
                ..fallback
            },
            primary
        );
    }

    #[test]
    fn last_will_marks_status_offline() {
        let params = connection_params(&config("broker.local"), Attempt::Primary);

        assert_eq!(params.last_will.topic, "energy/status");
        assert_eq!(params.last_will.payload, "offline");
        assert_eq!(params.last_will.qos, QoS::AtLeastOnce);
        assert!(params.last_will.retain);
        assert_eq!(params.port, 1883);
        assert_eq!(
            params.credentials,
            Some(("user".to_string(), "secret".to_string()))
        );
    }
}

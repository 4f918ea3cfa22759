use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QoS {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

/// Message the broker publishes on our behalf when the session drops uncleanly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LastWill {
    pub topic: String,
    pub payload: String,
    pub qos: QoS,
    pub retain: bool,
}

/// Everything needed for a single connection attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionParams {
    pub client_id: String,
    pub host: String,
    pub port: u16,
    pub credentials: Option<(String, String)>,
    pub tls: bool,
    pub keep_alive: Duration,
    pub last_will: LastWill,
}

pub trait MqttWrapper: Sized {
    // Keeps the library independent of a concrete MQTT client. Callers wrap
    // their client in a new type implementing this trait, tests use an
    // in-memory recorder.

    /// Opens a session and returns once the broker acknowledged it.
    fn connect(params: &ConnectionParams) -> anyhow::Result<Self>;

    fn publish<S, V>(&mut self, topic: S, qos: QoS, retain: bool, payload: V) -> anyhow::Result<()>
    where
        S: Clone + Into<String>,
        V: Clone + Into<Vec<u8>>;
}

/// Source of the API document polled on every iteration.
///
/// This decouples the poll loop from the HTTP client in the same way
/// `MqttWrapper` decouples it from the MQTT client. Any failure, including
/// a non-2xx response, is returned as an error.
pub trait JsonSource {
    fn fetch(&mut self) -> anyhow::Result<serde_json::Value>;
}

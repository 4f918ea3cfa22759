use serde_derive::Deserialize;

pub const DEFAULT_CLIENT_ID: &str = "solar-mqtt-publisher";

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: Option<String>,
    pub tls: Option<bool>,
    pub base_topic: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: None,
            username: None,
            password: None,
            client_id: None,
            tls: None,
            base_topic: "solar".to_string(),
        }
    }
}

impl MqttConfig {
    pub fn is_valid(&self) -> bool {
        !self.host.trim().is_empty()
    }

    pub fn use_tls(&self) -> bool {
        self.tls.is_some_and(|tls| tls)
    }

    pub fn port(&self) -> u16 {
        self.port
            .unwrap_or_else(|| if self.use_tls() { 8883 } else { 1883 })
    }

    pub fn client_id(&self) -> &str {
        self.client_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .unwrap_or(DEFAULT_CLIENT_ID)
    }

    /// Base topic without trailing slashes.
    pub fn base_topic(&self) -> &str {
        self.base_topic.trim_end_matches('/')
    }

    /// Credentials to present to the broker. A username without password
    /// logs in with an empty password, a lone password is ignored.
    pub fn credentials(&self) -> Option<(String, String)> {
        match (&self.username, &self.password) {
            (None, None) => None,
            (None, Some(_)) => None,
            (Some(username), None) => Some((username.clone(), "".into())),
            (Some(username), Some(password)) => Some((username.clone(), password.clone())),
        }
    }
}

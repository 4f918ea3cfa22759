use anyhow::Context;
use reqwest::blocking::Client;
use reqwest::Method;
use serde_json::Value;
use solar2mqtt::api_config::ApiConfig;
use solar2mqtt::json_source::JsonSource;

/// Fetches the API document over HTTP(S) with the configured method,
/// headers and bearer token.
pub struct ReqwestSource {
    client: Client,
    method: Method,
    url: String,
    headers: Vec<(String, String)>,
    bearer_token: Option<String>,
}

impl ReqwestSource {
    pub fn new(config: &ApiConfig) -> anyhow::Result<Self> {
        let method = Method::from_bytes(config.method.trim().to_ascii_uppercase().as_bytes())
            .with_context(|| format!("invalid HTTP method '{}'", config.method))?;
        let client = Client::builder()
            .timeout(config.timeout())
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()?;

        Ok(Self {
            client,
            method,
            url: config.url.clone(),
            headers: config
                .headers
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
            bearer_token: config.bearer_token().map(str::to_string),
        })
    }
}

impl JsonSource for ReqwestSource {
    fn fetch(&mut self) -> anyhow::Result<Value> {
        let mut request = self.client.request(self.method.clone(), &self.url);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }

        let document = request
            .send()?
            .error_for_status()?
            .json::<Value>()
            .context("response is not valid JSON")?;
        Ok(document)
    }
}

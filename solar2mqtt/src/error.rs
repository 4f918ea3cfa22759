use thiserror::Error;

/// Boxed lower-level failure reported by a transport implementation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failures of the acquisition-and-publish pipeline.
///
/// Only `Connection` (and `Publish`/`Encode` while sending discovery) is meant
/// to end the process. Everything raised inside the poll loop is logged,
/// reported on the status topic and the loop carries on.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unable to connect to MQTT broker at {host}:{port}: {source}")]
    Connection {
        host: String,
        port: u16,
        #[source]
        source: BoxError,
    },

    #[error("fetching API data failed: {0}")]
    Fetch(#[source] BoxError),

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("publishing to '{topic}' failed: {source}")]
    Publish {
        topic: String,
        #[source]
        source: BoxError,
    },

    #[error("unable to encode discovery payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Flattens an `anyhow` chain into one boxed error so that its Display
/// carries every cause, e.g. `send failed: connection refused`.
pub(crate) fn flatten(e: anyhow::Error) -> BoxError {
    format!("{e:#}").into()
}

pub type Result<T> = std::result::Result<T, Error>;

// externally visible interfaces
pub mod api_config;
pub mod broker_session;
pub mod change_gate;
pub mod energy_totals;
pub mod error;
pub mod extractor;
pub mod home_assistant;
pub mod json_source;
pub mod mqtt_config;
pub mod mqtt_wrapper;
pub mod poll_loop;
pub mod shutdown;

// internal interfaces
mod home_assistant_config;

pub use home_assistant_config::DeviceIdentity;

mod config;
mod logging;
mod reqwest_source;
mod rumqttc_wrapper;
mod signals;

use std::thread;
use std::time::Duration;

use anyhow::Context;
use config::Config;
use log::{error, info, warn};
use reqwest_source::ReqwestSource;
use rumqttc_wrapper::RumqttcWrapper;
use solar2mqtt::broker_session::{BrokerSession, STATUS_OFFLINE};
use solar2mqtt::change_gate::ChangeGate;
use solar2mqtt::home_assistant;
use solar2mqtt::poll_loop::{PollLoop, PollSettings};
use solar2mqtt::shutdown;

fn main() -> anyhow::Result<()> {
    logging::init_logger();
    info!("Running revision: {}", env!("GIT_HASH"));
    if std::env::args().len() > 1 {
        error!("Arguments passed. Tool is configured by config.toml, supervisor options and environment");
    }

    let config = Config::load()?;
    logging::set_level(config.log_level.as_deref());
    info!(
        "Startup - MQTT broker={}:{}, base_topic={}, poll_interval={}s",
        config.mqtt.host,
        config.mqtt.port(),
        config.mqtt.base_topic(),
        config.api.poll_interval_sec
    );

    let source = ReqwestSource::new(&config.api).context("unable to set up HTTP client")?;

    info!("Connecting to MQTT broker...");
    let mut session = BrokerSession::<RumqttcWrapper>::connect(&config.mqtt)?;
    home_assistant::publish_discovery(&mut session, &config.device)
        .context("unable to publish Home Assistant discovery")?;

    let (trigger, shutdown) = shutdown::channel();
    signals::spawn_listener(trigger).context("unable to install signal handlers")?;

    let mut poll_loop = PollLoop::new(
        session,
        source,
        ChangeGate::new(config.value_eps),
        PollSettings {
            device: config.device.clone(),
            schema: config.api.extraction_schema(),
            interval: config.api.poll_interval(),
        },
    );
    poll_loop.run(&shutdown);

    if let Err(e) = poll_loop.session_mut().publish_status(STATUS_OFFLINE) {
        warn!("Unable to publish offline status: {e}");
    }
    // let the event loop flush the offline status
    thread::sleep(Duration::from_millis(500));
    info!("Shutting down.");
    Ok(())
}

use std::time::{Duration, Instant};

use log::{debug, error, info, trace, warn};

use crate::broker_session::BrokerSession;
use crate::change_gate::ChangeGate;
use crate::energy_totals::{EnergyTotals, Metric};
use crate::error::{flatten, Error, Result};
use crate::extractor::{self, ExtractionSchema};
use crate::home_assistant_config::DeviceIdentity;
use crate::json_source::JsonSource;
use crate::mqtt_wrapper::{MqttWrapper, QoS};
use crate::shutdown::Shutdown;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Fetching,
    Extracting,
    Publishing,
    Sleeping,
    Terminated,
}

pub struct PollSettings {
    pub device: DeviceIdentity,
    pub schema: ExtractionSchema,
    pub interval: Duration,
}

/// Drives fetch, extract, gate and publish on a fixed interval.
///
/// A failed iteration is logged and reported on the status topic; it never
/// ends the loop. Only a shutdown request observed while sleeping does.
pub struct PollLoop<MQTT: MqttWrapper, S: JsonSource> {
    session: BrokerSession<MQTT>,
    source: S,
    gate: ChangeGate,
    settings: PollSettings,
    state: PollState,
    iteration: u64,
}

impl<MQTT: MqttWrapper, S: JsonSource> PollLoop<MQTT, S> {
    pub fn new(
        session: BrokerSession<MQTT>,
        source: S,
        gate: ChangeGate,
        settings: PollSettings,
    ) -> Self {
        info!(
            "Value change detection enabled (epsilon={})",
            gate.epsilon()
        );
        Self {
            session,
            source,
            gate,
            settings,
            state: PollState::Idle,
            iteration: 0,
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn session(&self) -> &BrokerSession<MQTT> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut BrokerSession<MQTT> {
        &mut self.session
    }

    pub fn gate(&self) -> &ChangeGate {
        &self.gate
    }

    fn set_state(&mut self, new_state: PollState) {
        if self.state != new_state {
            trace!("Poll loop {:?} -> {new_state:?}", self.state);
            self.state = new_state;
        }
    }

    /// Polls until `shutdown` fires. Cancellation is only observed while
    /// sleeping, an iteration in flight always completes.
    pub fn run(&mut self, shutdown: &Shutdown) {
        loop {
            // failures are already logged and reported by run_iteration
            let _ = self.run_iteration();

            self.set_state(PollState::Sleeping);
            debug!(
                "Iteration {} - sleeping {}s",
                self.iteration,
                self.settings.interval.as_secs()
            );
            if shutdown.wait(self.settings.interval) {
                info!("Cancellation requested");
                break;
            }
        }
        self.set_state(PollState::Terminated);
        info!("Exited main loop after {} iterations", self.iteration);
    }

    /// Runs a single fetch/extract/publish pass and returns the number of
    /// metrics actually published.
    pub fn run_iteration(&mut self) -> Result<usize> {
        self.iteration += 1;
        let result = self.poll_once();
        if let Err(e) = &result {
            error!("Iteration {} - error during processing: {e}", self.iteration);
            if let Err(status_err) = self.session.publish_status(&format!("error: {e}")) {
                warn!("Unable to publish error status: {status_err}");
            }
        }
        result
    }

    fn poll_once(&mut self) -> Result<usize> {
        self.set_state(PollState::Fetching);
        debug!("Iteration {} - fetching API data...", self.iteration);
        let started = Instant::now();
        let document = self.source.fetch().map_err(|e| Error::Fetch(flatten(e)))?;
        debug!(
            "Iteration {} - fetch completed in {} ms",
            self.iteration,
            started.elapsed().as_millis()
        );

        self.set_state(PollState::Extracting);
        let extraction = extractor::extract(&document, &self.settings.schema)?;
        info!(
            "Iteration {} - {} totals {}",
            self.iteration, extraction.strategy, extraction.totals
        );

        self.set_state(PollState::Publishing);
        self.publish_totals(&extraction.totals)
    }

    /// Attempts every metric even if an earlier one failed; the first failure
    /// is returned.
    fn publish_totals(&mut self, totals: &EnergyTotals) -> Result<usize> {
        let mut published = 0;
        let mut first_error = None;

        for (metric, value) in totals.iter() {
            match self.publish_metric(metric, value) {
                Ok(true) => published += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!("Iteration {} - {e}", self.iteration);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(published),
        }
    }

    fn publish_metric(&mut self, metric: Metric, value: f64) -> Result<bool> {
        let slug = metric.slug();
        if self.gate.should_skip(slug, value) {
            return Ok(false);
        }

        let topic = self.session.state_topic(&self.settings.device.object_id(metric));
        // f64 Display is locale independent
        self.session
            .publish(&topic, value.to_string(), true, QoS::AtLeastOnce)?;
        self.gate.record(slug, value);
        debug!("Published '{slug}'={value:.6}");
        Ok(true)
    }
}

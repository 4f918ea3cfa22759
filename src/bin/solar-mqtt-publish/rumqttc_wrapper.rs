use std::{thread, time::Duration};

use anyhow::bail;
use log::{debug, warn};
use rumqttc::{
    tokio_rustls::rustls::{ClientConfig, RootCertStore},
    Client, ConnectionError, Event, LastWill, MqttOptions, Packet, Transport,
};
use solar2mqtt::mqtt_wrapper::{self, ConnectionParams};

const PUBLISH_ATTEMPTS: usize = 3;

pub struct RumqttcWrapper {
    client: Client,
}

fn match_qos(qos: mqtt_wrapper::QoS) -> rumqttc::QoS {
    match qos {
        mqtt_wrapper::QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
        mqtt_wrapper::QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
        mqtt_wrapper::QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
    }
}

fn tls_transport() -> Transport {
    // Use rustls-native-certs to load root certificates from the operating system.
    let native = rustls_native_certs::load_native_certs();
    for e in &native.errors {
        warn!("could not load platform certificate: {e}");
    }
    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(native.certs);
    debug!("loaded {added} platform certificates ({ignored} ignored)");

    let client_config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    Transport::tls_with_config(client_config.into())
}

fn expect_connack(
    first: Option<Result<Event, ConnectionError>>,
    host: &str,
) -> anyhow::Result<()> {
    match first {
        Some(Ok(Event::Incoming(Packet::ConnAck(ack)))) => {
            debug!("broker acknowledged: {ack:?}");
            Ok(())
        }
        Some(Ok(event)) => bail!("expected CONNACK from {host}, got {event:?}"),
        Some(Err(e)) => Err(e.into()),
        None => bail!("connection to {host} closed before it was acknowledged"),
    }
}

impl mqtt_wrapper::MqttWrapper for RumqttcWrapper {
    fn connect(params: &ConnectionParams) -> anyhow::Result<Self> {
        let mut mqttoptions = MqttOptions::new(&params.client_id, &params.host, params.port);
        mqttoptions.set_keep_alive(params.keep_alive);
        mqttoptions.set_last_will(LastWill::new(
            &params.last_will.topic,
            params.last_will.payload.clone(),
            match_qos(params.last_will.qos),
            params.last_will.retain,
        ));
        if params.tls {
            mqttoptions.set_transport(tls_transport());
        }
        if let Some((username, password)) = &params.credentials {
            mqttoptions.set_credentials(username, password);
        }

        let (client, mut connection) = Client::new(mqttoptions, 512);

        // the first notification tells whether the broker accepted the session
        expect_connack(connection.iter().next(), &params.host)?;

        thread::spawn(move || {
            // keep polling the event loop to make sure outgoing messages get sent
            // the loop terminates once the client is dropped
            for notification in connection.iter() {
                if let Err(e) = notification {
                    warn!("mqtt connection error: {e}");
                    thread::sleep(Duration::from_secs(1));
                }
            }
        });

        Ok(Self { client })
    }

    fn publish<S, V>(
        &mut self,
        topic: S,
        qos: mqtt_wrapper::QoS,
        retain: bool,
        payload: V,
    ) -> anyhow::Result<()>
    where
        S: Clone + Into<String>,
        V: Clone + Into<Vec<u8>>,
    {
        // try publishing up to three times
        for _ in 1..PUBLISH_ATTEMPTS {
            if self
                .client
                .try_publish(topic.clone(), match_qos(qos), retain, payload.clone())
                .is_ok()
            {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(100));
        }
        Ok(self
            .client
            .try_publish(topic, match_qos(qos), retain, payload)?)
    }
}

#[cfg(test)]
mod tests {
    use rumqttc::{ConnAck, ConnectReturnCode, Outgoing};

    use super::*;

    #[test]
    fn connack_accepts_the_session() {
        let ack = ConnAck {
            session_present: false,
            code: ConnectReturnCode::Success,
        };
        let first = Some(Ok(Event::Incoming(Packet::ConnAck(ack))));

        assert!(expect_connack(first, "broker.local").is_ok());
    }

    #[test]
    fn other_first_event_fails_the_attempt() {
        let first = Some(Ok(Event::Outgoing(Outgoing::PingReq)));

        let err = expect_connack(first, "broker.local").unwrap_err();
        assert!(err.to_string().starts_with("expected CONNACK from broker.local"));
    }

    #[test]
    fn closed_connection_fails_the_attempt() {
        let err = expect_connack(None, "broker.local").unwrap_err();
        assert_eq!(
            err.to_string(),
            "connection to broker.local closed before it was acknowledged"
        );
    }
}

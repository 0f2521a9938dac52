//! MQTT transport.
//!
//! Messages are queued on the rumqttc client with `try_publish`, which never
//! waits: if the request channel is full or the connection is gone the
//! message is refused. A background task drives the connection and
//! reconnects after errors until [`MqttTransport::disconnect`] is called.

use super::{Transport, TransportError};
use rumqttc::{AsyncClient, Event, MqttOptions, Outgoing, QoS};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Capacity of the client request channel.
const REQUEST_CHANNEL_CAPACITY: usize = 10;

const KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Pause between reconnect attempts.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Upper bound on waiting for DISCONNECT to reach the broker.
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Broker login. The password may be empty.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

fn mqtt_options(
    host: &str,
    port: u16,
    client_id: &str,
    credentials: Option<&Credentials>,
) -> Result<MqttOptions, TransportError> {
    if client_id.is_empty() || client_id.starts_with(' ') {
        return Err(TransportError::InvalidClientId(client_id.to_string()));
    }

    let mut options = MqttOptions::new(client_id, host, port);
    options.set_keep_alive(KEEP_ALIVE);
    if let Some(credentials) = credentials {
        options.set_credentials(credentials.username.as_str(), credentials.password.as_str());
    }
    Ok(options)
}

/// Publishes payloads to a single MQTT topic with QoS 0.
pub struct MqttTransport {
    client: AsyncClient,
    topic: String,
    broker: String,
    closing: Arc<AtomicBool>,
    event_loop: JoinHandle<()>,
}

impl MqttTransport {
    /// Create a client for `host:port` and spawn its event loop.
    ///
    /// Must be called from within a tokio runtime. The connection is made in
    /// the background; payloads handed over before it is up wait in the
    /// request channel.
    ///
    /// # Errors
    /// Returns [`TransportError::InvalidClientId`] for an empty client id or
    /// one starting with a space, which the broker would reject.
    pub fn connect(
        host: &str,
        port: u16,
        client_id: &str,
        topic: &str,
        credentials: Option<&Credentials>,
    ) -> Result<Self, TransportError> {
        let options = mqtt_options(host, port, client_id, credentials)?;

        let broker = format!("mqtt://{host}:{port}");
        info!(
            broker = %broker,
            client_id,
            topic,
            authenticated = credentials.is_some(),
            "Connecting to MQTT broker"
        );

        let (client, mut event_loop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);
        let closing = Arc::new(AtomicBool::new(false));
        let stop = closing.clone();

        let event_loop = tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                        debug!("MQTT disconnect sent");
                        break;
                    }
                    Ok(notification) => debug!(?notification, "MQTT notification"),
                    Err(e) if stop.load(Ordering::Acquire) => {
                        debug!(error = %e, "MQTT connection closed");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "MQTT connection error");
                        tokio::time::sleep(RECONNECT_DELAY).await;
                    }
                }
            }
        });

        Ok(Self {
            client,
            topic: topic.to_string(),
            broker,
            closing,
            event_loop,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Send DISCONNECT and wait a bounded time for the event loop to write it.
    ///
    /// Payloads queued before the call are flushed ahead of it. Sends made
    /// afterwards are refused.
    pub async fn disconnect(&mut self) {
        self.closing.store(true, Ordering::Release);

        let client = &self.client;
        let event_loop = &mut self.event_loop;
        let flush = async move {
            if let Err(e) = client.disconnect().await {
                debug!(error = %e, "MQTT disconnect not queued");
                return;
            }
            let _ = event_loop.await;
        };

        if tokio::time::timeout(DISCONNECT_TIMEOUT, flush).await.is_err() {
            warn!(broker = %self.broker, "MQTT disconnect timed out");
        }
    }
}

impl Transport for MqttTransport {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if self.closing.load(Ordering::Acquire) || self.event_loop.is_finished() {
            return Err(TransportError::Closed);
        }

        self.client
            .try_publish(self.topic.as_str(), QoS::AtMostOnce, false, payload.to_vec())?;
        Ok(())
    }

    fn endpoint(&self) -> String {
        format!("{} (topic '{}')", self.broker, self.topic)
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        self.event_loop.abort();
    }
}

//! Ingest loop: poll the radio, decode, log, publish.
//!
//! The loop is generic over the radio and the transport so it can be run
//! against fakes in tests; [`run`] wires up the real hardware and bus.

use crate::duration::parse_interval;
use crate::message::RadioMessage;
use crate::pipe_address::PipeAddress;
use crate::radio::nrf24::DEFAULT_CHANNEL;
use crate::radio::{Radio, RadioError};
use crate::receiver::{Receiver, ReceiverError, check_addresses};
use crate::transport::{
    Credentials, Endpoint, MqttTransport, Publisher, Transport, TransportError, WriterTransport,
};
use clap::Parser;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Command-line configuration.
#[derive(Parser, Debug, Clone)]
#[command(author, about, version)]
pub struct Options {
    /// Radio listen address, up to 5 bytes. Repeat for up to 5 addresses.
    #[arg(
        short = 'l',
        long = "listen",
        value_name = "ADDR",
        default_value = "0Node",
        env = "RADIO_LISTEN",
        value_delimiter = ','
    )]
    pub addresses: Vec<PipeAddress>,

    /// GPIO pin connected to the radio CE pin
    #[arg(short = 'e', long = "cepin", default_value_t = 22, env = "RADIO_CE_PIN")]
    pub ce_pin: u32,

    /// SPI chip select (0, 1, ...) on SPI bus 0
    #[arg(short = 's', long = "cspin", default_value_t = 0, env = "RADIO_CS_PIN")]
    pub cs_pin: u8,

    /// RF channel (0-125), must match the sensor nodes
    #[arg(long, default_value_t = DEFAULT_CHANNEL, value_parser = clap::value_parser!(u8).range(0..=125))]
    pub channel: u8,

    /// Where to publish: mqtt://HOST[:PORT], or - for JSON lines on stdout
    #[arg(
        short = 'p',
        long = "publish",
        value_name = "ENDPOINT",
        default_value = "mqtt://127.0.0.1:1883",
        env = "RADIO_PUBLISH",
        value_parser = parse_endpoint
    )]
    pub endpoint: Endpoint,

    /// MQTT topic messages are published to
    #[arg(long, default_value = "home_sensors/measurements", env = "RADIO_MQTT_TOPIC")]
    pub topic: String,

    /// MQTT client identifier
    #[arg(long, default_value = "radio-bridge", env = "RADIO_MQTT_CLIENT_ID")]
    pub client_id: String,

    /// MQTT broker username. Without it the client connects anonymously.
    #[arg(long, env = "RADIO_MQTT_USER")]
    pub mqtt_user: Option<String>,

    /// MQTT broker password, used together with --mqtt-user
    #[arg(long, env = "RADIO_MQTT_PASSWORD", hide_env_values = true)]
    pub mqtt_password: Option<String>,

    /// How long to sleep when no packet is waiting.
    /// Accepts duration with suffix: 1s, 500ms, 1m.
    #[arg(long, default_value = "1s", value_parser = parse_interval)]
    pub poll_interval: Duration,

    /// Log every received message
    #[arg(short = 'd', long = "debug")]
    pub debug: bool,
}

impl Options {
    /// Broker login, if a username was given. A missing password is empty.
    pub fn credentials(&self) -> Option<Credentials> {
        self.mqtt_user.as_ref().map(|username| Credentials {
            username: username.clone(),
            password: self.mqtt_password.clone().unwrap_or_default(),
        })
    }
}

fn parse_endpoint(src: &str) -> Result<Endpoint, String> {
    src.parse().map_err(|e: TransportError| e.to_string())
}

/// Errors returned by the ingest loop.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Receiver(#[from] ReceiverError),
    #[error(transparent)]
    Radio(#[from] RadioError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Counters reported when the loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub received: u64,
    pub published: u64,
    pub dropped: u64,
}

/// Log and publish one decoded message. Returns whether the transport took it.
fn handle_message<T: Transport>(publisher: &mut Publisher<T>, message: &RadioMessage) -> bool {
    debug!("Received message: {message}");

    if let Some(cause) = message.error() {
        warn!(
            device_id = message.device_id,
            "Device with id {} reported error: {cause}", message.device_id
        );
    }

    let published = publisher.publish(message);
    if !published {
        error!("Unable to publish message: {message}");
    }
    published
}

/// Run the ingest loop until `shutdown` completes.
///
/// `shutdown` is polled before every packet, so it is noticed even while
/// packets keep arriving. A packet that was read is always published before
/// the loop stops.
///
/// # Errors
/// Returns an error if the radio fails. Publish failures are logged and the
/// message is dropped.
pub async fn run_until<R, T, F>(
    receiver: &mut Receiver<R>,
    publisher: &mut Publisher<T>,
    poll_interval: Duration,
    shutdown: F,
) -> Result<RunStats, RunError>
where
    R: Radio,
    T: Transport,
    F: Future<Output = ()>,
{
    let mut stats = RunStats::default();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            _ = std::future::ready(()) => {}
        }

        if !receiver.message_available()? {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(poll_interval) => continue,
            }
        }

        let message = receiver.receive_message()?;
        stats.received += 1;

        if handle_message(publisher, &message) {
            stats.published += 1;
        } else {
            stats.dropped += 1;
        }

        // Let the transport's background task flush.
        tokio::task::yield_now().await;
    }

    Ok(stats)
}

/// Open the radio selected at build time.
#[cfg(feature = "spidev")]
fn open_radio(options: &Options) -> Result<Box<dyn Radio>, RadioError> {
    let radio = crate::radio::spidev::open(options.cs_pin, options.ce_pin)?;
    Ok(Box::new(radio.with_channel(options.channel)))
}

#[cfg(not(feature = "spidev"))]
fn open_radio(_options: &Options) -> Result<Box<dyn Radio>, RadioError> {
    Err(RadioError::BackendNotAvailable("spidev".to_string()))
}

/// Resolve on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "Unable to listen for SIGTERM");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Log where messages go, then run the ingest loop until `shutdown`.
async fn serve<R, T, F>(
    receiver: &mut Receiver<R>,
    mut publisher: Publisher<T>,
    poll_interval: Duration,
    shutdown: F,
) -> (Publisher<T>, Result<RunStats, RunError>)
where
    R: Radio,
    T: Transport,
    F: Future<Output = ()>,
{
    info!("Publishing JSON messages to: {}", publisher.endpoint());
    let result = run_until(receiver, &mut publisher, poll_interval, shutdown).await;
    (publisher, result)
}

/// Bring up the radio and transport, then run until interrupted.
///
/// # Errors
/// Returns an error for an invalid address list, if the radio cannot be
/// brought up, if the endpoint cannot be used, or if the radio fails while
/// running.
pub async fn run(options: Options) -> Result<(), RunError> {
    info!(
        "Debugging: {}",
        if options.debug { "enabled" } else { "disabled" }
    );

    check_addresses(&options.addresses)?;

    let radio = open_radio(&options)?;
    let mut receiver = Receiver::new(options.addresses.clone(), radio)?;
    receiver.init()?;

    info!(
        "Radio chip: Chip Enable pin = {}, Chip Select SPI pin = {}, channel = {}",
        options.ce_pin, options.cs_pin, options.channel
    );
    let addresses: Vec<String> = receiver.addresses().iter().map(|a| a.to_string()).collect();
    info!(
        "Receiving radio messages for addresses: {}",
        addresses.join(", ")
    );

    let stats = match &options.endpoint {
        Endpoint::Mqtt { host, port } => {
            let transport = MqttTransport::connect(
                host,
                *port,
                &options.client_id,
                &options.topic,
                options.credentials().as_ref(),
            )?;
            let (publisher, result) = serve(
                &mut receiver,
                Publisher::new(transport),
                options.poll_interval,
                shutdown_signal(),
            )
            .await;
            publisher.into_transport().disconnect().await;
            result?
        }
        Endpoint::Stdout => {
            let (_, result) = serve(
                &mut receiver,
                Publisher::new(WriterTransport::stdout()),
                options.poll_interval,
                shutdown_signal(),
            )
            .await;
            result?
        }
    };

    info!(
        received = stats.received,
        published = stats.published,
        dropped = stats.dropped,
        "Shutting down"
    );
    Ok(())
}

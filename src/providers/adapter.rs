use super::channel::{Connector, VendorFrame, VendorLink, VendorRequest, VendorSink, VendorSource};
use crate::error::{AdapterError, Result};
use crate::events::{EventSink, ProviderEvent};
use bytes::Bytes;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// How long a disconnect waits for the vendor close handshake
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Provider sub-configuration with the shared audio settings merged in
pub type ProviderConfig = Map<String, Value>;

/// Connection state of one adapter instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
    Closed,
}

/// Interface every STT provider adapter implements
#[async_trait::async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider name used for event attribution
    fn provider(&self) -> &'static str;

    fn state(&self) -> AdapterState;

    /// Validate the configuration and start connecting in the background.
    ///
    /// Only invalid settings are returned as an error. The connect attempt
    /// itself moves the adapter to `Connected` or reports
    /// `Connection failed: ...` through the event sink and moves it to `Closed`.
    async fn connect(&mut self, config: ProviderConfig) -> Result<()>;

    /// Close the vendor channel. Safe to call in any state, any number of times.
    async fn disconnect(&mut self);

    /// Queue one audio frame for the vendor. Only valid while connected.
    async fn send_audio(&self, frame: Bytes) -> Result<()>;
}

/// Outcome of inspecting a message received during the vendor handshake
#[derive(Debug, Clone, PartialEq)]
pub enum Handshake {
    Ready,
    Pending,
    Rejected(String),
}

/// A vendor's wire protocol.
///
/// `Message` is a tagged enum over every message kind the vendor sends, so
/// the dispatch table is fixed before the channel is opened.
pub trait VendorProtocol: Send + Sync + 'static {
    /// Vendor options, deserialized from the resolved provider config
    type Settings: DeserializeOwned + Send + Sync;

    type Message: DeserializeOwned + Send;

    const NAME: &'static str;

    fn open_request(&self, settings: &Self::Settings) -> Result<VendorRequest>;

    /// Text frames sent right after the channel opens
    fn start_messages(&self, _settings: &Self::Settings) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn requires_handshake(&self) -> bool {
        false
    }

    fn handshake(&self, _message: &Self::Message) -> Handshake {
        Handshake::Ready
    }

    /// Text frames sent before the channel is closed
    fn close_messages(&self, frames_sent: u64) -> Vec<String>;

    fn translate(&self, message: Self::Message) -> Vec<ProviderEvent>;
}

enum Outbound {
    Audio(Bytes),
    Close,
}

struct ActiveLink {
    outbound: mpsc::UnboundedSender<Outbound>,
    task: JoinHandle<()>,
}

/// Request and start frames, resolved from the settings before any I/O
struct Prepared {
    request: VendorRequest,
    start_messages: Vec<String>,
}

/// Adapter driving any [`VendorProtocol`] over a [`Connector`].
///
/// `connect` only validates the settings and spawns the link task. That task
/// opens the channel, completes the handshake, then runs the writer (queued
/// audio, in order) alongside the receive loop. The outcome of the connect
/// attempt is reported through the state and the event sink.
pub struct StreamingAdapter<P: VendorProtocol> {
    protocol: Arc<P>,
    connector: Arc<dyn Connector>,
    events: EventSink,
    state: Arc<watch::Sender<AdapterState>>,
    link: Option<ActiveLink>,
}

impl<P: VendorProtocol> StreamingAdapter<P> {
    pub fn new(protocol: P, connector: Arc<dyn Connector>, events: EventSink) -> Self {
        let (state, _) = watch::channel(AdapterState::Disconnected);
        Self {
            protocol: Arc::new(protocol),
            connector,
            events,
            state: Arc::new(state),
            link: None,
        }
    }

    fn set_state(&self, state: AdapterState) {
        self.state.send_replace(state);
    }

    fn prepare(&self, config: ProviderConfig) -> Result<Prepared> {
        let settings: P::Settings = serde_json::from_value(Value::Object(config))?;
        Ok(Prepared {
            request: self.protocol.open_request(&settings)?,
            start_messages: self.protocol.start_messages(&settings)?,
        })
    }
}

#[async_trait::async_trait]
impl<P: VendorProtocol> ProviderAdapter for StreamingAdapter<P> {
    fn provider(&self) -> &'static str {
        P::NAME
    }

    fn state(&self) -> AdapterState {
        *self.state.borrow()
    }

    async fn connect(&mut self, config: ProviderConfig) -> Result<()> {
        if self.link.is_some() {
            self.disconnect().await;
        }

        let prepared = match self.prepare(config) {
            Ok(prepared) => prepared,
            Err(e) => {
                self.set_state(AdapterState::Closed);
                error!("Invalid {} configuration: {}", P::NAME, e);
                return Err(e);
            }
        };

        self.set_state(AdapterState::Connecting);
        info!("Connecting to {}", P::NAME);

        let (outbound, queue) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_link(
            Arc::clone(&self.protocol),
            Arc::clone(&self.connector),
            prepared,
            queue,
            self.events.clone(),
            Arc::clone(&self.state),
        ));

        self.link = Some(ActiveLink { outbound, task });
        Ok(())
    }

    async fn disconnect(&mut self) {
        let Some(link) = self.link.take() else {
            self.set_state(AdapterState::Closed);
            return;
        };

        self.set_state(AdapterState::Closing);
        self.events.close();

        // Cancels a pending connect, or lets the writer close the channel.
        // The task may already have stopped after a failure.
        let _ = link.outbound.send(Outbound::Close);

        let mut task = link.task;
        match tokio::time::timeout(CLOSE_GRACE, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("[{}] link task failed: {}", P::NAME, e),
            Err(_) => {
                warn!("[{}] close handshake timed out, aborting link", P::NAME);
                task.abort();
            }
        }

        self.set_state(AdapterState::Closed);
        info!("Disconnected from {}", P::NAME);
    }

    async fn send_audio(&self, frame: Bytes) -> Result<()> {
        let not_connected = || AdapterError::NotConnected {
            provider: P::NAME.to_string(),
        };

        if self.state() != AdapterState::Connected {
            return Err(not_connected());
        }

        let link = self.link.as_ref().ok_or_else(not_connected)?;
        link.outbound
            .send(Outbound::Audio(frame))
            .map_err(|_| AdapterError::Closed)
    }
}

impl<P: VendorProtocol> Drop for StreamingAdapter<P> {
    fn drop(&mut self) {
        // Dropping the queue sender cancels a pending connect or lets the
        // writer close the channel
        if self.link.take().is_some() {
            self.events.close();
        }
    }
}

/// Move `from` to `to`; false if the state had already moved on
fn transition(state: &watch::Sender<AdapterState>, from: AdapterState, to: AdapterState) -> bool {
    state.send_if_modified(|current| {
        if *current == from {
            *current = to;
            true
        } else {
            false
        }
    })
}

fn close_if_connected(state: &watch::Sender<AdapterState>) {
    transition(state, AdapterState::Connected, AdapterState::Closed);
}

async fn run_link<P: VendorProtocol>(
    protocol: Arc<P>,
    connector: Arc<dyn Connector>,
    prepared: Prepared,
    mut queue: mpsc::UnboundedReceiver<Outbound>,
    events: EventSink,
    state: Arc<watch::Sender<AdapterState>>,
) {
    let opening = AssertUnwindSafe(open_link(&*protocol, &*connector, prepared, &events));

    // Audio is refused until connected, so the queue can only carry a close
    let opened = tokio::select! {
        opened = opening.catch_unwind() => opened,
        _ = queue.recv() => {
            debug!("[{}] connect cancelled", P::NAME);
            return;
        }
    };

    let (sink, source) = match opened {
        Ok(Ok(link)) => link,
        Ok(Err(e)) => {
            error!("Failed to connect to {}: {}", P::NAME, e);
            events.error(format!("Connection failed: {}", e)).await;
            transition(&state, AdapterState::Connecting, AdapterState::Closed);
            return;
        }
        Err(_) => {
            error!("{} adapter panicked while connecting", P::NAME);
            events.error("Connection failed: adapter panicked").await;
            transition(&state, AdapterState::Connecting, AdapterState::Closed);
            return;
        }
    };

    if transition(&state, AdapterState::Connecting, AdapterState::Connected) {
        info!("Connected to {}", P::NAME);
    }

    let writer = write_loop(
        Arc::clone(&protocol),
        sink,
        queue,
        events.clone(),
        Arc::clone(&state),
    );
    let reader = read_loop(protocol, source, events, state);
    tokio::pin!(writer);
    tokio::pin!(reader);

    // The link lives until the writer stops; a finished receive loop
    // leaves the writer waiting for the disconnect
    let mut receiving = true;
    loop {
        tokio::select! {
            _ = &mut writer => break,
            _ = &mut reader, if receiving => receiving = false,
        }
    }
}

async fn open_link<P: VendorProtocol>(
    protocol: &P,
    connector: &dyn Connector,
    prepared: Prepared,
    events: &EventSink,
) -> Result<(Box<dyn VendorSink>, Box<dyn VendorSource>)> {
    debug!("[{}] opening {}", P::NAME, prepared.request.url);
    let VendorLink {
        mut sink,
        mut source,
    } = connector.open(prepared.request).await?;

    let started = start(
        protocol,
        &mut *sink,
        &mut *source,
        prepared.start_messages,
        events,
    )
    .await;

    if let Err(e) = started {
        if let Err(close_err) = sink.close().await {
            debug!("[{}] close after failed start: {}", P::NAME, close_err);
        }
        return Err(e);
    }

    Ok((sink, source))
}

async fn start<P: VendorProtocol>(
    protocol: &P,
    sink: &mut dyn VendorSink,
    source: &mut dyn VendorSource,
    start_messages: Vec<String>,
    events: &EventSink,
) -> Result<()> {
    for text in start_messages {
        sink.send_text(text).await?;
    }

    if !protocol.requires_handshake() {
        return Ok(());
    }

    loop {
        let text = match source.recv().await {
            Some(Ok(VendorFrame::Text(text))) => text,
            Some(Ok(VendorFrame::Binary(_))) => continue,
            Some(Err(e)) => return Err(e),
            None => {
                return Err(AdapterError::Connect(
                    "channel closed during handshake".to_string(),
                ))
            }
        };

        let message = match serde_json::from_str::<P::Message>(&text) {
            Ok(message) => message,
            Err(e) => {
                warn!("[{}] failed to parse handshake message: {}", P::NAME, e);
                continue;
            }
        };

        match protocol.handshake(&message) {
            Handshake::Ready => return Ok(()),
            Handshake::Rejected(reason) => return Err(AdapterError::Rejected(reason)),
            Handshake::Pending => {
                for event in protocol.translate(message) {
                    events.deliver(event).await;
                }
            }
        }
    }
}

async fn write_loop<P: VendorProtocol>(
    protocol: Arc<P>,
    mut sink: Box<dyn VendorSink>,
    mut queue: mpsc::UnboundedReceiver<Outbound>,
    events: EventSink,
    state: Arc<watch::Sender<AdapterState>>,
) {
    let mut frames_sent: u64 = 0;
    let mut failed = false;

    while let Some(outbound) = queue.recv().await {
        match outbound {
            Outbound::Audio(frame) => {
                // Audio still queued when a disconnect starts is discarded
                if !events.is_open() {
                    continue;
                }

                if let Err(e) = sink.send_binary(frame).await {
                    error!("Error sending audio to {}: {}", P::NAME, e);
                    events.error(format!("Audio transmission error: {}", e)).await;
                    close_if_connected(&state);
                    failed = true;
                    break;
                }
                frames_sent += 1;
            }
            Outbound::Close => break,
        }
    }

    if !failed {
        for text in protocol.close_messages(frames_sent) {
            if let Err(e) = sink.send_text(text).await {
                debug!("[{}] failed to send close message: {}", P::NAME, e);
                break;
            }
        }
    }

    if let Err(e) = sink.close().await {
        debug!("[{}] error closing channel: {}", P::NAME, e);
    }

    debug!("[{}] writer stopped after {} frames", P::NAME, frames_sent);
}

async fn read_loop<P: VendorProtocol>(
    protocol: Arc<P>,
    mut source: Box<dyn VendorSource>,
    events: EventSink,
    state: Arc<watch::Sender<AdapterState>>,
) {
    loop {
        match source.recv().await {
            Some(Ok(VendorFrame::Text(text))) => {
                match serde_json::from_str::<P::Message>(&text) {
                    Ok(message) => {
                        for event in protocol.translate(message) {
                            events.deliver(event).await;
                        }
                    }
                    Err(e) => warn!("Failed to parse {} response: {}", P::NAME, e),
                }
            }
            Some(Ok(VendorFrame::Binary(data))) => {
                debug!("[{}] ignoring {} byte binary frame", P::NAME, data.len());
            }
            Some(Err(e)) => {
                error!("Error listening to {} responses: {}", P::NAME, e);
                events.error(format!("Response processing error: {}", e)).await;
                break;
            }
            None => {
                info!("{} connection closed", P::NAME);
                break;
            }
        }
    }

    close_if_connected(&state);
}

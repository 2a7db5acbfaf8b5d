use super::normalized::{OutboundMessage, ProviderEvent};
use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Write half of the client connection
#[async_trait::async_trait]
pub trait ClientChannel: Send {
    /// Write one complete text message
    async fn send_text(&mut self, text: String) -> Result<()>;
}

/// Shared handle to a session's client channel.
///
/// Adapters deliver concurrently; the mutex makes every write whole.
#[derive(Clone)]
pub struct ClientSink {
    channel: Arc<Mutex<Box<dyn ClientChannel>>>,
    closed: Arc<AtomicBool>,
}

impl ClientSink {
    pub fn new(channel: impl ClientChannel + 'static) -> Self {
        Self {
            channel: Arc::new(Mutex::new(Box::new(channel))),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Serialize and write a message to the client
    pub async fn deliver(&self, message: &OutboundMessage) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            debug!("Client sink closed, dropping message");
            return Ok(());
        }

        let text = serde_json::to_string(message)?;
        let mut channel = self.channel.lock().await;
        channel.send_text(text).await
    }

    /// Stop writing to the client. Later deliveries are dropped.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Sink that attributes every event to `provider`
    pub fn for_provider(&self, provider: &'static str) -> EventSink {
        EventSink {
            provider,
            client: self.clone(),
            open: Arc::new(AtomicBool::new(true)),
        }
    }
}

/// Provider-attributed view of the client sink handed to one adapter
#[derive(Clone)]
pub struct EventSink {
    provider: &'static str,
    client: ClientSink,
    open: Arc<AtomicBool>,
}

impl EventSink {
    pub fn provider(&self) -> &'static str {
        self.provider
    }

    pub async fn deliver(&self, event: ProviderEvent) {
        if !self.open.load(Ordering::SeqCst) {
            debug!("[{}] adapter closed, dropping late event", self.provider);
            return;
        }

        let message = OutboundMessage::attributed(self.provider, event);
        if let Err(e) = self.client.deliver(&message).await {
            warn!("[{}] failed to deliver event to client: {}", self.provider, e);
        }
    }

    pub async fn error(&self, message: impl Into<String>) {
        self.deliver(ProviderEvent::Error(message.into())).await;
    }

    /// Drop every event delivered from now on
    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

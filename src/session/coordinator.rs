use super::config::SessionConfig;
use super::registry::SessionId;
use super::stats::{ProviderStatus, SessionStats};
use crate::config::ProvidersConfig;
use crate::error::AdapterError;
use crate::events::{ClientSink, ControlMessage, OutboundMessage};
use crate::providers::{AdapterState, Connector, ProviderAdapter, ProviderKind};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Lifecycle of a client session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Configuring,
    Active,
    Stopped,
}

/// Single authority over one client connection.
///
/// Routes control messages, fans audio out to every connected provider
/// adapter and owns the adapters' lifecycles. Adapter failures are turned
/// into error events for the client and never end the session.
pub struct SessionCoordinator {
    id: SessionId,
    client: ClientSink,
    connector: Arc<dyn Connector>,
    endpoints: Arc<ProvidersConfig>,
    state: SessionState,
    adapters: BTreeMap<ProviderKind, Box<dyn ProviderAdapter>>,
    started_at: DateTime<Utc>,
    frames_received: u64,
    bytes_received: u64,
    frames_dropped: u64,
    disconnected: bool,
}

impl SessionCoordinator {
    pub fn new(
        id: SessionId,
        client: ClientSink,
        connector: Arc<dyn Connector>,
        endpoints: Arc<ProvidersConfig>,
    ) -> Self {
        Self {
            id,
            client,
            connector,
            endpoints,
            state: SessionState::Idle,
            adapters: BTreeMap::new(),
            started_at: Utc::now(),
            frames_received: 0,
            bytes_received: 0,
            frames_dropped: 0,
            disconnected: false,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// State of the adapter held for `provider`, if any
    pub fn provider_state(&self, provider: ProviderKind) -> Option<AdapterState> {
        self.adapters.get(&provider).map(|adapter| adapter.state())
    }

    pub fn active_providers(&self) -> Vec<ProviderKind> {
        self.adapters.keys().copied().collect()
    }

    /// Handle a text frame from the client
    pub async fn on_text(&mut self, text: &str) {
        match ControlMessage::parse(text) {
            Ok(ControlMessage::Config(config)) => self.on_config(config).await,
            Ok(ControlMessage::Stop) => self.on_stop().await,
            Ok(ControlMessage::Unknown(kind)) => {
                debug!("[{}] ignoring control message of type {:?}", self.id, kind);
            }
            Err(e) => warn!("[{}] ignoring text frame: {}", self.id, e),
        }
    }

    /// Activate every provider the configuration carries credentials for
    pub async fn on_config(&mut self, config: Value) {
        if self.disconnected {
            warn!("[{}] config received after disconnect", self.id);
            return;
        }

        self.state = SessionState::Configuring;

        // At most one adapter per provider
        self.disconnect_all().await;

        let config = match SessionConfig::from_value(config) {
            Ok(config) => config,
            Err(e) => {
                error!("[{}] Error initializing providers: {}", self.id, e);
                self.deliver(&OutboundMessage::session_error(format!(
                    "Failed to initialize providers: {}",
                    e
                )))
                .await;
                self.state = SessionState::Active;
                return;
            }
        };

        info!("[{}] configuring providers at {} Hz", self.id, config.sample_rate);

        for provider in ProviderKind::ALL {
            let Some(resolved) = config.provider(provider) else {
                info!("[{}] {} API key not provided", self.id, provider);
                self.deliver(&OutboundMessage::provider_error(
                    provider.name(),
                    "API key not provided",
                ))
                .await;
                continue;
            };

            let mut adapter = provider.adapter(
                self.endpoints.endpoint(provider),
                Arc::clone(&self.connector),
                &self.client,
            );

            // Returns as soon as the settings are validated; each adapter
            // finishes its vendor handshake on its own task
            match adapter.connect(resolved).await {
                Ok(()) => {
                    self.adapters.insert(provider, adapter);
                }
                Err(e) => {
                    let message = match e {
                        AdapterError::InvalidConfig(reason) => {
                            format!("Invalid configuration: {}", reason)
                        }
                        other => format!("Connection failed: {}", other),
                    };
                    self.deliver(&OutboundMessage::provider_error(provider.name(), message))
                        .await;
                }
            }
        }

        self.state = SessionState::Active;
        info!(
            "[{}] session active, connecting {:?}",
            self.id,
            self.active_providers()
        );
    }

    /// Fan one audio frame out to every connected adapter.
    ///
    /// Each adapter queues the frame for its own writer, so a stalled vendor
    /// only delays itself.
    pub async fn on_audio_frame(&mut self, frame: Bytes) {
        self.frames_received += 1;
        self.bytes_received += frame.len() as u64;

        let connected: Vec<&dyn ProviderAdapter> = self
            .adapters
            .values()
            .map(|adapter| &**adapter)
            .filter(|adapter| adapter.state() == AdapterState::Connected)
            .collect();

        if connected.is_empty() {
            self.frames_dropped += 1;
            debug!("[{}] no connected providers, dropping audio frame", self.id);
            return;
        }

        let sends = connected.into_iter().map(|adapter| {
            let frame = frame.clone();
            async move { (adapter.provider(), adapter.send_audio(frame).await) }
        });

        let failures: Vec<(&'static str, AdapterError)> = join_all(sends)
            .await
            .into_iter()
            .filter_map(|(provider, result)| result.err().map(|e| (provider, e)))
            .collect();

        for (provider, e) in failures {
            warn!("[{}] Error sending audio to {}: {}", self.id, provider, e);
            self.deliver(&OutboundMessage::provider_error(
                provider,
                format!("Audio transmission error: {}", e),
            ))
            .await;
        }
    }

    /// Disconnect every adapter. A later `config` re-activates providers.
    pub async fn on_stop(&mut self) {
        info!("[{}] stopping providers", self.id);
        self.disconnect_all().await;
        self.state = SessionState::Stopped;
    }

    /// Terminal teardown once the client is gone
    pub async fn on_disconnect(&mut self) {
        if self.disconnected {
            return;
        }

        self.disconnect_all().await;
        self.client.close();
        self.state = SessionState::Stopped;
        self.disconnected = true;

        info!(
            "[{}] session closed after {} frames ({} bytes)",
            self.id, self.frames_received, self.bytes_received
        );
    }

    /// Write a session-originated message to the client
    pub async fn deliver(&self, message: &OutboundMessage) {
        if let Err(e) = self.client.deliver(message).await {
            warn!("[{}] failed to send message to client: {}", self.id, e);
        }
    }

    pub fn stats(&self) -> SessionStats {
        let duration = Utc::now().signed_duration_since(self.started_at);

        SessionStats {
            session_id: self.id,
            state: self.state,
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            frames_received: self.frames_received,
            bytes_received: self.bytes_received,
            frames_dropped: self.frames_dropped,
            providers: self
                .adapters
                .values()
                .map(|adapter| ProviderStatus {
                    provider: adapter.provider(),
                    state: adapter.state(),
                })
                .collect(),
        }
    }

    /// Tear down every adapter concurrently and wait for all of them
    async fn disconnect_all(&mut self) {
        let adapters = std::mem::take(&mut self.adapters);
        if adapters.is_empty() {
            return;
        }

        join_all(adapters.into_values().map(|mut adapter| async move {
            adapter.disconnect().await;
        }))
        .await;
    }
}

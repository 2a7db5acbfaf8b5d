// Shared fakes for integration tests
//
// `ScriptedConnector` stands in for the vendor endpoints: each opened link
// records what the adapter sent and lets the test push vendor frames back.
// `RecordingClient` captures everything written to the client channel.

#![allow(dead_code)]

use anyhow::Result;
use bytes::Bytes;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stt_compare::config::{EndpointConfig, ProvidersConfig};
use stt_compare::error::AdapterError;
use stt_compare::events::{ClientChannel, ClientSink, OutboundMessage};
use stt_compare::providers::{
    Connector, VendorFrame, VendorLink, VendorRequest, VendorSink, VendorSource,
};
use tokio::sync::mpsc;

pub const DEEPGRAM_URL: &str = "ws://deepgram.test/v1/listen";
pub const SPEECHMATICS_URL: &str = "ws://speechmatics.test/v2";

pub const RECOGNITION_STARTED: &str = r#"{"message":"RecognitionStarted","id":"test"}"#;

pub fn test_endpoints() -> ProvidersConfig {
    ProvidersConfig {
        deepgram: EndpointConfig {
            url: DEEPGRAM_URL.to_string(),
        },
        speechmatics: EndpointConfig {
            url: SPEECHMATICS_URL.to_string(),
        },
    }
}

// ============================================================================
// Vendor side
// ============================================================================

#[derive(Debug, Clone)]
pub enum Behavior {
    /// Refuse the connection with this message
    Fail(String),
    /// Accept and immediately send these text frames
    Accept { greeting: Vec<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text(String),
    Binary(Bytes),
    Close,
}

enum Inbound {
    Frame(VendorFrame),
    Error(String),
    HangUp,
}

/// Test handle on one opened vendor link
#[derive(Clone)]
pub struct FakeVendor {
    pub request: VendorRequest,
    sent: Arc<Mutex<Vec<Sent>>>,
    inbound: mpsc::UnboundedSender<Inbound>,
    fail_sends: Arc<AtomicBool>,
    stall_sends: Arc<AtomicBool>,
}

impl FakeVendor {
    /// Deliver a text frame to the adapter
    pub fn push(&self, text: &str) {
        let _ = self
            .inbound
            .send(Inbound::Frame(VendorFrame::Text(text.to_string())));
    }

    /// Make the adapter's next receive fail
    pub fn break_receive(&self, message: &str) {
        let _ = self.inbound.send(Inbound::Error(message.to_string()));
    }

    /// Close the channel from the vendor side
    pub fn hang_up(&self) {
        let _ = self.inbound.send(Inbound::HangUp);
    }

    pub fn fail_sends(&self) {
        self.fail_sends.store(true, Ordering::SeqCst);
    }

    pub fn stall_sends(&self) {
        self.stall_sends.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn audio(&self) -> Vec<Bytes> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Binary(data) => Some(data),
                _ => None,
            })
            .collect()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Text(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn close_count(&self) -> usize {
        self.sent()
            .iter()
            .filter(|sent| **sent == Sent::Close)
            .count()
    }
}

struct FakeSink {
    sent: Arc<Mutex<Vec<Sent>>>,
    fail_sends: Arc<AtomicBool>,
    stall_sends: Arc<AtomicBool>,
}

#[async_trait::async_trait]
impl VendorSink for FakeSink {
    async fn send_binary(&mut self, data: Bytes) -> Result<(), AdapterError> {
        if self.stall_sends.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(AdapterError::Transport("broken pipe".to_string()));
        }
        self.sent.lock().unwrap().push(Sent::Binary(data));
        Ok(())
    }

    async fn send_text(&mut self, text: String) -> Result<(), AdapterError> {
        self.sent.lock().unwrap().push(Sent::Text(text));
        Ok(())
    }

    async fn close(&mut self) -> Result<(), AdapterError> {
        self.sent.lock().unwrap().push(Sent::Close);
        Ok(())
    }
}

struct FakeSource(mpsc::UnboundedReceiver<Inbound>);

#[async_trait::async_trait]
impl VendorSource for FakeSource {
    async fn recv(&mut self) -> Option<Result<VendorFrame, AdapterError>> {
        match self.0.recv().await {
            Some(Inbound::Frame(frame)) => Some(Ok(frame)),
            Some(Inbound::Error(message)) => Some(Err(AdapterError::Transport(message))),
            Some(Inbound::HangUp) | None => None,
        }
    }
}

/// In-memory connector; behavior is chosen by URL substring
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    rules: Arc<Mutex<Vec<(String, Behavior)>>>,
    links: Arc<Mutex<Vec<FakeVendor>>>,
}

impl ScriptedConnector {
    /// Deepgram accepts, Speechmatics accepts after `RecognitionStarted`
    pub fn accepting() -> Self {
        let connector = Self::default();
        connector.rule("deepgram", Behavior::Accept { greeting: vec![] });
        connector.rule(
            "speechmatics",
            Behavior::Accept {
                greeting: vec![RECOGNITION_STARTED.to_string()],
            },
        );
        connector
    }

    pub fn rule(&self, url_part: &str, behavior: Behavior) {
        self.rules
            .lock()
            .unwrap()
            .insert(0, (url_part.to_string(), behavior));
    }

    /// Every link opened so far whose URL contains `url_part`
    pub fn links(&self, url_part: &str) -> Vec<FakeVendor> {
        self.links
            .lock()
            .unwrap()
            .iter()
            .filter(|link| link.request.url.contains(url_part))
            .cloned()
            .collect()
    }

    /// Most recent link for `url_part`
    pub fn vendor(&self, url_part: &str) -> FakeVendor {
        self.links(url_part)
            .pop()
            .unwrap_or_else(|| panic!("no link opened for {}", url_part))
    }
}

#[async_trait::async_trait]
impl Connector for ScriptedConnector {
    async fn open(&self, request: VendorRequest) -> Result<VendorLink, AdapterError> {
        let behavior = self
            .rules
            .lock()
            .unwrap()
            .iter()
            .find(|(part, _)| request.url.contains(part.as_str()))
            .map(|(_, behavior)| behavior.clone())
            .unwrap_or_else(|| Behavior::Fail("no route to host".to_string()));

        let greeting = match behavior {
            Behavior::Fail(message) => return Err(AdapterError::Connect(message)),
            Behavior::Accept { greeting } => greeting,
        };

        let (inbound, queue) = mpsc::unbounded_channel();
        let vendor = FakeVendor {
            request,
            sent: Arc::new(Mutex::new(Vec::new())),
            inbound,
            fail_sends: Arc::new(AtomicBool::new(false)),
            stall_sends: Arc::new(AtomicBool::new(false)),
        };
        for text in greeting {
            vendor.push(&text);
        }

        let link = VendorLink {
            sink: Box::new(FakeSink {
                sent: Arc::clone(&vendor.sent),
                fail_sends: Arc::clone(&vendor.fail_sends),
                stall_sends: Arc::clone(&vendor.stall_sends),
            }),
            source: Box::new(FakeSource(queue)),
        };

        self.links.lock().unwrap().push(vendor);
        Ok(link)
    }
}

// ============================================================================
// Client side
// ============================================================================

#[derive(Clone, Default)]
pub struct RecordingClient {
    sent: Arc<Mutex<Vec<String>>>,
}

impl RecordingClient {
    pub fn sink(&self) -> ClientSink {
        ClientSink::new(self.clone())
    }

    pub fn raw(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.raw()
            .iter()
            .map(|text| serde_json::from_str(text).expect("client message is valid JSON"))
            .collect()
    }

    pub fn errors(&self) -> Vec<(Option<String>, String)> {
        self.messages()
            .into_iter()
            .filter_map(|message| match message {
                OutboundMessage::Error { provider, error } => Some((provider, error)),
                _ => None,
            })
            .collect()
    }

    pub fn transcripts(&self, provider: &str) -> Vec<stt_compare::events::Transcript> {
        self.messages()
            .into_iter()
            .filter_map(|message| match message {
                OutboundMessage::Transcript {
                    provider: from,
                    transcript,
                } if from == provider => Some(transcript),
                _ => None,
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl ClientChannel for RecordingClient {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.sent.lock().unwrap().push(text);
        Ok(())
    }
}

/// Poll `check` until it holds or two seconds pass
pub async fn eventually<F>(mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// Give background tasks a moment to run
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

pub async fn timeout<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("operation timed out")
}

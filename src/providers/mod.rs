//! Speech-to-text provider adapters
//!
//! Each vendor implements [`VendorProtocol`]; [`StreamingAdapter`] drives
//! any protocol over a [`Connector`] and exposes it as a [`ProviderAdapter`].
//! Supported vendors:
//! - Deepgram (utterance oriented)
//! - Speechmatics (word results grouped into speaker segments)

mod adapter;
mod channel;
pub mod deepgram;
pub mod speechmatics;

pub use adapter::{
    AdapterState, Handshake, ProviderAdapter, ProviderConfig, StreamingAdapter, VendorProtocol,
};
pub use channel::{
    Connector, VendorFrame, VendorLink, VendorRequest, VendorSink, VendorSource,
    WebSocketConnector,
};
pub use deepgram::DeepgramProtocol;
pub use speechmatics::SpeechmaticsProtocol;

use crate::events::ClientSink;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Known providers, in configuration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Speechmatics,
    Deepgram,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::Speechmatics, ProviderKind::Deepgram];

    /// Key of this provider in the client config and in outbound events
    pub fn name(self) -> &'static str {
        match self {
            ProviderKind::Speechmatics => SpeechmaticsProtocol::NAME,
            ProviderKind::Deepgram => DeepgramProtocol::NAME,
        }
    }

    /// Create an unconnected adapter for this provider
    pub fn adapter(
        self,
        endpoint: &str,
        connector: Arc<dyn Connector>,
        client: &ClientSink,
    ) -> Box<dyn ProviderAdapter> {
        let events = client.for_provider(self.name());
        match self {
            ProviderKind::Speechmatics => Box::new(StreamingAdapter::new(
                SpeechmaticsProtocol::new(endpoint),
                connector,
                events,
            )),
            ProviderKind::Deepgram => Box::new(StreamingAdapter::new(
                DeepgramProtocol::new(endpoint),
                connector,
                events,
            )),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

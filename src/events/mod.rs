//! Normalized event model
//!
//! Every provider adapter produces the same event shapes, which are
//! attributed to their provider and written verbatim to the client:
//! - Transcripts (text, finality, timing, optional confidence and speaker)
//! - Lifecycle events (speech started/ended, end of turn)
//! - Errors (provider-attributed or session-level)
//!
//! Inbound control messages from the client are parsed here as well.

mod control;
mod normalized;
mod sink;

pub use control::{ControlError, ControlMessage, END_LITERAL};
pub use normalized::{LifecycleKind, OutboundMessage, ProviderEvent, Speaker, Transcript};
pub use sink::{ClientChannel, ClientSink, EventSink};

pub mod config;
pub mod error;
pub mod events;
pub mod http;
pub mod providers;
pub mod session;

pub use config::Config;
pub use error::AdapterError;
pub use events::{ClientChannel, ClientSink, ControlMessage, OutboundMessage, ProviderEvent};
pub use http::{create_router, AppState};
pub use providers::{
    AdapterState, Connector, ProviderAdapter, ProviderKind, StreamingAdapter, WebSocketConnector,
};
pub use session::{SessionCoordinator, SessionId, SessionRegistry, SessionState};

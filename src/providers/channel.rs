use crate::error::{AdapterError, Result};
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream, StreamExt};
use futures::SinkExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;

/// Everything needed to open a vendor channel
#[derive(Debug, Clone, PartialEq)]
pub struct VendorRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

/// A frame received from a vendor
#[derive(Debug, Clone, PartialEq)]
pub enum VendorFrame {
    Text(String),
    Binary(Bytes),
}

/// Write half of a vendor duplex channel
#[async_trait::async_trait]
pub trait VendorSink: Send {
    async fn send_binary(&mut self, data: Bytes) -> Result<()>;

    async fn send_text(&mut self, text: String) -> Result<()>;

    async fn close(&mut self) -> Result<()>;
}

/// Read half of a vendor duplex channel
#[async_trait::async_trait]
pub trait VendorSource: Send {
    /// Next frame, or `None` once the vendor closed the channel
    async fn recv(&mut self) -> Option<Result<VendorFrame>>;
}

/// An open vendor channel, split so reads and writes run independently
pub struct VendorLink {
    pub sink: Box<dyn VendorSink>,
    pub source: Box<dyn VendorSource>,
}

/// Opens vendor duplex channels
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, request: VendorRequest) -> Result<VendorLink>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connector for vendors speaking WebSocket
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait::async_trait]
impl Connector for WebSocketConnector {
    async fn open(&self, request: VendorRequest) -> Result<VendorLink> {
        let mut ws_request = request
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| AdapterError::Connect(e.to_string()))?;

        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| AdapterError::Connect(e.to_string()))?;
            let value =
                HeaderValue::from_str(value).map_err(|e| AdapterError::Connect(e.to_string()))?;
            ws_request.headers_mut().insert(name, value);
        }

        let (stream, response) = tokio_tungstenite::connect_async(ws_request)
            .await
            .map_err(|e| AdapterError::Connect(e.to_string()))?;

        debug!("WebSocket handshake completed with status {}", response.status());

        let (sink, source) = stream.split();
        Ok(VendorLink {
            sink: Box::new(WsSink(sink)),
            source: Box::new(WsSource(source)),
        })
    }
}

struct WsSink(SplitSink<WsStream, Message>);

#[async_trait::async_trait]
impl VendorSink for WsSink {
    async fn send_binary(&mut self, data: Bytes) -> Result<()> {
        self.0.send(Message::binary(data)).await?;
        Ok(())
    }

    async fn send_text(&mut self, text: String) -> Result<()> {
        self.0.send(Message::text(text)).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        match self.0.close().await {
            Ok(()) | Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

struct WsSource(SplitStream<WsStream>);

#[async_trait::async_trait]
impl VendorSource for WsSource {
    async fn recv(&mut self) -> Option<Result<VendorFrame>> {
        loop {
            let message = match self.0.next().await? {
                Ok(message) => message,
                Err(e) => {
                    return match AdapterError::from(e) {
                        AdapterError::Closed => None,
                        other => Some(Err(other)),
                    }
                }
            };

            match message {
                Message::Text(text) => return Some(Ok(VendorFrame::Text(text.as_str().to_owned()))),
                Message::Binary(data) => return Some(Ok(VendorFrame::Binary(data))),
                Message::Close(frame) => {
                    debug!("Vendor closed channel: {:?}", frame);
                    return None;
                }
                // Ping/pong are answered by tungstenite
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }
}

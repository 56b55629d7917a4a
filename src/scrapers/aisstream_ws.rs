//! aisstream.io WebSocket Position Feed
//!
//! Based on the aisstream.io streaming API:
//! - Endpoint: wss://stream.aisstream.io/v0/stream
//! - One JSON subscription message right after connect (API key, bounding
//!   boxes, message type filter)
//! - The first message back confirms the subscription
//! - Every following frame (text or binary) carries one JSON envelope
//!
//! No reconnect logic here: a transport failure ends the ingestion run.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async_with_config, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::recorder::ingest::MessageSource;

pub const AISSTREAM_WS_URL: &str = "wss://stream.aisstream.io/v0/stream";
pub const POSITION_REPORT_FILTER: &str = "PositionReport";

/// `[[lat, lon], [lat, lon]]` corners.
pub type BoundingBox = [[f64; 2]; 2];

/// Whole world.
pub const WORLD_BOUNDING_BOX: BoundingBox = [[-90.0, -180.0], [90.0, 180.0]];

/// Subscription message sent once after connect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionMessage {
    #[serde(rename = "APIKey")]
    pub api_key: String,
    #[serde(rename = "BoundingBoxes")]
    pub bounding_boxes: Vec<BoundingBox>,
    #[serde(rename = "FilterMessageTypes")]
    pub filter_message_types: Vec<String>,
}

impl SubscriptionMessage {
    /// Position reports from every vessel on the globe.
    pub fn world_positions(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            bounding_boxes: vec![WORLD_BOUNDING_BOX],
            filter_message_types: vec![POSITION_REPORT_FILTER.to_string()],
        }
    }
}

/// Connects and subscribes to the aisstream.io feed.
pub struct AisStreamClient {
    url: String,
    subscription: SubscriptionMessage,
}

impl AisStreamClient {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            subscription: SubscriptionMessage::world_positions(api_key),
        }
    }

    /// Open the WebSocket, subscribe and wait for the confirmation message.
    pub async fn connect(
        &self,
    ) -> Result<AisStreamSession<MaybeTlsStream<TcpStream>>, ConnectionError> {
        info!("🔌 Connecting to AIS stream...");
        debug!("WebSocket URL: {}", self.url);

        let request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(ConnectionError::Connect)?;

        let ws_config = WebSocketConfig {
            max_message_size: Some(16 * 1024 * 1024),
            max_frame_size: Some(4 * 1024 * 1024),
            accept_unmasked_frames: false,
            ..Default::default()
        };

        let (ws_stream, response) = connect_async_with_config(request, Some(ws_config), false)
            .await
            .map_err(ConnectionError::Connect)?;

        info!("✅ WebSocket connected (status: {})", response.status());

        let (session, confirmation) = AisStreamSession::subscribe(ws_stream, &self.subscription).await?;
        info!("📡 Subscription confirmation: {}", confirmation);

        Ok(session)
    }
}

/// A subscribed stream yielding raw envelope payloads.
pub struct AisStreamSession<S> {
    ws: WebSocketStream<S>,
}

impl<S> AisStreamSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Send `subscription` over an open socket and wait for the first reply.
    ///
    /// The reply is returned verbatim and is not decoded as a position report.
    pub async fn subscribe(
        mut ws: WebSocketStream<S>,
        subscription: &SubscriptionMessage,
    ) -> Result<(Self, String), ConnectionError> {
        let sub_json =
            serde_json::to_string(subscription).map_err(ConnectionError::Serialization)?;

        ws.send(Message::Text(sub_json))
            .await
            .map_err(ConnectionError::Subscribe)?;

        debug!(
            boxes = subscription.bounding_boxes.len(),
            filters = ?subscription.filter_message_types,
            "Subscription sent"
        );

        let mut session = Self { ws };
        match session.next_payload().await? {
            Some(payload) => {
                let confirmation = String::from_utf8_lossy(&payload).into_owned();
                Ok((session, confirmation))
            }
            None => Err(ConnectionError::Handshake(
                "stream closed before subscription was confirmed".to_string(),
            )),
        }
    }

    /// Next text or binary payload, answering pings on the way.
    ///
    /// `Ok(None)` means the server closed the stream.
    pub async fn next_payload(&mut self) -> Result<Option<Vec<u8>>, ConnectionError> {
        while let Some(message) = self.ws.next().await {
            match message.map_err(ConnectionError::Read)? {
                Message::Text(text) => return Ok(Some(text.into_bytes())),
                Message::Binary(data) => return Ok(Some(data)),
                Message::Ping(ping) => {
                    debug!("Received ping, sending pong");
                    self.ws
                        .send(Message::Pong(ping))
                        .await
                        .map_err(ConnectionError::Write)?;
                }
                Message::Pong(_) => debug!("Received pong"),
                Message::Close(frame) => {
                    info!("WebSocket closed by server: {:?}", frame);
                    return Ok(None);
                }
                Message::Frame(_) => warn!("Received unexpected raw frame"),
            }
        }

        Ok(None)
    }
}

#[async_trait]
impl<S> MessageSource for AisStreamSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn next_message(&mut self) -> Result<Option<Vec<u8>>, ConnectionError> {
        self.next_payload().await
    }
}

/// Transport-level failures.
#[derive(Debug)]
pub enum ConnectionError {
    Connect(tungstenite::Error),
    Serialization(serde_json::Error),
    Subscribe(tungstenite::Error),
    /// The server ended the session before confirming the subscription.
    Handshake(String),
    Read(tungstenite::Error),
    Write(tungstenite::Error),
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect(e) => write!(f, "failed to connect to AIS stream: {}", e),
            Self::Serialization(e) => write!(f, "failed to serialize subscription: {}", e),
            Self::Subscribe(e) => write!(f, "failed to send subscription: {}", e),
            Self::Handshake(reason) => write!(f, "subscription rejected: {}", reason),
            Self::Read(e) => write!(f, "WebSocket read error: {}", e),
            Self::Write(e) => write!(f, "WebSocket write error: {}", e),
        }
    }
}

impl std::error::Error for ConnectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Connect(e) | Self::Subscribe(e) | Self::Read(e) | Self::Write(e) => Some(e),
            Self::Serialization(e) => Some(e),
            Self::Handshake(_) => None,
        }
    }
}

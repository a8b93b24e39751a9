//! Websocket channels over `tokio-tungstenite`.

use super::contract::{ChannelSocket, ChannelTransport};
use crate::error::ApiError;
use async_trait::async_trait;
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone, Copy, Default)]
pub struct WsChannelTransport;

impl WsChannelTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ChannelTransport for WsChannelTransport {
    async fn open(&self, url: &str) -> Result<Box<dyn ChannelSocket>, ApiError> {
        let url = Url::parse(url)?;
        match url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(ApiError::ConfigError(format!(
                    "Unsupported channel scheme '{}' in {}",
                    other, url
                )))
            }
        }
        let (stream, _) = connect_async(url.as_str()).await?;
        debug!(url = %url, "Channel opened");
        Ok(Box::new(WsSocket {
            stream,
            closed: false,
        }))
    }
}

struct WsSocket {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

#[async_trait]
impl ChannelSocket for WsSocket {
    async fn recv(&mut self) -> Option<Result<String, ApiError>> {
        if self.closed {
            return None;
        }
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Some(Ok(text)),
                Some(Ok(Message::Binary(bytes))) => {
                    return Some(String::from_utf8(bytes).map_err(|e| {
                        ApiError::ProtocolError(format!("Binary channel message is not UTF-8: {}", e))
                    }))
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(frame = ?frame, "Channel closed by peer");
                    self.closed = true;
                    return None;
                }
                Some(Ok(_)) => continue,
                Some(Err(WsError::ConnectionClosed)) | None => {
                    self.closed = true;
                    return None;
                }
                Some(Err(e)) => return Some(Err(e.into())),
            }
        }
    }

    async fn close(&mut self) -> Result<(), ApiError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        };
        match self.stream.close(Some(frame)).await {
            Ok(()) | Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => Ok(()),
            Err(e) => {
                warn!(error = %e, "Failed to close channel cleanly");
                Err(e.into())
            }
        }
    }
}

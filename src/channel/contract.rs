//! Streaming channel transport contract.

use crate::error::ApiError;
use async_trait::async_trait;

/// One open message channel.
#[async_trait]
pub trait ChannelSocket: Send {
    /// Next text message; `None` once the peer closed the channel.
    async fn recv(&mut self) -> Option<Result<String, ApiError>>;

    /// Close with a normal closure code. Closing twice is not an error.
    async fn close(&mut self) -> Result<(), ApiError>;
}

/// Opens channels from the links returned by deferred responses.
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    async fn open(&self, url: &str) -> Result<Box<dyn ChannelSocket>, ApiError>;
}

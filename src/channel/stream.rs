//! Deferred-result exchange.
//!
//! A kickoff request either answers inline (`200`) or hands out a channel
//! link (`202`). The channel then streams envelopes that are appended to an
//! accumulator until the terminator arrives. The accumulator belongs to one
//! [`StreamChannel`] and is dropped, never delivered, when the exchange fails.

use super::contract::{ChannelSocket, ChannelTransport};
use crate::error::ApiError;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};
use crate::types::{ChannelEnvelope, DeferredLink};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// What the channel's messages carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// `{size, data}` envelopes; only the terminator ends the exchange.
    Data,
    /// Free-form notices (e.g. deletion errors); peer closure ends the exchange.
    Notices,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    AwaitingKickoffResponse,
    AwaitingSocketOpen,
    Streaming,
    Closed(Outcome),
}

/// Result of the kickoff request.
#[derive(Debug, Clone, PartialEq)]
pub enum Kickoff {
    Immediate(Value),
    Deferred { link: String },
}

/// Whether the channel expects more messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Terminated,
}

/// Values reassembled from a channel, plus notices for [`ChannelKind::Notices`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelOutput {
    pub data: Vec<Value>,
    pub notices: Vec<Value>,
}

/// Complete result of one exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum Exchange {
    Immediate(Value),
    Streamed(ChannelOutput),
}

type CloseHook = Box<dyn FnOnce() + Send>;

pub struct StreamChannel {
    kind: ChannelKind,
    state: ChannelState,
    accumulator: Vec<Value>,
    notices: Vec<Value>,
    idle_timeout: Option<Duration>,
    on_close: Option<CloseHook>,
}

impl std::fmt::Debug for StreamChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamChannel")
            .field("kind", &self.kind)
            .field("state", &self.state)
            .field("accumulated", &self.accumulator.len())
            .field("notices", &self.notices.len())
            .finish()
    }
}

impl StreamChannel {
    pub fn new(kind: ChannelKind) -> Self {
        Self {
            kind,
            state: ChannelState::Idle,
            accumulator: Vec::new(),
            notices: Vec::new(),
            idle_timeout: None,
            on_close: None,
        }
    }

    /// Fail the exchange when no message arrives within `limit`.
    pub fn with_idle_timeout(mut self, limit: Option<Duration>) -> Self {
        self.idle_timeout = limit;
        self
    }

    /// Called once when the socket is closed, whatever the outcome.
    pub fn on_close(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_close = Some(Box::new(hook));
        self
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Values accumulated so far.
    pub fn accumulated(&self) -> &[Value] {
        &self.accumulator
    }

    pub fn begin_kickoff(&mut self) -> Result<(), ApiError> {
        self.expect(ChannelState::Idle, "begin kickoff")?;
        self.state = ChannelState::AwaitingKickoffResponse;
        Ok(())
    }

    /// Classify the kickoff response.
    pub fn on_kickoff(&mut self, response: HttpResponse) -> Result<Kickoff, ApiError> {
        self.expect(ChannelState::AwaitingKickoffResponse, "handle kickoff")?;
        match response.status {
            202 => {
                let link: DeferredLink = match serde_json::from_value(response.body) {
                    Ok(link) => link,
                    Err(e) => {
                        return Err(self.fail(ApiError::ProtocolError(format!(
                            "Deferred response without a channel link: {}",
                            e
                        ))))
                    }
                };
                self.state = ChannelState::AwaitingSocketOpen;
                Ok(Kickoff::Deferred { link: link.link })
            }
            200..=299 => {
                self.state = ChannelState::Closed(Outcome::Success);
                Ok(Kickoff::Immediate(response.body))
            }
            400..=599 => Err(self.fail(response.into_error())),
            status => Err(self.fail(ApiError::ProtocolError(format!(
                "Unexpected status {} for kickoff",
                status
            )))),
        }
    }

    pub fn on_open(&mut self) -> Result<(), ApiError> {
        self.expect(ChannelState::AwaitingSocketOpen, "open channel")?;
        self.state = ChannelState::Streaming;
        Ok(())
    }

    /// Feed one inbound message.
    pub fn on_message(&mut self, text: &str) -> Result<Step, ApiError> {
        self.expect(ChannelState::Streaming, "receive message")?;
        match self.kind {
            ChannelKind::Data => {
                let envelope: ChannelEnvelope = serde_json::from_str(text).map_err(|e| {
                    ApiError::ProtocolError(format!("Malformed channel envelope: {}", e))
                })?;
                if envelope.is_terminator() {
                    self.state = ChannelState::Closed(Outcome::Success);
                    return Ok(Step::Terminated);
                }
                self.accumulator.extend(envelope.data.unwrap_or_default());
                Ok(Step::Continue)
            }
            ChannelKind::Notices => {
                let value: Value = serde_json::from_str(text)
                    .unwrap_or_else(|_| Value::String(text.to_string()));
                if let Some(size) = value.as_object().and_then(|map| map.get("size")) {
                    if is_truthy_size(size) {
                        let chunk = value.get("data").and_then(Value::as_array);
                        self.accumulator.extend(chunk.into_iter().flatten().cloned());
                        return Ok(Step::Continue);
                    }
                    self.state = ChannelState::Closed(Outcome::Success);
                    return Ok(Step::Terminated);
                }
                self.notices.push(value);
                Ok(Step::Continue)
            }
        }
    }

    /// The peer closed the channel without sending a terminator.
    pub fn on_peer_closed(&mut self) -> Result<(), ApiError> {
        self.expect(ChannelState::Streaming, "handle closure")?;
        match self.kind {
            ChannelKind::Notices => {
                self.state = ChannelState::Closed(Outcome::Success);
                Ok(())
            }
            ChannelKind::Data => Err(self.fail(ApiError::ChannelError(
                "Channel closed before its terminator".to_string(),
            ))),
        }
    }

    /// Move to `Closed(Error)`, discarding everything accumulated.
    pub fn fail(&mut self, err: ApiError) -> ApiError {
        self.state = ChannelState::Closed(Outcome::Error);
        self.accumulator.clear();
        self.notices.clear();
        err
    }

    /// Take the reassembled output of a successful exchange.
    pub fn take_output(&mut self) -> Result<ChannelOutput, ApiError> {
        self.expect(ChannelState::Closed(Outcome::Success), "take output")?;
        Ok(ChannelOutput {
            data: std::mem::take(&mut self.accumulator),
            notices: std::mem::take(&mut self.notices),
        })
    }

    /// Run the whole exchange: kickoff, then the channel if the response was deferred.
    ///
    /// `resolve_link` turns the link of a deferred response into a channel URL.
    pub async fn exchange<F>(
        mut self,
        http: &dyn HttpTransport,
        request: HttpRequest,
        channels: &dyn ChannelTransport,
        resolve_link: F,
    ) -> Result<Exchange, ApiError>
    where
        F: FnOnce(&str) -> String + Send,
    {
        self.begin_kickoff()?;
        let response = match http.send(request).await {
            Ok(response) => response,
            Err(e) => return Err(self.fail(e)),
        };
        match self.on_kickoff(response)? {
            Kickoff::Immediate(body) => Ok(Exchange::Immediate(body)),
            Kickoff::Deferred { link } => {
                let url = resolve_link(&link);
                self.consume(channels, &url).await.map(Exchange::Streamed)
            }
        }
    }

    /// Open the channel at `url` and read it to completion.
    pub async fn consume(
        &mut self,
        channels: &dyn ChannelTransport,
        url: &str,
    ) -> Result<ChannelOutput, ApiError> {
        self.expect(ChannelState::AwaitingSocketOpen, "consume channel")?;
        let mut socket = match channels.open(url).await {
            Ok(socket) => socket,
            Err(e) => return Err(self.fail(e)),
        };
        self.on_open()?;
        debug!(url, kind = ?self.kind, "Streaming channel");

        let result = self.drain(socket.as_mut()).await;
        if let Err(e) = socket.close().await {
            debug!(url, error = %e, "Channel close reported an error");
        }
        if let Some(hook) = self.on_close.take() {
            hook();
        }

        match result {
            Ok(()) => {
                debug!(url, values = self.accumulator.len(), notices = self.notices.len(), "Channel completed");
                self.take_output()
            }
            Err(e) => {
                warn!(url, error = %e, "Channel failed");
                Err(self.fail(e))
            }
        }
    }

    async fn drain(&mut self, socket: &mut dyn ChannelSocket) -> Result<(), ApiError> {
        loop {
            let next = match self.idle_timeout {
                Some(limit) => match tokio::time::timeout(limit, socket.recv()).await {
                    Ok(next) => next,
                    Err(_) => {
                        return Err(ApiError::ChannelError(format!(
                            "No message within {}s",
                            limit.as_secs_f64()
                        )))
                    }
                },
                None => socket.recv().await,
            };
            match next {
                Some(Ok(text)) => {
                    if self.on_message(&text)? == Step::Terminated {
                        return Ok(());
                    }
                }
                Some(Err(e)) => return Err(e),
                None => return self.on_peer_closed(),
            }
        }
    }

    fn expect(&self, state: ChannelState, action: &str) -> Result<(), ApiError> {
        if self.state == state {
            Ok(())
        } else {
            Err(ApiError::ProtocolError(format!(
                "Cannot {} while channel is {:?}",
                action, self.state
            )))
        }
    }
}

fn is_truthy_size(size: &Value) -> bool {
    match size {
        Value::Number(n) => n.as_f64().map(|v| v > 0.0).unwrap_or(false),
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty() && s != "0",
        _ => false,
    }
}

/// Join a channel link onto the websocket root.
pub fn channel_url(ws_root: &str, link: &str) -> String {
    if link.starts_with("ws://") || link.starts_with("wss://") {
        return link.to_string();
    }
    format!(
        "{}/{}",
        ws_root.trim_end_matches('/'),
        link.trim_start_matches('/')
    )
}

//! Scripted in-memory transports.

use async_trait::async_trait;
use lagoon::channel::{ChannelSocket, ChannelTransport};
use lagoon::transport::{HttpRequest, HttpResponse, HttpTransport, Method};
use lagoon::{ApiError, DataSource, DataSourceClient};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Notify;

/// Answers requests in order and records them.
#[derive(Default)]
pub struct ScriptedHttp {
    responses: Mutex<VecDeque<(Method, String, HttpResponse)>>,
    pub requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttp {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Expect `method` on `path` (segments joined by `/`) and answer with `status` and `body`.
    pub fn expect(&self, method: Method, path: &str, status: u16, body: Value) {
        self.responses
            .lock()
            .push_back((method, path.to_string(), HttpResponse::new(status, body)));
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl HttpTransport for ScriptedHttp {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.requests.lock().push(request.clone());
        let (method, path, response) = self
            .responses
            .lock()
            .pop_front()
            .ok_or_else(|| ApiError::NetworkError(format!("unexpected request {}", request.path())))?;
        assert_eq!(method, request.method, "method for {}", request.path());
        assert_eq!(path, request.path());
        Ok(response)
    }
}

/// Holds a socket's first message back until released.
#[derive(Default)]
pub struct Gate {
    reached: Notify,
    release: Notify,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Wait until a socket is blocked on this gate.
    pub async fn reached(&self) {
        self.reached.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

/// Channels keyed by URL, each replaying its scripted messages then closing.
#[derive(Default)]
pub struct ScriptedChannels {
    scripts: Mutex<HashMap<String, Vec<Result<String, ApiError>>>>,
    gates: Mutex<HashMap<String, Arc<Gate>>>,
    pub opened: Mutex<Vec<String>>,
    pub closed: Arc<Mutex<Vec<String>>>,
}

impl ScriptedChannels {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, url: &str, messages: Vec<Value>) {
        self.scripts
            .lock()
            .insert(url.to_string(), messages.into_iter().map(|m| Ok(m.to_string())).collect());
    }

    /// Like `script`, but the first message waits for `gate` to be released.
    pub fn script_gated(&self, url: &str, gate: Arc<Gate>, messages: Vec<Value>) {
        self.gates.lock().insert(url.to_string(), gate);
        self.script(url, messages);
    }

    pub fn script_raw(&self, url: &str, messages: Vec<Result<String, ApiError>>) {
        self.scripts.lock().insert(url.to_string(), messages);
    }
}

struct ScriptedSocket {
    url: String,
    messages: VecDeque<Result<String, ApiError>>,
    gate: Option<Arc<Gate>>,
    closed: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ChannelSocket for ScriptedSocket {
    async fn recv(&mut self) -> Option<Result<String, ApiError>> {
        if let Some(gate) = self.gate.take() {
            gate.reached.notify_one();
            gate.release.notified().await;
        }
        self.messages.pop_front()
    }

    async fn close(&mut self) -> Result<(), ApiError> {
        self.closed.lock().push(self.url.clone());
        Ok(())
    }
}

#[async_trait]
impl ChannelTransport for ScriptedChannels {
    async fn open(&self, url: &str) -> Result<Box<dyn ChannelSocket>, ApiError> {
        self.opened.lock().push(url.to_string());
        let messages = self
            .scripts
            .lock()
            .remove(url)
            .ok_or_else(|| ApiError::ChannelError(format!("no channel at {}", url)))?;
        Ok(Box::new(ScriptedSocket {
            url: url.to_string(),
            messages: messages.into(),
            gate: self.gates.lock().remove(url),
            closed: self.closed.clone(),
        }))
    }
}

pub const API_ROOT: &str = "http://localhost:4000/lagoon";
pub const WS_ROOT: &str = "ws://localhost:4000/lagoon";

pub fn client(http: &Arc<ScriptedHttp>, channels: &Arc<ScriptedChannels>) -> DataSourceClient {
    client_with(DataSource::new("ds", API_ROOT).unwrap(), http, channels)
}

pub fn client_with(
    source: DataSource,
    http: &Arc<ScriptedHttp>,
    channels: &Arc<ScriptedChannels>,
) -> DataSourceClient {
    DataSourceClient::new(source, http.clone(), channels.clone())
}

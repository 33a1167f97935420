//! Ledger query client over persistent WebSocket connections.
//!
//! # Responsibilities
//! - Keep one connection per network, reconnecting lazily after a drop
//! - Correlate responses to requests by `id`
//! - Enforce a per-query timeout
//! - Classify responses into success / failure / malformed
//!
//! # Design Decisions
//! - Single attempt per query; callers decide whether to re-invoke
//! - Network is a mandatory parameter of every query
//! - A dropped connection fails every in-flight query on it immediately

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::config::LedgerConfig;
use crate::ledger::types::{Command, FailureReason, Network, QueryResponse};
use crate::observability::metrics;
use crate::resilience::timeouts::with_timeout;

/// Read-only request/response access to a ledger network.
#[async_trait]
pub trait LedgerQueryClient: Send + Sync {
    /// Issue one query. `purpose` labels the caller in logs.
    async fn query(&self, purpose: &str, command: Command, network: Network) -> QueryResponse;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Pending = Arc<DashMap<u64, oneshot::Sender<Value>>>;

/// One live connection and its reader task.
struct Connection {
    sink: Mutex<SplitSink<WsStream, Message>>,
    pending: Pending,
    alive: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

impl Connection {
    fn spawn(stream: WsStream, network: Network) -> Self {
        let (sink, source) = stream.split();
        let pending: Pending = Arc::new(DashMap::new());
        let alive = Arc::new(AtomicBool::new(true));
        let reader = tokio::spawn(read_loop(source, pending.clone(), alive.clone(), network));

        Self {
            sink: Mutex::new(sink),
            pending,
            alive,
            reader,
        }
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn send(&self, request: &Value) -> Result<(), String> {
        let mut sink = self.sink.lock().await;
        sink.send(Message::text(request.to_string()))
            .await
            .map_err(|e| e.to_string())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_loop(mut source: SplitStream<WsStream>, pending: Pending, alive: Arc<AtomicBool>, network: Network) {
    while let Some(frame) = source.next().await {
        match frame {
            Ok(Message::Text(text)) => dispatch(&pending, text.as_str()),
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(network = %network, error = %e, "Ledger connection error");
                break;
            }
        }
    }

    alive.store(false, Ordering::SeqCst);
    // Dropping the senders fails every waiting query with a transport error.
    pending.clear();
    tracing::debug!(network = %network, "Ledger connection closed");
}

fn dispatch(pending: &Pending, text: &str) {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring unparseable ledger frame");
            return;
        }
    };

    // Subscription streams carry no id.
    let Some(id) = value.get("id").and_then(Value::as_u64) else {
        return;
    };

    if let Some((_, tx)) = pending.remove(&id) {
        let _ = tx.send(value);
    }
}

/// Removes a query's correlation entry however the query ends, including
/// when the caller drops it mid-wait.
struct PendingSlot<'a> {
    pending: &'a Pending,
    id: u64,
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.id);
    }
}

/// WebSocket implementation of [`LedgerQueryClient`].
pub struct WebSocketLedgerClient {
    config: LedgerConfig,
    timeout: Duration,
    connections: Mutex<HashMap<Network, Arc<Connection>>>,
    next_id: AtomicU64,
}

impl WebSocketLedgerClient {
    pub fn new(config: LedgerConfig) -> Self {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        Self {
            config,
            timeout,
            connections: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Endpoint for a network.
    pub fn endpoint(&self, network: Network) -> &str {
        match network {
            Network::Main => &self.config.mainnet_url,
            Network::Test => &self.config.testnet_url,
        }
    }

    async fn connection(&self, network: Network) -> Result<Arc<Connection>, FailureReason> {
        let mut connections = self.connections.lock().await;
        if let Some(existing) = connections.get(&network) {
            if existing.is_alive() {
                return Ok(existing.clone());
            }
        }

        let url = self.endpoint(network).to_string();
        let (stream, _) = with_timeout(self.timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| FailureReason::Timeout)?
            .map_err(|e| FailureReason::Transport(e.to_string()))?;

        tracing::info!(network = %network, url = %url, "Ledger connection established");

        let connection = Arc::new(Connection::spawn(stream, network));
        connections.insert(network, connection.clone());
        Ok(connection)
    }

    async fn execute(&self, command: &Command, network: Network) -> QueryResponse {
        let connection = match self.connection(network).await {
            Ok(c) => c,
            Err(reason) => return QueryResponse::Failure { reason },
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        connection.pending.insert(id, tx);
        let _slot = PendingSlot {
            pending: &connection.pending,
            id,
        };

        if let Err(e) = connection.send(&command.to_request(id)).await {
            return QueryResponse::Failure {
                reason: FailureReason::Transport(e),
            };
        }

        match with_timeout(self.timeout, rx).await {
            Ok(Ok(envelope)) => QueryResponse::from_envelope(envelope),
            Ok(Err(_)) => QueryResponse::Failure {
                reason: FailureReason::Transport("connection closed".to_string()),
            },
            Err(_) => QueryResponse::Failure {
                reason: FailureReason::Timeout,
            },
        }
    }

    /// Close every open connection.
    pub async fn close(&self) {
        let mut connections = self.connections.lock().await;
        for (network, connection) in connections.drain() {
            let mut sink = connection.sink.lock().await;
            if let Err(e) = sink.close().await {
                tracing::debug!(network = %network, error = %e, "Ledger connection close failed");
            }
        }
    }
}

#[async_trait]
impl LedgerQueryClient for WebSocketLedgerClient {
    async fn query(&self, purpose: &str, command: Command, network: Network) -> QueryResponse {
        let started = Instant::now();
        let response = self.execute(&command, network).await;

        metrics::record_ledger_query(command.name(), response.outcome_label(), started.elapsed());
        match &response {
            QueryResponse::Success(_) => {
                tracing::debug!(purpose, command = command.name(), network = %network, "Ledger query succeeded")
            }
            QueryResponse::Failure { reason } => {
                tracing::warn!(purpose, command = command.name(), network = %network, reason = %reason, "Ledger query failed")
            }
            QueryResponse::Malformed => {
                tracing::warn!(purpose, command = command.name(), network = %network, "Malformed ledger response")
            }
        }

        response
    }
}

impl std::fmt::Debug for WebSocketLedgerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketLedgerClient")
            .field("mainnet_url", &self.config.mainnet_url)
            .field("testnet_url", &self.config.testnet_url)
            .field("timeout_secs", &self.config.request_timeout_secs)
            .finish()
    }
}

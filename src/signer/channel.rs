//! Per-request notification channels.
//!
//! # Responsibilities
//! - Open the status channel the signer returned for a request
//! - Yield raw text frames until the channel ends
//! - Guarantee each opened channel is closed exactly once
//!
//! # Design Decisions
//! - Channels are request-scoped: opened when a wait starts, closed when it ends
//! - [`ChannelLease`] owns the channel; an explicit `close` and `Drop` share one `take`

use async_trait::async_trait;
use futures_util::StreamExt;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

use crate::observability::metrics;
use crate::resilience::timeouts::with_timeout;
use crate::signer::types::{ChannelError, RequestHandle};

/// An open notification channel.
#[async_trait]
pub trait NotificationChannel: Send {
    /// Next text frame, or `None` once the channel has ended.
    async fn next_message(&mut self) -> Option<Result<String, ChannelError>>;

    async fn close(&mut self);
}

/// Opens notification channels for request handles.
#[async_trait]
pub trait NotificationSource: Send + Sync {
    async fn open(&self, handle: &RequestHandle) -> Result<Box<dyn NotificationChannel>, ChannelError>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens the signer's WebSocket status channels.
#[derive(Debug, Clone)]
pub struct WebSocketNotificationSource {
    connect_timeout: Duration,
}

impl WebSocketNotificationSource {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl NotificationSource for WebSocketNotificationSource {
    async fn open(&self, handle: &RequestHandle) -> Result<Box<dyn NotificationChannel>, ChannelError> {
        let connect = connect_async(handle.status_url.as_str());
        let (stream, _) = with_timeout(self.connect_timeout, connect)
            .await
            .map_err(|_| ChannelError::Connect("connect timed out".to_string()))?
            .map_err(|e| ChannelError::Connect(e.to_string()))?;

        tracing::debug!(request_id = %handle.id, "Notification channel connected");
        Ok(Box::new(WebSocketChannel { stream }))
    }
}

struct WebSocketChannel {
    stream: WsStream,
}

#[async_trait]
impl NotificationChannel for WebSocketChannel {
    async fn next_message(&mut self) -> Option<Result<String, ChannelError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.to_string())),
                Ok(Message::Close(_)) => return None,
                Ok(_) => continue,
                Err(e) => return Some(Err(ChannelError::Transport(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!(error = %e, "Notification channel close failed");
        }
    }
}

/// Exclusive ownership of one open channel.
pub struct ChannelLease {
    request_id: Uuid,
    channel: Option<Box<dyn NotificationChannel>>,
}

impl ChannelLease {
    pub fn new(request_id: Uuid, channel: Box<dyn NotificationChannel>) -> Self {
        metrics::record_channel_open();
        Self {
            request_id,
            channel: Some(channel),
        }
    }

    pub async fn next_message(&mut self) -> Option<Result<String, ChannelError>> {
        match self.channel.as_mut() {
            Some(channel) => channel.next_message().await,
            None => None,
        }
    }

    /// Close the channel. Later calls do nothing.
    pub async fn close(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close().await;
            metrics::record_channel_close();
            tracing::debug!(request_id = %self.request_id, "Notification channel closed");
        }
    }

    pub fn is_open(&self) -> bool {
        self.channel.is_some()
    }
}

impl Drop for ChannelLease {
    fn drop(&mut self) {
        let Some(mut channel) = self.channel.take() else {
            return;
        };
        metrics::record_channel_close();

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let request_id = self.request_id;
                runtime.spawn(async move {
                    channel.close().await;
                    tracing::debug!(request_id = %request_id, "Notification channel closed on drop");
                });
            }
            Err(_) => {
                tracing::debug!(request_id = %self.request_id, "No runtime to close notification channel");
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedSource;
    use super::*;
    use tokio::time::Instant;

    fn handle() -> RequestHandle {
        RequestHandle {
            id: Uuid::new_v4(),
            status_url: "ws://unused".to_string(),
            sign_url: None,
            expires_at: Instant::now() + Duration::from_secs(120),
            kind: "sign_in",
        }
    }

    #[tokio::test]
    async fn test_lease_closes_once() {
        let source = ScriptedSource::new();
        let handle = handle();
        let mut lease = ChannelLease::new(handle.id, source.open(&handle).await.unwrap());

        lease.close().await;
        lease.close().await;
        drop(lease);
        tokio::task::yield_now().await;

        assert_eq!(source.closes(), 1);
    }

    #[tokio::test]
    async fn test_lease_drop_closes() {
        let source = ScriptedSource::new();
        let handle = handle();
        let lease = ChannelLease::new(handle.id, source.open(&handle).await.unwrap());
        assert!(lease.is_open());

        drop(lease);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(source.closes(), 1);
    }

    #[tokio::test]
    async fn test_queued_frames_delivered_on_open() {
        let source = ScriptedSource::new();
        let handle = handle();
        source.push(handle.id, "first");

        let mut lease = ChannelLease::new(handle.id, source.open(&handle).await.unwrap());
        source.push(handle.id, "second");

        assert_eq!(lease.next_message().await, Some(Ok("first".to_string())));
        assert_eq!(lease.next_message().await, Some(Ok("second".to_string())));

        source.hang_up(handle.id);
        assert_eq!(lease.next_message().await, None);
        lease.close().await;
    }

    #[tokio::test]
    async fn test_websocket_source_connect_failure() {
        let source = WebSocketNotificationSource::new(Duration::from_secs(1));
        let mut handle = handle();
        handle.status_url = "ws://127.0.0.1:1/status".to_string();

        assert!(matches!(source.open(&handle).await, Err(ChannelError::Connect(_))));
    }
}

//! Server-to-client transports attached to MCP sessions.
//!
//! Requests are answered inline on the POST that carried them. A transport
//! is only needed for messages the server originates, such as
//! `notifications/tools/list_changed`, and is opened by the client with
//! `GET /mcp`.

use std::fmt;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

/// Buffered server-originated messages per stream.
pub const SSE_CHANNEL_CAPACITY: usize = 64;

/// Wire mechanism of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportType {
    /// Server-Sent Events stream on `GET /mcp`.
    Sse,
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportType::Sse => write!(f, "sse"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("transport is closed")]
    Closed,

    #[error("transport buffer is full")]
    Full,
}

/// Outbound half of a session stream.
pub trait SessionTransport: Send + Sync {
    fn transport_type(&self) -> TransportType;

    /// Queue a message for the client.
    fn send(&self, message: Value) -> Result<(), TransportError>;

    /// Close the stream; the client sees end-of-stream.
    fn close(&self) -> Result<(), TransportError>;

    fn is_closed(&self) -> bool;
}

/// SSE transport backed by a bounded channel; the HTTP layer drains the
/// receiver into the response stream.
pub struct SseTransport {
    sender: Mutex<Option<mpsc::Sender<Value>>>,
}

impl fmt::Debug for SseTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SseTransport")
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl SseTransport {
    /// A transport and the receiver its messages arrive on.
    pub fn channel() -> (Self, mpsc::Receiver<Value>) {
        let (sender, receiver) = mpsc::channel(SSE_CHANNEL_CAPACITY);
        (
            Self {
                sender: Mutex::new(Some(sender)),
            },
            receiver,
        )
    }
}

impl SessionTransport for SseTransport {
    fn transport_type(&self) -> TransportType {
        TransportType::Sse
    }

    fn send(&self, message: Value) -> Result<(), TransportError> {
        let guard = self.sender.lock();
        let sender = guard.as_ref().ok_or(TransportError::Closed)?;
        sender.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TransportError::Full,
            mpsc::error::TrySendError::Closed(_) => TransportError::Closed,
        })
    }

    fn close(&self) -> Result<(), TransportError> {
        self.sender.lock().take().map(drop).ok_or(TransportError::Closed)
    }

    fn is_closed(&self) -> bool {
        self.sender.lock().as_ref().map_or(true, mpsc::Sender::is_closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_send_and_close() {
        let (transport, mut receiver) = SseTransport::channel();
        assert_eq!(transport.transport_type().to_string(), "sse");
        assert!(!transport.is_closed());

        transport.send(json!({"n": 1})).unwrap();
        assert_eq!(receiver.recv().await, Some(json!({"n": 1})));

        transport.close().unwrap();
        assert!(transport.is_closed());
        assert_eq!(receiver.recv().await, None);
        assert_eq!(transport.send(json!({})), Err(TransportError::Closed));
        assert_eq!(transport.close(), Err(TransportError::Closed));
    }

    #[test]
    fn test_dropped_receiver_reads_as_closed() {
        let (transport, receiver) = SseTransport::channel();
        drop(receiver);
        assert!(transport.is_closed());
        assert_eq!(transport.send(json!({})), Err(TransportError::Closed));
    }
}

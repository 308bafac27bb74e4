//! MCP session table.
//!
//! A session is created by a successful `initialize` and addressed by the
//! `Mcp-Session-Id` header afterwards. Sessions idle longer than the
//! timeout are evicted on the next lookup of that id, and swept from the
//! whole table whenever a new session is created. A session whose attached
//! transport has closed (the client dropped its event stream) is removed
//! the same way, and as soon as a push to it fails.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::Value;
use uuid::Uuid;

use super::server::McpServer;
use super::transport::{SessionTransport, TransportError};
use crate::auth::Auth;

/// Idle sessions are evicted after this long without a request.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// One client's MCP session.
#[derive(Clone)]
pub struct McpSession {
    pub id: String,
    pub auth: Auth,
    pub server: Arc<McpServer>,
    pub transport: Option<Arc<dyn SessionTransport>>,
    pub created_at: Instant,
    pub last_used: Instant,
}

impl std::fmt::Debug for McpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpSession")
            .field("id", &self.id)
            .field("principal", &self.auth.principal())
            .field("has_transport", &self.transport.is_some())
            .finish()
    }
}

impl McpSession {
    fn is_expired(&self, now: Instant, idle_timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_used) > idle_timeout
    }

    fn has_closed_transport(&self) -> bool {
        self.transport
            .as_ref()
            .is_some_and(|transport| transport.is_closed())
    }

    fn is_stale(&self, now: Instant, idle_timeout: Duration) -> bool {
        self.is_expired(now, idle_timeout) || self.has_closed_transport()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),
}

/// Concurrent map of session id to session.
#[derive(Debug)]
pub struct SessionManager {
    sessions: DashMap<String, McpSession>,
    idle_timeout: Duration,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Create a session with a fresh random id.
    pub fn create_session(&self, auth: Auth, server: Arc<McpServer>) -> McpSession {
        self.sweep_expired();

        let now = Instant::now();
        let session = McpSession {
            id: Uuid::new_v4().simple().to_string(),
            auth,
            server,
            transport: None,
            created_at: now,
            last_used: now,
        };
        self.sessions.insert(session.id.clone(), session.clone());
        tracing::info!(
            session_id = %session.id,
            principal = %session.auth.principal(),
            "Created MCP session"
        );
        session
    }

    /// Look up a live session and refresh its idle clock.
    ///
    /// An expired session, or one whose transport has closed, is evicted
    /// and reported as absent.
    pub fn get_session(&self, id: &str) -> Option<McpSession> {
        let now = Instant::now();
        {
            let mut entry = self.sessions.get_mut(id)?;
            if !entry.is_stale(now, self.idle_timeout) {
                entry.last_used = now;
                return Some(entry.clone());
            }
        }

        let idle_timeout = self.idle_timeout;
        if let Some((_, session)) = self
            .sessions
            .remove_if(id, |_, session| session.is_stale(now, idle_timeout))
        {
            tracing::debug!(session_id = %id, "Evicted stale MCP session");
            close_transport(&session);
        }
        None
    }

    /// Remove a session, closing its transport. Returns whether it existed.
    pub fn delete_session(&self, id: &str) -> bool {
        match self.sessions.remove(id) {
            Some((_, session)) => {
                close_transport(&session);
                tracing::info!(session_id = %id, "Deleted MCP session");
                true
            }
            None => false,
        }
    }

    /// Attach a server-to-client transport, replacing (and closing) any
    /// previous one.
    pub fn set_transport(
        &self,
        id: &str,
        transport: Arc<dyn SessionTransport>,
    ) -> Result<(), SessionError> {
        let previous = {
            let mut entry = self
                .sessions
                .get_mut(id)
                .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
            entry.last_used = Instant::now();
            entry.transport.replace(transport)
        };
        if let Some(previous) = previous {
            if let Err(err) = previous.close() {
                tracing::debug!(session_id = %id, error = %err, "Replaced transport was already closed");
            }
        }
        Ok(())
    }

    /// Push a message to one session's transport.
    pub fn notify(&self, id: &str, message: Value) -> Result<bool, SessionError> {
        let transport = self
            .sessions
            .get(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?
            .transport
            .clone();
        Ok(match transport {
            Some(transport) => self.deliver(id, transport.as_ref(), message),
            None => false,
        })
    }

    /// Push a message to every session with an open transport.
    /// Returns how many sessions it was delivered to.
    pub fn broadcast(&self, message: &Value) -> usize {
        let targets: Vec<(String, Arc<dyn SessionTransport>)> = self
            .sessions
            .iter()
            .filter_map(|entry| {
                entry
                    .transport
                    .clone()
                    .map(|transport| (entry.id.clone(), transport))
            })
            .collect();

        targets
            .iter()
            .filter(|(id, transport)| self.deliver(id, transport.as_ref(), message.clone()))
            .count()
    }

    /// Send one message, dropping the session if its transport has closed.
    fn deliver(&self, id: &str, transport: &dyn SessionTransport, message: Value) -> bool {
        match transport.send(message) {
            Ok(()) => true,
            Err(TransportError::Closed) => {
                // A stream attached since the failed send keeps the session.
                if self
                    .sessions
                    .remove_if(id, |_, session| session.has_closed_transport())
                    .is_some()
                {
                    tracing::debug!(session_id = %id, "Removed MCP session with closed transport");
                }
                false
            }
            Err(err) => {
                tracing::warn!(session_id = %id, error = %err, "Failed to deliver session message");
                false
            }
        }
    }

    /// Drop every expired session and every session whose transport closed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let idle_timeout = self.idle_timeout;
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| entry.is_stale(now, idle_timeout))
            .map(|entry| entry.key().clone())
            .collect();

        expired
            .iter()
            .filter_map(|id| {
                self.sessions
                    .remove_if(id, |_, session| session.is_stale(now, idle_timeout))
            })
            .map(|(id, session)| {
                tracing::debug!(session_id = %id, "Swept idle MCP session");
                close_transport(&session);
            })
            .count()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Best-effort close; failures are logged and otherwise ignored.
fn close_transport(session: &McpSession) {
    if let Some(transport) = &session.transport {
        if let Err(err) = transport.close() {
            tracing::warn!(session_id = %session.id, error = %err, "Failed to close session transport");
        }
    }
}

//! Model Context Protocol (MCP) server.
//!
//! Projects every registered resource as an MCP tool and serves the
//! protocol over streamable HTTP. All tool calls run through the same
//! authorization gate as the REST surface.
//!
//! - [`jsonrpc`]: envelope classification and response types
//! - [`version`]: protocol version negotiation and header names
//! - [`tools`]: resource to tool projection
//! - [`server`]: per-session method dispatch
//! - [`session`]: session table with idle eviction
//! - [`transport`]: server-to-client streams for notifications

pub mod jsonrpc;
pub mod server;
pub mod session;
pub mod tools;
pub mod transport;
pub mod version;

pub use jsonrpc::{classify, JsonRpcError, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
pub use server::McpServer;
pub use session::{McpSession, SessionError, SessionManager};
pub use tools::{list_tools, Tool};
pub use transport::{SessionTransport, SseTransport, TransportError, TransportType};
pub use version::{ProtocolVersions, MCP_PROTOCOL_VERSION_HEADER, MCP_SESSION_ID_HEADER};

/// Method of the notification sent when the tool list changes.
pub const TOOLS_LIST_CHANGED: &str = "notifications/tools/list_changed";

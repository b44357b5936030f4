//! Server configuration
//!
//! Binding configuration shared by the HTTP server and the WebSocket
//! price stream. Each port is optional so a process can run only the
//! protocols it needs.

/// Default HTTP port
pub const DEFAULT_HTTP_PORT: u16 = 8080;
/// Default WebSocket port
pub const DEFAULT_WS_PORT: u16 = 7080;

/// Server configuration for both protocols
///
/// # Example
///
/// ```
/// use server::config::ServerConfig;
///
/// // Both protocols
/// let config = ServerConfig::new("0.0.0.0", 8080, 7080);
///
/// // HTTP only
/// let config = ServerConfig::http_only("127.0.0.1", 8080);
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// HTTP port, or `None` to disable the HTTP server
    pub http_port: Option<u16>,
    /// WebSocket port, or `None` to disable the price stream
    pub websocket_port: Option<u16>,
}

impl ServerConfig {
    /// Create a configuration with both protocols enabled
    pub fn new(host: impl Into<String>, http_port: u16, websocket_port: u16) -> Self {
        Self {
            host: host.into(),
            http_port: Some(http_port),
            websocket_port: Some(websocket_port),
        }
    }

    /// Create an HTTP-only configuration
    pub fn http_only(host: impl Into<String>, http_port: u16) -> Self {
        Self {
            host: host.into(),
            http_port: Some(http_port),
            websocket_port: None,
        }
    }

    /// Create a WebSocket-only configuration
    pub fn websocket_only(host: impl Into<String>, websocket_port: u16) -> Self {
        Self {
            host: host.into(),
            http_port: None,
            websocket_port: Some(websocket_port),
        }
    }

    /// Returns true if at least one protocol is enabled
    pub fn has_servers(&self) -> bool {
        self.http_port.is_some() || self.websocket_port.is_some()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new("0.0.0.0", DEFAULT_HTTP_PORT, DEFAULT_WS_PORT)
    }
}

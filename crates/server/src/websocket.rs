//! WebSocket price stream using Tokio-Tungstenite
//!
//! Each connection registers with the [`BroadcastHub`] and receives push
//! frames through its hub channel. Inbound traffic is limited to small
//! control frames that adjust the subscription (topics, country filter)
//! or heartbeat.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use common::Country;

use crate::broadcast::{BroadcastHub, SubscriberId};
use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::traits::Server;

/// Control frames accepted from stream clients
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum ControlFrame {
    Subscribe { topics: Vec<String> },
    Unsubscribe { topics: Vec<String> },
    SetCountry { country: Country },
    Ping,
}

/// Frames pushed to stream clients outside the price fan-out
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamFrame {
    #[serde(rename_all = "camelCase")]
    Connected { client_id: SubscriberId },
    Pong,
    #[serde(rename_all = "camelCase")]
    Error { message: String },
}

impl StreamFrame {
    fn to_message(&self) -> Option<Message> {
        match serde_json::to_string(self) {
            Ok(text) => Some(Message::Text(text)),
            Err(e) => {
                warn!(%e, "Failed to serialize stream frame");
                None
            }
        }
    }
}

/// WebSocket server pushing price updates to connected clients
///
/// # Example
///
/// ```ignore
/// use server::{PriceStreamServer, ServerConfig, Server, ServerExt};
///
/// let hub = Arc::new(BroadcastHub::new());
/// let config = ServerConfig::websocket_only("127.0.0.1", 7080);
/// let server = PriceStreamServer::new(config, hub);
/// server.run_with_ctrl_c().await?;
/// ```
#[derive(Clone)]
pub struct PriceStreamServer {
    config: ServerConfig,
    hub: Arc<BroadcastHub>,
    running: Arc<AtomicBool>,
    bound_addr: Arc<RwLock<Option<SocketAddr>>>,
}

impl PriceStreamServer {
    pub fn new(config: ServerConfig, hub: Arc<BroadcastHub>) -> Self {
        Self {
            config,
            hub,
            running: Arc::new(AtomicBool::new(false)),
            bound_addr: Arc::new(RwLock::new(None)),
        }
    }

    /// Get the bind address, returning an error if WebSocket port is not configured
    fn bind_addr(&self) -> Result<SocketAddr> {
        let port = self
            .config
            .websocket_port
            .ok_or_else(|| ServerError::ConfigError("WebSocket port not configured".into()))?;

        format!("{}:{}", self.config.host, port)
            .parse()
            .map_err(|_| ServerError::InvalidAddress(format!("{}:{}", self.config.host, port)))
    }

    /// Get the broadcast hub shared with the scheduler
    pub fn hub(&self) -> Arc<BroadcastHub> {
        Arc::clone(&self.hub)
    }

    /// Apply a parsed control frame, returning an immediate reply if any
    fn apply_control(&self, client_id: SubscriberId, frame: ControlFrame) -> Option<StreamFrame> {
        match frame {
            ControlFrame::Subscribe { topics } => {
                debug!(client = %client_id, ?topics, "Stream subscribe");
                self.hub.subscribe(client_id, &topics);
                None
            }
            ControlFrame::Unsubscribe { topics } => {
                debug!(client = %client_id, ?topics, "Stream unsubscribe");
                self.hub.unsubscribe(client_id, &topics);
                None
            }
            ControlFrame::SetCountry { country } => {
                debug!(client = %client_id, %country, "Stream country filter set");
                self.hub.set_country(client_id, Some(country));
                None
            }
            ControlFrame::Ping => Some(StreamFrame::Pong),
        }
    }

    /// Handle a single WebSocket connection until disconnect or shutdown
    async fn handle_connection(
        &self,
        stream: TcpStream,
        peer_addr: SocketAddr,
        conn_token: CancellationToken,
    ) -> Result<()> {
        let ws_stream = accept_async(stream).await.map_err(ServerError::WebSocket)?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        let client_id = self.hub.register(tx);

        debug!(client = %client_id, %peer_addr, "Stream client connected");

        // Greeting carries the opaque client id
        if let Some(msg) = (StreamFrame::Connected { client_id }).to_message() {
            if let Err(e) = ws_sender.send(msg).await {
                warn!(client = %client_id, %e, "Failed to send connected frame");
                self.hub.unregister(client_id);
                return Ok(());
            }
        }

        loop {
            tokio::select! {
                _ = conn_token.cancelled() => {
                    debug!(client = %client_id, "Connection closing due to server shutdown");
                    let _ = ws_sender.send(Message::Close(None)).await;
                    break;
                }

                // Push frames from the hub (price updates)
                pushed = rx.recv() => {
                    match pushed {
                        Some(msg) => {
                            if let Err(e) = ws_sender.send(msg).await {
                                debug!(client = %client_id, %e, "Push failed, dropping connection");
                                break;
                            }
                        }
                        None => break,
                    }
                }

                // Control frames from the client
                incoming = ws_receiver.next() => {
                    match incoming {
                        Some(Ok(Message::Text(text))) => {
                            let reply = match serde_json::from_str::<ControlFrame>(&text) {
                                Ok(frame) => self.apply_control(client_id, frame),
                                Err(_) => Some(StreamFrame::Error {
                                    message: "Unrecognized control frame".to_string(),
                                }),
                            };
                            if let Some(msg) = reply.and_then(|f| f.to_message()) {
                                if let Err(e) = ws_sender.send(msg).await {
                                    debug!(client = %client_id, %e, "Reply failed, dropping connection");
                                    break;
                                }
                            }
                        }
                        Some(Ok(Message::Ping(payload))) => {
                            if ws_sender.send(Message::Pong(payload)).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(msg)) if msg.is_close() => {
                            debug!(client = %client_id, "Stream client disconnected gracefully");
                            break;
                        }
                        Some(Ok(_)) => {
                            // Binary and pong frames are ignored
                        }
                        Some(Err(e)) => {
                            debug!(client = %client_id, %e, "WebSocket error");
                            break;
                        }
                        None => {
                            debug!(client = %client_id, "WebSocket stream ended");
                            break;
                        }
                    }
                }
            }
        }

        self.hub.unregister(client_id);
        debug!(client = %client_id, "Stream client closed");
        Ok(())
    }
}

#[async_trait]
impl Server for PriceStreamServer {
    fn name(&self) -> &str {
        "price-stream"
    }

    fn address(&self) -> Option<SocketAddr> {
        *self.bound_addr.read()
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn run(&self, shutdown_token: CancellationToken) -> Result<()> {
        let addr = self.bind_addr()?;

        info!(%addr, "Starting WebSocket price stream");

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::bind(addr.to_string(), e))?;

        let local_addr = listener.local_addr().map_err(ServerError::Io)?;
        *self.bound_addr.write() = Some(local_addr);

        info!(%local_addr, "WebSocket price stream listening");

        self.running.store(true, Ordering::SeqCst);

        // Track connection tasks for graceful shutdown
        let mut connection_handles: Vec<tokio::task::JoinHandle<()>> = Vec::new();

        loop {
            tokio::select! {
                _ = shutdown_token.cancelled() => {
                    info!("WebSocket price stream received shutdown signal");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let server = self.clone();
                            // Child token so server shutdown closes every connection
                            let conn_token = shutdown_token.child_token();

                            let handle = tokio::spawn(async move {
                                if let Err(e) = server
                                    .handle_connection(stream, peer_addr, conn_token)
                                    .await
                                {
                                    error!(%peer_addr, %e, "WebSocket connection error");
                                }
                            });

                            connection_handles.push(handle);
                            connection_handles.retain(|h| !h.is_finished());
                        }
                        Err(e) => {
                            error!(%e, "Failed to accept WebSocket connection");
                        }
                    }
                }
            }
        }

        // Graceful shutdown: wait for all connections to close
        let connection_count = connection_handles.len();
        if connection_count > 0 {
            info!(connection_count, "Waiting for active stream connections to close...");

            let timeout = tokio::time::timeout(
                std::time::Duration::from_secs(10),
                futures::future::join_all(connection_handles),
            );

            match timeout.await {
                Ok(_) => {
                    info!("All stream connections closed gracefully");
                }
                Err(_) => {
                    warn!("Timed out waiting for stream connections to close");
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        *self.bound_addr.write() = None;

        info!("WebSocket price stream shutdown complete");

        Ok(())
    }
}

//! HTTP server: configuration, accept loop, idle reaper
//!
//! Binds a `TcpListener` and serves each connection over hyper http1. One
//! path (`/mcp` by default) carries the whole protocol; everything else is
//! 404. A background reaper terminates sessions idle past the configured
//! timeout.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use strix_mcp_server::McpServer;

use crate::Result;
use crate::handler::{McpBody, McpHttpHandler};

/// Configuration for the HTTP MCP server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_address: SocketAddr,
    /// Path for the MCP endpoint
    pub mcp_path: String,
    /// Maximum request body size
    pub max_body_size: usize,
    /// Idle lifetime of a session; the reaper removes anything older
    pub session_timeout: Duration,
    /// How often the reaper wakes
    pub cleanup_interval: Duration,
    /// SSE queue poll window; each expiry emits a keep-alive ping
    pub sse_poll_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8000".parse().unwrap(),
            mcp_path: "/mcp".to_string(),
            max_body_size: 1024 * 1024, // 1MB
            session_timeout: Duration::from_secs(86_400),
            cleanup_interval: Duration::from_secs(300),
            sse_poll_timeout: Duration::from_secs(60),
        }
    }
}

/// HTTP transport for an [`McpServer`]
pub struct HttpServer {
    handler: McpHttpHandler,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl HttpServer {
    pub fn new(config: ServerConfig, server: McpServer) -> Self {
        Self {
            handler: McpHttpHandler::new(config, server),
            background: Mutex::new(Vec::new()),
        }
    }

    pub fn with_defaults(server: McpServer) -> Self {
        Self::new(ServerConfig::default(), server)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.handler.config
    }

    /// Serve connections until the task is cancelled
    pub async fn run(&self) -> Result<()> {
        self.start_background_tasks();

        let config = self.handler.config.clone();
        let listener = TcpListener::bind(&config.bind_address).await?;
        info!("HTTP MCP server listening on {}", config.bind_address);
        info!("MCP endpoint available at: {}", config.mcp_path);

        loop {
            let (stream, peer_addr) = listener.accept().await?;
            debug!("new connection from {}", peer_addr);

            let handler = self.handler.clone();
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service =
                    service_fn(move |req| handle_request(req, handler.clone()));

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    let err_str = err.to_string();
                    if err_str.contains("connection closed before message completed") {
                        debug!("client disconnected: {}", err);
                    } else {
                        error!("error serving connection: {}", err);
                    }
                }
            });
        }
    }

    /// Spawn the change-event bridge and the idle reaper
    fn start_background_tasks(&self) {
        let mut background = self.background.lock().unwrap_or_else(|e| e.into_inner());
        if !background.is_empty() {
            return;
        }
        background.push(self.handler.spawn_event_bridge());
        background.push(self.spawn_reaper());
    }

    /// Wake every `cleanup_interval` and drop sessions whose last activity
    /// is older than `session_timeout`. Survives iteration errors.
    fn spawn_reaper(&self) -> JoinHandle<()> {
        let sessions = Arc::clone(&self.handler.sessions);
        let cleanup_interval = self.handler.config.cleanup_interval;
        let session_timeout_ms = self.handler.config.session_timeout.as_millis() as u64;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(cleanup_interval);
            interval.tick().await; // the first tick fires immediately
            loop {
                interval.tick().await;
                let cutoff = crate::session::now_millis().saturating_sub(session_timeout_ms);
                let removed = sessions.remove_idle(cutoff).await;
                for session_id in &removed {
                    info!(session = %session_id, "removing stale session");
                }
            }
        })
    }

    /// Cancel background tasks and terminate every session
    pub async fn shutdown(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut background = self.background.lock().unwrap_or_else(|e| e.into_inner());
            background.drain(..).collect()
        };
        for handle in handles {
            handle.abort();
        }
        self.handler.sessions.terminate_all().await;
        info!("HTTP MCP server shut down");
    }
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    handler: McpHttpHandler,
) -> std::result::Result<Response<McpBody>, hyper::Error> {
    let path = req.uri().path().to_string();
    debug!("handling {} {}", req.method(), path);

    if path != handler.config.mcp_path {
        return Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(crate::handler::full_body("Not Found"))
            .unwrap());
    }

    match handler.handle_mcp_request(req).await {
        Ok(response) => Ok(response),
        Err(err) => {
            error!("request handling error: {}", err);
            Ok(Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(crate::handler::full_body(format!(
                    "Internal Server Error: {err}"
                )))
                .unwrap())
        }
    }
}

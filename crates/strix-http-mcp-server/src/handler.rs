//! HTTP request handler for the `/mcp` endpoint
//!
//! Three methods on one path: POST carries client JSON-RPC traffic, GET
//! subscribes the session to its SSE stream, DELETE tears the session
//! down. `initialize` is answered synchronously; every other request is
//! dispatched in a background task whose output lands on the session
//! queue.

use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use http_body_util::{BodyExt, Full};
use hyper::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use strix_mcp_protocol::{JsonRpcError, JsonRpcRequest};
use strix_mcp_server::McpServer;

use crate::server::ServerConfig;
use crate::session::{Session, SessionTable};
use crate::sse::{SseStreamBody, session_stream};
use crate::{Error, Result};

/// Header carrying the session id in both directions
pub const HEADER_SESSION_ID: &str = "Mcp-Session-Id";

/// Unified response body: plain payloads and SSE streams
pub type McpBody = http_body_util::combinators::UnsyncBoxBody<Bytes, std::convert::Infallible>;

pub(crate) fn full_body(payload: impl Into<Bytes>) -> McpBody {
    Full::new(payload.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

fn text_response(status: StatusCode, message: impl Into<Bytes>) -> Response<McpBody> {
    Response::builder()
        .status(status)
        .body(full_body(message))
        .unwrap()
}

fn json_response<T: Serialize>(status: StatusCode, payload: &T) -> Result<Response<McpBody>> {
    let body = serde_json::to_string(payload)?;
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(full_body(body))
        .map_err(Error::from)
}

/// HTTP handler binding an [`McpServer`] to the session table
#[derive(Clone)]
pub struct McpHttpHandler {
    pub(crate) config: ServerConfig,
    pub(crate) server: McpServer,
    pub(crate) sessions: Arc<SessionTable>,
}

impl McpHttpHandler {
    pub fn new(config: ServerConfig, server: McpServer) -> Self {
        Self {
            config,
            server,
            sessions: Arc::new(SessionTable::new()),
        }
    }

    /// Bridge the server's change fan-out into the session queues: every
    /// list-change event is copied onto every active session. Must run for
    /// the lifetime of the handler.
    pub fn spawn_event_bridge(&self) -> tokio::task::JoinHandle<()> {
        let mut events = self.server.subscribe();
        let sessions = Arc::clone(&self.sessions);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match serde_json::to_value(&event) {
                    Ok(message) => sessions.broadcast(message).await,
                    Err(err) => warn!("failed to serialize change event: {}", err),
                }
            }
        })
    }

    /// Handle one request to the MCP endpoint
    pub async fn handle_mcp_request<B>(&self, req: Request<B>) -> Result<Response<McpBody>>
    where
        B: http_body::Body,
        B::Error: std::fmt::Display,
    {
        match *req.method() {
            Method::POST => self.handle_post(req).await,
            Method::GET => Ok(self.handle_get(req).await),
            Method::DELETE => Ok(self.handle_delete(req).await),
            _ => Ok(Response::builder()
                .status(StatusCode::METHOD_NOT_ALLOWED)
                .header("Allow", "POST, GET, DELETE")
                .body(full_body("Method not allowed"))
                .unwrap()),
        }
    }

    fn session_id_header<B>(req: &Request<B>) -> Option<String> {
        req.headers()
            .get(HEADER_SESSION_ID)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    }

    /// POST: parse the envelope, then either answer `initialize` inline or
    /// schedule background dispatch and return 202.
    async fn handle_post<B>(&self, req: Request<B>) -> Result<Response<McpBody>>
    where
        B: http_body::Body,
        B::Error: std::fmt::Display,
    {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");
        if !content_type.contains("application/json") {
            return Ok(text_response(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "Content-Type must be application/json",
            ));
        }

        let session_id = Self::session_id_header(&req);

        let body = match req.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(err) => {
                warn!("failed to read request body: {}", err);
                return Ok(text_response(
                    StatusCode::BAD_REQUEST,
                    "Failed to read request body",
                ));
            }
        };
        if body.len() > self.config.max_body_size {
            warn!("request body too large: {} bytes", body.len());
            return Ok(text_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                "Request body too large",
            ));
        }

        let parsed: Value = match serde_json::from_slice(&body) {
            Ok(value) => value,
            Err(err) => {
                return json_response(
                    StatusCode::BAD_REQUEST,
                    &JsonRpcError::parse_error(format!("cannot parse request body: {err}")),
                );
            }
        };

        if parsed.is_array() {
            return json_response(
                StatusCode::BAD_REQUEST,
                &JsonRpcError::invalid_request(None, "batching is not supported"),
            );
        }

        let request: JsonRpcRequest = match serde_json::from_value(parsed) {
            Ok(request) => request,
            Err(err) => {
                return json_response(
                    StatusCode::BAD_REQUEST,
                    &JsonRpcError::invalid_request(None, format!("invalid request: {err}")),
                );
            }
        };
        if request.method.is_empty() {
            return json_response(
                StatusCode::BAD_REQUEST,
                &JsonRpcError::invalid_request(request.id, "method must not be empty"),
            );
        }

        debug!(method = %request.method, "received JSON-RPC request");

        if request.method == "initialize" {
            return self.handle_initialize_post(request, session_id).await;
        }

        let Some(session_id) = session_id else {
            return Ok(text_response(
                StatusCode::BAD_REQUEST,
                format!("{HEADER_SESSION_ID} is missing"),
            ));
        };
        let Some(session) = self.sessions.get(&session_id).await else {
            return Ok(text_response(
                StatusCode::NOT_FOUND,
                format!("session {session_id} is not found"),
            ));
        };

        session.touch();
        self.spawn_background_dispatch(session, request);

        Ok(Response::builder()
            .status(StatusCode::ACCEPTED)
            .body(full_body(Bytes::new()))
            .unwrap())
    }

    /// `initialize` is the one synchronous request: the first (and only)
    /// dispatched message becomes the HTTP body, and the session comes
    /// into existence as a side effect. A client-supplied id that already
    /// exists is reused, keeping repeated initialization idempotent.
    async fn handle_initialize_post(
        &self,
        request: JsonRpcRequest,
        session_id: Option<String>,
    ) -> Result<Response<McpBody>> {
        let session_id = session_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let session = self.sessions.get_or_create(&session_id).await;
        session.touch();

        let first = self.server.process_request(request).next().await;
        let Some(message) = first else {
            return Ok(text_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Initialization failed to produce response",
            ));
        };

        let body = serde_json::to_string(&message)?;
        Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, "application/json")
            .header(HEADER_SESSION_ID, session_id)
            .body(full_body(body))
            .map_err(Error::from)
    }

    /// Drive the dispatcher in the background, pushing every yielded item
    /// onto the session queue. Failures surface as an internal-error
    /// envelope on the same queue.
    fn spawn_background_dispatch(&self, session: Arc<Session>, request: JsonRpcRequest) {
        let server = self.server.clone();
        tokio::spawn(async move {
            let request_id = request.id.clone();
            let mut outbound = server.process_request(request);
            while let Some(message) = outbound.next().await {
                match serde_json::to_value(&message) {
                    Ok(value) => session.enqueue(value),
                    Err(err) => {
                        error!("background processing error: {}", err);
                        let fallback = JsonRpcError::internal_error(
                            request_id.clone(),
                            Some(format!("Internal processing error: {err}")),
                        );
                        if let Ok(value) = serde_json::to_value(&fallback) {
                            session.enqueue(value);
                        }
                    }
                }
            }
        });
    }

    /// GET: subscribe the session (created on demand) to its SSE stream
    async fn handle_get<B>(&self, req: Request<B>) -> Response<McpBody> {
        let session_id =
            Self::session_id_header(&req).unwrap_or_else(|| Uuid::new_v4().to_string());
        let session = self.sessions.get_or_create(&session_id).await;
        session.touch();

        debug!(session = %session_id, "sse stream opened");

        let stream = session_stream(session, self.config.sse_poll_timeout);
        Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .header(CONNECTION, "keep-alive")
            .header(HEADER_SESSION_ID, session_id)
            .body(SseStreamBody::new(stream).boxed_unsync())
            .unwrap()
    }

    /// DELETE: remove the session from the table and terminate it
    async fn handle_delete<B>(&self, req: Request<B>) -> Response<McpBody> {
        let Some(session_id) = Self::session_id_header(&req) else {
            return text_response(StatusCode::BAD_REQUEST, Bytes::new());
        };

        match self.sessions.remove(&session_id).await {
            Some(session) => {
                session.terminate();
                info!(session = %session_id, "session terminated");
                text_response(StatusCode::OK, Bytes::new())
            }
            None => text_response(
                StatusCode::NOT_FOUND,
                format!("session {session_id} is not found"),
            ),
        }
    }
}

//! Request dispatching
//!
//! Routes a parsed request to one of the fixed endpoints (status, long poll,
//! embedded assets, shared files, images) or — for any other path — to a
//! named method on the embedder-supplied [`RpcHandler`]. Every outcome,
//! including handler failure, becomes an HTTP response; nothing here
//! terminates the server.

use crate::config::ServerConfig;
use crate::events::PollBusy;
use crate::http::{Request, Response, Status};
use crate::session::{SessionRegistry, SESSION_COOKIE};
use serde_json::{json, Map, Value};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Path of the long-poll endpoint
pub const LONG_POLL_PATH: &str = "/events";

/// Path of the status endpoint
pub const STATUS_PATH: &str = "/status";

static INDEX_HTML: &[u8] = include_bytes!("assets/index.html");

/// Outcome of one RPC method call
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    #[error("{0}")]
    Failed(String),
}

/// The opaque collaborator behind every non-fixed path.
///
/// The path (minus its leading slash) is the method name; the request body
/// is a JSON object of named parameters.
pub trait RpcHandler: Send + Sync {
    fn call(&self, method: &str, params: &Map<String, Value>) -> Result<Value, RpcError>;
}

/// Routes requests to handlers
pub struct Dispatcher {
    config: ServerConfig,
    registry: Arc<SessionRegistry>,
    rpc: Arc<dyn RpcHandler>,
}

impl Dispatcher {
    pub fn new(
        config: ServerConfig,
        registry: Arc<SessionRegistry>,
        rpc: Arc<dyn RpcHandler>,
    ) -> Self {
        Dispatcher {
            config,
            registry,
            rpc,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Handle one request. `alive` reports whether the client is still
    /// connected; the long-poll wait consults it while blocked.
    pub fn handle(&self, request: &Request, alive: &dyn Fn() -> bool) -> Response {
        let path = request.path();
        log::debug!("{} {}", request.method(), path);

        match path {
            "/" | "/index.html" => static_asset(INDEX_HTML, "text/html"),
            STATUS_PATH => self.status(),
            LONG_POLL_PATH => self.long_poll(request, alive),
            _ if path.starts_with("/files/") => {
                self.shared_file(&path["/files/".len()..])
            }
            _ if path.starts_with("/image/") => {
                self.image_file(&path["/image/".len()..])
            }
            _ => self.rpc_call(request),
        }
    }

    /// `/status`: file-sharing flag, client count, per-session queue depth.
    fn status(&self) -> Response {
        let mut sessions = Map::new();
        for (id, queued) in self.registry.snapshot() {
            sessions.insert(id, json!(queued));
        }

        let body = json!({
            "fileSharingEnabled": self.config.file_sharing,
            "numberOfClients": self.registry.count(),
            "sessions": sessions,
        });

        json_response(Status::OK, &body)
    }

    /// `/events`: drain the session's queue, blocking up to the configured
    /// delay when it is empty. Sets the session cookie when the id was
    /// minted on this request.
    fn long_poll(&self, request: &Request, alive: &dyn Fn() -> bool) -> Response {
        let (session, minted) = self.registry.resolve(request.headers());

        let drained = match session.queue().wait_drain(
            self.config.poll_delay(),
            self.config.liveness_interval(),
            alive,
        ) {
            Ok(events) => events,
            Err(PollBusy) => {
                log::warn!("concurrent poll rejected for session {}", session.id());
                return text_response(
                    Status::CONFLICT,
                    "a poll is already blocked for this session",
                );
            }
        };
        session.touch();

        let body = match serde_json::to_value(&drained) {
            Ok(v) => v,
            Err(e) => return text_response(Status::INTERNAL_SERVER_ERROR, &e.to_string()),
        };
        let mut response = json_response(Status::OK, &body);
        if minted {
            response.headers_mut().insert(
                "Set-Cookie",
                format!("{}={}; Path={}", SESSION_COOKIE, session.id(), LONG_POLL_PATH),
            );
        }
        response
    }

    /// `/files/<path>`: files under the configured root, only when sharing
    /// is enabled.
    fn shared_file(&self, rel: &str) -> Response {
        if !self.config.file_sharing {
            return text_response(Status::FORBIDDEN, "file sharing is disabled");
        }
        match &self.config.file_root {
            Some(root) => serve_file(root, rel),
            None => text_response(Status::FORBIDDEN, "file sharing is disabled"),
        }
    }

    /// `/image/<name>`: temp image files handed over by the embedder.
    fn image_file(&self, rel: &str) -> Response {
        match &self.config.image_dir {
            Some(dir) => serve_file(dir, rel),
            None => text_response(Status::NOT_FOUND, "no image directory configured"),
        }
    }

    /// Any other path: the path is a method name, the body a JSON object of
    /// named parameters.
    fn rpc_call(&self, request: &Request) -> Response {
        let method = request.path().trim_start_matches('/');

        let params = if request.body().is_empty() {
            Map::new()
        } else {
            match serde_json::from_slice::<Value>(request.body()) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    return text_response(
                        Status::BAD_REQUEST,
                        "request body must be a JSON object",
                    )
                }
                Err(e) => return text_response(Status::BAD_REQUEST, &e.to_string()),
            }
        };

        match self.rpc.call(method, &params) {
            Ok(result) => json_response(Status::OK, &result),
            Err(RpcError::UnknownMethod(name)) => {
                text_response(Status::NOT_FOUND, &format!("unknown method: {}", name))
            }
            Err(RpcError::Failed(message)) => {
                log::warn!("handler {} failed: {}", method, message);
                text_response(Status::INTERNAL_SERVER_ERROR, &message)
            }
        }
    }
}

fn json_response(status: Status, body: &Value) -> Response {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(body.to_string().into_bytes())
        .build()
}

fn text_response(status: Status, message: &str) -> Response {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain")
        .body(message.as_bytes().to_vec())
        .build()
}

fn static_asset(bytes: &[u8], content_type: &str) -> Response {
    Response::builder()
        .status(Status::OK)
        .header("Content-Type", content_type)
        .body(bytes.to_vec())
        .build()
}

/// Serve one file under `root`, rejecting traversal out of it.
fn serve_file(root: &Path, rel: &str) -> Response {
    let rel_path = PathBuf::from(rel);
    let traverses = rel_path
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if rel.is_empty() || traverses {
        return text_response(Status::NOT_FOUND, "not found");
    }

    let full = root.join(rel_path);
    match std::fs::read(&full) {
        Ok(bytes) => static_asset(&bytes, content_type_for(rel)),
        Err(e) => {
            log::debug!("file {} not served: {}", full.display(), e);
            text_response(Status::NOT_FOUND, "not found")
        }
    }
}

/// Content type inferred from the extension; everything else is served as
/// an octet stream.
fn content_type_for(path: &str) -> &'static str {
    match Path::new(path).extension().and_then(|e| e.to_str()) {
        Some("htm") | Some("html") => "text/html",
        Some("css") => "text/css",
        Some("js") => "text/javascript",
        _ => "application/octet-stream",
    }
}

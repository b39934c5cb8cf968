//! pollbox - embedded long-polling HTTP server
//!
//! A small blocking HTTP/1.x server for embedding in a host application.
//! Clients are tracked with cookie-carried sessions; each session owns a
//! FIFO queue of pending event notifications drained through a long-poll
//! endpoint. Any path outside the fixed endpoint set is forwarded to an
//! embedder-supplied RPC handler as a named method call with JSON
//! parameters.
//!
//! # Example
//!
//! ```no_run
//! use pollbox::config::ServerConfig;
//! use pollbox::dispatch::{RpcError, RpcHandler};
//! use pollbox::events::Event;
//! use pollbox::server::Server;
//! use serde_json::{json, Map, Value};
//! use std::sync::Arc;
//!
//! struct Player;
//!
//! impl RpcHandler for Player {
//!     fn call(&self, method: &str, _params: &Map<String, Value>) -> Result<Value, RpcError> {
//!         match method {
//!             "Player_GetVolume" => Ok(json!(42)),
//!             other => Err(RpcError::UnknownMethod(other.to_string())),
//!         }
//!     }
//! }
//!
//! let server = Server::bind(ServerConfig::default(), Arc::new(Player)).unwrap();
//! let registry = server.registry();
//! let handle = server.spawn();
//!
//! // Notification producer: wake every polling client
//! registry.broadcast(&Event::new("TrackChanged", vec![json!("file.mp3")]));
//! # drop(handle);
//! ```

pub mod config;
pub mod dispatch;
pub mod events;
pub mod http;
pub mod server;
pub mod session;

pub use config::ServerConfig;
pub use dispatch::{Dispatcher, RpcError, RpcHandler};
pub use events::{Event, EventQueue};
pub use server::{Server, ServerHandle};
pub use session::{Session, SessionRegistry, SESSION_COOKIE};

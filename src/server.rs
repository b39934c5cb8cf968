//! Accept loop and connection workers
//!
//! One worker thread per accepted connection, blocking I/O throughout. The
//! listener itself is non-blocking so the loop can observe the shutdown
//! flag; workers are detached and finish their single request/response
//! cycle on their own.

use crate::config::ServerConfig;
use crate::dispatch::{Dispatcher, RpcHandler};
use crate::http::transport::TransportOps;
use crate::http::{Error, HttpConn, Result, Status, TcpTransport};
use crate::session::SessionRegistry;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const ACCEPT_IDLE_SLEEP: Duration = Duration::from_millis(10);
const EVICTION_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// The long-polling HTTP server
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: ServerConfig,
    dispatcher: Arc<Dispatcher>,
    registry: Arc<SessionRegistry>,
    shutdown: Arc<AtomicBool>,
}

impl Server {
    /// Bind the listener and prepare the dispatcher. Does not accept yet;
    /// call [`run`](Server::run) or [`spawn`](Server::spawn).
    pub fn bind(config: ServerConfig, rpc: Arc<dyn RpcHandler>) -> Result<Self> {
        let socket = Socket::new(
            Domain::for_address(config.bind_addr),
            Type::STREAM,
            Some(Protocol::TCP),
        )?;
        socket.set_reuse_address(true)?;
        socket.bind(&config.bind_addr.into())?;
        socket.listen(128)?;
        socket.set_nonblocking(true)?;

        let listener: TcpListener = socket.into();
        let local_addr = listener.local_addr()?;

        let registry = Arc::new(SessionRegistry::new());
        let dispatcher = Arc::new(Dispatcher::new(
            config.clone(),
            Arc::clone(&registry),
            rpc,
        ));

        log::info!("listening on {}", local_addr);

        Ok(Server {
            listener,
            local_addr,
            config,
            dispatcher,
            registry,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// The bound address (useful when binding to port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The session registry; the notification producer enqueues through it.
    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Run the accept loop on the calling thread until shut down
    pub fn run(self) {
        let mut last_eviction = Instant::now();

        while !self.shutdown.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    log::debug!("accepted connection from {}", peer);
                    let dispatcher = Arc::clone(&self.dispatcher);
                    let timeout = self.config.io_timeout();
                    thread::spawn(move || handle_connection(stream, dispatcher, timeout));
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_IDLE_SLEEP);
                }
                Err(e) => {
                    log::warn!("accept failed: {}", e);
                    thread::sleep(ACCEPT_IDLE_SLEEP);
                }
            }

            if let Some(max_idle) = self.config.session_idle() {
                if last_eviction.elapsed() >= EVICTION_CHECK_INTERVAL {
                    self.registry.evict_idle(max_idle);
                    last_eviction = Instant::now();
                }
            }
        }

        log::info!("server on {} stopped", self.local_addr);
    }

    /// Run the accept loop on a background thread
    pub fn spawn(self) -> ServerHandle {
        let addr = self.local_addr;
        let registry = Arc::clone(&self.registry);
        let shutdown = Arc::clone(&self.shutdown);
        let join = thread::spawn(move || self.run());

        ServerHandle {
            addr,
            registry,
            shutdown,
            join: Some(join),
        }
    }
}

/// Handle to a server running on a background thread
pub struct ServerHandle {
    addr: SocketAddr,
    registry: Arc<SessionRegistry>,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Signal shutdown and wait for the accept loop to exit. In-flight
    /// connection workers finish on their own.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Serve one connection: one request, one response, close.
///
/// Every failure here is local to this connection; the accept loop and the
/// registry are unaffected.
fn handle_connection(stream: TcpStream, dispatcher: Arc<Dispatcher>, timeout: Duration) {
    let mut conn = HttpConn::new(TcpTransport::new(stream));
    conn.set_timeout(Some(timeout));

    match conn.receive_request() {
        Ok(request) => {
            let response = dispatcher.handle(&request, &|| conn.transport().is_alive());
            if let Err(e) = conn.send_response(&response) {
                log::debug!("response not delivered: {}", e);
            }
        }
        Err(Error::NoMessage) => {
            log::debug!("connection closed idle");
        }
        Err(Error::ChunkedUnsupported) => {
            let _ = conn.send_error(
                Status::BAD_REQUEST,
                "chunked transfer encoding is not supported",
            );
        }
        Err(e) => {
            log::debug!("request aborted: {}", e);
            let _ = conn.send_error(Status::BAD_REQUEST, &e.to_string());
        }
    }

    let _ = conn.close();
}

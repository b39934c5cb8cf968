//! Integration tests for the long-polling server
//!
//! These drive a real server over TCP with a raw hand-written client, one
//! connection per request, exactly as a browser-side long-poll wrapper
//! would.

use pollbox::config::ServerConfig;
use pollbox::dispatch::{RpcError, RpcHandler};
use pollbox::events::Event;
use pollbox::server::{Server, ServerHandle};
use pollbox::session::SESSION_COOKIE;
use serde_json::{json, Map, Value};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

struct TestPlayer;

impl RpcHandler for TestPlayer {
    fn call(&self, method: &str, params: &Map<String, Value>) -> Result<Value, RpcError> {
        match method {
            "Player_GetVolume" => Ok(json!(42)),
            "Player_SetVolume" => Ok(params.get("volume").cloned().unwrap_or(Value::Null)),
            "Player_Explode" => Err(RpcError::Failed("amplifier on fire".to_string())),
            other => Err(RpcError::UnknownMethod(other.to_string())),
        }
    }
}

struct RawResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl RawResponse {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

/// Send one raw request and read the whole response; the server closes the
/// connection after one cycle.
fn send_raw(addr: SocketAddr, raw: &[u8]) -> RawResponse {
    // No half-close here: a FIN while a long poll is blocked reads as a
    // disconnect and releases the waiter early. The server closes the
    // connection once the single response is out.
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.write_all(raw).unwrap();

    let mut wire = Vec::new();
    stream.read_to_end(&mut wire).unwrap();

    let head_end = wire
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("no header terminator in response");
    let head = String::from_utf8_lossy(&wire[..head_end]).to_string();
    let body = wire[head_end + 4..].to_vec();

    let mut lines = head.lines();
    let status_line = lines.next().unwrap();
    let status = status_line
        .split_whitespace()
        .nth(1)
        .unwrap()
        .parse()
        .unwrap();
    let headers = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(n, v)| (n.trim().to_string(), v.trim().to_string()))
        .collect();

    RawResponse {
        status,
        headers,
        body,
    }
}

fn get(addr: SocketAddr, path: &str) -> RawResponse {
    send_raw(
        addr,
        format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", path).as_bytes(),
    )
}

fn get_with_cookie(addr: SocketAddr, path: &str, session_id: &str) -> RawResponse {
    send_raw(
        addr,
        format!(
            "GET {} HTTP/1.1\r\nHost: localhost\r\nCookie: {}={}\r\n\r\n",
            path, SESSION_COOKIE, session_id
        )
        .as_bytes(),
    )
}

fn post_json(addr: SocketAddr, path: &str, body: &str) -> RawResponse {
    send_raw(
        addr,
        format!(
            "POST {} HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\n\r\n{}",
            path,
            body.len(),
            body
        )
        .as_bytes(),
    )
}

fn start_server(config: ServerConfig) -> ServerHandle {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = ServerConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        ..config
    };
    Server::bind(config, Arc::new(TestPlayer)).unwrap().spawn()
}

fn fast_config() -> ServerConfig {
    ServerConfig {
        poll_delay_ms: 150,
        liveness_interval_ms: 20,
        ..ServerConfig::default()
    }
}

#[test]
fn test_index_page() {
    let handle = start_server(fast_config());
    let resp = get(handle.addr(), "/");
    assert_eq!(resp.status, 200);
    assert_eq!(resp.header("Content-Type"), Some("text/html"));
    assert!(!resp.body.is_empty());
}

#[test]
fn test_rpc_round_trip() {
    let handle = start_server(fast_config());
    let addr = handle.addr();

    let resp = post_json(addr, "/Player_GetVolume", "{}");
    assert_eq!(resp.status, 200);
    assert_eq!(resp.json(), json!(42));

    let resp = post_json(addr, "/Player_SetVolume", r#"{"volume": 11}"#);
    assert_eq!(resp.status, 200);
    assert_eq!(resp.json(), json!(11));
}

#[test]
fn test_rpc_unknown_method_404() {
    let handle = start_server(fast_config());
    let resp = get(handle.addr(), "/NoSuchMethod");
    assert_eq!(resp.status, 404);
}

#[test]
fn test_rpc_failure_500() {
    let handle = start_server(fast_config());
    let resp = get(handle.addr(), "/Player_Explode");
    assert_eq!(resp.status, 500);
    assert_eq!(resp.body, b"amplifier on fire");
}

#[test]
fn test_malformed_request_line() {
    let handle = start_server(fast_config());
    let resp = send_raw(handle.addr(), b"GET /only-two-tokens\r\n\r\n");
    assert_eq!(resp.status, 400);
}

#[test]
fn test_chunked_request_rejected() {
    let handle = start_server(fast_config());
    let resp = send_raw(
        handle.addr(),
        b"POST /Player_GetVolume HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n0\r\n\r\n",
    );
    assert_eq!(resp.status, 400);
}

#[test]
fn test_poll_mints_and_round_trips_session_cookie() {
    let handle = start_server(fast_config());
    let addr = handle.addr();

    let resp = get(addr, "/events");
    assert_eq!(resp.status, 200);
    assert_eq!(resp.json(), json!([]));

    let cookie = resp.header("Set-Cookie").expect("no session cookie set");
    let (crumb, path) = cookie.split_once(';').unwrap();
    assert_eq!(path.trim(), "Path=/events");
    let (name, id) = crumb.split_once('=').unwrap();
    assert_eq!(name, SESSION_COOKIE);

    // Presenting the id back resolves to the same session, not a new one
    let resp = get_with_cookie(addr, "/events", id);
    assert_eq!(resp.status, 200);
    assert!(resp.header("Set-Cookie").is_none());
    assert_eq!(handle.registry().count(), 1);
    assert!(handle.registry().get(id).is_some());
}

#[test]
fn test_sequential_empty_polls_take_full_delay() {
    let handle = start_server(fast_config());
    let addr = handle.addr();
    handle.registry().get_or_create("idle-client");

    for _ in 0..2 {
        let start = Instant::now();
        let resp = get_with_cookie(addr, "/events", "idle-client");
        assert_eq!(resp.json(), json!([]));
        assert!(start.elapsed() >= Duration::from_millis(150));
    }
}

#[test]
fn test_enqueue_wakes_blocked_poll() {
    let handle = start_server(ServerConfig {
        poll_delay_ms: 5000,
        liveness_interval_ms: 50,
        ..ServerConfig::default()
    });
    let addr = handle.addr();
    let registry = handle.registry();
    registry.get_or_create("player-1");

    let notifier = thread::spawn(move || {
        thread::sleep(Duration::from_millis(150));
        registry.push_to(
            "player-1",
            Event::new("TrackChanged", vec![json!("file.mp3")]),
        );
    });

    let start = Instant::now();
    let resp = get_with_cookie(addr, "/events", "player-1");
    notifier.join().unwrap();

    // Woken well under the 5 s delay, carrying the event
    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(
        resp.json(),
        json!([{"name": "TrackChanged", "parameters": ["file.mp3"]}])
    );

    // Nothing queued now: the queue was drained, not duplicated
    assert_eq!(handle.registry().get("player-1").unwrap().queue().len(), 0);
}

#[test]
fn test_events_queued_while_unpolled_are_kept_in_order() {
    let handle = start_server(fast_config());
    let addr = handle.addr();
    let registry = handle.registry();

    registry.get_or_create("player-2");
    registry.push_to("player-2", Event::signal("PlayStateChanged"));
    registry.push_to("player-2", Event::new("VolumeChanged", vec![json!(80)]));

    let resp = get_with_cookie(addr, "/events", "player-2");
    assert_eq!(
        resp.json(),
        json!([
            {"name": "PlayStateChanged", "parameters": []},
            {"name": "VolumeChanged", "parameters": [80]}
        ])
    );
}

#[test]
fn test_concurrent_second_poll_conflicts() {
    let handle = start_server(ServerConfig {
        poll_delay_ms: 1000,
        liveness_interval_ms: 50,
        ..ServerConfig::default()
    });
    let addr = handle.addr();
    handle.registry().get_or_create("greedy");

    let first = thread::spawn(move || get_with_cookie(addr, "/events", "greedy"));
    thread::sleep(Duration::from_millis(200));
    let second = get_with_cookie(addr, "/events", "greedy");

    assert_eq!(second.status, 409);
    assert_eq!(first.join().unwrap().status, 200);
}

#[test]
fn test_status_endpoint() {
    let handle = start_server(fast_config());
    let addr = handle.addr();
    let registry = handle.registry();

    let busy = registry.get_or_create("busy");
    registry.get_or_create("quiet");
    for name in ["a", "b", "c"] {
        busy.queue().push(Event::signal(name));
    }

    let resp = get(addr, "/status");
    assert_eq!(resp.status, 200);
    assert_eq!(resp.header("Content-Type"), Some("application/json"));

    let body = resp.json();
    assert_eq!(body["numberOfClients"], json!(2));
    assert_eq!(body["fileSharingEnabled"], json!(false));
    assert_eq!(body["sessions"]["busy"], json!(3));
    assert_eq!(body["sessions"]["quiet"], json!(0));
}

#[test]
fn test_file_sharing_disabled_403() {
    let handle = start_server(fast_config());
    let resp = get(handle.addr(), "/files/page.html");
    assert_eq!(resp.status, 403);
}

#[test]
fn test_file_sharing_enabled() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("page.html"), b"<p>shared</p>").unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"plain").unwrap();

    let handle = start_server(ServerConfig {
        file_sharing: true,
        file_root: Some(dir.path().to_path_buf()),
        ..fast_config()
    });
    let addr = handle.addr();

    let resp = get(addr, "/files/page.html");
    assert_eq!(resp.status, 200);
    assert_eq!(resp.header("Content-Type"), Some("text/html"));
    assert_eq!(resp.body, b"<p>shared</p>");

    let resp = get(addr, "/files/notes.txt");
    assert_eq!(resp.status, 200);
    assert_eq!(resp.header("Content-Type"), Some("application/octet-stream"));

    let resp = get(addr, "/files/missing.js");
    assert_eq!(resp.status, 404);
}

#[test]
fn test_image_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("cover.jpg"), b"\xff\xd8jpeg-ish").unwrap();

    let handle = start_server(ServerConfig {
        image_dir: Some(dir.path().to_path_buf()),
        ..fast_config()
    });

    let resp = get(handle.addr(), "/image/cover.jpg");
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, b"\xff\xd8jpeg-ish");
}

#[test]
fn test_abandoned_poll_releases_worker() {
    let handle = start_server(ServerConfig {
        poll_delay_ms: 5000,
        liveness_interval_ms: 20,
        ..ServerConfig::default()
    });
    let addr = handle.addr();
    let registry = handle.registry();
    registry.get_or_create("quitter");

    // Open a poll, then hang up without reading the response
    let mut stream = TcpStream::connect(addr).unwrap();
    stream
        .write_all(
            format!(
                "GET /events HTTP/1.1\r\nHost: localhost\r\nCookie: {}=quitter\r\n\r\n",
                SESSION_COOKIE
            )
            .as_bytes(),
        )
        .unwrap();
    thread::sleep(Duration::from_millis(100));
    drop(stream);

    // The waiter notices the disconnect and frees the session well before
    // the 5 s delay: an event pushed afterwards stays queued for the next
    // poller instead of being swallowed, and the next poll is no conflict.
    thread::sleep(Duration::from_millis(500));
    registry.push_to("quitter", Event::signal("AfterHangup"));

    let start = Instant::now();
    let resp = get_with_cookie(addr, "/events", "quitter");
    assert_eq!(resp.status, 200);
    assert_eq!(resp.json(), json!([{"name": "AfterHangup", "parameters": []}]));
    assert!(start.elapsed() < Duration::from_secs(1));
}

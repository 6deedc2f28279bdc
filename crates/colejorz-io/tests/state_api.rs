use colejorz_core::{Engine, EngineConfig, RecordingActuator};
use colejorz_io::{ApiConfig, ApiServer, StateMsg, TrainState};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

struct Harness {
    addr: SocketAddr,
    engine: Arc<Engine>,
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Harness {
    fn start() -> Self {
        let engine = Arc::new(
            Engine::start(
                RecordingActuator::new(),
                EngineConfig {
                    step: 1,
                    step_delay: Duration::from_millis(2),
                    settle_delay: Duration::from_millis(10),
                },
            )
            .expect("engine starts"),
        );
        let server = ApiServer::bind(&ApiConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            poll_interval: Duration::from_millis(20),
        })
        .expect("bind ephemeral port");
        let addr = server.local_addr();
        let stop = Arc::new(AtomicBool::new(false));
        let handle = server.spawn(Arc::clone(&engine), Arc::clone(&stop));
        Self {
            addr,
            engine,
            stop,
            handle: Some(handle),
        }
    }

    fn request(&self, method: &str, path: &str, body: &str) -> (u16, serde_json::Value) {
        let mut stream = TcpStream::connect(self.addr).expect("connect to state API");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        write!(
            stream,
            "{method} {path} HTTP/1.1\r\nHost: {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            self.addr,
            body.len()
        )
        .unwrap();

        let mut raw = String::new();
        stream.read_to_string(&mut raw).unwrap();
        let status: u16 = raw
            .split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .expect("status line");
        let payload = raw.split("\r\n\r\n").nth(1).unwrap_or("");
        let json = serde_json::from_str(payload).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    fn state(&self) -> StateMsg {
        let (status, body) = self.request("GET", "/state", "");
        assert_eq!(status, 200);
        serde_json::from_value(body).expect("state body")
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[test]
fn post_then_poll_until_speed_reached() {
    let api = Harness::start();

    let (status, body) = api.request("POST", "/state", r#"{"speed": -25}"#);
    assert_eq!(status, 200);
    assert_eq!(body["body"]["speed"], -25);

    let start = Instant::now();
    let mut state = api.state();
    while state.speed != -25 && start.elapsed() < Duration::from_secs(5) {
        thread::sleep(Duration::from_millis(20));
        state = api.state();
    }
    assert_eq!(state.speed, -25);
    assert_eq!(state.train, TrainState::Working);
    assert_eq!(state.run, "no pending instruction");
}

#[test]
fn validation_errors_are_listed() {
    let api = Harness::start();

    let (status, body) = api.request("POST", "/state", r#"{"timed": -3}"#);
    assert_eq!(status, 400);
    let errors = body["errors"].as_array().expect("errors list");
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0], "Missing \"speed\" value.");
    assert_eq!(api.state().speed, 0);
}

#[test]
fn timed_run_is_visible_in_state() {
    let api = Harness::start();

    let (status, _) = api.request("POST", "/state", r#"{"speed": 10, "timed": 5}"#);
    assert_eq!(status, 200);
    thread::sleep(Duration::from_millis(200));
    let state = api.state();
    assert!(state.run.starts_with("timed run:"), "{}", state.run);
}

#[test]
fn shutdown_closes_the_train() {
    let api = Harness::start();
    api.request("POST", "/state", r#"{"speed": 30}"#);
    api.engine.shutdown().expect("clean shutdown");

    let state = api.state();
    assert_eq!(state.train, TrainState::Closed);
    assert_eq!(state.speed, 0);

    let (status, _) = api.request("POST", "/state", r#"{"speed": 30}"#);
    assert_eq!(status, 503);
}

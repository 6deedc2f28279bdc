use crate::metrics::{INSTRUCTIONS_REJECTED, INSTRUCTIONS_SUBMITTED, SUBMIT_FAILURES};
use crate::protocol::{AcceptedMsg, ErrorsMsg, StateMsg};
use colejorz_core::{Engine, SpeedRequest};
use serde::Serialize;
use std::io::{Cursor, Read};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tiny_http::{Header, Method, Request, Response, Server};
use tracing::{debug, info, warn};

/// Upper bound on a `POST /state` body.
const MAX_BODY_BYTES: u64 = 16 * 1024;

pub struct ApiConfig {
    pub bind_addr: String,
    /// How often the accept loop looks at the stop flag.
    pub poll_interval: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:6543".to_string(),
            poll_interval: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },
    #[error("server bound to a non-IP address")]
    NotIp,
}

/// Status code plus body of an API reply, independent of the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiReply {
    pub status: u16,
    pub body: serde_json::Value,
}

impl ApiReply {
    fn json(status: u16, body: impl Serialize) -> Self {
        Self {
            status,
            body: serde_json::to_value(body).unwrap_or(serde_json::Value::Null),
        }
    }
}

/// Serves `/state` against the engine.
pub struct ApiServer {
    server: Server,
    addr: SocketAddr,
    poll_interval: Duration,
}

impl ApiServer {
    pub fn bind(config: &ApiConfig) -> Result<Self, ApiError> {
        let server = Server::http(&config.bind_addr).map_err(|e| ApiError::Bind {
            addr: config.bind_addr.clone(),
            reason: e.to_string(),
        })?;
        let addr = server.server_addr().to_ip().ok_or(ApiError::NotIp)?;
        info!(addr = %addr, "State API listening");
        Ok(Self {
            server,
            addr,
            poll_interval: config.poll_interval,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Runs the accept loop on its own thread until `stop` is raised.
    pub fn spawn(self, engine: Arc<Engine>, stop: Arc<AtomicBool>) -> thread::JoinHandle<()> {
        thread::spawn(move || self.run(&engine, &stop))
    }

    pub fn run(&self, engine: &Engine, stop: &AtomicBool) {
        while !stop.load(Ordering::Relaxed) {
            match self.server.recv_timeout(self.poll_interval) {
                Ok(Some(request)) => handle_request(engine, request),
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "State API receive error");
                }
            }
        }
        info!("State API stopped");
    }
}

fn handle_request(engine: &Engine, mut request: Request) {
    let method = request.method().clone();
    let path = request.url().split('?').next().unwrap_or("").to_string();

    let mut body = Vec::new();
    let read = request
        .as_reader()
        .take(MAX_BODY_BYTES)
        .read_to_end(&mut body);
    let reply = match read {
        Ok(_) => route(engine, &method, &path, &body),
        Err(e) => ApiReply::json(400, ErrorsMsg::new([format!("Unreadable body: {e}")])),
    };
    debug!(method = %method, path = %path, status = reply.status, "State API request");

    if let Err(e) = request.respond(to_response(&reply)) {
        warn!(error = %e, "Failed to send State API response");
    }
}

fn to_response(reply: &ApiReply) -> Response<Cursor<Vec<u8>>> {
    let payload = serde_json::to_vec(&reply.body).unwrap_or_default();
    let mut response = Response::from_data(payload).with_status_code(reply.status);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        response = response.with_header(header);
    }
    response
}

/// Dispatches one request. Kept free of sockets so it can be driven directly.
pub fn route(engine: &Engine, method: &Method, path: &str, body: &[u8]) -> ApiReply {
    match (method, path.trim_end_matches('/')) {
        (Method::Get, "/state") => ApiReply::json(200, StateMsg::from(engine.status())),
        (Method::Post, "/state") => set_state(engine, body),
        (Method::Get, "/health") => ApiReply::json(200, "OK"),
        (_, "/state") => ApiReply::json(405, ErrorsMsg::new(["Method not allowed."])),
        _ => ApiReply::json(404, ErrorsMsg::new(["Not found."])),
    }
}

fn set_state(engine: &Engine, body: &[u8]) -> ApiReply {
    let parsed: serde_json::Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => {
            INSTRUCTIONS_REJECTED.inc();
            return ApiReply::json(400, ErrorsMsg::new([format!("Invalid JSON body: {e}")]));
        }
    };

    let validated = match SpeedRequest::from_body(&parsed).validate() {
        Ok(v) => v,
        Err(violations) => {
            INSTRUCTIONS_REJECTED.inc();
            debug!(?violations, "Rejected state request");
            return ApiReply::json(400, ErrorsMsg::new(violations));
        }
    };

    let instruction = validated.instruction();
    match engine.submit(instruction) {
        Ok(()) => {
            INSTRUCTIONS_SUBMITTED.inc();
            info!(
                speed = instruction.speed,
                timed_secs = instruction.timed_secs,
                "State change requested"
            );
            ApiReply::json(
                200,
                AcceptedMsg {
                    body: parsed,
                    state: StateMsg::from(engine.status()),
                },
            )
        }
        Err(e) => {
            SUBMIT_FAILURES.inc();
            warn!(error = %e, "Engine refused instruction");
            ApiReply::json(503, ErrorsMsg::new([e]))
        }
    }
}

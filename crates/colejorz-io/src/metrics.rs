//! Prometheus metrics for the train engine and its HTTP front door.

use colejorz_core::{tags, EngineSnapshot};
use prometheus::{Encoder, Gauge, IntCounter, Registry, TextEncoder};
use std::io::Cursor;
use std::sync::LazyLock;
use std::thread;
use tiny_http::{Header, Response, Server};
use tracing::{error, info, warn};

/// Global metrics registry
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Engine State
// ============================================================================

pub static DUTY_PERCENT: LazyLock<Gauge> = LazyLock::new(|| gauge(tags::SIGNED_DUTY));

pub static REMAINING_TIMED_SECONDS: LazyLock<Gauge> =
    LazyLock::new(|| gauge(tags::REMAINING_TIMED));

pub static QUEUE_DEPTH: LazyLock<Gauge> = LazyLock::new(|| gauge(tags::QUEUE_DEPTH));

pub static WORKER_RUNNING: LazyLock<Gauge> = LazyLock::new(|| gauge(tags::WORKER_RUNNING));

// ============================================================================
// Request Metrics
// ============================================================================

/// Instructions accepted into the engine queue
pub static INSTRUCTIONS_SUBMITTED: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "colejorz_instructions_submitted_total",
        "Instructions accepted into the engine queue",
    )
});

/// Requests rejected by validation before reaching the engine
pub static INSTRUCTIONS_REJECTED: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "colejorz_instructions_rejected_total",
        "State requests rejected by validation",
    )
});

/// Valid requests the engine refused (closed or faulted)
pub static SUBMIT_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "colejorz_submit_failures_total",
        "Valid state requests refused by a closed or faulted engine",
    )
});

fn gauge(tag: tags::Tag) -> Gauge {
    let gauge = Gauge::new(tag.metric, tag.help).expect("valid gauge definition");
    REGISTRY
        .register(Box::new(gauge.clone()))
        .expect("gauge registered once");
    gauge
}

fn counter(name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).expect("valid counter definition");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("counter registered once");
    counter
}

/// Copy an engine snapshot into the state gauges.
pub fn record_snapshot(snapshot: &EngineSnapshot, pending: usize) {
    DUTY_PERCENT.set(f64::from(snapshot.signed_duty()));
    REMAINING_TIMED_SECONDS.set(f64::from(snapshot.remaining_timed));
    QUEUE_DEPTH.set(pending as f64);
    WORKER_RUNNING.set(if snapshot.running { 1.0 } else { 0.0 });
}

// ============================================================================
// Metrics HTTP Server
// ============================================================================

/// Serves `/metrics`, `/health` and `/ready` on its own thread. A bind
/// failure is logged and ends the thread; the engine keeps running.
pub fn serve_metrics(bind_addr: String) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let server = match Server::http(&bind_addr) {
            Ok(s) => s,
            Err(e) => {
                error!(addr = %bind_addr, error = %e, "Metrics server failed to bind");
                return;
            }
        };
        info!(addr = %bind_addr, "Metrics available at /metrics");

        for request in server.incoming_requests() {
            let path = request.url().split('?').next().unwrap_or("").to_string();
            let response = metrics_response(&path);
            if let Err(e) = request.respond(response) {
                warn!(path = %path, error = %e, "Failed to send metrics response");
            }
        }
    })
}

fn metrics_response(path: &str) -> Response<Cursor<Vec<u8>>> {
    match path {
        "/metrics" => match encode() {
            Ok(buffer) => {
                let response = Response::from_data(buffer);
                let content_type =
                    Header::from_bytes(&b"Content-Type"[..], &b"text/plain; version=0.0.4"[..]);
                match content_type {
                    Ok(header) => response.with_header(header),
                    Err(()) => response,
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to encode metrics");
                Response::from_string("encode failed").with_status_code(500)
            }
        },
        "/health" => Response::from_string("OK"),
        "/ready" if WORKER_RUNNING.get() > 0.0 => Response::from_string("Ready"),
        "/ready" => Response::from_string("Engine stopped").with_status_code(503),
        _ => Response::from_string("Not Found").with_status_code(404),
    }
}

fn encode() -> prometheus::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(buffer)
}

/// Initialize all metrics (forces lazy initialization)
pub fn init_metrics() {
    let _ = DUTY_PERCENT.get();
    let _ = REMAINING_TIMED_SECONDS.get();
    let _ = QUEUE_DEPTH.get();
    let _ = WORKER_RUNNING.get();
    let _ = INSTRUCTIONS_SUBMITTED.get();
    let _ = INSTRUCTIONS_REJECTED.get();
    let _ = SUBMIT_FAILURES.get();
}

#[cfg(test)]
mod tests {
    use super::*;
    use colejorz_core::Direction;

    #[test]
    fn snapshot_lands_in_gauges_and_encodes() {
        init_metrics();
        record_snapshot(
            &EngineSnapshot {
                direction: Direction::Backward,
                duty: 25,
                remaining_timed: 4,
                running: true,
            },
            2,
        );
        assert_eq!(DUTY_PERCENT.get(), -25.0);
        assert_eq!(REMAINING_TIMED_SECONDS.get(), 4.0);
        assert_eq!(QUEUE_DEPTH.get(), 2.0);

        let text = String::from_utf8(encode().unwrap()).unwrap();
        assert_eq!(metrics_response("/metrics").status_code().0, 200);
        assert_eq!(metrics_response("/health").status_code().0, 200);
        assert_eq!(metrics_response("/nope").status_code().0, 404);
        assert!(text.contains("colejorz_duty_percent -25"));
        assert!(text.contains("colejorz_instructions_submitted_total"));
    }
}

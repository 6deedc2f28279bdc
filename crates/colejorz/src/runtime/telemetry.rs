use colejorz_core::Engine;
use colejorz_io::{init_metrics, record_snapshot, serve_metrics};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::info;

const UPDATE_INTERVAL: Duration = Duration::from_millis(200);

pub fn init() {
    init_metrics();
}

pub fn start_metrics_server(addr: &Option<String>) -> Option<thread::JoinHandle<()>> {
    addr.as_ref().map(|addr| {
        info!(addr = %addr, "Starting metrics server");
        serve_metrics(addr.clone())
    })
}

/// Samples the engine into the gauges until `stop` is raised, plus once more
/// afterwards so the final closed state is visible.
pub fn start_metrics_updater(engine: Arc<Engine>, stop: Arc<AtomicBool>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while !stop.load(Ordering::Relaxed) {
            record_snapshot(&engine.snapshot(), engine.pending());
            thread::sleep(UPDATE_INTERVAL);
        }
        record_snapshot(&engine.snapshot(), engine.pending());
    })
}

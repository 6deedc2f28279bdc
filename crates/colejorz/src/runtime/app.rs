use crate::runtime::config::RuntimeConfig;
use crate::runtime::logging::init_tracing;
use crate::runtime::telemetry;
use colejorz_core::{Engine, EngineError, RecordingActuator};
use colejorz_io::{ApiError, ApiServer, GpioActuator, GpioError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("motor driver: {0}")]
    Gpio(#[from] GpioError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("state API: {0}")]
    Api(#[from] ApiError),
    #[error("signal handling: {0}")]
    Signals(#[source] std::io::Error),
}

pub fn run_from_args() -> Result<(), AppError> {
    let config = RuntimeConfig::from_env();
    if config.show_help {
        RuntimeConfig::print_help();
        return Ok(());
    }
    run(config)
}

pub fn run(config: RuntimeConfig) -> Result<(), AppError> {
    init_tracing(config.log_format);
    telemetry::init();
    let _metrics_handle = telemetry::start_metrics_server(&config.metrics_addr);

    let engine = Arc::new(start_engine(&config)?);
    let stop = Arc::new(AtomicBool::new(false));

    let server = match ApiServer::bind(&config.api_config()) {
        Ok(server) => server,
        Err(e) => {
            engine.shutdown()?;
            return Err(e.into());
        }
    };
    let api_handle = server.spawn(Arc::clone(&engine), Arc::clone(&stop));
    let telemetry_handle = telemetry::start_metrics_updater(Arc::clone(&engine), Arc::clone(&stop));

    info!("colejorz running. POST /state to drive the train.");
    let waited = wait_for_shutdown(config.run_seconds);

    stop.store(true, Ordering::Relaxed);
    if api_handle.join().is_err() {
        warn!("State API thread panicked");
    }
    let closed = engine.shutdown();
    if telemetry_handle.join().is_err() {
        warn!("Metrics updater thread panicked");
    }

    let status = engine.status();
    info!(speed = status.duty, state = ?status.state, "Run complete");
    waited?;
    closed?;
    Ok(())
}

fn start_engine(config: &RuntimeConfig) -> Result<Engine, AppError> {
    let engine_config = config.engine_config();
    let engine = if config.simulate {
        info!("Using simulated motor driver");
        Engine::start(RecordingActuator::new(), engine_config)?
    } else {
        info!(root = %config.gpio.sysfs_root.display(), "Opening GPIO motor driver");
        Engine::start(GpioActuator::new(&config.gpio)?, engine_config)?
    };
    Ok(engine)
}

/// Blocks until Ctrl-C, SIGTERM or the optional run duration elapses.
fn wait_for_shutdown(run_seconds: Option<u64>) -> Result<(), AppError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(AppError::Signals)?;

    runtime.block_on(async {
        let limit = async {
            match run_seconds {
                Some(seconds) => {
                    info!(seconds, "Running for limited duration");
                    tokio::time::sleep(Duration::from_secs(seconds)).await
                }
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.map_err(AppError::Signals)?;
                info!("Interrupt received");
            }
            result = terminate() => {
                result.map_err(AppError::Signals)?;
                info!("SIGTERM received");
            }
            _ = limit => {}
        }
        Ok::<(), AppError>(())
    })
}

#[cfg(unix)]
async fn terminate() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};
    signal(SignalKind::terminate())?.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn terminate() -> std::io::Result<()> {
    std::future::pending().await
}

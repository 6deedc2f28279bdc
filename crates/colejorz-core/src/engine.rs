use crate::actuator::{Actuator, ActuatorError, Direction};
use crate::request::Instruction;
use crate::state::{EngineSnapshot, EngineStatus, StateExchange};
use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub const MAX_DUTY: u8 = 100;

#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Duty units moved per pacing tick.
    pub step: u8,
    pub step_delay: Duration,
    /// Coast time between a completed stop and driving the opposite way.
    pub settle_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step: 1,
            step_delay: Duration::from_millis(200),
            settle_delay: Duration::from_secs(1),
        }
    }
}

/// How a ramp or stop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampOutcome {
    Completed,
    /// A newer instruction was waiting in the queue.
    Preempted,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine is closed")]
    Closed,
    #[error(transparent)]
    Actuator(#[from] ActuatorError),
    #[error("failed to spawn engine worker: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("engine worker panicked")]
    WorkerPanicked,
}

struct Shared {
    exchange: StateExchange,
    stop: AtomicBool,
    /// Held across the closed check and the send in `submit`, and across
    /// raising `stop` and queueing the terminal stop in `shutdown`, so the
    /// terminal stop is always the last instruction in the queue.
    admission: Mutex<()>,
    fault: Mutex<Option<ActuatorError>>,
}

impl Shared {
    fn admission(&self) -> MutexGuard<'_, ()> {
        self.admission
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn fault(&self) -> MutexGuard<'_, Option<ActuatorError>> {
        self.fault.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

struct WorkerExit {
    actuator: Box<dyn Actuator>,
    outcome: Result<(), ActuatorError>,
}

/// Handle to the command engine. Cheap to share behind an `Arc`; every
/// method is safe to call from any thread.
pub struct Engine {
    queue: Sender<Instruction>,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<WorkerExit>>>,
}

impl Engine {
    /// Takes ownership of the actuator and spawns the worker that drives it.
    pub fn start<A: Actuator + 'static>(
        actuator: A,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        let initial = EngineSnapshot {
            running: true,
            ..EngineSnapshot::default()
        };
        let shared = Arc::new(Shared {
            exchange: StateExchange::new(initial),
            stop: AtomicBool::new(false),
            admission: Mutex::new(()),
            fault: Mutex::new(None),
        });
        let (tx, rx) = crossbeam_channel::unbounded::<Instruction>();

        info!(
            step = config.step,
            step_delay_ms = config.step_delay.as_millis() as u64,
            settle_delay_ms = config.settle_delay.as_millis() as u64,
            "Starting engine worker"
        );

        let worker = Worker {
            actuator,
            config,
            queue: rx,
            shared: Arc::clone(&shared),
            state: initial,
        };
        let handle = thread::Builder::new()
            .name("colejorz-engine".to_string())
            .spawn(move || worker.run())
            .map_err(EngineError::Spawn)?;

        Ok(Self {
            queue: tx,
            shared,
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Queues an instruction and returns immediately.
    pub fn submit(&self, instruction: Instruction) -> Result<(), EngineError> {
        let _admission = self.shared.admission();
        if self.shared.stop.load(Ordering::Acquire) {
            return Err(EngineError::Closed);
        }
        if let Some(fault) = self.shared.fault().clone() {
            return Err(EngineError::Actuator(fault));
        }
        self.queue
            .send(instruction)
            .map_err(|_| EngineError::Closed)?;
        debug!(
            speed = instruction.speed,
            timed_secs = instruction.timed_secs,
            pending = self.queue.len(),
            "Instruction queued"
        );
        Ok(())
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus::from(self.shared.exchange.read_state())
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        self.shared.exchange.read_state()
    }

    /// Instructions waiting behind the one being executed.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Drains the backlog, stops the train, joins the worker and releases
    /// the actuator. Returns the worker's actuator fault if it died of one.
    pub fn shutdown(&self) -> Result<(), EngineError> {
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
            .ok_or(EngineError::Closed)?;

        info!(pending = self.queue.len(), "Shutting down engine");
        {
            let _admission = self.shared.admission();
            self.shared.stop.store(true, Ordering::Release);
            // The worker may already be gone after a fault; its receiver is then dropped.
            let _ = self.queue.send(Instruction::stop());
        }

        let WorkerExit {
            mut actuator,
            outcome,
        } = handle.join().map_err(|_| EngineError::WorkerPanicked)?;

        let released = actuator.release();
        if let Err(e) = &released {
            error!(error = %e, "Failed to release actuator");
        }
        info!("Engine closed");
        outcome?;
        released?;
        Ok(())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let open = self
            .worker
            .get_mut()
            .map(|w| w.is_some())
            .unwrap_or(false);
        if open {
            if let Err(e) = self.shutdown() {
                warn!(error = %e, "Engine shutdown on drop failed");
            }
        }
    }
}

/// Marks the engine closed however the worker thread ends.
struct RunningGuard(Arc<Shared>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.exchange.mark_stopped();
    }
}

struct Worker<A: Actuator> {
    actuator: A,
    config: EngineConfig,
    queue: Receiver<Instruction>,
    shared: Arc<Shared>,
    state: EngineSnapshot,
}

impl<A: Actuator + 'static> Worker<A> {
    fn run(mut self) -> WorkerExit {
        let _guard = RunningGuard(Arc::clone(&self.shared));
        let outcome = self.drain();
        if let Err(e) = &outcome {
            error!(error = %e, "Actuator fault, engine worker exiting");
            *self.shared.fault() = Some(e.clone());
        }
        debug!("Engine worker exited");
        WorkerExit {
            actuator: Box::new(self.actuator),
            outcome,
        }
    }

    fn drain(&mut self) -> Result<(), ActuatorError> {
        loop {
            if self.shared.stop.load(Ordering::Acquire) && self.queue.is_empty() {
                return Ok(());
            }
            // Parks here while idle.
            let Ok(instruction) = self.queue.recv() else {
                return Ok(());
            };
            self.execute(instruction)?;
        }
    }

    fn execute(&mut self, instruction: Instruction) -> Result<(), ActuatorError> {
        debug!(
            speed = instruction.speed,
            timed_secs = instruction.timed_secs,
            "Executing instruction"
        );
        let target_dir = Direction::of_speed(instruction.speed);
        if target_dir == Direction::Stopped {
            self.stop()?;
            return Ok(());
        }

        let current = self.state.direction;
        if current != Direction::Stopped && current != target_dir {
            if self.stop()? == RampOutcome::Preempted {
                debug!(
                    from = current.label(),
                    to = target_dir.label(),
                    "Reversal superseded by newer instruction"
                );
                return Ok(());
            }
            self.state.direction = target_dir;
            self.publish();
            thread::sleep(self.config.settle_delay);
        }

        self.actuator.set_direction(target_dir)?;
        self.state.direction = target_dir;
        self.state.remaining_timed = instruction.timed_secs;
        self.publish();

        if self.ramp_to(instruction.magnitude())? == RampOutcome::Preempted {
            return Ok(());
        }
        if instruction.timed_secs > 0 {
            self.hold(instruction.timed_secs)?;
        } else {
            self.state.remaining_timed = 0;
            self.publish();
        }
        Ok(())
    }

    fn ramp_to(&mut self, target: u8) -> Result<RampOutcome, ActuatorError> {
        let target = target.min(MAX_DUTY);
        let step = self.config.step.max(1);
        while self.state.duty != target {
            if !self.queue.is_empty() {
                return Ok(RampOutcome::Preempted);
            }
            let next = if self.state.duty < target {
                self.state.duty.saturating_add(step).min(target)
            } else {
                self.state.duty.saturating_sub(step).max(target)
            };
            self.actuator.set_duty_cycle(next)?;
            self.state.duty = next;
            self.publish();
            thread::sleep(self.config.step_delay);
        }
        Ok(RampOutcome::Completed)
    }

    fn hold(&mut self, secs: u32) -> Result<RampOutcome, ActuatorError> {
        let deadline = Instant::now() + Duration::from_secs(u64::from(secs));
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let remaining = deadline - now;
            self.state.remaining_timed = remaining.as_secs_f64().ceil() as u32;
            self.publish();
            if !self.queue.is_empty() {
                return Ok(RampOutcome::Preempted);
            }
            thread::sleep(self.config.step_delay.min(remaining));
        }
        info!(secs, "Timed run elapsed, stopping");
        self.stop()
    }

    fn stop(&mut self) -> Result<RampOutcome, ActuatorError> {
        self.state.remaining_timed = 0;
        let outcome = self.ramp_to(0)?;
        if outcome == RampOutcome::Completed {
            self.actuator.set_direction(Direction::Stopped)?;
            self.state.direction = Direction::Stopped;
        }
        self.publish();
        Ok(outcome)
    }

    fn publish(&self) {
        self.shared.exchange.publish_state(self.state);
        debug!(status = %self.state.describe(), duty = self.state.duty, "Train status");
    }
}

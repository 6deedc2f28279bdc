use crate::actuator::{Actuator, ActuatorError, Direction};
use std::sync::{Arc, Mutex, MutexGuard};

/// One call made against an actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorCall {
    Direction(Direction),
    Duty(u8),
    Release,
}

/// Shared, cloneable view of everything a [`RecordingActuator`] was told to do.
#[derive(Debug, Clone, Default)]
pub struct ActuatorLog {
    calls: Arc<Mutex<Vec<ActuatorCall>>>,
}

impl ActuatorLog {
    fn lock(&self) -> MutexGuard<'_, Vec<ActuatorCall>> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, call: ActuatorCall) {
        self.lock().push(call);
    }

    pub fn calls(&self) -> Vec<ActuatorCall> {
        self.lock().clone()
    }

    pub fn duties(&self) -> Vec<u8> {
        self.lock()
            .iter()
            .filter_map(|call| match call {
                ActuatorCall::Duty(d) => Some(*d),
                _ => None,
            })
            .collect()
    }

    pub fn last_duty(&self) -> Option<u8> {
        self.lock().iter().rev().find_map(|call| match call {
            ActuatorCall::Duty(d) => Some(*d),
            _ => None,
        })
    }

    pub fn last_direction(&self) -> Option<Direction> {
        self.lock().iter().rev().find_map(|call| match call {
            ActuatorCall::Direction(d) => Some(*d),
            _ => None,
        })
    }

    pub fn release_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|call| matches!(call, ActuatorCall::Release))
            .count()
    }
}

/// In-memory actuator used by `--simulate` and the tests.
#[derive(Debug, Default)]
pub struct RecordingActuator {
    log: ActuatorLog,
    fail_after: Option<usize>,
    calls_made: usize,
    released: bool,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call after the first `calls` successful ones.
    pub fn failing_after(calls: usize) -> Self {
        Self {
            fail_after: Some(calls),
            ..Self::default()
        }
    }

    pub fn log(&self) -> ActuatorLog {
        self.log.clone()
    }

    fn check(&mut self, operation: &'static str) -> Result<(), ActuatorError> {
        if self.released {
            return Err(ActuatorError::Released);
        }
        if let Some(limit) = self.fail_after {
            if self.calls_made >= limit {
                return Err(ActuatorError::io(operation, "simulated pin fault"));
            }
        }
        self.calls_made += 1;
        Ok(())
    }
}

impl Actuator for RecordingActuator {
    fn set_direction(&mut self, direction: Direction) -> Result<(), ActuatorError> {
        self.check("set_direction")?;
        self.log.push(ActuatorCall::Direction(direction));
        Ok(())
    }

    fn set_duty_cycle(&mut self, percent: u8) -> Result<(), ActuatorError> {
        self.check("set_duty_cycle")?;
        self.log.push(ActuatorCall::Duty(percent.min(100)));
        Ok(())
    }

    fn release(&mut self) -> Result<(), ActuatorError> {
        if self.released {
            return Err(ActuatorError::Released);
        }
        self.released = true;
        self.log.push(ActuatorCall::Release);
        Ok(())
    }
}

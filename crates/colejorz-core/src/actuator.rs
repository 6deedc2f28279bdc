use serde::Serialize;
use thiserror::Error;

/// Direction of travel. `Stopped` doubles as the neutral output where both
/// direction pins are deasserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Stopped,
    Forward,
    Backward,
}

impl Direction {
    pub fn sign(self) -> i32 {
        match self {
            Direction::Stopped => 0,
            Direction::Forward => 1,
            Direction::Backward => -1,
        }
    }

    /// Direction requested by a signed speed.
    pub fn of_speed(speed: i8) -> Self {
        match speed {
            0 => Direction::Stopped,
            s if s > 0 => Direction::Forward,
            _ => Direction::Backward,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Direction::Stopped => "stop",
            Direction::Forward => "forward",
            Direction::Backward => "backward",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActuatorError {
    #[error("actuator I/O failed during {operation}: {reason}")]
    Io {
        operation: &'static str,
        reason: String,
    },
    #[error("actuator already released")]
    Released,
}

impl ActuatorError {
    pub fn io(operation: &'static str, reason: impl ToString) -> Self {
        Self::Io {
            operation,
            reason: reason.to_string(),
        }
    }
}

/// Physical output of the train: two direction lines and a PWM duty cycle.
///
/// Only the engine worker calls these. Implementations must never assert the
/// forward and backward outputs at the same time.
pub trait Actuator: Send {
    fn set_direction(&mut self, direction: Direction) -> Result<(), ActuatorError>;
    fn set_duty_cycle(&mut self, percent: u8) -> Result<(), ActuatorError>;
    fn release(&mut self) -> Result<(), ActuatorError>;
}

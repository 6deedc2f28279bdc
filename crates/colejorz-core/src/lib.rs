pub mod actuator;
#[cfg(any(test, feature = "simulation"))]
pub mod actuator_sim;
pub mod engine;
pub mod request;
mod request_proptest;
pub mod state;
pub mod tags;

pub use actuator::{Actuator, ActuatorError, Direction};
#[cfg(any(test, feature = "simulation"))]
pub use actuator_sim::{ActuatorCall, ActuatorLog, RecordingActuator};
pub use engine::{Engine, EngineConfig, EngineError, RampOutcome};
pub use request::{Instruction, RequestViolation, SpeedRequest, Unvalidated, Validated};
pub use state::{EngineSnapshot, EngineStatus, StateExchange, WorkerState};

use colejorz_core::{EngineStatus, WorkerState};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainState {
    Working,
    Closed,
}

/// Body of `GET /state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateMsg {
    pub speed: i32,
    pub train: TrainState,
    pub run: String,
}

impl From<EngineStatus> for StateMsg {
    fn from(status: EngineStatus) -> Self {
        Self {
            speed: status.duty,
            train: match status.state {
                WorkerState::Running => TrainState::Working,
                WorkerState::Closed => TrainState::Closed,
            },
            run: status.note,
        }
    }
}

/// Body of a successful `POST /state`: the request echoed back with the
/// state at the moment it was queued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptedMsg {
    pub body: serde_json::Value,
    pub state: StateMsg,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorsMsg {
    pub errors: Vec<String>,
}

impl ErrorsMsg {
    pub fn new<I, E>(errors: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: ToString,
    {
        Self {
            errors: errors.into_iter().map(|e| e.to_string()).collect(),
        }
    }
}

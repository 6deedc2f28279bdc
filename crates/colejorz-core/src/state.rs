use crate::actuator::Direction;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};

/// Immutable copy of the worker-owned engine state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineSnapshot {
    pub direction: Direction,
    pub duty: u8,
    pub remaining_timed: u32,
    pub running: bool,
}

impl EngineSnapshot {
    pub fn signed_duty(&self) -> i32 {
        i32::from(self.duty) * self.direction.sign()
    }

    /// Console line describing the train, e.g. `Going forward at 42`.
    pub fn describe(&self) -> String {
        match self.direction {
            Direction::Stopped => "Waiting at station!".to_string(),
            dir => format!("Going {} at {:02}", dir.label(), self.duty),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Running,
    Closed,
}

/// What `Engine::status` hands out to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineStatus {
    pub duty: i32,
    pub state: WorkerState,
    pub note: String,
}

impl From<EngineSnapshot> for EngineStatus {
    fn from(snapshot: EngineSnapshot) -> Self {
        let note = if snapshot.remaining_timed > 0 {
            format!("timed run: {} seconds remaining", snapshot.remaining_timed)
        } else {
            "no pending instruction".to_string()
        };
        Self {
            duty: snapshot.signed_duty(),
            state: if snapshot.running {
                WorkerState::Running
            } else {
                WorkerState::Closed
            },
            note,
        }
    }
}

/// Single-writer slot the worker republishes into after every step.
#[derive(Debug, Default)]
pub struct StateExchange {
    snapshot: Mutex<EngineSnapshot>,
}

impl StateExchange {
    pub fn new(initial: EngineSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(initial),
        }
    }

    fn slot(&self) -> MutexGuard<'_, EngineSnapshot> {
        self.snapshot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Called by the worker.
    pub fn publish_state(&self, state: EngineSnapshot) {
        *self.slot() = state;
    }

    pub fn read_state(&self) -> EngineSnapshot {
        *self.slot()
    }

    pub(crate) fn mark_stopped(&self) {
        self.slot().running = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_duty_follows_direction() {
        let snap = EngineSnapshot {
            direction: Direction::Backward,
            duty: 40,
            remaining_timed: 0,
            running: true,
        };
        assert_eq!(snap.signed_duty(), -40);
        assert_eq!(snap.describe(), "Going backward at 40");
    }

    #[test]
    fn status_note_reports_timed_run() {
        let snap = EngineSnapshot {
            direction: Direction::Forward,
            duty: 50,
            remaining_timed: 7,
            running: true,
        };
        let status = EngineStatus::from(snap);
        assert_eq!(status.duty, 50);
        assert_eq!(status.state, WorkerState::Running);
        assert_eq!(status.note, "timed run: 7 seconds remaining");
    }

    #[test]
    fn closed_when_worker_gone() {
        let exchange = StateExchange::new(EngineSnapshot {
            running: true,
            ..Default::default()
        });
        exchange.mark_stopped();
        let status = EngineStatus::from(exchange.read_state());
        assert_eq!(status.state, WorkerState::Closed);
        assert_eq!(status.note, "no pending instruction");
        assert_eq!(EngineSnapshot::default().describe(), "Waiting at station!");
    }
}

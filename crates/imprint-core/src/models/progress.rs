use serde::{Deserialize, Serialize};

/// Phase of the simulated training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrainingState {
    Idle,
    Running,
    Done,
}

/// Snapshot of training progress for one session.
///
/// `is_running` and `is_ready` are never both set; both unset means training
/// has not started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionProgress {
    pub percent: u8,
    pub is_running: bool,
    pub is_ready: bool,
}

impl SessionProgress {
    pub fn running() -> Self {
        Self {
            percent: 0,
            is_running: true,
            is_ready: false,
        }
    }

    pub fn state(&self) -> TrainingState {
        if self.is_ready {
            TrainingState::Done
        } else if self.is_running {
            TrainingState::Running
        } else {
            TrainingState::Idle
        }
    }
}

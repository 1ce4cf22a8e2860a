// src/dag/scheduler_step.rs

//! Result type of a single `schedule_next` round.

/// What one `schedule_next` call did, by phase-local task index.
///
/// Useful for tests that step a phase manually and make assertions about
/// what changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundReport {
    /// Tasks whose `execute` was launched this round.
    pub launched: Vec<usize>,
    /// Tasks that reached rank zero already resolved and were not launched.
    pub finalized: Vec<usize>,
    /// Tasks whose `will_execute` hook failed.
    pub failed: Vec<usize>,
}

impl RoundReport {
    pub fn is_empty(&self) -> bool {
        self.launched.is_empty() && self.finalized.is_empty() && self.failed.is_empty()
    }
}

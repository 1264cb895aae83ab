use std::fmt;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SyncStatus {
    #[default]
    Preparing,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl SyncStatus {
    /// `Preparing` and `Running` are the only active states.
    pub fn is_active(self) -> bool {
        matches!(self, SyncStatus::Preparing | SyncStatus::Running)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SyncStatus::Completed | SyncStatus::Failed | SyncStatus::Cancelled
        )
    }

    pub fn display_name(self) -> &'static str {
        match self {
            SyncStatus::Preparing => "preparing",
            SyncStatus::Running => "syncing",
            SyncStatus::Paused => "paused",
            SyncStatus::Completed => "completed",
            SyncStatus::Failed => "sync failed",
            SyncStatus::Cancelled => "cancelled",
        }
    }

    fn can_transition_to(self, to: SyncStatus) -> bool {
        use SyncStatus::*;
        match (self, to) {
            (Preparing, Running) => true,
            (Running, Paused) | (Paused, Running) => true,
            (Running | Paused, Completed) => true,
            (Preparing | Running | Paused, Failed | Cancelled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal session transition {from:?} -> {to:?}")]
pub struct TransitionError {
    pub from: SyncStatus,
    pub to: SyncStatus,
}

/// One sync run. Owned exclusively by the controller state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSession {
    id: String,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    total_count: u64,
    synced_count: u64,
    status: SyncStatus,
    error_message: Option<String>,
}

impl SyncSession {
    pub fn new(id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            start_time: now,
            end_time: None,
            total_count: 0,
            synced_count: 0,
            status: SyncStatus::Preparing,
            error_message: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn synced_count(&self) -> u64 {
        self.synced_count
    }

    pub fn status(&self) -> SyncStatus {
        self.status
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Elapsed run time, available once the session is terminal.
    pub fn duration(&self) -> Option<Duration> {
        self.end_time.map(|end| end - self.start_time)
    }

    /// Fraction of the estimated total synced so far, in `0.0..=1.0`.
    pub fn progress(&self) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }
        (self.synced_count as f64 / self.total_count as f64).min(1.0)
    }

    /// Moves to `to` if the state machine allows it. Terminal targets stamp `end_time`.
    pub fn transition(&mut self, to: SyncStatus, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(to) {
            return Err(TransitionError {
                from: self.status,
                to,
            });
        }
        self.status = to;
        if to.is_terminal() {
            self.end_time = Some(now);
        }
        Ok(())
    }

    /// Applies a progress report. Keeps `synced <= total` whenever `total > 0`.
    pub fn apply_progress(&mut self, total: u64, current: u64) {
        self.synced_count = current;
        self.total_count = if total > 0 { total.max(current) } else { 0 };
    }

    /// Applies the final count from a `complete` event.
    pub fn complete(&mut self, total: u64, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.total_count = total;
        if total == 0 || self.synced_count >= total {
            self.transition(SyncStatus::Completed, now)
        } else {
            let message = format!(
                "extraction finished with {} of {} records synced",
                self.synced_count, total
            );
            self.fail(message, now)
        }
    }

    pub fn fail(&mut self, message: impl Into<String>, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.transition(SyncStatus::Failed, now)?;
        self.error_message = Some(message.into());
        Ok(())
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.transition(SyncStatus::Cancelled, now)
    }
}

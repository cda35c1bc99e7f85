use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Observed scheduling state of a cron job.
///
/// Unlike `enabled`, which is the durable intent, the status reflects what the
/// scheduler last did with the job:
/// - `Stopped` → `Running` when a timer is registered
/// - `Running` → `Stopped` when the timer is cancelled
/// - any → `Error` when the stored expression can no longer be scheduled
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum JobStatus {
    /// A timer is registered for the job in this process.
    Running,

    /// No timer is registered. Newly created jobs start here.
    #[default]
    Stopped,

    /// The job could not be scheduled, e.g. its stored expression is corrupt.
    Error,
}

impl JobStatus {
    pub const fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// Outcome of a single execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failure,
}

impl RunStatus {
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

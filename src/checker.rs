//! Contract for the health-check sweep a firing job triggers.
//!
//! The checker itself lives outside this crate: it checks whatever targets it
//! is configured with and reports per-target results. The scheduler only needs
//! to know whether the sweep was healthy and how to summarize it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckerError {
    #[error("{0}")]
    Failed(String),
    #[error("checker panicked: {0}")]
    Panicked(String),
}

/// Result of one sweep across all configured targets.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    /// Number of targets checked.
    pub checked: usize,
    /// Targets that reported down.
    pub failed: usize,
    /// Optional free-form detail from the checker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SweepReport {
    pub const fn new(checked: usize, failed: usize) -> Self {
        Self {
            checked,
            failed,
            message: None,
        }
    }

    pub const fn is_ok(&self) -> bool {
        self.failed == 0
    }

    /// Error text recorded on the job when the sweep was not healthy.
    pub fn failure_reason(&self) -> Option<String> {
        if self.is_ok() {
            return None;
        }
        Some(self.message.clone().unwrap_or_else(|| {
            format!("{} of {} targets reported down", self.failed, self.checked)
        }))
    }
}

#[async_trait]
pub trait Checker: Send + Sync {
    /// Check every configured target once.
    async fn sweep(&self) -> Result<SweepReport, CheckerError>;
}

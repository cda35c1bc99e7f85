//! Scheduling of cron jobs.
//!
//! [`CronJobManager`] is the entry point. It persists jobs through the
//! [`JobStore`](crate::store::JobStore) and asks the [`JobScheduler`] to keep
//! exactly one timer per running job. Each fire goes through the
//! [`ExecutionRunner`], which calls the [`Checker`](crate::checker::Checker)
//! and records the outcome.

pub mod manager;
pub mod runner;
pub mod scheduler;
pub mod timer;

pub use manager::CronJobManager;
pub use runner::ExecutionRunner;
pub use scheduler::{JobScheduler, ReconcileReport};
pub use timer::{Clock, TimerDriver, TimerHandle, TokioTimerDriver};

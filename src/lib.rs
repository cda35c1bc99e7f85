//! Healthcron - recurring health-check sweeps on cron schedules
//!
//! Jobs pair a five-field cron expression with an `enabled` flag. While a job
//! runs, every matching minute triggers one sweep of the configured
//! [`Checker`](checker::Checker) and the outcome is kept both on the job and
//! in bounded execution ledgers.

#![allow(missing_docs)]

pub mod app_info;
pub mod boot;
pub mod checker;
pub mod cli;
pub mod commands;
pub mod config;
pub mod cron_expression;
pub mod database;
pub mod environment;
pub mod error;
pub mod jobs;
pub mod models;
pub mod setup_tracing;
pub mod store;

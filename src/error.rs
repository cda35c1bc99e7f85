use thiserror::Error;
use validator::ValidationErrors;

use crate::store::StoreError;

/// Errors surfaced by job lifecycle operations.
///
/// Unknown job ids are not errors: lifecycle calls report them as `None` or
/// `false`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationErrors),
    #[error("Invalid cron expression '{0}'")]
    InvalidCronExpression(String),
    #[error("Persistence error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, Error>;

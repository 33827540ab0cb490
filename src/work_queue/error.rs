//! Work queue error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),
    /// A complete/fail update matched no row: the lease was taken away
    /// (e.g. released by the lease reaper) while the job ran.
    #[error("Lease on job {0} is no longer held by this worker")]
    LeaseLost(String),
}

//! Semaphore helpers shared by the worker pool and tree hashing

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use yama_errors::{Error, InstallError};

/// Acquire a semaphore permit with proper error handling
///
/// # Errors
///
/// Returns an error if the semaphore is closed
pub async fn acquire_semaphore_permit(
    semaphore: Arc<Semaphore>,
    operation: &str,
) -> Result<OwnedSemaphorePermit, Error> {
    semaphore.acquire_owned().await.map_err(|_| {
        InstallError::ConcurrencyError {
            message: format!("failed to acquire semaphore for {operation}"),
        }
        .into()
    })
}

/// Create a semaphore with at least one permit
#[must_use]
pub fn create_semaphore(permits: usize) -> Arc<Semaphore> {
    Arc::new(Semaphore::new(permits.max(1)))
}

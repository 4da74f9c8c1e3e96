//! Conflict-retry executor
//!
//! SERIALIZABLE isolation trades throughput for correctness by aborting
//! conflicting transactions, so retrying is the expected recovery idiom.
//! Only serialization conflicts re-enter the loop; any other failure (bad
//! input, disk failure, peer rejection) surfaces immediately so it is
//! never masked by a blind retry.

use std::future::Future;

use fedvid_core::AppError;

use crate::store::Store;

/// Run `op` against fresh SERIALIZABLE transactions until it succeeds,
/// fails with a non-conflict error, or `max_attempts` consecutive
/// serialization conflicts have been burned.
///
/// Attempts are strictly sequential. The closure owns the transaction for
/// its attempt and must consume it (commit or roll back) before returning;
/// it must also operate on a fresh snapshot of any draft state per call,
/// since a rolled-back attempt invalidates everything resolved inside it.
pub async fn retry_on_conflict<S, F, Fut, T>(
    store: &S,
    max_attempts: u32,
    label: &str,
    mut op: F,
) -> Result<T, AppError>
where
    S: Store,
    F: FnMut(S::Tx) -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let max_attempts = max_attempts.max(1);

    for attempt in 1..=max_attempts {
        let tx = store.begin_serializable().await?;

        match op(tx).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(label, attempt, "succeeded after conflict retries");
                }
                return Ok(value);
            }
            Err(err) if err.is_retryable_conflict() => {
                tracing::debug!(label, attempt, "serialization conflict, will retry");
            }
            Err(err) => return Err(err),
        }
    }

    tracing::warn!(label, max_attempts, "conflict retries exhausted");
    Err(AppError::RetriesExhausted {
        label: label.to_string(),
        attempts: max_attempts,
    })
}

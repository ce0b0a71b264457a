//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap classifier and forwarding calls with a deadline
//! - Cancel the wrapped future cleanly on expiry
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors
//! - A timed-out forward counts as a failed attempt

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// The wrapped operation did not finish before its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation timed out after {}ms", .0.as_millis())]
pub struct Elapsed(pub Duration);

/// Run `fut` with a deadline of `limit`.
pub async fn with_deadline<F, T>(limit: Duration, fut: F) -> Result<T, Elapsed>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(limit, fut).await.map_err(|_| Elapsed(limit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completes_within_deadline() {
        let value = with_deadline(Duration::from_millis(100), async { 7 }).await;
        assert_eq!(value, Ok(7));
    }

    #[tokio::test]
    async fn test_expires() {
        let result = with_deadline(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
        })
        .await;
        let err = result.unwrap_err();
        assert_eq!(err, Elapsed(Duration::from_millis(10)));
        assert_eq!(err.to_string(), "operation timed out after 10ms");
    }
}

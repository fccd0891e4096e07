//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap node calls with a deadline
//! - Cancel the inner future cleanly on expiry
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Expiry maps to `ProbeError::Timeout`, never to a connection error

use std::future::Future;
use std::time::Duration;

use crate::probe::ProbeError;

/// Run `fut` with a deadline of `limit`.
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, ProbeError>
where
    F: Future<Output = Result<T, ProbeError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProbeError::Timeout(limit)),
    }
}

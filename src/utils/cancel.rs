//! Cooperative cancellation helpers

use crate::{MurmurError, Result};
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Await `fut` unless `cancel` fires first.
///
/// The token is checked before the future is polled, so an already-cancelled
/// token never starts the work. Dropping the losing future aborts whatever
/// I/O it had in flight.
pub async fn until_cancelled<F>(cancel: &CancellationToken, fut: F) -> Result<F::Output>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(MurmurError::Cancelled),
        output = fut => Ok(output),
    }
}

//! Timeout constants and the async wrapper every blocking step goes through.

use crate::error::{ProtocolError, Result};
use std::future::Future;
use std::time::Duration;

/// Default bound for connect, each read, and each write on the primary protocol
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bound used by the Evrima dialect
pub const EVRIMA_TIMEOUT: Duration = Duration::from_secs(30);

/// Run `fut` for at most `duration`, mapping expiry to `elapsed`.
///
/// The inner future is dropped on expiry, which cancels the pending I/O.
pub async fn with_timeout<T, F>(duration: Duration, elapsed: ProtocolError, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => Err(elapsed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_elapsed_maps_to_given_error() {
        let result: Result<()> = with_timeout(
            Duration::from_millis(10),
            ProtocolError::ReadTimeout,
            std::future::pending(),
        )
        .await;
        assert!(matches!(result, Err(ProtocolError::ReadTimeout)));
    }

    #[tokio::test]
    async fn test_inner_result_passes_through() {
        let ok = with_timeout(Duration::from_secs(1), ProtocolError::ReadTimeout, async {
            Ok(7)
        })
        .await;
        assert_eq!(ok.unwrap(), 7);

        let err: Result<()> = with_timeout(Duration::from_secs(1), ProtocolError::ReadTimeout, async {
            Err(ProtocolError::EmptyResponse)
        })
        .await;
        assert!(matches!(err, Err(ProtocolError::EmptyResponse)));
    }
}

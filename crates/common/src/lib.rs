use std::future::Future;
use std::time::Duration;

use backoff::ExponentialBackoff;
use snafu::ResultExt;

pub use backoff::Error as RetryError;

#[derive(Debug, snafu::Snafu)]
pub enum InitLoggerError {
    #[snafu(display("Failed to initialize logger: {}", source))]
    LoggerFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

pub fn init_logger(log_level: &str) -> Result<(), InitLoggerError> {
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .try_init()
        .context(LoggerFailedSnafu)?;

    Ok(())
}

/// Run `operation` until it succeeds, fails permanently, or `max_elapsed`
/// has passed since the first attempt. Transient failures are retried with
/// exponential backoff starting at `initial_interval`.
pub async fn retry_with_backoff<T, E, F, Fut>(
    initial_interval: Duration,
    max_elapsed: Duration,
    operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RetryError<E>>>,
{
    let policy = ExponentialBackoff {
        initial_interval,
        current_interval: initial_interval,
        max_elapsed_time: Some(max_elapsed),
        ..ExponentialBackoff::default()
    };

    backoff::future::retry(policy, operation).await
}

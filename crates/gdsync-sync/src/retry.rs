//! Retry executor for single remote calls
//!
//! Wraps a call factory with a status-code-driven policy:
//!
//! | status            | action                                          |
//! |-------------------|-------------------------------------------------|
//! | `< 300`           | success, the payload is returned                |
//! | `3xx`, `429`      | retried after the configured interval, no limit |
//! | `>= 500`          | retried while fewer than the cap have been seen |
//! | other             | permanent failure carrying the status text      |
//!
//! Transport failures (`Err` from the call) are returned immediately.
//! Delays use `tokio::time::sleep`, so concurrent retry sequences never
//! block each other.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use gdsync_core::ports::RemoteResponse;

/// Default number of 5xx responses tolerated before giving up
pub const DEFAULT_MAX_SERVER_ERRORS: u32 = 10;

/// Timing and cap of the retry loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before each retry
    pub interval: Duration,
    /// Number of 5xx responses that may be retried
    pub max_server_errors: u32,
}

impl RetryPolicy {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_server_errors: DEFAULT_MAX_SERVER_ERRORS,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000))
    }
}

/// Failure of a retried remote call
#[derive(Debug, Error)]
pub enum RetryError {
    /// A status that is never retried (4xx other than 429)
    #[error("{operation} failed: {status_text} (HTTP {status})")]
    Permanent {
        operation: String,
        status: u16,
        status_text: String,
    },

    /// Too many server errors in a row
    #[error("{operation} gave up after {server_errors} server errors: {status_text} (HTTP {status})")]
    Exhausted {
        operation: String,
        status: u16,
        status_text: String,
        server_errors: u32,
    },

    /// The call itself failed before producing a status
    #[error("{operation} transport failure: {cause:#}")]
    Transport {
        operation: String,
        cause: anyhow::Error,
    },

    /// The pre-retry hook failed; the sequence is abandoned
    #[error("{operation} pre-retry hook failed: {cause:#}")]
    Hook {
        operation: String,
        cause: anyhow::Error,
    },

    /// A success status arrived without a body
    #[error("{operation} returned HTTP {status} without payload")]
    MissingPayload { operation: String, status: u16 },
}

impl RetryError {
    /// HTTP status of the last response, when there was one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Permanent { status, .. }
            | Self::Exhausted { status, .. }
            | Self::MissingPayload { status, .. } => Some(*status),
            Self::Transport { .. } | Self::Hook { .. } => None,
        }
    }
}

fn is_redirect(status: u16) -> bool {
    (300..400).contains(&status)
}

/// Runs `call` until it succeeds or the policy gives up
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, call: F) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<RemoteResponse<T>>>,
{
    retry_with_hook(
        policy,
        operation,
        call,
        None::<fn() -> std::future::Ready<anyhow::Result<()>>>,
    )
    .await
}

/// Same as [`retry`], awaiting `hook` before every retry delay
///
/// A failing hook aborts the sequence with [`RetryError::Hook`].
pub async fn retry_with_hook<T, F, Fut, H, HFut>(
    policy: &RetryPolicy,
    operation: &str,
    mut call: F,
    mut hook: Option<H>,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<RemoteResponse<T>>>,
    H: FnMut() -> HFut,
    HFut: Future<Output = anyhow::Result<()>>,
{
    let mut server_errors: u32 = 0;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        let response = call().await.map_err(|cause| RetryError::Transport {
            operation: operation.to_string(),
            cause,
        })?;
        let status = response.status;

        if response.is_success() {
            if attempt > 1 {
                info!(operation, attempt, "Remote call succeeded after retry");
            }
            return response.payload.ok_or_else(|| RetryError::MissingPayload {
                operation: operation.to_string(),
                status,
            });
        }

        if is_redirect(status) || status == 429 {
            debug!(operation, status, attempt, "Throttled or redirected, retrying");
        } else if status >= 500 {
            if server_errors >= policy.max_server_errors {
                warn!(operation, status, server_errors, "Server error retry cap reached");
                return Err(RetryError::Exhausted {
                    operation: operation.to_string(),
                    status,
                    status_text: response.status_text,
                    server_errors: server_errors + 1,
                });
            }
            server_errors += 1;
            warn!(
                operation,
                status,
                status_text = %response.status_text,
                server_errors,
                "Server error, retrying"
            );
        } else {
            return Err(RetryError::Permanent {
                operation: operation.to_string(),
                status,
                status_text: response.status_text,
            });
        }

        if let Some(hook) = hook.as_mut() {
            hook().await.map_err(|cause| RetryError::Hook {
                operation: operation.to_string(),
                cause,
            })?;
        }

        tokio::time::sleep(policy.interval).await;
    }
}

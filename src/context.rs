//! Per-request deadline and cancellation.
//!
//! Every call into a port (repository, catalog, gateway) goes through
//! [`RequestContext::run`], so a caller-supplied timeout or cancellation is honored
//! end to end and no operation blocks indefinitely.

use crate::error::{OrderError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    deadline: Option<Instant>,
    cancellation: CancellationToken,
}

impl RequestContext {
    /// A context with no deadline that is only cancelled explicitly.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            cancellation: CancellationToken::new(),
        }
    }

    /// Ties this context to an externally owned token (e.g. a shutdown signal).
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Drives `fut` unless the request is cancelled or its deadline passes first.
    ///
    /// `step` names the I/O being performed and ends up in the error.
    pub async fn run<F, T>(&self, step: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.cancellation.is_cancelled() {
            return Err(OrderError::Cancelled { step });
        }
        match self.deadline {
            Some(deadline) => {
                if deadline <= Instant::now() {
                    return Err(OrderError::DeadlineExceeded { step });
                }
                tokio::select! {
                    biased;
                    _ = self.cancellation.cancelled() => Err(OrderError::Cancelled { step }),
                    outcome = tokio::time::timeout_at(deadline, fut) => match outcome {
                        Ok(result) => result,
                        Err(_) => Err(OrderError::DeadlineExceeded { step }),
                    },
                }
            }
            None => {
                tokio::select! {
                    biased;
                    _ = self.cancellation.cancelled() => Err(OrderError::Cancelled { step }),
                    result = fut => result,
                }
            }
        }
    }
}

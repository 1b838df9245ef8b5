use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::RemoteError;

/// Timeout and retry policy applied to every remote call.
#[derive(Debug, Clone)]
pub struct CallPolicy {
    pub timeout: Duration,
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_attempts: 3,
            backoff: Duration::from_millis(200),
        }
    }
}

/// Carries the host's cancellation signal into remote calls.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    pub cancel: CancellationToken,
    pub policy: CallPolicy,
}

impl CallContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            policy: CallPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: CallPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run a read-only call. Cancellation aborts the in-flight call.
    pub async fn read<T, F, Fut>(&self, operation: &'static str, call: F) -> Result<T, RemoteError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let mut attempt = 1;
        loop {
            if self.is_cancelled() {
                return Err(RemoteError::Cancelled);
            }
            let result = tokio::select! {
                _ = self.cancel.cancelled() => return Err(RemoteError::Cancelled),
                r = tokio::time::timeout(self.policy.timeout, call()) => r,
            };
            match self.settle(operation, result, true, attempt) {
                Some(result) => return result,
                None => {
                    self.pause(attempt).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Run a mutating call. It is never started after cancellation, but once
    /// started it runs to completion (or timeout).
    pub async fn mutate<T, F, Fut>(
        &self,
        operation: &'static str,
        idempotent: bool,
        call: F,
    ) -> Result<T, RemoteError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let mut attempt = 1;
        loop {
            if self.is_cancelled() {
                return Err(RemoteError::Cancelled);
            }
            let result = tokio::time::timeout(self.policy.timeout, call()).await;
            match self.settle(operation, result, idempotent, attempt) {
                Some(result) => return result,
                None => {
                    self.pause(attempt).await;
                    attempt += 1;
                }
            }
        }
    }

    /// `None` means "retry".
    fn settle<T>(
        &self,
        operation: &'static str,
        result: Result<Result<T, RemoteError>, tokio::time::error::Elapsed>,
        retryable: bool,
        attempt: u32,
    ) -> Option<Result<T, RemoteError>> {
        let result = match result {
            Ok(r) => r,
            Err(_) => Err(RemoteError::Timeout { operation }),
        };
        match result {
            Err(e) if retryable && e.is_transient() && attempt < self.policy.max_attempts => {
                tracing::warn!(operation, attempt, error = %e, "retrying remote call");
                None
            }
            other => Some(other),
        }
    }

    async fn pause(&self, attempt: u32) {
        let delay = self.policy.backoff * 2u32.saturating_pow(attempt - 1);
        tokio::time::sleep(delay).await;
    }
}

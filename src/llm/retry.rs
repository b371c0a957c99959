use async_trait::async_trait;
use std::time::Duration;

use super::{CompletionBackend, LlmError};

/// How often a backend call is retried when it times out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Pause between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

/// Wraps a backend with its own timeout-retry policy.
///
/// Only timeouts are retried. Any other failure is returned immediately.
pub struct Retrying<B> {
    inner: B,
    policy: RetryPolicy,
}

impl<B: CompletionBackend> Retrying<B> {
    pub fn new(inner: B, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }
}

#[async_trait]
impl<B: CompletionBackend> CompletionBackend for Retrying<B> {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            tracing::debug!(
                backend = self.inner.name(),
                attempt,
                max_attempts,
                "Calling generation backend"
            );

            match self.inner.complete(system, user).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_timeout() && attempt < max_attempts => {
                    tracing::warn!(
                        backend = self.inner.name(),
                        attempt,
                        "Backend timed out, retrying in {:?}: {}",
                        self.policy.delay,
                        e
                    );
                    tokio::time::sleep(self.policy.delay).await;
                }
                Err(e) if e.is_timeout() => {
                    return Err(LlmError::Timeout(format!(
                        "{} failed to respond after {} attempts",
                        self.inner.name(),
                        max_attempts
                    )));
                }
                Err(e) => return Err(e),
            }
        }

        unreachable!("retry loop always returns")
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        self.inner.health_check().await
    }
}

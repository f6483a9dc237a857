use crate::backends::LlmBackend;
use crate::llm::LlmResponse;
use async_trait::async_trait;
use concerto_core::{ConcertoError, ConcertoResult, Message};
use concerto_skills::SkillDescriptor;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Retry behaviour for a worker's model calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retries per backend before moving to the next one.
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub backoff_base_ms: u64,
    /// Cap on a single backoff delay, in milliseconds.
    pub backoff_max_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 500,
            backoff_max_ms: 30_000,
        }
    }
}

/// Whether an error is transient and worth retrying on the same backend.
///
/// Rate limits (429), server errors (5xx), timeouts and connection failures
/// are transient. Client errors such as 400, 401 or 404 are not.
pub fn is_retryable(err: &ConcertoError) -> bool {
    let ConcertoError::Http(msg) = err else {
        return false;
    };
    let lower = msg.to_lowercase();

    if ["400", "401", "403", "404", "422"]
        .iter()
        .any(|code| lower.contains(code))
    {
        return false;
    }

    ["429", "500", "502", "503", "504", "timeout", "connect"]
        .iter()
        .any(|pattern| lower.contains(pattern))
}

/// Exponential backoff for `attempt` (0-based), capped at `backoff_max_ms`.
pub fn compute_backoff(policy: &RetryPolicy, attempt: u32) -> u64 {
    let delay = policy
        .backoff_base_ms
        .saturating_mul(2u64.saturating_pow(attempt));
    delay.min(policy.backoff_max_ms)
}

/// An [`LlmBackend`] that retries transient errors with exponential backoff
/// and then fails over to the next backend.
///
/// Backends are tried in order. A non-retryable error, or exhausted retries,
/// moves on to the next backend. If every backend fails the last error is
/// returned.
pub struct FailoverBackend {
    backends: Vec<Box<dyn LlmBackend>>,
    policy: RetryPolicy,
}

impl FailoverBackend {
    pub fn new(backends: Vec<Box<dyn LlmBackend>>, policy: RetryPolicy) -> Self {
        Self { backends, policy }
    }
}

#[async_trait]
impl LlmBackend for FailoverBackend {
    async fn chat(
        &self,
        system_prompt: Option<&str>,
        messages: &[Message],
        tools: &[SkillDescriptor],
    ) -> ConcertoResult<LlmResponse> {
        let mut last_err: Option<ConcertoError> = None;

        for (backend_idx, backend) in self.backends.iter().enumerate() {
            for attempt in 0..=self.policy.max_retries {
                match backend.chat(system_prompt, messages, tools).await {
                    Ok(resp) => return Ok(resp),
                    Err(e) => {
                        if !is_retryable(&e) {
                            warn!(
                                backend = backend_idx,
                                attempt,
                                error = %e,
                                "Non-retryable error, moving to next backend"
                            );
                            last_err = Some(e);
                            break;
                        }

                        if attempt < self.policy.max_retries {
                            let delay = compute_backoff(&self.policy, attempt);
                            info!(
                                backend = backend_idx,
                                attempt,
                                delay_ms = delay,
                                error = %e,
                                "Retryable error, backing off"
                            );
                            tokio::time::sleep(Duration::from_millis(delay)).await;
                        }
                        last_err = Some(e);
                    }
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| ConcertoError::Http("no model backends configured".into())))
    }
}

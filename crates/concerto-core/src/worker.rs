use crate::error::ConcertoResult;
use crate::task::{Response, Task};
use async_trait::async_trait;

/// A named unit that produces a [`Response`] for a [`Task`].
///
/// Implementations usually wrap an external call (a language model, a remote
/// service). Retries and transient-failure handling belong inside the
/// implementation; the orchestrator only sees the final outcome. An
/// irrecoverable failure should surface as
/// [`ConcertoError::ExternalCall`](crate::ConcertoError::ExternalCall) naming this worker.
#[async_trait]
pub trait Worker: Send + Sync {
    /// Worker identity. Not required to be unique.
    fn name(&self) -> &str;

    /// Short human-readable description, used by managers and listings.
    fn description(&self) -> &str {
        ""
    }

    async fn respond(&self, task: &Task) -> ConcertoResult<Response>;
}

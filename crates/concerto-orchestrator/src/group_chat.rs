use crate::concurrent::ResponseCallback;
use crate::runtime::{InProcessRuntime, Invocation};
use concerto_core::{ConcertoError, ConcertoResult, InvocationResult, Response, Task, Worker};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{info, warn};
use uuid::Uuid;

/// Decides who speaks next in a group chat and when the chat is over.
pub trait GroupChatManager: Send + Sync {
    /// Index into `members` of the next speaker.
    fn select_next(&self, transcript: &[Response], members: &[Arc<dyn Worker>]) -> usize;

    fn should_terminate(&self, transcript: &[Response]) -> bool;

    /// The response reported as the chat's result. Defaults to the last one.
    fn filter_result(&self, transcript: &[Response]) -> Option<Response> {
        transcript.last().cloned()
    }
}

/// Members speak in order, wrapping around, for a fixed number of turns.
#[derive(Debug, Clone)]
pub struct RoundRobinGroupChatManager {
    max_rounds: usize,
}

impl RoundRobinGroupChatManager {
    pub fn new(max_rounds: usize) -> ConcertoResult<Self> {
        if max_rounds == 0 {
            return Err(ConcertoError::Config(
                "group chat max_rounds must be at least 1".into(),
            ));
        }
        Ok(Self { max_rounds })
    }

    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }
}

impl GroupChatManager for RoundRobinGroupChatManager {
    fn select_next(&self, transcript: &[Response], members: &[Arc<dyn Worker>]) -> usize {
        transcript.len() % members.len().max(1)
    }

    fn should_terminate(&self, transcript: &[Response]) -> bool {
        transcript.len() >= self.max_rounds
    }
}

/// Outcome of a group chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupChatResult {
    pub invocation_id: Uuid,
    /// The response the manager picked as the chat's answer.
    pub result: Response,
    /// Every turn, in speaking order.
    pub transcript: Vec<Response>,
}

/// Members take turns on a shared conversation, one at a time.
///
/// Each turn's task is the original task followed by the transcript so far.
/// A failing turn ends the chat with that worker's error.
pub struct GroupChatOrchestration {
    members: Vec<Arc<dyn Worker>>,
    manager: Arc<dyn GroupChatManager>,
    response_callback: Option<ResponseCallback>,
}

impl GroupChatOrchestration {
    pub fn new(members: Vec<Arc<dyn Worker>>, manager: impl GroupChatManager + 'static) -> Self {
        Self {
            members,
            manager: Arc::new(manager),
            response_callback: None,
        }
    }

    pub fn with_response_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Response) + Send + Sync + 'static,
    {
        self.response_callback = Some(Arc::new(callback));
        self
    }

    pub fn members(&self) -> &[Arc<dyn Worker>] {
        &self.members
    }

    /// Start the chat and return immediately.
    pub fn invoke(&self, task: Task, runtime: &InProcessRuntime) -> ConcertoResult<GroupChatHandle> {
        if self.members.is_empty() {
            return Err(ConcertoError::EmptyMembers);
        }

        let invocation = runtime.begin_invocation()?;
        let invocation_id = invocation.id();
        let transcript = Arc::new(Mutex::new(Vec::new()));

        info!(
            invocation_id = %invocation_id,
            members = self.members.len(),
            "Group chat started"
        );

        let state = DriverState {
            members: self.members.clone(),
            manager: Arc::clone(&self.manager),
            response_callback: self.response_callback.clone(),
            transcript: Arc::clone(&transcript),
            task,
        };
        let join = invocation.spawn_driver(|invocation| drive(state, invocation));

        Ok(GroupChatHandle {
            invocation_id,
            transcript,
            join,
        })
    }
}

struct DriverState {
    members: Vec<Arc<dyn Worker>>,
    manager: Arc<dyn GroupChatManager>,
    response_callback: Option<ResponseCallback>,
    transcript: Arc<Mutex<Vec<Response>>>,
    task: Task,
}

async fn drive(state: DriverState, invocation: Invocation) -> ConcertoResult<GroupChatResult> {
    loop {
        let transcript = state.transcript.lock().clone();
        if state.manager.should_terminate(&transcript) {
            break;
        }

        let index = state.manager.select_next(&transcript, &state.members);
        let speaker = state.members.get(index).cloned().ok_or_else(|| {
            ConcertoError::Runtime(format!(
                "group chat manager selected member {index} of {}",
                state.members.len()
            ))
        })?;
        let speaker_name = speaker.name().to_string();
        let turn = Task::new(render_turn(&state.task, &transcript))?;

        let work = invocation.run(speaker, turn)?;
        let _abort_turn = AbortOnDrop(work.abort_handle());
        let response = match work.join().await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    invocation_id = %invocation.id(),
                    worker = %speaker_name,
                    error = %e,
                    "Group chat turn failed"
                );
                return Err(e.into_external(&speaker_name));
            }
        };

        if let Some(callback) = &state.response_callback {
            callback(&response);
        }
        state.transcript.lock().push(response);
    }

    let transcript = state.transcript.lock().clone();
    let result = state
        .manager
        .filter_result(&transcript)
        .ok_or_else(|| ConcertoError::Runtime("group chat ended without any turns".into()))?;

    info!(
        invocation_id = %invocation.id(),
        turns = transcript.len(),
        "Group chat completed"
    );
    Ok(GroupChatResult {
        invocation_id: invocation.id(),
        result,
        transcript,
    })
}

/// Aborts the current turn if the driver itself is aborted.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn render_turn(task: &Task, transcript: &[Response]) -> String {
    if transcript.is_empty() {
        return task.to_string();
    }
    let mut prompt = format!("{task}\n\n## Conversation so far\n");
    for response in transcript {
        prompt.push_str(&format!("**{}**: {}\n", response.worker_name, response.content));
    }
    prompt
}

/// Handle to a running group chat. Dropping it aborts the chat.
pub struct GroupChatHandle {
    invocation_id: Uuid,
    transcript: Arc<Mutex<Vec<Response>>>,
    join: JoinHandle<ConcertoResult<GroupChatResult>>,
}

impl GroupChatHandle {
    pub fn invocation_id(&self) -> Uuid {
        self.invocation_id
    }

    /// Turns completed so far.
    pub fn transcript(&self) -> Vec<Response> {
        self.transcript.lock().clone()
    }

    /// Wait for the chat to finish, aborting it if `timeout` elapses first.
    ///
    /// The timeout error's partial result holds the turns completed before
    /// the deadline.
    pub async fn get(mut self, timeout: Duration) -> ConcertoResult<GroupChatResult> {
        match tokio::time::timeout(timeout, &mut self.join).await {
            Ok(joined) => Self::joined(joined),
            Err(_) => {
                self.join.abort();
                let mut partial = InvocationResult::new(self.invocation_id);
                partial.responses = self.transcript();
                warn!(
                    invocation_id = %self.invocation_id,
                    turns = partial.responses.len(),
                    "Group chat timed out"
                );
                Err(ConcertoError::OrchestrationTimeout {
                    timeout,
                    partial: Box::new(partial),
                })
            }
        }
    }

    pub async fn join(mut self) -> ConcertoResult<GroupChatResult> {
        let joined = (&mut self.join).await;
        Self::joined(joined)
    }

    fn joined(
        joined: Result<ConcertoResult<GroupChatResult>, tokio::task::JoinError>,
    ) -> ConcertoResult<GroupChatResult> {
        joined.map_err(|e| ConcertoError::Runtime(format!("group chat driver failed: {e}")))?
    }
}

impl Drop for GroupChatHandle {
    fn drop(&mut self) {
        self.join.abort();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_round_robin_rejects_zero_rounds() {
        assert!(matches!(
            RoundRobinGroupChatManager::new(0),
            Err(ConcertoError::Config(_))
        ));
        assert_eq!(RoundRobinGroupChatManager::new(3).unwrap().max_rounds(), 3);
    }

    #[test]
    fn test_render_turn_appends_transcript() {
        let task = Task::new("Write a slogan").unwrap();
        assert_eq!(render_turn(&task, &[]), "Write a slogan");

        let transcript = vec![
            Response::new("Writer", "Drive electric."),
            Response::new("Reviewer", "Too short."),
        ];
        let prompt = render_turn(&task, &transcript);
        assert!(prompt.starts_with("Write a slogan\n\n## Conversation so far\n"));
        assert!(prompt.contains("**Writer**: Drive electric.\n"));
        assert!(prompt.ends_with("**Reviewer**: Too short.\n"));
    }
}

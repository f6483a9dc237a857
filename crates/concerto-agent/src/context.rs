use concerto_core::Message;
use uuid::Uuid;

/// Bounded message history for one conversation thread.
///
/// Oldest messages are dropped once `max_messages` is exceeded. The system
/// prompt is kept separately and never truncated.
pub struct ContextWindow {
    thread_id: Uuid,
    messages: Vec<Message>,
    system_prompt: Option<String>,
    max_messages: usize,
}

impl ContextWindow {
    pub fn new(max_messages: usize) -> Self {
        Self {
            thread_id: Uuid::new_v4(),
            messages: Vec::new(),
            system_prompt: None,
            max_messages: max_messages.max(1),
        }
    }

    pub fn thread_id(&self) -> Uuid {
        self.thread_id
    }

    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.system_prompt = Some(prompt.into());
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.truncate();
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        let msg = Message::user(content, self.thread_id);
        self.push(msg);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn truncate(&mut self) {
        if self.messages.len() > self.max_messages {
            let excess = self.messages.len() - self.max_messages;
            self.messages.drain(..excess);
        }
    }

    /// Rough token estimation (4 chars ≈ 1 token).
    pub fn estimated_tokens(&self) -> usize {
        let sys_tokens = self
            .system_prompt
            .as_ref()
            .map(|s| s.len() / 4)
            .unwrap_or(0);
        let msg_tokens: usize = self.messages.iter().map(|m| m.content.len() / 4).sum();
        sys_tokens + msg_tokens
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncates_oldest() {
        let mut ctx = ContextWindow::new(2);
        ctx.push_user("one");
        ctx.push_user("two");
        ctx.push_user("three");
        let contents: Vec<_> = ctx.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["two", "three"]);
    }

    #[test]
    fn test_messages_share_thread() {
        let mut ctx = ContextWindow::new(10);
        ctx.set_system_prompt("You are terse.");
        ctx.push_user("hi");
        assert_eq!(ctx.messages()[0].thread_id, ctx.thread_id());
        assert_eq!(ctx.system_prompt(), Some("You are terse."));
        assert_eq!(ctx.estimated_tokens(), 3);
        ctx.clear();
        assert!(ctx.is_empty());
    }
}

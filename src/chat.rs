use tracing::debug;

use crate::errors::AppError;
use crate::models::{ChatMessage, MessageRole, NoteId};
use crate::validation::validate_chat_message;

/// Reply shown when a chat turn fails without a more specific message.
pub const CHAT_FAILURE: &str = "Sorry, I encountered an error. Please try again.";

/// Ordered conversation about one note. At most one assistant reply is
/// being streamed at a time; it is always the last message.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatThread {
    note_id: NoteId,
    messages: Vec<ChatMessage>,
    replying: bool,
}

impl ChatThread {
    pub fn new(note_id: NoteId) -> Self {
        Self { note_id, messages: Vec::new(), replying: false }
    }

    pub fn note_id(&self) -> NoteId {
        self.note_id
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_replying(&self) -> bool {
        self.replying
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Replaces the thread with stored history, unless a reply is in flight.
    pub fn load_history(&mut self, history: Vec<ChatMessage>) {
        if self.replying {
            debug!(note_id = self.note_id, "ignoring history load during a reply");
            return;
        }
        self.messages = history;
    }

    /// Validates and appends the user's message, returning its trimmed text.
    pub fn push_user(&mut self, text: &str) -> Result<String, AppError> {
        if self.replying {
            return Err(AppError::invalid_state("a reply is still streaming"));
        }
        let text = validate_chat_message(text)?;
        self.messages.push(ChatMessage::new(MessageRole::User, text.clone()));
        Ok(text)
    }

    /// Appends the empty assistant message the reply streams into.
    pub fn begin_reply(&mut self) {
        self.messages.push(ChatMessage::new(MessageRole::Assistant, String::new()));
        self.replying = true;
    }

    /// Sets the in-flight reply to the accumulated stream text.
    pub fn update_reply(&mut self, accumulated: &str) {
        if let Some(reply) = self.reply_mut() {
            reply.content.clear();
            reply.content.push_str(accumulated);
        }
    }

    pub fn finish_reply(&mut self) {
        self.replying = false;
    }

    /// Ends the reply with an error. An empty reply is replaced by the
    /// message; a partial one is kept and the message follows it.
    pub fn fail_reply(&mut self, message: &str) {
        let message = if message.is_empty() { CHAT_FAILURE } else { message };
        match self.reply_mut() {
            Some(reply) if reply.content.is_empty() => reply.content = message.to_string(),
            _ => {
                let failure = ChatMessage::new(MessageRole::Assistant, message.to_string());
                self.messages.push(failure);
            }
        }
        self.replying = false;
    }

    fn reply_mut(&mut self) -> Option<&mut ChatMessage> {
        if !self.replying {
            return None;
        }
        self.messages.last_mut().filter(|m| m.role == MessageRole::Assistant)
    }
}

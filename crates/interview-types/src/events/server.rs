use crate::{HistoryEntry, SessionId};
use chrono::{DateTime, Utc};

/// `connection_response` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ConnectionResponseEvent {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

impl ConnectionResponseEvent {
    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

/// `joined_session` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct JoinedSessionEvent {
    session_id: SessionId,

    /// Server-side room name, informational only
    #[serde(default)]
    room: Option<String>,
    /// Prior messages, oldest first. May contain `system` entries.
    #[serde(default)]
    conversation_history: Vec<HistoryEntry>,
    #[serde(default)]
    message: Option<String>,
}

impl JoinedSessionEvent {
    pub fn new(session_id: SessionId, conversation_history: Vec<HistoryEntry>) -> Self {
        Self {
            session_id,
            room: None,
            conversation_history,
            message: None,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn room(&self) -> Option<&str> {
        self.room.as_deref()
    }

    pub fn conversation_history(&self) -> &[HistoryEntry] {
        &self.conversation_history
    }

    pub fn into_conversation_history(self) -> Vec<HistoryEntry> {
        self.conversation_history
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

/// `ai_typing` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AiTypingEvent {
    typing: bool,
}

impl AiTypingEvent {
    pub fn new(typing: bool) -> Self {
        Self { typing }
    }

    pub fn typing(&self) -> bool {
        self.typing
    }
}

/// `ai_chunk` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AiChunkEvent {
    /// The next fragment of the assistant's answer
    chunk: String,
}

impl AiChunkEvent {
    pub fn new(chunk: &str) -> Self {
        Self {
            chunk: chunk.to_string(),
        }
    }

    pub fn chunk(&self) -> &str {
        &self.chunk
    }

    pub fn into_chunk(self) -> String {
        self.chunk
    }
}

/// `ai_complete` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AiCompleteEvent {
    /// The full stored assistant message
    #[serde(default)]
    message: Option<HistoryEntry>,
    /// Instant the assistant message was recorded
    timestamp: DateTime<Utc>,
}

impl AiCompleteEvent {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            message: None,
            timestamp,
        }
    }

    pub fn message(&self) -> Option<&HistoryEntry> {
        self.message.as_ref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// `session_ended` event
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SessionEndedEvent {
    #[serde(default)]
    session_id: Option<SessionId>,
    #[serde(default)]
    status: Option<String>,
}

impl SessionEndedEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }
}

/// `session_evaluated` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SessionEvaluatedEvent {
    #[serde(default)]
    session_id: Option<SessionId>,

    /// Markdown evaluation produced by the backend
    #[serde(default)]
    evaluation: String,
}

impl SessionEvaluatedEvent {
    pub fn new(evaluation: &str) -> Self {
        Self {
            session_id: None,
            evaluation: evaluation.to_string(),
        }
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id
    }

    pub fn evaluation(&self) -> &str {
        &self.evaluation
    }

    pub fn into_evaluation(self) -> String {
        self.evaluation
    }
}

/// `error` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ErrorEvent {
    /// Human readable description, usually localized by the backend
    message: String,
}

impl ErrorEvent {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn into_message(self) -> String {
        self.message
    }
}

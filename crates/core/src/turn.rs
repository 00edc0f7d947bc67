use chrono::{DateTime, Utc};
use interview_types::{HistoryEntry, Role};

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TurnKind {
    #[default]
    Normal,
    Error,
    Evaluation,
}

/// One message unit of the interview transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    speaker: Speaker,
    content: String,
    timestamp: DateTime<Utc>,
    kind: TurnKind,
    /// Generated locally for feedback, never sent or stored (the "evaluating" notice).
    synthetic: bool,
    /// For error turns, the user text that can be sent again.
    retry: Option<String>,
}

impl Turn {
    fn new(speaker: Speaker, content: &str, timestamp: DateTime<Utc>, kind: TurnKind) -> Self {
        Self {
            speaker,
            content: content.to_string(),
            timestamp,
            kind,
            synthetic: false,
            retry: None,
        }
    }

    pub fn user(content: &str, timestamp: DateTime<Utc>) -> Self {
        Self::new(Speaker::User, content, timestamp, TurnKind::Normal)
    }

    pub fn assistant(content: &str, timestamp: DateTime<Utc>) -> Self {
        Self::new(Speaker::Assistant, content, timestamp, TurnKind::Normal)
    }

    pub fn evaluation(content: &str, timestamp: DateTime<Utc>) -> Self {
        Self::new(Speaker::Assistant, content, timestamp, TurnKind::Evaluation)
    }

    pub fn error(message: &str, retry: Option<String>, timestamp: DateTime<Utc>) -> Self {
        let mut turn = Self::new(Speaker::Assistant, message, timestamp, TurnKind::Error);
        turn.retry = retry;
        turn
    }

    pub fn notice(content: &str, timestamp: DateTime<Utc>) -> Self {
        let mut turn = Self::assistant(content, timestamp);
        turn.synthetic = true;
        turn
    }

    /// Converts a stored history entry. `system` entries have no turn.
    pub fn from_history(entry: &HistoryEntry) -> Option<Self> {
        match entry.role() {
            Role::User => Some(Self::user(entry.content(), entry.timestamp())),
            Role::Assistant => Some(Self::assistant(entry.content(), entry.timestamp())),
            Role::System => None,
        }
    }

    pub fn speaker(&self) -> Speaker {
        self.speaker
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn kind(&self) -> TurnKind {
        self.kind
    }

    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    pub fn retry(&self) -> Option<&str> {
        self.retry.as_deref()
    }

    /// Whether the turn takes part in the user/assistant alternation.
    /// Errors, evaluations and local notices are annotations.
    pub fn is_conversational(&self) -> bool {
        self.kind == TurnKind::Normal && !self.synthetic
    }

    pub(crate) fn set_content(&mut self, content: &str) {
        self.content.clear();
        self.content.push_str(content);
    }

    pub(crate) fn set_timestamp(&mut self, timestamp: DateTime<Utc>) {
        self.timestamp = timestamp;
    }
}

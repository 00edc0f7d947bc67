use chrono::{DateTime, Utc};

/// The role of the message sender: "user", "assistant", "system"
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One stored conversation message, as found in `conversation_history`
/// and in the REST history payloads.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct HistoryEntry {
    role: Role,
    content: String,
    /// UTC instant the message was recorded.
    timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(role: Role, content: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            role,
            content: content.to_string(),
            timestamp,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// System prompts are stored alongside the conversation but never shown.
    pub fn is_conversational(&self) -> bool {
        self.role != Role::System
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_entry_keeps_instant() {
        let json = r#"{"role": "assistant", "content": "Chào bạn", "timestamp": "2025-03-01T08:30:00.123456+00:00"}"#;
        let entry: HistoryEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.role(), Role::Assistant);
        assert_eq!(entry.timestamp().timestamp_subsec_micros(), 123456);
        assert!(entry.is_conversational());
    }

    #[test]
    fn test_system_entry_is_not_conversational() {
        let json = r#"{"role": "system", "content": "prompt", "timestamp": "2025-03-01T08:30:00Z"}"#;
        let entry: HistoryEntry = serde_json::from_str(json).unwrap();
        assert!(!entry.is_conversational());
    }
}

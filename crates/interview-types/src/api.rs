//! Payloads of the request/response API under `/api/interview`.

use crate::{HistoryEntry, SessionDescriptor};
use chrono::{DateTime, Utc};

/// `GET /api/interview/session/{id}`
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SessionResponse {
    session: SessionDescriptor,
}

impl SessionResponse {
    pub fn into_session(self) -> SessionDescriptor {
        self.session
    }
}

/// A past session together with its stored conversation.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SessionRecord {
    #[serde(flatten)]
    session: SessionDescriptor,
    #[serde(default)]
    conversation: Vec<HistoryEntry>,
}

impl SessionRecord {
    pub fn session(&self) -> &SessionDescriptor {
        &self.session
    }

    pub fn conversation(&self) -> &[HistoryEntry] {
        &self.conversation
    }
}

/// `GET /api/interview/history`
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    history: Vec<SessionRecord>,
}

impl HistoryResponse {
    pub fn into_history(self) -> Vec<SessionRecord> {
        self.history
    }
}

/// `GET /api/interview/history/{id}`
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SessionDetailResponse {
    session: SessionRecord,
}

impl SessionDetailResponse {
    pub fn into_record(self) -> SessionRecord {
        self.session
    }
}

/// The user's overall assessment across all evaluated sessions.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Assessment {
    #[serde(default)]
    id: Option<i64>,
    assessment_content: String,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl Assessment {
    pub fn content(&self) -> &str {
        &self.assessment_content
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at.or(self.created_at)
    }
}

/// The generate endpoint answers with a plain message instead of a stored
/// assessment when no session has been evaluated yet.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum AssessmentBody {
    Stored(Assessment),
    Notice(String),
}

/// `GET /api/interview/history/assessment` and
/// `POST /api/interview/history/generate-assessment`
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AssessmentResponse {
    assessment: Option<AssessmentBody>,
    #[serde(default)]
    total_sessions: Option<u32>,
}

impl AssessmentResponse {
    pub fn assessment(&self) -> Option<&AssessmentBody> {
        self.assessment.as_ref()
    }

    pub fn into_assessment(self) -> Option<AssessmentBody> {
        self.assessment
    }

    pub fn total_sessions(&self) -> Option<u32> {
        self.total_sessions
    }
}

/// Body of every non-2xx answer.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ApiErrorBody {
    error: String,
}

impl ApiErrorBody {
    pub fn error(&self) -> &str {
        &self.error
    }
}

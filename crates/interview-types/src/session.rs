use chrono::{DateTime, NaiveDateTime, Utc};

/// Numeric identifier of an interview session, as issued by the setup flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct SessionId(i64);

impl SessionId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(Self)
    }
}

/// How the AI interviewer behaves. The wire values are the Vietnamese labels
/// the setup flow stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum InterviewStyle {
    #[serde(rename = "Nghiêm túc")]
    Serious,
    #[serde(rename = "Thân thiện")]
    Friendly,
    #[serde(rename = "Khó tính")]
    Demanding,
}

impl InterviewStyle {
    pub fn label(&self, language: Language) -> &'static str {
        match (self, language) {
            (InterviewStyle::Serious, Language::Vi) => "Nghiêm túc",
            (InterviewStyle::Friendly, Language::Vi) => "Thân thiện",
            (InterviewStyle::Demanding, Language::Vi) => "Khó tính",
            (InterviewStyle::Serious, Language::En) => "Serious",
            (InterviewStyle::Friendly, Language::En) => "Friendly",
            (InterviewStyle::Demanding, Language::En) => "Demanding",
        }
    }
}

/// Language the interviewer answers in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Vi,
    En,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    #[default]
    Standard,
    Personalized,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

/// Immutable description of one interview session.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SessionDescriptor {
    id: SessionId,

    /// Target position, e.g. "Junior". Absent for personalized sessions.
    position: Option<String>,
    /// Target industry, e.g. "IT". Absent for personalized sessions.
    industry: Option<String>,
    style: InterviewStyle,
    language: Language,

    #[serde(default)]
    mode: SessionMode,
    #[serde(default)]
    status: SessionStatus,
    /// Stored result of the last "evaluate" action, if any.
    #[serde(default)]
    evaluation: Option<String>,
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    started_at: Option<NaiveDateTime>,
    #[serde(default)]
    completed_at: Option<NaiveDateTime>,
}

impl SessionDescriptor {
    pub fn new(id: SessionId, style: InterviewStyle, language: Language) -> Self {
        Self {
            id,
            position: None,
            industry: None,
            style,
            language,
            mode: SessionMode::Standard,
            status: SessionStatus::Pending,
            evaluation: None,
            created_at: None,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn with_position(mut self, position: &str) -> Self {
        self.position = Some(position.to_string());
        self
    }

    pub fn with_industry(mut self, industry: &str) -> Self {
        self.industry = Some(industry.to_string());
        self
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn position(&self) -> Option<&str> {
        self.position.as_deref()
    }

    pub fn industry(&self) -> Option<&str> {
        self.industry.as_deref()
    }

    pub fn style(&self) -> InterviewStyle {
        self.style
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn evaluation(&self) -> Option<&str> {
        self.evaluation.as_deref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<NaiveDateTime> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<NaiveDateTime> {
        self.completed_at
    }
}

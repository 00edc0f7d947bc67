use crate::SessionId;

/// Bearer credential attached to every outbound payload. `Debug` never
/// prints the value.
#[derive(Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    pub fn new(token: &str) -> Self {
        Self(token.to_string())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Token([REDACTED])")
    }
}

/// `join_session` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct JoinSessionEvent {
    session_id: SessionId,
    token: Token,
}

impl JoinSessionEvent {
    pub fn new(session_id: SessionId, token: &str) -> Self {
        Self {
            session_id,
            token: Token::new(token),
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn token(&self) -> &Token {
        &self.token
    }
}

/// `send_message` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SendMessageEvent {
    session_id: SessionId,

    /// The user's answer, sent verbatim
    message: String,
    token: Token,
}

impl SendMessageEvent {
    pub fn new(session_id: SessionId, message: &str, token: &str) -> Self {
        Self {
            session_id,
            message: message.to_string(),
            token: Token::new(token),
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn token(&self) -> &Token {
        &self.token
    }
}

/// `end_session` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EndSessionEvent {
    session_id: SessionId,
    token: Token,
}

impl EndSessionEvent {
    pub fn new(session_id: SessionId, token: &str) -> Self {
        Self {
            session_id,
            token: Token::new(token),
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn token(&self) -> &Token {
        &self.token
    }
}

/// `evaluate_session` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EvaluateSessionEvent {
    session_id: SessionId,
    token: Token,
}

impl EvaluateSessionEvent {
    pub fn new(session_id: SessionId, token: &str) -> Self {
        Self {
            session_id,
            token: Token::new(token),
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn token(&self) -> &Token {
        &self.token
    }
}

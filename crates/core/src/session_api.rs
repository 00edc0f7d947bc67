use crate::error::RoomError;
use async_trait::async_trait;
use interview_types::SessionDescriptor;
use interview_types::SessionId;
use interview_types::api::{
    ApiErrorBody, AssessmentBody, AssessmentResponse, HistoryResponse, SessionDetailResponse,
    SessionRecord, SessionResponse,
};
#[cfg(test)]
use mockall::automock;
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("server answered {status}: {message}")]
    Server { status: u16, message: String },
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl ApiError {
    fn from_status(status: StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<ApiErrorBody>(body)
            .map(|b| b.error().to_string())
            .unwrap_or_else(|_| body.trim().to_string());
        match status {
            StatusCode::NOT_FOUND => ApiError::NotFound(message),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Unauthorized(message),
            other => ApiError::Server {
                status: other.as_u16(),
                message,
            },
        }
    }
}

/// Request/response side of the interview backend: session setup lookups and
/// the post-hoc history views.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SessionDirectory: Send + Sync {
    async fn get_session(&self, id: SessionId) -> Result<SessionDescriptor, ApiError>;

    async fn history(&self) -> Result<Vec<SessionRecord>, ApiError>;

    async fn session_detail(&self, id: SessionId) -> Result<SessionRecord, ApiError>;

    async fn assessment(&self) -> Result<Option<AssessmentBody>, ApiError>;

    async fn generate_assessment(&self) -> Result<AssessmentResponse, ApiError>;
}

pub struct HttpSessionDirectory {
    client: Client,
    base_url: String,
    token: SecretString,
}

impl HttpSessionDirectory {
    pub fn new(base_url: &str, token: SecretString) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/interview{}", self.base_url, path)
    }

    async fn parse<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
        let status = resp.status();
        if status.is_success() {
            Ok(resp.json::<T>().await?)
        } else {
            let body = resp.text().await.unwrap_or_default();
            tracing::error!("interview api answered {}: {}", status, body);
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        tracing::debug!("GET {}", path);
        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(self.token.expose_secret())
            .send()
            .await?;
        Self::parse(resp).await
    }
}

#[async_trait]
impl SessionDirectory for HttpSessionDirectory {
    async fn get_session(&self, id: SessionId) -> Result<SessionDescriptor, ApiError> {
        let resp: SessionResponse = self.get(&format!("/session/{}", id)).await?;
        Ok(resp.into_session())
    }

    async fn history(&self) -> Result<Vec<SessionRecord>, ApiError> {
        let resp: HistoryResponse = self.get("/history").await?;
        Ok(resp.into_history())
    }

    async fn session_detail(&self, id: SessionId) -> Result<SessionRecord, ApiError> {
        let resp: SessionDetailResponse = self.get(&format!("/history/{}", id)).await?;
        Ok(resp.into_record())
    }

    async fn assessment(&self) -> Result<Option<AssessmentBody>, ApiError> {
        let resp: AssessmentResponse = self.get("/history/assessment").await?;
        Ok(resp.into_assessment())
    }

    async fn generate_assessment(&self) -> Result<AssessmentResponse, ApiError> {
        tracing::debug!("POST /history/generate-assessment");
        let resp = self
            .client
            .post(self.url("/history/generate-assessment"))
            .bearer_auth(self.token.expose_secret())
            .send()
            .await?;
        Self::parse(resp).await
    }
}

/// Fetches the descriptor a room needs before it can mount.
pub async fn load_descriptor<D: SessionDirectory + ?Sized>(
    directory: &D,
    id: SessionId,
) -> Result<SessionDescriptor, RoomError> {
    match directory.get_session(id).await {
        Ok(descriptor) => Ok(descriptor),
        Err(ApiError::NotFound(_)) => Err(RoomError::SessionNotFound(id)),
        Err(ApiError::Unauthorized(_)) => Err(RoomError::Unauthorized(id)),
        Err(e) => Err(RoomError::Api(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interview_types::{InterviewStyle, Language};
    use mockall::predicate::*;

    #[test]
    fn test_status_mapping_reads_error_body() {
        let not_found = ApiError::from_status(StatusCode::NOT_FOUND, r#"{"error": "Session not found"}"#);
        assert!(matches!(not_found, ApiError::NotFound(ref m) if m == "Session not found"));

        let unauthorized = ApiError::from_status(StatusCode::UNAUTHORIZED, "Token expired");
        assert!(matches!(unauthorized, ApiError::Unauthorized(ref m) if m == "Token expired"));

        match ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, r#"{"error": "boom"}"#) {
            ApiError::Server { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_urls_are_rooted_under_interview_api() {
        let directory = HttpSessionDirectory::new("http://localhost:5000/", SecretString::from("jwt".to_string()));
        assert_eq!(
            directory.url("/session/4"),
            "http://localhost:5000/api/interview/session/4"
        );
    }

    #[tokio::test]
    async fn test_load_descriptor_maps_missing_session() {
        // --- Arrange ---
        let mut directory = MockSessionDirectory::new();
        directory
            .expect_get_session()
            .with(eq(SessionId::new(5)))
            .times(1)
            .returning(|_| Err(ApiError::NotFound("Session not found".to_string())));

        // --- Act ---
        let result = load_descriptor(&directory, SessionId::new(5)).await;

        // --- Assert ---
        assert!(matches!(result, Err(RoomError::SessionNotFound(id)) if id == SessionId::new(5)));
    }

    #[tokio::test]
    async fn test_load_descriptor_returns_session() {
        let mut directory = MockSessionDirectory::new();
        directory.expect_get_session().returning(|id| {
            Ok(SessionDescriptor::new(id, InterviewStyle::Serious, Language::En))
        });

        let descriptor = load_descriptor(&directory, SessionId::new(8)).await.unwrap();

        assert_eq!(descriptor.id(), SessionId::new(8));
        assert_eq!(descriptor.language(), Language::En);
    }
}

use crate::session_api::ApiError;
use interview_types::SessionId;

/// Reasons a room cannot be opened at all.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("session {0} not found")]
    SessionNotFound(SessionId),
    #[error("not allowed to open session {0}")]
    Unauthorized(SessionId),
    #[error(transparent)]
    Api(#[from] ApiError),
}

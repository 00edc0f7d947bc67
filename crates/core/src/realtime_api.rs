use anyhow::Result;
use async_trait::async_trait;
use interview_types::SessionId;
#[cfg(test)]
use mockall::automock;

/// The live connection of one mounted room.
///
/// Implementations hold the bearer credential from construction and attach it
/// to every outbound event; callers only name the session. Sends are
/// fire-and-forget: the outcome arrives later as an inbound event.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SessionTransport: Send {
    async fn join_session(&mut self, session_id: SessionId) -> Result<()>;

    async fn send_message(&mut self, session_id: SessionId, message: String) -> Result<()>;

    async fn end_session(&mut self, session_id: SessionId) -> Result<()>;

    async fn evaluate_session(&mut self, session_id: SessionId) -> Result<()>;

    /// Stops event delivery and closes the connection. Idempotent.
    fn disconnect(&mut self);

    /// Epoch stamped on the events currently being delivered.
    fn epoch(&self) -> u64;
}

pub mod client;
pub mod server;

use client::*;
use server::*;

/// Events emitted by the client. On the wire each one becomes a Socket.IO
/// event packet `["<event>", <data>]`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "join_session")]
    JoinSession(JoinSessionEvent),
    #[serde(rename = "send_message")]
    SendMessage(SendMessageEvent),
    #[serde(rename = "end_session")]
    EndSession(EndSessionEvent),
    #[serde(rename = "evaluate_session")]
    EvaluateSession(EvaluateSessionEvent),
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinSession(_) => "join_session",
            ClientEvent::SendMessage(_) => "send_message",
            ClientEvent::EndSession(_) => "end_session",
            ClientEvent::EvaluateSession(_) => "evaluate_session",
        }
    }
}

/// Events received from the server. `connect` and `close` are produced by the
/// transport itself from the namespace handshake and socket teardown.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "connect")]
    Connected {
        sid: Option<String>,
    },
    #[serde(rename = "close")]
    Close {
        reason: Option<String>,
    },
    #[serde(rename = "connection_response")]
    ConnectionResponse(ConnectionResponseEvent),
    #[serde(rename = "joined_session")]
    JoinedSession(JoinedSessionEvent),
    #[serde(rename = "user_message")]
    UserMessage(crate::HistoryEntry),
    #[serde(rename = "ai_typing")]
    AiTyping(AiTypingEvent),
    #[serde(rename = "ai_chunk")]
    AiChunk(AiChunkEvent),
    #[serde(rename = "ai_complete")]
    AiComplete(AiCompleteEvent),
    #[serde(rename = "session_ended")]
    SessionEnded(SessionEndedEvent),
    #[serde(rename = "session_evaluated")]
    SessionEvaluated(SessionEvaluatedEvent),
    #[serde(rename = "error")]
    Error(ErrorEvent),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Connected { .. } => "connect",
            ServerEvent::Close { .. } => "close",
            ServerEvent::ConnectionResponse(_) => "connection_response",
            ServerEvent::JoinedSession(_) => "joined_session",
            ServerEvent::UserMessage(_) => "user_message",
            ServerEvent::AiTyping(_) => "ai_typing",
            ServerEvent::AiChunk(_) => "ai_chunk",
            ServerEvent::AiComplete(_) => "ai_complete",
            ServerEvent::SessionEnded(_) => "session_ended",
            ServerEvent::SessionEvaluated(_) => "session_evaluated",
            ServerEvent::Error(_) => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SessionId;

    #[test]
    fn test_client_event_is_tagged_by_name() {
        let event = ClientEvent::SendMessage(SendMessageEvent::new(
            SessionId::new(5),
            "Tôi có 3 năm kinh nghiệm",
            "jwt",
        ));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "send_message");
        assert_eq!(json["data"]["session_id"], 5);
        assert_eq!(json["data"]["message"], "Tôi có 3 năm kinh nghiệm");
        assert_eq!(json["data"]["token"], "jwt");
    }

    #[test]
    fn test_server_event_from_tagged_value() {
        let json = serde_json::json!({
            "event": "joined_session",
            "data": {
                "session_id": 9,
                "room": "session_9",
                "conversation_history": [
                    {"role": "system", "content": "prompt", "timestamp": "2025-03-01T08:30:00+00:00"},
                    {"role": "user", "content": "Xin chào!", "timestamp": "2025-03-01T08:30:01+00:00"}
                ],
                "message": "Đã tham gia phòng phỏng vấn"
            }
        });
        let event: ServerEvent = serde_json::from_value(json).unwrap();
        match event {
            ServerEvent::JoinedSession(joined) => {
                assert_eq!(joined.session_id(), SessionId::new(9));
                assert_eq!(joined.conversation_history().len(), 2);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_server_event_is_rejected() {
        let json = serde_json::json!({"event": "question_popup", "data": {}});
        assert!(serde_json::from_value::<ServerEvent>(json).is_err());
    }

    #[test]
    fn test_token_is_redacted_in_debug_output() {
        let event = ClientEvent::EndSession(EndSessionEvent::new(SessionId::new(1), "secret-jwt"));
        let debug = format!("{:?}", event);
        assert!(!debug.contains("secret-jwt"));
    }
}

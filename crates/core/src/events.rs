use crate::turn::Turn;
use chrono::{DateTime, Utc};
use interview_types::ServerEvent;

/// Inbound signals of a session, independent of the wire format.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected,
    Disconnected,
    /// Prior conversation, `system` entries already removed.
    Joined(Vec<Turn>),
    Typing(bool),
    Chunk(String),
    Complete(DateTime<Utc>),
    Ended,
    Evaluated(String),
    Error(String),
}

/// A transport event stamped with the connection epoch it was received on.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    epoch: u64,
    event: TransportEvent,
}

impl Envelope {
    pub fn new(epoch: u64, event: TransportEvent) -> Self {
        Self { epoch, event }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn event(&self) -> &TransportEvent {
        &self.event
    }

    pub fn into_event(self) -> TransportEvent {
        self.event
    }
}

/// Maps a decoded wire event. Informational events have no counterpart.
pub fn decode_server_event(event: ServerEvent) -> Option<TransportEvent> {
    match event {
        ServerEvent::Connected { .. } => Some(TransportEvent::Connected),
        ServerEvent::Close { .. } => Some(TransportEvent::Disconnected),
        ServerEvent::JoinedSession(joined) => {
            let turns = joined
                .conversation_history()
                .iter()
                .filter_map(Turn::from_history)
                .collect();
            Some(TransportEvent::Joined(turns))
        }
        ServerEvent::AiTyping(typing) => Some(TransportEvent::Typing(typing.typing())),
        ServerEvent::AiChunk(chunk) => Some(TransportEvent::Chunk(chunk.into_chunk())),
        ServerEvent::AiComplete(complete) => Some(TransportEvent::Complete(complete.timestamp())),
        ServerEvent::SessionEnded(_) => Some(TransportEvent::Ended),
        ServerEvent::SessionEvaluated(evaluated) => {
            Some(TransportEvent::Evaluated(evaluated.into_evaluation()))
        }
        ServerEvent::Error(error) => Some(TransportEvent::Error(error.into_message())),
        ServerEvent::ConnectionResponse(response) => {
            tracing::debug!("connection_response: {}", response.status());
            None
        }
        ServerEvent::UserMessage(entry) => {
            tracing::debug!("user_message echo at {}", entry.timestamp());
            None
        }
    }
}

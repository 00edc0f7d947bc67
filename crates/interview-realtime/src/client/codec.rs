//! Engine.IO v4 / Socket.IO v5 text framing over a WebSocket.
//!
//! Every text frame starts with an Engine.IO packet type digit. Type `4`
//! (message) carries a Socket.IO packet, whose first digit is its own type:
//! `40` namespace connect, `41` disconnect, `42["name",{..}]` event,
//! `44{..}` connect error. Binary attachments and acks are not used by the
//! interview server and are reported as unsupported.

use crate::types::{ClientEvent, ServerEvent};
use serde_json::{json, Value};

pub const PING: &str = "2";
pub const PONG: &str = "3";
pub const DISCONNECT: &str = "41";

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("empty frame")]
    Empty,
    #[error("unknown engine.io packet type '{0}'")]
    UnknownEnginePacket(char),
    #[error("unsupported socket.io packet type '{0}'")]
    UnsupportedSocketPacket(char),
    #[error("event packet is not a [name, data] array: {0}")]
    MalformedEvent(String),
    #[error("failed to decode event '{name}': {source}")]
    Event {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Engine.IO `open` packet payload.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

#[derive(Debug, Clone)]
pub enum Packet {
    Open(Handshake),
    Close,
    Ping,
    Pong,
    Noop,
    Connect { sid: Option<String> },
    Disconnect,
    Event(ServerEvent),
    ConnectError(String),
}

pub fn decode(text: &str) -> Result<Packet, CodecError> {
    let mut chars = text.chars();
    let kind = chars.next().ok_or(CodecError::Empty)?;
    let rest = chars.as_str();
    match kind {
        '0' => Ok(Packet::Open(serde_json::from_str(rest)?)),
        '1' => Ok(Packet::Close),
        '2' => Ok(Packet::Ping),
        '3' => Ok(Packet::Pong),
        '4' => decode_socket_packet(rest),
        '6' => Ok(Packet::Noop),
        other => Err(CodecError::UnknownEnginePacket(other)),
    }
}

fn decode_socket_packet(text: &str) -> Result<Packet, CodecError> {
    let mut chars = text.chars();
    let kind = chars.next().ok_or(CodecError::Empty)?;
    let body = payload(chars.as_str());
    match kind {
        '0' => {
            let sid = if body.is_empty() {
                None
            } else {
                serde_json::from_str::<Value>(body)?
                    .get("sid")
                    .and_then(|v| v.as_str())
                    .map(String::from)
            };
            Ok(Packet::Connect { sid })
        }
        '1' => Ok(Packet::Disconnect),
        '2' => decode_event(body).map(Packet::Event),
        '4' => {
            let value = serde_json::from_str::<Value>(body).unwrap_or(Value::String(body.to_string()));
            let message = match &value {
                Value::String(s) => s.clone(),
                other => other
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(String::from)
                    .unwrap_or_else(|| other.to_string()),
            };
            Ok(Packet::ConnectError(message))
        }
        other => Err(CodecError::UnsupportedSocketPacket(other)),
    }
}

// Skips an optional "/namespace," prefix and an optional ack id.
fn payload(body: &str) -> &str {
    let body = if body.starts_with('/') {
        body.split_once(',').map(|(_, rest)| rest).unwrap_or("")
    } else {
        body
    };
    body.trim_start_matches(|c: char| c.is_ascii_digit())
}

fn decode_event(body: &str) -> Result<ServerEvent, CodecError> {
    let value: Value = serde_json::from_str(body)?;
    let array = value
        .as_array()
        .ok_or_else(|| CodecError::MalformedEvent(body.to_string()))?;
    let name = array
        .first()
        .and_then(|v| v.as_str())
        .ok_or_else(|| CodecError::MalformedEvent(body.to_string()))?;
    let data = array.get(1).cloned().unwrap_or(Value::Null);

    serde_json::from_value(json!({ "event": name, "data": data })).map_err(|source| {
        CodecError::Event {
            name: name.to_string(),
            source,
        }
    })
}

pub fn encode_event(event: &ClientEvent) -> Result<String, CodecError> {
    let value = serde_json::to_value(event)?;
    let data = value.get("data").cloned().unwrap_or(Value::Null);
    Ok(format!("42{}", serde_json::to_string(&json!([event.name(), data]))?))
}

/// Namespace connect packet. The token travels in the `auth` payload.
pub fn encode_connect(token: &str) -> String {
    if token.is_empty() {
        "40".to_string()
    } else {
        format!("40{}", json!({ "token": token }))
    }
}

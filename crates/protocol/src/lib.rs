//! Wire protocol spoken between the relay gateway and its clients.
//!
//! Every frame is a JSON object carried in a WebSocket text message and
//! tagged by its `type` field. Clients send [`ClientFrame`]s; the gateway
//! answers with [`ServerFrame`]s.

use {
    serde::{Deserialize, Deserializer, Serialize},
    serde_json::Value,
};

pub const PROTOCOL_VERSION: u32 = 1;

/// A session admits at most this many chat participants.
pub const MAX_OCCUPANTS: usize = 2;

/// Display name given to a participant whose join request carries none.
pub const DEFAULT_DISPLAY_NAME: &str = "Anonymous";

/// Inbound text frames above this size are dropped as protocol errors.
pub const MAX_FRAME_BYTES: usize = 64 * 1024;

// ── Client → server ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientFrame {
    /// Attach as the passive status monitor.
    MonitorAttach,
    /// Ask to occupy a slot in the session identified by `code`.
    Join {
        code: String,
        #[serde(
            default,
            deserialize_with = "lenient_display_name",
            skip_serializing_if = "Option::is_none"
        )]
        display_name: Option<String>,
    },
    /// Chat content to relay to the counterpart.
    Chat { message: String },
    /// Explicit disconnect.
    Leave,
}

impl ClientFrame {
    /// Every `type` tag a client may send.
    pub const KNOWN_TYPES: &'static [&'static str] = &["monitor-attach", "join", "chat", "leave"];

    pub fn kind(&self) -> &'static str {
        match self {
            Self::MonitorAttach => "monitor-attach",
            Self::Join { .. } => "join",
            Self::Chat { .. } => "chat",
            Self::Leave => "leave",
        }
    }
}

/// Anything other than a string (a number, `null`, an object) counts as no name.
fn lenient_display_name<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(name) => Some(name),
        _ => None,
    })
}

// ── Server → client ──────────────────────────────────────────────────────────

/// Why a join request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    InvalidCode,
    SessionFull,
}

impl RejectReason {
    pub fn description(self) -> &'static str {
        match self {
            Self::InvalidCode => "Invalid session code",
            Self::SessionFull => "Session is full (2 clients maximum)",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerFrame {
    /// Current (or freshly regenerated) session code. Monitor only.
    CodeAnnounce { code: String },
    /// Occupancy snapshot. Monitor only.
    Status {
        connected_count: usize,
        max: usize,
        names: Vec<String>,
    },
    JoinAccepted {
        slot: u8,
        waiting_for_other: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        other_name: Option<String>,
    },
    JoinRejected {
        reason: RejectReason,
        message: String,
    },
    /// Sent to the waiting occupant once the second one arrives.
    CounterpartJoined { other_name: String },
    /// Sent to both occupants when the pairing completes.
    ChatReady { message: String },
    ChatRelay { message: String, sender: String },
    /// The session was torn down; the server closes the connection next.
    SessionEnded { reason: String },
    ServerShutdown { reason: String },
}

impl ServerFrame {
    pub fn join_rejected(reason: RejectReason) -> Self {
        Self::JoinRejected {
            reason,
            message: reason.description().to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::CodeAnnounce { .. } => "code-announce",
            Self::Status { .. } => "status",
            Self::JoinAccepted { .. } => "join-accepted",
            Self::JoinRejected { .. } => "join-rejected",
            Self::CounterpartJoined { .. } => "counterpart-joined",
            Self::ChatReady { .. } => "chat-ready",
            Self::ChatRelay { .. } => "chat-relay",
            Self::SessionEnded { .. } => "session-ended",
            Self::ServerShutdown { .. } => "server-shutdown",
        }
    }

    /// Serialize for the wire.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ── Decoding ─────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame of {len} bytes exceeds the {max} byte limit", max = MAX_FRAME_BYTES)]
    TooLarge { len: usize },
    #[error("frame is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("frame is not a JSON object")]
    NotAnObject,
    #[error("frame has no string `type` field")]
    MissingType,
    #[error("unknown frame type: {0}")]
    UnknownType(String),
    #[error("invalid fields for `{kind}` frame: {source}")]
    InvalidFields {
        kind: String,
        source: serde_json::Error,
    },
}

/// Parse an inbound text frame.
///
/// The `type` tag is checked before the body so that frames of a type this
/// gateway does not speak can be told apart from broken ones.
pub fn decode_client_frame(raw: &str) -> Result<ClientFrame, FrameError> {
    if raw.len() > MAX_FRAME_BYTES {
        return Err(FrameError::TooLarge { len: raw.len() });
    }
    let value: Value = serde_json::from_str(raw)?;
    let kind = match value.as_object() {
        None => return Err(FrameError::NotAnObject),
        Some(obj) => match obj.get("type") {
            Some(Value::String(kind)) => kind.clone(),
            _ => return Err(FrameError::MissingType),
        },
    };
    if !ClientFrame::KNOWN_TYPES.contains(&kind.as_str()) {
        return Err(FrameError::UnknownType(kind));
    }
    serde_json::from_value(value).map_err(|source| FrameError::InvalidFields { kind, source })
}

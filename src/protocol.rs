//! Wire protocol for the WebSocket command interface.
//!
//! Requests and responses are single JSON text frames:
//!
//! ```json
//! {"command": "OPEN_OBS_STUDIO", "command_uid": "abc-123", "parameter": {...}}
//! {"status": "success", "command_uid": "abc-123", "message": "...", "data": {...}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Correlation token used when a request is too malformed to carry one.
pub const UNKNOWN_UID: &str = "unknown";

/// A decoded client request: correlation token, command, and parameters.
#[derive(Debug, Clone)]
pub struct Command {
    /// Client-chosen correlation token, echoed unchanged in the response.
    pub uid: String,
    pub kind: CommandKind,
    /// Open map of named parameters, interpreted per-command.
    pub params: Map<String, Value>,
}

/// The fixed command set. Unrecognized names are preserved so the
/// dispatcher can echo them back in the error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    ConnectServer,
    DisconnectServer,
    OpenObsStudio,
    GetObsStudioStatus,
    Unknown(String),
}

impl CommandKind {
    fn parse(name: &str) -> Self {
        match name {
            "CONNECT_SERVER" => Self::ConnectServer,
            "DISCONNECT_SERVER" => Self::DisconnectServer,
            "OPEN_OBS_STUDIO" => Self::OpenObsStudio,
            "GET_OBS_STUDIO_STATUS" => Self::GetObsStudioStatus,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// Errors produced while decoding an inbound message.
///
/// `MissingField` carries the correlation token when one was supplied, so
/// callers can distinguish "no token at all" from "token present but the
/// rest of the request is malformed".
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("both 'command' and 'command_uid' are required")]
    MissingField { uid: Option<String> },
}

impl DecodeError {
    /// Best-effort correlation token for the error response. Falls back to
    /// the `"unknown"` sentinel when the request did not supply one.
    pub fn best_effort_uid(&self) -> &str {
        match self {
            Self::InvalidJson(_) => UNKNOWN_UID,
            Self::MissingField { uid } => uid.as_deref().unwrap_or(UNKNOWN_UID),
        }
    }
}

/// Raw request shape as it appears on the wire, before validation.
#[derive(Debug, Deserialize)]
struct RawRequest {
    command: Option<String>,
    command_uid: Option<String>,
    #[serde(default)]
    parameter: Map<String, Value>,
}

/// Decode a raw text message into a [`Command`].
///
/// Fails with [`DecodeError::InvalidJson`] when the payload is not a JSON
/// object, and [`DecodeError::MissingField`] when `command` or `command_uid`
/// is absent or empty.
pub fn decode(raw: &str) -> Result<Command, DecodeError> {
    let req: RawRequest = serde_json::from_str(raw)?;

    let uid = req.command_uid.filter(|u| !u.is_empty());
    let name = req.command.filter(|c| !c.is_empty());

    match (uid, name) {
        (Some(uid), Some(name)) => Ok(Command {
            uid,
            kind: CommandKind::parse(&name),
            params: req.parameter,
        }),
        (uid, _) => Err(DecodeError::MissingField { uid }),
    }
}

/// Response status on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// A response to a single command. Every command produces exactly one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub status: Status,
    pub command_uid: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Response {
    pub fn success(uid: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: Status::Success,
            command_uid: uid.into(),
            message: message.into(),
            data: None,
        }
    }

    pub fn success_with(
        uid: impl Into<String>,
        message: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            data: Some(data),
            ..Self::success(uid, message)
        }
    }

    pub fn error(uid: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            command_uid: uid.into(),
            message: message.into(),
            data: None,
        }
    }

    pub fn error_with(uid: impl Into<String>, message: impl Into<String>, data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::error(uid, message)
        }
    }
}

/// Serialize a response to its wire form. Total: falls back to a minimal
/// hand-built error frame if serialization somehow fails.
pub fn encode(response: &Response) -> String {
    serde_json::to_string(response).unwrap_or_else(|e| {
        tracing::error!(?e, "failed to serialize response");
        format!(
            r#"{{"status":"error","command_uid":"{}","message":"internal serialization error"}}"#,
            UNKNOWN_UID
        )
    })
}

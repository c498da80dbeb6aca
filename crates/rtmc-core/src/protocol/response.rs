//! JSON reply messages.
//!
//! Every reply the card sends is a JSON object.  Two shapes recur:
//!
//! ```json
//! {"status":"OKAY"}
//! {"status":"ERROR","error-message":"authentication failed"}
//! ```
//!
//! for control replies, and
//!
//! ```json
//! {"service":"rtmc-tcp-1.0-emulator","port":65001,"device":"bare-bones-emulator",
//!  "serial_number":"1234ABCD","firmware_version":"0.0.0"}
//! ```
//!
//! (or the empty object `{}`) for discovery replies.
//!
//! The client hands replies back to its caller unmodified, including keys it
//! does not know about, so [`Response`] wraps the raw JSON object rather than
//! a closed set of structs.  [`ControlReply`] and [`DiscoveryInfo`] are the
//! typed views of the two canonical shapes.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Key carrying the reply status.
pub const STATUS_KEY: &str = "status";

/// Key carrying the human-readable error text of an `ERROR` reply.
pub const ERROR_MESSAGE_KEY: &str = "error-message";

/// Errors that can occur while decoding a reply.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The reply text is not valid JSON.
    #[error("malformed JSON reply: {0}")]
    Decode(#[from] serde_json::Error),

    /// The reply is valid JSON but not an object.
    #[error("reply is not a JSON object: {0}")]
    NotAnObject(String),
}

/// Value of the `status` key in control replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "OKAY")]
    Okay,
    #[serde(rename = "ERROR")]
    Error,
}

impl Status {
    /// Returns the wire spelling of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Okay => "OKAY",
            Self::Error => "ERROR",
        }
    }
}

/// Typed view of a `{"status":...}` control reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlReply {
    pub status: Status,
    #[serde(
        rename = "error-message",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub error_message: Option<String>,
}

impl ControlReply {
    pub fn okay() -> Self {
        Self {
            status: Status::Okay,
            error_message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            error_message: Some(message.into()),
        }
    }
}

/// Identity metadata returned by a matching discovery query.
///
/// Field order is the key order on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryInfo {
    /// Service name the discovery pattern was matched against.
    pub service: String,
    /// TCP port of the card's control channel.
    pub port: u16,
    /// Human-readable device name.
    pub device: String,
    pub serial_number: String,
    pub firmware_version: String,
}

/// A JSON object reply.
///
/// Keys keep their insertion order, so replies built here serialize exactly
/// as the wire examples above.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Response(Map<String, Value>);

impl Response {
    /// `{"status":"OKAY"}`
    pub fn okay() -> Self {
        ControlReply::okay().into()
    }

    /// `{"status":"ERROR","error-message":<message>}`
    pub fn error(message: impl Into<String>) -> Self {
        ControlReply::error(message).into()
    }

    /// `{}`
    pub fn empty() -> Self {
        Self(Map::new())
    }

    /// Decodes one reply from its JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Decode`] for malformed JSON and
    /// [`ProtocolError::NotAnObject`] for JSON that is not an object.
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Self::from_value(serde_json::from_str(text)?)
    }

    /// Decodes one reply from the raw bytes of a single receive call.
    ///
    /// # Errors
    ///
    /// Same as [`Response::from_json`]; invalid UTF-8 is a decode error.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Self::from_value(serde_json::from_slice(bytes)?)
    }

    fn from_value(value: Value) -> Result<Self, ProtocolError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(ProtocolError::NotAnObject(other.to_string())),
        }
    }

    /// Encodes the reply as compact JSON text.
    pub fn to_json(&self) -> String {
        self.to_string()
    }

    /// Returns the `status` field if present and a string.
    pub fn status(&self) -> Option<&str> {
        self.0.get(STATUS_KEY).and_then(Value::as_str)
    }

    /// `true` when `status` equals `"OKAY"`.
    pub fn is_okay(&self) -> bool {
        self.status() == Some(Status::Okay.as_str())
    }

    /// Returns the `error-message` field if present and a string.
    pub fn error_message(&self) -> Option<&str> {
        self.0.get(ERROR_MESSAGE_KEY).and_then(Value::as_str)
    }

    /// Returns an arbitrary field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// `true` for the `{}` reply.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrows the underlying JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Interprets the reply as a control reply, if it has that shape.
    pub fn as_control(&self) -> Option<ControlReply> {
        serde_json::from_value(Value::Object(self.0.clone())).ok()
    }

    /// Interprets the reply as a discovery result, if it has that shape.
    pub fn as_discovery(&self) -> Option<DiscoveryInfo> {
        serde_json::from_value(Value::Object(self.0.clone())).ok()
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_string(&self.0).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

impl From<ControlReply> for Response {
    fn from(reply: ControlReply) -> Self {
        let mut map = Map::new();
        map.insert(STATUS_KEY.to_string(), reply.status.as_str().into());
        if let Some(message) = reply.error_message {
            map.insert(ERROR_MESSAGE_KEY.to_string(), message.into());
        }
        Self(map)
    }
}

impl From<DiscoveryInfo> for Response {
    fn from(info: DiscoveryInfo) -> Self {
        let mut map = Map::new();
        map.insert("service".to_string(), info.service.into());
        map.insert("port".to_string(), info.port.into());
        map.insert("device".to_string(), info.device.into());
        map.insert("serial_number".to_string(), info.serial_number.into());
        map.insert("firmware_version".to_string(), info.firmware_version.into());
        Self(map)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

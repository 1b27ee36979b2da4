//! Events carried over YakAPI streams.
//!
//! A stream event is either a JSON value or raw text. The two variants differ
//! in how they travel on the wire: structured payloads are sent as
//! `application/json` and receive an `id` when they are objects without one,
//! text payloads are sent verbatim as `text/plain`.

use serde_json::{Map, Value};
use uuid::Uuid;

/// Field name carrying the event identifier inside structured payloads.
pub const ID_FIELD: &str = "id";

/// Content type used for structured payloads.
pub const JSON_CONTENT_TYPE: &str = "application/json";
/// Content type used for text payloads.
pub const TEXT_CONTENT_TYPE: &str = "text/plain";

/// Body of a stream event.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    /// Raw text, sent and received without JSON framing.
    Text(String),
    /// Any JSON value.
    Structured(Value),
}

impl Payload {
    /// Content type header value for this payload.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Text(_) => TEXT_CONTENT_TYPE,
            Self::Structured(_) => JSON_CONTENT_TYPE,
        }
    }

    /// Returns the `id` field of a structured object payload, if it is a string.
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Structured(Value::Object(map)) => map.get(ID_FIELD).and_then(Value::as_str),
            _ => None,
        }
    }

    /// Returns the JSON value for structured payloads.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Structured(value) => Some(value),
            Self::Text(_) => None,
        }
    }

    /// Returns the text for text payloads.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Structured(_) => None,
        }
    }

    /// Inserts a fresh id into structured objects that lack an `id` field.
    ///
    /// Text payloads and non-object JSON values are returned unchanged.
    pub fn with_assigned_id(self) -> Self {
        match self {
            Self::Structured(Value::Object(mut map)) => {
                if !map.contains_key(ID_FIELD) {
                    map.insert(ID_FIELD.to_string(), Value::String(new_event_id()));
                }
                Self::Structured(Value::Object(map))
            }
            other => other,
        }
    }

    /// Serializes the payload into a request body.
    pub fn to_body(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            Self::Text(text) => Ok(text.clone().into_bytes()),
            Self::Structured(value) => serde_json::to_vec(value),
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self::Structured(value)
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(map: Map<String, Value>) -> Self {
        Self::Structured(Value::Object(map))
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// An event tagged with the stream it belongs to.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    stream: String,
    payload: Payload,
}

impl Event {
    /// Builds an event for `stream`.
    pub fn new(stream: impl Into<String>, payload: impl Into<Payload>) -> Self {
        Self {
            stream: stream.into(),
            payload: payload.into(),
        }
    }

    /// Name of the stream this event belongs to.
    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Event identifier, when the payload carries one.
    pub fn id(&self) -> Option<&str> {
        self.payload.id()
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Splits the event into stream name and payload.
    pub fn into_parts(self) -> (String, Payload) {
        (self.stream, self.payload)
    }
}

/// Generates a time-sortable unique event id.
///
/// UUIDv7 values are monotonic within the process, so ids minted by one
/// publisher never repeat and sort by creation time.
pub fn new_event_id() -> String {
    Uuid::now_v7().to_string()
}

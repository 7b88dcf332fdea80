//! Protocol errors

use thiserror::Error;

/// A REST payload did not match its schema
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Response body was not valid JSON for the endpoint
    #[error("malformed response from {endpoint}: {source}")]
    Malformed {
        /// Endpoint path
        endpoint: String,
        /// Decoder error
        #[source]
        source: serde_json::Error,
    },

    /// A field the operation depends on was absent
    #[error("response from {endpoint} is missing {field}")]
    MissingField {
        /// Endpoint path
        endpoint: String,
        /// Dotted path of the missing field
        field: &'static str,
    },
}

impl ProtocolError {
    /// Create a missing field error
    pub fn missing(endpoint: impl Into<String>, field: &'static str) -> Self {
        Self::MissingField {
            endpoint: endpoint.into(),
            field,
        }
    }

    /// Create a malformed body error
    pub fn malformed(endpoint: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Malformed {
            endpoint: endpoint.into(),
            source,
        }
    }
}

/// A channel frame could not be decoded
#[derive(Debug, Error)]
pub enum FrameError {
    /// Empty text frame
    #[error("empty frame")]
    Empty,

    /// Unknown Engine.IO packet type
    #[error("unknown engine packet type {0:?}")]
    UnknownEngineType(char),

    /// Unknown Socket.IO packet type
    #[error("unknown socket packet type {0:?}")]
    UnknownSocketType(char),

    /// Binary attachments are not used by this channel
    #[error("binary socket packets are not supported")]
    BinaryUnsupported,

    /// Event packet without an event name
    #[error("event packet has no name")]
    MissingEventName,

    /// Payload was not the JSON the packet type requires
    #[error("invalid packet payload: {0}")]
    Payload(#[from] serde_json::Error),
}

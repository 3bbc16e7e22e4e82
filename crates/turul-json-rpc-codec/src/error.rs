use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::error_codes;
use crate::types::ProtocolVersion;

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;

/// Wire error code a [`CodecError`] answers with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonRpcErrorCode {
    ParseError,
    InvalidRequest,
    InvalidParams,
    InternalError,
}

impl JsonRpcErrorCode {
    pub fn code(&self) -> i64 {
        match self {
            JsonRpcErrorCode::ParseError => error_codes::PARSE_ERROR,
            JsonRpcErrorCode::InvalidRequest => error_codes::INVALID_REQUEST,
            JsonRpcErrorCode::InvalidParams => error_codes::INVALID_PARAMS,
            JsonRpcErrorCode::InternalError => error_codes::INTERNAL_ERROR,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            JsonRpcErrorCode::ParseError => "Parse error",
            JsonRpcErrorCode::InvalidRequest => "Invalid Request",
            JsonRpcErrorCode::InvalidParams => "Invalid params",
            JsonRpcErrorCode::InternalError => "Internal error",
        }
    }
}

impl fmt::Display for JsonRpcErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

/// Everything that can go wrong while converting between bytes and messages.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The document could not be parsed, or a field had the wrong JSON shape.
    #[error("Unable to deserialize JSON-RPC message: {reason}")]
    Deserialization {
        reason: String,
        /// The parsed document, when parsing got that far
        document: Option<Value>,
    },

    /// Well-formed JSON that does not follow the active protocol version.
    #[error("Unrecognized JSON-RPC {version} message{}: {document}", .explanation.as_deref().map(|e| format!(" ({})", e)).unwrap_or_default())]
    ProtocolViolation {
        version: ProtocolVersion,
        explanation: Option<String>,
        document: Value,
    },

    /// A single argument failed to materialize to its requested type.
    #[error("Deserializing JSON-RPC argument {} (position {}) into {type_name} failed: {source}", .name.as_deref().unwrap_or("<unnamed>"), .position.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string()))]
    ArgumentDeserialization {
        name: Option<String>,
        position: Option<usize>,
        type_name: String,
        #[source]
        source: Box<CodecError>,
    },

    #[error("Operation not supported: {0}")]
    Unsupported(String),

    #[error("No converter registered for {0}")]
    NoConverter(String),

    #[error("No {0} tracker is configured on this codec")]
    MissingTracker(&'static str),

    #[error("Converter error: {0}")]
    Converter(String),

    /// Another message is already being processed in the same direction.
    #[error("Codec is already {0} a message")]
    SessionBusy(&'static str),

    /// A streamed message grew past the configured size limit.
    #[error("Message exceeds the limit of {limit} bytes")]
    MessageTooLarge { limit: usize },

    #[error("Text encoding error: {0}")]
    Encoding(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    pub fn deserialization(reason: impl Into<String>, document: Option<Value>) -> Self {
        Self::Deserialization {
            reason: reason.into(),
            document,
        }
    }

    pub fn converter(message: impl Into<String>) -> Self {
        Self::Converter(message.into())
    }

    /// The offending document, for diagnostics
    pub fn document(&self) -> Option<&Value> {
        match self {
            Self::Deserialization { document, .. } => document.as_ref(),
            Self::ProtocolViolation { document, .. } => Some(document),
            _ => None,
        }
    }

    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Self::ProtocolViolation { .. })
    }

    /// The codec never retries; any retry policy belongs to the transport.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

/// Trait for errors that can be converted to JSON-RPC error objects
pub trait ToJsonRpcError: std::error::Error + Send + Sync + 'static {
    fn error_code(&self) -> JsonRpcErrorCode;

    /// Convert this error to the `error` member of a JSON-RPC error message
    fn to_error_detail(&self) -> crate::message::ErrorDetail {
        crate::message::ErrorDetail::new(self.error_code().code(), self.to_string())
    }
}

impl ToJsonRpcError for CodecError {
    fn error_code(&self) -> JsonRpcErrorCode {
        match self {
            CodecError::Deserialization { .. } | CodecError::Encoding(_) | CodecError::Json(_) => {
                JsonRpcErrorCode::ParseError
            }
            CodecError::ProtocolViolation { .. } | CodecError::MessageTooLarge { .. } => {
                JsonRpcErrorCode::InvalidRequest
            }
            CodecError::ArgumentDeserialization { .. } => JsonRpcErrorCode::InvalidParams,
            _ => JsonRpcErrorCode::InternalError,
        }
    }
}

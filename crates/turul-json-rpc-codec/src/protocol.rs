//! Protocol-version-aware message classification.

use serde_json::Value;

use crate::JSONRPC_VERSION;
use crate::error::{CodecError, CodecResult};
use crate::types::ProtocolVersion;

/// Which kind of message a document holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Request,
    Result,
    Error,
}

/// Decide what `document` is under `version`.
///
/// JSON-RPC 1.0 has no `jsonrpc` member and always carries an `id`; results
/// and errors are told apart by whether `error` is null. JSON-RPC 2.0 requires
/// `"jsonrpc": "2.0"` and uses the presence of `result` or `error`.
pub fn classify(document: &Value, version: ProtocolVersion) -> CodecResult<MessageKind> {
    let Some(object) = document.as_object() else {
        return Err(violation(version, Some("message must be a JSON object"), document));
    };

    match version {
        ProtocolVersion::V1 => {
            if object.contains_key("jsonrpc") {
                return Err(violation(version, Some("\"jsonrpc\" property not expected"), document));
            }
            if !object.contains_key("id") {
                return Err(violation(version, Some("\"id\" property missing"), document));
            }

            if object.contains_key("method") {
                Ok(MessageKind::Request)
            } else {
                match object.get("error") {
                    Some(Value::Null) => Ok(MessageKind::Result),
                    Some(_) => Ok(MessageKind::Error),
                    None => Err(violation(version, None, document)),
                }
            }
        }
        ProtocolVersion::V2 => {
            if object.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
                return Err(violation(
                    version,
                    Some("\"jsonrpc\" property must be set to \"2.0\""),
                    document,
                ));
            }

            if object.contains_key("method") {
                Ok(MessageKind::Request)
            } else if object.contains_key("result") {
                Ok(MessageKind::Result)
            } else if object.contains_key("error") {
                Ok(MessageKind::Error)
            } else {
                Err(violation(version, None, document))
            }
        }
    }
}

fn violation(version: ProtocolVersion, explanation: Option<&str>, document: &Value) -> CodecError {
    CodecError::ProtocolViolation {
        version,
        explanation: explanation.map(str::to_owned),
        document: document.clone(),
    }
}

//! Configuration types for the message codec

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CodecError, CodecResult};
use crate::types::{ProtocolVersion, TextEncoding};

/// Default limit on how deeply a document may nest
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// serde_json refuses documents nested deeper than this while parsing, so a
/// larger `max_depth` has no effect.
pub const PARSER_DEPTH_CEILING: usize = 128;

/// Default limit on the size of one message read from a stream
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Main codec configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Protocol dialect spoken on this connection. Fixed once the codec is built.
    pub protocol_version: ProtocolVersion,

    /// Text encoding of the bytes on the wire
    pub encoding: TextEncoding,

    /// Documents nested deeper than this are rejected before classification.
    /// Capped at [`PARSER_DEPTH_CEILING`].
    pub max_depth: usize,

    /// Streamed messages larger than this many bytes are rejected before
    /// they are complete
    pub max_message_size: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            protocol_version: ProtocolVersion::V2,
            encoding: TextEncoding::Utf8,
            max_depth: DEFAULT_MAX_DEPTH,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl CodecConfig {
    /// The depth limit actually enforced
    pub fn effective_max_depth(&self) -> usize {
        self.max_depth.min(PARSER_DEPTH_CEILING)
    }

    /// Reject `document` if it nests deeper than the effective limit.
    pub fn check_depth(&self, document: &Value) -> CodecResult<()> {
        let depth = nesting_depth(document);
        let limit = self.effective_max_depth();
        if depth > limit {
            return Err(CodecError::deserialization(
                format!("document nesting depth {} exceeds the limit of {}", depth, limit),
                None,
            ));
        }
        Ok(())
    }
}

fn nesting_depth(value: &Value) -> usize {
    let mut deepest = 0;
    let mut pending: Vec<(&Value, usize)> = vec![(value, 0)];

    while let Some((value, depth)) = pending.pop() {
        deepest = deepest.max(depth);
        match value {
            Value::Array(items) => pending.extend(items.iter().map(|item| (item, depth + 1))),
            Value::Object(members) => pending.extend(members.values().map(|member| (member, depth + 1))),
            _ => {}
        }
    }
    deepest
}

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CodecError, CodecResult};

/// Identifier correlating a request with its result or error.
///
/// `None` is only meaningful on requests, where it marks a notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum RequestId {
    #[default]
    None,
    Number(i64),
    String(String),
}

impl RequestId {
    pub fn is_empty(&self) -> bool {
        matches!(self, RequestId::None)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RequestId::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RequestId::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Read an id from its wire form. Only null, integers and strings are ids.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(RequestId::None),
            Value::String(s) => Some(RequestId::String(s.clone())),
            Value::Number(n) => n.as_i64().map(RequestId::Number),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            RequestId::None => Value::Null,
            RequestId::Number(n) => Value::from(*n),
            RequestId::String(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::None => write!(f, "null"),
            RequestId::String(s) => write!(f, "{}", s),
            RequestId::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        RequestId::String(s)
    }
}

impl Serialize for RequestId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            RequestId::None => serializer.serialize_none(),
            RequestId::Number(n) => serializer.serialize_i64(*n),
            RequestId::String(s) => serializer.serialize_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        RequestId::from_value(&value).ok_or_else(|| {
            serde::de::Error::custom(format!("Invalid JSON-RPC request id: {}", value))
        })
    }
}

/// Coerces string ids on inbound results back to integers.
///
/// Some peers echo our integer ids back as strings. Once this side has sent a
/// request with a string id it is assumed to use string ids on purpose and no
/// coercion happens again for the lifetime of the normalizer.
#[derive(Debug, Default)]
pub struct IdNormalizer {
    observed_string_id: AtomicBool,
}

impl IdNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an outbound request id. The flag never resets.
    pub fn observe_outbound(&self, id: &RequestId) {
        if matches!(id, RequestId::String(_)) {
            self.observed_string_id.store(true, Ordering::Relaxed);
        }
    }

    pub fn has_observed_string_id(&self) -> bool {
        self.observed_string_id.load(Ordering::Relaxed)
    }

    pub fn normalize(&self, id: RequestId) -> RequestId {
        if self.has_observed_string_id() {
            return id;
        }

        match id {
            RequestId::String(s) => match s.parse::<i64>() {
                Ok(n) if n.to_string() == s => RequestId::Number(n),
                _ => RequestId::String(s),
            },
            other => other,
        }
    }
}

/// JSON-RPC protocol version emulated by a codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProtocolVersion {
    V1,
    #[default]
    V2,
}

impl ProtocolVersion {
    pub const SUPPORTED: [ProtocolVersion; 2] = [ProtocolVersion::V1, ProtocolVersion::V2];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolVersion::V1 => "1.0",
            ProtocolVersion::V2 => "2.0",
        }
    }

    pub fn major(&self) -> u8 {
        match self {
            ProtocolVersion::V1 => 1,
            ProtocolVersion::V2 => 2,
        }
    }

    pub fn parse(version: &str) -> CodecResult<Self> {
        match version {
            "1" | "1.0" => Ok(ProtocolVersion::V1),
            "2" | "2.0" => Ok(ProtocolVersion::V2),
            other => {
                let supported: Vec<&str> = Self::SUPPORTED.iter().map(|v| v.as_str()).collect();
                Err(CodecError::Unsupported(format!(
                    "JSON-RPC protocol version {} is not supported. Supported versions: {}",
                    other,
                    supported.join(", ")
                )))
            }
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for ProtocolVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ProtocolVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ProtocolVersion::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Text encoding of the JSON on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextEncoding {
    /// UTF-8 without a byte order mark
    #[default]
    Utf8,
    Utf8WithBom,
    Utf16Le,
    Utf16Be,
}

impl TextEncoding {
    fn preamble(&self) -> &'static [u8] {
        match self {
            TextEncoding::Utf8 => &[],
            TextEncoding::Utf8WithBom => &[0xEF, 0xBB, 0xBF],
            TextEncoding::Utf16Le => &[0xFF, 0xFE],
            TextEncoding::Utf16Be => &[0xFE, 0xFF],
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> CodecResult<String> {
        match self {
            TextEncoding::Utf8 | TextEncoding::Utf8WithBom => {
                let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF][..]).unwrap_or(bytes);
                std::str::from_utf8(bytes)
                    .map(str::to_owned)
                    .map_err(|e| CodecError::Encoding(format!("invalid UTF-8: {}", e)))
            }
            TextEncoding::Utf16Le | TextEncoding::Utf16Be => {
                let bytes = bytes.strip_prefix(self.preamble()).unwrap_or(bytes);
                if bytes.len() % 2 != 0 {
                    return Err(CodecError::Encoding(
                        "UTF-16 input has an odd number of bytes".to_string(),
                    ));
                }
                let units: Vec<u16> = bytes.chunks_exact(2).map(|pair| self.unit(pair)).collect();
                String::from_utf16(&units)
                    .map_err(|e| CodecError::Encoding(format!("invalid UTF-16: {}", e)))
            }
        }
    }

    fn unit(&self, pair: &[u8]) -> u16 {
        match self {
            TextEncoding::Utf16Le => u16::from_le_bytes([pair[0], pair[1]]),
            _ => u16::from_be_bytes([pair[0], pair[1]]),
        }
    }

    /// Length of the byte order mark `bytes` starts with, or 0.
    pub(crate) fn preamble_len(&self, bytes: &[u8]) -> usize {
        let mark: &[u8] = match self {
            TextEncoding::Utf8 | TextEncoding::Utf8WithBom => &[0xEF, 0xBB, 0xBF],
            other => other.preamble(),
        };
        if bytes.starts_with(mark) { mark.len() } else { 0 }
    }

    /// How many leading bytes of a partly received body form whole
    /// characters. Only a truncated final character is held back; invalid
    /// input fails.
    pub(crate) fn whole_char_len(&self, bytes: &[u8]) -> CodecResult<usize> {
        match self {
            TextEncoding::Utf8 | TextEncoding::Utf8WithBom => match std::str::from_utf8(bytes) {
                Ok(_) => Ok(bytes.len()),
                Err(e) if e.error_len().is_none() => Ok(e.valid_up_to()),
                Err(e) => Err(CodecError::Encoding(format!("invalid UTF-8: {}", e))),
            },
            TextEncoding::Utf16Le | TextEncoding::Utf16Be => {
                let even = bytes.len() - bytes.len() % 2;
                // A leading surrogate waits for its pair.
                if even >= 2 && (0xD800..0xDC00).contains(&self.unit(&bytes[even - 2..even])) {
                    return Ok(even - 2);
                }
                Ok(even)
            }
        }
    }

    /// Number of bytes `text` occupies on the wire, without a preamble.
    pub(crate) fn encoded_len(&self, text: &str) -> usize {
        match self {
            TextEncoding::Utf8 | TextEncoding::Utf8WithBom => text.len(),
            TextEncoding::Utf16Le | TextEncoding::Utf16Be => text.encode_utf16().count() * 2,
        }
    }

    pub fn encode(&self, text: &str) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.preamble().len() + text.len());
        out.extend_from_slice(self.preamble());
        match self {
            TextEncoding::Utf8 | TextEncoding::Utf8WithBom => out.extend_from_slice(text.as_bytes()),
            TextEncoding::Utf16Le => text
                .encode_utf16()
                .for_each(|unit| out.extend_from_slice(&unit.to_le_bytes())),
            TextEncoding::Utf16Be => text
                .encode_utf16()
                .for_each(|unit| out.extend_from_slice(&unit.to_be_bytes())),
        }
        out
    }
}

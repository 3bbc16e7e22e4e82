//! # JSON-RPC Message Codec
//!
//! A transport-agnostic codec that turns JSON-RPC 1.0 / 2.0 wire bytes into
//! messages and back. It does not dispatch, frame or multiplex; it sits
//! between the framing layer and the dispatcher of a connection.
//!
//! ## Features
//! - JSON-RPC 1.0 and 2.0 dialects, fixed per codec
//! - Request-id normalization for peers that echo integer ids as strings
//! - Deferred argument typing: arguments stay untyped until a handler asks
//! - Progress sinks, incrementally produced sequences and channels marshaled
//!   as integer tokens through pluggable trackers
//! - Async byte-stream reading and writing with the `async` feature

pub mod arguments;
pub mod codec;
pub mod config;
pub mod converter;
pub mod diagnostics;
pub mod error;
pub mod error_data;
pub mod message;
pub mod prelude;
pub mod protocol;
pub mod session;
pub mod tracker;
pub mod types;

#[cfg(feature = "async")]
mod streaming;

// Re-export main types
pub use arguments::{ArgumentMatch, ParameterInfo};
pub use codec::{MessageCodec, MessageCodecBuilder};
pub use config::CodecConfig;
pub use converter::{ConversionContext, ConverterRegistry, Materialized, MessageConverter, TargetType};
pub use diagnostics::{DiagnosticEvent, DiagnosticSink, TracingDiagnostics};
pub use error::{CodecError, CodecResult, JsonRpcErrorCode, ToJsonRpcError};
pub use error_data::{CommonErrorData, InspectableError, StdErrorView};
pub use message::{Arguments, CustomValue, ErrorDetail, Payload, RpcError, RpcMessage, RpcRequest, RpcResult};
pub use protocol::MessageKind;
pub use session::FormatterState;
pub use types::{IdNormalizer, ProtocolVersion, RequestId, TextEncoding};

/// JSON-RPC 2.0 version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// Method of the notification that reports progress to a tracked sink
pub const PROGRESS_METHOD: &str = "$/progress";

/// Member of a sequence object holding the tracker token
pub const TOKEN_PROPERTY: &str = "token";

/// Member of a sequence object holding the prefetched elements
pub const VALUES_PROPERTY: &str = "values";

/// JSON-RPC 2.0 error codes the codec's own failures map to
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
}

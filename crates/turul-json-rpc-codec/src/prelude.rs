//! # JSON-RPC Codec Prelude
//!
//! Convenient re-exports of the most commonly used types.
//!
//! ```rust
//! use turul_json_rpc_codec::prelude::*;
//! ```

// Codec and configuration
pub use crate::codec::{MessageCodec, MessageCodecBuilder};
pub use crate::config::CodecConfig;
pub use crate::types::{ProtocolVersion, RequestId, TextEncoding};

// Message model
pub use crate::arguments::{ArgumentMatch, ParameterInfo};
pub use crate::message::{Arguments, ErrorDetail, Payload, RpcError, RpcMessage, RpcRequest, RpcResult};

// Conversion and collaborators
pub use crate::converter::{ConversionContext, Materialized, MessageConverter, TargetType};
pub use crate::diagnostics::{DiagnosticEvent, DiagnosticSink};
pub use crate::tracker::{
    ChannelTracker, DispatcherCapabilities, Endpoint, EndpointKind, IncomingSequence,
    PrefetchedSequence, ProgressSink, ProgressTracker, SequenceTracker,
};

// Errors
pub use crate::error::{CodecError, CodecResult, ToJsonRpcError};
pub use crate::error_data::CommonErrorData;

// Standard error codes
pub use crate::error_codes::*;

//! # Message Codec
//!
//! Converts between wire bytes and [`RpcMessage`]s for one connection.
//!
//! Outbound, only user payload (arguments, result, error data) goes through
//! the converter registry; the envelope is assembled afterwards with the
//! fixups the active protocol version requires. Inbound, documents are
//! classified and split into a message shell whose payload stays untyped
//! until someone asks for it.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

use crate::arguments::Materializer;
use crate::config::{CodecConfig, PARSER_DEPTH_CEILING};
use crate::converter::{ConversionContext, ConverterRegistry, MessageConverter};
use crate::diagnostics::{DiagnosticEvent, DiagnosticSink, TracingDiagnostics};
use crate::error::{CodecError, CodecResult};
use crate::message::{Arguments, ErrorDetail, Payload, RpcError, RpcMessage, RpcRequest, RpcResult};
use crate::protocol::{MessageKind, classify};
use crate::session::{FormatterSession, FormatterState};
use crate::tracker::{ChannelTracker, DispatcherCapabilities, ProgressTracker, SequenceTracker, Trackers};
use crate::types::{IdNormalizer, ProtocolVersion, RequestId, TextEncoding};
use crate::{JSONRPC_VERSION, PROGRESS_METHOD};

/// State shared by a codec and every message it has read.
pub(crate) struct CodecShared {
    pub(crate) config: CodecConfig,
    pub(crate) registry: ConverterRegistry,
    pub(crate) trackers: Trackers,
    pub(crate) dispatcher: Option<Arc<dyn DispatcherCapabilities>>,
    pub(crate) diagnostics: Arc<dyn DiagnosticSink>,
    pub(crate) session: FormatterSession,
    pub(crate) ids: IdNormalizer,
}

impl CodecShared {
    /// Built-in converters, no trackers, no dispatcher.
    pub(crate) fn detached() -> Self {
        Self {
            config: CodecConfig::default(),
            registry: ConverterRegistry::new(),
            trackers: Trackers::default(),
            dispatcher: None,
            diagnostics: Arc::new(TracingDiagnostics),
            session: FormatterSession::new(),
            ids: IdNormalizer::new(),
        }
    }

    /// Context for one conversion, seeing the session as it is right now.
    pub(crate) fn context(&self) -> ConversionContext<'_> {
        ConversionContext::new(
            &self.registry,
            &self.trackers,
            self.session.snapshot(),
            self.config.protocol_version,
        )
    }
}

/// JSON-RPC message codec for a single connection.
///
/// At most one message may be serialized and one deserialized at a time;
/// overlapping use of a direction fails with [`CodecError::SessionBusy`].
pub struct MessageCodec {
    shared: Arc<CodecShared>,
}

impl MessageCodec {
    /// A JSON-RPC 2.0 codec with default settings
    pub fn new() -> Self {
        MessageCodecBuilder::new().build()
    }

    pub fn builder() -> MessageCodecBuilder {
        MessageCodecBuilder::new()
    }

    pub fn config(&self) -> &CodecConfig {
        &self.shared.config
    }

    pub fn protocol_version(&self) -> ProtocolVersion {
        self.shared.config.protocol_version
    }

    pub fn encoding(&self) -> TextEncoding {
        self.shared.config.encoding
    }

    /// Ids currently being serialized or deserialized
    pub fn formatter_state(&self) -> FormatterState {
        self.shared.session.snapshot()
    }

    /// Whether a request with a string id has ever been serialized
    pub fn has_transmitted_string_id(&self) -> bool {
        self.shared.ids.has_observed_string_id()
    }

    // ------------------------------------------------------------------
    // Outbound
    // ------------------------------------------------------------------

    /// Serialize `message` to bytes in the configured encoding.
    pub fn serialize(&self, message: &RpcMessage) -> CodecResult<Bytes> {
        let document = self.serialize_value(message)?;
        let text = serde_json::to_string(&document)?;
        trace!(document = %text, "Serialized JSON-RPC message");
        Ok(Bytes::from(self.encoding().encode(&text)))
    }

    /// Serialize `message` to its JSON document.
    pub fn serialize_value(&self, message: &RpcMessage) -> CodecResult<Value> {
        let version = self.protocol_version();
        if let RpcMessage::Request(request) = message {
            self.shared.ids.observe_outbound(&request.id);
        }

        let mut envelope = Map::new();
        if version == ProtocolVersion::V2 {
            envelope.insert("jsonrpc".to_string(), Value::from(JSONRPC_VERSION));
        }

        match message {
            RpcMessage::Request(request) => {
                let params = {
                    let _serializing = self.shared.session.begin_serializing(request.id.clone(), true)?;
                    self.tokenize_arguments(&request.arguments, &self.shared.context())?
                };

                // 1.0 notifications still carry an id, as null.
                if !request.id.is_empty() || version == ProtocolVersion::V1 {
                    envelope.insert("id".to_string(), request.id.to_value());
                }
                envelope.insert("method".to_string(), Value::from(request.method.as_str()));
                if let Some(params) = params {
                    envelope.insert("params".to_string(), params);
                }
            }
            RpcMessage::Result(result) => {
                let value = {
                    let _serializing = self.shared.session.begin_serializing(result.id.clone(), false)?;
                    self.shared.context().tokenize(&result.result)?
                };

                envelope.insert("id".to_string(), result.id.to_value());
                envelope.insert("result".to_string(), value);
                if version == ProtocolVersion::V1 {
                    envelope.insert("error".to_string(), Value::Null);
                }
            }
            RpcMessage::Error(error) => {
                let data = {
                    let _serializing = self.shared.session.begin_serializing(error.id.clone(), false)?;
                    error
                        .error
                        .data
                        .as_ref()
                        .map(|data| self.shared.context().tokenize(data))
                        .transpose()?
                };

                envelope.insert("id".to_string(), error.id.to_value());
                if version == ProtocolVersion::V1 {
                    envelope.insert("result".to_string(), Value::Null);
                }
                let mut detail = Map::new();
                detail.insert("code".to_string(), Value::from(error.error.code));
                detail.insert("message".to_string(), Value::from(error.error.message.as_str()));
                if let Some(data) = data {
                    detail.insert("data".to_string(), data);
                }
                envelope.insert("error".to_string(), Value::Object(detail));
            }
        }

        debug!(
            message_type = message.message_type(),
            id = %message.id(),
            "Serialized JSON-RPC {} message",
            version
        );
        Ok(Value::Object(envelope))
    }

    fn tokenize_arguments(
        &self,
        arguments: &Arguments,
        ctx: &ConversionContext<'_>,
    ) -> CodecResult<Option<Value>> {
        match arguments {
            Arguments::None => Ok(None),
            Arguments::Positional(values) => values
                .iter()
                .map(|value| ctx.tokenize(value))
                .collect::<CodecResult<Vec<_>>>()
                .map(|values| Some(Value::Array(values))),
            Arguments::Named(_) if ctx.protocol_version() == ProtocolVersion::V1 => {
                Err(named_arguments_unsupported())
            }
            Arguments::Named(values) => {
                let mut object = Map::with_capacity(values.len());
                for (name, value) in values {
                    object.insert(name.clone(), ctx.tokenize(value)?);
                }
                Ok(Some(Value::Object(object)))
            }
        }
    }

    /// Always fails.
    ///
    /// Producing text from a message would tokenize its payload a second
    /// time. Serialize once and use [`MessageCodec::preview_text`] on the
    /// bytes instead.
    pub fn json_text(&self, _message: &RpcMessage) -> CodecResult<String> {
        Err(CodecError::Unsupported(
            "JSON text of a message is not available; preview the serialized bytes instead".to_string(),
        ))
    }

    /// Decode already-serialized bytes for display.
    pub fn preview_text(&self, bytes: &[u8]) -> CodecResult<String> {
        self.encoding().decode(bytes)
    }

    // ------------------------------------------------------------------
    // Inbound
    // ------------------------------------------------------------------

    /// Deserialize a message encoded in the configured encoding.
    pub fn deserialize(&self, bytes: &[u8]) -> CodecResult<RpcMessage> {
        self.deserialize_with_encoding(bytes, self.encoding())
    }

    pub fn deserialize_with_encoding(
        &self,
        bytes: &[u8],
        encoding: TextEncoding,
    ) -> CodecResult<RpcMessage> {
        let text = encoding.decode(bytes)?;
        let document: Value = serde_json::from_str(&text)
            .map_err(|e| CodecError::deserialization(e.to_string(), None))?;
        self.deserialize_value(&document)
    }

    /// Deserialize a message from its JSON document.
    pub fn deserialize_value(&self, document: &Value) -> CodecResult<RpcMessage> {
        self.shared.config.check_depth(document)?;
        let version = self.protocol_version();
        let kind = classify(document, version)?;
        let object = document
            .as_object()
            .ok_or_else(|| CodecError::deserialization("message must be a JSON object", Some(document.clone())))?;

        let message = match kind {
            MessageKind::Request => RpcMessage::Request(self.read_request(object, document)?),
            MessageKind::Result => RpcMessage::Result(self.read_result(object, document)?),
            MessageKind::Error => RpcMessage::Error(self.read_error(object, document)?),
        };

        debug!(
            message_type = message.message_type(),
            id = %message.id(),
            "Deserialized JSON-RPC {} message",
            version
        );
        Ok(message)
    }

    fn read_request(&self, object: &Map<String, Value>, document: &Value) -> CodecResult<RpcRequest> {
        let id = read_id(object.get("id"), document)?;
        let method = object
            .get("method")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("\"method\" must be a string", document))?;

        let arguments = match object.get("params") {
            Some(Value::Object(_)) if self.protocol_version() == ProtocolVersion::V1 => {
                return Err(named_arguments_unsupported());
            }
            Some(Value::Object(params)) => Arguments::Named(
                params
                    .iter()
                    .map(|(name, value)| (name.clone(), Payload::Json(value.clone())))
                    .collect(),
            ),
            Some(Value::Array(params)) => {
                Arguments::Positional(params.iter().cloned().map(Payload::Json).collect())
            }
            _ => Arguments::None,
        };

        if method == PROGRESS_METHOD {
            self.report_progress(&arguments);
        }

        Ok(RpcRequest {
            id,
            method: method.to_string(),
            arguments,
            materializer: self.materializer(),
        })
    }

    fn read_result(&self, object: &Map<String, Value>, document: &Value) -> CodecResult<RpcResult> {
        let id = self.shared.ids.normalize(read_id(object.get("id"), document)?);
        let result = object.get("result").cloned().unwrap_or(Value::Null);

        Ok(RpcResult {
            id,
            result: Payload::Json(result),
            materializer: self.materializer(),
        })
    }

    fn read_error(&self, object: &Map<String, Value>, document: &Value) -> CodecResult<RpcError> {
        let id = self.shared.ids.normalize(read_id(object.get("id"), document)?);
        let error = object
            .get("error")
            .and_then(Value::as_object)
            .ok_or_else(|| malformed("\"error\" must be an object", document))?;
        let code = error
            .get("code")
            .and_then(Value::as_i64)
            .ok_or_else(|| malformed("\"error.code\" must be an integer", document))?;
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("\"error.message\" must be a string", document))?;

        Ok(RpcError {
            id,
            error: ErrorDetail {
                code,
                message: message.to_string(),
                data: error.get("data").cloned().map(Payload::Json),
                materializer: self.materializer(),
            },
        })
    }

    /// Route a `$/progress` notification to its sink. Never fails the caller.
    fn report_progress(&self, arguments: &Arguments) {
        let Some(tracker) = self.shared.trackers.progress.as_deref() else {
            return;
        };
        if let Err(e) = self.route_progress(tracker, arguments) {
            self.shared.diagnostics.error(
                DiagnosticEvent::ProgressNotificationError,
                &format!("Failed to deliver progress notification: {}", e),
            );
        }
    }

    fn route_progress(&self, tracker: &dyn ProgressTracker, arguments: &Arguments) -> CodecResult<()> {
        let (token, value) = match arguments {
            Arguments::Named(_) => (
                arguments.get(Some("token"), None),
                arguments.get(Some("value"), None),
            ),
            Arguments::Positional(_) => (arguments.get(None, Some(0)), arguments.get(None, Some(1))),
            Arguments::None => (None, None),
        };

        let token = token
            .and_then(Payload::as_json)
            .and_then(Value::as_i64)
            .ok_or_else(|| CodecError::converter("progress notification carries no integer token"))?;

        let Some(registration) = tracker.lookup(token) else {
            trace!(token, "Progress notification for unknown token");
            return Ok(());
        };

        let cell = value.and_then(Payload::as_json).cloned().unwrap_or(Value::Null);
        let value = self.shared.context().materialize(&cell, &registration.value_type)?;
        registration.sink.report(value);
        Ok(())
    }

    fn materializer(&self) -> Materializer {
        Materializer::new(Arc::clone(&self.shared))
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MessageCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageCodec")
            .field("config", &self.shared.config)
            .field("registry", &self.shared.registry)
            .field("trackers", &self.shared.trackers)
            .field("state", &self.shared.session.snapshot())
            .finish()
    }
}

fn read_id(id: Option<&Value>, document: &Value) -> CodecResult<RequestId> {
    match id {
        None => Ok(RequestId::None),
        Some(value) => RequestId::from_value(value)
            .ok_or_else(|| malformed(format!("invalid request id {}", value), document)),
    }
}

fn malformed(reason: impl Into<String>, document: &Value) -> CodecError {
    CodecError::deserialization(reason, Some(document.clone()))
}

fn named_arguments_unsupported() -> CodecError {
    CodecError::Unsupported("parameter objects are not supported in JSON-RPC 1.0".to_string())
}

/// Builder for [`MessageCodec`]
pub struct MessageCodecBuilder {
    config: CodecConfig,
    registry: ConverterRegistry,
    trackers: Trackers,
    dispatcher: Option<Arc<dyn DispatcherCapabilities>>,
    diagnostics: Option<Arc<dyn DiagnosticSink>>,
}

impl MessageCodecBuilder {
    pub fn new() -> Self {
        Self {
            config: CodecConfig::default(),
            registry: ConverterRegistry::new(),
            trackers: Trackers::default(),
            dispatcher: None,
            diagnostics: None,
        }
    }

    pub fn with_config(mut self, config: CodecConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_protocol_version(mut self, version: ProtocolVersion) -> Self {
        self.config.protocol_version = version;
        self
    }

    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.config.encoding = encoding;
        self
    }

    pub fn with_max_message_size(mut self, limit: usize) -> Self {
        self.config.max_message_size = limit;
        self
    }

    /// Add a user converter. User converters are consulted in registration
    /// order, before the built-in ones.
    pub fn with_converter(mut self, converter: Arc<dyn MessageConverter>) -> Self {
        self.registry.register(converter);
        self
    }

    pub fn with_progress_tracker(mut self, tracker: Arc<dyn ProgressTracker>) -> Self {
        self.trackers.progress = Some(tracker);
        self
    }

    pub fn with_sequence_tracker(mut self, tracker: Arc<dyn SequenceTracker>) -> Self {
        self.trackers.sequences = Some(tracker);
        self
    }

    pub fn with_channel_tracker(mut self, tracker: Arc<dyn ChannelTracker>) -> Self {
        self.trackers.channels = Some(tracker);
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn DispatcherCapabilities>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    pub fn build(self) -> MessageCodec {
        if self.config.max_depth > PARSER_DEPTH_CEILING {
            warn!(
                max_depth = self.config.max_depth,
                ceiling = PARSER_DEPTH_CEILING,
                "Configured depth limit is above what the JSON parser accepts; the parser limit applies"
            );
        }
        debug!(
            protocol_version = %self.config.protocol_version,
            converters = ?self.registry.converter_names(),
            "Building JSON-RPC message codec"
        );

        MessageCodec {
            shared: Arc::new(CodecShared {
                config: self.config,
                registry: self.registry,
                trackers: self.trackers,
                dispatcher: self.dispatcher,
                diagnostics: self
                    .diagnostics
                    .unwrap_or_else(|| Arc::new(TracingDiagnostics)),
                session: FormatterSession::new(),
                ids: IdNormalizer::new(),
            }),
        }
    }
}

impl Default for MessageCodecBuilder {
    fn default() -> Self {
        Self::new()
    }
}

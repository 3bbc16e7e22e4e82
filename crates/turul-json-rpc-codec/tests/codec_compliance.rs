//! Codec compliance tests
//!
//! Exercises the codec end to end through its public API, with in-memory
//! trackers standing in for the connection's progress, sequence and channel
//! bookkeeping.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Deserialize;
use serde_json::{Value, json};

use turul_json_rpc_codec::prelude::*;
use turul_json_rpc_codec::tracker::{DuplexChannel, ProgressRegistration};
use turul_json_rpc_codec::{CustomValue, FormatterState};

// ---------------------------------------------------------------------------
// Fake collaborators
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct CollectingSink {
    reports: Mutex<Vec<Value>>,
}

impl ProgressSink for CollectingSink {
    fn report(&self, value: Materialized) {
        if let Some(value) = value.as_json() {
            self.reports.lock().unwrap().push(value.clone());
        }
    }
}

/// Sink handed out for tokens sent by the peer
#[derive(Debug)]
struct RemoteSink {
    token: Value,
}

impl ProgressSink for RemoteSink {
    fn report(&self, _value: Materialized) {}
}

#[derive(Default)]
struct FakeProgressTracker {
    next: AtomicI64,
    registered: Mutex<HashMap<i64, ProgressRegistration>>,
    /// Formatter state seen each time a token was minted
    minted_during: Mutex<Vec<FormatterState>>,
}

impl FakeProgressTracker {
    fn register(&self, sink: Arc<dyn ProgressSink>, value_type: TargetType) -> i64 {
        let token = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        self.registered
            .lock()
            .unwrap()
            .insert(token, ProgressRegistration { value_type, sink });
        token
    }
}

impl ProgressTracker for FakeProgressTracker {
    fn token_for(&self, sink: &Arc<dyn ProgressSink>, ctx: &ConversionContext<'_>) -> CodecResult<i64> {
        self.minted_during.lock().unwrap().push(ctx.state().clone());
        Ok(self.register(Arc::clone(sink), TargetType::Json))
    }

    fn lookup(&self, token: i64) -> Option<ProgressRegistration> {
        self.registered.lock().unwrap().get(&token).cloned()
    }

    fn create_sink(
        &self,
        token: &Value,
        _value_type: &TargetType,
        _ctx: &ConversionContext<'_>,
    ) -> CodecResult<Arc<dyn ProgressSink>> {
        Ok(Arc::new(RemoteSink { token: token.clone() }))
    }
}

#[derive(Debug)]
struct BufferedSequence {
    buffered: Mutex<Vec<Payload>>,
    finished: bool,
}

impl BufferedSequence {
    fn new(items: Vec<Value>, finished: bool) -> Arc<Self> {
        Arc::new(Self {
            buffered: Mutex::new(items.into_iter().map(Payload::Json).collect()),
            finished,
        })
    }
}

impl PrefetchedSequence for BufferedSequence {
    fn tear_off_prefetched(&self) -> (Vec<Payload>, bool) {
        (std::mem::take(&mut *self.buffered.lock().unwrap()), self.finished)
    }
}

#[derive(Debug)]
struct SequenceProxy {
    token: Option<Value>,
    prefetched: Vec<Materialized>,
}

impl IncomingSequence for SequenceProxy {
    fn prefetched(&self) -> &[Materialized] {
        &self.prefetched
    }

    fn has_more(&self) -> bool {
        self.token.is_some()
    }
}

#[derive(Default)]
struct FakeSequenceTracker {
    next: AtomicI64,
}

impl SequenceTracker for FakeSequenceTracker {
    fn token_for(
        &self,
        _sequence: &Arc<dyn PrefetchedSequence>,
        _ctx: &ConversionContext<'_>,
    ) -> CodecResult<i64> {
        Ok(100 + self.next.fetch_add(1, Ordering::SeqCst))
    }

    fn create_proxy(
        &self,
        token: Option<&Value>,
        prefetched: Vec<Materialized>,
        _element_type: &TargetType,
        _ctx: &ConversionContext<'_>,
    ) -> CodecResult<Box<dyn IncomingSequence>> {
        Ok(Box::new(SequenceProxy {
            token: token.cloned(),
            prefetched,
        }))
    }
}

#[derive(Debug)]
struct FakeChannel {
    id: u64,
}

impl DuplexChannel for FakeChannel {
    fn channel_id(&self) -> u64 {
        self.id
    }
}

struct FakeChannelTracker;

impl ChannelTracker for FakeChannelTracker {
    fn token_for(&self, endpoint: &Endpoint, _ctx: &ConversionContext<'_>) -> CodecResult<Option<i64>> {
        Ok(Some(endpoint.channel.channel_id() as i64))
    }

    fn resolve(
        &self,
        token: Option<i64>,
        kind: EndpointKind,
        _ctx: &ConversionContext<'_>,
    ) -> CodecResult<Option<Endpoint>> {
        Ok(token.map(|id| Endpoint::new(kind, Arc::new(FakeChannel { id: id as u64 }))))
    }
}

#[derive(Default)]
struct RecordingDiagnostics {
    warnings: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl DiagnosticSink for RecordingDiagnostics {
    fn warning(&self, _event: DiagnosticEvent, message: &str) {
        self.warnings.lock().unwrap().push(message.to_string());
    }

    fn error(&self, _event: DiagnosticEvent, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}

/// Opts every method named `create` into single-object binding
struct SingleObjectDispatcher;

impl DispatcherCapabilities for SingleObjectDispatcher {
    fn use_single_object_parameter(&self, method: &str, _parameters: &[ParameterInfo]) -> bool {
        method == "create"
    }
}

struct Harness {
    codec: MessageCodec,
    progress: Arc<FakeProgressTracker>,
    diagnostics: Arc<RecordingDiagnostics>,
}

fn harness(version: ProtocolVersion) -> Harness {
    let progress = Arc::new(FakeProgressTracker::default());
    let diagnostics = Arc::new(RecordingDiagnostics::default());
    let codec = MessageCodec::builder()
        .with_protocol_version(version)
        .with_progress_tracker(progress.clone())
        .with_sequence_tracker(Arc::new(FakeSequenceTracker::default()))
        .with_channel_tracker(Arc::new(FakeChannelTracker))
        .with_dispatcher(Arc::new(SingleObjectDispatcher))
        .with_diagnostics(diagnostics.clone())
        .build();

    Harness {
        codec,
        progress,
        diagnostics,
    }
}

fn round_trip(codec: &MessageCodec, message: RpcMessage) -> RpcMessage {
    let bytes = codec.serialize(&message).unwrap();
    codec.deserialize(&bytes).unwrap()
}

// ---------------------------------------------------------------------------
// Round trips
// ---------------------------------------------------------------------------

#[test]
fn test_round_trip_v2() {
    let h = harness(ProtocolVersion::V2);
    let messages: Vec<RpcMessage> = vec![
        RpcRequest::new(1, "add", Arguments::positional([json!(1), json!(2)])).into(),
        RpcRequest::new("req-1", "greet", Arguments::named([("name", json!("Ada"))])).into(),
        RpcRequest::notification("ping", Arguments::None).into(),
        RpcResult::new(2, json!({"sum": 3})).into(),
        RpcResult::new(3, Payload::null()).into(),
        RpcError::new(4, ErrorDetail::new(-32602, "Invalid params")).into(),
        RpcError::new(5, ErrorDetail::new(-32000, "Failed").with_data(json!({"detail": [1, 2]}))).into(),
    ];

    for message in messages {
        assert_eq!(round_trip(&h.codec, message.clone()), message);
    }
}

#[test]
fn test_round_trip_v1() {
    let h = harness(ProtocolVersion::V1);
    let messages: Vec<RpcMessage> = vec![
        RpcRequest::new(1, "add", Arguments::positional([json!(1), json!(2)])).into(),
        RpcRequest::notification("ping", Arguments::positional([json!("x")])).into(),
        RpcResult::new(2, json!([true])).into(),
        RpcResult::new(3, Payload::null()).into(),
        RpcError::new(4, ErrorDetail::new(-1, "boom").with_data(json!("why"))).into(),
    ];

    for message in messages {
        assert_eq!(round_trip(&h.codec, message.clone()), message);
    }
}

// ---------------------------------------------------------------------------
// Protocol version gating and envelope fixups
// ---------------------------------------------------------------------------

#[test]
fn test_parameter_objects_require_v2() {
    let request: RpcMessage =
        RpcRequest::new(1, "greet", Arguments::named([("name", json!("Ada"))])).into();

    let v1 = harness(ProtocolVersion::V1);
    assert!(matches!(v1.codec.serialize(&request), Err(CodecError::Unsupported(_))));
    assert!(matches!(
        v1.codec.deserialize(br#"{"id": 1, "method": "greet", "params": {"name": "Ada"}}"#),
        Err(CodecError::Unsupported(_))
    ));
    assert_eq!(v1.codec.formatter_state(), FormatterState::default());

    let v2 = harness(ProtocolVersion::V2);
    assert!(v2.codec.serialize(&request).is_ok());
}

#[test]
fn test_result_always_has_result_member() {
    let h = harness(ProtocolVersion::V2);
    let document = h
        .codec
        .serialize_value(&RpcResult::new(9, Payload::null()).into())
        .unwrap();
    let object = document.as_object().unwrap();
    assert!(object.contains_key("result"));
    assert_eq!(object["result"], Value::Null);
}

#[test]
fn test_v1_notification_has_null_id() {
    let h = harness(ProtocolVersion::V1);
    let document = h
        .codec
        .serialize_value(&RpcRequest::notification("tick", Arguments::positional([json!(1)])).into())
        .unwrap();
    assert_eq!(document, json!({"id": null, "method": "tick", "params": [1]}));
    assert!(document.get("jsonrpc").is_none());
}

#[test]
fn test_protocol_violation_reports_version() {
    let h = harness(ProtocolVersion::V2);
    let err = h.codec.deserialize(br#"{"id": 1, "result": 2}"#).unwrap_err();
    assert!(err.is_protocol_error());
    assert!(err.to_string().starts_with("Unrecognized JSON-RPC 2.0 message"));
    assert_eq!(err.error_code().code(), -32600);
}

// ---------------------------------------------------------------------------
// Request id normalization
// ---------------------------------------------------------------------------

#[test]
fn test_string_ids_coerced_until_string_id_sent() {
    let h = harness(ProtocolVersion::V2);

    let result = h
        .codec
        .deserialize(br#"{"jsonrpc": "2.0", "id": "42", "result": 1}"#)
        .unwrap();
    assert_eq!(result.id(), &RequestId::Number(42));

    let error = h
        .codec
        .deserialize(br#"{"jsonrpc": "2.0", "id": "43", "error": {"code": 1, "message": "x"}}"#)
        .unwrap();
    assert_eq!(error.id(), &RequestId::Number(43));

    // Requests are never coerced.
    let request = h
        .codec
        .deserialize(br#"{"jsonrpc": "2.0", "id": "44", "method": "m"}"#)
        .unwrap();
    assert_eq!(request.id(), &RequestId::from("44"));

    h.codec
        .serialize(&RpcRequest::new("abc", "m", Arguments::None).into())
        .unwrap();
    assert!(h.codec.has_transmitted_string_id());

    let result = h
        .codec
        .deserialize(br#"{"jsonrpc": "2.0", "id": "42", "result": 1}"#)
        .unwrap();
    assert_eq!(result.id(), &RequestId::from("42"));
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

#[test]
fn test_progress_notification_reaches_sink() {
    let h = harness(ProtocolVersion::V2);
    let sink = Arc::new(CollectingSink::default());
    let token = h.progress.register(sink.clone(), TargetType::Json);

    let named = format!(r#"{{"jsonrpc":"2.0","method":"$/progress","params":{{"token":{},"value":{{"pct":50}}}}}}"#, token);
    let positional = format!(r#"{{"jsonrpc":"2.0","method":"$/progress","params":[{},{{"pct":100}}]}}"#, token);

    let message = h.codec.deserialize(named.as_bytes()).unwrap();
    assert_eq!(message.as_request().unwrap().method, "$/progress");
    h.codec.deserialize(positional.as_bytes()).unwrap();

    assert_eq!(
        *sink.reports.lock().unwrap(),
        vec![json!({"pct": 50}), json!({"pct": 100})]
    );
}

#[test]
fn test_unknown_progress_token_is_absorbed() {
    let h = harness(ProtocolVersion::V2);
    let bytes = br#"{"jsonrpc":"2.0","method":"$/progress","params":{"token":999,"value":1}}"#;

    let message = h.codec.deserialize(bytes).unwrap();
    let request = message.as_request().unwrap();
    assert!(request.is_notification());
    assert_eq!(request.arguments.len(), 2);
    assert!(h.diagnostics.errors.lock().unwrap().is_empty());
}

#[test]
fn test_malformed_progress_notification_is_logged_not_raised() {
    let h = harness(ProtocolVersion::V2);
    let bytes = br#"{"jsonrpc":"2.0","method":"$/progress","params":["not-a-token"]}"#;

    assert!(h.codec.deserialize(bytes).is_ok());
    let errors = h.diagnostics.errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("progress"));
}

#[test]
fn test_progress_sink_argument_becomes_token() {
    let h = harness(ProtocolVersion::V2);
    let sink: Arc<dyn ProgressSink> = Arc::new(CollectingSink::default());
    let request = RpcRequest::new(
        7,
        "long_task",
        Arguments::positional([Payload::Json(json!("input")), Payload::Progress(sink)]),
    );

    let document = h.codec.serialize_value(&request.into()).unwrap();
    assert_eq!(document["params"], json!(["input", 1]));

    // The tracker saw which message was being serialized.
    let minted = h.progress.minted_during.lock().unwrap();
    assert_eq!(minted[0].serializing_message_id, RequestId::Number(7));
    assert!(minted[0].serializing_request);
    assert_eq!(h.codec.formatter_state(), FormatterState::default());
}

#[test]
fn test_progress_argument_materializes_remote_sink() {
    let h = harness(ProtocolVersion::V2);
    let message = h
        .codec
        .deserialize(br#"{"jsonrpc":"2.0","id":1,"method":"long_task","params":["input",12]}"#)
        .unwrap();
    let request = message.as_request().unwrap();

    let sink = request
        .argument(None, Some(1), &TargetType::progress(TargetType::Json))
        .unwrap()
        .unwrap()
        .into_progress()
        .unwrap();
    assert!(format!("{:?}", sink).contains("12"));

    let missing = request
        .argument(None, Some(5), &TargetType::progress(TargetType::Json))
        .unwrap();
    assert!(missing.is_none());
}

// ---------------------------------------------------------------------------
// Sequences
// ---------------------------------------------------------------------------

#[test]
fn test_exhausted_sequence_omits_token() {
    let h = harness(ProtocolVersion::V2);
    let sequence = BufferedSequence::new(vec![json!(1), json!(2)], true);
    let result = RpcResult::new(1, Payload::Sequence(sequence));

    let document = h.codec.serialize_value(&result.into()).unwrap();
    assert_eq!(document["result"], json!({"values": [1, 2]}));
}

#[test]
fn test_pending_empty_sequence_omits_values() {
    let h = harness(ProtocolVersion::V2);
    let sequence = BufferedSequence::new(Vec::new(), false);
    let result = RpcResult::new(1, Payload::Sequence(sequence));

    let document = h.codec.serialize_value(&result.into()).unwrap();
    assert_eq!(document["result"], json!({"token": 100}));
}

/// A user type that is a sequence without being `Payload::Sequence`
#[derive(Debug)]
struct Pages(Arc<BufferedSequence>);

impl CustomValue for Pages {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_sequence(self: Arc<Self>) -> Option<Arc<dyn PrefetchedSequence>> {
        Some(self.0.clone())
    }
}

#[test]
fn test_sequence_capability_found_on_custom_values() {
    let h = harness(ProtocolVersion::V2);
    let pages = Pages(BufferedSequence::new(vec![json!("a")], false));
    let result = RpcResult::new(1, Payload::Custom(Arc::new(pages)));

    let document = h.codec.serialize_value(&result.into()).unwrap();
    assert_eq!(document["result"], json!({"token": 100, "values": ["a"]}));
}

#[test]
fn test_sequence_consumer_builds_proxy() {
    let h = harness(ProtocolVersion::V2);
    let message = h
        .codec
        .deserialize(br#"{"jsonrpc":"2.0","id":1,"result":{"token":5,"values":[1,2,3]}}"#)
        .unwrap();
    let result = message.as_result().unwrap();

    let proxy = result
        .result(&TargetType::sequence(TargetType::of::<i32>()))
        .unwrap()
        .into_sequence()
        .unwrap()
        .unwrap();
    assert!(proxy.has_more());
    assert_eq!(proxy.prefetched().len(), 3);
    assert_eq!(proxy.prefetched()[2].as_json(), Some(&json!(3)));

    let exhausted = h
        .codec
        .deserialize(br#"{"jsonrpc":"2.0","id":2,"result":{"values":[1]}}"#)
        .unwrap();
    let proxy = exhausted
        .as_result()
        .unwrap()
        .result(&TargetType::sequence(TargetType::Json))
        .unwrap()
        .into_sequence()
        .unwrap()
        .unwrap();
    assert!(!proxy.has_more());
}

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

#[test]
fn test_channel_tokens() {
    let h = harness(ProtocolVersion::V2);
    let endpoint = Endpoint::new(EndpointKind::Duplex, Arc::new(FakeChannel { id: 33 }));
    let request = RpcRequest::new(1, "open", Arguments::positional([Payload::Endpoint(endpoint)]));

    let bytes = h.codec.serialize(&request.into()).unwrap();
    let message = h.codec.deserialize(&bytes).unwrap();
    let request = message.as_request().unwrap();
    assert_eq!(request.arguments.get(None, Some(0)), Some(&Payload::Json(json!(33))));

    let stream = request
        .argument(None, Some(0), &TargetType::Channel(EndpointKind::Stream))
        .unwrap()
        .unwrap()
        .into_endpoint()
        .unwrap()
        .unwrap();
    assert_eq!(stream.kind, EndpointKind::Stream);
    assert_eq!(stream.channel.channel_id(), 33);

    let reader = request
        .argument(None, Some(0), &TargetType::Channel(EndpointKind::Reader))
        .unwrap()
        .unwrap()
        .into_endpoint()
        .unwrap()
        .unwrap();
    assert_eq!(reader.kind, EndpointKind::Reader);
}

// ---------------------------------------------------------------------------
// Argument binding
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, PartialEq)]
struct CreateOptions {
    name: String,
    size: u32,
}

#[test]
fn test_single_raw_parameter_preserves_order() {
    let h = harness(ProtocolVersion::V2);
    let message = h
        .codec
        .deserialize(br#"{"jsonrpc":"2.0","id":1,"method":"configure","params":{"zeta":1,"alpha":{"x":[1]},"mid":null}}"#)
        .unwrap();
    let request = message.as_request().unwrap();

    let ArgumentMatch::Success(mut values) = request
        .bind_arguments(&[ParameterInfo::new("options", TargetType::Json)])
        .unwrap()
    else {
        panic!("expected the arguments to bind");
    };
    let object = values.remove(0).unwrap().into_json().unwrap();
    assert_eq!(
        serde_json::to_string(&object).unwrap(),
        r#"{"zeta":1,"alpha":{"x":[1]},"mid":null}"#
    );
}

#[test]
fn test_dispatcher_single_object_binding() {
    let h = harness(ProtocolVersion::V2);
    let message = h
        .codec
        .deserialize(br#"{"jsonrpc":"2.0","id":1,"method":"create","params":{"name":"disk","size":8}}"#)
        .unwrap();
    let request = message.as_request().unwrap();
    let parameters = [ParameterInfo::new("options", TargetType::of::<CreateOptions>())];

    let ArgumentMatch::Success(mut values) = request.bind_arguments(&parameters).unwrap() else {
        panic!("expected the arguments to bind");
    };
    let options: CreateOptions = values.remove(0).unwrap().into_typed().unwrap();
    assert_eq!(
        options,
        CreateOptions {
            name: "disk".to_string(),
            size: 8
        }
    );

    // Without the opt-in, the parameter is looked up by name and is missing.
    let other = h
        .codec
        .deserialize(br#"{"jsonrpc":"2.0","id":2,"method":"update","params":{"name":"disk","size":8}}"#)
        .unwrap();
    assert!(matches!(
        other.as_request().unwrap().bind_arguments(&parameters).unwrap(),
        ArgumentMatch::ParameterArgumentCountMismatch
    ));
}

#[test]
fn test_argument_failure_is_reported() {
    let h = harness(ProtocolVersion::V2);
    let message = h
        .codec
        .deserialize(br#"{"jsonrpc":"2.0","id":3,"method":"resize","params":{"size":"big"}}"#)
        .unwrap();
    let request = message.as_request().unwrap();

    let err = request.argument_as::<u32>(Some("size"), None).unwrap_err();
    match &err {
        CodecError::ArgumentDeserialization { name, type_name, .. } => {
            assert_eq!(name.as_deref(), Some("size"));
            assert_eq!(type_name, "u32");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.error_code().code(), -32602);

    let warnings = h.diagnostics.warnings.lock().unwrap();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("size"));
    assert_eq!(h.codec.formatter_state(), FormatterState::default());
}

#[test]
fn test_deferred_arguments_are_not_encoded_twice() {
    let h = harness(ProtocolVersion::V2);
    let inbound = h
        .codec
        .deserialize(br#"{"jsonrpc":"2.0","method":"$/cancelRequest","params":{"id":"5"}}"#)
        .unwrap();

    let document = h.codec.serialize_value(&inbound).unwrap();
    assert_eq!(
        document,
        json!({"jsonrpc": "2.0", "method": "$/cancelRequest", "params": {"id": "5"}})
    );
}

// ---------------------------------------------------------------------------
// Error data
// ---------------------------------------------------------------------------

#[test]
fn test_common_error_data_round_trip() {
    let h = harness(ProtocolVersion::V2);
    let failure = CodecError::converter("disk full");
    let data = CommonErrorData::from_error(&failure);
    let error = RpcError::new(
        1,
        failure
            .to_error_detail()
            .with_data(Payload::from_serialize(&data).unwrap()),
    );

    let message = round_trip(&h.codec, error.into());
    let detail = &message.as_error().unwrap().error;
    assert_eq!(detail.code, -32603);
    assert_eq!(detail.common_error_data(), Some(data));
}

// ---------------------------------------------------------------------------
// User converters
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Celsius(f64);

impl CustomValue for Celsius {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Writes temperatures as `{"kelvin": n}`
struct KelvinConverter;

impl MessageConverter for KelvinConverter {
    fn name(&self) -> &str {
        "kelvin"
    }

    fn can_write(&self, value: &Payload) -> bool {
        matches!(value, Payload::Custom(custom) if custom.as_any().is::<Celsius>())
    }

    fn write(&self, value: &Payload, _ctx: &ConversionContext<'_>) -> CodecResult<Value> {
        match value {
            Payload::Custom(custom) => {
                let celsius = custom
                    .as_any()
                    .downcast_ref::<Celsius>()
                    .ok_or_else(|| CodecError::converter("not a temperature"))?;
                Ok(json!({"kelvin": celsius.0 + 273.15}))
            }
            _ => Err(CodecError::converter("not a temperature")),
        }
    }
}

#[test]
fn test_user_converter_writes_custom_values() {
    let codec = MessageCodec::builder()
        .with_converter(Arc::new(KelvinConverter))
        .build();
    let request = RpcRequest::new(
        1,
        "set_temperature",
        Arguments::named([("target", Payload::Custom(Arc::new(Celsius(0.0))))]),
    );

    let document = codec.serialize_value(&request.into()).unwrap();
    assert_eq!(document["params"]["target"], json!({"kelvin": 273.15}));

    let plain = MessageCodec::new();
    let request = RpcRequest::new(1, "set_temperature", Arguments::positional([Payload::Custom(Arc::new(Celsius(1.0)))]));
    assert!(matches!(
        plain.serialize(&request.into()),
        Err(CodecError::NoConverter(_))
    ));
}

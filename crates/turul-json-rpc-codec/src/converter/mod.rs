//! # Converter Registry
//!
//! Converters turn values that have no plain JSON form (progress sinks,
//! incrementally produced sequences, channel endpoints, user types) into
//! tokens on the way out, and turn tokens back into live values on the way in.
//!
//! Converters are matched by capability: a converter claims a [`Payload`]
//! when writing and a [`TargetType`] when reading. User converters are
//! consulted before the built-in ones, for top-level values and for nested
//! data alike (sequence elements are materialized through the registry too).

mod channel;
mod progress;
mod sequence;

pub use channel::ChannelConverter;
pub use progress::{ProgressSinkConverter, ProgressSourceConverter};
pub use sequence::{SequenceConsumerConverter, SequenceProducerConverter};

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{CodecError, CodecResult};
use crate::message::Payload;
use crate::session::FormatterState;
use crate::tracker::{
    ChannelTracker, Endpoint, EndpointKind, IncomingSequence, ProgressSink, ProgressTracker,
    SequenceTracker, Trackers,
};
use crate::types::ProtocolVersion;

/// The type a deferred value should be materialized into.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TargetType {
    /// The untyped JSON tree itself
    Json,
    /// Plain data, deserialized with serde after the registry had its say
    Data {
        type_id: TypeId,
        type_name: &'static str,
    },
    /// A live progress sink whose reports carry values of the given type
    Progress(Box<TargetType>),
    /// The consumer side of an incrementally produced sequence
    Sequence(Box<TargetType>),
    /// A channel endpoint resolved through the channel tracker
    Channel(EndpointKind),
}

impl TargetType {
    pub fn of<T: 'static>() -> Self {
        TargetType::Data {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn progress(value_type: TargetType) -> Self {
        TargetType::Progress(Box::new(value_type))
    }

    pub fn sequence(element_type: TargetType) -> Self {
        TargetType::Sequence(Box::new(element_type))
    }

    /// Whether this is the plain-data target for `T`
    pub fn is<T: 'static>(&self) -> bool {
        matches!(self, TargetType::Data { type_id, .. } if *type_id == TypeId::of::<T>())
    }

    pub fn type_name(&self) -> String {
        match self {
            TargetType::Json => "serde_json::Value".to_string(),
            TargetType::Data { type_name, .. } => type_name.to_string(),
            TargetType::Progress(value) => format!("progress<{}>", value.type_name()),
            TargetType::Sequence(element) => format!("sequence<{}>", element.type_name()),
            TargetType::Channel(kind) => kind.to_string(),
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// A value produced from a deferred cell.
pub enum Materialized {
    Json(Value),
    /// A value built by a user converter
    Custom(Box<dyn Any + Send>),
    Progress(Option<Arc<dyn ProgressSink>>),
    Sequence(Option<Box<dyn IncomingSequence>>),
    Endpoint(Option<Endpoint>),
}

impl Materialized {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Materialized::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_json(self) -> CodecResult<Value> {
        match self {
            Materialized::Json(value) => Ok(value),
            other => Err(CodecError::converter(format!(
                "expected a JSON value, found {}",
                other.kind()
            ))),
        }
    }

    /// Finish materialization into `T`, either by downcasting a converter's
    /// output or by deserializing the JSON tree with serde.
    pub fn into_typed<T: DeserializeOwned + 'static>(self) -> CodecResult<T> {
        match self {
            Materialized::Json(value) => Ok(serde_json::from_value(value)?),
            Materialized::Custom(boxed) => boxed.downcast::<T>().map(|v| *v).map_err(|_| {
                CodecError::converter(format!(
                    "converter output is not a {}",
                    std::any::type_name::<T>()
                ))
            }),
            other => Err(CodecError::converter(format!(
                "{} cannot be deserialized into {}",
                other.kind(),
                std::any::type_name::<T>()
            ))),
        }
    }

    pub fn into_progress(self) -> CodecResult<Option<Arc<dyn ProgressSink>>> {
        match self {
            Materialized::Progress(sink) => Ok(sink),
            other => Err(CodecError::converter(format!("expected a progress sink, found {}", other.kind()))),
        }
    }

    pub fn into_sequence(self) -> CodecResult<Option<Box<dyn IncomingSequence>>> {
        match self {
            Materialized::Sequence(sequence) => Ok(sequence),
            other => Err(CodecError::converter(format!("expected a sequence, found {}", other.kind()))),
        }
    }

    pub fn into_endpoint(self) -> CodecResult<Option<Endpoint>> {
        match self {
            Materialized::Endpoint(endpoint) => Ok(endpoint),
            other => Err(CodecError::converter(format!("expected a channel endpoint, found {}", other.kind()))),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Materialized::Json(_) => "JSON value",
            Materialized::Custom(_) => "custom value",
            Materialized::Progress(_) => "progress sink",
            Materialized::Sequence(_) => "sequence",
            Materialized::Endpoint(_) => "channel endpoint",
        }
    }
}

impl fmt::Debug for Materialized {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Materialized::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Materialized::Custom(_) => f.debug_tuple("Custom").field(&"..").finish(),
            Materialized::Progress(sink) => f.debug_tuple("Progress").field(sink).finish(),
            Materialized::Sequence(sequence) => f.debug_tuple("Sequence").field(sequence).finish(),
            Materialized::Endpoint(endpoint) => f.debug_tuple("Endpoint").field(endpoint).finish(),
        }
    }
}

/// Everything a converter may consult while converting one value.
///
/// Built fresh for each call from the codec's registry, trackers and a
/// snapshot of the formatter session, so converters never reach into the
/// codec itself.
pub struct ConversionContext<'a> {
    registry: &'a ConverterRegistry,
    trackers: &'a Trackers,
    state: FormatterState,
    version: ProtocolVersion,
}

impl<'a> ConversionContext<'a> {
    pub fn new(
        registry: &'a ConverterRegistry,
        trackers: &'a Trackers,
        state: FormatterState,
        version: ProtocolVersion,
    ) -> Self {
        Self {
            registry,
            trackers,
            state,
            version,
        }
    }

    pub fn state(&self) -> &FormatterState {
        &self.state
    }

    pub fn protocol_version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn tokenize(&self, payload: &Payload) -> CodecResult<Value> {
        self.registry.tokenize(payload, self)
    }

    pub fn materialize(&self, cell: &Value, target: &TargetType) -> CodecResult<Materialized> {
        self.registry.materialize(cell, target, self)
    }

    pub fn materialize_as<T: DeserializeOwned + 'static>(&self, cell: &Value) -> CodecResult<T> {
        self.materialize(cell, &TargetType::of::<T>())?.into_typed()
    }

    pub fn progress_tracker(&self) -> CodecResult<&'a dyn ProgressTracker> {
        self.trackers.progress()
    }

    pub fn sequence_tracker(&self) -> CodecResult<&'a dyn SequenceTracker> {
        self.trackers.sequences()
    }

    pub fn channel_tracker(&self) -> CodecResult<&'a dyn ChannelTracker> {
        self.trackers.channels()
    }
}

/// A conversion plug-in.
///
/// Both directions are optional; a converter that only writes leaves the
/// read side at its defaults and vice versa.
pub trait MessageConverter: Send + Sync {
    fn name(&self) -> &str;

    fn can_write(&self, _value: &Payload) -> bool {
        false
    }

    fn write(&self, value: &Payload, _ctx: &ConversionContext<'_>) -> CodecResult<Value> {
        Err(CodecError::Unsupported(format!(
            "{} cannot write {}",
            self.name(),
            value.kind()
        )))
    }

    fn can_read(&self, _target: &TargetType) -> bool {
        false
    }

    fn read(
        &self,
        _cell: &Value,
        target: &TargetType,
        _ctx: &ConversionContext<'_>,
    ) -> CodecResult<Materialized> {
        Err(CodecError::Unsupported(format!(
            "{} cannot read {}",
            self.name(),
            target
        )))
    }
}

/// Ordered set of converters: user converters first, then the built-ins.
#[derive(Clone)]
pub struct ConverterRegistry {
    user: Vec<Arc<dyn MessageConverter>>,
    builtin: Vec<Arc<dyn MessageConverter>>,
}

impl ConverterRegistry {
    /// A registry holding only the built-in converters
    pub fn new() -> Self {
        Self {
            user: Vec::new(),
            builtin: vec![
                Arc::new(ProgressSinkConverter),
                Arc::new(ProgressSourceConverter),
                Arc::new(SequenceConsumerConverter),
                Arc::new(SequenceProducerConverter),
                Arc::new(ChannelConverter),
            ],
        }
    }

    pub fn register(&mut self, converter: Arc<dyn MessageConverter>) {
        self.user.push(converter);
    }

    pub fn converter_names(&self) -> Vec<String> {
        self.converters().map(|c| c.name().to_string()).collect()
    }

    fn converters(&self) -> impl Iterator<Item = &Arc<dyn MessageConverter>> {
        self.user.iter().chain(self.builtin.iter())
    }

    /// Turn a user payload into its wire tree.
    ///
    /// Values already in tree form are passed through untouched so deferred
    /// arguments that get re-sent are never encoded twice.
    pub fn tokenize(&self, payload: &Payload, ctx: &ConversionContext<'_>) -> CodecResult<Value> {
        match payload {
            Payload::Json(value) => Ok(value.clone()),
            Payload::Array(items) => items
                .iter()
                .map(|item| self.tokenize(item, ctx))
                .collect::<CodecResult<Vec<_>>>()
                .map(Value::Array),
            Payload::Object(fields) => {
                let mut map = Map::with_capacity(fields.len());
                for (name, value) in fields {
                    map.insert(name.clone(), self.tokenize(value, ctx)?);
                }
                Ok(Value::Object(map))
            }
            other => {
                let converter = self
                    .converters()
                    .find(|c| c.can_write(other))
                    .ok_or_else(|| CodecError::NoConverter(other.kind().to_string()))?;
                converter.write(other, ctx)
            }
        }
    }

    /// Materialize a deferred cell into `target`. The cell is never modified.
    pub fn materialize(
        &self,
        cell: &Value,
        target: &TargetType,
        ctx: &ConversionContext<'_>,
    ) -> CodecResult<Materialized> {
        if let Some(converter) = self.converters().find(|c| c.can_read(target)) {
            return converter.read(cell, target, ctx);
        }

        match target {
            TargetType::Json | TargetType::Data { .. } => Ok(Materialized::Json(cell.clone())),
            other => Err(CodecError::NoConverter(other.type_name())),
        }
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("converters", &self.converter_names())
            .finish()
    }
}

/// Read an optional integer token, as used by single-endpoint values.
pub(crate) fn read_token(cell: &Value) -> CodecResult<Option<i64>> {
    match cell {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| CodecError::converter(format!("token {} is not an integer", n))),
        other => Err(CodecError::converter(format!("expected an integer token, found {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    /// Reads `{"kelvin": n}` cells as Celsius.
    struct KelvinConverter;

    impl MessageConverter for KelvinConverter {
        fn name(&self) -> &str {
            "kelvin"
        }

        fn can_read(&self, target: &TargetType) -> bool {
            target.is::<f64>()
        }

        fn read(
            &self,
            cell: &Value,
            _target: &TargetType,
            _ctx: &ConversionContext<'_>,
        ) -> CodecResult<Materialized> {
            let kelvin = cell["kelvin"]
                .as_f64()
                .ok_or_else(|| CodecError::converter("missing kelvin"))?;
            Ok(Materialized::Custom(Box::new(kelvin - 273.15)))
        }
    }

    fn context<'a>(registry: &'a ConverterRegistry, trackers: &'a Trackers) -> ConversionContext<'a> {
        ConversionContext::new(registry, trackers, FormatterState::default(), ProtocolVersion::V2)
    }

    #[test]
    fn test_plain_data_falls_through_to_serde() {
        #[derive(Deserialize, PartialEq, Debug)]
        struct Point {
            x: i32,
            y: i32,
        }

        let registry = ConverterRegistry::new();
        let trackers = Trackers::default();
        let ctx = context(&registry, &trackers);

        let cell = json!({"x": 1, "y": 2});
        let point: Point = ctx.materialize_as(&cell).unwrap();
        assert_eq!(point, Point { x: 1, y: 2 });

        // The cell can be materialized again into another type.
        let raw = ctx.materialize(&cell, &TargetType::Json).unwrap();
        assert_eq!(raw.as_json(), Some(&cell));
        assert!(ctx.materialize_as::<String>(&cell).is_err());
        assert_eq!(cell, json!({"x": 1, "y": 2}));
    }

    #[test]
    fn test_user_converter_takes_precedence() {
        let mut registry = ConverterRegistry::new();
        registry.register(Arc::new(KelvinConverter));
        let trackers = Trackers::default();
        let ctx = context(&registry, &trackers);

        let celsius: f64 = ctx.materialize_as(&json!({"kelvin": 273.15})).unwrap();
        assert!(celsius.abs() < 1e-9);
        assert_eq!(registry.converter_names()[0], "kelvin");
    }

    #[test]
    fn test_tokenize_passes_trees_through() {
        let registry = ConverterRegistry::new();
        let trackers = Trackers::default();
        let ctx = context(&registry, &trackers);

        let payload = Payload::Object(vec![
            ("a".to_string(), Payload::Json(json!([1, 2]))),
            ("b".to_string(), Payload::Array(vec![Payload::Json(json!("x"))])),
        ]);
        assert_eq!(ctx.tokenize(&payload).unwrap(), json!({"a": [1, 2], "b": ["x"]}));
    }

    #[test]
    fn test_missing_tracker_is_reported() {
        let registry = ConverterRegistry::new();
        let trackers = Trackers::default();
        let ctx = context(&registry, &trackers);

        let err = ctx
            .materialize(&json!(3), &TargetType::Channel(EndpointKind::Duplex))
            .unwrap_err();
        assert!(matches!(err, CodecError::MissingTracker("channel")));
    }

    #[test]
    fn test_read_token() {
        assert_eq!(read_token(&json!(null)).unwrap(), None);
        assert_eq!(read_token(&json!(7)).unwrap(), Some(7));
        assert!(read_token(&json!("7")).is_err());
        assert!(read_token(&json!(1.5)).is_err());
    }
}

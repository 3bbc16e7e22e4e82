//! In-memory JSON-RPC message model.
//!
//! Inbound messages keep every argument, result and error `data` member as an
//! untyped [`Payload::Json`] cell. Nothing is typed at parse time; callers
//! pull values out on demand with a [`TargetType`], which routes through the
//! converter registry of the codec that produced the message.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::arguments::{ArgumentMatch, Materializer, ParameterInfo};
use crate::converter::{Materialized, TargetType};
use crate::error::{CodecError, CodecResult};
use crate::error_data::CommonErrorData;
use crate::tracker::{Endpoint, PrefetchedSequence, ProgressSink};
use crate::types::RequestId;

/// A user value that needs a registered converter to go on the wire.
pub trait CustomValue: Any + Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;

    /// Expose the sequence capability, for values that are sequences
    /// without being [`Payload::Sequence`].
    fn as_sequence(self: Arc<Self>) -> Option<Arc<dyn PrefetchedSequence>> {
        None
    }
}

/// A user-supplied value carried by a message.
#[derive(Debug, Clone)]
pub enum Payload {
    /// Plain JSON, or an untyped cell read off the wire
    Json(Value),
    Array(Vec<Payload>),
    /// Object members in the order they are written
    Object(Vec<(String, Payload)>),
    Progress(Arc<dyn ProgressSink>),
    Sequence(Arc<dyn PrefetchedSequence>),
    Endpoint(Endpoint),
    Custom(Arc<dyn CustomValue>),
}

impl Payload {
    pub fn null() -> Self {
        Payload::Json(Value::Null)
    }

    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> CodecResult<Self> {
        Ok(Payload::Json(serde_json::to_value(value)?))
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Payload::Json(Value::Null))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Json(_) => "JSON value",
            Payload::Array(_) => "array",
            Payload::Object(_) => "object",
            Payload::Progress(_) => "progress sink",
            Payload::Sequence(_) => "sequence",
            Payload::Endpoint(_) => "channel endpoint",
            Payload::Custom(_) => "custom value",
        }
    }

    /// The sequence capability of this value, wherever it is declared.
    pub fn find_sequence(&self) -> Option<Arc<dyn PrefetchedSequence>> {
        match self {
            Payload::Sequence(sequence) => Some(Arc::clone(sequence)),
            Payload::Custom(custom) => Arc::clone(custom).as_sequence(),
            _ => None,
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Payload::Json(a), Payload::Json(b)) => a == b,
            (Payload::Array(a), Payload::Array(b)) => a == b,
            (Payload::Object(a), Payload::Object(b)) => a == b,
            (Payload::Progress(a), Payload::Progress(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            (Payload::Sequence(a), Payload::Sequence(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            (Payload::Endpoint(a), Payload::Endpoint(b)) => {
                a.kind == b.kind && std::ptr::addr_eq(Arc::as_ptr(&a.channel), Arc::as_ptr(&b.channel))
            }
            (Payload::Custom(a), Payload::Custom(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            _ => false,
        }
    }
}

/// Request arguments. A request is never both positional and named.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Arguments {
    #[default]
    None,
    Positional(Vec<Payload>),
    Named(Vec<(String, Payload)>),
}

impl Arguments {
    pub fn positional<I, P>(values: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Payload>,
    {
        Arguments::Positional(values.into_iter().map(Into::into).collect())
    }

    pub fn named<I, K, P>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, P)>,
        K: Into<String>,
        P: Into<Payload>,
    {
        Arguments::Named(
            values
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        match self {
            Arguments::None => 0,
            Arguments::Positional(values) => values.len(),
            Arguments::Named(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_named(&self) -> bool {
        matches!(self, Arguments::Named(_))
    }

    /// Look an argument up by name when named, by position when positional.
    pub fn get(&self, name: Option<&str>, position: Option<usize>) -> Option<&Payload> {
        match self {
            Arguments::None => None,
            Arguments::Positional(values) => position.and_then(|p| values.get(p)),
            Arguments::Named(values) => {
                let name = name?;
                values.iter().find(|(key, _)| key == name).map(|(_, value)| value)
            }
        }
    }

    /// Reassemble named arguments into one object, keeping their order.
    pub(crate) fn to_object(&self) -> Option<CodecResult<Value>> {
        let Arguments::Named(values) = self else {
            return None;
        };
        let mut object = Map::with_capacity(values.len());
        for (name, value) in values {
            match value {
                Payload::Json(cell) => {
                    object.insert(name.clone(), cell.clone());
                }
                other => return Some(Err(not_a_cell(other))),
            }
        }
        Some(Ok(Value::Object(object)))
    }
}

fn not_a_cell(payload: &Payload) -> CodecError {
    CodecError::Unsupported(format!(
        "{} was not read from the wire and cannot be materialized",
        payload.kind()
    ))
}

#[derive(Debug, Clone, PartialEq)]
pub struct RpcRequest {
    /// `RequestId::None` for notifications
    pub id: RequestId,
    pub method: String,
    pub arguments: Arguments,
    pub(crate) materializer: Materializer,
}

impl RpcRequest {
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            arguments,
            materializer: Materializer::detached(),
        }
    }

    pub fn notification(method: impl Into<String>, arguments: Arguments) -> Self {
        Self::new(RequestId::None, method, arguments)
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_empty()
    }

    /// Materialize one argument into `target`.
    ///
    /// Returns `Ok(None)` when the request carries no such argument. A cell
    /// that cannot be converted fails with
    /// [`CodecError::ArgumentDeserialization`].
    pub fn argument(
        &self,
        name: Option<&str>,
        position: Option<usize>,
        target: &TargetType,
    ) -> CodecResult<Option<Materialized>> {
        self.materialize_argument(name, position, target, Ok)
    }

    pub fn argument_as<T: DeserializeOwned + 'static>(
        &self,
        name: Option<&str>,
        position: Option<usize>,
    ) -> CodecResult<Option<T>> {
        self.materialize_argument(name, position, &TargetType::of::<T>(), Materialized::into_typed)
    }

    fn materialize_argument<R>(
        &self,
        name: Option<&str>,
        position: Option<usize>,
        target: &TargetType,
        finish: impl FnOnce(Materialized) -> CodecResult<R>,
    ) -> CodecResult<Option<R>> {
        let Some(payload) = self.arguments.get(name, position) else {
            return Ok(None);
        };
        let Payload::Json(cell) = payload else {
            return Err(not_a_cell(payload));
        };
        self.materializer
            .materialize_argument(&self.id, name, position, cell, target, finish)
            .map(Some)
    }

    /// Bind the arguments to a handler's parameter list.
    ///
    /// A single parameter receives all named arguments as one object when it
    /// asks for the raw tree, or when the dispatcher opted the method into
    /// single-object binding.
    pub fn bind_arguments(&self, parameters: &[ParameterInfo]) -> CodecResult<ArgumentMatch> {
        if let [parameter] = parameters {
            if let Some(object) = self.arguments.to_object() {
                let object = object?;
                if parameter.target == TargetType::Json {
                    return Ok(ArgumentMatch::Success(vec![Some(Materialized::Json(object))]));
                }
                if self
                    .materializer
                    .use_single_object_parameter(&self.method, parameters)
                {
                    let value = self.materializer.materialize_argument(
                        &self.id,
                        Some(parameter.name.as_str()),
                        Some(0),
                        &object,
                        &parameter.target,
                        Ok,
                    )?;
                    return Ok(ArgumentMatch::Success(vec![Some(value)]));
                }
            }
        }

        if self.arguments.len() > parameters.len() {
            return Ok(ArgumentMatch::ParameterArgumentCountMismatch);
        }

        let mut typed = Vec::with_capacity(parameters.len());
        for (position, parameter) in parameters.iter().enumerate() {
            match self.argument(Some(parameter.name.as_str()), Some(position), &parameter.target)? {
                Some(value) => typed.push(Some(value)),
                None if parameter.optional => typed.push(None),
                None => return Ok(ArgumentMatch::ParameterArgumentCountMismatch),
            }
        }
        Ok(ArgumentMatch::Success(typed))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RpcResult {
    pub id: RequestId,
    /// May be an explicit null
    pub result: Payload,
    pub(crate) materializer: Materializer,
}

impl RpcResult {
    pub fn new(id: impl Into<RequestId>, result: impl Into<Payload>) -> Self {
        Self {
            id: id.into(),
            result: result.into(),
            materializer: Materializer::detached(),
        }
    }

    pub fn result(&self, target: &TargetType) -> CodecResult<Materialized> {
        match &self.result {
            Payload::Json(cell) => self.materializer.materialize(cell, target),
            other => Err(not_a_cell(other)),
        }
    }

    /// Deserialize the result. A null result only fits types that accept
    /// null, such as `Option<T>` or `()`.
    pub fn result_as<T: DeserializeOwned + 'static>(&self) -> CodecResult<T> {
        self.result(&TargetType::of::<T>())?.into_typed()
    }
}

/// The `error` member of an error message.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorDetail {
    pub code: i64,
    pub message: String,
    pub data: Option<Payload>,
    pub(crate) materializer: Materializer,
}

impl ErrorDetail {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
            materializer: Materializer::detached(),
        }
    }

    pub fn with_data(mut self, data: impl Into<Payload>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Materialize `data` into `target`, handing back the raw tree when the
    /// conversion fails. Absent or null data yields `None`.
    pub fn data(&self, target: &TargetType) -> Option<Materialized> {
        let cell = match self.data.as_ref()? {
            Payload::Json(Value::Null) => return None,
            Payload::Json(cell) => cell,
            _ => return None,
        };
        match self.materializer.materialize(cell, target) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(error = %e, "Error data did not convert, returning raw tree");
                Some(Materialized::Json(cell.clone()))
            }
        }
    }

    pub fn data_as<T: DeserializeOwned + 'static>(&self) -> CodecResult<Option<T>> {
        match &self.data {
            None | Some(Payload::Json(Value::Null)) => Ok(None),
            Some(Payload::Json(cell)) => self
                .materializer
                .materialize(cell, &TargetType::of::<T>())?
                .into_typed()
                .map(Some),
            Some(other) => Err(not_a_cell(other)),
        }
    }

    /// `data` read as [`CommonErrorData`], when it has that shape.
    pub fn common_error_data(&self) -> Option<CommonErrorData> {
        self.data_as().ok().flatten()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RpcError {
    pub id: RequestId,
    pub error: ErrorDetail,
}

impl RpcError {
    pub fn new(id: impl Into<RequestId>, error: ErrorDetail) -> Self {
        Self {
            id: id.into(),
            error,
        }
    }
}

/// Any JSON-RPC message
#[derive(Debug, Clone, PartialEq)]
pub enum RpcMessage {
    Request(RpcRequest),
    Result(RpcResult),
    Error(RpcError),
}

impl RpcMessage {
    pub fn id(&self) -> &RequestId {
        match self {
            RpcMessage::Request(request) => &request.id,
            RpcMessage::Result(result) => &result.id,
            RpcMessage::Error(error) => &error.id,
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(self, RpcMessage::Request(_))
    }

    pub fn is_notification(&self) -> bool {
        matches!(self, RpcMessage::Request(request) if request.is_notification())
    }

    pub fn as_request(&self) -> Option<&RpcRequest> {
        match self {
            RpcMessage::Request(request) => Some(request),
            _ => None,
        }
    }

    pub fn as_result(&self) -> Option<&RpcResult> {
        match self {
            RpcMessage::Result(result) => Some(result),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&RpcError> {
        match self {
            RpcMessage::Error(error) => Some(error),
            _ => None,
        }
    }

    pub fn message_type(&self) -> &'static str {
        match self {
            RpcMessage::Request(request) if request.is_notification() => "notification",
            RpcMessage::Request(_) => "request",
            RpcMessage::Result(_) => "result",
            RpcMessage::Error(_) => "error",
        }
    }
}

impl From<RpcRequest> for RpcMessage {
    fn from(request: RpcRequest) -> Self {
        RpcMessage::Request(request)
    }
}

impl From<RpcResult> for RpcMessage {
    fn from(result: RpcResult) -> Self {
        RpcMessage::Result(result)
    }
}

impl From<RpcError> for RpcMessage {
    fn from(error: RpcError) -> Self {
        RpcMessage::Error(error)
    }
}

//! Structured error details carried in an error message's `data` member.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CodecError, ToJsonRpcError};

/// Auxiliary fields that are never copied into [`CommonErrorData::data`].
pub const EXCLUDED_AUXILIARY_FIELDS: &[&str] = &["WatsonBuckets"];

/// Key in [`CommonErrorData::data`] naming the crate the error came from.
pub const ORIGIN_FIELD: &str = "origin";

/// An error that can describe itself for transmission to the peer.
pub trait InspectableError {
    /// Fully qualified type of the error, when known
    fn type_name(&self) -> Option<&str>;

    fn message(&self) -> String;

    fn stack_trace(&self) -> Option<String> {
        None
    }

    /// Application error code
    fn code(&self) -> i32 {
        0
    }

    fn inner(&self) -> Option<&dyn InspectableError> {
        None
    }

    /// Crate or module that raised the error
    fn origin(&self) -> Option<String> {
        None
    }

    /// Extra named values worth sending along
    fn auxiliary_data(&self) -> Vec<(String, Value)> {
        Vec::new()
    }
}

/// Common shape of `error.data`, describing the failure on the remote side.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CommonErrorData {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(rename = "stack", default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    #[serde(default)]
    pub code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner: Option<Box<CommonErrorData>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
}

impl CommonErrorData {
    /// Capture `error` and, recursively, its inner errors.
    pub fn from_error(error: &dyn InspectableError) -> Self {
        let mut data: Map<String, Value> = error
            .auxiliary_data()
            .into_iter()
            .filter(|(name, _)| !EXCLUDED_AUXILIARY_FIELDS.contains(&name.as_str()))
            .collect();
        if let Some(origin) = error.origin() {
            data.entry(ORIGIN_FIELD).or_insert(Value::String(origin));
        }

        Self {
            type_name: error.type_name().map(str::to_owned),
            message: Some(error.message()),
            stack_trace: error.stack_trace(),
            code: error.code(),
            inner: error.inner().map(|inner| Box::new(Self::from_error(inner))),
            data: (!data.is_empty()).then_some(data),
        }
    }

    /// Depth of the `inner` chain below this error
    pub fn depth(&self) -> usize {
        self.inner.as_ref().map(|inner| 1 + inner.depth()).unwrap_or(0)
    }
}

impl InspectableError for CodecError {
    fn type_name(&self) -> Option<&str> {
        Some(std::any::type_name::<CodecError>())
    }

    fn message(&self) -> String {
        self.to_string()
    }

    fn code(&self) -> i32 {
        self.error_code().code() as i32
    }

    fn origin(&self) -> Option<String> {
        Some(concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION")).to_string())
    }

    fn inner(&self) -> Option<&dyn InspectableError> {
        match self {
            CodecError::ArgumentDeserialization { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }

    fn auxiliary_data(&self) -> Vec<(String, Value)> {
        match self {
            CodecError::ArgumentDeserialization {
                name,
                position,
                type_name,
                ..
            } => vec![
                ("name".to_string(), name.clone().map(Value::from).unwrap_or(Value::Null)),
                ("position".to_string(), position.map(Value::from).unwrap_or(Value::Null)),
                ("parameterType".to_string(), Value::from(type_name.clone())),
            ],
            other => other
                .document()
                .map(|document| vec![("document".to_string(), document.clone())])
                .unwrap_or_default(),
        }
    }
}

/// Inspectable snapshot of a [`std::error::Error`] and its `source()` chain.
#[derive(Debug, Clone)]
pub struct StdErrorView {
    type_name: Option<String>,
    message: String,
    inner: Option<Box<StdErrorView>>,
}

impl StdErrorView {
    pub fn new<E: std::error::Error + 'static>(error: &E) -> Self {
        let mut view = Self::from_dyn(error);
        view.type_name = Some(std::any::type_name::<E>().to_string());
        view
    }

    /// Source errors are only known as trait objects, so they carry no type name.
    pub fn from_dyn(error: &(dyn std::error::Error + 'static)) -> Self {
        Self {
            type_name: None,
            message: error.to_string(),
            inner: error.source().map(|source| Box::new(Self::from_dyn(source))),
        }
    }
}

impl InspectableError for StdErrorView {
    fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    fn message(&self) -> String {
        self.message.clone()
    }

    fn inner(&self) -> Option<&dyn InspectableError> {
        self.inner.as_deref().map(|inner| inner as &dyn InspectableError)
    }

    /// Leading path segment of the type name.
    fn origin(&self) -> Option<String> {
        let type_name = self.type_name.as_deref()?;
        type_name.split("::").next().map(str::to_owned)
    }
}

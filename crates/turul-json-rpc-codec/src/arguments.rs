//! Deferred argument materialization.
//!
//! Inbound messages hold on to the codec that read them through a
//! [`Materializer`], so arguments can be typed long after parsing, once the
//! dispatcher knows which handler (and therefore which parameter types) the
//! request is for.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::codec::CodecShared;
use crate::converter::{Materialized, TargetType};
use crate::diagnostics::DiagnosticEvent;
use crate::error::{CodecError, CodecResult};
use crate::types::RequestId;

/// One parameter of the handler arguments are bound to.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterInfo {
    pub name: String,
    pub target: TargetType,
    /// A missing argument binds as `None` instead of failing the match
    pub optional: bool,
}

impl ParameterInfo {
    pub fn new(name: impl Into<String>, target: TargetType) -> Self {
        Self {
            name: name.into(),
            target,
            optional: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// Outcome of binding a request's arguments to a parameter list
#[derive(Debug)]
pub enum ArgumentMatch {
    /// One entry per parameter; `None` for an omitted optional parameter
    Success(Vec<Option<Materialized>>),
    ParameterArgumentCountMismatch,
}

impl ArgumentMatch {
    pub fn is_success(&self) -> bool {
        matches!(self, ArgumentMatch::Success(_))
    }
}

/// Handle back to the codec that read a message.
#[derive(Clone)]
pub struct Materializer(Arc<CodecShared>);

impl Materializer {
    pub(crate) fn new(shared: Arc<CodecShared>) -> Self {
        Self(shared)
    }

    /// For messages built locally: built-in converters only, no trackers.
    pub fn detached() -> Self {
        Self(Arc::new(CodecShared::detached()))
    }

    pub(crate) fn materialize(&self, cell: &Value, target: &TargetType) -> CodecResult<Materialized> {
        self.0.context().materialize(cell, target)
    }

    /// Materialize one argument of request `id`.
    ///
    /// The request id is the session's deserializing id for the duration of
    /// the call. Failures are reported to the diagnostic sink and come back as
    /// [`CodecError::ArgumentDeserialization`].
    pub(crate) fn materialize_argument<R>(
        &self,
        id: &RequestId,
        name: Option<&str>,
        position: Option<usize>,
        cell: &Value,
        target: &TargetType,
        finish: impl FnOnce(Materialized) -> CodecResult<R>,
    ) -> CodecResult<R> {
        let outcome = {
            let _deserializing = self.0.session.begin_deserializing(id.clone())?;
            self.0.context().materialize(cell, target).and_then(finish)
        };

        outcome.map_err(|source| {
            let message = format!(
                "Failure deserializing RPC argument {} (position {}) into {}: {}",
                name.unwrap_or("<unnamed>"),
                position.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string()),
                target,
                source
            );
            self.0
                .diagnostics
                .warning(DiagnosticEvent::ArgumentDeserializationFailure, &message);

            CodecError::ArgumentDeserialization {
                name: name.map(str::to_owned),
                position,
                type_name: target.type_name(),
                source: Box::new(source),
            }
        })
    }

    pub(crate) fn use_single_object_parameter(&self, method: &str, parameters: &[ParameterInfo]) -> bool {
        self.0
            .dispatcher
            .as_ref()
            .is_some_and(|dispatcher| dispatcher.use_single_object_parameter(method, parameters))
    }
}

impl fmt::Debug for Materializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Materializer").field(&self.0.config.protocol_version).finish()
    }
}

/// Messages compare by content; which codec read them does not matter.
impl PartialEq for Materializer {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

use serde_json::Value;

use super::{ConversionContext, Materialized, MessageConverter, TargetType};
use crate::error::{CodecError, CodecResult};
use crate::message::Payload;

/// Writes a progress sink we own as the integer token minted by the tracker.
pub struct ProgressSinkConverter;

impl MessageConverter for ProgressSinkConverter {
    fn name(&self) -> &str {
        "progress-sink"
    }

    fn can_write(&self, value: &Payload) -> bool {
        matches!(value, Payload::Progress(_))
    }

    fn write(&self, value: &Payload, ctx: &ConversionContext<'_>) -> CodecResult<Value> {
        let Payload::Progress(sink) = value else {
            return Err(CodecError::Unsupported(format!("{} is not a progress sink", value.kind())));
        };
        let token = ctx.progress_tracker()?.token_for(sink, ctx)?;
        Ok(Value::from(token))
    }
}

/// Reads a progress token sent by the peer into a sink that reports back.
pub struct ProgressSourceConverter;

impl MessageConverter for ProgressSourceConverter {
    fn name(&self) -> &str {
        "progress-source"
    }

    fn can_read(&self, target: &TargetType) -> bool {
        matches!(target, TargetType::Progress(_))
    }

    fn read(
        &self,
        cell: &Value,
        target: &TargetType,
        ctx: &ConversionContext<'_>,
    ) -> CodecResult<Materialized> {
        let TargetType::Progress(value_type) = target else {
            return Err(CodecError::Unsupported(format!("{} is not a progress type", target)));
        };
        if cell.is_null() {
            return Ok(Materialized::Progress(None));
        }

        let sink = ctx.progress_tracker()?.create_sink(cell, value_type, ctx)?;
        Ok(Materialized::Progress(Some(sink)))
    }
}

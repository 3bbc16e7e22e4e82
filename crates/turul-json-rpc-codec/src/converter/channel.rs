use serde_json::Value;

use super::{ConversionContext, Materialized, MessageConverter, TargetType, read_token};
use crate::error::{CodecError, CodecResult};
use crate::message::Payload;
use crate::tracker::EndpointKind;

/// Marshals duplex channels, readers, writers and byte streams as a single
/// integer-or-null token issued by the channel tracker.
pub struct ChannelConverter;

impl MessageConverter for ChannelConverter {
    fn name(&self) -> &str {
        "channel"
    }

    fn can_write(&self, value: &Payload) -> bool {
        matches!(value, Payload::Endpoint(_))
    }

    fn write(&self, value: &Payload, ctx: &ConversionContext<'_>) -> CodecResult<Value> {
        let Payload::Endpoint(endpoint) = value else {
            return Err(CodecError::Unsupported(format!("{} is not a channel endpoint", value.kind())));
        };
        let token = ctx.channel_tracker()?.token_for(endpoint, ctx)?;
        Ok(token.map(Value::from).unwrap_or(Value::Null))
    }

    fn can_read(&self, target: &TargetType) -> bool {
        matches!(target, TargetType::Channel(_))
    }

    fn read(
        &self,
        cell: &Value,
        target: &TargetType,
        ctx: &ConversionContext<'_>,
    ) -> CodecResult<Materialized> {
        let TargetType::Channel(kind) = target else {
            return Err(CodecError::Unsupported(format!("{} is not a channel type", target)));
        };
        let token = read_token(cell)?;
        let tracker = ctx.channel_tracker()?;

        let endpoint = match kind {
            EndpointKind::Stream => tracker
                .resolve(token, EndpointKind::Duplex, ctx)?
                .map(|duplex| duplex.into_stream())
                .transpose()?,
            other => tracker.resolve(token, *other, ctx)?,
        };
        Ok(Materialized::Endpoint(endpoint))
    }
}

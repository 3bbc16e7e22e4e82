use serde_json::{Map, Value};

use super::{ConversionContext, Materialized, MessageConverter, TargetType};
use crate::error::{CodecError, CodecResult};
use crate::message::Payload;
use crate::{TOKEN_PROPERTY, VALUES_PROPERTY};

/// Writes `{ "token"?: n, "values"?: [...] }` for a sequence we produce.
///
/// Buffered elements travel with the message. The token is only written
/// while the sequence can still produce more, so the consumer never waits
/// on an exhausted producer.
pub struct SequenceProducerConverter;

impl MessageConverter for SequenceProducerConverter {
    fn name(&self) -> &str {
        "sequence-producer"
    }

    fn can_write(&self, value: &Payload) -> bool {
        value.find_sequence().is_some()
    }

    fn write(&self, value: &Payload, ctx: &ConversionContext<'_>) -> CodecResult<Value> {
        let sequence = value.find_sequence().ok_or_else(|| {
            CodecError::Unsupported(format!("{} is not a sequence", value.kind()))
        })?;

        let (elements, finished) = sequence.tear_off_prefetched();
        let mut object = Map::new();

        if !finished {
            let token = ctx.sequence_tracker()?.token_for(&sequence, ctx)?;
            object.insert(TOKEN_PROPERTY.to_string(), Value::from(token));
        }

        if !elements.is_empty() {
            let values = elements
                .iter()
                .map(|element| ctx.tokenize(element))
                .collect::<CodecResult<Vec<_>>>()?;
            object.insert(VALUES_PROPERTY.to_string(), Value::Array(values));
        }

        Ok(Value::Object(object))
    }
}

/// Reads a sequence sent by the peer; the tracker builds the proxy that
/// fetches whatever did not arrive with the message.
pub struct SequenceConsumerConverter;

impl MessageConverter for SequenceConsumerConverter {
    fn name(&self) -> &str {
        "sequence-consumer"
    }

    fn can_read(&self, target: &TargetType) -> bool {
        matches!(target, TargetType::Sequence(_))
    }

    fn read(
        &self,
        cell: &Value,
        target: &TargetType,
        ctx: &ConversionContext<'_>,
    ) -> CodecResult<Materialized> {
        let TargetType::Sequence(element_type) = target else {
            return Err(CodecError::Unsupported(format!("{} is not a sequence type", target)));
        };
        if cell.is_null() {
            return Ok(Materialized::Sequence(None));
        }

        let object = cell.as_object().ok_or_else(|| {
            CodecError::converter(format!("expected a sequence object, found {}", cell))
        })?;
        let token = object.get(TOKEN_PROPERTY);

        let prefetched = match object.get(VALUES_PROPERTY) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(values)) => values
                .iter()
                .map(|value| ctx.materialize(value, element_type))
                .collect::<CodecResult<Vec<_>>>()?,
            Some(other) => {
                return Err(CodecError::converter(format!(
                    "sequence values must be an array, found {}",
                    other
                )));
            }
        };

        let proxy = ctx
            .sequence_tracker()?
            .create_proxy(token, prefetched, element_type, ctx)?;
        Ok(Materialized::Sequence(Some(proxy)))
    }
}

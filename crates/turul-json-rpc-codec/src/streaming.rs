//! Async byte-stream entry points.
//!
//! A read returns as soon as one complete JSON value has arrived; bytes after
//! it stay in the reader for the next call. A reader that ends early is
//! parsed as it stands, so truncated input fails the same way it does in the
//! buffered form.

use bytes::BytesMut;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::codec::MessageCodec;
use crate::error::{CodecError, CodecResult};
use crate::message::RpcMessage;
use crate::types::TextEncoding;

impl MessageCodec {
    /// Read one message from `reader`, giving up as soon as `cancel` fires.
    ///
    /// Fails with [`CodecError::MessageTooLarge`] once the message outgrows
    /// the configured `max_message_size`.
    pub async fn deserialize_async<R>(
        &self,
        reader: &mut R,
        encoding: TextEncoding,
        cancel: &CancellationToken,
    ) -> CodecResult<RpcMessage>
    where
        R: AsyncBufRead + Unpin + ?Sized,
    {
        let limit = self.config().max_message_size;
        let mut buffer = BytesMut::new();

        loop {
            let received = buffer.len();
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    trace!("Message read cancelled");
                    return Err(CodecError::Cancelled);
                }
                available = reader.fill_buf() => {
                    let available = available?;
                    buffer.extend_from_slice(available);
                    available.len()
                }
            };

            if read == 0 {
                trace!(bytes = buffer.len(), "Stream ended before a complete message");
                return self.deserialize_with_encoding(&buffer, encoding);
            }

            match frame_end(&buffer, encoding)? {
                Some((end, _)) if end > limit => return Err(CodecError::MessageTooLarge { limit }),
                Some((end, document)) => {
                    reader.consume(end - received);
                    trace!(bytes = end, "Read JSON-RPC message frame");
                    return self.deserialize_value(&document);
                }
                None if buffer.len() > limit => return Err(CodecError::MessageTooLarge { limit }),
                None => reader.consume(read),
            }
        }
    }

    /// [`MessageCodec::deserialize_async`] in the configured encoding.
    pub async fn read_message<R>(&self, reader: &mut R, cancel: &CancellationToken) -> CodecResult<RpcMessage>
    where
        R: AsyncBufRead + Unpin + ?Sized,
    {
        self.deserialize_async(reader, self.encoding(), cancel).await
    }

    /// Serialize `message` and write it to `writer`.
    pub async fn write_message<W>(&self, writer: &mut W, message: &RpcMessage) -> CodecResult<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let bytes = self.serialize(message)?;
        writer.write_all(&bytes).await?;
        writer.flush().await?;
        Ok(())
    }
}

/// Byte length of the first complete JSON value in `buffer`, with the value.
/// `None` while the value is still incomplete.
fn frame_end(buffer: &[u8], encoding: TextEncoding) -> CodecResult<Option<(usize, Value)>> {
    let preamble = encoding.preamble_len(buffer);
    let body = &buffer[preamble..];
    let text = encoding.decode(&body[..encoding.whole_char_len(body)?])?;

    let mut values = serde_json::Deserializer::from_str(&text).into_iter::<Value>();
    match values.next() {
        Some(Ok(document)) => {
            let consumed = encoding.encoded_len(&text[..values.byte_offset()]);
            Ok(Some((preamble + consumed, document)))
        }
        Some(Err(e)) if e.is_eof() => Ok(None),
        Some(Err(e)) => Err(CodecError::deserialization(e.to_string(), None)),
        None => Ok(None),
    }
}

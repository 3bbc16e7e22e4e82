//! Formatter session state.
//!
//! While a message is being serialized or its arguments deserialized, the
//! codec records which message that is so converters and trackers can
//! associate tokens with it. There is one slot per direction and each slot is
//! held by a guard that clears it on drop, so every exit path (including
//! errors and unwinding) leaves the session clean.

use parking_lot::Mutex;

use crate::error::{CodecError, CodecResult};
use crate::types::RequestId;

/// Snapshot of what the codec is processing right now.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatterState {
    /// Id of the message being serialized, if any
    pub serializing_message_id: RequestId,
    /// Id of the message whose arguments are being deserialized, if any
    pub deserializing_message_id: RequestId,
    /// Whether the message being serialized is a request
    pub serializing_request: bool,
}

#[derive(Debug, Clone)]
struct SerializingSlot {
    id: RequestId,
    request: bool,
}

#[derive(Debug, Default)]
struct Slots {
    serializing: Option<SerializingSlot>,
    deserializing: Option<RequestId>,
}

#[derive(Debug, Default)]
pub struct FormatterSession {
    slots: Mutex<Slots>,
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Serializing,
    Deserializing,
}

impl FormatterSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> FormatterState {
        let slots = self.slots.lock();
        let (serializing_message_id, serializing_request) = slots
            .serializing
            .as_ref()
            .map(|slot| (slot.id.clone(), slot.request))
            .unwrap_or_default();

        FormatterState {
            serializing_message_id,
            deserializing_message_id: slots.deserializing.clone().unwrap_or_default(),
            serializing_request,
        }
    }

    /// Mark `id` as the message being serialized until the guard drops.
    pub fn begin_serializing(&self, id: RequestId, request: bool) -> CodecResult<SessionGuard<'_>> {
        let mut slots = self.slots.lock();
        if slots.serializing.is_some() {
            return Err(CodecError::SessionBusy("serializing"));
        }
        slots.serializing = Some(SerializingSlot { id, request });
        Ok(SessionGuard {
            session: self,
            direction: Direction::Serializing,
        })
    }

    /// Mark `id` as the message being deserialized until the guard drops.
    pub fn begin_deserializing(&self, id: RequestId) -> CodecResult<SessionGuard<'_>> {
        let mut slots = self.slots.lock();
        if slots.deserializing.is_some() {
            return Err(CodecError::SessionBusy("deserializing"));
        }
        slots.deserializing = Some(id);
        Ok(SessionGuard {
            session: self,
            direction: Direction::Deserializing,
        })
    }

    fn release(&self, direction: Direction) {
        let mut slots = self.slots.lock();
        match direction {
            Direction::Serializing => slots.serializing = None,
            Direction::Deserializing => slots.deserializing = None,
        }
    }
}

/// Holds one direction of the session; releases it when dropped.
#[derive(Debug)]
#[must_use = "the session slot is released as soon as the guard is dropped"]
pub struct SessionGuard<'a> {
    session: &'a FormatterSession,
    direction: Direction,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.session.release(self.direction);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_sets_and_clears_state() {
        let session = FormatterSession::new();
        {
            let _guard = session.begin_serializing(RequestId::Number(3), true).unwrap();
            let state = session.snapshot();
            assert_eq!(state.serializing_message_id, RequestId::Number(3));
            assert!(state.serializing_request);
            assert!(state.deserializing_message_id.is_empty());
        }
        assert_eq!(session.snapshot(), FormatterState::default());
    }

    #[test]
    fn test_one_message_per_direction() {
        let session = FormatterSession::new();
        let _serializing = session.begin_serializing(RequestId::None, false).unwrap();
        assert!(matches!(
            session.begin_serializing(RequestId::Number(1), true),
            Err(CodecError::SessionBusy("serializing"))
        ));

        // The other direction is independent.
        let _deserializing = session.begin_deserializing(RequestId::from("a")).unwrap();
        assert!(matches!(
            session.begin_deserializing(RequestId::from("b")),
            Err(CodecError::SessionBusy("deserializing"))
        ));
        assert_eq!(session.snapshot().deserializing_message_id, RequestId::from("a"));
    }

    #[test]
    fn test_state_cleared_on_error_path() {
        fn fails(session: &FormatterSession) -> CodecResult<()> {
            let _guard = session.begin_deserializing(RequestId::Number(9))?;
            Err(CodecError::converter("boom"))
        }

        let session = FormatterSession::new();
        assert!(fails(&session).is_err());
        assert!(session.snapshot().deserializing_message_id.is_empty());
        assert!(session.begin_deserializing(RequestId::Number(10)).is_ok());
    }

    #[test]
    fn test_state_cleared_on_panic() {
        let session = FormatterSession::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = session.begin_serializing(RequestId::Number(1), true).unwrap();
            panic!("converter panicked");
        }));
        assert!(result.is_err());
        assert_eq!(session.snapshot(), FormatterState::default());
    }
}

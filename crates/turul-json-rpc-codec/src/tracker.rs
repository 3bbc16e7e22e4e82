//! Collaborators the codec calls into but does not implement.
//!
//! Trackers own the mapping between opaque integer tokens and live objects
//! (progress sinks, sequences, channels). The codec only asks them to mint a
//! token for an outbound value or to resolve an inbound token.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::arguments::ParameterInfo;
use crate::converter::{ConversionContext, Materialized, TargetType};
use crate::error::{CodecError, CodecResult};
use crate::message::Payload;

/// Receives progress reports.
pub trait ProgressSink: Send + Sync + fmt::Debug {
    fn report(&self, value: Materialized);
}

/// A progress sink registered for inbound `$/progress` notifications.
#[derive(Debug, Clone)]
pub struct ProgressRegistration {
    /// Type each reported value is materialized into
    pub value_type: TargetType,
    pub sink: Arc<dyn ProgressSink>,
}

pub trait ProgressTracker: Send + Sync {
    /// Mint (or reuse) the token identifying a sink we are sending out.
    fn token_for(&self, sink: &Arc<dyn ProgressSink>, ctx: &ConversionContext<'_>) -> CodecResult<i64>;

    /// Find the sink an inbound progress report is addressed to.
    fn lookup(&self, token: i64) -> Option<ProgressRegistration>;

    /// Build a sink that forwards reports for `token` back to the peer.
    fn create_sink(
        &self,
        token: &Value,
        value_type: &TargetType,
        ctx: &ConversionContext<'_>,
    ) -> CodecResult<Arc<dyn ProgressSink>>;
}

/// Producer side of an incrementally produced sequence.
pub trait PrefetchedSequence: Send + Sync + fmt::Debug {
    /// Take the elements produced so far but not yet transmitted, and whether
    /// the sequence has already finished.
    fn tear_off_prefetched(&self) -> (Vec<Payload>, bool);
}

/// Consumer side of an incrementally produced sequence, built by the tracker.
pub trait IncomingSequence: Send + fmt::Debug {
    /// Elements that arrived together with the message
    fn prefetched(&self) -> &[Materialized];

    /// Whether the producer may still deliver more elements
    fn has_more(&self) -> bool;
}

pub trait SequenceTracker: Send + Sync {
    fn token_for(
        &self,
        sequence: &Arc<dyn PrefetchedSequence>,
        ctx: &ConversionContext<'_>,
    ) -> CodecResult<i64>;

    /// `token` is `None` when the producer had already finished.
    fn create_proxy(
        &self,
        token: Option<&Value>,
        prefetched: Vec<Materialized>,
        element_type: &TargetType,
        ctx: &ConversionContext<'_>,
    ) -> CodecResult<Box<dyn IncomingSequence>>;
}

/// Which view of a channel a value exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointKind {
    Duplex,
    Reader,
    Writer,
    Stream,
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EndpointKind::Duplex => "duplex channel",
            EndpointKind::Reader => "channel reader",
            EndpointKind::Writer => "channel writer",
            EndpointKind::Stream => "byte stream",
        };
        write!(f, "{}", name)
    }
}

/// A channel on the multiplexing substrate.
pub trait DuplexChannel: Send + Sync + fmt::Debug {
    fn channel_id(&self) -> u64;
}

#[derive(Debug, Clone)]
pub struct Endpoint {
    pub kind: EndpointKind,
    pub channel: Arc<dyn DuplexChannel>,
}

impl Endpoint {
    pub fn new(kind: EndpointKind, channel: Arc<dyn DuplexChannel>) -> Self {
        Self { kind, channel }
    }

    /// View a duplex channel as a plain byte stream.
    pub fn into_stream(self) -> CodecResult<Endpoint> {
        match self.kind {
            EndpointKind::Duplex | EndpointKind::Stream => {
                Ok(Endpoint::new(EndpointKind::Stream, self.channel))
            }
            other => Err(CodecError::converter(format!(
                "a {} cannot be used as a byte stream",
                other
            ))),
        }
    }
}

pub trait ChannelTracker: Send + Sync {
    fn token_for(&self, endpoint: &Endpoint, ctx: &ConversionContext<'_>) -> CodecResult<Option<i64>>;

    fn resolve(
        &self,
        token: Option<i64>,
        kind: EndpointKind,
        ctx: &ConversionContext<'_>,
    ) -> CodecResult<Option<Endpoint>>;
}

/// What the codec may ask the dispatcher about a method it is binding.
pub trait DispatcherCapabilities: Send + Sync {
    /// Whether `method`, taking exactly these parameters, wants all named
    /// arguments deserialized into its one parameter.
    fn use_single_object_parameter(&self, method: &str, parameters: &[ParameterInfo]) -> bool;
}

/// The trackers configured on a codec. Missing trackers surface as
/// [`CodecError::MissingTracker`] only when a value actually needs one.
#[derive(Clone, Default)]
pub struct Trackers {
    pub progress: Option<Arc<dyn ProgressTracker>>,
    pub sequences: Option<Arc<dyn SequenceTracker>>,
    pub channels: Option<Arc<dyn ChannelTracker>>,
}

impl Trackers {
    pub fn progress(&self) -> CodecResult<&dyn ProgressTracker> {
        self.progress
            .as_deref()
            .ok_or(CodecError::MissingTracker("progress"))
    }

    pub fn sequences(&self) -> CodecResult<&dyn SequenceTracker> {
        self.sequences
            .as_deref()
            .ok_or(CodecError::MissingTracker("sequence"))
    }

    pub fn channels(&self) -> CodecResult<&dyn ChannelTracker> {
        self.channels
            .as_deref()
            .ok_or(CodecError::MissingTracker("channel"))
    }
}

impl fmt::Debug for Trackers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trackers")
            .field("progress", &self.progress.is_some())
            .field("sequences", &self.sequences.is_some())
            .field("channels", &self.channels.is_some())
            .finish()
    }
}

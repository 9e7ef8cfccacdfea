//! ChatStream core
//!
//! Transport-agnostic pieces of the streaming-response relay: a
//! line-oriented chunk decoder, a bounded reassembly buffer, the event
//! normalizer, the terminal-state guard around the outbound channel,
//! and the session registry used for cancellation.
//!
//! The flow for one exchange:
//! raw chunks -> [`LineDecoder`] -> [`normalize`] -> [`EventPublisher`]
//! driven by a [`StreamPipeline`], with the [`SessionRegistry`] holding
//! the cancellable handle for the session's lifetime.

pub mod buffer;
pub mod config;
pub mod decoder;
pub mod error;
pub mod events;
pub mod normalize;
pub mod pipeline;
pub mod publish;
pub mod session;

pub use buffer::ReassemblyBuffer;
pub use config::{ClientProfile, StreamConfig};
pub use decoder::LineDecoder;
pub use error::{ChatStreamError, Result};
pub use events::{EventKind, NormalizedEvent};
pub use normalize::normalize;
pub use pipeline::StreamPipeline;
pub use publish::{create_event_channel, EventPublisher, EventReceiver, EventSender, SessionState};
pub use session::{SessionHandle, SessionRegistry};

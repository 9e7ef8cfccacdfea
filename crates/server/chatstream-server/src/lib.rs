//! ChatStream relay server
//!
//! HTTP surface for the streaming relay: `POST /stream` opens a
//! normalized SSE stream backed by the upstream automation webhook,
//! `POST /stream/cancel` aborts an in-flight session by key, and
//! `GET /health` reports liveness. All protocol logic lives in
//! `chatstream-core`; this crate is the transport adapter around it.

pub mod handlers;
pub mod server;
pub mod types;
pub mod upstream;

pub use server::{build_router, run, ServerConfig, ServerState};
pub use types::{AgentModel, CancelRequest, CancelResponse, StreamRequest};
pub use upstream::UpstreamClient;

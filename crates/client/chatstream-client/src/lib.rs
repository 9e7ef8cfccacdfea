//! ChatStream receiving side
//!
//! Consumes the relay's normalized SSE stream and turns it into a small
//! number of UI updates: batched text deltas on an adaptive cadence, one
//! terminal `Completed` or `Failed`, nothing after that. Cancellation
//! aborts the read loop and drops any pending flush.

#![warn(missing_docs)]

use chatstream_core::config::DEFAULT_MAX_BUFFER_SIZE;
use chatstream_core::{ChatStreamError, Result};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

pub mod reassemble;
pub mod sse;

pub use reassemble::{adaptive_flush_interval, ClientUpdate, FlushTuning, Reassembler};
pub use sse::SseFrameDecoder;

/// One agent/model pairing to request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentModelChoice {
    /// Agent name
    pub agent: String,
    /// Model to run that agent with
    pub model: String,
}

/// Request sent to the relay's `/stream` endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AskRequest {
    /// The question to ask
    pub question: String,

    /// Exchange type
    #[serde(rename = "type")]
    pub request_type: String,

    /// Session key for continuing an earlier exchange
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,

    /// Single-model selection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_model: Option<String>,

    /// Per-agent model selection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_models: Option<Vec<AgentModelChoice>>,
}

/// Client for one relay server
pub struct StreamClient {
    client: reqwest::Client,
    base_url: String,
    tuning: FlushTuning,
}

impl StreamClient {
    /// Create a client for the relay at `base_url`
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            tuning: FlushTuning::default(),
        })
    }

    /// Override the flush cadence bounds
    pub fn with_tuning(mut self, tuning: FlushTuning) -> Self {
        self.tuning = tuning;
        self
    }

    /// Open a stream for `request` and deliver updates until a terminal
    /// event, the relay closing, or a cancel signal. Dropping the
    /// response on cancel aborts the underlying transfer.
    pub async fn stream(
        &self,
        request: &AskRequest,
        updates: mpsc::Sender<ClientUpdate>,
        cancel_rx: oneshot::Receiver<()>,
    ) -> Result<()> {
        let url = format!("{}/stream", self.base_url);
        let mut response = self.client.post(&url).json(request).send().await?;
        if !response.status().is_success() {
            return Err(ChatStreamError::upstream(format!(
                "Relay returned status {}",
                response.status().as_u16()
            )));
        }

        let mut frames = SseFrameDecoder::new(DEFAULT_MAX_BUFFER_SIZE);
        let mut reassembler = Reassembler::new(self.tuning.clone());
        let mut cancel_rx = Some(cancel_rx);

        loop {
            let idle_flush = tokio::time::sleep(reassembler.flush_interval());
            tokio::select! {
                chunk = response.chunk() => match chunk {
                    Ok(Some(bytes)) => {
                        for event in frames.feed(&bytes) {
                            if let Some(update) = reassembler.push(event) {
                                let terminal = update.is_terminal();
                                if updates.send(update).await.is_err() || terminal {
                                    return Ok(());
                                }
                            }
                        }
                        if let Some(update) = reassembler.take_due_delta() {
                            if updates.send(update).await.is_err() {
                                return Ok(());
                            }
                        }
                    }
                    Ok(None) => {
                        for event in frames.finish() {
                            if let Some(update) = reassembler.push(event) {
                                let terminal = update.is_terminal();
                                if updates.send(update).await.is_err() || terminal {
                                    return Ok(());
                                }
                            }
                        }
                        // The relay closed without a terminal frame.
                        if reassembler.has_pending() {
                            let _ = updates.send(reassembler.flush_pending()).await;
                        }
                        let _ = updates
                            .send(ClientUpdate::Failed("Stream ended unexpectedly".to_string()))
                            .await;
                        return Ok(());
                    }
                    Err(e) => {
                        error!("CLIENT_READ_FAILED err={}", e);
                        let _ = updates
                            .send(ClientUpdate::Failed(
                                "Connection to the relay lost".to_string(),
                            ))
                            .await;
                        return Ok(());
                    }
                },
                cancelled = wait_for_cancel(&mut cancel_rx) => {
                    if cancelled {
                        debug!("CLIENT_CANCELLED pending dropped");
                        return Ok(());
                    }
                }
                _ = idle_flush, if reassembler.has_pending() => {
                    let update = reassembler.flush_pending();
                    if updates.send(update).await.is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Await the cancel signal. A dropped sender means cancellation can
/// never arrive, in which case the slot is emptied and later calls pend
/// forever instead of spinning the select loop.
async fn wait_for_cancel(cancel_rx: &mut Option<oneshot::Receiver<()>>) -> bool {
    match cancel_rx {
        Some(rx) => {
            let fired = rx.await.is_ok();
            *cancel_rx = None;
            fired
        }
        None => std::future::pending().await,
    }
}

//! Upstream automation-engine client
//!
//! Forwards a validated request to the configured webhook and feeds the
//! chunked NDJSON response body into the session's pipeline. Transport
//! failures surface as a single user-safe error event; raw detail stays
//! in the log.

use crate::types::StreamRequest;
use chatstream_core::StreamPipeline;
use reqwest::Client;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, error};

/// Shared HTTP client for connection pooling to the automation engine
static HTTP_CLIENT: OnceLock<Arc<Client>> = OnceLock::new();

/// Get or initialize the shared HTTP client
fn get_http_client() -> Arc<Client> {
    HTTP_CLIENT
        .get_or_init(|| {
            Arc::new(
                Client::builder()
                    .pool_max_idle_per_host(50)
                    .pool_idle_timeout(Duration::from_secs(300))
                    .tcp_keepalive(Duration::from_secs(60))
                    .connect_timeout(Duration::from_secs(10))
                    .build()
                    .unwrap_or_else(|e| {
                        panic!(
                            "Failed to create HTTP client: {}. This is a configuration error.",
                            e
                        )
                    }),
            )
        })
        .clone()
}

/// Client for the upstream webhook
#[derive(Clone)]
pub struct UpstreamClient {
    client: Arc<Client>,
    webhook_url: String,
}

impl UpstreamClient {
    /// Create a client targeting `webhook_url`, using the shared pool
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            client: get_http_client(),
            webhook_url: webhook_url.into(),
        }
    }

    /// Forward the request upstream and drive `pipeline` with the chunked
    /// response body until a terminal event, stream end, or transport
    /// failure. Never returns an error; every failure mode ends as a
    /// terminal event on the pipeline.
    pub async fn stream(
        &self,
        request: &StreamRequest,
        session_key: &str,
        pipeline: &mut StreamPipeline,
    ) {
        let payload = serde_json::json!({
            "question": request.question,
            "type": request.request_type,
            "sessionKey": session_key,
            "aiModel": request.ai_model,
            "agentModels": request.agent_models,
            "file": request.file,
        });

        let mut response = match self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("UPSTREAM_CONNECT_FAILED session={} err={}", session_key, e);
                pipeline
                    .handle_error("Could not reach the automation engine")
                    .await;
                return;
            }
        };

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .text()
                .await
                .unwrap_or_else(|e| format!("unreadable error body: {}", e));
            error!(
                "UPSTREAM_STATUS session={} status={} body_preview={}",
                session_key,
                status,
                detail.chars().take(200).collect::<String>()
            );
            pipeline
                .handle_error(format!(
                    "The automation engine returned an error ({})",
                    status.as_u16()
                ))
                .await;
            return;
        }

        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    pipeline.handle_chunk(&chunk).await;
                    if pipeline.saw_terminal() {
                        // Explicit end arrived; stop observing upstream.
                        debug!("UPSTREAM_TERMINAL session={} draining stopped", session_key);
                        break;
                    }
                }
                Ok(None) => {
                    pipeline.handle_end().await;
                    break;
                }
                Err(e) => {
                    error!("UPSTREAM_READ_FAILED session={} err={}", session_key, e);
                    pipeline.handle_error("Upstream connection lost").await;
                    break;
                }
            }
        }
    }
}

//! Types for the relay HTTP API
//!
//! Defines request and response structures for the streaming endpoints,
//! plus the validation run before any stream is opened.

use chatstream_core::ClientProfile;
use serde::{Deserialize, Serialize};

/// Agents a request may address
pub const AGENT_ALLOW_LIST: &[&str] = &["orchestrator", "research", "code", "analysis", "writing"];

/// Maximum decoded size of an attached file (10 MB)
pub const MAX_FILE_DECODED_BYTES: usize = 10 * 1024 * 1024;

/// One agent/model pairing from the request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentModel {
    /// Agent name; must be in [`AGENT_ALLOW_LIST`]
    pub agent: String,

    /// Model to run that agent with
    pub model: String,
}

/// Request to open a streaming exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRequest {
    /// The user's question
    pub question: String,

    /// Exchange type, forwarded verbatim to the automation engine
    #[serde(rename = "type")]
    pub request_type: String,

    /// Session key for continuations; generated when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(alias = "session_key")]
    pub session_key: Option<String>,

    /// Single-model selection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_model: Option<String>,

    /// Per-agent model selection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_models: Option<Vec<AgentModel>>,

    /// Optional base64-encoded attachment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Client device profile; picks the reassembly bound
    #[serde(default)]
    pub client_profile: ClientProfile,
}

impl StreamRequest {
    /// Validate the request. Runs before a stream is opened so failures
    /// are synchronous errors, never error frames.
    pub fn validate(&self) -> Result<(), String> {
        if self.question.trim().is_empty() {
            return Err("Question cannot be empty".to_string());
        }
        if self.request_type.trim().is_empty() {
            return Err("Request type cannot be empty".to_string());
        }

        let has_model = self
            .ai_model
            .as_deref()
            .map(|m| !m.trim().is_empty())
            .unwrap_or(false);
        let agent_models = self.agent_models.as_deref().unwrap_or(&[]);
        if !has_model && agent_models.is_empty() {
            return Err("At least one of aiModel or agentModels is required".to_string());
        }

        for pair in agent_models {
            if !AGENT_ALLOW_LIST.contains(&pair.agent.as_str()) {
                return Err(format!(
                    "Unknown agent '{}'. Allowed agents: {}",
                    pair.agent,
                    AGENT_ALLOW_LIST.join(", ")
                ));
            }
            if pair.model.trim().is_empty() {
                return Err(format!("Agent '{}' has no model configured", pair.agent));
            }
        }

        if let Some(file) = &self.file {
            validate_file(file)?;
        }

        Ok(())
    }
}

/// Check the attachment is valid base64 under the decoded-size ceiling
fn validate_file(encoded: &str) -> Result<(), String> {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

    // Cheap ceiling on the encoded form before attempting a decode.
    let encoded_limit = MAX_FILE_DECODED_BYTES / 3 * 4 + 4;
    if encoded.len() > encoded_limit {
        return Err(format!(
            "File too large: decoded size exceeds {} bytes",
            MAX_FILE_DECODED_BYTES
        ));
    }

    let decoded = BASE64
        .decode(encoded.trim())
        .map_err(|_| "File is not valid base64".to_string())?;
    if decoded.len() > MAX_FILE_DECODED_BYTES {
        return Err(format!(
            "File too large: decoded size exceeds {} bytes",
            MAX_FILE_DECODED_BYTES
        ));
    }
    Ok(())
}

/// Request to cancel an in-flight session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    /// Key of the session to cancel
    #[serde(alias = "session_key")]
    pub session_key: String,
}

/// Response from the cancel endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    /// Always true; cancel is a no-op success on unknown sessions
    pub success: bool,

    /// Whether an in-flight session was actually cancelled
    pub cancelled: bool,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Number of currently registered sessions
    pub active_sessions: usize,
}

//! Post-call webhook payload, as delivered by the voice platform.
//!
//! Every section except `data.agent_id` / `data.conversation_id` is optional;
//! unknown fields are ignored so platform additions do not break ingestion.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationLogPayload {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Unix seconds
    pub event_timestamp: Option<i64>,
    pub data: Option<ConversationData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationData {
    pub agent_id: Option<String>,
    pub conversation_id: Option<String>,
    pub status: Option<String>,
    pub transcript: Option<Vec<TranscriptTurn>>,
    pub metadata: Option<MetadataPayload>,
    pub analysis: Option<AnalysisPayload>,
    pub conversation_initiation_client_data: Option<InitiationPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptTurn {
    pub role: String,
    pub message: Option<String>,
    pub tool_calls: Option<Vec<ToolCallPayload>>,
    pub tool_results: Option<Vec<ToolResultPayload>>,
    pub feedback: Option<Value>,
    pub time_in_call_secs: Option<i64>,
    pub conversation_turn_metrics: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallPayload {
    pub name: String,
    pub function: Option<String>,
    pub parameters: Option<Value>,
    /// RFC 3339
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolResultPayload {
    pub result: Option<Value>,
    pub success: Option<bool>,
    pub error: Option<String>,
    /// RFC 3339
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataPayload {
    pub start_time_unix_secs: Option<i64>,
    pub call_duration_secs: Option<i64>,
    pub cost: Option<i64>,
    pub deletion_settings: Option<DeletionSettingsPayload>,
    pub feedback: Option<FeedbackPayload>,
    pub authorization_method: Option<String>,
    pub charging: Option<ChargingPayload>,
    pub termination_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeletionSettingsPayload {
    pub deletion_time_unix_secs: Option<i64>,
    pub deleted_logs_at_time_unix_secs: Option<i64>,
    pub deleted_audio_at_time_unix_secs: Option<i64>,
    pub deleted_transcript_at_time_unix_secs: Option<i64>,
    pub delete_transcript_and_pii: Option<bool>,
    pub delete_audio: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedbackPayload {
    pub overall_score: Option<f64>,
    pub likes: Option<i64>,
    pub dislikes: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChargingPayload {
    pub dev_discount: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisPayload {
    pub evaluation_criteria_results: Option<Value>,
    pub data_collection_results: Option<Value>,
    pub call_successful: Option<String>,
    pub transcript_summary: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitiationPayload {
    pub conversation_config_override: Option<ConfigOverride>,
    pub custom_llm_extra_body: Option<Value>,
    pub dynamic_variables: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigOverride {
    pub agent: Option<AgentOverride>,
    pub tts: Option<TtsOverride>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentOverride {
    pub prompt: Option<String>,
    pub first_message: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TtsOverride {
    pub voice_id: Option<String>,
}

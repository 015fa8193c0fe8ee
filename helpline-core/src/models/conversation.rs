use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Conversation {
    pub id: Uuid,
    pub agent_id: String,
    pub external_id: String,
    pub status: String,
    pub event_timestamp: DateTime<Utc>,
    pub start_time_unix_secs: Option<i64>,
    pub call_duration_secs: Option<i64>,
    pub cost: Option<i64>,
    pub call_successful: Option<String>,
    pub transcript_summary: Option<String>,
    pub termination_reason: Option<String>,
    pub authorization_method: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One turn of a transcript. `feedback` and `conversation_turn_metrics` hold serialized JSON.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Transcript {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub position: i32,
    pub role: String,
    pub message: Option<String>,
    pub time_in_call_secs: Option<i64>,
    pub feedback: Option<String>,
    pub conversation_turn_metrics: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ToolCall {
    pub id: Uuid,
    pub transcript_id: Uuid,
    pub position: i32,
    pub tool_name: String,
    pub tool_function: Option<String>,
    pub parameters: Option<String>,
    pub call_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ToolResult {
    pub id: Uuid,
    pub transcript_id: Uuid,
    pub tool_call_id: Option<Uuid>,
    pub position: i32,
    pub result: Option<String>,
    pub success: Option<bool>,
    pub error: Option<String>,
    pub response_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ConversationMetadata {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub start_time_unix_secs: Option<i64>,
    pub call_duration_secs: Option<i64>,
    pub cost: Option<i64>,
    pub authorization_method: Option<String>,
    pub termination_reason: Option<String>,
    pub overall_score: Option<f64>,
    pub likes: i64,
    pub dislikes: i64,
    pub dev_discount: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ConversationAnalysis {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub evaluation_criteria_results: Option<String>,
    pub data_collection_results: Option<String>,
    pub call_successful: Option<String>,
    pub transcript_summary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ConversationInitiation {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub agent_prompt: Option<String>,
    pub agent_first_message: Option<String>,
    pub agent_language: Option<String>,
    pub tts_voice_id: Option<String>,
    pub custom_llm_extra_body: Option<String>,
    pub dynamic_variables: Option<String>,
}

/// Deletion bookkeeping recorded by the voice platform; this service never deletes rows itself.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DeletionSettings {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub deletion_time_unix_secs: Option<i64>,
    pub deleted_logs_at_time_unix_secs: Option<i64>,
    pub deleted_audio_at_time_unix_secs: Option<i64>,
    pub deleted_transcript_at_time_unix_secs: Option<i64>,
    pub delete_transcript_and_pii: bool,
    pub delete_audio: bool,
}

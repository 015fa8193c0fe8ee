//! Validation and row planning for one webhook delivery.
//!
//! Everything that can fail on bad input (shape checks, timestamp parsing,
//! JSON encoding) happens here, before a transaction is opened. The writer
//! only replays the plan.

use chrono::{DateTime, TimeZone, Utc};
use helpline_core::json_text;
use helpline_core::HelplineError;
use serde_json::Value;

use crate::payload::{ConversationData, ConversationLogPayload, TranscriptTurn};

pub const MISSING_REQUIRED_FIELDS: &str =
    "Invalid payload: missing required fields (agent_id, conversation_id)";

/// Status stored when the payload does not carry one.
pub const UNKNOWN_STATUS: &str = "unknown";

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationPlan {
    pub conversation: ConversationRow,
    pub turns: Vec<TurnPlan>,
    pub metadata: Option<MetadataRow>,
    pub analysis: Option<AnalysisRow>,
    pub initiation: Option<InitiationRow>,
    pub deletion_settings: Option<DeletionSettingsRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationRow {
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
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnPlan {
    pub position: i32,
    pub role: String,
    pub message: Option<String>,
    pub time_in_call_secs: Option<i64>,
    pub feedback: Option<String>,
    pub conversation_turn_metrics: Option<String>,
    pub tool_calls: Vec<ToolCallRow>,
    pub tool_results: Vec<ToolResultRow>,
}

impl TurnPlan {
    /// Index into `tool_calls` that this turn's results attach to.
    ///
    /// The payload carries no call/result correlation id, so every result in
    /// a turn is attributed to the last call of that turn.
    pub fn result_call_index(&self) -> Option<usize> {
        self.tool_calls.len().checked_sub(1)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRow {
    pub position: i32,
    pub tool_name: String,
    pub tool_function: Option<String>,
    pub parameters: Option<String>,
    pub call_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolResultRow {
    pub position: i32,
    pub result: Option<String>,
    pub success: Option<bool>,
    pub error: Option<String>,
    pub response_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRow {
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

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRow {
    pub evaluation_criteria_results: Option<String>,
    pub data_collection_results: Option<String>,
    pub call_successful: Option<String>,
    pub transcript_summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InitiationRow {
    pub agent_prompt: Option<String>,
    pub agent_first_message: Option<String>,
    pub agent_language: Option<String>,
    pub tts_voice_id: Option<String>,
    pub custom_llm_extra_body: Option<String>,
    pub dynamic_variables: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeletionSettingsRow {
    pub deletion_time_unix_secs: Option<i64>,
    pub deleted_logs_at_time_unix_secs: Option<i64>,
    pub deleted_audio_at_time_unix_secs: Option<i64>,
    pub deleted_transcript_at_time_unix_secs: Option<i64>,
    pub delete_transcript_and_pii: bool,
    pub delete_audio: bool,
}

/// Deserialize and validate a raw webhook body.
pub fn parse_payload(raw: Value) -> Result<ConversationLogPayload, HelplineError> {
    let payload: ConversationLogPayload = serde_json::from_value(raw)
        .map_err(|e| HelplineError::Validation(format!("Invalid payload: {e}")))?;

    let has_required = payload.data.as_ref().is_some_and(|data| {
        non_empty(data.agent_id.as_deref()) && non_empty(data.conversation_id.as_deref())
    });
    if !has_required {
        return Err(HelplineError::Validation(MISSING_REQUIRED_FIELDS.to_string()));
    }

    Ok(payload)
}

fn non_empty(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

/// Turn a validated payload into the rows to insert. `received_at` stands in
/// for a missing `event_timestamp`.
pub fn build_plan(
    payload: &ConversationLogPayload,
    received_at: DateTime<Utc>,
) -> Result<ConversationPlan, HelplineError> {
    let data = payload
        .data
        .as_ref()
        .ok_or_else(|| HelplineError::Validation(MISSING_REQUIRED_FIELDS.to_string()))?;

    let (agent_id, external_id) = match (data.agent_id.as_deref(), data.conversation_id.as_deref()) {
        (Some(a), Some(c)) if non_empty(Some(a)) && non_empty(Some(c)) => (a, c),
        _ => return Err(HelplineError::Validation(MISSING_REQUIRED_FIELDS.to_string())),
    };

    let event_timestamp = match payload.event_timestamp {
        Some(secs) => Utc.timestamp_opt(secs, 0).single().ok_or_else(|| {
            HelplineError::Validation(format!("Invalid event_timestamp: {secs}"))
        })?,
        None => {
            tracing::warn!(
                conversation_id = external_id,
                "Webhook payload has no event_timestamp, using receipt time"
            );
            received_at
        }
    };

    let metadata = data.metadata.as_ref();
    let analysis = data.analysis.as_ref();

    let conversation = ConversationRow {
        agent_id: agent_id.to_string(),
        external_id: external_id.to_string(),
        status: data
            .status
            .clone()
            .unwrap_or_else(|| UNKNOWN_STATUS.to_string()),
        event_timestamp,
        start_time_unix_secs: metadata.and_then(|m| m.start_time_unix_secs),
        call_duration_secs: metadata.and_then(|m| m.call_duration_secs),
        cost: metadata.and_then(|m| m.cost),
        call_successful: analysis.and_then(|a| a.call_successful.clone()),
        transcript_summary: analysis.and_then(|a| a.transcript_summary.clone()),
        termination_reason: metadata.and_then(|m| m.termination_reason.clone()),
        authorization_method: metadata.and_then(|m| m.authorization_method.clone()),
    };

    let turns = data
        .transcript
        .as_deref()
        .unwrap_or_default()
        .iter()
        .enumerate()
        .map(|(i, turn)| plan_turn(i, turn))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ConversationPlan {
        conversation,
        turns,
        metadata: plan_metadata(data),
        analysis: plan_analysis(data)?,
        initiation: plan_initiation(data)?,
        deletion_settings: plan_deletion_settings(data),
    })
}

fn plan_turn(index: usize, turn: &TranscriptTurn) -> Result<TurnPlan, HelplineError> {
    let tool_calls = turn
        .tool_calls
        .as_deref()
        .unwrap_or_default()
        .iter()
        .enumerate()
        .map(|(i, call)| {
            Ok(ToolCallRow {
                position: position(i)?,
                tool_name: call.name.clone(),
                tool_function: call.function.clone(),
                parameters: json_text::encode(call.parameters.as_ref())?,
                call_timestamp: parse_timestamp("tool_calls.timestamp", call.timestamp.as_deref())?,
            })
        })
        .collect::<Result<Vec<_>, HelplineError>>()?;

    let tool_results = turn
        .tool_results
        .as_deref()
        .unwrap_or_default()
        .iter()
        .enumerate()
        .map(|(i, result)| {
            Ok(ToolResultRow {
                position: position(i)?,
                result: json_text::encode(result.result.as_ref())?,
                success: result.success,
                error: result.error.clone(),
                response_timestamp: parse_timestamp(
                    "tool_results.timestamp",
                    result.timestamp.as_deref(),
                )?,
            })
        })
        .collect::<Result<Vec<_>, HelplineError>>()?;

    Ok(TurnPlan {
        position: position(index)?,
        role: turn.role.clone(),
        message: turn.message.clone(),
        time_in_call_secs: turn.time_in_call_secs,
        feedback: json_text::encode(turn.feedback.as_ref())?,
        conversation_turn_metrics: json_text::encode(turn.conversation_turn_metrics.as_ref())?,
        tool_calls,
        tool_results,
    })
}

fn plan_metadata(data: &ConversationData) -> Option<MetadataRow> {
    let m = data.metadata.as_ref()?;
    let feedback = m.feedback.as_ref();
    Some(MetadataRow {
        start_time_unix_secs: m.start_time_unix_secs,
        call_duration_secs: m.call_duration_secs,
        cost: m.cost,
        authorization_method: m.authorization_method.clone(),
        termination_reason: m.termination_reason.clone(),
        overall_score: feedback.and_then(|f| f.overall_score),
        likes: feedback.and_then(|f| f.likes).unwrap_or(0),
        dislikes: feedback.and_then(|f| f.dislikes).unwrap_or(0),
        dev_discount: m
            .charging
            .as_ref()
            .and_then(|c| c.dev_discount)
            .unwrap_or(false),
    })
}

fn plan_analysis(data: &ConversationData) -> Result<Option<AnalysisRow>, HelplineError> {
    let Some(a) = data.analysis.as_ref() else {
        return Ok(None);
    };
    Ok(Some(AnalysisRow {
        evaluation_criteria_results: json_text::encode(a.evaluation_criteria_results.as_ref())?,
        data_collection_results: json_text::encode(a.data_collection_results.as_ref())?,
        call_successful: a.call_successful.clone(),
        transcript_summary: a.transcript_summary.clone(),
    }))
}

fn plan_initiation(data: &ConversationData) -> Result<Option<InitiationRow>, HelplineError> {
    let Some(init) = data.conversation_initiation_client_data.as_ref() else {
        return Ok(None);
    };
    let overrides = init.conversation_config_override.as_ref();
    let agent = overrides.and_then(|o| o.agent.as_ref());
    Ok(Some(InitiationRow {
        agent_prompt: agent.and_then(|a| a.prompt.clone()),
        agent_first_message: agent.and_then(|a| a.first_message.clone()),
        agent_language: agent.and_then(|a| a.language.clone()),
        tts_voice_id: overrides
            .and_then(|o| o.tts.as_ref())
            .and_then(|t| t.voice_id.clone()),
        custom_llm_extra_body: json_text::encode(init.custom_llm_extra_body.as_ref())?,
        dynamic_variables: json_text::encode(init.dynamic_variables.as_ref())?,
    }))
}

fn plan_deletion_settings(data: &ConversationData) -> Option<DeletionSettingsRow> {
    let d = data.metadata.as_ref()?.deletion_settings.as_ref()?;
    Some(DeletionSettingsRow {
        deletion_time_unix_secs: d.deletion_time_unix_secs,
        deleted_logs_at_time_unix_secs: d.deleted_logs_at_time_unix_secs,
        deleted_audio_at_time_unix_secs: d.deleted_audio_at_time_unix_secs,
        deleted_transcript_at_time_unix_secs: d.deleted_transcript_at_time_unix_secs,
        delete_transcript_and_pii: d.delete_transcript_and_pii.unwrap_or(false),
        delete_audio: d.delete_audio.unwrap_or(false),
    })
}

fn parse_timestamp(
    field: &str,
    raw: Option<&str>,
) -> Result<Option<DateTime<Utc>>, HelplineError> {
    raw.map(|s| {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| HelplineError::Validation(format!("Invalid {field} '{s}': {e}")))
    })
    .transpose()
}

fn position(index: usize) -> Result<i32, HelplineError> {
    i32::try_from(index)
        .map_err(|_| HelplineError::Validation(format!("Too many entries: {index}")))
}

//! Full conversation graph for `GET /conversations/{id}`.

use chrono::{DateTime, Utc};
use helpline_core::json_text;
use helpline_core::models::{
    Conversation, ConversationAnalysis, ConversationInitiation, ConversationMetadata,
    DeletionSettings, ToolCall, ToolResult, Transcript,
};
use helpline_core::HelplineError;
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

pub const NOT_FOUND: &str = "Conversation not found";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDetail {
    pub id: Uuid,
    pub agent_id: String,
    pub conversation_id: String,
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
    pub transcripts: Vec<TranscriptDetail>,
    pub metadata: Option<MetadataDetail>,
    pub analysis: Option<AnalysisDetail>,
    pub initiation: Option<InitiationDetail>,
    pub deletion_settings: Option<DeletionSettingsDetail>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptDetail {
    pub id: Uuid,
    pub role: String,
    pub message: Option<String>,
    pub time_in_call_secs: Option<i64>,
    pub feedback: Value,
    pub conversation_turn_metrics: Value,
    pub tool_calls: Vec<ToolCallDetail>,
    pub tool_results: Vec<ToolResultDetail>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallDetail {
    pub id: Uuid,
    pub tool_name: String,
    pub tool_function: Option<String>,
    pub parameters: Value,
    pub call_timestamp: Option<DateTime<Utc>>,
    pub results: Vec<ToolResultDetail>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResultDetail {
    pub id: Uuid,
    pub tool_call_id: Option<Uuid>,
    pub result: Value,
    pub success: Option<bool>,
    pub error: Option<String>,
    pub response_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataDetail {
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

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisDetail {
    pub evaluation_criteria_results: Value,
    pub data_collection_results: Value,
    pub call_successful: Option<String>,
    pub transcript_summary: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiationDetail {
    pub agent_prompt: Option<String>,
    pub agent_first_message: Option<String>,
    pub agent_language: Option<String>,
    pub tts_voice_id: Option<String>,
    pub custom_llm_extra_body: Value,
    pub dynamic_variables: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionSettingsDetail {
    pub deletion_time_unix_secs: Option<i64>,
    pub deleted_logs_at_time_unix_secs: Option<i64>,
    pub deleted_audio_at_time_unix_secs: Option<i64>,
    pub deleted_transcript_at_time_unix_secs: Option<i64>,
    pub delete_transcript_and_pii: bool,
    pub delete_audio: bool,
}

/// Raw rows of one conversation, before decoding.
#[derive(Debug, Clone)]
pub struct ConversationRows {
    pub conversation: Conversation,
    pub transcripts: Vec<Transcript>,
    pub tool_calls: Vec<ToolCall>,
    pub tool_results: Vec<ToolResult>,
    pub metadata: Option<ConversationMetadata>,
    pub analysis: Option<ConversationAnalysis>,
    pub initiation: Option<ConversationInitiation>,
    pub deletion_settings: Option<DeletionSettings>,
}

/// Parse a path id. Anything that is not a UUID cannot name a stored row.
pub fn parse_conversation_id(raw: &str) -> Result<Uuid, HelplineError> {
    Uuid::parse_str(raw.trim()).map_err(|_| HelplineError::NotFound(NOT_FOUND.to_string()))
}

pub async fn load_rows(pool: &PgPool, id: Uuid) -> Result<ConversationRows, HelplineError> {
    let conversation: Conversation = sqlx::query_as("SELECT * FROM conversations WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| HelplineError::NotFound(NOT_FOUND.to_string()))?;

    let transcripts = sqlx::query_as::<_, Transcript>(
        "SELECT * FROM conversation_transcripts WHERE conversation_id = $1 ORDER BY position, created_at",
    )
    .bind(id)
    .fetch_all(pool);

    let tool_calls = sqlx::query_as::<_, ToolCall>(
        r#"
        SELECT tc.id, tc.transcript_id, tc.position, tc.tool_name, tc.tool_function,
               tc.parameters, tc.call_timestamp
        FROM tool_calls tc
        JOIN conversation_transcripts t ON t.id = tc.transcript_id
        WHERE t.conversation_id = $1
        ORDER BY tc.position
        "#,
    )
    .bind(id)
    .fetch_all(pool);

    let tool_results = sqlx::query_as::<_, ToolResult>(
        r#"
        SELECT tr.id, tr.transcript_id, tr.tool_call_id, tr.position, tr.result,
               tr.success, tr.error, tr.response_timestamp
        FROM tool_results tr
        JOIN conversation_transcripts t ON t.id = tr.transcript_id
        WHERE t.conversation_id = $1
        ORDER BY tr.position
        "#,
    )
    .bind(id)
    .fetch_all(pool);

    let metadata = sqlx::query_as::<_, ConversationMetadata>(
        "SELECT * FROM conversation_metadata WHERE conversation_id = $1",
    )
    .bind(id)
    .fetch_optional(pool);

    let analysis = sqlx::query_as::<_, ConversationAnalysis>(
        "SELECT * FROM conversation_analysis WHERE conversation_id = $1",
    )
    .bind(id)
    .fetch_optional(pool);

    let initiation = sqlx::query_as::<_, ConversationInitiation>(
        "SELECT * FROM conversation_initiation WHERE conversation_id = $1",
    )
    .bind(id)
    .fetch_optional(pool);

    let deletion_settings = sqlx::query_as::<_, DeletionSettings>(
        "SELECT * FROM conversation_deletion_settings WHERE conversation_id = $1",
    )
    .bind(id)
    .fetch_optional(pool);

    let (transcripts, tool_calls, tool_results, metadata, analysis, initiation, deletion_settings) =
        futures::try_join!(
            transcripts,
            tool_calls,
            tool_results,
            metadata,
            analysis,
            initiation,
            deletion_settings
        )?;

    Ok(ConversationRows {
        conversation,
        transcripts,
        tool_calls,
        tool_results,
        metadata,
        analysis,
        initiation,
        deletion_settings,
    })
}

pub async fn fetch_conversation_detail(
    pool: &PgPool,
    id: Uuid,
) -> Result<ConversationDetail, HelplineError> {
    let rows = load_rows(pool, id).await?;
    assemble(rows)
}

fn result_detail(row: &ToolResult) -> Result<ToolResultDetail, HelplineError> {
    Ok(ToolResultDetail {
        id: row.id,
        tool_call_id: row.tool_call_id,
        result: json_text::decode("result", row.result.as_deref())?,
        success: row.success,
        error: row.error.clone(),
        response_timestamp: row.response_timestamp,
    })
}

/// Decode stored JSON text and nest calls and results under their turns.
pub fn assemble(rows: ConversationRows) -> Result<ConversationDetail, HelplineError> {
    let ConversationRows {
        conversation: c,
        mut transcripts,
        tool_calls,
        tool_results,
        metadata,
        analysis,
        initiation,
        deletion_settings,
    } = rows;

    transcripts.sort_by_key(|t| (t.position, t.created_at));

    let mut turns = Vec::with_capacity(transcripts.len());
    for t in &transcripts {
        let results = tool_results
            .iter()
            .filter(|r| r.transcript_id == t.id)
            .map(result_detail)
            .collect::<Result<Vec<_>, _>>()?;

        let calls = tool_calls
            .iter()
            .filter(|call| call.transcript_id == t.id)
            .map(|call| {
                Ok(ToolCallDetail {
                    id: call.id,
                    tool_name: call.tool_name.clone(),
                    tool_function: call.tool_function.clone(),
                    parameters: json_text::decode("parameters", call.parameters.as_deref())?,
                    call_timestamp: call.call_timestamp,
                    results: results
                        .iter()
                        .filter(|r| r.tool_call_id == Some(call.id))
                        .cloned()
                        .collect(),
                })
            })
            .collect::<Result<Vec<_>, HelplineError>>()?;

        turns.push(TranscriptDetail {
            id: t.id,
            role: t.role.clone(),
            message: t.message.clone(),
            time_in_call_secs: t.time_in_call_secs,
            feedback: json_text::decode("feedback", t.feedback.as_deref())?,
            conversation_turn_metrics: json_text::decode(
                "conversation_turn_metrics",
                t.conversation_turn_metrics.as_deref(),
            )?,
            tool_calls: calls,
            tool_results: results,
        });
    }

    let analysis = analysis
        .map(|a| -> Result<AnalysisDetail, HelplineError> {
            Ok(AnalysisDetail {
                evaluation_criteria_results: json_text::decode(
                    "evaluation_criteria_results",
                    a.evaluation_criteria_results.as_deref(),
                )?,
                data_collection_results: json_text::decode(
                    "data_collection_results",
                    a.data_collection_results.as_deref(),
                )?,
                call_successful: a.call_successful,
                transcript_summary: a.transcript_summary,
            })
        })
        .transpose()?;

    let initiation = initiation
        .map(|i| -> Result<InitiationDetail, HelplineError> {
            Ok(InitiationDetail {
                custom_llm_extra_body: json_text::decode(
                    "custom_llm_extra_body",
                    i.custom_llm_extra_body.as_deref(),
                )?,
                dynamic_variables: json_text::decode(
                    "dynamic_variables",
                    i.dynamic_variables.as_deref(),
                )?,
                agent_prompt: i.agent_prompt,
                agent_first_message: i.agent_first_message,
                agent_language: i.agent_language,
                tts_voice_id: i.tts_voice_id,
            })
        })
        .transpose()?;

    Ok(ConversationDetail {
        id: c.id,
        agent_id: c.agent_id,
        conversation_id: c.external_id,
        status: c.status,
        event_timestamp: c.event_timestamp,
        start_time_unix_secs: c.start_time_unix_secs,
        call_duration_secs: c.call_duration_secs,
        cost: c.cost,
        call_successful: c.call_successful,
        transcript_summary: c.transcript_summary,
        termination_reason: c.termination_reason,
        authorization_method: c.authorization_method,
        created_at: c.created_at,
        transcripts: turns,
        metadata: metadata.map(|m| MetadataDetail {
            start_time_unix_secs: m.start_time_unix_secs,
            call_duration_secs: m.call_duration_secs,
            cost: m.cost,
            authorization_method: m.authorization_method,
            termination_reason: m.termination_reason,
            overall_score: m.overall_score,
            likes: m.likes,
            dislikes: m.dislikes,
            dev_discount: m.dev_discount,
        }),
        analysis,
        initiation,
        deletion_settings: deletion_settings.map(|d| DeletionSettingsDetail {
            deletion_time_unix_secs: d.deletion_time_unix_secs,
            deleted_logs_at_time_unix_secs: d.deleted_logs_at_time_unix_secs,
            deleted_audio_at_time_unix_secs: d.deleted_audio_at_time_unix_secs,
            deleted_transcript_at_time_unix_secs: d.deleted_transcript_at_time_unix_secs,
            delete_transcript_and_pii: d.delete_transcript_and_pii,
            delete_audio: d.delete_audio,
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn conversation() -> Conversation {
        Conversation {
            id: Uuid::new_v4(),
            agent_id: "agent_xyz_123".to_string(),
            external_id: "conv_abc_456".to_string(),
            status: "done".to_string(),
            event_timestamp: Utc::now(),
            start_time_unix_secs: Some(1739537297),
            call_duration_secs: Some(22),
            cost: Some(296),
            call_successful: Some("success".to_string()),
            transcript_summary: None,
            termination_reason: None,
            authorization_method: None,
            created_at: Utc::now(),
        }
    }

    fn turn(conversation_id: Uuid, position: i32, role: &str) -> Transcript {
        Transcript {
            id: Uuid::new_v4(),
            conversation_id,
            position,
            role: role.to_string(),
            message: Some(format!("turn {position}")),
            time_in_call_secs: Some(i64::from(position) * 2),
            feedback: None,
            conversation_turn_metrics: None,
            created_at: Utc::now() - Duration::seconds(i64::from(position)),
        }
    }

    fn rows() -> ConversationRows {
        let c = conversation();
        let transcripts = vec![turn(c.id, 2, "agent"), turn(c.id, 0, "agent"), turn(c.id, 1, "user")];
        let with_tools = transcripts[0].id;
        let call_id = Uuid::new_v4();
        ConversationRows {
            tool_calls: vec![ToolCall {
                id: call_id,
                transcript_id: with_tools,
                position: 0,
                tool_name: "check_order_status".to_string(),
                tool_function: Some("getOrderById".to_string()),
                parameters: Some(r#"{"orderId":"12345","items":[1,2]}"#.to_string()),
                call_timestamp: None,
            }],
            tool_results: vec![ToolResult {
                id: Uuid::new_v4(),
                transcript_id: with_tools,
                tool_call_id: Some(call_id),
                position: 0,
                result: Some(r#"{"status":"shipped"}"#.to_string()),
                success: Some(true),
                error: None,
                response_timestamp: None,
            }],
            conversation: c,
            transcripts,
            metadata: None,
            analysis: None,
            initiation: None,
            deletion_settings: None,
        }
    }

    #[test]
    fn test_turns_follow_arrival_position() {
        let detail = assemble(rows()).unwrap();
        let messages: Vec<_> = detail
            .transcripts
            .iter()
            .map(|t| t.message.clone().unwrap())
            .collect();
        assert_eq!(messages, vec!["turn 0", "turn 1", "turn 2"]);
    }

    #[test]
    fn test_tool_calls_carry_decoded_parameters_and_results() {
        let detail = assemble(rows()).unwrap();
        let turn = &detail.transcripts[2];
        assert_eq!(turn.tool_calls.len(), 1);
        let call = &turn.tool_calls[0];
        assert_eq!(call.parameters, json!({ "orderId": "12345", "items": [1, 2] }));
        assert_eq!(call.results.len(), 1);
        assert_eq!(call.results[0].result, json!({ "status": "shipped" }));
        assert_eq!(turn.tool_results.len(), 1);
        assert!(detail.transcripts[0].tool_calls.is_empty());
    }

    #[test]
    fn test_null_columns_decode_to_null() {
        let detail = assemble(rows()).unwrap();
        assert_eq!(detail.transcripts[0].feedback, Value::Null);
        assert!(detail.metadata.is_none());
        let body = serde_json::to_value(&detail).unwrap();
        assert!(body["analysis"].is_null());
        assert!(body["deletionSettings"].is_null());
        assert_eq!(body["conversationId"], "conv_abc_456");
    }

    #[test]
    fn test_corrupt_json_reports_decode_error() {
        let mut broken = rows();
        broken.tool_calls[0].parameters = Some("{oops".to_string());
        match assemble(broken) {
            Err(HelplineError::Decode { field, .. }) => assert_eq!(field, "parameters"),
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_id_is_not_found() {
        assert!(matches!(
            parse_conversation_id("not-a-uuid"),
            Err(HelplineError::NotFound(_))
        ));
        let id = Uuid::new_v4();
        assert_eq!(parse_conversation_id(&id.to_string()).unwrap(), id);
    }
}

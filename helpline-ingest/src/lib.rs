//! Webhook ingestion: validate a post-call payload, then persist the
//! conversation and all nested records atomically.

pub mod payload;
pub mod plan;
pub mod writer;

use chrono::Utc;
use helpline_core::HelplineError;
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

pub use payload::ConversationLogPayload;
pub use plan::{build_plan, parse_payload, ConversationPlan, MISSING_REQUIRED_FIELDS};

/// Identifiers of a freshly stored conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredConversation {
    pub id: Uuid,
    pub external_id: String,
}

/// Validate and store one webhook body. Nothing is written unless every
/// record of the conversation can be written.
pub async fn ingest_payload(raw: Value, pool: &PgPool) -> Result<StoredConversation, HelplineError> {
    let payload = parse_payload(raw)?;
    let plan = build_plan(&payload, Utc::now())?;

    let tool_calls: usize = plan.turns.iter().map(|t| t.tool_calls.len()).sum();
    let id = writer::write_conversation(pool, &plan).await?;

    tracing::info!(
        conversation_id = %id,
        external_id = %plan.conversation.external_id,
        agent_id = %plan.conversation.agent_id,
        turns = plan.turns.len(),
        tool_calls,
        "Stored conversation"
    );

    Ok(StoredConversation {
        id,
        external_id: plan.conversation.external_id,
    })
}

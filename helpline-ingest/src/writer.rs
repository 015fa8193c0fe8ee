//! Transactional persistence of a [`ConversationPlan`].
//!
//! All rows for one delivery are written inside a single transaction. Any
//! failure returns early, dropping the transaction, which rolls it back.

use helpline_core::HelplineError;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::plan::{ConversationPlan, TurnPlan};

pub async fn write_conversation(
    pool: &PgPool,
    plan: &ConversationPlan,
) -> Result<Uuid, HelplineError> {
    let mut tx = pool.begin().await?;

    let c = &plan.conversation;
    let conversation_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO conversations (
            agent_id, external_id, status, event_timestamp,
            start_time_unix_secs, call_duration_secs, cost,
            call_successful, transcript_summary, termination_reason, authorization_method
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING id
        "#,
    )
    .bind(&c.agent_id)
    .bind(&c.external_id)
    .bind(&c.status)
    .bind(c.event_timestamp)
    .bind(c.start_time_unix_secs)
    .bind(c.call_duration_secs)
    .bind(c.cost)
    .bind(&c.call_successful)
    .bind(&c.transcript_summary)
    .bind(&c.termination_reason)
    .bind(&c.authorization_method)
    .fetch_one(&mut *tx)
    .await?;

    for turn in &plan.turns {
        write_turn(&mut tx, conversation_id, turn).await?;
    }

    if let Some(m) = &plan.metadata {
        sqlx::query(
            r#"
            INSERT INTO conversation_metadata (
                conversation_id, start_time_unix_secs, call_duration_secs, cost,
                authorization_method, termination_reason, overall_score,
                likes, dislikes, dev_discount
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(conversation_id)
        .bind(m.start_time_unix_secs)
        .bind(m.call_duration_secs)
        .bind(m.cost)
        .bind(&m.authorization_method)
        .bind(&m.termination_reason)
        .bind(m.overall_score)
        .bind(m.likes)
        .bind(m.dislikes)
        .bind(m.dev_discount)
        .execute(&mut *tx)
        .await?;
    }

    if let Some(a) = &plan.analysis {
        sqlx::query(
            r#"
            INSERT INTO conversation_analysis (
                conversation_id, evaluation_criteria_results, data_collection_results,
                call_successful, transcript_summary
            )
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(conversation_id)
        .bind(&a.evaluation_criteria_results)
        .bind(&a.data_collection_results)
        .bind(&a.call_successful)
        .bind(&a.transcript_summary)
        .execute(&mut *tx)
        .await?;
    }

    if let Some(i) = &plan.initiation {
        sqlx::query(
            r#"
            INSERT INTO conversation_initiation (
                conversation_id, agent_prompt, agent_first_message, agent_language,
                tts_voice_id, custom_llm_extra_body, dynamic_variables
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(conversation_id)
        .bind(&i.agent_prompt)
        .bind(&i.agent_first_message)
        .bind(&i.agent_language)
        .bind(&i.tts_voice_id)
        .bind(&i.custom_llm_extra_body)
        .bind(&i.dynamic_variables)
        .execute(&mut *tx)
        .await?;
    }

    if let Some(d) = &plan.deletion_settings {
        sqlx::query(
            r#"
            INSERT INTO conversation_deletion_settings (
                conversation_id, deletion_time_unix_secs, deleted_logs_at_time_unix_secs,
                deleted_audio_at_time_unix_secs, deleted_transcript_at_time_unix_secs,
                delete_transcript_and_pii, delete_audio
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(conversation_id)
        .bind(d.deletion_time_unix_secs)
        .bind(d.deleted_logs_at_time_unix_secs)
        .bind(d.deleted_audio_at_time_unix_secs)
        .bind(d.deleted_transcript_at_time_unix_secs)
        .bind(d.delete_transcript_and_pii)
        .bind(d.delete_audio)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(conversation_id)
}

async fn write_turn(
    tx: &mut Transaction<'_, Postgres>,
    conversation_id: Uuid,
    turn: &TurnPlan,
) -> Result<(), HelplineError> {
    let transcript_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO conversation_transcripts (
            conversation_id, position, role, message, time_in_call_secs,
            feedback, conversation_turn_metrics
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id
        "#,
    )
    .bind(conversation_id)
    .bind(turn.position)
    .bind(&turn.role)
    .bind(&turn.message)
    .bind(turn.time_in_call_secs)
    .bind(&turn.feedback)
    .bind(&turn.conversation_turn_metrics)
    .fetch_one(&mut **tx)
    .await?;

    let mut call_ids = Vec::with_capacity(turn.tool_calls.len());
    for call in &turn.tool_calls {
        let call_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO tool_calls (
                transcript_id, position, tool_name, tool_function, parameters, call_timestamp
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(transcript_id)
        .bind(call.position)
        .bind(&call.tool_name)
        .bind(&call.tool_function)
        .bind(&call.parameters)
        .bind(call.call_timestamp)
        .fetch_one(&mut **tx)
        .await?;
        call_ids.push(call_id);
    }

    let linked_call = turn.result_call_index().and_then(|i| call_ids.get(i).copied());
    for result in &turn.tool_results {
        sqlx::query(
            r#"
            INSERT INTO tool_results (
                transcript_id, tool_call_id, position, result, success, error, response_timestamp
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(transcript_id)
        .bind(linked_call)
        .bind(result.position)
        .bind(&result.result)
        .bind(result.success)
        .bind(&result.error)
        .bind(result.response_timestamp)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

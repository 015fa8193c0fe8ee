//! Conversation list and search
//!
//! Both endpoints share one filter model. The list endpoint reads it from query
//! parameters, the search endpoint from a JSON body; both end up in
//! [`list_conversations`], which runs the count and page queries concurrently.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use helpline_core::HelplineError;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: i64 = 25;
pub const MAX_PAGE_SIZE: i64 = 100;

// ============================================================================
// Filter model
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationFilter {
    pub agent_id: Option<String>,
    pub status: Option<String>,
    pub call_successful: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub min_duration: Option<i64>,
    pub max_duration: Option<i64>,
    pub min_cost: Option<i64>,
    pub max_cost: Option<i64>,
    pub search: Option<String>,
    /// Also match `search` against the external conversation id.
    pub search_external_id: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    EventTimestamp,
    CallDurationSecs,
    Cost,
}

impl SortField {
    /// Unknown or missing values sort by event time.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("callDurationSecs") => Self::CallDurationSecs,
            Some("cost") => Self::Cost,
            _ => Self::EventTimestamp,
        }
    }

    fn column(self) -> &'static str {
        match self {
            Self::EventTimestamp => "c.event_timestamp",
            Self::CallDurationSecs => "c.call_duration_secs",
            Self::Cost => "c.cost",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::to_ascii_lowercase).as_deref() {
            Some("asc") => Self::Asc,
            _ => Self::Desc,
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    /// `page` below 1 becomes 1; `limit` is clamped to `1..=100`.
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn total_pages(&self, total_count: i64) -> i64 {
        if total_count <= 0 {
            0
        } else {
            (total_count + self.limit - 1) / self.limit
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub filter: ConversationFilter,
    pub page: PageRequest,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
}

// ============================================================================
// Request DTOs
// ============================================================================

/// Query parameters of `GET /conversations`. Everything arrives as text so a
/// malformed number can be ignored instead of failing extraction.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub agent_id: Option<String>,
    pub status: Option<String>,
    pub call_successful: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub min_duration: Option<String>,
    pub max_duration: Option<String>,
    pub min_cost: Option<String>,
    pub max_cost: Option<String>,
    pub search: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl ListParams {
    pub fn into_query(self) -> Result<ListQuery, HelplineError> {
        Ok(ListQuery {
            filter: ConversationFilter {
                agent_id: non_blank(self.agent_id),
                status: non_blank(self.status),
                call_successful: non_blank(self.call_successful),
                start_date: parse_date_param("startDate", self.start_date.as_deref(), false)?,
                end_date: parse_date_param("endDate", self.end_date.as_deref(), true)?,
                min_duration: parse_number(self.min_duration.as_deref()),
                max_duration: parse_number(self.max_duration.as_deref()),
                min_cost: parse_number(self.min_cost.as_deref()),
                max_cost: parse_number(self.max_cost.as_deref()),
                search: non_blank(self.search),
                search_external_id: false,
            },
            page: PageRequest::new(
                parse_number(self.page.as_deref()),
                parse_number(self.limit.as_deref()),
            ),
            sort_by: SortField::parse(self.sort_by.as_deref()),
            sort_order: SortOrder::parse(self.sort_order.as_deref()),
        })
    }
}

/// JSON body of `POST /conversations/search`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub agent_id: Option<String>,
    pub status: Option<String>,
    pub call_successful: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub min_duration: Option<i64>,
    pub max_duration: Option<i64>,
    pub min_cost: Option<i64>,
    pub max_cost: Option<i64>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    #[serde(default)]
    pub include_analytics: bool,
}

impl SearchRequest {
    pub fn to_query(&self) -> Result<ListQuery, HelplineError> {
        Ok(ListQuery {
            filter: ConversationFilter {
                agent_id: non_blank(self.agent_id.clone()),
                status: non_blank(self.status.clone()),
                call_successful: non_blank(self.call_successful.clone()),
                start_date: parse_date_param("startDate", self.start_date.as_deref(), false)?,
                end_date: parse_date_param("endDate", self.end_date.as_deref(), true)?,
                min_duration: self.min_duration,
                max_duration: self.max_duration,
                min_cost: self.min_cost,
                max_cost: self.max_cost,
                search: non_blank(self.search.clone()),
                search_external_id: true,
            },
            page: PageRequest::new(self.page, self.limit),
            sort_by: SortField::parse(self.sort_by.as_deref()),
            sort_order: SortOrder::parse(self.sort_order.as_deref()),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_number(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|s| s.trim().parse().ok())
}

/// Accepts RFC 3339 or a bare `YYYY-MM-DD`. A bare date used as an upper bound
/// covers the whole day.
pub fn parse_date_param(
    name: &str,
    raw: Option<&str>,
    end_of_day: bool,
) -> Result<Option<DateTime<Utc>>, HelplineError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| HelplineError::Validation(format!("Invalid {name}: {raw}")))?;
    let start = Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));
    if end_of_day {
        Ok(Some(start + Duration::days(1) - Duration::microseconds(1)))
    } else {
        Ok(Some(start))
    }
}

/// Escape LIKE metacharacters and wrap for a substring match.
pub fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

// ============================================================================
// Queries
// ============================================================================

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: Uuid,
    pub agent_id: String,
    #[serde(rename = "conversationId")]
    pub external_id: String,
    pub status: String,
    pub event_timestamp: DateTime<Utc>,
    pub call_duration_secs: Option<i64>,
    pub cost: Option<i64>,
    pub call_successful: Option<String>,
    pub transcript_summary: Option<String>,
    pub turn_count: i64,
    #[serde(skip)]
    pub likes: Option<i64>,
    #[serde(skip)]
    pub dislikes: Option<i64>,
    #[serde(skip)]
    pub overall_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationPage {
    pub conversations: Vec<ConversationSummary>,
    pub total_count: i64,
    pub pagination: Pagination,
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &ConversationFilter) {
    if let Some(agent_id) = &filter.agent_id {
        qb.push(" AND c.agent_id = ").push_bind(agent_id.clone());
    }
    if let Some(status) = &filter.status {
        qb.push(" AND c.status = ").push_bind(status.clone());
    }
    if let Some(outcome) = &filter.call_successful {
        qb.push(" AND c.call_successful = ").push_bind(outcome.clone());
    }
    if let Some(start) = filter.start_date {
        qb.push(" AND c.event_timestamp >= ").push_bind(start);
    }
    if let Some(end) = filter.end_date {
        qb.push(" AND c.event_timestamp <= ").push_bind(end);
    }
    if let Some(min) = filter.min_duration {
        qb.push(" AND c.call_duration_secs >= ").push_bind(min);
    }
    if let Some(max) = filter.max_duration {
        qb.push(" AND c.call_duration_secs <= ").push_bind(max);
    }
    if let Some(min) = filter.min_cost {
        qb.push(" AND c.cost >= ").push_bind(min);
    }
    if let Some(max) = filter.max_cost {
        qb.push(" AND c.cost <= ").push_bind(max);
    }
    if let Some(term) = &filter.search {
        let pattern = like_pattern(term);
        qb.push(" AND (c.transcript_summary ILIKE ")
            .push_bind(pattern.clone())
            .push(
                r" ESCAPE '\' OR EXISTS (SELECT 1 FROM conversation_transcripts t
                   WHERE t.conversation_id = c.id AND t.message ILIKE ",
            )
            .push_bind(pattern.clone())
            .push(r" ESCAPE '\')");
        if filter.search_external_id {
            qb.push(" OR c.external_id ILIKE ")
                .push_bind(pattern)
                .push(r" ESCAPE '\'");
        }
        qb.push(")");
    }
}

async fn count_matching(pool: &PgPool, filter: &ConversationFilter) -> Result<i64, sqlx::Error> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM conversations c WHERE TRUE");
    push_filters(&mut qb, filter);
    qb.build_query_scalar::<i64>().fetch_one(pool).await
}

async fn fetch_page(
    pool: &PgPool,
    query: &ListQuery,
) -> Result<Vec<ConversationSummary>, sqlx::Error> {
    let mut qb = QueryBuilder::new(
        r#"
        SELECT c.id, c.agent_id, c.external_id, c.status, c.event_timestamp,
               c.call_duration_secs, c.cost, c.call_successful, c.transcript_summary,
               (SELECT COUNT(*) FROM conversation_transcripts t WHERE t.conversation_id = c.id) AS turn_count,
               m.likes, m.dislikes, m.overall_score
        FROM conversations c
        LEFT JOIN conversation_metadata m ON m.conversation_id = c.id
        WHERE TRUE
        "#,
    );
    push_filters(&mut qb, &query.filter);
    qb.push(" ORDER BY ")
        .push(query.sort_by.column())
        .push(" ")
        .push(query.sort_order.keyword())
        .push(" NULLS LAST, c.id ASC LIMIT ")
        .push_bind(query.page.limit)
        .push(" OFFSET ")
        .push_bind(query.page.offset());

    qb.build_query_as::<ConversationSummary>().fetch_all(pool).await
}

pub async fn list_conversations(
    pool: &PgPool,
    query: &ListQuery,
) -> Result<ConversationPage, HelplineError> {
    let (total_count, conversations) =
        futures::try_join!(count_matching(pool, &query.filter), fetch_page(pool, query))?;

    Ok(ConversationPage {
        conversations,
        total_count,
        pagination: Pagination {
            page: query.page.page,
            limit: query.page.limit,
            total_pages: query.page.total_pages(total_count),
        },
    })
}

// ============================================================================
// Page-local analytics
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCount {
    pub agent_id: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

/// Figures over one result page only; never a global aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageAnalytics {
    pub average_duration: i64,
    pub average_cost: i64,
    pub success_rate: i64,
    pub total_likes: i64,
    pub total_dislikes: i64,
    pub average_rating: f64,
    pub agent_distribution: Vec<AgentCount>,
    pub status_distribution: Vec<StatusCount>,
}

fn rounded_mean(values: &[i64]) -> i64 {
    if values.is_empty() {
        return 0;
    }
    let sum: i64 = values.iter().sum();
    (sum as f64 / values.len() as f64).round() as i64
}

/// `None` for an empty page.
pub fn page_analytics(page: &[ConversationSummary]) -> Option<PageAnalytics> {
    if page.is_empty() {
        return None;
    }

    let durations: Vec<i64> = page.iter().filter_map(|c| c.call_duration_secs).collect();
    let costs: Vec<i64> = page.iter().filter_map(|c| c.cost).collect();
    let scores: Vec<f64> = page.iter().filter_map(|c| c.overall_score).collect();
    let successes = page
        .iter()
        .filter(|c| c.call_successful.as_deref() == Some("success"))
        .count();

    let average_rating = if scores.is_empty() {
        0.0
    } else {
        round_one_decimal(scores.iter().sum::<f64>() / scores.len() as f64)
    };

    let mut agents: BTreeMap<&str, i64> = BTreeMap::new();
    let mut statuses: BTreeMap<&str, i64> = BTreeMap::new();
    for c in page {
        *agents.entry(c.agent_id.as_str()).or_default() += 1;
        *statuses.entry(c.status.as_str()).or_default() += 1;
    }

    Some(PageAnalytics {
        average_duration: rounded_mean(&durations),
        average_cost: rounded_mean(&costs),
        success_rate: (successes as f64 / page.len() as f64 * 100.0).round() as i64,
        total_likes: page.iter().filter_map(|c| c.likes).sum(),
        total_dislikes: page.iter().filter_map(|c| c.dislikes).sum(),
        average_rating,
        agent_distribution: agents
            .into_iter()
            .map(|(agent_id, count)| AgentCount {
                agent_id: agent_id.to_string(),
                count,
            })
            .collect(),
        status_distribution: statuses
            .into_iter()
            .map(|(status, count)| StatusCount {
                status: status.to_string(),
                count,
            })
            .collect(),
    })
}

pub(crate) fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(agent: &str, status: &str, duration: Option<i64>, outcome: Option<&str>) -> ConversationSummary {
        ConversationSummary {
            id: Uuid::new_v4(),
            agent_id: agent.to_string(),
            external_id: format!("conv_{}", Uuid::new_v4()),
            status: status.to_string(),
            event_timestamp: Utc::now(),
            call_duration_secs: duration,
            cost: duration.map(|d| d * 2),
            call_successful: outcome.map(str::to_string),
            transcript_summary: None,
            turn_count: 0,
            likes: None,
            dislikes: None,
            overall_score: None,
        }
    }

    #[test]
    fn test_page_request_clamps() {
        assert_eq!(PageRequest::new(Some(0), Some(500)), PageRequest { page: 1, limit: 100 });
        assert_eq!(PageRequest::new(Some(-3), Some(0)), PageRequest { page: 1, limit: 1 });
        assert_eq!(PageRequest::new(None, None), PageRequest { page: 1, limit: 25 });
        assert_eq!(PageRequest::new(Some(3), Some(10)).offset(), 20);
    }

    #[test]
    fn test_zero_limit_param_clamps_to_one() {
        let params = ListParams {
            limit: Some("0".to_string()),
            ..Default::default()
        };
        assert_eq!(params.into_query().unwrap().page.limit, 1);

        let unparseable = ListParams {
            limit: Some("lots".to_string()),
            ..Default::default()
        };
        assert_eq!(unparseable.into_query().unwrap().page.limit, 25);
    }

    #[test]
    fn test_total_pages_rounds_up() {
        let page = PageRequest::new(Some(1), Some(10));
        assert_eq!(page.total_pages(0), 0);
        assert_eq!(page.total_pages(10), 1);
        assert_eq!(page.total_pages(11), 2);
    }

    #[test]
    fn test_unparseable_numbers_are_ignored() {
        let params = ListParams {
            min_duration: Some("abc".to_string()),
            max_cost: Some("0".to_string()),
            page: Some("two".to_string()),
            limit: Some("1000".to_string()),
            ..Default::default()
        };
        let query = params.into_query().unwrap();
        assert_eq!(query.filter.min_duration, None);
        assert_eq!(query.filter.max_cost, Some(0));
        assert_eq!(query.page, PageRequest { page: 1, limit: 100 });
    }

    #[test]
    fn test_bad_date_is_a_validation_error() {
        let params = ListParams {
            start_date: Some("last tuesday".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            params.into_query(),
            Err(HelplineError::Validation(_))
        ));
    }

    #[test]
    fn test_date_params_accept_both_forms() {
        let start = parse_date_param("startDate", Some("2025-01-14"), false)
            .unwrap()
            .unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 1, 14, 0, 0, 0).unwrap());

        let end = parse_date_param("endDate", Some("2025-01-14"), true)
            .unwrap()
            .unwrap();
        assert!(end > Utc.with_ymd_and_hms(2025, 1, 14, 23, 59, 59).unwrap());
        assert!(end < Utc.with_ymd_and_hms(2025, 1, 15, 0, 0, 0).unwrap());

        let exact = parse_date_param("endDate", Some("2025-01-14T15:30:00+02:00"), true)
            .unwrap()
            .unwrap();
        assert_eq!(exact, Utc.with_ymd_and_hms(2025, 1, 14, 13, 30, 0).unwrap());

        assert_eq!(parse_date_param("startDate", Some("  "), false).unwrap(), None);
    }

    #[test]
    fn test_sort_parsing_falls_back() {
        assert_eq!(SortField::parse(Some("cost")), SortField::Cost);
        assert_eq!(SortField::parse(Some("callDurationSecs")), SortField::CallDurationSecs);
        assert_eq!(SortField::parse(Some("; DROP TABLE")), SortField::EventTimestamp);
        assert_eq!(SortOrder::parse(Some("ASC")), SortOrder::Asc);
        assert_eq!(SortOrder::parse(None), SortOrder::Desc);
    }

    #[test]
    fn test_like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("order"), "%order%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern(r"a\b"), r"%a\\b%");
    }

    #[test]
    fn test_search_request_matches_external_id() {
        let req: SearchRequest = serde_json::from_value(serde_json::json!({
            "search": "conv_abc",
            "minDuration": 0,
            "includeAnalytics": true,
            "limit": 250
        }))
        .unwrap();
        assert!(req.include_analytics);
        let query = req.to_query().unwrap();
        assert!(query.filter.search_external_id);
        assert_eq!(query.filter.min_duration, Some(0));
        assert_eq!(query.page.limit, 100);
    }

    #[test]
    fn test_page_analytics_empty_page() {
        assert_eq!(page_analytics(&[]), None);
    }

    #[test]
    fn test_page_analytics_over_page() {
        let mut rows = vec![
            summary("agent_a", "done", Some(0), Some("success")),
            summary("agent_b", "done", Some(120), Some("failure")),
            summary("agent_a", "in_progress", Some(180), Some("success")),
            summary("agent_a", "done", None, None),
        ];
        rows[0].likes = Some(3);
        rows[0].dislikes = Some(1);
        rows[0].overall_score = Some(4.0);
        rows[1].overall_score = Some(3.0);
        rows[2].likes = Some(1);

        let analytics = page_analytics(&rows).unwrap();
        // zero counts as a value on the page, unlike the dashboard
        assert_eq!(analytics.average_duration, 100);
        assert_eq!(analytics.average_cost, 200);
        assert_eq!(analytics.success_rate, 50);
        assert_eq!(analytics.total_likes, 4);
        assert_eq!(analytics.total_dislikes, 1);
        assert_eq!(analytics.average_rating, 3.5);
        assert_eq!(
            analytics.agent_distribution,
            vec![
                AgentCount { agent_id: "agent_a".to_string(), count: 3 },
                AgentCount { agent_id: "agent_b".to_string(), count: 1 },
            ]
        );
        assert_eq!(analytics.status_distribution[0].status, "done");
        assert_eq!(analytics.status_distribution[0].count, 3);
    }

    #[test]
    fn test_summary_serializes_camel_case() {
        let row = summary("agent_a", "done", Some(22), Some("success"));
        let value = serde_json::to_value(&row).unwrap();
        assert!(value.get("conversationId").is_some());
        assert!(value.get("turnCount").is_some());
        assert!(value.get("likes").is_none());
        assert_eq!(value["callDurationSecs"], 22);
    }
}

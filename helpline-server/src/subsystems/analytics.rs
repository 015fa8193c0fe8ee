//! Dashboard analytics for `GET /conversations/analytics/dashboard`.
//!
//! One query pulls a row of per-conversation facts for the window (plus the
//! days the trend series needs); every figure is then computed in memory by
//! [`compute`], which is pure and tested without a database.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use helpline_core::HelplineError;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, QueryBuilder};

use super::listing::{parse_date_param, round_one_decimal, StatusCount};

pub const DEFAULT_SLA_THRESHOLD_SECS: i64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRange {
    Last24Hours,
    Last7Days,
    Last30Days,
    Custom,
}

impl TimeRange {
    /// Missing or unrecognised selectors fall back to 30 days.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("24h") => Self::Last24Hours,
            Some("7d") => Self::Last7Days,
            Some("custom") => Self::Custom,
            _ => Self::Last30Days,
        }
    }

    pub fn trend_days(self) -> i64 {
        match self {
            Self::Last24Hours => 1,
            Self::Last7Days => 7,
            Self::Last30Days | Self::Custom => 30,
        }
    }

    fn lookback(self) -> Duration {
        match self {
            Self::Last24Hours => Duration::hours(24),
            Self::Last7Days => Duration::days(7),
            Self::Last30Days | Self::Custom => Duration::days(30),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardParams {
    pub time_range: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub agent_id: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    /// Inclusive; only custom ranges carry one.
    pub end: Option<DateTime<Utc>>,
}

impl Window {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && self.end.map_or(true, |end| ts <= end)
    }
}

pub fn resolve_window(
    range: TimeRange,
    params: &DashboardParams,
    now: DateTime<Utc>,
) -> Result<Window, HelplineError> {
    let default_start = now - range.lookback();
    if range != TimeRange::Custom {
        return Ok(Window {
            start: default_start,
            end: None,
        });
    }

    let start = parse_date_param("startDate", params.start_date.as_deref(), false)?
        .unwrap_or(default_start);
    let end = parse_date_param("endDate", params.end_date.as_deref(), true)?;
    Ok(Window { start, end })
}

/// The oldest→newest UTC calendar days the trend series covers, ending today.
pub fn trend_days(range: TimeRange, now: DateTime<Utc>) -> Vec<NaiveDate> {
    let today = now.date_naive();
    (0..range.trend_days())
        .rev()
        .map(|back| today - Duration::days(back))
        .collect()
}

// ============================================================================
// Facts and results
// ============================================================================

/// What the dashboard needs to know about one conversation.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ConversationFacts {
    pub agent_id: String,
    pub status: String,
    pub event_timestamp: DateTime<Utc>,
    pub call_duration_secs: Option<i64>,
    pub cost: Option<i64>,
    pub call_successful: Option<String>,
    pub overall_score: Option<f64>,
    pub likes: Option<i64>,
    pub dislikes: Option<i64>,
    pub tool_call_count: i64,
    /// Earliest agent-turn offset; `None` when the agent never spoke.
    pub first_agent_offset: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total_conversations: i64,
    pub active_conversations: i64,
    pub completed_conversations: i64,
    pub failed_conversations: i64,
    pub average_duration: i64,
    pub average_cost: i64,
    pub success_rate: f64,
    pub average_rating: f64,
    pub customer_satisfaction: f64,
    pub tool_usage_rate: f64,
    pub average_response_time: i64,
    pub sla_adherence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub date: String,
    pub conversation_volume: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trends {
    pub conversation_volume: Vec<TrendPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPerformance {
    pub agent_id: String,
    pub total_conversations: i64,
    pub success_rate: f64,
    pub avg_duration: i64,
    pub avg_cost: i64,
    pub avg_rating: f64,
    pub tool_calls: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardAnalytics {
    pub overview: Overview,
    pub trends: Trends,
    pub agent_performance: Vec<AgentPerformance>,
    pub status_distribution: Vec<StatusCount>,
    pub call_success_distribution: Vec<StatusCount>,
}

// ============================================================================
// Computation
// ============================================================================

/// `part / whole * 100`, one decimal, 0 on an empty denominator.
fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round_one_decimal(part as f64 / whole as f64 * 100.0)
    }
}

fn mean_rounded(values: impl Iterator<Item = i64>) -> i64 {
    let (sum, n) = values.fold((0i64, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0
    } else {
        (sum as f64 / n as f64).round() as i64
    }
}

fn mean_one_decimal(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0f64, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        round_one_decimal(sum / n as f64)
    }
}

fn is_success(f: &ConversationFacts) -> bool {
    f.call_successful.as_deref() == Some("success")
}

/// A score of 0 means the caller left no rating.
fn rating(f: &ConversationFacts) -> Option<f64> {
    f.overall_score.filter(|s| *s != 0.0)
}

fn is_failed(f: &ConversationFacts) -> bool {
    matches!(f.status.as_str(), "failed" | "error") || f.call_successful.as_deref() == Some("failure")
}

fn distribution<'a>(keys: impl Iterator<Item = &'a str>) -> Vec<StatusCount> {
    let mut counts: BTreeMap<&str, i64> = BTreeMap::new();
    for key in keys {
        *counts.entry(key).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(status, count)| StatusCount {
            status: status.to_string(),
            count,
        })
        .collect()
}

pub fn compute(
    facts: &[ConversationFacts],
    window: &Window,
    days: &[NaiveDate],
    sla_threshold_secs: i64,
) -> DashboardAnalytics {
    let in_window: Vec<&ConversationFacts> =
        facts.iter().filter(|f| window.contains(f.event_timestamp)).collect();
    let total = in_window.len();

    let durations: Vec<i64> = in_window
        .iter()
        .filter_map(|f| f.call_duration_secs)
        .filter(|d| *d > 0)
        .collect();
    let likes: i64 = in_window.iter().filter_map(|f| f.likes).sum();
    let dislikes: i64 = in_window.iter().filter_map(|f| f.dislikes).sum();
    let satisfaction = if likes + dislikes > 0 {
        round_one_decimal(likes as f64 / (likes + dislikes) as f64 * 100.0)
    } else {
        0.0
    };

    let overview = Overview {
        total_conversations: total as i64,
        active_conversations: in_window.iter().filter(|f| f.status == "in_progress").count() as i64,
        completed_conversations: in_window.iter().filter(|f| f.status == "done").count() as i64,
        failed_conversations: in_window.iter().filter(|f| is_failed(f)).count() as i64,
        average_duration: mean_rounded(durations.iter().copied()),
        average_cost: mean_rounded(in_window.iter().filter_map(|f| f.cost).filter(|c| *c > 0)),
        success_rate: percent(in_window.iter().filter(|f| is_success(f)).count(), total),
        average_rating: mean_one_decimal(in_window.iter().filter_map(|f| rating(f))),
        customer_satisfaction: satisfaction,
        tool_usage_rate: percent(
            in_window.iter().filter(|f| f.tool_call_count > 0).count(),
            total,
        ),
        average_response_time: mean_rounded(
            in_window.iter().map(|f| f.first_agent_offset.unwrap_or(0)),
        ),
        sla_adherence: percent(
            durations.iter().filter(|d| **d <= sla_threshold_secs).count(),
            durations.len(),
        ),
    };

    let mut by_agent: BTreeMap<&str, Vec<&ConversationFacts>> = BTreeMap::new();
    for f in in_window.iter().copied() {
        by_agent.entry(f.agent_id.as_str()).or_default().push(f);
    }
    let agent_performance = by_agent
        .into_iter()
        .map(|(agent_id, rows)| AgentPerformance {
            agent_id: agent_id.to_string(),
            total_conversations: rows.len() as i64,
            success_rate: percent(rows.iter().filter(|f| is_success(f)).count(), rows.len()),
            avg_duration: mean_rounded(rows.iter().filter_map(|f| f.call_duration_secs)),
            avg_cost: mean_rounded(rows.iter().filter_map(|f| f.cost)),
            avg_rating: mean_one_decimal(rows.iter().filter_map(|f| rating(f))),
            tool_calls: rows.iter().map(|f| f.tool_call_count).sum(),
        })
        .collect();

    let conversation_volume = days
        .iter()
        .map(|day| TrendPoint {
            date: day.format("%Y-%m-%d").to_string(),
            conversation_volume: facts
                .iter()
                .filter(|f| f.event_timestamp.date_naive() == *day)
                .count() as i64,
        })
        .collect();

    DashboardAnalytics {
        overview,
        trends: Trends {
            conversation_volume,
        },
        agent_performance,
        status_distribution: distribution(in_window.iter().map(|f| f.status.as_str())),
        call_success_distribution: distribution(
            in_window
                .iter()
                .map(|f| f.call_successful.as_deref().unwrap_or("unknown")),
        ),
    }
}

// ============================================================================
// Query
// ============================================================================

async fn fetch_facts(
    pool: &PgPool,
    since: DateTime<Utc>,
    params: &DashboardParams,
) -> Result<Vec<ConversationFacts>, sqlx::Error> {
    let mut qb = QueryBuilder::new(
        r#"
        SELECT c.agent_id, c.status, c.event_timestamp, c.call_duration_secs, c.cost,
               c.call_successful, m.overall_score, m.likes, m.dislikes,
               (SELECT COUNT(*)
                  FROM tool_calls tc
                  JOIN conversation_transcripts t ON t.id = tc.transcript_id
                 WHERE t.conversation_id = c.id) AS tool_call_count,
               (SELECT MIN(COALESCE(t.time_in_call_secs, 0))
                  FROM conversation_transcripts t
                 WHERE t.conversation_id = c.id AND t.role = 'agent') AS first_agent_offset
        FROM conversations c
        LEFT JOIN conversation_metadata m ON m.conversation_id = c.id
        WHERE c.event_timestamp >= "#,
    );
    qb.push_bind(since);

    if let Some(agent_id) = params.agent_id.as_ref().filter(|a| !a.is_empty()) {
        qb.push(" AND c.agent_id = ").push_bind(agent_id.clone());
    }
    if let Some(status) = params.status.as_ref().filter(|s| !s.is_empty()) {
        qb.push(" AND c.status = ").push_bind(status.clone());
    }

    qb.build_query_as::<ConversationFacts>().fetch_all(pool).await
}

pub async fn dashboard(
    pool: &PgPool,
    params: &DashboardParams,
    sla_threshold_secs: i64,
    now: DateTime<Utc>,
) -> Result<DashboardAnalytics, HelplineError> {
    let range = TimeRange::parse(params.time_range.as_deref());
    let window = resolve_window(range, params, now)?;
    let days = trend_days(range, now);

    let trend_start = days
        .first()
        .map(|d| Utc.from_utc_datetime(&d.and_time(chrono::NaiveTime::MIN)))
        .unwrap_or(window.start);
    let facts = fetch_facts(pool, window.start.min(trend_start), params).await?;

    tracing::debug!(
        rows = facts.len(),
        start = %window.start,
        "Computing dashboard analytics"
    );

    Ok(compute(&facts, &window, &days, sla_threshold_secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 14, 15, 0, 0).unwrap()
    }

    fn fact(agent: &str, duration: Option<i64>, outcome: Option<&str>) -> ConversationFacts {
        ConversationFacts {
            agent_id: agent.to_string(),
            status: "done".to_string(),
            event_timestamp: now() - Duration::hours(1),
            call_duration_secs: duration,
            cost: duration,
            call_successful: outcome.map(str::to_string),
            overall_score: None,
            likes: None,
            dislikes: None,
            tool_call_count: 0,
            first_agent_offset: None,
        }
    }

    fn window() -> Window {
        Window {
            start: now() - Duration::days(30),
            end: None,
        }
    }

    fn run(facts: &[ConversationFacts]) -> DashboardAnalytics {
        compute(facts, &window(), &trend_days(TimeRange::Last30Days, now()), 300)
    }

    #[test]
    fn test_time_range_parsing() {
        assert_eq!(TimeRange::parse(Some("24h")), TimeRange::Last24Hours);
        assert_eq!(TimeRange::parse(Some("7d")), TimeRange::Last7Days);
        assert_eq!(TimeRange::parse(Some("custom")), TimeRange::Custom);
        assert_eq!(TimeRange::parse(Some("90d")), TimeRange::Last30Days);
        assert_eq!(TimeRange::parse(None), TimeRange::Last30Days);
    }

    #[test]
    fn test_trend_lengths_oldest_first() {
        for (range, len) in [
            (TimeRange::Last24Hours, 1),
            (TimeRange::Last7Days, 7),
            (TimeRange::Last30Days, 30),
            (TimeRange::Custom, 30),
        ] {
            let days = trend_days(range, now());
            assert_eq!(days.len(), len);
            assert_eq!(*days.last().unwrap(), now().date_naive());
            assert!(days.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_custom_window_uses_params() {
        let params = DashboardParams {
            time_range: Some("custom".to_string()),
            start_date: Some("2025-01-01".to_string()),
            end_date: Some("2025-01-31".to_string()),
            ..Default::default()
        };
        let w = resolve_window(TimeRange::Custom, &params, now()).unwrap();
        assert_eq!(w.start, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        assert!(w.contains(Utc.with_ymd_and_hms(2025, 1, 31, 18, 0, 0).unwrap()));
        assert!(!w.contains(Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap()));

        let defaulted = resolve_window(TimeRange::Custom, &DashboardParams::default(), now()).unwrap();
        assert_eq!(defaulted.start, now() - Duration::days(30));
        assert_eq!(defaulted.end, None);
    }

    #[test]
    fn test_fixed_range_ignores_custom_dates() {
        let params = DashboardParams {
            start_date: Some("2020-01-01".to_string()),
            ..Default::default()
        };
        let w = resolve_window(TimeRange::Last7Days, &params, now()).unwrap();
        assert_eq!(w.start, now() - Duration::days(7));
    }

    #[test]
    fn test_average_duration_skips_zero_and_null() {
        let facts = vec![
            fact("a", Some(0), None),
            fact("a", Some(120), None),
            fact("a", Some(180), None),
            fact("a", None, None),
        ];
        let result = run(&facts);
        assert_eq!(result.overview.average_duration, 150);
        assert_eq!(result.overview.average_cost, 150);
    }

    #[test]
    fn test_empty_window_is_all_zero() {
        let result = run(&[]);
        assert_eq!(result.overview.total_conversations, 0);
        assert_eq!(result.overview.average_duration, 0);
        assert_eq!(result.overview.success_rate, 0.0);
        assert_eq!(result.overview.customer_satisfaction, 0.0);
        assert_eq!(result.overview.sla_adherence, 0.0);
        assert!(result.agent_performance.is_empty());
        assert_eq!(result.trends.conversation_volume.len(), 30);
    }

    #[test]
    fn test_success_rate_two_of_four() {
        let facts = vec![
            fact("a", Some(10), Some("success")),
            fact("a", Some(10), Some("success")),
            fact("a", Some(10), Some("failure")),
            fact("a", Some(10), None),
        ];
        let result = run(&facts);
        assert_eq!(result.overview.success_rate, 50.0);
        assert_eq!(result.overview.failed_conversations, 1);
    }

    #[test]
    fn test_customer_satisfaction_from_likes() {
        let mut liked = fact("a", None, None);
        liked.likes = Some(3);
        liked.dislikes = Some(1);
        let result = run(&[liked, fact("b", None, None)]);
        assert_eq!(result.overview.customer_satisfaction, 75.0);
    }

    #[test]
    fn test_status_counts_and_distributions() {
        let mut active = fact("a", None, None);
        active.status = "in_progress".to_string();
        let mut errored = fact("b", None, Some("success"));
        errored.status = "error".to_string();
        let facts = vec![active, errored, fact("a", None, Some("success"))];

        let result = run(&facts);
        assert_eq!(result.overview.active_conversations, 1);
        assert_eq!(result.overview.completed_conversations, 1);
        assert_eq!(result.overview.failed_conversations, 1);

        let statuses: Vec<_> = result
            .status_distribution
            .iter()
            .map(|s| (s.status.as_str(), s.count))
            .collect();
        assert_eq!(statuses, vec![("done", 1), ("error", 1), ("in_progress", 1)]);

        let outcomes: Vec<_> = result
            .call_success_distribution
            .iter()
            .map(|s| (s.status.as_str(), s.count))
            .collect();
        assert_eq!(outcomes, vec![("success", 2), ("unknown", 1)]);
    }

    #[test]
    fn test_tool_usage_response_time_and_sla() {
        let mut with_tools = fact("a", Some(200), None);
        with_tools.tool_call_count = 2;
        with_tools.first_agent_offset = Some(4);
        let mut slow = fact("a", Some(400), None);
        slow.first_agent_offset = Some(2);
        let silent = fact("b", None, None);

        let result = run(&[with_tools, slow, silent]);
        assert_eq!(result.overview.tool_usage_rate, 33.3);
        assert_eq!(result.overview.average_response_time, 2);
        assert_eq!(result.overview.sla_adherence, 50.0);
    }

    #[test]
    fn test_agent_performance_rollup() {
        let mut first = fact("agent_b", Some(100), Some("success"));
        first.overall_score = Some(4.0);
        first.tool_call_count = 3;
        let mut second = fact("agent_b", Some(0), Some("failure"));
        second.overall_score = Some(5.0);
        let third = fact("agent_a", None, None);

        let result = run(&[first, second, third]);
        assert_eq!(result.agent_performance.len(), 2);
        assert_eq!(result.agent_performance[0].agent_id, "agent_a");
        assert_eq!(result.agent_performance[0].avg_duration, 0);

        let b = &result.agent_performance[1];
        assert_eq!(b.total_conversations, 2);
        assert_eq!(b.success_rate, 50.0);
        assert_eq!(b.avg_duration, 50);
        assert_eq!(b.avg_rating, 4.5);
        assert_eq!(b.tool_calls, 3);
    }

    #[test]
    fn test_zero_score_is_not_a_rating() {
        let mut rated = fact("agent_a", Some(60), None);
        rated.overall_score = Some(4.0);
        let mut unrated = fact("agent_a", Some(60), None);
        unrated.overall_score = Some(0.0);

        let result = run(&[rated, unrated]);
        assert_eq!(result.overview.average_rating, 4.0);
        assert_eq!(result.agent_performance[0].avg_rating, 4.0);

        let mut only_zero = fact("agent_a", None, None);
        only_zero.overall_score = Some(0.0);
        assert_eq!(run(&[only_zero]).overview.average_rating, 0.0);
    }

    #[test]
    fn test_trend_counts_whole_days() {
        let days = trend_days(TimeRange::Last7Days, now());
        let w = Window {
            start: Utc.with_ymd_and_hms(2025, 2, 10, 12, 0, 0).unwrap(),
            end: None,
        };

        let mut early_oldest_day = fact("a", None, None);
        early_oldest_day.event_timestamp = Utc.with_ymd_and_hms(2025, 2, 8, 1, 0, 0).unwrap();
        let mut today = fact("a", None, None);
        today.event_timestamp = Utc.with_ymd_and_hms(2025, 2, 14, 9, 0, 0).unwrap();

        let result = compute(&[early_oldest_day, today], &w, &days, 300);
        let volume = &result.trends.conversation_volume;
        assert_eq!(volume[0].date, "2025-02-08");
        assert_eq!(volume[0].conversation_volume, 1);
        assert_eq!(volume[6].date, "2025-02-14");
        assert_eq!(volume[6].conversation_volume, 1);
        // before the window start, so counted in the trend only
        assert_eq!(result.overview.total_conversations, 1);
    }
}

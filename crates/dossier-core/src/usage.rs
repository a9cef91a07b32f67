//! # Agent Usage Rollups
//!
//! Token and cost totals per agent over rolling day / week / month windows.
//!
//! Costs are integer micro-dollars end to end. `cost_cents` is the total
//! rounded half-up to the cent.

use crate::primitives::{
    MICROS_PER_CENT, USAGE_DAY_WINDOW_HOURS, USAGE_MONTH_WINDOW_DAYS, USAGE_WEEK_WINDOW_DAYS,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One usage log entry, as written by an agent run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRow {
    pub agent: String,
    /// JSON text; `tokens_in` and `tokens_out` are read from it when present.
    pub results: String,
    pub api_cost_micros: u64,
    pub created_at: DateTime<Utc>,
}

/// Aggregated totals over a set of rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub total_tokens: u64,
    pub cost_micros: u64,
    pub cost_cents: u64,
    /// Dollars with two decimals, e.g. `"3.07"`.
    pub cost_usd: String,
    pub sessions: u64,
}

/// Round micro-dollars to cents, half-up.
#[must_use]
pub fn micros_to_cents(micros: u64) -> u64 {
    micros.saturating_add(MICROS_PER_CENT / 2) / MICROS_PER_CENT
}

/// Format cents as a dollar amount with two decimals.
#[must_use]
pub fn format_usd(cents: u64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

/// A token count as some agents report it: an integer, or a float such as
/// `12.0`. Fractions are truncated; negative and non-numeric values count
/// as zero because totals are unsigned.
fn token_value(value: &serde_json::Value) -> u64 {
    if let Some(count) = value.as_u64() {
        return count;
    }
    match value.as_f64() {
        Some(count) if count.is_finite() && count > 0.0 => count as u64,
        _ => 0,
    }
}

fn token_counts(results: &str) -> (u64, u64) {
    let Ok(parsed) = serde_json::from_str::<serde_json::Value>(results) else {
        return (0, 0);
    };
    let field = |name: &str| parsed.get(name).map_or(0, token_value);
    (field("tokens_in"), field("tokens_out"))
}

/// Sum tokens, cost and sessions over `rows`.
///
/// A row whose `results` is not valid JSON still counts as a session and
/// still contributes its cost; it contributes zero tokens.
pub fn aggregate<'a, I>(rows: I) -> UsageStats
where
    I: IntoIterator<Item = &'a UsageRow>,
{
    let mut stats = UsageStats::default();
    for row in rows {
        let (tokens_in, tokens_out) = token_counts(&row.results);
        stats.tokens_in = stats.tokens_in.saturating_add(tokens_in);
        stats.tokens_out = stats.tokens_out.saturating_add(tokens_out);
        stats.cost_micros = stats.cost_micros.saturating_add(row.api_cost_micros);
        stats.sessions += 1;
    }
    stats.total_tokens = stats.tokens_in.saturating_add(stats.tokens_out);
    stats.cost_cents = micros_to_cents(stats.cost_micros);
    stats.cost_usd = format_usd(stats.cost_cents);
    stats
}

/// Totals for the three rolling windows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageWindows {
    pub day: UsageStats,
    pub week: UsageStats,
    pub month: UsageStats,
}

/// Rollup for a single agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentUsage {
    pub agent: String,
    #[serde(flatten)]
    pub windows: UsageWindows,
}

/// Oldest timestamp included in the month window.
#[must_use]
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(USAGE_MONTH_WINDOW_DAYS)
}

/// Split rows into day / week / month windows ending at `now`.
#[must_use]
pub fn windows(rows: &[&UsageRow], now: DateTime<Utc>) -> UsageWindows {
    let day_start = now - Duration::hours(USAGE_DAY_WINDOW_HOURS);
    let week_start = now - Duration::days(USAGE_WEEK_WINDOW_DAYS);
    let month_start = month_start(now);

    UsageWindows {
        day: aggregate(rows.iter().copied().filter(|r| r.created_at >= day_start)),
        week: aggregate(rows.iter().copied().filter(|r| r.created_at >= week_start)),
        month: aggregate(rows.iter().copied().filter(|r| r.created_at >= month_start)),
    }
}

/// Rollup of one agent's rows.
#[must_use]
pub fn rollup_agent(agent: &str, rows: &[UsageRow], now: DateTime<Utc>) -> AgentUsage {
    let own: Vec<&UsageRow> = rows.iter().filter(|r| r.agent == agent).collect();
    AgentUsage {
        agent: agent.to_string(),
        windows: windows(&own, now),
    }
}

/// Rollups of every agent that appears in `rows`.
#[must_use]
pub fn rollup_all(rows: &[UsageRow], now: DateTime<Utc>) -> BTreeMap<String, UsageWindows> {
    let mut by_agent: BTreeMap<&str, Vec<&UsageRow>> = BTreeMap::new();
    for row in rows {
        by_agent.entry(row.agent.as_str()).or_default().push(row);
    }
    by_agent
        .into_iter()
        .map(|(agent, own)| (agent.to_string(), windows(&own, now)))
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn row(agent: &str, results: &str, micros: u64, hours_ago: i64) -> UsageRow {
        UsageRow {
            agent: agent.to_string(),
            results: results.to_string(),
            api_cost_micros: micros,
            created_at: now() - Duration::hours(hours_ago),
        }
    }

    #[test]
    fn aggregate_sums_tokens_and_cost() {
        let rows = vec![
            row("ace", r#"{"tokens_in": 100, "tokens_out": 40}"#, 1_250_000, 1),
            row("ace", r#"{"tokens_in": 10}"#, 20_000, 2),
        ];
        let stats = aggregate(&rows);
        assert_eq!(stats.tokens_in, 110);
        assert_eq!(stats.tokens_out, 40);
        assert_eq!(stats.total_tokens, 150);
        assert_eq!(stats.sessions, 2);
        assert_eq!(stats.cost_cents, 127);
        assert_eq!(stats.cost_usd, "1.27");
    }

    #[test]
    fn malformed_results_still_count_session_and_cost() {
        let rows = vec![row("ace", "not json", 30_000, 1)];
        let stats = aggregate(&rows);
        assert_eq!(stats.sessions, 1);
        assert_eq!(stats.total_tokens, 0);
        assert_eq!(stats.cost_micros, 30_000);
        assert_eq!(stats.cost_cents, 3);
    }

    #[test]
    fn float_token_counts_are_accepted() {
        let rows = vec![
            row("ace", r#"{"tokens_in": 12.0, "tokens_out": 7.9}"#, 0, 1),
            row("ace", r#"{"tokens_in": -5, "tokens_out": "many"}"#, 0, 1),
        ];
        let stats = aggregate(&rows);
        assert_eq!(stats.tokens_in, 12);
        assert_eq!(stats.tokens_out, 7);
        assert_eq!(stats.total_tokens, 19);
        assert_eq!(stats.sessions, 2);
    }

    #[test]
    fn cents_round_half_up() {
        assert_eq!(micros_to_cents(4_999), 0);
        assert_eq!(micros_to_cents(5_000), 1);
        assert_eq!(micros_to_cents(15_000), 2);
        assert_eq!(format_usd(7), "0.07");
    }

    #[test]
    fn windows_split_by_age() {
        let rows = vec![
            row("ace", "{}", 0, 1),
            row("ace", "{}", 0, 24 * 3),
            row("ace", "{}", 0, 24 * 20),
            row("ace", "{}", 0, 24 * 40),
        ];
        let usage = rollup_agent("ace", &rows, now());
        assert_eq!(usage.windows.day.sessions, 1);
        assert_eq!(usage.windows.week.sessions, 2);
        assert_eq!(usage.windows.month.sessions, 3);
    }

    #[test]
    fn rollup_all_groups_by_agent() {
        let rows = vec![
            row("ace", "{}", 0, 1),
            row("romero", "{}", 0, 1),
            row("ace", "{}", 0, 2),
        ];
        let all = rollup_all(&rows, now());
        assert_eq!(all.len(), 2);
        assert_eq!(all["ace"].day.sessions, 2);
        assert_eq!(all["romero"].month.sessions, 1);
    }

    #[test]
    fn agent_usage_serializes_flat() {
        let usage = rollup_agent("ace", &[], now());
        let json = serde_json::to_value(&usage).unwrap();
        assert_eq!(json["agent"], "ace");
        assert_eq!(json["day"]["sessions"], 0);
        assert_eq!(json["month"]["cost_usd"], "0.00");
    }
}

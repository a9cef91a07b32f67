//! # Primitives
//!
//! Fixed constants of the registry. Compiled into the binary and immutable
//! at runtime.

/// Number of linked deliverables listed on an entity's detail view.
///
/// The rest are reachable through the "view all" deliverable filter.
pub const DETAIL_DELIVERABLE_LIMIT: usize = 5;

// =============================================================================
// USAGE WINDOWS
// =============================================================================

/// Length of the "day" usage window, in hours.
pub const USAGE_DAY_WINDOW_HOURS: i64 = 24;

/// Length of the "week" usage window, in days.
pub const USAGE_WEEK_WINDOW_DAYS: i64 = 7;

/// Length of the "month" usage window, in days. Older rows are never read.
pub const USAGE_MONTH_WINDOW_DAYS: i64 = 30;

/// Micro-dollars per cent.
pub const MICROS_PER_CENT: u64 = 10_000;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length of an agent id accepted by heartbeats and usage rows.
///
/// Longer ids are rejected to keep the heartbeat table bounded.
pub const MAX_AGENT_ID_LENGTH: usize = 128;

/// Maximum number of rows accepted by a single import.
pub const MAX_IMPORT_ROWS: usize = 10_000;

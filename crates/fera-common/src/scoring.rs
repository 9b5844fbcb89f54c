//! Lead scoring heuristic.
//!
//! ```text
//! score = clamp(min(value / 1000, 50) + priority_bonus + 5 * activities, 0, 100)
//! ```
//!
//! The activity term is not capped before the final clamp, so a lead with
//! enough logged interactions reaches 100 regardless of its value.

use crate::models::Priority;

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

/// Points per 1000 units of deal value, capped at [`VALUE_CAP`].
pub const VALUE_DIVISOR: f64 = 1000.0;
pub const VALUE_CAP: f64 = 50.0;
pub const POINTS_PER_ACTIVITY: f64 = 5.0;

pub fn priority_bonus(priority: Priority) -> f64 {
    match priority {
        Priority::High => 25.0,
        Priority::Medium => 10.0,
        Priority::Low => 0.0,
    }
}

/// Monetary contribution. Non-finite input counts as zero; negative input
/// is passed through and left for the final clamp.
pub fn value_points(value: f64) -> f64 {
    let value = if value.is_finite() { value } else { 0.0 };
    (value / VALUE_DIVISOR).min(VALUE_CAP)
}

pub fn score(value: f64, priority: Priority, activity_count: usize) -> f64 {
    let raw = value_points(value)
        + priority_bonus(priority)
        + activity_count as f64 * POINTS_PER_ACTIVITY;
    raw.clamp(MIN_SCORE, MAX_SCORE)
}

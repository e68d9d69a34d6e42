//! crates/conversa_core/src/progress.rs
//!
//! The streak/level engine. Pure: the caller supplies the current calendar date,
//! so the same inputs always produce the same record.

use chrono::{Duration, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::{CefrLevel, Progress};
use crate::ports::{PortError, PortResult};

/// Upper bounds (exclusive) of cumulative minutes for each level below C2.
const LEVEL_THRESHOLDS: [(i64, CefrLevel); 5] = [
    (60, CefrLevel::A1),
    (120, CefrLevel::A2),
    (240, CefrLevel::B1),
    (480, CefrLevel::B2),
    (960, CefrLevel::C1),
];

/// Maps cumulative conversation minutes to a level.
pub fn level_for_minutes(total_minutes: i64) -> CefrLevel {
    LEVEL_THRESHOLDS
        .iter()
        .find(|(bound, _)| total_minutes < *bound)
        .map(|(_, level)| *level)
        .unwrap_or(CefrLevel::C2)
}

/// Folds one completed conversation into `progress`.
///
/// A second conversation on the same calendar day counts towards the totals but
/// leaves the streak where it is.
pub fn apply_conversation(
    progress: &Progress,
    minutes: i64,
    today: NaiveDate,
) -> PortResult<Progress> {
    validate(progress.user_id, minutes)?;

    let mut next = progress.clone();
    next.daily_conversation_count += 1;
    next.total_conversation_minutes += minutes;

    next.current_streak_days = match progress.last_conversation_date {
        Some(previous) if previous == today => progress.current_streak_days.max(1),
        Some(previous) if previous == today - Duration::days(1) => {
            progress.current_streak_days + 1
        }
        _ => 1,
    };
    next.longest_streak_days = progress.longest_streak_days.max(next.current_streak_days);
    next.last_conversation_date = Some(today);
    next.current_level = level_for_minutes(next.total_conversation_minutes);
    next.updated_at = Utc::now();

    Ok(next)
}

/// Rejects inputs the engine must never fold in.
pub fn validate(user_id: Uuid, minutes: i64) -> PortResult<()> {
    if user_id.is_nil() {
        return Err(PortError::Validation("user id is required".to_string()));
    }
    if minutes < 0 {
        return Err(PortError::Validation(format!(
            "minutes must be non-negative, got {minutes}"
        )));
    }
    Ok(())
}

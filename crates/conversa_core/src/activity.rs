//! crates/conversa_core/src/activity.rs
//!
//! Aggregation math for per-agent statistics and weekly completion reports.

use chrono::{Datelike, Duration, NaiveDate};
use uuid::Uuid;

use crate::domain::{ConversationAgentActivity, UserDailyActivity};

/// Roll-up of a user's activity with one agent.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentStats {
    pub agent_id: Uuid,
    pub conversation_count: i64,
    pub total_duration_seconds: i64,
    pub total_messages: i64,
    pub total_words: i64,
    pub average_words_per_minute: f64,
}

/// One day of a weekly report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayActivity {
    pub date: NaiveDate,
    pub minutes_spoken: i64,
    pub completed: bool,
}

/// Monday-to-Sunday completion report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklyReport {
    pub week_start: NaiveDate,
    pub days: Vec<DayActivity>,
    pub completed_days: usize,
    pub total_minutes: i64,
}

pub fn count_words(text: &str) -> i64 {
    text.split_whitespace().count() as i64
}

/// Words per minute over `duration_seconds`; zero for an instantaneous session.
pub fn words_per_minute(words: i64, duration_seconds: i64) -> f64 {
    if duration_seconds <= 0 {
        return 0.0;
    }
    words as f64 * 60.0 / duration_seconds as f64
}

pub fn summarize_agent(agent_id: Uuid, activities: &[ConversationAgentActivity]) -> AgentStats {
    let timed: Vec<f64> = activities
        .iter()
        .filter(|a| a.duration_seconds > 0)
        .map(|a| a.words_per_minute)
        .collect();
    let average_words_per_minute = if timed.is_empty() {
        0.0
    } else {
        timed.iter().sum::<f64>() / timed.len() as f64
    };

    AgentStats {
        agent_id,
        conversation_count: activities.len() as i64,
        total_duration_seconds: activities.iter().map(|a| a.duration_seconds).sum(),
        total_messages: activities.iter().map(|a| a.message_count).sum(),
        total_words: activities.iter().map(|a| a.word_count).sum(),
        average_words_per_minute,
    }
}

/// The Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Builds the report for the week starting at `week_start`. Rows outside the
/// week are ignored; a day is complete once any minutes were spoken.
pub fn weekly_report(week_start: NaiveDate, rows: &[UserDailyActivity]) -> WeeklyReport {
    let days: Vec<DayActivity> = (0..7)
        .map(|offset| {
            let date = week_start + Duration::days(offset);
            let minutes_spoken = rows
                .iter()
                .filter(|row| row.activity_date == date)
                .map(|row| row.minutes_spoken)
                .sum();
            DayActivity {
                date,
                minutes_spoken,
                completed: minutes_spoken > 0,
            }
        })
        .collect();

    WeeklyReport {
        week_start,
        completed_days: days.iter().filter(|d| d.completed).count(),
        total_minutes: days.iter().map(|d| d.minutes_spoken).sum(),
        days,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn activity(duration_seconds: i64, words: i64, messages: i64) -> ConversationAgentActivity {
        ConversationAgentActivity {
            id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            agent_id: Uuid::new_v4(),
            duration_seconds,
            message_count: messages,
            word_count: words,
            words_per_minute: words_per_minute(words, duration_seconds),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn counts_whitespace_separated_words() {
        assert_eq!(count_words("  hola   que tal\n amigo "), 4);
        assert_eq!(count_words(""), 0);
    }

    #[test]
    fn wpm_is_zero_without_duration() {
        assert_eq!(words_per_minute(50, 0), 0.0);
        assert_eq!(words_per_minute(90, 120), 45.0);
    }

    #[test]
    fn summary_averages_only_timed_conversations() {
        let agent_id = Uuid::new_v4();
        let rows = vec![activity(60, 30, 3), activity(120, 120, 5), activity(0, 4, 1)];
        let stats = summarize_agent(agent_id, &rows);

        assert_eq!(stats.conversation_count, 3);
        assert_eq!(stats.total_duration_seconds, 180);
        assert_eq!(stats.total_messages, 9);
        assert_eq!(stats.total_words, 154);
        assert_eq!(stats.average_words_per_minute, 45.0);
    }

    #[test]
    fn empty_summary_is_all_zero() {
        let stats = summarize_agent(Uuid::nil(), &[]);
        assert_eq!(stats.conversation_count, 0);
        assert_eq!(stats.average_words_per_minute, 0.0);
    }

    #[test]
    fn week_starts_on_monday() {
        // 2024-03-14 is a Thursday.
        let thursday = NaiveDate::from_ymd_opt(2024, 3, 14).unwrap();
        assert_eq!(week_start(thursday), NaiveDate::from_ymd_opt(2024, 3, 11).unwrap());
        let monday = NaiveDate::from_ymd_opt(2024, 3, 11).unwrap();
        assert_eq!(week_start(monday), monday);
    }

    #[test]
    fn weekly_report_marks_days_with_minutes() {
        let user_id = Uuid::new_v4();
        let monday = NaiveDate::from_ymd_opt(2024, 3, 11).unwrap();
        let rows = vec![
            UserDailyActivity {
                user_id,
                activity_date: monday,
                minutes_spoken: 12,
            },
            UserDailyActivity {
                user_id,
                activity_date: monday + Duration::days(3),
                minutes_spoken: 4,
            },
            UserDailyActivity {
                user_id,
                activity_date: monday + Duration::days(9),
                minutes_spoken: 30,
            },
        ];

        let report = weekly_report(monday, &rows);
        assert_eq!(report.days.len(), 7);
        assert_eq!(report.completed_days, 2);
        assert_eq!(report.total_minutes, 16);
        assert!(report.days[0].completed);
        assert!(!report.days[1].completed);
        assert_eq!(report.days[3].minutes_spoken, 4);
    }
}

//! crates/conversa_core/src/tracker.rs
//!
//! The application service that runs when a live conversation ends: it writes the
//! activity snapshot, the daily minutes and the user's recomputed progress.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::info;
use uuid::Uuid;

use crate::activity::{count_words, words_per_minute};
use crate::domain::{Conversation, ConversationAgentActivity, MessageRole, Progress};
use crate::ports::{
    ActivityRepository, DailyActivityRepository, MessageRepository, PortError, PortResult,
    ProgressRepository,
};
use crate::progress::{apply_conversation, validate};

#[derive(Clone)]
pub struct ProgressTracker {
    progress: Arc<dyn ProgressRepository>,
    messages: Arc<dyn MessageRepository>,
    activity: Arc<dyn ActivityRepository>,
    daily: Arc<dyn DailyActivityRepository>,
}

impl ProgressTracker {
    pub fn new(
        progress: Arc<dyn ProgressRepository>,
        messages: Arc<dyn MessageRepository>,
        activity: Arc<dyn ActivityRepository>,
        daily: Arc<dyn DailyActivityRepository>,
    ) -> Self {
        Self {
            progress,
            messages,
            activity,
            daily,
        }
    }

    /// Loads (or starts) the user's progress, folds in one conversation and saves it.
    ///
    /// The read and the write are not serialized; two conversations ending for the
    /// same user at the same instant can lose one update.
    pub async fn update_progress(
        &self,
        user_id: Uuid,
        minutes: i64,
        today: NaiveDate,
    ) -> PortResult<Progress> {
        validate(user_id, minutes)?;

        let current = self
            .progress
            .get_progress(user_id)
            .await?
            .unwrap_or_else(|| Progress::new(user_id));
        let next = apply_conversation(&current, minutes, today)?;
        self.progress.save_progress(&next).await?;
        Ok(next)
    }

    /// Records everything derived from a finished conversation. A conversation is
    /// counted once: when its activity row already exists nothing else is written
    /// and `None` is returned.
    pub async fn record_conversation_end(
        &self,
        conversation: &Conversation,
        duration_seconds: i64,
        today: NaiveDate,
    ) -> PortResult<Option<Progress>> {
        if duration_seconds < 0 {
            return Err(PortError::Validation(format!(
                "duration must be non-negative, got {duration_seconds}"
            )));
        }

        let messages = self.messages.list_messages(conversation.id).await?;
        let spoken: Vec<_> = messages
            .iter()
            .filter(|m| m.role == MessageRole::User)
            .collect();
        let word_count: i64 = spoken.iter().map(|m| count_words(&m.content)).sum();

        let activity = ConversationAgentActivity {
            id: Uuid::new_v4(),
            conversation_id: conversation.id,
            user_id: conversation.user_id,
            agent_id: conversation.agent_id,
            duration_seconds,
            message_count: spoken.len() as i64,
            word_count,
            words_per_minute: words_per_minute(word_count, duration_seconds),
            created_at: Utc::now(),
        };
        if !self.activity.record_activity(&activity).await? {
            info!(
                conversation_id = %conversation.id,
                "Conversation already recorded, skipping progress"
            );
            return Ok(None);
        }

        let minutes = duration_seconds / 60;
        self.daily
            .add_minutes(conversation.user_id, today, minutes)
            .await?;

        let progress = self
            .update_progress(conversation.user_id, minutes, today)
            .await?;
        info!(
            conversation_id = %conversation.id,
            user_id = %conversation.user_id,
            minutes,
            streak = progress.current_streak_days,
            level = %progress.current_level,
            "Recorded conversation end"
        );
        Ok(Some(progress))
    }
}

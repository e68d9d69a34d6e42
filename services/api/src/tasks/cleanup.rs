//! services/api/src/tasks/cleanup.rs
//!
//! Periodically deletes conversations that never got going: under a minute long or
//! never ended, and older than the grace period. Conversations with a live relay
//! timer are left alone.

use chrono::{DateTime, Utc};
use conversa_core::ports::{ConversationRepository, PortError, PortResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::web::relay::SessionRegistry;

pub struct CleanupTask {
    conversations: Arc<dyn ConversationRepository>,
    registry: Arc<SessionRegistry>,
    interval: Duration,
    grace: Duration,
}

impl CleanupTask {
    pub fn new(
        conversations: Arc<dyn ConversationRepository>,
        registry: Arc<SessionRegistry>,
        interval: Duration,
        grace: Duration,
    ) -> Self {
        Self {
            conversations,
            registry,
            interval,
            grace,
        }
    }

    /// One pass. Returns how many conversations were deleted.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> PortResult<u64> {
        let grace =
            chrono::Duration::from_std(self.grace).map_err(|e| PortError::Unexpected(e.to_string()))?;
        let live = self.registry.active_ids();
        self.conversations
            .delete_short_conversations(now - grace, &live)
            .await
    }

    /// Sweeps every `interval` until `token` is cancelled. A sweep that has started
    /// always finishes.
    pub async fn run(self, token: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            interval_secs = self.interval.as_secs(),
            grace_secs = self.grace.as_secs(),
            "Cleanup task started"
        );

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => match self.sweep_once(Utc::now()).await {
                    Ok(0) => debug!("Cleanup found nothing to delete"),
                    Ok(removed) => info!(removed, "Deleted short conversations"),
                    Err(e) => error!("Cleanup sweep failed: {}", e),
                },
            }
        }
        info!("Cleanup task stopped");
    }

    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conversa_core::domain::SocialProvider;
    use conversa_core::testing::MemoryStore;

    #[tokio::test]
    async fn test_sweep_spares_long_and_live_conversations() {
        let store = Arc::new(MemoryStore::default());
        let registry = Arc::new(SessionRegistry::new());
        let user = store.seed_user(SocialProvider::Google, "ana");
        let agent = uuid::Uuid::new_v4();

        let short = store.create_conversation(user.id, agent).await.unwrap();
        store.set_duration(short.id, 12).await.unwrap();
        let long = store.create_conversation(user.id, agent).await.unwrap();
        store.set_duration(long.id, 600).await.unwrap();
        let live = store.create_conversation(user.id, agent).await.unwrap();
        registry.start(live.id);

        let task = CleanupTask::new(
            store.clone(),
            registry,
            Duration::from_secs(3600),
            Duration::from_secs(60),
        );

        // Nothing is past the grace period yet.
        assert_eq!(task.sweep_once(Utc::now()).await.unwrap(), 0);

        let later = Utc::now() + chrono::Duration::minutes(5);
        assert_eq!(task.sweep_once(later).await.unwrap(), 1);
        assert!(store.get_conversation(short.id).await.is_err());
        assert!(store.get_conversation(long.id).await.is_ok());
        assert!(store.get_conversation(live.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_run_stops_when_cancelled() {
        let task = CleanupTask::new(
            Arc::new(MemoryStore::default()),
            Arc::new(SessionRegistry::new()),
            Duration::from_millis(10),
            Duration::from_secs(60),
        );
        let token = CancellationToken::new();
        let handle = task.spawn(token.clone());

        tokio::time::sleep(Duration::from_millis(30)).await;
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("task stops promptly")
            .unwrap();
    }
}

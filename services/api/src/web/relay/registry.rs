//! services/api/src/web/relay/registry.rs
//!
//! Start times of live conversation sessions. Shared by every socket and read by the
//! cleanup sweep; nothing here survives a restart.

use dashmap::DashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct SessionRegistry {
    started: DashMap<Uuid, Instant>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts (or restarts) the timer for a conversation. The last caller wins.
    pub fn start(&self, conversation_id: Uuid) {
        self.started.insert(conversation_id, Instant::now());
    }

    /// Removes the timer and returns how long it ran.
    pub fn stop(&self, conversation_id: Uuid) -> Option<Duration> {
        self.started
            .remove(&conversation_id)
            .map(|(_, started)| started.elapsed())
    }

    pub fn elapsed(&self, conversation_id: Uuid) -> Option<Duration> {
        self.started
            .get(&conversation_id)
            .map(|started| started.elapsed())
    }

    pub fn active_ids(&self) -> Vec<Uuid> {
        self.started.iter().map(|entry| *entry.key()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_removes_the_timer_once() {
        let registry = SessionRegistry::new();
        let id = Uuid::new_v4();

        registry.start(id);
        assert!(registry.elapsed(id).is_some());
        assert_eq!(registry.active_ids(), vec![id]);

        assert!(registry.stop(id).is_some());
        assert!(registry.stop(id).is_none());
        assert!(registry.active_ids().is_empty());
    }

    #[test]
    fn unknown_conversations_have_no_elapsed_time() {
        assert!(SessionRegistry::new().elapsed(Uuid::new_v4()).is_none());
    }
}

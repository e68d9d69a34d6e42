//! services/api/src/web/relay/hub.rs
//!
//! Per-conversation broadcast groups. Every socket joined to a conversation gets
//! every event published to it.

use super::protocol::ServerEvent;
use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

/// A socket that falls this far behind starts losing events.
const GROUP_CAPACITY: usize = 64;

#[derive(Debug, Default)]
pub struct RelayHub {
    groups: DashMap<Uuid, broadcast::Sender<ServerEvent>>,
}

impl RelayHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self, conversation_id: Uuid) -> broadcast::Receiver<ServerEvent> {
        self.groups
            .entry(conversation_id)
            .or_insert_with(|| broadcast::channel(GROUP_CAPACITY).0)
            .subscribe()
    }

    /// Sends to whoever is currently joined. Nobody listening is not an error.
    pub fn broadcast(&self, conversation_id: Uuid, event: ServerEvent) {
        if let Some(group) = self.groups.get(&conversation_id) {
            let _ = group.send(event);
        }
    }

    /// Drops the group once its last receiver is gone.
    pub fn leave(&self, conversation_id: Uuid) {
        self.groups
            .remove_if(&conversation_id, |_, group| group.receiver_count() == 0);
    }

    pub fn member_count(&self, conversation_id: Uuid) -> usize {
        self.groups
            .get(&conversation_id)
            .map(|group| group.receiver_count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(text: &str) -> ServerEvent {
        ServerEvent::Error {
            message: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_every_member_receives_broadcasts() {
        let hub = RelayHub::new();
        let id = Uuid::new_v4();
        let mut first = hub.join(id);
        let mut second = hub.join(id);

        hub.broadcast(id, error("hello"));

        for rx in [&mut first, &mut second] {
            match rx.recv().await.unwrap() {
                ServerEvent::Error { message } => assert_eq!(message, "hello"),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_group_is_kept_while_members_remain() {
        let hub = RelayHub::new();
        let id = Uuid::new_v4();
        let first = hub.join(id);
        let _second = hub.join(id);

        drop(first);
        hub.leave(id);
        assert_eq!(hub.member_count(id), 1);
    }

    #[tokio::test]
    async fn test_last_leave_drops_the_group() {
        let hub = RelayHub::new();
        let id = Uuid::new_v4();
        drop(hub.join(id));
        hub.leave(id);
        assert_eq!(hub.member_count(id), 0);

        // Broadcasting to a missing group is a no-op.
        hub.broadcast(id, error("nobody"));
    }
}

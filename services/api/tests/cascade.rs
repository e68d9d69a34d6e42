//! Postgres-backed checks of the repository adapter. These run only when
//! `TEST_DATABASE_URL` points at a disposable database.

use api_lib::adapters::DbAdapter;
use chrono::{Duration, Utc};
use conversa_core::domain::{
    AgentDraft, AgentType, AuthSession, ConversationAgentActivity, MessageRole, NewMessage,
    NewUser, Progress, SocialProvider,
};
use conversa_core::ports::{
    ActivityRepository, AgentRepository, AuthSessionRepository, ConversationRepository,
    DailyActivityRepository, MessageRepository, PortError, ProgressRepository, UserRepository,
};
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

async fn adapter() -> Option<DbAdapter> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .expect("connect to TEST_DATABASE_URL");
    let db = DbAdapter::new(pool);
    db.run_migrations().await.expect("migrations apply");
    Some(db)
}

async fn count(db: &DbAdapter, table: &str, user_id: Uuid) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table} WHERE user_id = $1"))
        .bind(user_id)
        .fetch_one(db.pool())
        .await
        .expect("count rows")
}

#[tokio::test]
async fn deleting_a_user_removes_everything_they_own() {
    let Some(db) = adapter().await else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };

    let user = db
        .create_user(NewUser {
            provider: SocialProvider::Google,
            social_id: format!("cascade-{}", Uuid::new_v4()),
            email: Some("learner@example.com".to_string()),
            display_name: None,
        })
        .await
        .unwrap();
    let agent = db
        .create_agent(AgentDraft {
            name: "Barista".to_string(),
            agent_type: AgentType::Travel,
            description: None,
            voice: None,
            persona: "You run a small cafe in Lisbon.".to_string(),
        })
        .await
        .unwrap();

    let now = Utc::now();
    db.create_session(AuthSession {
        id: Uuid::new_v4(),
        user_id: user.id,
        refresh_token_hash: "hash".to_string(),
        user_agent: None,
        created_at: now,
        expires_at: now + Duration::days(30),
        revoked_at: None,
    })
    .await
    .unwrap();

    let conversation = db.create_conversation(user.id, agent.id).await.unwrap();
    let message = db
        .create_message(NewMessage {
            conversation_id: conversation.id,
            role: MessageRole::User,
            content: "Um cafe, por favor".to_string(),
            audio_url: None,
        })
        .await
        .unwrap();
    db.set_duration(conversation.id, 240).await.unwrap();

    let mut progress = Progress::new(user.id);
    progress.total_conversation_minutes = 4;
    db.save_progress(&progress).await.unwrap();
    db.record_activity(&ConversationAgentActivity {
        id: Uuid::new_v4(),
        conversation_id: conversation.id,
        user_id: user.id,
        agent_id: agent.id,
        duration_seconds: 240,
        message_count: 1,
        word_count: 4,
        words_per_minute: 1.0,
        created_at: now,
    })
    .await
    .unwrap();
    db.add_minutes(user.id, now.date_naive(), 4).await.unwrap();

    db.delete_user(user.id).await.unwrap();

    for table in [
        "auth_sessions",
        "conversations",
        "progress",
        "conversation_agent_activity",
        "user_daily_activity",
    ] {
        assert_eq!(count(&db, table, user.id).await, 0, "{table} still has rows");
    }
    assert!(matches!(
        db.get_message(message.id).await,
        Err(PortError::NotFound(_))
    ));
    assert!(matches!(db.get_user(user.id).await, Err(PortError::NotFound(_))));

    // Agents are shared and survive their users.
    assert!(db.get_agent(agent.id).await.is_ok());
    db.delete_agent(agent.id).await.unwrap();
}

#[tokio::test]
async fn daily_minutes_accumulate_per_day() {
    let Some(db) = adapter().await else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };

    let user = db
        .create_user(NewUser {
            provider: SocialProvider::Apple,
            social_id: format!("minutes-{}", Uuid::new_v4()),
            email: None,
            display_name: None,
        })
        .await
        .unwrap();
    let today = Utc::now().date_naive();
    db.add_minutes(user.id, today, 3).await.unwrap();
    db.add_minutes(user.id, today, 5).await.unwrap();

    let days = db
        .list_daily_activity(user.id, today - Duration::days(6), today)
        .await
        .unwrap();
    assert_eq!(days.len(), 1);
    assert_eq!(days[0].minutes_spoken, 8);

    db.delete_user(user.id).await.unwrap();
}

#[tokio::test]
async fn agent_in_use_cannot_be_deleted_and_duration_is_written_once() {
    let Some(db) = adapter().await else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };

    let user = db
        .create_user(NewUser {
            provider: SocialProvider::Google,
            social_id: format!("restrict-{}", Uuid::new_v4()),
            email: None,
            display_name: None,
        })
        .await
        .unwrap();
    let agent = db
        .create_agent(AgentDraft {
            name: "Tutor".to_string(),
            agent_type: AgentType::Travel,
            description: None,
            voice: None,
            persona: "You help travellers order food.".to_string(),
        })
        .await
        .unwrap();
    let conversation = db.create_conversation(user.id, agent.id).await.unwrap();

    assert!(db.set_duration(conversation.id, 600).await.unwrap());
    assert!(!db.set_duration(conversation.id, 5).await.unwrap());
    assert_eq!(
        db.get_conversation(conversation.id).await.unwrap().duration_seconds,
        Some(600)
    );

    let err = db.delete_agent(agent.id).await.unwrap_err();
    assert!(matches!(err, PortError::Validation(ref m) if m.contains("in use")));
    assert!(db.get_conversation(conversation.id).await.is_ok());

    db.delete_user(user.id).await.unwrap();
    db.delete_agent(agent.id).await.unwrap();
}

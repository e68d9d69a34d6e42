//! services/api/src/adapters/db/mod.rs
//!
//! This module contains the database adapter, the concrete implementation of the
//! repository ports from the `core` crate. It handles all interactions with the
//! PostgreSQL database using `sqlx`. Each port lives in its own file.

mod activity;
mod agents;
mod conversations;
mod messages;
mod progress;
mod prompts;
mod sessions;
mod users;

use conversa_core::domain::UnknownVariant;
use conversa_core::ports::PortError;
use sqlx::PgPool;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements every repository port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

//=========================================================================================
// Error Mapping Helpers
//=========================================================================================

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

/// Maps `RowNotFound` to a `NotFound` naming the missing item.
fn lookup_error(what: String) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(format!("{} not found", what)),
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn corrupt(e: UnknownVariant) -> PortError {
    PortError::Unexpected(format!("Stored value is invalid: {}", e))
}

/// Turns a zero-row DELETE/UPDATE into `NotFound`.
fn expect_affected(rows: u64, what: String) -> Result<(), PortError> {
    if rows == 0 {
        Err(PortError::NotFound(format!("{} not found", what)))
    } else {
        Ok(())
    }
}

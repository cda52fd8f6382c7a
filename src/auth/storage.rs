//! Credential lookup.
//!
//! Stores only accept a username *value*; the query text is fixed and the
//! username is always bound as a parameter.

use super::CredentialRecord;
use sqlx::{PgPool, Row, postgres::PgPoolOptions};
use std::{collections::HashMap, future::Future, time::Duration};
use thiserror::Error;
use tracing::Instrument;

pub const LOOKUP_QUERY: &str = "SELECT password_hash, role FROM users WHERE username = $1";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("credential store query failed: {0}")]
    Query(#[from] sqlx::Error),
    #[error("credential store unavailable: {0}")]
    Unavailable(String),
    #[error("credential lookup timed out after {0:?}")]
    Timeout(Duration),
}

/// Source of credential records.
pub trait CredentialStore: Send + Sync {
    /// Return the record for `username`, or `None` if there is no such user.
    /// A failing store is an error, never `None`.
    fn find_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Option<CredentialRecord>, StoreError>> + Send;
}

/// `PostgreSQL`-backed store.
#[derive(Clone, Debug)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build a single-connection pool that connects on first use, so a
    /// connection failure surfaces from the lookup rather than at startup.
    ///
    /// # Errors
    /// Returns an error if `dsn` cannot be parsed.
    pub fn connect_lazy(dsn: &str, acquire_timeout: Duration) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(acquire_timeout)
            .connect_lazy(dsn)?;

        Ok(Self::new(pool))
    }

    /// Close the pool and wait for connections to be released.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl CredentialStore for PgCredentialStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<CredentialRecord>, StoreError> {
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = LOOKUP_QUERY
        );
        let row = sqlx::query(LOOKUP_QUERY)
            .bind(username)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;

        row.map(|row| -> Result<CredentialRecord, StoreError> {
            Ok(CredentialRecord {
                username: username.to_string(),
                password_hash: row.try_get("password_hash")?,
                role: row.try_get("role")?,
            })
        })
        .transpose()
    }
}

/// In-process store for tests and fixtures.
#[derive(Clone, Debug, Default)]
pub struct MemoryCredentialStore {
    records: HashMap<String, CredentialRecord>,
    offline: bool,
    latency: Option<Duration>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_record(mut self, record: CredentialRecord) -> Self {
        self.records.insert(record.username.clone(), record);
        self
    }

    /// Fail every lookup as if the store were unreachable.
    #[must_use]
    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    /// Delay every lookup, e.g. to exercise timeouts.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }
}

impl CredentialStore for MemoryCredentialStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<CredentialRecord>, StoreError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if self.offline {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }

        Ok(self.records.get(username).cloned())
    }
}

//! Persistence of waitlist signups.
//!
//! Handlers only see the `SignupStore` trait, so the pipeline can be exercised
//! without a running Postgres.

#[cfg(test)]
mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
#[cfg(test)]
pub use memory::InMemorySignupStore;
pub use postgres::PgSignupStore;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::NewSignup;

/// A row of `waitlist_signups`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Signup {
    pub id: Uuid,
    pub email: String,
    pub source: String,
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait SignupStore: Send + Sync {
    /// Insert a signup, or, if the email is already present, overwrite all of
    /// its metadata (but not `id` or `created_at`). Atomic per email.
    async fn upsert(
        &self,
        signup: &NewSignup,
    ) -> Result<Signup, anyhow::Error>;

    async fn find_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Signup>, anyhow::Error>;

    async fn count(&self) -> Result<i64, anyhow::Error>;

    /// Newest first (by `created_at`); ties are broken consistently, so pages
    /// never overlap
    async fn list_newest(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Signup>, anyhow::Error>;
}

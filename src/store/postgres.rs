use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::Signup;
use super::SignupStore;
use crate::domain::NewSignup;

const SIGNUP_COLUMNS: &str = "id, email, source, ip_address, user_agent, referrer, utm_source, \
                              utm_medium, utm_campaign, created_at";

/// `PgPool` is used over `PgConnection` as the former has a `Mutex` 'built-in'.
pub struct PgSignupStore {
    pool: PgPool,
}

impl PgSignupStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

// `query!` would need a live db (or `.sqlx` offline data) at compile time, so
// the runtime-checked `query_as` is used throughout.
#[async_trait]
impl SignupStore for PgSignupStore {
    #[tracing::instrument(name = "Upserting signup", skip(self, signup))]
    async fn upsert(
        &self,
        signup: &NewSignup,
    ) -> Result<Signup, anyhow::Error> {
        // the unique constraint on `email` makes this a single atomic statement; concurrent
        // submissions of the same address end up in one row
        let query = format!(
            r#"
        INSERT INTO waitlist_signups
            (id, email, source, ip_address, user_agent, referrer,
             utm_source, utm_medium, utm_campaign, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now())
        ON CONFLICT (email) DO UPDATE SET
            source = EXCLUDED.source,
            ip_address = EXCLUDED.ip_address,
            user_agent = EXCLUDED.user_agent,
            referrer = EXCLUDED.referrer,
            utm_source = EXCLUDED.utm_source,
            utm_medium = EXCLUDED.utm_medium,
            utm_campaign = EXCLUDED.utm_campaign
        RETURNING {SIGNUP_COLUMNS}
        "#
        );
        sqlx::query_as::<_, Signup>(&query)
            .bind(Uuid::new_v4())
            .bind(signup.email.as_ref())
            .bind(signup.source.as_ref())
            .bind(&signup.client.ip_address)
            .bind(signup.client.user_agent.as_deref())
            .bind(signup.client.referrer.as_deref())
            .bind(signup.utm.source.as_deref())
            .bind(signup.utm.medium.as_deref())
            .bind(signup.utm.campaign.as_deref())
            .fetch_one(&self.pool)
            .await
            .context("Failed to upsert signup")
    }

    #[tracing::instrument(name = "Finding signup by email", skip(self))]
    async fn find_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Signup>, anyhow::Error> {
        let query = format!("SELECT {SIGNUP_COLUMNS} FROM waitlist_signups WHERE email = $1");
        sqlx::query_as::<_, Signup>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to query signup by email")
    }

    #[tracing::instrument(name = "Counting signups", skip(self))]
    async fn count(&self) -> Result<i64, anyhow::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM waitlist_signups")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count signups")?;
        Ok(count)
    }

    #[tracing::instrument(name = "Listing signups", skip(self))]
    async fn list_newest(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Signup>, anyhow::Error> {
        let query = format!(
            r#"
        SELECT {SIGNUP_COLUMNS} FROM waitlist_signups
        ORDER BY created_at DESC, id DESC
        OFFSET $1
        LIMIT $2
        "#
        );
        sqlx::query_as::<_, Signup>(&query)
            .bind(offset)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list signups")
    }
}

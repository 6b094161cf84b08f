use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use super::Signup;
use super::SignupStore;
use crate::domain::NewSignup;

/// Stand-in for Postgres in unit tests. The `DashMap` entry lock gives the same
/// per-email atomicity as `ON CONFLICT`.
#[derive(Default)]
pub struct InMemorySignupStore {
    /// email -> (insertion order, row); the order breaks `created_at` ties
    rows: DashMap<String, (u64, Signup)>,
    next_seq: AtomicU64,
    broken: AtomicBool,
}

impl InMemorySignupStore {
    /// Make every subsequent call fail, like a dropped db connection
    pub fn break_connection(&self) { self.broken.store(true, Ordering::SeqCst); }

    fn check_connection(&self) -> Result<(), anyhow::Error> {
        match self.broken.load(Ordering::SeqCst) {
            true => Err(anyhow::anyhow!("connection refused")),
            false => Ok(()),
        }
    }
}

#[async_trait]
impl SignupStore for InMemorySignupStore {
    async fn upsert(
        &self,
        signup: &NewSignup,
    ) -> Result<Signup, anyhow::Error> {
        self.check_connection()?;
        let refresh = |row: &mut Signup| {
            row.source = signup.source.as_ref().to_string();
            row.ip_address = signup.client.ip_address.clone();
            row.user_agent = signup.client.user_agent.clone();
            row.referrer = signup.client.referrer.clone();
            row.utm_source = signup.utm.source.clone();
            row.utm_medium = signup.utm.medium.clone();
            row.utm_campaign = signup.utm.campaign.clone();
        };
        let row = match self.rows.entry(signup.email.as_ref().to_string()) {
            Entry::Occupied(mut e) => {
                refresh(&mut e.get_mut().1);
                e.get().1.clone()
            }
            Entry::Vacant(e) => {
                let mut row = Signup {
                    id: Uuid::new_v4(),
                    email: signup.email.as_ref().to_string(),
                    source: String::new(),
                    ip_address: String::new(),
                    user_agent: None,
                    referrer: None,
                    utm_source: None,
                    utm_medium: None,
                    utm_campaign: None,
                    created_at: Utc::now(),
                };
                refresh(&mut row);
                let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
                e.insert((seq, row.clone()));
                row
            }
        };
        Ok(row)
    }

    async fn find_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Signup>, anyhow::Error> {
        self.check_connection()?;
        Ok(self.rows.get(email).map(|r| r.value().1.clone()))
    }

    async fn count(&self) -> Result<i64, anyhow::Error> {
        self.check_connection()?;
        Ok(self.rows.len().try_into()?)
    }

    async fn list_newest(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Signup>, anyhow::Error> {
        self.check_connection()?;
        let mut rows: Vec<(u64, Signup)> = self.rows.iter().map(|r| r.value().clone()).collect();
        rows.sort_by(|(a_seq, a), (b_seq, b)| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b_seq.cmp(a_seq))
        });
        Ok(rows
            .into_iter()
            .skip(offset.try_into()?)
            .take(limit.try_into()?)
            .map(|(_, row)| row)
            .collect())
    }
}

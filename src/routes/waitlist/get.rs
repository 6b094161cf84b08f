use std::fmt::Debug;

use actix_web::http::StatusCode;
use actix_web::web;
use actix_web::HttpRequest;
use actix_web::HttpResponse;
use actix_web::ResponseError;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::admission::method_not_allowed;
use crate::authentication::AdminKey;
use crate::routes::error_chain_fmt;
use crate::store::Signup;
use crate::store::SignupStore;
use crate::utils::json_message;

const DEFAULT_PAGE: i64 = 1;
const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 100;

/// Raw query params; anything that is not an integer falls back to the default
#[derive(Deserialize, Default)]
pub struct ListParams {
    page: Option<String>,
    limit: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl From<ListParams> for Pagination {
    fn from(params: ListParams) -> Self {
        let int = |v: Option<String>| v.and_then(|v| v.trim().parse::<i64>().ok());
        Self {
            page: int(params.page).unwrap_or(DEFAULT_PAGE).max(1),
            limit: int(params.limit)
                .unwrap_or(DEFAULT_LIMIT)
                .clamp(1, MAX_LIMIT),
        }
    }
}

impl Pagination {
    pub fn from_query(query: &str) -> Self {
        web::Query::<ListParams>::from_query(query)
            .map(web::Query::into_inner)
            .unwrap_or_default()
            .into()
    }

    pub fn offset(&self) -> i64 { (self.page - 1).saturating_mul(self.limit) }

    pub fn pages(
        &self,
        total: i64,
    ) -> i64 {
        (total + self.limit - 1) / self.limit
    }
}

/// A signup as shown to admins; request metadata (ip, user agent, referrer) is
/// left out
#[derive(Serialize, Debug)]
pub struct ListedSignup {
    pub id: Uuid,
    pub email: String,
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
}

impl From<Signup> for ListedSignup {
    fn from(s: Signup) -> Self {
        Self {
            id: s.id,
            email: s.email,
            source: s.source,
            created_at: s.created_at,
            utm_source: s.utm_source,
            utm_medium: s.utm_medium,
            utm_campaign: s.utm_campaign,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct SignupListing {
    pub signups: Vec<ListedSignup>,
    pub total: i64,
    pub page: i64,
    pub pages: i64,
}

#[derive(thiserror::Error)]
pub enum AdminError {
    // indistinguishable from a wrong method, so the endpoint does not reveal
    // that an admin mode exists
    #[error("Method Not Allowed")]
    Unauthorized(#[source] anyhow::Error),
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl Debug for AdminError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for AdminError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::UnexpectedError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            Self::Unauthorized(_) => method_not_allowed(),
            Self::UnexpectedError(_) => json_message(self.status_code(), "Internal server error"),
        }
    }
}

/// `GET /api/waitlist?page=1&limit=50`
///
/// Requires `x-admin-key`. Newest signups first.
///
/// ```sh
///     curl -H 'x-admin-key: ...' 'http://127.0.0.1:8000/api/waitlist?page=2&limit=10'
/// ```
#[tracing::instrument(name = "Listing waitlist signups", skip(request, store, admin_key))]
pub async fn list_signups(
    request: HttpRequest,
    store: web::Data<dyn SignupStore>,
    admin_key: web::Data<AdminKey>,
) -> Result<HttpResponse, AdminError> {
    admin_key
        .verify(request.headers())
        .map_err(AdminError::Unauthorized)?;

    let pagination = Pagination::from_query(request.query_string());
    let (signups, total) = tokio::try_join!(
        store.list_newest(pagination.offset(), pagination.limit),
        store.count(),
    )?;

    Ok(HttpResponse::Ok().json(SignupListing {
        signups: signups.into_iter().map(ListedSignup::from).collect(),
        total,
        page: pagination.page,
        pages: pagination.pages(total),
    }))
}

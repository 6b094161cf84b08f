use std::fmt::Debug;
use std::time::Duration;

use actix_web::http::header;
use actix_web::http::header::HeaderName;
use actix_web::http::header::HeaderValue;
use actix_web::http::StatusCode;
use actix_web::web;
use actix_web::HttpRequest;
use actix_web::HttpResponse;
use actix_web::ResponseError;
use serde::Deserialize;
use serde_json::json;

use crate::domain::ClientMetadata;
use crate::domain::NewSignup;
use crate::domain::SignupEmail;
use crate::domain::SignupSource;
use crate::domain::UtmTags;
use crate::domain::UNKNOWN_CLIENT;
use crate::rate_limit::RateLimitDecision;
use crate::rate_limit::RateLimiter;
use crate::routes::error_chain_fmt;
use crate::store::SignupStore;
use crate::utils::json_message;

/// Body of `POST /api/waitlist`. Unknown fields are ignored.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct WaitlistForm {
    email: Option<String>,
    source: Option<String>,
    utm_source: Option<String>,
    utm_medium: Option<String>,
    utm_campaign: Option<String>,
    /// Honeypot: hidden in the form, so real visitors never fill it in
    website: Option<String>,
}

impl WaitlistForm {
    /// Two distinct failures: a body that is not JSON at all, and JSON that
    /// does not have the expected shape.
    pub fn from_body(body: &[u8]) -> Result<Self, WaitlistError> {
        let value: serde_json::Value =
            serde_json::from_slice(body).map_err(WaitlistError::MalformedJson)?;
        serde_json::from_value(value)
            .map_err(|_| WaitlistError::ValidationError("Invalid request body".to_string()))
    }

    pub fn trips_honeypot(&self) -> bool { self.website.as_ref().is_some_and(|w| !w.is_empty()) }

    /// Parse the visitor-supplied fields; the `Err` is the first offending
    /// field's message.
    pub fn parse(
        self,
        client: ClientMetadata,
    ) -> Result<NewSignup, String> {
        let email = SignupEmail::parse(self.email.as_deref().ok_or("Email is required")?)?;
        Ok(NewSignup {
            email,
            source: SignupSource::parse(self.source.as_deref()),
            utm: UtmTags::parse(
                self.utm_source.as_deref(),
                self.utm_medium.as_deref(),
                self.utm_campaign.as_deref(),
            ),
            client,
        })
    }
}

#[derive(thiserror::Error)]
pub enum WaitlistError {
    #[error("Invalid JSON")]
    MalformedJson(#[source] serde_json::Error),
    #[error("{0}")]
    ValidationError(String),
    #[error("Too many requests. Please try again in a minute.")]
    RateLimited { retry_after: Duration },
    // never shown to the client; see `error_response`
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl Debug for WaitlistError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for WaitlistError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::MalformedJson(_) | Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::UnexpectedError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            Self::UnexpectedError(_) => {
                json_message(self.status_code(), "Something went wrong. Please try again.")
            }
            Self::RateLimited { retry_after } => {
                let mut resp = json_message(self.status_code(), &self.to_string());
                // whole seconds, rounded up
                let seconds = (*retry_after + Duration::from_millis(999)).as_secs().max(1);
                resp.headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
                resp
            }
            _ => json_message(self.status_code(), &self.to_string()),
        }
    }
}

/// Best-effort client address: first hop of `X-Forwarded-For`, then
/// `X-Real-IP`, then the peer address of the connection.
pub fn client_ip(request: &HttpRequest) -> String {
    let get_header = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
    };
    get_header("x-forwarded-for")
        .and_then(|xff| {
            xff.split(',')
                .next()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
        })
        .or_else(|| get_header("x-real-ip"))
        .or_else(|| request.peer_addr().map(|a| a.ip().to_string()))
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

fn client_metadata(request: &HttpRequest) -> ClientMetadata {
    let get_header = move |name: HeaderName| {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
    };
    ClientMetadata::new(
        client_ip(request),
        get_header(header::USER_AGENT),
        get_header(header::REFERER),
    )
}

/// `POST /api/waitlist`
///
/// Runs after the admission middleware (method gate, origin check). Then:
///
///     1. rate limit per client address
///     2. body parsed as JSON, then validated
///     3. honeypot filled -> 204, nothing stored
///     4. upsert by email
///
/// The response is the same whether or not the email was already on the
/// waitlist.
///
/// # Request example
///
/// ```sh
///     curl -v -H 'Content-Type: application/json' \
///         --data '{"email": "john@foo.com", "source": "footer"}' \
///         http://127.0.0.1:8000/api/waitlist
/// ```
#[tracing::instrument(
    name = "Joining waitlist",
    skip(body, request, store, limiter),
    fields(
        client_ip=tracing::field::Empty,
        signup_email=tracing::field::Empty,
    )
)]
pub async fn join_waitlist(
    body: web::Bytes,
    request: HttpRequest,
    store: web::Data<dyn SignupStore>,
    limiter: web::Data<RateLimiter>,
) -> Result<HttpResponse, WaitlistError> {
    let client = client_metadata(&request);
    tracing::Span::current().record("client_ip", tracing::field::display(&client.ip_address));

    if let RateLimitDecision::Limited { retry_after } = limiter.check(&client.ip_address) {
        return Err(WaitlistError::RateLimited { retry_after });
    }

    let form = WaitlistForm::from_body(&body)?;
    let is_bot = form.trips_honeypot();
    let new_signup = form.parse(client).map_err(WaitlistError::ValidationError)?;

    tracing::Span::current().record(
        "signup_email",
        tracing::field::display(new_signup.email.as_ref()),
    );

    if is_bot {
        // looks like a success to the bot
        tracing::info!("honeypot field filled in, not storing signup");
        return Ok(HttpResponse::NoContent().finish());
    }

    store.upsert(&new_signup).await?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true })))
}

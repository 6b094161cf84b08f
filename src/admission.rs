//! Method gate, origin admission and response headers for `/api/*`.
//!
//! Everything rejected here gets a deliberately uninformative response: a
//! caller cannot tell a bad origin apart from a bot that was filtered out.

use std::collections::HashSet;

use actix_web::body::BoxBody;
use actix_web::body::MessageBody;
use actix_web::dev::ServiceRequest;
use actix_web::dev::ServiceResponse;
use actix_web::http::header;
use actix_web::http::header::HeaderMap;
use actix_web::http::header::HeaderValue;
use actix_web::http::Method;
use actix_web::http::StatusCode;
use actix_web::web;
use actix_web::HttpResponse;
use actix_web_lab::middleware::Next;

use crate::configuration::Settings;
use crate::utils::json_message;

pub const ALLOWED_METHODS: &str = "POST, OPTIONS";
pub const ALLOWED_HEADERS: &str = "Content-Type, X-Turnstile-Token, x-admin-key";

/// Exact-match set of origins (scheme + host) that may receive CORS-enabled
/// responses.
#[derive(Debug, Clone, Default)]
pub struct AllowedOrigins(HashSet<String>);

impl AllowedOrigins {
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(origins.into_iter().map(Into::into).collect())
    }

    /// Static allow-list, plus the preview deployment's own origin outside
    /// production
    pub fn from_settings(cfg: &Settings) -> Self {
        let mut origins = Self::new(cfg.cors.allowed_origins.iter().cloned());
        if let Some(preview) = cfg.deployment.preview_origin() {
            origins.0.insert(preview);
        }
        origins
    }

    pub fn contains(
        &self,
        origin: &str,
    ) -> bool {
        self.0.contains(origin)
    }

    /// A request without `Origin` is same-origin (or not from a browser), and is
    /// admitted. An `Origin` that is not valid UTF-8 can never match.
    pub fn admits(
        &self,
        origin: Option<&HeaderValue>,
    ) -> bool {
        match origin {
            None => true,
            Some(o) => o.to_str().is_ok_and(|o| self.contains(o)),
        }
    }
}

/// Set CORS and security headers. `Access-Control-Allow-Origin` echoes the
/// request's origin only if it is allow-listed (never `*`, so that credentialed
/// requests keep working).
pub fn set_response_headers(
    headers: &mut HeaderMap,
    origin: Option<&HeaderValue>,
    allowed: &AllowedOrigins,
) {
    if let Some(origin) = origin.filter(|o| allowed.admits(Some(*o))) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
    }
    let fixed = [
        (header::VARY, "Origin"),
        (header::ACCESS_CONTROL_ALLOW_METHODS, ALLOWED_METHODS),
        (header::ACCESS_CONTROL_ALLOW_HEADERS, ALLOWED_HEADERS),
        (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        (header::X_FRAME_OPTIONS, "SAMEORIGIN"),
        (header::REFERRER_POLICY, "strict-origin-when-cross-origin"),
    ];
    for (name, value) in fixed {
        headers.insert(name, HeaderValue::from_static(value));
    }
}

/// The response for any method this endpoint does not serve (and for admin
/// requests without a valid key)
pub fn method_not_allowed() -> HttpResponse {
    json_message(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
}

/// Middleware for the `/api` scope. In order:
///
/// 1. `OPTIONS` -> 204 (preflight), never reaches a handler
/// 2. anything but `POST`/`GET` -> 405
/// 3. `Origin` present but not allow-listed -> 204, empty
/// 4. the handler
///
/// The response headers (see `set_response_headers`) are added on every path,
/// including handler errors.
///
/// For more details, refer to the documentation for
/// `actix_web_lab::middleware::from_fn`
pub async fn admission(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<BoxBody>, actix_web::Error> {
    let allowed = req
        .app_data::<web::Data<AllowedOrigins>>()
        .cloned()
        .unwrap_or_else(|| web::Data::new(AllowedOrigins::default()));
    let origin = req.headers().get(header::ORIGIN).cloned();

    let method = req.method().clone();

    let mut res = match method {
        Method::OPTIONS => req.into_response(HttpResponse::NoContent().finish()),
        Method::POST | Method::GET => match allowed.admits(origin.as_ref()) {
            true => {
                let http_req = req.request().clone();
                match next.call(req).await {
                    Ok(res) => res.map_into_boxed_body(),
                    Err(e) => ServiceResponse::from_err(e, http_req),
                }
            }
            false => {
                tracing::info!(origin = ?origin, "rejected request from unknown origin");
                req.into_response(HttpResponse::NoContent().finish())
            }
        },
        _ => req.into_response(method_not_allowed()),
    };

    set_response_headers(res.headers_mut(), origin.as_ref(), &allowed);
    Ok(res)
}

use actix_web::HttpResponse;

/// `GET /health_check`
///
/// Used by the hosting platform's liveness probe. Does not touch the db.
///
/// Note: viewing http response requires `curl -v`
pub async fn health_check() -> HttpResponse { HttpResponse::Ok().finish() }

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde_json::json;

/// `{"message": ...}` with the given status; the shape of every non-success
/// response body
pub fn json_message(
    status: StatusCode,
    message: &str,
) -> HttpResponse {
    HttpResponse::build(status).json(json!({ "message": message }))
}

use actix_web::{error, web, HttpResponse};
use shared::{ApiError, ValidationErrors};

pub mod challenges;
pub mod health;

/// Request bodies are small; anything larger is rejected
const JSON_BODY_LIMIT: usize = 16 * 1024;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .configure(health::configure)
        .configure(challenges::configure);
}

/// Malformed bodies become field-level validation errors
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(JSON_BODY_LIMIT)
        .error_handler(|err, _req| {
            let mut details = ValidationErrors::new();
            details.add("body", err.to_string());
            let response = HttpResponse::BadRequest().json(ApiError::validation(details));
            error::InternalError::from_response(err, response).into()
        })
}

pub async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(ApiError::new("not_found", "Route not found"))
}

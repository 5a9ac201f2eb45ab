use actix_web::dev::Payload;
use actix_web::http::StatusCode;
use actix_web::{web, FromRequest, HttpRequest, HttpResponse, ResponseError};
use shared::ApiError;
use std::future::{ready, Ready};
use uuid::Uuid;

use crate::models::AppState;
use crate::services::auth as auth_service;

/// Authenticated caller on whose behalf a challenge operation runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub device_id: String,
}

/// Extract the principal from the Authorization header
pub fn extract_principal(
    req: &HttpRequest,
    jwt_secret: &str,
) -> Result<Principal, AuthMiddlewareError> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .ok_or(AuthMiddlewareError::MissingToken)?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| AuthMiddlewareError::InvalidToken)?;

    let token = auth_str
        .strip_prefix("Bearer ")
        .ok_or(AuthMiddlewareError::InvalidToken)?;

    let (user_id, device_id) = auth_service::verify_jwt(token, jwt_secret)
        .map_err(|_| AuthMiddlewareError::InvalidToken)?;

    Ok(Principal { user_id, device_id })
}

#[derive(Debug)]
pub enum AuthMiddlewareError {
    MissingToken,
    InvalidToken,
}

impl std::fmt::Display for AuthMiddlewareError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMiddlewareError::MissingToken => write!(f, "Missing authorization token"),
            AuthMiddlewareError::InvalidToken => write!(f, "Invalid authorization token"),
        }
    }
}

impl std::error::Error for AuthMiddlewareError {}

impl ResponseError for AuthMiddlewareError {
    fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::Unauthorized().json(ApiError::new("unauthorized", self.to_string()))
    }
}

/// Rejects the request with 401 before any body is read
impl FromRequest for Principal {
    type Error = AuthMiddlewareError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let result = match req.app_data::<web::Data<AppState>>() {
            Some(state) => extract_principal(req, &state.config.jwt_secret),
            None => {
                log::error!("AppState missing; cannot verify token");
                Err(AuthMiddlewareError::InvalidToken)
            }
        };

        ready(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    const SECRET: &str = "middleware-test-secret";

    #[test]
    fn test_auth_error_display() {
        assert_eq!(
            AuthMiddlewareError::MissingToken.to_string(),
            "Missing authorization token"
        );
        assert_eq!(
            AuthMiddlewareError::InvalidToken.to_string(),
            "Invalid authorization token"
        );
    }

    #[test]
    fn test_extract_principal_from_bearer_token() {
        let user_id = Uuid::new_v4();
        let token = auth_service::create_jwt(&user_id, "laptop", SECRET, 1).unwrap();
        let req = TestRequest::default()
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_http_request();

        let principal = extract_principal(&req, SECRET).unwrap();
        assert_eq!(principal.user_id, user_id);
        assert_eq!(principal.device_id, "laptop");
    }

    #[test]
    fn test_extract_principal_missing_header() {
        let req = TestRequest::default().to_http_request();
        assert!(matches!(
            extract_principal(&req, SECRET),
            Err(AuthMiddlewareError::MissingToken)
        ));
    }

    #[test]
    fn test_extract_principal_rejects_other_schemes() {
        let req = TestRequest::default()
            .insert_header(("Authorization", "Basic dXNlcjpwYXNz"))
            .to_http_request();
        assert!(matches!(
            extract_principal(&req, SECRET),
            Err(AuthMiddlewareError::InvalidToken)
        ));
    }
}

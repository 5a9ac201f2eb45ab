use actix_web::{web, HttpResponse, Result};
use shared::{
    ActiveChallengeResponse, ApiError, ChallengeHistoryResponse, CreateChallengeRequest,
    CreateQuitRequest, QuitRequestLogResponse,
};
use uuid::Uuid;

use crate::middleware::Principal;
use crate::models::AppState;
use crate::services::challenges::{self as challenge_service, ChallengeError, CHALLENGE_NOT_FOUND};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/challenges")
            .route("", web::post().to(create_challenge))
            .route("", web::get().to(list_history))
            .route("/active", web::get().to(get_active_challenge))
            .route("/{id}/cancel", web::patch().to(cancel_challenge))
            .route("/{id}/quit-request", web::post().to(request_quit))
            .route("/{id}/quit-request", web::delete().to(cancel_quit_request))
            .route("/{id}/quit-requests", web::get().to(list_quit_requests)),
    );
}

/// Map a service error onto the HTTP response
fn error_response(err: ChallengeError, action: &str) -> HttpResponse {
    match err {
        ChallengeError::Validation(details) => {
            HttpResponse::BadRequest().json(ApiError::validation(details))
        }
        ChallengeError::Conflict(message) => {
            HttpResponse::Conflict().json(ApiError::new("conflict", message))
        }
        ChallengeError::NotFound(message) => {
            HttpResponse::NotFound().json(ApiError::new("not_found", message))
        }
        ChallengeError::Database(e) => {
            log::error!("Database error while trying to {}: {:?}", action, e);
            HttpResponse::InternalServerError().json(ApiError::new(
                "internal_error",
                format!("Failed to {}", action),
            ))
        }
    }
}

/// Unparseable ids are reported like unknown ones
fn parse_challenge_id(path: web::Path<String>) -> Option<Uuid> {
    Uuid::parse_str(&path.into_inner()).ok()
}

fn challenge_not_found() -> HttpResponse {
    HttpResponse::NotFound().json(ApiError::new("not_found", CHALLENGE_NOT_FOUND))
}

async fn create_challenge(
    principal: Principal,
    state: web::Data<AppState>,
    body: web::Json<CreateChallengeRequest>,
) -> Result<HttpResponse> {
    let now = state.clock.now();

    match challenge_service::create_challenge(
        &state.db,
        &principal,
        &body.into_inner(),
        now,
        state.config.timezone,
    )
    .await
    {
        Ok(challenge) => Ok(HttpResponse::Created().json(challenge)),
        Err(e) => Ok(error_response(e, "create challenge")),
    }
}

async fn get_active_challenge(
    principal: Principal,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let now = state.clock.now();

    match challenge_service::get_active_challenge(&state.db, &principal.user_id, now).await {
        Ok(challenge) => Ok(HttpResponse::Ok().json(ActiveChallengeResponse { challenge })),
        Err(e) => Ok(error_response(e, "fetch active challenge")),
    }
}

async fn list_history(principal: Principal, state: web::Data<AppState>) -> Result<HttpResponse> {
    let now = state.clock.now();

    match challenge_service::list_history(&state.db, &principal.user_id, now).await {
        Ok(challenges) => Ok(HttpResponse::Ok().json(ChallengeHistoryResponse { challenges })),
        Err(e) => Ok(error_response(e, "fetch challenge history")),
    }
}

async fn cancel_challenge(
    principal: Principal,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let Some(challenge_id) = parse_challenge_id(path) else {
        return Ok(challenge_not_found());
    };
    let now = state.clock.now();

    match challenge_service::cancel_challenge(&state.db, &principal.user_id, &challenge_id, now)
        .await
    {
        Ok(challenge) => Ok(HttpResponse::Ok().json(challenge)),
        Err(e) => Ok(error_response(e, "cancel challenge")),
    }
}

async fn request_quit(
    principal: Principal,
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<CreateQuitRequest>,
) -> Result<HttpResponse> {
    let Some(challenge_id) = parse_challenge_id(path) else {
        return Ok(challenge_not_found());
    };
    let now = state.clock.now();

    match challenge_service::request_quit(
        &state.db,
        &principal.user_id,
        &challenge_id,
        &body.into_inner(),
        now,
    )
    .await
    {
        Ok(challenge) => Ok(HttpResponse::Ok().json(challenge)),
        Err(e) => Ok(error_response(e, "request quit")),
    }
}

async fn cancel_quit_request(
    principal: Principal,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let Some(challenge_id) = parse_challenge_id(path) else {
        return Ok(challenge_not_found());
    };
    let now = state.clock.now();

    match challenge_service::cancel_quit_request(&state.db, &principal.user_id, &challenge_id, now)
        .await
    {
        Ok(challenge) => Ok(HttpResponse::Ok().json(challenge)),
        Err(e) => Ok(error_response(e, "cancel quit request")),
    }
}

async fn list_quit_requests(
    principal: Principal,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let Some(challenge_id) = parse_challenge_id(path) else {
        return Ok(challenge_not_found());
    };

    match challenge_service::list_quit_requests(&state.db, &principal.user_id, &challenge_id).await
    {
        Ok(quit_requests) => Ok(HttpResponse::Ok().json(QuitRequestLogResponse { quit_requests })),
        Err(e) => Ok(error_response(e, "fetch quit requests")),
    }
}

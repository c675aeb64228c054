use crate::auth::CurrentUser;
use crate::error::app_error::AppError;
use crate::middleware::ClientMeta;
use crate::models::login_attempt::LoginAttempt;
use crate::models::security_log::{SecurityLog, resources, security_events};
use crate::models::session::SessionResponse;
use crate::security::store::SecurityStore;
use crate::security::users::UserRegistry;
use rocket::serde::json::Json;
use rocket::{State, get, post, put};
use rocket_okapi::openapi;
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

const DEFAULT_PAGE: usize = 50;

fn require_view_reports(user: &CurrentUser) -> Result<(), AppError> {
    if user.permissions().view_reports { Ok(()) } else { Err(AppError::Forbidden) }
}

fn require_manage_users(user: &CurrentUser) -> Result<(), AppError> {
    if user.permissions().manage_users { Ok(()) } else { Err(AppError::Forbidden) }
}

/// Recent login attempts, newest first
#[openapi(tag = "Security")]
#[get("/attempts?<limit>")]
pub async fn get_login_attempts(
    store: &State<Arc<SecurityStore>>,
    current_user: CurrentUser,
    limit: Option<usize>,
) -> Result<Json<Vec<LoginAttempt>>, AppError> {
    require_view_reports(&current_user)?;
    Ok(Json(store.recent_login_attempts(limit.unwrap_or(DEFAULT_PAGE)).await))
}

/// Recent security audit events, newest first
#[openapi(tag = "Security")]
#[get("/events?<limit>")]
pub async fn get_security_events(
    store: &State<Arc<SecurityStore>>,
    current_user: CurrentUser,
    limit: Option<usize>,
) -> Result<Json<Vec<SecurityLog>>, AppError> {
    require_view_reports(&current_user)?;
    Ok(Json(store.recent_security_events(limit.unwrap_or(DEFAULT_PAGE)).await))
}

/// All currently usable sessions across users
#[openapi(tag = "Security")]
#[get("/sessions")]
pub async fn get_active_sessions(
    store: &State<Arc<SecurityStore>>,
    current_user: CurrentUser,
) -> Result<Json<Vec<SessionResponse>>, AppError> {
    require_manage_users(&current_user)?;
    let sessions = store.active_sessions().await;
    Ok(Json(sessions.iter().map(SessionResponse::from).collect()))
}

/// Prune attempts and audit entries past retention, and dead sessions
///
/// This is the manual refresh hook; pruning otherwise only happens at
/// startup.
#[openapi(tag = "Security")]
#[post("/cleanup")]
pub async fn post_cleanup(
    store: &State<Arc<SecurityStore>>,
    current_user: CurrentUser,
    client: ClientMeta,
) -> Result<rocket::http::Status, AppError> {
    require_manage_users(&current_user)?;

    store.cleanup_old_data().await;
    store
        .log_security_event(
            security_events::DATA_CLEANUP,
            resources::SECURITY,
            Some(current_user.id),
            true,
            None,
            &client.0,
        )
        .await;

    Ok(rocket::http::Status::Ok)
}

#[derive(Deserialize, Debug, JsonSchema)]
pub struct DisableRequest {
    pub disabled: bool,
}

/// Disable or re-enable an account
///
/// Disabled accounts are refused at login; existing sessions keep working
/// until they expire or are terminated.
#[openapi(tag = "Security")]
#[put("/accounts/<user_id>/disabled", data = "<payload>")]
pub async fn put_account_disabled(
    store: &State<Arc<SecurityStore>>,
    registry: &State<Arc<UserRegistry>>,
    current_user: CurrentUser,
    client: ClientMeta,
    user_id: &str,
    payload: Json<DisableRequest>,
) -> Result<rocket::http::Status, AppError> {
    require_manage_users(&current_user)?;

    let user_id = Uuid::parse_str(user_id).map_err(|_| AppError::BadRequest("Invalid user ID".to_string()))?;
    let updated = registry.set_disabled(user_id, payload.disabled).await?;

    let action = if payload.disabled {
        security_events::ACCOUNT_DISABLED
    } else {
        security_events::ACCOUNT_ENABLED
    };
    store
        .log_security_event(
            action,
            resources::ACCOUNT,
            Some(updated.id),
            true,
            Some(serde_json::json!({ "changed_by": current_user.id })),
            &client.0,
        )
        .await;

    Ok(rocket::http::Status::Ok)
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![
        get_login_attempts,
        get_security_events,
        get_active_sessions,
        post_cleanup,
        put_account_disabled
    ]
}

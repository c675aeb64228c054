use crate::auth::CurrentUser;
use crate::error::app_error::AppError;
use crate::middleware::ClientMeta;
use crate::models::session::SessionResponse;
use crate::security::store::SecurityStore;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, delete, get};
use rocket_okapi::openapi;
use std::sync::Arc;
use uuid::Uuid;

/// List the caller's usable sessions across devices
#[openapi(tag = "Sessions")]
#[get("/")]
pub async fn list_sessions(store: &State<Arc<SecurityStore>>, current_user: CurrentUser) -> Json<Vec<SessionResponse>> {
    let sessions = store.sessions_for_user(current_user.id).await;
    Json(sessions.iter().map(SessionResponse::from).collect())
}

/// Terminate one of the caller's sessions
///
/// Terminating an unknown or already-terminated session succeeds without
/// effect, so retries are safe.
#[openapi(tag = "Sessions")]
#[delete("/<session_id>")]
pub async fn delete_session(
    store: &State<Arc<SecurityStore>>,
    current_user: CurrentUser,
    client: ClientMeta,
    session_id: &str,
) -> Result<Status, AppError> {
    let session_id = Uuid::parse_str(session_id).map_err(|_| AppError::BadRequest("Invalid session ID".to_string()))?;

    store.terminate_session(session_id, Some(current_user.id), &client.0).await;
    Ok(Status::NoContent)
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![list_sessions, delete_session]
}

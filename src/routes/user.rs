use crate::auth::CurrentUser;
use crate::error::app_error::AppError;
use crate::middleware::ClientMeta;
use crate::models::login_attempt::FailureReason;
use crate::models::security_log::{resources, security_events};
use crate::models::session::SessionResponse;
use crate::models::user::{CreateUserRequest, LoginRequest, LoginResponse, UserResponse};
use crate::security::password;
use crate::security::store::SecurityStore;
use crate::security::users::UserRegistry;
use chrono::Duration;
use rocket::http::{Cookie, CookieJar, Status};
use rocket::response::status::Created;
use rocket::{State, post};
use rocket::serde::json::Json;
use rocket_okapi::openapi;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Register a new account
#[openapi(tag = "Users")]
#[post("/", data = "<payload>")]
pub async fn post_user(
    registry: &State<Arc<UserRegistry>>,
    store: &State<Arc<SecurityStore>>,
    client: ClientMeta,
    payload: Json<CreateUserRequest>,
) -> Result<Created<Json<UserResponse>>, AppError> {
    payload.validate()?;

    let user = registry.create_user(&payload.name, &payload.email, &payload.password, payload.role).await?;
    store
        .log_security_event(
            security_events::USER_REGISTERED,
            resources::ACCOUNT,
            Some(user.id),
            true,
            None,
            &client.0,
        )
        .await;

    Ok(Created::new(format!("/users/{}", user.id)).body(Json(UserResponse::from(&user))))
}

/// Authenticate and open a session
///
/// The lockout gate runs before credentials are checked, so a locked account
/// is refused even with the correct password until the window expires.
#[openapi(tag = "Users")]
#[post("/login", data = "<payload>")]
pub async fn post_user_login(
    registry: &State<Arc<UserRegistry>>,
    store: &State<Arc<SecurityStore>>,
    client: ClientMeta,
    cookies: &CookieJar<'_>,
    payload: Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let email = payload.email.trim();

    if store.is_user_locked(email).await {
        let remaining = store.lockout_remaining(email).await;
        store
            .log_login_attempt(email, false, Some(FailureReason::AccountLocked), &client.0)
            .await;
        return Err(AppError::AccountLocked(format_lockout_remaining(remaining)));
    }

    let user = match registry.find_by_email(email).await {
        Some(user) => user,
        None => {
            password::dummy_verify(&payload.password);
            store
                .log_login_attempt(email, false, Some(FailureReason::UserNotFound), &client.0)
                .await;
            return Err(AppError::InvalidCredentials);
        }
    };

    if user.disabled {
        store
            .log_login_attempt(email, false, Some(FailureReason::AccountDisabled), &client.0)
            .await;
        return Err(AppError::AccountDisabled);
    }

    if password::verify_password(&user.password_hash, &payload.password).is_err() {
        store
            .log_login_attempt(email, false, Some(FailureReason::InvalidPassword), &client.0)
            .await;

        // This failure may have been the one that crossed the threshold
        if store.is_user_locked(email).await {
            store
                .log_security_event(
                    security_events::ACCOUNT_LOCKED,
                    resources::AUTHENTICATION,
                    Some(user.id),
                    false,
                    Some(serde_json::json!({ "email": email })),
                    &client.0,
                )
                .await;
        }

        return Err(AppError::InvalidCredentials);
    }

    store.log_login_attempt(email, true, None, &client.0).await;

    let device_id = payload.device_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
    let session = store.create_session(user.id, device_id, payload.device_name.clone(), &client.0).await;
    store
        .log_security_event(
            security_events::USER_LOGIN,
            resources::AUTHENTICATION,
            Some(user.id),
            true,
            Some(serde_json::json!({ "session_id": session.id })),
            &client.0,
        )
        .await;

    let value = format!("{}:{}", session.id, user.id);
    cookies.add_private(Cookie::build(("session", value)).path("/").build());

    Ok(Json(LoginResponse {
        permissions: user.role.permissions(),
        session: SessionResponse::from(&session),
        user: UserResponse::from(&user),
    }))
}

/// Terminate the current session and clear the cookie
#[openapi(tag = "Users")]
#[post("/logout")]
pub async fn post_user_logout(
    store: &State<Arc<SecurityStore>>,
    current_user: CurrentUser,
    client: ClientMeta,
    cookies: &CookieJar<'_>,
) -> Status {
    store.terminate_session(current_user.session_id, Some(current_user.id), &client.0).await;
    store
        .log_security_event(
            security_events::USER_LOGOUT,
            resources::AUTHENTICATION,
            Some(current_user.id),
            true,
            None,
            &client.0,
        )
        .await;
    cookies.remove_private(Cookie::build("session").build());

    Status::Ok
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![post_user, post_user_login, post_user_logout]
}

fn format_lockout_remaining(remaining: Duration) -> String {
    let seconds = remaining.num_seconds().max(1);
    if seconds >= 60 {
        let minutes = (seconds + 59) / 60;
        format!("{} minute{}", minutes, if minutes == 1 { "" } else { "s" })
    } else {
        format!("{} second{}", seconds, if seconds == 1 { "" } else { "s" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{login, register, test_client};
    use rocket::http::Status;

    #[test]
    fn lockout_message_pluralizes() {
        assert_eq!(format_lockout_remaining(Duration::minutes(15)), "15 minutes");
        assert_eq!(format_lockout_remaining(Duration::seconds(61)), "2 minutes");
        assert_eq!(format_lockout_remaining(Duration::seconds(60)), "1 minute");
        assert_eq!(format_lockout_remaining(Duration::seconds(45)), "45 seconds");
        assert_eq!(format_lockout_remaining(Duration::zero()), "1 second");
    }

    #[rocket::async_test]
    async fn register_login_logout_flow() {
        let client = test_client().await;

        assert_eq!(register(&client, "Ada", "ada@school.example", "Abcdef1!", "teacher").await, Status::Created);

        let response = login(&client, "ada@school.example", "Abcdef1!").await;
        assert_eq!(response.0, Status::Ok);
        let body = response.1.expect("login response body");
        assert_eq!(body["user"]["email"], "ada@school.example");
        assert_eq!(body["user"]["role"], "teacher");
        assert_eq!(body["permissions"]["edit_grades"], true);
        assert_eq!(body["permissions"]["manage_school"], false);

        // The cookie authenticates further requests
        let response = client.get("/api/sessions").dispatch().await;
        assert_eq!(response.status(), Status::Ok);

        let response = client.post("/api/users/logout").dispatch().await;
        assert_eq!(response.status(), Status::Ok);

        let response = client.get("/api/sessions").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
    }

    #[rocket::async_test]
    async fn duplicate_registration_conflicts() {
        let client = test_client().await;

        assert_eq!(register(&client, "Ada", "ada@school.example", "Abcdef1!", "teacher").await, Status::Created);
        assert_eq!(register(&client, "Imposter", "Ada@School.example", "Abcdef1!", "parent").await, Status::Conflict);
    }

    #[rocket::async_test]
    async fn weak_password_is_rejected_at_registration() {
        let client = test_client().await;
        assert_eq!(register(&client, "Ada", "ada@school.example", "abc", "teacher").await, Status::BadRequest);
    }

    #[rocket::async_test]
    async fn unknown_user_gets_invalid_credentials() {
        let client = test_client().await;
        let (status, _) = login(&client, "nobody@school.example", "Abcdef1!").await;
        assert_eq!(status, Status::Forbidden);
    }

    #[rocket::async_test]
    async fn five_failures_lock_even_the_correct_password_out() {
        let client = test_client().await;
        register(&client, "Ada", "ada@school.example", "Abcdef1!", "teacher").await;

        for _ in 0..5 {
            let (status, _) = login(&client, "ada@school.example", "wrong-Pass1!").await;
            assert_eq!(status, Status::Forbidden);
        }

        // The gate now refuses before checking credentials
        let (status, _) = login(&client, "ada@school.example", "Abcdef1!").await;
        assert_eq!(status, Status::TooManyRequests);
    }

    #[rocket::async_test]
    async fn lockout_is_per_account() {
        let client = test_client().await;
        register(&client, "Ada", "ada@school.example", "Abcdef1!", "teacher").await;
        register(&client, "Grace", "grace@school.example", "Abcdef1!", "parent").await;

        for _ in 0..5 {
            login(&client, "ada@school.example", "wrong-Pass1!").await;
        }

        let (status, _) = login(&client, "grace@school.example", "Abcdef1!").await;
        assert_eq!(status, Status::Ok);
    }
}

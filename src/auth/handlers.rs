use std::sync::Arc;

use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, instrument, Instrument};

use crate::{
    auth::{
        dto::{
            ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, LoginResponse,
            MessageResponse, RegisterRequest, RegisterResponse, ResetPasswordRequest,
        },
        extractors::AuthUser,
        services::AuthService,
        validation::require_email,
    },
    error::AppError,
    extract::{parse_id, JsonBody},
    rate_limit::{limit_requests, RateLimiter},
    state::AppState,
    users::model::PublicUser,
};

pub const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account exists with this email, a password reset link will be sent";

pub fn auth_routes(login_limiter: Arc<RateLimiter>) -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route(
            "/auth/login",
            post(login).layer(middleware::from_fn_with_state(
                login_limiter,
                limit_requests,
            )),
        )
        .route("/auth/profile", get(profile))
        .route("/auth/change-password", post(change_password))
        .route("/auth/activate/:user_id", get(activate))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password/:token", post(reset_password))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let auth = AuthService::from_ref(&state);
    let user = auth
        .register(
            payload.email.as_deref().unwrap_or_default(),
            payload.password.as_deref().unwrap_or_default(),
            payload.name.as_deref().unwrap_or_default(),
        )
        .await?;

    let message = if user.is_active {
        "User created successfully"
    } else {
        let link = format!(
            "{}/api/auth/activate/{}",
            state.config.public_base_url, user.id
        );
        if let Err(e) = state.mailer.send_activation(&user.email, &link).await {
            error!(error = %e, user_id = %user.id, "activation email failed");
        }
        "User created successfully. Please check your email for activation instructions."
    };

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: message.into(),
            user: user.into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let outcome = AuthService::from_ref(&state)
        .login(
            payload.email.as_deref().unwrap_or_default(),
            payload.password.as_deref().unwrap_or_default(),
        )
        .await?;

    Ok(Json(LoginResponse {
        message: "Login successful".into(),
        token: outcome.token,
        user: outcome.user.into(),
    }))
}

#[instrument(skip(state))]
pub async fn profile(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<PublicUser>, AppError> {
    let user = AuthService::from_ref(&state)
        .get_profile(caller.user_id)
        .await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    caller: AuthUser,
    JsonBody(payload): JsonBody<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    AuthService::from_ref(&state)
        .change_password(
            caller.user_id,
            payload.current_password.as_deref().unwrap_or_default(),
            payload.new_password.as_deref().unwrap_or_default(),
        )
        .await?;
    Ok(Json(MessageResponse::new("Password updated successfully")))
}

#[instrument(skip(state))]
pub async fn activate(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let user_id = parse_id(&user_id, "Invalid activation link")?;
    AuthService::from_ref(&state).activate(user_id).await?;
    Ok(Json(MessageResponse::new("Account activated successfully")))
}

/// Answers identically whether or not the account exists. The lookup,
/// the reset record and the mail run after the response is sent.
#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let email = require_email(payload.email.as_deref(), "Valid email is required")?;
    tokio::spawn(deliver_password_reset(state, email).in_current_span());
    Ok(Json(MessageResponse::new(FORGOT_PASSWORD_MESSAGE)))
}

async fn deliver_password_reset(state: AppState, email: String) {
    let issued = match AuthService::from_ref(&state)
        .request_password_reset(Some(&email))
        .await
    {
        Ok(Some(issued)) => issued,
        Ok(None) => return,
        Err(e) => {
            error!(error = %e, "password reset could not be recorded");
            return;
        }
    };

    let link = format!(
        "{}/api/auth/reset-password/{}",
        state.config.public_base_url, issued.raw_token
    );
    if let Err(e) = state
        .mailer
        .send_password_reset(&issued.email, &link)
        .await
    {
        error!(error = %e, "password reset email failed");
    }
}

#[instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    JsonBody(payload): JsonBody<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    AuthService::from_ref(&state)
        .reset_password(&token, payload.new_password.as_deref().unwrap_or_default())
        .await?;
    Ok(Json(MessageResponse::new(
        "Password has been reset successfully",
    )))
}

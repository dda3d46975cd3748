use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};

use crate::auth::{create_session_token, AppJson, AppState, CurrentUser};
use crate::error::{AppError, AppResult};
use crate::models::{LoginRequest, LoginResponse, SessionResponse};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/session", get(session))
}

async fn login(
    State(state): State<AppState>,
    AppJson(request): AppJson<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let username = request.username.trim();
    if username.is_empty() || request.token.is_empty() {
        return Err(AppError::BadRequest(
            "Username and token are required".to_string(),
        ));
    }

    if !state.tokens.user_exists(username)? {
        return Err(AppError::Authentication("Invalid username".to_string()));
    }

    if !state.tokens.verify_access_code(username, &request.token)? {
        return Err(AppError::Authentication("Invalid access code".to_string()));
    }

    let token = create_session_token(username, &state.config)?;
    tracing::info!("User {} logged in", username);

    Ok(Json(LoginResponse {
        success: true,
        redirect_url: format!("/{}/viewer", username),
        token,
    }))
}

async fn session(user: CurrentUser) -> Json<SessionResponse> {
    Json(SessionResponse {
        is_logged_in: true,
        username: user.username,
    })
}

use crate::auth::jwt::decode_session_token;
use crate::config::Config;
use crate::dropbox::DropboxApi;
use crate::error::AppError;
use crate::store::TokenStore;
use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRef, FromRequest, FromRequestParts, Request},
    http::request::Parts,
    Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub tokens: Arc<dyn TokenStore>,
    pub dropbox: Arc<dyn DropboxApi>,
}

/// Gallery user identified by a session token, from the `Authorization: Bearer`
/// header or a `?token=` query parameter.
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub username: String,
}

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let mut token_str = TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
            .await
            .ok()
            .map(|TypedHeader(Authorization(bearer))| bearer.token().to_string());

        // Fall back to query parameter
        if token_str.is_none() {
            if let Some(query) = parts.uri.query() {
                if let Ok(params) = serde_urlencoded::from_str::<TokenQuery>(query) {
                    token_str = params.token;
                }
            }
        }

        let token = token_str.ok_or_else(|| AppError::Authentication("Unauthorized".to_string()))?;

        let claims = decode_session_token(&token, &app_state.config)
            .ok_or_else(|| AppError::Authentication("Unauthorized".to_string()))?;

        if !app_state.tokens.user_exists(&claims.sub)? {
            return Err(AppError::Authentication("Unauthorized".to_string()));
        }

        Ok(CurrentUser {
            username: claims.sub,
        })
    }
}

/// JSON body whose rejection renders as the usual `{"error": ..}` 400.
pub struct AppJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        Ok(AppJson(value))
    }
}

/// JSON body that must also pass its `validator` rules; both failures map to 400.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let AppJson(value) = AppJson::<T>::from_request(req, state).await?;

        value
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        Ok(ValidatedJson(value))
    }
}

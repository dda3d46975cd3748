mod auth;
mod dropbox;

use axum::Router;
use crate::auth::AppState;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(dropbox::router())
}

use axum::{
    extract::{Query, State},
    http::HeaderValue,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::auth::{AppState, CurrentUser, ValidatedJson};
use crate::constants::TOKEN_REFRESHED_HEADER;
use crate::dropbox::{
    batch_move_files, count_photos, find_duplicates, list_photos, DropboxCredentials,
    ListingOptions, TokenRefresher,
};
use crate::error::{AppError, AppResult};
use crate::models::{
    DuplicatesResponse, FolderQuery, MoveBatchRequest, PhotoCountResponse, PhotosQuery,
    PhotosResponse,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dropbox/photos", get(list_dropbox_photos))
        .route("/dropbox/photos/count", get(count_dropbox_photos))
        .route("/dropbox/move-batch", post(move_batch))
        .route("/dropbox/duplicates", get(dropbox_duplicates))
}

fn user_credentials(state: &AppState, username: &str) -> AppResult<DropboxCredentials> {
    let access_token = state.tokens.access_token(username)?.ok_or_else(|| {
        AppError::Internal("User configuration error: No Dropbox token found".to_string())
    })?;
    let refresh_token = state.tokens.refresh_token(username)?;

    Ok(DropboxCredentials::new(
        username,
        &access_token,
        refresh_token.as_deref(),
    ))
}

fn refreshed_json<T: Serialize>(body: T, token_refreshed: bool) -> Response {
    let mut response = Json(body).into_response();
    if token_refreshed {
        response
            .headers_mut()
            .insert(TOKEN_REFRESHED_HEADER, HeaderValue::from_static("true"));
    }
    response
}

async fn list_dropbox_photos(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<PhotosQuery>,
) -> AppResult<Response> {
    let filter = query.filter()?;
    let credentials = user_credentials(&state, &user.username)?;
    let refresher = TokenRefresher::new(state.dropbox.as_ref(), state.tokens.as_ref());
    let options = ListingOptions::from(&state.config.dropbox);

    let result = list_photos(
        &refresher,
        &credentials,
        &state.config.dropbox.photos_folder,
        query.cursor.as_deref().filter(|c| !c.is_empty()),
        &filter,
        &options,
    )
    .await?;

    let token_refreshed = result.token_refreshed();
    let page = result.data;

    Ok(refreshed_json(
        PhotosResponse {
            photos: page.photos,
            cursor: page.cursor,
            has_more: page.has_more,
            token_refreshed,
            dropped: page.dropped,
        },
        token_refreshed,
    ))
}

async fn count_dropbox_photos(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<FolderQuery>,
) -> AppResult<Response> {
    let folder = query
        .folder
        .unwrap_or_else(|| state.config.dropbox.photos_folder.clone());
    let credentials = user_credentials(&state, &user.username)?;
    let refresher = TokenRefresher::new(state.dropbox.as_ref(), state.tokens.as_ref());

    let result = count_photos(&refresher, &credentials, &folder).await?;
    let token_refreshed = result.token_refreshed();

    Ok(refreshed_json(
        PhotoCountResponse {
            count: result.data,
            folder_path: folder,
            token_refreshed,
        },
        token_refreshed,
    ))
}

async fn move_batch(
    State(state): State<AppState>,
    user: CurrentUser,
    ValidatedJson(request): ValidatedJson<MoveBatchRequest>,
) -> AppResult<Response> {
    let credentials = user_credentials(&state, &user.username)?;
    let refresher = TokenRefresher::new(state.dropbox.as_ref(), state.tokens.as_ref());

    let result = batch_move_files(
        &refresher,
        &credentials,
        &request.paths,
        &request.destination_folder,
    )
    .await?;
    let token_refreshed = result.token_refreshed();

    Ok(refreshed_json(result.data, token_refreshed))
}

async fn dropbox_duplicates(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<FolderQuery>,
) -> AppResult<Response> {
    let folder = query
        .folder
        .unwrap_or_else(|| state.config.dropbox.photos_folder.clone());
    let credentials = user_credentials(&state, &user.username)?;
    let refresher = TokenRefresher::new(state.dropbox.as_ref(), state.tokens.as_ref());

    let result = find_duplicates(
        &refresher,
        &credentials,
        &folder,
        state.config.dropbox.duplicate_suffix_len,
    )
    .await?;
    let token_refreshed = result.token_refreshed();

    Ok(refreshed_json(
        DuplicatesResponse {
            groups: result.data.groups,
            scanned: result.data.scanned,
            token_refreshed,
        },
        token_refreshed,
    ))
}

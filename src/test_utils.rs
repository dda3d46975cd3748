#![cfg(test)]

use crate::app::create_app;
use crate::auth::{create_session_token, AppState};
use crate::config::{Config, DropboxSettings};
use crate::database::{init_database, DbPool};
use crate::dropbox::{
    basename, DropboxApi, DropboxEntry, DropboxError, ListFolderPage, ThumbnailSize,
};
use crate::store::MemoryTokenStore;
use async_trait::async_trait;
use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Form, Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{TimeZone, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory SQLite pool with the schema applied. A single connection, since every
/// `:memory:` connection opens its own database.
pub fn create_test_db() -> DbPool {
    let manager = SqliteConnectionManager::memory();

    let pool = Pool::builder()
        .max_size(1)
        .build(manager)
        .expect("Failed to create test database pool");

    let conn = pool.get().expect("Failed to get connection from pool");
    init_database(&conn).expect("Failed to initialize test database schema");

    pool
}

pub fn file_entry(path: &str, size: u64) -> DropboxEntry {
    DropboxEntry {
        tag: "file".to_string(),
        id: format!("id:{}", path.to_lowercase()),
        name: basename(path).to_string(),
        path_display: Some(path.to_string()),
        path_lower: Some(path.to_lowercase()),
        size,
        client_modified: Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).single(),
        media_info: None,
    }
}

pub fn folder_entry(path: &str) -> DropboxEntry {
    DropboxEntry {
        tag: "folder".to_string(),
        id: format!("id:{}", path.to_lowercase()),
        name: basename(path).to_string(),
        path_display: Some(path.to_string()),
        path_lower: Some(path.to_lowercase()),
        size: 0,
        client_modified: None,
        media_info: None,
    }
}

/// Router over a `MemoryTokenStore` holding user `monica` (access code `sunflower`,
/// Dropbox tokens `dropbox-token` / `dropbox-refresh`).
pub fn create_test_app(api: ScriptedDropbox) -> Router {
    let store =
        MemoryTokenStore::with_user("monica", "sunflower", "dropbox-token", Some("dropbox-refresh"));
    create_test_app_with(api, store)
}

pub fn create_test_app_with(api: ScriptedDropbox, store: MemoryTokenStore) -> Router {
    create_app(AppState {
        config: Arc::new(Config::default()),
        tokens: Arc::new(store),
        dropbox: Arc::new(api),
    })
}

/// `Authorization` value carrying a session for `username` under the default config.
pub fn session_header(username: &str) -> HeaderValue {
    let token = create_session_token(username, &Config::default()).expect("Failed to sign session");
    HeaderValue::from_str(&format!("Bearer {}", token)).expect("Invalid header value")
}

fn bump_max(current: &AtomicUsize, max: &AtomicUsize) {
    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
    max.fetch_max(now, Ordering::SeqCst);
}

/// `DropboxApi` over an in-memory file list, with call counters and injectable failures.
/// Any token is accepted except the one marked expired.
pub struct ScriptedDropbox {
    files: Mutex<Vec<DropboxEntry>>,
    folders: Mutex<HashSet<String>>,
    page_size: usize,
    failing_thumbnails: HashSet<String>,
    failing_links: HashSet<String>,
    failing_moves: HashSet<String>,
    create_folder_fails: bool,
    expired_token: Option<String>,
    listing_accepts_expired: bool,
    refreshed_token: String,
    refresh_fails: bool,
    list_calls: AtomicUsize,
    link_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    create_folder_calls: AtomicUsize,
    move_calls: AtomicUsize,
    links_in_flight: AtomicUsize,
    max_links_in_flight: AtomicUsize,
    moves_in_flight: AtomicUsize,
    max_moves_in_flight: AtomicUsize,
}

impl ScriptedDropbox {
    pub fn new(paths: &[&str]) -> Self {
        let files = paths
            .iter()
            .map(|path| file_entry(path, basename(path).len() as u64 * 100))
            .collect();

        Self {
            files: Mutex::new(files),
            folders: Mutex::new(HashSet::new()),
            page_size: 100,
            failing_thumbnails: HashSet::new(),
            failing_links: HashSet::new(),
            failing_moves: HashSet::new(),
            create_folder_fails: false,
            expired_token: None,
            listing_accepts_expired: false,
            refreshed_token: "refreshed-token".to_string(),
            refresh_fails: false,
            list_calls: AtomicUsize::new(0),
            link_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            create_folder_calls: AtomicUsize::new(0),
            move_calls: AtomicUsize::new(0),
            links_in_flight: AtomicUsize::new(0),
            max_links_in_flight: AtomicUsize::new(0),
            moves_in_flight: AtomicUsize::new(0),
            max_moves_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_failing_thumbnail(mut self, path: &str) -> Self {
        self.failing_thumbnails.insert(path.to_lowercase());
        self
    }

    pub fn with_failing_link(mut self, path: &str) -> Self {
        self.failing_links.insert(path.to_lowercase());
        self
    }

    pub fn with_failing_move(mut self, path: &str) -> Self {
        self.failing_moves.insert(path.to_lowercase());
        self
    }

    pub fn with_folder(self, path: &str) -> Self {
        self.folders
            .lock()
            .expect("folders lock")
            .insert(path.to_lowercase());
        self
    }

    pub fn with_create_folder_failure(mut self) -> Self {
        self.create_folder_fails = true;
        self
    }

    /// Calls made with `token` fail with an authorization error.
    pub fn with_expired_token(mut self, token: &str) -> Self {
        self.expired_token = Some(token.to_string());
        self
    }

    /// The expired token still lists folders, so only per-file calls hit the refresh.
    pub fn with_token_expiring_after_listing(mut self) -> Self {
        self.listing_accepts_expired = true;
        self
    }

    pub fn with_refreshed_token(mut self, token: &str) -> Self {
        self.refreshed_token = token.to_string();
        self
    }

    pub fn with_refresh_failure(mut self) -> Self {
        self.refresh_fails = true;
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn link_calls(&self) -> usize {
        self.link_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn create_folder_calls(&self) -> usize {
        self.create_folder_calls.load(Ordering::SeqCst)
    }

    pub fn move_calls(&self) -> usize {
        self.move_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight_links(&self) -> usize {
        self.max_links_in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight_moves(&self) -> usize {
        self.max_moves_in_flight.load(Ordering::SeqCst)
    }

    pub fn has_file(&self, path: &str) -> bool {
        let lower = path.to_lowercase();
        self.files
            .lock()
            .expect("files lock")
            .iter()
            .any(|entry| entry.path_lower.as_deref() == Some(lower.as_str()))
    }

    fn check_token(&self, token: &str) -> Result<(), DropboxError> {
        match &self.expired_token {
            Some(expired) if expired == token => {
                Err(DropboxError::Auth("expired_access_token".to_string()))
            }
            _ => Ok(()),
        }
    }

    fn not_found(path: &str) -> DropboxError {
        DropboxError::Api {
            status: 409,
            body: format!("path/not_found/ {}", path),
        }
    }
}

#[async_trait]
impl DropboxApi for ScriptedDropbox {
    async fn list_folder(
        &self,
        token: &str,
        path: &str,
        cursor: Option<&str>,
    ) -> Result<ListFolderPage, DropboxError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if !self.listing_accepts_expired {
            self.check_token(token)?;
        }

        let offset = match cursor {
            None => 0,
            Some(cursor) => cursor
                .strip_prefix("cursor-")
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| DropboxError::Api {
                    status: 409,
                    body: "reset/".to_string(),
                })?,
        };

        let prefix = format!("{}/", path.trim_end_matches('/').to_lowercase());
        let matching: Vec<DropboxEntry> = self
            .files
            .lock()
            .expect("files lock")
            .iter()
            .filter(|entry| {
                entry
                    .path_lower
                    .as_deref()
                    .is_some_and(|p| p.starts_with(&prefix))
            })
            .cloned()
            .collect();

        let start = offset.min(matching.len());
        let end = (start + self.page_size).min(matching.len());

        Ok(ListFolderPage {
            entries: matching[start..end].to_vec(),
            cursor: format!("cursor-{}", end),
            has_more: end < matching.len(),
        })
    }

    async fn get_temporary_link(&self, token: &str, path: &str) -> Result<String, DropboxError> {
        self.link_calls.fetch_add(1, Ordering::SeqCst);
        self.check_token(token)?;

        bump_max(&self.links_in_flight, &self.max_links_in_flight);
        tokio::task::yield_now().await;
        self.links_in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_links.contains(&path.to_lowercase()) {
            return Err(DropboxError::Api {
                status: 409,
                body: "path/restricted_content/".to_string(),
            });
        }
        if self.has_file(path) {
            Ok(format!("https://dl.example.test{}", path))
        } else {
            Err(Self::not_found(path))
        }
    }

    async fn get_thumbnail(
        &self,
        token: &str,
        path: &str,
        size: ThumbnailSize,
    ) -> Result<String, DropboxError> {
        self.check_token(token)?;

        if self.failing_thumbnails.contains(&path.to_lowercase()) {
            return Err(DropboxError::Api {
                status: 409,
                body: "unsupported_image".to_string(),
            });
        }
        if !self.has_file(path) {
            return Err(Self::not_found(path));
        }

        let bytes = format!("thumb:{}", size.as_str());
        Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(bytes)))
    }

    async fn folder_status(&self, token: &str, path: &str) -> Result<bool, DropboxError> {
        self.check_token(token)?;
        Ok(self
            .folders
            .lock()
            .expect("folders lock")
            .contains(&path.to_lowercase()))
    }

    async fn create_folder(&self, token: &str, path: &str) -> Result<(), DropboxError> {
        self.check_token(token)?;
        self.create_folder_calls.fetch_add(1, Ordering::SeqCst);

        if self.create_folder_fails {
            return Err(DropboxError::Api {
                status: 403,
                body: "path/no_write_permission/".to_string(),
            });
        }

        self.folders
            .lock()
            .expect("folders lock")
            .insert(path.to_lowercase());
        Ok(())
    }

    async fn move_file(
        &self,
        token: &str,
        from_path: &str,
        to_path: &str,
    ) -> Result<(), DropboxError> {
        self.check_token(token)?;
        self.move_calls.fetch_add(1, Ordering::SeqCst);

        bump_max(&self.moves_in_flight, &self.max_moves_in_flight);
        tokio::task::yield_now().await;
        self.moves_in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_moves.contains(&from_path.to_lowercase()) {
            return Err(DropboxError::Api {
                status: 429,
                body: "too_many_write_operations".to_string(),
            });
        }

        let from_lower = from_path.to_lowercase();
        let mut files = self.files.lock().expect("files lock");
        let entry = files
            .iter_mut()
            .find(|entry| entry.path_lower.as_deref() == Some(from_lower.as_str()))
            .ok_or_else(|| Self::not_found(from_path))?;

        entry.name = basename(to_path).to_string();
        entry.path_display = Some(to_path.to_string());
        entry.path_lower = Some(to_path.to_lowercase());
        Ok(())
    }

    async fn refresh_access_token(&self, _refresh_token: &str) -> Result<String, DropboxError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);

        if self.refresh_fails {
            return Err(DropboxError::Refresh("400 - invalid_grant".to_string()));
        }
        Ok(self.refreshed_token.clone())
    }
}

const FAKE_PAGE_SIZE: usize = 2;
const FAKE_APP_KEY: &str = "fake-key";
const FAKE_APP_SECRET: &str = "fake-secret";
const FAKE_REFRESH_TOKEN: &str = "fake-refresh";

struct FakeState {
    files: Mutex<Vec<String>>,
    folders: Mutex<HashSet<String>>,
    access_token: Mutex<String>,
    rotations: AtomicUsize,
    last_list_body: Mutex<Option<Value>>,
}

impl FakeState {
    fn authorized(&self, headers: &HeaderMap) -> bool {
        let expected = format!(
            "Bearer {}",
            self.access_token.lock().expect("token lock")
        );
        headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == expected)
    }

    fn has_file(&self, path: &str) -> bool {
        let lower = path.to_lowercase();
        self.files
            .lock()
            .expect("files lock")
            .iter()
            .any(|p| p.to_lowercase() == lower)
    }

    fn listing(&self, folder: &str, offset: usize) -> Value {
        let prefix = format!("{}/", folder.trim_end_matches('/').to_lowercase());
        let matching: Vec<String> = self
            .files
            .lock()
            .expect("files lock")
            .iter()
            .filter(|p| p.to_lowercase().starts_with(&prefix))
            .cloned()
            .collect();

        let start = offset.min(matching.len());
        let end = (start + FAKE_PAGE_SIZE).min(matching.len());
        let entries: Vec<Value> = matching[start..end]
            .iter()
            .map(|path| {
                json!({
                    ".tag": "file",
                    "id": format!("id:{}", path.to_lowercase()),
                    "name": basename(path),
                    "path_display": path,
                    "path_lower": path.to_lowercase(),
                    "size": 1024,
                    "client_modified": "2023-06-01T12:00:00Z",
                })
            })
            .collect();

        json!({
            "entries": entries,
            "cursor": format!("fake:{}:{}", end, folder),
            "has_more": end < matching.len(),
        })
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        "{\"error_summary\": \"expired_access_token/\"}",
    )
        .into_response()
}

fn conflict(summary: &str) -> Response {
    (
        StatusCode::CONFLICT,
        Json(json!({ "error_summary": summary })),
    )
        .into_response()
}

fn path_arg(body: &Value, key: &str) -> String {
    body[key].as_str().unwrap_or_default().to_string()
}

async fn fake_list_folder(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    let folder = path_arg(&body, "path");
    *state.last_list_body.lock().expect("body lock") = Some(body);
    Json(state.listing(&folder, 0)).into_response()
}

async fn fake_list_folder_continue(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    let cursor = path_arg(&body, "cursor");
    let parsed = cursor
        .strip_prefix("fake:")
        .and_then(|rest| rest.split_once(':'))
        .and_then(|(offset, folder)| offset.parse::<usize>().ok().map(|o| (o, folder)));

    match parsed {
        Some((offset, folder)) => Json(state.listing(folder, offset)).into_response(),
        None => conflict("reset/"),
    }
}

async fn fake_temporary_link(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    let path = path_arg(&body, "path");
    if !state.has_file(&path) {
        return conflict("path/not_found/");
    }
    Json(json!({ "link": format!("https://dl.fake.test{}", path) })).into_response()
}

async fn fake_thumbnail(State(state): State<Arc<FakeState>>, headers: HeaderMap) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    let arg: Value = headers
        .get("Dropbox-API-Arg")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| serde_json::from_str(v).ok())
        .unwrap_or_default();

    let path = arg["resource"]["path"].as_str().unwrap_or_default();
    if !state.has_file(path) {
        return conflict("path/not_found/");
    }
    let size = arg["size"].as_str().unwrap_or_default();
    format!("thumb:{}", size).into_bytes().into_response()
}

async fn fake_get_metadata(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    let path = path_arg(&body, "path");
    if state
        .folders
        .lock()
        .expect("folders lock")
        .contains(&path.to_lowercase())
    {
        return Json(json!({ ".tag": "folder", "path_display": path })).into_response();
    }
    if state.has_file(&path) {
        return Json(json!({ ".tag": "file", "path_display": path })).into_response();
    }
    conflict("path/not_found/")
}

async fn fake_create_folder(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    let path = path_arg(&body, "path");
    if !state
        .folders
        .lock()
        .expect("folders lock")
        .insert(path.to_lowercase())
    {
        return conflict("path/conflict/folder/");
    }
    Json(json!({ "metadata": { "path_display": path } })).into_response()
}

async fn fake_move(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    let from = path_arg(&body, "from_path").to_lowercase();
    let to = path_arg(&body, "to_path");

    let mut files = state.files.lock().expect("files lock");
    match files.iter_mut().find(|p| p.to_lowercase() == from) {
        Some(path) => {
            *path = to.clone();
            Json(json!({ "metadata": { "path_display": to } })).into_response()
        }
        None => conflict("from_lookup/not_found/"),
    }
}

async fn fake_token(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let expected = format!(
        "Basic {}",
        STANDARD.encode(format!("{}:{}", FAKE_APP_KEY, FAKE_APP_SECRET))
    );
    let basic_ok = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected);

    let grant_ok = form.get("grant_type").map(String::as_str) == Some("refresh_token")
        && form.get("refresh_token").map(String::as_str) == Some(FAKE_REFRESH_TOKEN);

    if !basic_ok || !grant_ok {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_grant" })),
        )
            .into_response();
    }

    let n = state.rotations.fetch_add(1, Ordering::SeqCst) + 1;
    let token = format!("fake-access-{}", n);
    *state.access_token.lock().expect("token lock") = token.clone();

    Json(json!({
        "access_token": token,
        "token_type": "bearer",
        "expires_in": 14400,
    }))
    .into_response()
}

/// Handle to an in-process HTTP server imitating the Dropbox endpoints the client uses.
/// Listings come back two entries per page.
pub struct FakeDropboxServer {
    addr: SocketAddr,
    state: Arc<FakeState>,
}

impl FakeDropboxServer {
    pub fn settings(&self) -> DropboxSettings {
        DropboxSettings {
            app_key: FAKE_APP_KEY.to_string(),
            app_secret: FAKE_APP_SECRET.to_string(),
            api_base_url: format!("http://{}/2", self.addr),
            content_base_url: format!("http://{}/2", self.addr),
            token_url: format!("http://{}/oauth2/token", self.addr),
            timeout_seconds: 5,
            ..Default::default()
        }
    }

    pub fn access_token(&self) -> String {
        self.state.access_token.lock().expect("token lock").clone()
    }

    pub fn refresh_token(&self) -> String {
        FAKE_REFRESH_TOKEN.to_string()
    }

    pub fn last_list_body(&self) -> Option<Value> {
        self.state.last_list_body.lock().expect("body lock").clone()
    }

    pub fn has_file(&self, path: &str) -> bool {
        self.state.has_file(path)
    }
}

pub async fn spawn_fake_dropbox(paths: &[&str]) -> FakeDropboxServer {
    let state = Arc::new(FakeState {
        files: Mutex::new(paths.iter().map(|p| p.to_string()).collect()),
        folders: Mutex::new(HashSet::new()),
        access_token: Mutex::new("fake-access-0".to_string()),
        rotations: AtomicUsize::new(0),
        last_list_body: Mutex::new(None),
    });

    let app = Router::new()
        .route("/2/files/list_folder", post(fake_list_folder))
        .route("/2/files/list_folder/continue", post(fake_list_folder_continue))
        .route("/2/files/get_temporary_link", post(fake_temporary_link))
        .route("/2/files/get_thumbnail_v2", post(fake_thumbnail))
        .route("/2/files/get_metadata", post(fake_get_metadata))
        .route("/2/files/create_folder_v2", post(fake_create_folder))
        .route("/2/files/move_v2", post(fake_move))
        .route("/oauth2/token", post(fake_token))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind fake Dropbox");
    let addr = listener.local_addr().expect("Fake Dropbox address");

    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    FakeDropboxServer { addr, state }
}

use super::{non_empty, TokenStore};
use crate::auth::{hash_password, verify_password};
use crate::config::UserConfig;
use crate::database::{execute_query, fetch_one, queries, DbPool};
use crate::error::{AppError, AppResult};

pub struct SqliteTokenStore {
    pool: DbPool,
}

impl SqliteTokenStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn fetch_token(&self, sql: &str, username: &str) -> AppResult<Option<String>> {
        let conn = self.pool.get().map_err(AppError::Pool)?;
        let token: Option<Option<String>> = fetch_one(&conn, sql, &[&username], |row| row.get(0))?;
        Ok(token.flatten())
    }
}

impl TokenStore for SqliteTokenStore {
    fn user_exists(&self, username: &str) -> AppResult<bool> {
        let conn = self.pool.get().map_err(AppError::Pool)?;
        let found: Option<i64> =
            fetch_one(&conn, queries::users::CHECK_EXISTS, &[&username], |row| row.get(0))?;
        Ok(found.is_some())
    }

    fn verify_access_code(&self, username: &str, access_code: &str) -> AppResult<bool> {
        let conn = self.pool.get().map_err(AppError::Pool)?;
        let hash: Option<String> = fetch_one(
            &conn,
            queries::users::SELECT_ACCESS_CODE_HASH,
            &[&username],
            |row| row.get(0),
        )?;
        Ok(hash.is_some_and(|h| verify_password(access_code, &h)))
    }

    fn access_token(&self, username: &str) -> AppResult<Option<String>> {
        self.fetch_token(queries::users::SELECT_ACCESS_TOKEN, username)
    }

    fn refresh_token(&self, username: &str) -> AppResult<Option<String>> {
        self.fetch_token(queries::users::SELECT_REFRESH_TOKEN, username)
    }

    fn save_access_token(&self, username: &str, token: &str) -> AppResult<()> {
        let conn = self.pool.get().map_err(AppError::Pool)?;
        let updated = execute_query(
            &conn,
            queries::users::UPDATE_ACCESS_TOKEN,
            &[&token, &username],
        )?;

        if updated == 0 {
            return Err(AppError::NotFound(format!("Unknown user {}", username)));
        }
        Ok(())
    }

    fn seed_users(&self, users: &[UserConfig]) -> AppResult<()> {
        let conn = self.pool.get().map_err(AppError::Pool)?;

        for user in users {
            let access_code_hash = hash_password(&user.access_code)
                .map_err(|e| AppError::Internal(format!("Failed to hash access code: {}", e)))?;

            execute_query(
                &conn,
                queries::users::UPSERT,
                &[
                    &user.username,
                    &access_code_hash,
                    &non_empty(&user.dropbox_token),
                    &non_empty(&user.dropbox_refresh_token),
                ],
            )?;
        }

        Ok(())
    }
}

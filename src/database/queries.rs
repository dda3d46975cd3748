pub mod users {
    pub const CHECK_EXISTS: &str = r#"
    SELECT 1
      FROM users
     WHERE username = ?
    "#;

    pub const SELECT_ACCESS_CODE_HASH: &str = r#"
    SELECT access_code_hash
      FROM users
     WHERE username = ?
    "#;

    pub const SELECT_ACCESS_TOKEN: &str = r#"
    SELECT dropbox_access_token
      FROM users
     WHERE username = ?
    "#;

    pub const SELECT_REFRESH_TOKEN: &str = r#"
    SELECT dropbox_refresh_token
      FROM users
     WHERE username = ?
    "#;

    pub const UPDATE_ACCESS_TOKEN: &str = r#"
    UPDATE users
       SET dropbox_access_token = ?
         , updated_at = datetime('now')
     WHERE username = ?
    "#;

    pub const UPSERT: &str = r#"
    INSERT INTO users (
        username
      , access_code_hash
      , dropbox_access_token
      , dropbox_refresh_token
    ) VALUES (?, ?, ?, ?)
    ON CONFLICT (username) DO UPDATE
       SET access_code_hash = excluded.access_code_hash
         , dropbox_refresh_token = excluded.dropbox_refresh_token
         , dropbox_access_token = COALESCE(users.dropbox_access_token, excluded.dropbox_access_token)
         , updated_at = datetime('now')
    "#;
}

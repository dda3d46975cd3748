use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DropboxError {
    #[error("Dropbox API error: 401 - {0}")]
    Auth(String),

    #[error("Dropbox API error: {status} - {body}")]
    Api { status: u16, body: String },

    #[error("Dropbox connection failed: {0}")]
    Connection(String),

    #[error("Dropbox response could not be parsed: {0}")]
    Parse(String),

    #[error("Dropbox token refresh failed: {0}")]
    Refresh(String),
}

impl DropboxError {
    /// Failure signature that makes the refresh wrapper exchange the refresh token.
    pub fn is_auth_failure(&self) -> bool {
        if matches!(self, DropboxError::Auth(_) | DropboxError::Refresh(_)) {
            return true;
        }

        let message = self.to_string();
        message.contains("401") || message.contains("expired")
    }

    pub(crate) fn from_status(status: u16, body: String) -> Self {
        if status == 401 {
            DropboxError::Auth(body)
        } else {
            DropboxError::Api { status, body }
        }
    }
}

impl From<reqwest::Error> for DropboxError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DropboxError::Parse(err.to_string())
        } else {
            DropboxError::Connection(err.to_string())
        }
    }
}

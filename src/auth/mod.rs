mod extractors;
mod jwt;
mod password;

pub use extractors::{AppJson, AppState, CurrentUser, ValidatedJson};
pub use jwt::{create_session_token, decode_session_token, Claims};
pub use password::{hash_password, verify_password};

use crate::config::Config;
use crate::error::AppResult;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

const SESSION_TOKEN_TYPE: &str = "session";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    #[serde(rename = "type")]
    pub token_type: String,
}

pub fn create_session_token(username: &str, config: &Config) -> AppResult<String> {
    let expiration = Utc::now() + Duration::minutes(config.security.session_expire_minutes);

    let claims = Claims {
        sub: username.to_string(),
        exp: expiration.timestamp(),
        token_type: SESSION_TOKEN_TYPE.to_string(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.security.secret_key.as_bytes()),
    )?;

    Ok(token)
}

pub fn decode_session_token(token: &str, config: &Config) -> Option<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.security.secret_key.as_bytes()),
        &Validation::default(),
    )
    .ok()?;

    (data.claims.token_type == SESSION_TOKEN_TYPE).then_some(data.claims)
}

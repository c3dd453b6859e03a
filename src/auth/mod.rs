pub mod password;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SecurityConfig;
use crate::database::models::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Admin id.
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(sub: Uuid, email: String, role: Role, expiry_hours: u64) -> Self {
        let now = Utc::now();
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            sub,
            email,
            role,
            exp,
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Invalid JWT secret")]
    InvalidSecret,

    #[error("{0}")]
    Invalid(String),
}

pub fn generate_jwt(claims: &Claims, security: &SecurityConfig) -> Result<String, JwtError> {
    if security.jwt_secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(security.jwt_secret.as_bytes());

    encode(&Header::default(), claims, &encoding_key)
        .map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

/// Validate signature and expiry, returning the embedded claims.
pub fn validate_jwt(token: &str, security: &SecurityConfig) -> Result<Claims, JwtError> {
    if security.jwt_secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let decoding_key = DecodingKey::from_secret(security.jwt_secret.as_bytes());
    let token_data = decode::<Claims>(token, &decoding_key, &Validation::default())
        .map_err(|e| JwtError::Invalid(format!("Invalid JWT token: {}", e)))?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn token_round_trips_claims() {
        let security = AppConfig::development().security;
        let id = Uuid::new_v4();
        let claims = Claims::new(id, "chef@example.org".into(), Role::SuperAdmin, 1);

        let token = generate_jwt(&claims, &security).unwrap();
        let decoded = validate_jwt(&token, &security).unwrap();

        assert_eq!(decoded.sub, id);
        assert_eq!(decoded.role, Role::SuperAdmin);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let mut security = AppConfig::development().security;
        let claims = Claims::new(Uuid::new_v4(), "a@example.org".into(), Role::Admin, 1);
        let token = generate_jwt(&claims, &security).unwrap();

        security.jwt_secret = "another-secret".into();
        assert!(matches!(validate_jwt(&token, &security), Err(JwtError::Invalid(_))));
    }

    #[test]
    fn expired_token_is_rejected() {
        let security = AppConfig::development().security;
        let mut claims = Claims::new(Uuid::new_v4(), "a@example.org".into(), Role::Admin, 1);
        claims.iat -= 7200;
        claims.exp = Utc::now().timestamp() - 3600;

        let token = generate_jwt(&claims, &security).unwrap();
        assert!(validate_jwt(&token, &security).is_err());
    }
}

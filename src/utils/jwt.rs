use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::JwtConfig;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i32,        // user_id
    pub email: String,
    pub is_staff: bool,  // accès aux routes /api/admin
    pub exp: i64,        // expiration timestamp
}

/// Génère un JWT token pour un utilisateur
pub fn generate_token(
    config: &JwtConfig,
    user_id: i32,
    email: &str,
    is_staff: bool,
) -> Result<String, String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(config.ttl_hours))
        .ok_or("Failed to calculate expiration")?
        .timestamp();

    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        is_staff,
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_ref()),
    )
        .map_err(|e| format!("Failed to generate token: {}", e))
}

/// Vérifie et décode un JWT token
pub fn verify_token(config: &JwtConfig, token: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_ref()),
        &Validation::new(Algorithm::HS256),
    )
        .map(|data| data.claims)
        .map_err(|e| format!("Invalid token: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> JwtConfig {
        JwtConfig {
            secret: "unit-test-secret".to_string(),
            ttl_hours: 1,
        }
    }

    #[test]
    fn test_generate_and_verify_token() {
        let token = generate_token(&config(), 123, "test@example.com", true).unwrap();
        let claims = verify_token(&config(), &token).unwrap();

        assert_eq!(claims.sub, 123);
        assert_eq!(claims.email, "test@example.com");
        assert!(claims.is_staff);
    }

    #[test]
    fn test_invalid_token() {
        let result = verify_token(&config(), "invalid.token.here");
        assert!(result.is_err());
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let token = generate_token(&config(), 1, "a@b.com", false).unwrap();
        let other = JwtConfig {
            secret: "another-secret".to_string(),
            ttl_hours: 1,
        };
        assert!(verify_token(&other, &token).is_err());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let expired = JwtConfig {
            secret: "unit-test-secret".to_string(),
            ttl_hours: -2,
        };
        let token = generate_token(&expired, 1, "a@b.com", false).unwrap();
        assert!(verify_token(&config(), &token).is_err());
    }
}

// Configuration de l'application, lue une seule fois au démarrage.
// Le fichier .env est chargé par main.rs avant l'appel à from_env().

use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

const DEFAULT_JWT_SECRET: &str = "default-insecure-key-change-this";
const DEFAULT_COINGECKO_URL: &str = "https://api.coingecko.com/api/v3/simple/price";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in .env file")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub ttl_hours: i64,
}

#[derive(Debug, Clone)]
pub struct AdminBootstrap {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt: JwtConfig,
    pub admin: Option<AdminBootstrap>,
    pub seed_crypto_prices: bool,
    pub coingecko_url: String,
    pub referral_reward: Decimal,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                warn!("JWT_SECRET not found in .env, using default (INSECURE)");
                DEFAULT_JWT_SECRET.to_string()
            }
        };

        let admin = match (env::var("ADMIN_EMAIL"), env::var("ADMIN_PASSWORD")) {
            (Ok(email), Ok(password)) => Some(AdminBootstrap { email, password }),
            _ => None,
        };

        Ok(Self {
            database_url,
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_var("PORT", 8080)?,
            jwt: JwtConfig {
                secret,
                ttl_hours: parse_var("JWT_TTL_HOURS", 24)?,
            },
            admin,
            seed_crypto_prices: parse_var("SEED_CRYPTO_PRICES", true)?,
            coingecko_url: env::var("COINGECKO_URL")
                .unwrap_or_else(|_| DEFAULT_COINGECKO_URL.to_string()),
            referral_reward: parse_var("REFERRAL_REWARD", Decimal::new(500, 2))?,
        })
    }

    /// Configuration minimale pour les tests (base SQLite en mémoire)
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            jwt: JwtConfig {
                secret: "test-secret".to_string(),
                ttl_hours: 1,
            },
            admin: None,
            seed_crypto_prices: false,
            coingecko_url: DEFAULT_COINGECKO_URL.to_string(),
            referral_reward: Decimal::new(500, 2),
        }
    }
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_uses_default_when_unset() {
        let port: u16 = parse_var("GROWFUND_TEST_UNSET_PORT", 8080).unwrap();
        assert_eq!(port, 8080);
    }

    #[test]
    fn test_parse_var_rejects_garbage() {
        // SAFETY: variable propre à ce test, aucun autre test ne la lit
        unsafe { env::set_var("GROWFUND_TEST_BAD_TTL", "abc") };
        let result: Result<i64, _> = parse_var("GROWFUND_TEST_BAD_TTL", 24);
        assert!(matches!(result, Err(ConfigError::Invalid { key: "GROWFUND_TEST_BAD_TTL", .. })));
    }
}

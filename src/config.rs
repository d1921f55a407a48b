//! Runtime configuration
//!
//! Everything is read from the environment once at startup

use url::Url;

use crate::password::generate;
use crate::utils::env_var_or_else;
use crate::utils::env_var_parsed_or;

/// Access tokens are valid for a minute
const DEFAULT_ACCESS_TOKEN_TTL: i64 = 60;

/// Refresh tokens are valid for 7 days
const DEFAULT_REFRESH_TOKEN_TTL: i64 = 7 * 24 * 60 * 60;

/// Password reset tokens are valid for an hour
const DEFAULT_PASSWORD_RESET_TTL: i64 = 60 * 60;

/// Requests per minute per client for the auth endpoints
const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 12;

const DEFAULT_CLIENT_URL: &str = "http://localhost:3000";

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// Secret to sign access tokens with
    pub jwt_access_secret: String,

    /// Secret to sign refresh tokens with, never the same as the access secret
    pub jwt_refresh_secret: String,

    /// Lifetime of an access token in seconds
    pub access_token_ttl: i64,

    /// Lifetime of a refresh token in seconds
    pub refresh_token_ttl: i64,

    /// Lifetime of a password reset token in seconds
    pub password_reset_ttl: i64,

    /// Mark cookies as `Secure`
    pub secure_cookies: bool,

    /// Base URL of the web client, used for password reset links
    pub client_url: Url,

    /// Allowed auth requests per minute per client IP
    pub rate_limit_per_minute: u32,
}

impl Config {
    /// Read the configuration from the environment
    ///
    /// Missing secrets are generated, which makes all tokens invalid after a restart
    pub fn from_env() -> Self {
        let jwt_access_secret = env_var_or_else("JWT_ACCESS_SECRET", || {
            let secret = generate();
            tracing::info!("`JWT_ACCESS_SECRET` is not set, generating temporary one: {secret}");
            secret
        });

        let jwt_refresh_secret = env_var_or_else("JWT_REFRESH_SECRET", || {
            let secret = generate();
            tracing::info!("`JWT_REFRESH_SECRET` is not set, generating temporary one: {secret}");
            secret
        });

        let client_url = env_var_or_else("CLIENT_URL", || String::from(DEFAULT_CLIENT_URL));
        let client_url = Url::parse(&client_url).unwrap_or_else(|err| {
            tracing::warn!("`CLIENT_URL` is invalid ({err}), using {DEFAULT_CLIENT_URL}");
            default_client_url()
        });

        Self {
            jwt_access_secret,
            jwt_refresh_secret,
            access_token_ttl: positive_or(
                env_var_parsed_or("ACCESS_TOKEN_TTL_SECONDS", DEFAULT_ACCESS_TOKEN_TTL),
                DEFAULT_ACCESS_TOKEN_TTL,
            ),
            refresh_token_ttl: positive_or(
                env_var_parsed_or("REFRESH_TOKEN_TTL_SECONDS", DEFAULT_REFRESH_TOKEN_TTL),
                DEFAULT_REFRESH_TOKEN_TTL,
            ),
            password_reset_ttl: positive_or(
                env_var_parsed_or("PASSWORD_RESET_TTL_SECONDS", DEFAULT_PASSWORD_RESET_TTL),
                DEFAULT_PASSWORD_RESET_TTL,
            ),
            secure_cookies: env_var_or_else("APP_ENV", String::new) == "production",
            client_url,
            rate_limit_per_minute: env_var_parsed_or(
                "RATE_LIMIT_PER_MINUTE",
                DEFAULT_RATE_LIMIT_PER_MINUTE,
            ),
        }
    }

    /// Configuration with fixed secrets and default lifetimes
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            jwt_access_secret: "access-secret".to_string(),
            jwt_refresh_secret: "refresh-secret".to_string(),
            access_token_ttl: DEFAULT_ACCESS_TOKEN_TTL,
            refresh_token_ttl: DEFAULT_REFRESH_TOKEN_TTL,
            password_reset_ttl: DEFAULT_PASSWORD_RESET_TTL,
            secure_cookies: false,
            client_url: default_client_url(),
            rate_limit_per_minute: DEFAULT_RATE_LIMIT_PER_MINUTE,
        }
    }
}

fn positive_or(value: i64, default: i64) -> i64 {
    if value > 0 { value } else { default }
}

fn default_client_url() -> Url {
    Url::parse(DEFAULT_CLIENT_URL).expect("Valid default client URL")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_client_url() {
        assert_eq!(default_client_url().as_str(), "http://localhost:3000/");
    }

    #[test]
    fn test_positive_or() {
        assert_eq!(positive_or(10, 60), 10);
        assert_eq!(positive_or(0, 60), 60);
        assert_eq!(positive_or(-5, 60), 60);
    }
}

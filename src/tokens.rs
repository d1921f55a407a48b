//! Token service
//!
//! Access tokens are stateless JWTs. Refresh tokens are JWTs too, but only the one whose hash is
//! stored with the user is accepted, and it is single-use: every rotation replaces it. Presenting
//! any other refresh token is treated as a replay and ends the session.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::rand_core::RngCore;
use chrono::DateTime;
use chrono::TimeDelta;
use chrono::Utc;
use jsonwebtoken::Algorithm;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::EncodingKey;
use jsonwebtoken::Header;
use jsonwebtoken::Validation;
use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use uuid::Uuid;

use crate::config::Config;
use crate::error::Error;
use crate::error::Result;
use crate::password;
use crate::storage::Storage;
use crate::storage::TokenHashValues;

/// The only message for failed refresh attempts, whatever check failed
const INVALID_REFRESH_TOKEN: &str = "Invalid or expired refresh token";

/// The only message for failed access token checks
const INVALID_ACCESS_TOKEN: &str = "Invalid or expired access token";

/// The only message for failed password reset attempts
const INVALID_RESET_TOKEN: &str = "Invalid or expired reset token";

/// Random bytes in a password reset token
const RESET_TOKEN_BYTES: usize = 32;

/// The keys used for encoding/decoding JWT tokens
#[derive(Clone)]
pub struct JwtKeys {
    /// The encoding key
    encoding: EncodingKey,

    /// The decoding key
    decoding: DecodingKey,
}

impl JwtKeys {
    /// Create new encoding/decoding keys, derived from a secret
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// Claims of an access token
#[derive(Debug, Deserialize, Serialize)]
struct AccessClaims {
    /// The user ID
    sub: Uuid,

    /// Issued at, seconds since epoch
    iat: i64,

    /// Expires at, seconds since epoch
    exp: i64,
}

/// Claims of a refresh token
#[derive(Debug, Deserialize, Serialize)]
struct RefreshClaims {
    /// The user ID
    sub: Uuid,

    /// Issued at, seconds since epoch
    iat: i64,

    /// Expires at, seconds since epoch
    exp: i64,

    /// Unique per issued token, no two refresh tokens are ever the same
    jti: Uuid,
}

/// A signed access token
#[derive(Debug)]
pub struct AccessToken {
    /// The token itself
    pub token: String,

    /// In how many seconds does the token expire
    pub expires_in: i64,
}

/// A signed refresh token with the values to store
#[derive(Debug)]
pub struct RefreshToken {
    /// The token itself, only ever handed to the client
    pub token: String,

    /// Hex encoded SHA-256 of the token, the only thing stored
    pub hash: String,

    /// Moment the token expires
    pub expires_at: DateTime<Utc>,

    /// Lifetime in seconds
    pub ttl: i64,
}

impl RefreshToken {
    fn hash_values(&self) -> TokenHashValues<'_> {
        TokenHashValues {
            hash: &self.hash,
            expires_at: self.expires_at,
        }
    }
}

/// A fresh pair of tokens
#[derive(Debug)]
pub struct Session {
    pub user_id: Uuid,
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
}

/// Hex encoded SHA-256 of a token
pub fn sha256_hex(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());

    hex::encode(hasher.finalize())
}

/// Compare two secrets without an early exit on the first differing byte
///
/// The length check is not secret-dependent, both sides are fixed-length hashes
pub fn fixed_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.iter().zip(b).fold(0_u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Generate a high-entropy random token, hex encoded
fn random_token() -> String {
    let mut bytes = [0_u8; RESET_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);

    hex::encode(bytes)
}

/// Issues, verifies, rotates and revokes tokens
#[derive(Clone)]
pub struct Tokens {
    /// Keys for access tokens
    access_keys: JwtKeys,

    /// Keys for refresh tokens, different from the access keys
    refresh_keys: JwtKeys,

    /// Lifetime of access tokens in seconds
    access_ttl: i64,

    /// Lifetime of refresh tokens in seconds
    refresh_ttl: i64,

    /// Lifetime of password reset tokens in seconds
    reset_ttl: i64,
}

impl Tokens {
    /// Create the token service from the configuration
    pub fn new(config: &Config) -> Self {
        Self {
            access_keys: JwtKeys::new(config.jwt_access_secret.as_bytes()),
            refresh_keys: JwtKeys::new(config.jwt_refresh_secret.as_bytes()),
            access_ttl: config.access_token_ttl,
            refresh_ttl: config.refresh_token_ttl,
            reset_ttl: config.password_reset_ttl,
        }
    }

    /// Lifetime of refresh tokens in seconds
    pub fn refresh_ttl(&self) -> i64 {
        self.refresh_ttl
    }

    fn validation() -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        validation
    }

    /// Issue a short-lived access token for a user
    pub fn issue_access_token(&self, user_id: &Uuid) -> Result<AccessToken> {
        let now = Utc::now().timestamp();

        let claims = AccessClaims {
            sub: *user_id,
            iat: now,
            exp: now + self.access_ttl,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.access_keys.encoding)
            .map_err(Error::internal)?;

        Ok(AccessToken {
            token,
            expires_in: self.access_ttl,
        })
    }

    /// Verify an access token by signature and expiry, returns the user ID
    pub fn verify_access_token(&self, token: &str) -> Result<Uuid> {
        jsonwebtoken::decode::<AccessClaims>(token, &self.access_keys.decoding, &Self::validation())
            .map(|data| data.claims.sub)
            .map_err(|err| {
                tracing::debug!("Rejected access token: {err}");
                Error::Unauthenticated(INVALID_ACCESS_TOKEN)
            })
    }

    /// Issue a refresh token for a user
    ///
    /// Only a token whose hash gets stored with the user is usable
    pub fn issue_refresh_token(&self, user_id: &Uuid) -> Result<RefreshToken> {
        let now = Utc::now();

        let claims = RefreshClaims {
            sub: *user_id,
            iat: now.timestamp(),
            exp: now.timestamp() + self.refresh_ttl,
            jti: Uuid::new_v4(),
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.refresh_keys.encoding)
            .map_err(Error::internal)?;

        Ok(RefreshToken {
            hash: sha256_hex(&token),
            token,
            expires_at: now + TimeDelta::seconds(self.refresh_ttl),
            ttl: self.refresh_ttl,
        })
    }

    fn verify_refresh_token(&self, token: &str) -> Result<RefreshClaims> {
        jsonwebtoken::decode::<RefreshClaims>(
            token,
            &self.refresh_keys.decoding,
            &Self::validation(),
        )
        .map(|data| data.claims)
        .map_err(|err| {
            tracing::debug!("Rejected refresh token: {err}");
            Error::Unauthenticated(INVALID_REFRESH_TOKEN)
        })
    }

    /// Start a new session after login or registration
    ///
    /// Replaces any refresh token the user had, ending the previous session
    pub async fn start_session<S: Storage>(&self, storage: &S, user_id: &Uuid) -> Result<Session> {
        let access_token = self.issue_access_token(user_id)?;
        let refresh_token = self.issue_refresh_token(user_id)?;

        storage
            .set_refresh_token(user_id, Some(&refresh_token.hash_values()))
            .await?;

        Ok(Session {
            user_id: *user_id,
            access_token,
            refresh_token,
        })
    }

    /// Exchange a refresh token for a new access/refresh token pair
    ///
    /// A token that is validly signed but not the stored one is a replay: the session is
    /// revoked, so neither the replayed nor the latest token works anymore.
    pub async fn rotate<S: Storage>(&self, storage: &S, presented: &str) -> Result<Session> {
        let claims = self.verify_refresh_token(presented)?;

        let user = storage
            .find_single_user_by_id(&claims.sub)
            .await?
            .ok_or(Error::Unauthenticated(INVALID_REFRESH_TOKEN))?;

        let (Some(stored_hash), Some(expires_at)) =
            (user.refresh_token_hash.as_deref(), user.refresh_token_expires_at)
        else {
            return Err(Error::Unauthenticated(INVALID_REFRESH_TOKEN));
        };

        let presented_hash = sha256_hex(presented);
        let is_current = fixed_time_eq(presented_hash.as_bytes(), stored_hash.as_bytes())
            && expires_at > Utc::now();

        if !is_current {
            tracing::warn!("Refresh token reuse detected for user {}, revoking session", user.id);

            self.revoke(storage, &user.id).await?;

            return Err(Error::Unauthenticated(INVALID_REFRESH_TOKEN));
        }

        let access_token = self.issue_access_token(&user.id)?;
        let refresh_token = self.issue_refresh_token(&user.id)?;

        let replaced = storage
            .replace_refresh_token(&user.id, stored_hash, &refresh_token.hash_values())
            .await?;

        if !replaced {
            // another rotation with the same token won, this one counts as the replay
            tracing::warn!("Concurrent refresh detected for user {}, revoking session", user.id);

            self.revoke(storage, &user.id).await?;

            return Err(Error::Unauthenticated(INVALID_REFRESH_TOKEN));
        }

        Ok(Session {
            user_id: user.id,
            access_token,
            refresh_token,
        })
    }

    /// End the session of a user
    pub async fn revoke<S: Storage>(&self, storage: &S, user_id: &Uuid) -> Result<()> {
        storage.set_refresh_token(user_id, None).await?;

        Ok(())
    }

    /// End the session belonging to a presented refresh token, if it is the current one
    ///
    /// Best-effort: invalid tokens and storage failures are ignored
    pub async fn revoke_presented<S: Storage>(&self, storage: &S, presented: &str) {
        let Ok(claims) = self.verify_refresh_token(presented) else {
            return;
        };

        let result = storage
            .clear_refresh_token_if(&claims.sub, &sha256_hex(presented))
            .await;

        if let Err(err) = result {
            tracing::warn!("Could not revoke refresh token of user {}: {err}", claims.sub);
        }
    }

    /// Create a password reset token for a user
    ///
    /// Only the hash is stored, the returned token has to be delivered out-of-band
    pub async fn issue_reset_token<S: Storage>(&self, storage: &S, user_id: &Uuid) -> Result<String> {
        let token = random_token();
        let hash = sha256_hex(&token);

        let values = TokenHashValues {
            hash: &hash,
            expires_at: Utc::now() + TimeDelta::seconds(self.reset_ttl),
        };

        storage
            .set_password_reset_token(user_id, Some(&values))
            .await?;

        Ok(token)
    }

    /// Set a new password with a password reset token
    ///
    /// Clears the reset token and ends any session of the user
    pub async fn redeem_reset_token<S: Storage>(
        &self,
        storage: &S,
        user_id: &Uuid,
        token: &str,
        new_password: &str,
    ) -> Result<()> {
        let user = storage
            .find_single_user_by_id(user_id)
            .await?
            .ok_or(Error::BadRequest(INVALID_RESET_TOKEN))?;

        let (Some(stored_hash), Some(expires_at)) = (
            user.password_reset_token_hash.as_deref(),
            user.password_reset_expires_at,
        ) else {
            return Err(Error::BadRequest(INVALID_RESET_TOKEN));
        };

        if expires_at <= Utc::now() {
            storage.set_password_reset_token(&user.id, None).await?;

            return Err(Error::BadRequest(INVALID_RESET_TOKEN));
        }

        if !fixed_time_eq(sha256_hex(token).as_bytes(), stored_hash.as_bytes()) {
            return Err(Error::BadRequest(INVALID_RESET_TOKEN));
        }

        let hashed_password = password::hash(new_password).map_err(Error::internal)?;

        if storage
            .reset_password(&user.id, stored_hash, &hashed_password)
            .await?
        {
            Ok(())
        } else {
            Err(Error::BadRequest(INVALID_RESET_TOKEN))
        }
    }
}

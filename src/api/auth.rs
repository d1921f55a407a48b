//! Authentication API
//!
//! Access tokens are returned in the body, refresh tokens only ever travel in an http-only
//! cookie scoped to the auth routes.

use axum::Extension;
use axum_extra::extract::cookie::Cookie;
use axum_extra::extract::cookie::CookieJar;
use axum_extra::extract::cookie::SameSite;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::config::Config;
use crate::error::Error as DomainError;
use crate::error::FieldErrors;
use crate::mailer::SharedMailer;
use crate::mailer::password_reset_link;
use crate::password;
use crate::storage::CreateUserValues;
use crate::storage::Storage;
use crate::tokens::RefreshToken;
use crate::tokens::Session;
use crate::tokens::Tokens;
use crate::validation::is_valid_email;
use crate::validation::normalize_email;
use crate::validation::validate_password_strength;

use super::CurrentUser;
use super::Error;
use super::Form;
use super::Message;
use super::Success;
use super::users::UserResponse;

/// Name of the refresh token cookie
pub const REFRESH_COOKIE: &str = "refreshToken";

/// The refresh token cookie is only sent to the auth routes
const REFRESH_COOKIE_PATH: &str = "/api/auth";

/// Same response for known and unknown email addresses
const FORGOT_PASSWORD_MESSAGE: &str = "If the email exists, a reset link will be sent";

/// Session information served to the user
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    /// Type of the token: Bearer
    #[serde(rename = "type")]
    token_type: &'static str,

    /// In how many seconds does the access token expire
    expires_in: i64,

    /// The access token to provide to follow up requests in the Authorization header
    access_token: String,

    /// The user, on login and registration
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<UserResponse>,
}

impl SessionResponse {
    fn new(session: &Session, user: Option<UserResponse>) -> Self {
        Self {
            token_type: "Bearer",
            expires_in: session.access_token.expires_in,
            access_token: session.access_token.token.clone(),
            user,
        }
    }
}

fn refresh_cookie(config: &Config, refresh_token: &RefreshToken) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, refresh_token.token.clone()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.secure_cookies)
        .path(REFRESH_COOKIE_PATH)
        .max_age(time::Duration::seconds(refresh_token.ttl))
        .build()
}

fn removal_cookie() -> Cookie<'static> {
    Cookie::build(REFRESH_COOKIE)
        .path(REFRESH_COOKIE_PATH)
        .build()
}

/// Registration form
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterForm {
    name: String,
    email: String,
    password: String,
}

/// Create an account and start a session
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -d '{ "name": "Alice", "email": "alice@example.com", "password": "Sup3r$ecret" }' \
///     http://localhost:5050/api/auth/register
/// ```
///
/// Response:
/// ```json
/// { "data": { "type": "Bearer", "expiresIn": 60, "accessToken": "...", "user": { ... } } }
/// ```
pub async fn register<S: Storage>(
    Extension(storage): Extension<S>,
    Extension(tokens): Extension<Tokens>,
    Extension(config): Extension<Config>,
    jar: CookieJar,
    Form(form): Form<RegisterForm>,
) -> Result<(CookieJar, Success<SessionResponse>), Error> {
    let name = form.name.trim();
    let email = normalize_email(&form.email);

    let mut errors = FieldErrors::new();
    if name.chars().count() < 2 {
        errors.insert("name", "Name is required".to_string());
    }
    if !is_valid_email(&email) {
        errors.insert("email", "Valid email is required".to_string());
    }
    if let Err(message) = validate_password_strength(&form.password) {
        errors.insert("password", message.to_string());
    }
    if !errors.is_empty() {
        return Err(Error::validation(errors));
    }

    let hashed_password = password::hash(&form.password).map_err(Error::internal_server_error)?;

    let user = storage
        .create_user(&CreateUserValues {
            name,
            email: &email,
            hashed_password: &hashed_password,
        })
        .await?;

    tracing::info!("User {} registered", user.id);

    let session = tokens.start_session(&storage, &user.id).await?;

    Ok((
        jar.add(refresh_cookie(&config, &session.refresh_token)),
        Success::created(SessionResponse::new(
            &session,
            Some(UserResponse::from_user(user)),
        )),
    ))
}

/// Login form
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    email: String,
    password: String,
}

/// Start a session with email and password
///
/// Any previous session of the user ends, its refresh token stops working
pub async fn login<S: Storage>(
    Extension(storage): Extension<S>,
    Extension(tokens): Extension<Tokens>,
    Extension(config): Extension<Config>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<(CookieJar, Success<SessionResponse>), Error> {
    let email = normalize_email(&form.email);

    let mut errors = FieldErrors::new();
    if !is_valid_email(&email) {
        errors.insert("email", "Valid email is required".to_string());
    }
    if form.password.is_empty() {
        errors.insert("password", "Password is required".to_string());
    }
    if !errors.is_empty() {
        return Err(Error::validation(errors));
    }

    let user = storage
        .find_single_user_by_email(&email)
        .await?
        .filter(|user| password::verify(&user.hashed_password, &form.password))
        .ok_or_else(|| Error::unauthorized("Invalid email or password"))?;

    let session = tokens.start_session(&storage, &user.id).await?;

    Ok((
        jar.add(refresh_cookie(&config, &session.refresh_token)),
        Success::ok(SessionResponse::new(
            &session,
            Some(UserResponse::from_user(user)),
        )),
    ))
}

/// Exchange the refresh token cookie for a new access token (and refresh token)
///
/// Any failure clears the cookie
pub async fn refresh<S: Storage>(
    Extension(storage): Extension<S>,
    Extension(tokens): Extension<Tokens>,
    Extension(config): Extension<Config>,
    jar: CookieJar,
) -> Result<(CookieJar, Success<SessionResponse>), (CookieJar, Error)> {
    let Some(presented) = jar
        .get(REFRESH_COOKIE)
        .map(|cookie| cookie.value().to_string())
    else {
        return Err((jar, Error::unauthorized("Missing refresh token")));
    };

    match tokens.rotate(&storage, &presented).await {
        Ok(session) => Ok((
            jar.add(refresh_cookie(&config, &session.refresh_token)),
            Success::ok(SessionResponse::new(&session, None)),
        )),
        Err(err) => Err((jar.remove(removal_cookie()), Error::from(err))),
    }
}

/// End the session of the refresh token cookie
///
/// Always succeeds, the cookie is cleared either way
pub async fn logout<S: Storage>(
    Extension(storage): Extension<S>,
    Extension(tokens): Extension<Tokens>,
    jar: CookieJar,
) -> (CookieJar, Success<Message>) {
    if let Some(cookie) = jar.get(REFRESH_COOKIE) {
        tokens.revoke_presented(&storage, cookie.value()).await;
    }

    (
        jar.remove(removal_cookie()),
        Success::ok(Message::new("Logged out")),
    )
}

/// Forgot password form
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ForgotPasswordForm {
    email: String,
}

/// Send a password reset link
///
/// The response never tells whether the email address is known
pub async fn forgot_password<S: Storage>(
    Extension(storage): Extension<S>,
    Extension(tokens): Extension<Tokens>,
    Extension(config): Extension<Config>,
    Extension(mailer): Extension<SharedMailer>,
    Form(form): Form<ForgotPasswordForm>,
) -> Result<Success<Message>, Error> {
    let email = normalize_email(&form.email);
    if !is_valid_email(&email) {
        return Err(DomainError::field("email", "Valid email is required").into());
    }

    if let Some(user) = storage.find_single_user_by_email(&email).await? {
        let token = tokens.issue_reset_token(&storage, &user.id).await?;

        match password_reset_link(&config.client_url, &user, &token) {
            Ok(link) => {
                if let Err(err) = mailer.send_password_reset(&user, &link).await {
                    tracing::warn!("Could not send password reset link to {}: {err}", user.id);
                }
            }
            Err(err) => tracing::error!("Could not build password reset link: {err}"),
        }
    }

    Ok(Success::ok(Message::new(FORGOT_PASSWORD_MESSAGE)))
}

/// Reset password form
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResetPasswordForm {
    user_id: String,
    token: String,
    password: String,
}

/// Set a new password with a reset token
///
/// Ends any session of the user
pub async fn reset_password<S: Storage>(
    Extension(storage): Extension<S>,
    Extension(tokens): Extension<Tokens>,
    jar: CookieJar,
    Form(form): Form<ResetPasswordForm>,
) -> Result<(CookieJar, Success<Message>), Error> {
    let mut errors = FieldErrors::new();
    if form.user_id.trim().is_empty() {
        errors.insert("userId", "userId is required".to_string());
    }
    if form.token.is_empty() {
        errors.insert("token", "token is required".to_string());
    }
    if let Err(message) = validate_password_strength(&form.password) {
        errors.insert("password", message.to_string());
    }
    if !errors.is_empty() {
        return Err(Error::validation(errors));
    }

    let user_id = Uuid::parse_str(form.user_id.trim())
        .map_err(|_| Error::bad_request("Invalid or expired reset token"))?;

    tokens
        .redeem_reset_token(&storage, &user_id, &form.token, &form.password)
        .await?;

    tracing::info!("Password of user {user_id} was reset");

    Ok((
        jar.remove(removal_cookie()),
        Success::ok(Message::new("Password updated successfully")),
    ))
}

/// Get the current user
pub async fn me<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser,
) -> Result<Success<UserResponse>, Error> {
    let user = storage
        .find_single_user_by_id(&current_user.id)
        .await?
        .ok_or_else(|| Error::not_found("User not found"))?;

    Ok(Success::ok(UserResponse::from_user(user)))
}

//! All API endpoint setup

use axum::Router;
use axum::middleware;
use axum::routing::delete;
use axum::routing::get;
use axum::routing::patch;
use axum::routing::post;

use crate::rate_limit;
use crate::storage::Storage;

pub use current_user::CurrentUser;
pub use request::Form;
pub use request::PathParameters;
pub use request::QueryParameters;
pub use response::Deleted;
pub use response::Error;
pub use response::Message;
pub use response::Success;

mod auth;
mod current_user;
mod notes;
mod notifications;
mod request;
mod response;
mod users;

/// Get the Axum router for all API routes
pub fn router<S: Storage>() -> Router {
    let limited_auth = Router::new()
        .route("/register", post(auth::register::<S>))
        .route("/login", post(auth::login::<S>))
        .route("/refresh", post(auth::refresh::<S>))
        .route("/forgot-password", post(auth::forgot_password::<S>))
        .route("/reset-password", post(auth::reset_password::<S>))
        .route_layer(middleware::from_fn(rate_limit::limit));

    let auth = Router::new()
        .route("/logout", post(auth::logout::<S>))
        .route("/me", get(auth::me::<S>))
        .merge(limited_auth);

    let users = Router::new()
        .route("/search", get(users::search::<S>))
        .route("/{user}", get(users::single::<S>));

    let notes = Router::new()
        .route("/", get(notes::list::<S>).post(notes::create::<S>))
        .route("/shared-with-me", get(notes::shared_with_me::<S>))
        .route(
            "/{note}",
            get(notes::single::<S>)
                .patch(notes::update::<S>)
                .delete(notes::delete::<S>),
        )
        .route("/{note}/archive", post(notes::archive::<S>))
        .route("/{note}/trash", post(notes::trash::<S>))
        .route("/{note}/share", post(notes::share::<S>))
        .route(
            "/{note}/share/{user}",
            patch(notes::update_share::<S>).delete(notes::revoke_share::<S>),
        );

    let notifications = Router::new()
        .route(
            "/",
            get(notifications::list::<S>).delete(notifications::clear::<S>),
        )
        .route("/{notification}", delete(notifications::delete::<S>));

    Router::new()
        .nest("/auth", auth)
        .nest("/users", users)
        .nest("/notes", notes)
        .nest("/notifications", notifications)
}

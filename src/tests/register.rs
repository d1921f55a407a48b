use axum::http::StatusCode;

use crate::storage::Storage;
use crate::tests::helper;

#[tokio::test]
async fn test_register() {
    let mut app = helper::setup_test_app();

    let response =
        helper::maybe_register(&mut app, " Alice ", " Alice@Example.com ", helper::PASSWORD).await;
    assert_eq!(StatusCode::CREATED, response.status_code);

    let data = response.data();
    assert_eq!("Bearer", data["type"]);
    assert_eq!(60, data["expiresIn"]);
    assert!(data["accessToken"].as_str().unwrap().len() > 10);
    assert_eq!("Alice", data["user"]["name"]);
    assert_eq!("alice@example.com", data["user"]["email"]);
    assert!(data["user"].get("hashedPassword").is_none());

    // refresh token only travels in the cookie
    let refresh_token = response.refresh_cookie.clone().unwrap();
    assert!(!refresh_token.is_empty());
    assert!(data.get("refreshToken").is_none());

    // only its hash is stored
    let user = app
        .storage
        .find_single_user_by_email("alice@example.com")
        .await
        .unwrap()
        .unwrap();
    assert!(user.refresh_token_hash.is_some());
    assert_ne!(user.refresh_token_hash, Some(refresh_token));
    assert!(user.hashed_password.starts_with("$argon2"));
}

#[tokio::test]
async fn test_register_duplicate_email() {
    let mut app = helper::setup_test_app();

    helper::register(&mut app, "Alice", "alice@example.com").await;

    let response =
        helper::maybe_register(&mut app, "Other", "ALICE@example.com", helper::PASSWORD).await;
    assert_eq!(StatusCode::CONFLICT, response.status_code);
    assert_eq!(Some("Email already in use"), response.error());
    assert_eq!("Email already in use", response.body["errors"]["email"]);
}

#[tokio::test]
async fn test_register_validation() {
    let mut app = helper::setup_test_app();

    let response = helper::maybe_register(&mut app, "A", "not-an-email", "short").await;
    assert_eq!(StatusCode::BAD_REQUEST, response.status_code);
    assert_eq!(Some("Validation error"), response.error());

    let errors = &response.body["errors"];
    assert_eq!("Name is required", errors["name"]);
    assert_eq!("Valid email is required", errors["email"]);
    assert_eq!("Password must be at least 8 characters", errors["password"]);

    let response =
        helper::maybe_register(&mut app, "Alice", "alice@example.com", "alllowercase1!").await;
    assert_eq!(StatusCode::BAD_REQUEST, response.status_code);
    assert_eq!(
        "Password must include an uppercase letter",
        response.body["errors"]["password"]
    );
}

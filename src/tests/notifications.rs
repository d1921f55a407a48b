use axum::http::Method;
use axum::http::StatusCode;
use serde_json::json;

use crate::tests::helper;

#[tokio::test]
async fn test_notifications() {
    let mut app = helper::setup_test_app();

    let alice = helper::register(&mut app, "Alice", "alice@example.com").await;
    let bob = helper::register(&mut app, "Bob", "bob@example.com").await;

    let groceries = helper::create_note(&mut app, &alice.access_token, "Groceries").await;
    let holidays = helper::create_note(&mut app, &alice.access_token, "Holidays").await;

    for note_id in [&groceries, &holidays] {
        helper::share_note(
            &mut app,
            &alice.access_token,
            note_id,
            json!({ "userId": bob.user_id, "permission": "viewer" }),
        )
        .await;
    }
    helper::update_share(&mut app, &alice.access_token, &holidays, &bob.user_id, "editor").await;

    // newest first, enriched with actor and note
    let response = helper::list_notifications(&mut app, &bob.access_token).await;
    assert_eq!(StatusCode::OK, response.status_code);

    let entries = response.data().as_array().unwrap().clone();
    assert_eq!(3, entries.len());
    assert_eq!(
        "Alice changed your permission to editor • Holidays",
        entries[0]["message"]
    );
    assert_eq!("editor", entries[0]["permission"]);
    assert_eq!("Alice shared a note with you • Holidays", entries[1]["message"]);
    assert_eq!("Alice shared a note with you • Groceries", entries[2]["message"]);
    assert_eq!(groceries.to_string(), entries[2]["noteId"]);
    assert_eq!("Groceries", entries[2]["noteTitle"]);
    assert_eq!(
        json!({ "id": alice.user_id, "name": "Alice", "email": "alice@example.com" }),
        entries[2]["actor"]
    );
    assert!(entries[2]["readAt"].is_null());

    // the actor has no notifications of their own
    let response = helper::list_notifications(&mut app, &alice.access_token).await;
    assert_eq!(json!([]), *response.data());

    // only the recipient can delete a notification
    let uri = format!("/api/notifications/{}", entries[0]["id"].as_str().unwrap());
    let response = helper::call(
        &mut app,
        Method::DELETE,
        &uri,
        Some(&alice.access_token),
        None,
        None,
    )
    .await;
    assert_eq!(StatusCode::NOT_FOUND, response.status_code);
    assert_eq!(Some("Notification not found"), response.error());

    let response = helper::call(
        &mut app,
        Method::DELETE,
        &uri,
        Some(&bob.access_token),
        None,
        None,
    )
    .await;
    assert_eq!(StatusCode::OK, response.status_code);
    assert_eq!(json!({ "ok": true }), *response.data());

    let response = helper::list_notifications(&mut app, &bob.access_token).await;
    assert_eq!(2, response.data().as_array().unwrap().len());

    // clear the rest
    let response = helper::call(
        &mut app,
        Method::DELETE,
        "/api/notifications",
        Some(&bob.access_token),
        None,
        None,
    )
    .await;
    assert_eq!(StatusCode::OK, response.status_code);
    assert_eq!(json!({ "ok": true, "deleted": 2 }), *response.data());

    let response = helper::list_notifications(&mut app, &bob.access_token).await;
    assert_eq!(json!([]), *response.data());
}

#[tokio::test]
async fn test_notifications_survive_deleted_notes() {
    let mut app = helper::setup_test_app();

    let alice = helper::register(&mut app, "Alice", "alice@example.com").await;
    let bob = helper::register(&mut app, "Bob", "bob@example.com").await;

    let note_id = helper::create_note(&mut app, &alice.access_token, "Groceries").await;
    helper::share_note(
        &mut app,
        &alice.access_token,
        &note_id,
        json!({ "userId": bob.user_id, "permission": "viewer" }),
    )
    .await;

    for (uri, body) in [
        (format!("/api/notes/{note_id}/trash"), Some(json!({ "trashed": true }))),
        (format!("/api/notes/{note_id}"), None),
    ] {
        let method = if body.is_some() {
            Method::POST
        } else {
            Method::DELETE
        };
        let response =
            helper::call(&mut app, method, &uri, Some(&alice.access_token), None, body).await;
        assert_eq!(StatusCode::OK, response.status_code);
    }

    let response = helper::list_notifications(&mut app, &bob.access_token).await;
    assert_eq!(StatusCode::OK, response.status_code);
    assert_eq!(
        "Alice shared a note with you • Untitled note",
        response.data()[0]["message"]
    );
}

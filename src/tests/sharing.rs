use axum::http::Method;
use axum::http::StatusCode;
use serde_json::json;

use crate::tests::helper;

#[tokio::test]
async fn test_sharing() {
    let mut app = helper::setup_test_app();

    let alice = helper::register(&mut app, "Alice", "alice@example.com").await;
    let bob = helper::register(&mut app, "Bob", "bob@example.com").await;

    let note_id = helper::create_note(&mut app, &alice.access_token, "Groceries").await;

    // unknown to bob
    let response = helper::single_note(&mut app, &bob.access_token, &note_id).await;
    assert_eq!(StatusCode::NOT_FOUND, response.status_code);

    // share as viewer
    let response = helper::share_note(
        &mut app,
        &alice.access_token,
        &note_id,
        json!({ "userId": bob.user_id, "permission": "viewer" }),
    )
    .await;
    assert_eq!(StatusCode::OK, response.status_code);
    assert_eq!(
        json!([{ "userId": bob.user_id, "permission": "viewer" }]),
        response.data()["sharedWith"]
    );

    // viewers read but do not write
    let response = helper::single_note(&mut app, &bob.access_token, &note_id).await;
    assert_eq!(StatusCode::OK, response.status_code);
    assert_eq!("viewer", response.data()["role"]);
    assert!(response.data().get("sharedWith").is_none());
    assert!(response.data().get("activityLog").is_none());

    let response = helper::update_note(
        &mut app,
        &bob.access_token,
        &note_id,
        json!({ "title": "Shopping" }),
    )
    .await;
    assert_eq!(StatusCode::FORBIDDEN, response.status_code);

    // upgrade to editor
    let response =
        helper::update_share(&mut app, &alice.access_token, &note_id, &bob.user_id, "editor")
            .await;
    assert_eq!(StatusCode::OK, response.status_code);

    let response = helper::update_note(
        &mut app,
        &bob.access_token,
        &note_id,
        json!({ "title": "Shopping" }),
    )
    .await;
    assert_eq!(StatusCode::OK, response.status_code);
    assert_eq!("Shopping", response.data()["title"]);
    assert_eq!(bob.user_id.to_string(), response.data()["lastEditedBy"]);

    // editors do not manage
    let response = helper::update_note(
        &mut app,
        &bob.access_token,
        &note_id,
        json!({ "category": "business" }),
    )
    .await;
    assert_eq!(StatusCode::FORBIDDEN, response.status_code);

    let response = helper::call(
        &mut app,
        Method::POST,
        &format!("/api/notes/{note_id}/trash"),
        Some(&bob.access_token),
        None,
        Some(json!({ "trashed": true })),
    )
    .await;
    assert_eq!(StatusCode::FORBIDDEN, response.status_code);

    // the owner sees everything that happened, in order
    let response = helper::single_note(&mut app, &alice.access_token, &note_id).await;
    assert_eq!(
        vec!["created", "shared", "permission_changed", "edited"],
        helper::actions(response.data())
    );

    // revoke
    let response = helper::revoke_share(&mut app, &alice.access_token, &note_id, &bob.user_id)
        .await;
    assert_eq!(StatusCode::OK, response.status_code);
    assert_eq!(json!([]), response.data()["sharedWith"]);
    assert_eq!(
        Some(&"unshared".to_string()),
        helper::actions(response.data()).last()
    );

    let response = helper::single_note(&mut app, &bob.access_token, &note_id).await;
    assert_eq!(StatusCode::NOT_FOUND, response.status_code);

    // revoking again finds nothing
    let response = helper::revoke_share(&mut app, &alice.access_token, &note_id, &bob.user_id)
        .await;
    assert_eq!(StatusCode::NOT_FOUND, response.status_code);
    assert_eq!(Some("Share not found"), response.error());

    // bob was told about every change
    let response = helper::list_notifications(&mut app, &bob.access_token).await;
    let types = response
        .data()
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["type"].as_str().unwrap())
        .collect::<Vec<&str>>();
    assert_eq!(vec!["unshared", "permission_changed", "shared"], types);
}

#[tokio::test]
async fn test_share_is_idempotent() {
    let mut app = helper::setup_test_app();

    let alice = helper::register(&mut app, "Alice", "alice@example.com").await;
    let bob = helper::register(&mut app, "Bob", "bob@example.com").await;

    let note_id = helper::create_note(&mut app, &alice.access_token, "Groceries").await;

    for _ in 0..2 {
        let response = helper::share_note(
            &mut app,
            &alice.access_token,
            &note_id,
            json!({ "email": " BOB@example.com", "permission": "editor" }),
        )
        .await;
        assert_eq!(StatusCode::OK, response.status_code);
        assert_eq!(1, response.data()["sharedWith"].as_array().unwrap().len());
        assert_eq!(vec!["created", "shared"], helper::actions(response.data()));
    }

    let response = helper::list_notifications(&mut app, &bob.access_token).await;
    assert_eq!(1, response.data().as_array().unwrap().len());
}

#[tokio::test]
async fn test_share_failures() {
    let mut app = helper::setup_test_app();

    let alice = helper::register(&mut app, "Alice", "alice@example.com").await;
    let bob = helper::register(&mut app, "Bob", "bob@example.com").await;
    let carol = helper::register(&mut app, "Carol", "carol@example.com").await;

    let note_id = helper::create_note(&mut app, &alice.access_token, "Groceries").await;

    // strangers do not even learn the note exists
    let response = helper::share_note(
        &mut app,
        &carol.access_token,
        &note_id,
        json!({ "userId": bob.user_id, "permission": "viewer" }),
    )
    .await;
    assert_eq!(StatusCode::NOT_FOUND, response.status_code);
    assert_eq!(Some("Note not found"), response.error());

    // collaborators can not share further
    helper::share_note(
        &mut app,
        &alice.access_token,
        &note_id,
        json!({ "userId": bob.user_id, "permission": "editor" }),
    )
    .await;
    let response = helper::share_note(
        &mut app,
        &bob.access_token,
        &note_id,
        json!({ "userId": carol.user_id, "permission": "viewer" }),
    )
    .await;
    assert_eq!(StatusCode::FORBIDDEN, response.status_code);

    // not even with users that do not exist
    let response = helper::share_note(
        &mut app,
        &bob.access_token,
        &note_id,
        json!({ "userId": uuid::Uuid::new_v4(), "permission": "viewer" }),
    )
    .await;
    assert_eq!(StatusCode::FORBIDDEN, response.status_code);

    let response = helper::share_note(
        &mut app,
        &bob.access_token,
        &note_id,
        json!({ "email": "nobody@example.com", "permission": "viewer" }),
    )
    .await;
    assert_eq!(StatusCode::FORBIDDEN, response.status_code);

    // not with the owner
    let response = helper::share_note(
        &mut app,
        &alice.access_token,
        &note_id,
        json!({ "userId": alice.user_id, "permission": "viewer" }),
    )
    .await;
    assert_eq!(StatusCode::BAD_REQUEST, response.status_code);
    assert_eq!(
        "A note can not be shared with its owner",
        response.body["errors"]["userId"]
    );

    // unknown users
    let response = helper::share_note(
        &mut app,
        &alice.access_token,
        &note_id,
        json!({ "email": "nobody@example.com", "permission": "viewer" }),
    )
    .await;
    assert_eq!(StatusCode::NOT_FOUND, response.status_code);
    assert_eq!(Some("User not found"), response.error());

    let response = helper::share_note(
        &mut app,
        &alice.access_token,
        &note_id,
        json!({ "userId": uuid::Uuid::new_v4(), "permission": "viewer" }),
    )
    .await;
    assert_eq!(StatusCode::NOT_FOUND, response.status_code);
    assert_eq!(Some("User not found"), response.error());

    // incomplete requests
    let response = helper::share_note(
        &mut app,
        &alice.access_token,
        &note_id,
        json!({ "permission": "viewer" }),
    )
    .await;
    assert_eq!(StatusCode::BAD_REQUEST, response.status_code);
    assert_eq!("userId or email is required", response.body["errors"]["userId"]);

    let response = helper::share_note(
        &mut app,
        &alice.access_token,
        &note_id,
        json!({ "userId": carol.user_id }),
    )
    .await;
    assert_eq!(StatusCode::BAD_REQUEST, response.status_code);
    assert_eq!(
        "permission must be viewer or editor",
        response.body["errors"]["permission"]
    );

    // changing the permission of someone without a share
    let response = helper::update_share(
        &mut app,
        &alice.access_token,
        &note_id,
        &carol.user_id,
        "editor",
    )
    .await;
    assert_eq!(StatusCode::NOT_FOUND, response.status_code);
    assert_eq!(Some("Share not found"), response.error());
}

#[tokio::test]
async fn test_shared_with_me() {
    let mut app = helper::setup_test_app();

    let alice = helper::register(&mut app, "Alice", "alice@example.com").await;
    let bob = helper::register(&mut app, "Bob", "bob@example.com").await;

    let shared_id = helper::create_note(&mut app, &alice.access_token, "Shared").await;
    helper::create_note(&mut app, &alice.access_token, "Private").await;

    helper::share_note(
        &mut app,
        &alice.access_token,
        &shared_id,
        json!({ "userId": bob.user_id, "permission": "viewer" }),
    )
    .await;

    let response = helper::call(
        &mut app,
        Method::GET,
        "/api/notes/shared-with-me",
        Some(&bob.access_token),
        None,
        None,
    )
    .await;
    assert_eq!(StatusCode::OK, response.status_code);

    let notes = response.data().as_array().unwrap();
    assert_eq!(1, notes.len());
    assert_eq!(shared_id.to_string(), notes[0]["id"]);
    assert_eq!("viewer", notes[0]["role"]);
    assert!(notes[0].get("sharedWith").is_none());
    assert!(notes[0].get("activityLog").is_none());

    // shared notes are not part of the own notes
    let response = helper::call(
        &mut app,
        Method::GET,
        "/api/notes",
        Some(&bob.access_token),
        None,
        None,
    )
    .await;
    assert_eq!(json!([]), *response.data());
}

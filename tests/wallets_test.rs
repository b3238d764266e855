mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{create_wallet, json_delete, json_get, json_post, json_put, wallet_balance};

#[tokio::test]
async fn create_wallet_defaults_balance_to_zero() {
    let app = common::setup_test_app().await.expect("setup failed");
    let (user_id, cookie) = common::logged_in_user(&app, "ana@example.com")
        .await
        .unwrap();

    let (status, body) = json_post(
        &app,
        "/wallets",
        &cookie,
        json!({ "name": "  Checking  ", "description": "   " }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["name"], "Checking");
    assert_eq!(body["balance"], 0.0);
    assert_eq!(body["owner_user_id"], user_id.as_str());
    assert!(body["description"].is_null());
}

#[tokio::test]
async fn create_wallet_validates_fields() {
    let app = common::setup_test_app().await.expect("setup failed");
    let (_, cookie) = common::logged_in_user(&app, "ana@example.com")
        .await
        .unwrap();

    for payload in [
        json!({ "name": "" }),
        json!({ "name": "A" }),
        json!({ "name": "x".repeat(51) }),
        json!({ "name": "Savings", "balance": -1.0 }),
        json!({ "name": "Savings", "balance": 1_000_000.0 }),
        json!({ "name": "Savings", "description": "d".repeat(501) }),
    ] {
        let (status, body) = json_post(&app, "/wallets", &cookie, payload.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{payload} -> {body}");
    }
}

#[tokio::test]
async fn list_wallets_newest_first_with_total() {
    let app = common::setup_test_app().await.expect("setup failed");
    let (_, cookie) = common::logged_in_user(&app, "ana@example.com")
        .await
        .unwrap();

    create_wallet(&app, &cookie, "First", 10.0).await;
    create_wallet(&app, &cookie, "Second", 20.0).await;
    create_wallet(&app, &cookie, "Third", 30.0).await;

    let (status, body) = json_get(&app, "/wallets?limit=2", &cookie).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_count"], 3);
    let names: Vec<&str> = body["wallets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|w| w["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Third", "Second"]);

    let (status, body) = json_get(&app, "/wallets?limit=2&offset=2", &cookie).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["wallets"][0]["name"], "First");

    let (status, _) = json_get(&app, "/wallets?limit=0", &cookie).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_wallet_fields() {
    let app = common::setup_test_app().await.expect("setup failed");
    let (_, cookie) = common::logged_in_user(&app, "ana@example.com")
        .await
        .unwrap();
    let wallet_id = create_wallet(&app, &cookie, "Checking", 100.0).await;
    let uri = format!("/wallets/{wallet_id}");

    let (status, _) = json_put(&app, &uri, &cookie, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = json_put(&app, &uri, &cookie, json!({ "balance": -5.0 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = json_put(
        &app,
        &uri,
        &cookie,
        json!({ "name": "Main account", "balance": 250.5, "description": "Salary" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Main account");
    assert_eq!(body["balance"], 250.5);
    assert_eq!(body["description"], "Salary");

    // An empty description clears it
    let (status, body) = json_put(&app, &uri, &cookie, json!({ "description": "" })).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["description"].is_null());
    assert_eq!(wallet_balance(&app, &cookie, &wallet_id).await, 250.5);
}

#[tokio::test]
async fn delete_wallet_removes_its_transactions() {
    let app = common::setup_test_app().await.expect("setup failed");
    let (_, cookie) = common::logged_in_user(&app, "ana@example.com")
        .await
        .unwrap();
    let wallet_id = create_wallet(&app, &cookie, "Checking", 100.0).await;
    let other_id = create_wallet(&app, &cookie, "Cash", 50.0).await;

    for wallet in [&wallet_id, &other_id] {
        let (status, _) = json_post(
            &app,
            "/transactions",
            &cookie,
            json!({ "wallet_id": wallet, "name": "Groceries", "amount": 10.0, "kind": "expense" }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, _) = json_delete(&app, &format!("/wallets/{wallet_id}"), &cookie).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = json_get(&app, &format!("/wallets/{wallet_id}"), &cookie).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = json_get(&app, "/transactions", &cookie).await;
    assert_eq!(body["total_count"], 1);
    assert_eq!(body["transactions"][0]["wallet_id"], other_id.as_str());

    let (status, _) = json_delete(&app, &format!("/wallets/{wallet_id}"), &cookie).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_wallets_sorted_by_name_and_balance() {
    let app = common::setup_test_app().await.expect("setup failed");
    let (_, cookie) = common::logged_in_user(&app, "ana@example.com")
        .await
        .unwrap();

    create_wallet(&app, &cookie, "bravo", 30.0).await;
    create_wallet(&app, &cookie, "Alpha", 10.0).await;
    create_wallet(&app, &cookie, "Charlie", 20.0).await;

    for (sort, expected) in [
        ("newest", vec!["Charlie", "Alpha", "bravo"]),
        ("oldest", vec!["bravo", "Alpha", "Charlie"]),
        ("name_asc", vec!["Alpha", "bravo", "Charlie"]),
        ("name_desc", vec!["Charlie", "bravo", "Alpha"]),
        ("balance_desc", vec!["bravo", "Charlie", "Alpha"]),
        ("balance_asc", vec!["Alpha", "Charlie", "bravo"]),
    ] {
        let (status, body) = json_get(&app, &format!("/wallets?sort={sort}"), &cookie).await;
        assert_eq!(status, StatusCode::OK, "{sort}");
        let names: Vec<&str> = body["wallets"]
            .as_array()
            .unwrap()
            .iter()
            .map(|w| w["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, expected, "{sort}");
    }

    let (status, _) = json_get(&app, "/wallets?sort=biggest", &cookie).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_wallet_balance_has_the_same_upper_bound_as_create() {
    let app = common::setup_test_app().await.expect("setup failed");
    let (_, cookie) = common::logged_in_user(&app, "ana@example.com")
        .await
        .unwrap();
    let wallet_id = create_wallet(&app, &cookie, "Checking", 100.0).await;
    let uri = format!("/wallets/{wallet_id}");

    let (status, _) = json_put(&app, &uri, &cookie, json!({ "balance": 1_000_000.0 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(wallet_balance(&app, &cookie, &wallet_id).await, 100.0);

    let (status, body) = json_put(&app, &uri, &cookie, json!({ "balance": 999_999.99 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"], 999_999.99);
}

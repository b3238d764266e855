mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{TestApp, json_delete, json_get, json_post, json_put};
use finance_server::jars::validate_jar_name;

async fn create_jar(app: &TestApp, cookie: &str, name: &str, balance: f64) -> String {
    let (status, body) = json_post(
        app,
        "/jars",
        cookie,
        json!({ "name": name, "balance": balance }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create jar: {body}");
    body["id"].as_str().expect("jar id").to_string()
}

#[tokio::test]
async fn initial_balance_is_recorded_in_history() {
    let app = common::setup_test_app().await.expect("setup failed");
    let (_, cookie) = common::logged_in_user(&app, "ana@example.com")
        .await
        .unwrap();

    let jar_id = create_jar(&app, &cookie, "Vacation", 250.0).await;

    let (status, body) = json_get(&app, &format!("/jars/{jar_id}/history"), &cookie).await;
    assert_eq!(status, StatusCode::OK);
    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["kind"], "deposit");
    assert_eq!(entries[0]["amount"], 250.0);
    assert_eq!(entries[0]["previous_balance"], 0.0);
    assert_eq!(entries[0]["new_balance"], 250.0);
    assert_eq!(entries[0]["description"], "Initial balance");

    let empty_id = create_jar(&app, &cookie, "Emergency", 0.0).await;
    let (_, body) = json_get(&app, &format!("/jars/{empty_id}/history"), &cookie).await;
    assert!(body["entries"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn deposits_and_withdrawals_append_history() {
    let app = common::setup_test_app().await.expect("setup failed");
    let (_, cookie) = common::logged_in_user(&app, "ana@example.com")
        .await
        .unwrap();
    let jar_id = create_jar(&app, &cookie, "Vacation", 0.0).await;

    let (status, body) = json_post(
        &app,
        &format!("/jars/{jar_id}/deposit"),
        &cookie,
        json!({ "amount": 100.0, "description": "Paycheck" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"], 100.0);

    let (status, body) = json_post(
        &app,
        &format!("/jars/{jar_id}/withdraw"),
        &cookie,
        json!({ "amount": 40.0 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"], 60.0);

    let (_, body) = json_get(&app, &format!("/jars/{jar_id}/history"), &cookie).await;
    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    // Newest first
    assert_eq!(entries[0]["kind"], "withdrawal");
    assert_eq!(entries[0]["previous_balance"], 100.0);
    assert_eq!(entries[0]["new_balance"], 60.0);
    assert!(entries[0]["description"].is_null());
    assert_eq!(entries[1]["kind"], "deposit");
    assert_eq!(entries[1]["description"], "Paycheck");
}

#[tokio::test]
async fn overdrawing_a_jar_changes_nothing() {
    let app = common::setup_test_app().await.expect("setup failed");
    let (_, cookie) = common::logged_in_user(&app, "ana@example.com")
        .await
        .unwrap();
    let jar_id = create_jar(&app, &cookie, "Vacation", 30.0).await;

    let (status, _) = json_post(
        &app,
        &format!("/jars/{jar_id}/withdraw"),
        &cookie,
        json!({ "amount": 30.01 }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = json_post(
        &app,
        &format!("/jars/{jar_id}/deposit"),
        &cookie,
        json!({ "amount": -5.0 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = json_get(&app, &format!("/jars/{jar_id}"), &cookie).await;
    assert_eq!(body["balance"], 30.0);
    let (_, body) = json_get(&app, &format!("/jars/{jar_id}/history"), &cookie).await;
    assert_eq!(body["entries"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn statistics_summarise_history() {
    let app = common::setup_test_app().await.expect("setup failed");
    let (_, cookie) = common::logged_in_user(&app, "ana@example.com")
        .await
        .unwrap();
    let jar_id = create_jar(&app, &cookie, "Vacation", 100.0).await;

    for (action, amount) in [("deposit", 50.0), ("withdraw", 20.0), ("withdraw", 10.0)] {
        let (status, _) = json_post(
            &app,
            &format!("/jars/{jar_id}/{action}"),
            &cookie,
            json!({ "amount": amount }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = json_get(&app, &format!("/jars/{jar_id}/statistics"), &cookie).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["jar_id"], jar_id.as_str());
    assert_eq!(body["balance"], 120.0);

    let stats = &body["statistics"];
    assert_eq!(stats["total_deposits"], 150.0);
    assert_eq!(stats["deposit_count"], 2);
    assert_eq!(stats["average_deposit"], 75.0);
    assert_eq!(stats["total_withdrawals"], 30.0);
    assert_eq!(stats["withdrawal_count"], 2);
    assert_eq!(stats["average_withdrawal"], 15.0);

    let balances: Vec<f64> = body["balance_evolution"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["balance"].as_f64().unwrap())
        .collect();
    assert_eq!(balances, vec![0.0, 100.0, 150.0, 130.0, 120.0]);
}

#[tokio::test]
async fn update_and_delete_jar() {
    let app = common::setup_test_app().await.expect("setup failed");
    let (_, cookie) = common::logged_in_user(&app, "ana@example.com")
        .await
        .unwrap();
    let jar_id = create_jar(&app, &cookie, "Vacation", 10.0).await;
    let uri = format!("/jars/{jar_id}");

    let (status, _) = json_put(&app, &uri, &cookie, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = json_put(
        &app,
        &uri,
        &cookie,
        json!({ "name": "Trip to Lisbon", "description": "Summer" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Trip to Lisbon");
    assert_eq!(body["description"], "Summer");
    assert_eq!(body["balance"], 10.0);

    let (_, body) = json_get(&app, "/jars", &cookie).await;
    assert_eq!(body["total_count"], 1);

    let (status, _) = json_delete(&app, &uri, &cookie).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = json_get(&app, &uri, &cookie).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = json_get(&app, &format!("{uri}/history"), &cookie).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let conn = app.state.main_db.read().await;
    let mut rows = conn
        .query("SELECT COUNT(*) FROM jar_history WHERE jar_id = ?", [jar_id.as_str()])
        .await
        .unwrap();
    let count: u32 = rows.next().await.unwrap().unwrap().get(0).unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn list_jars_sorted_by_balance() {
    let app = common::setup_test_app().await.expect("setup failed");
    let (_, cookie) = common::logged_in_user(&app, "ana@example.com")
        .await
        .unwrap();

    create_jar(&app, &cookie, "Small", 5.0).await;
    create_jar(&app, &cookie, "Large", 500.0).await;
    create_jar(&app, &cookie, "Medium", 50.0).await;

    for (sort, expected) in [
        ("balance_desc", vec!["Large", "Medium", "Small"]),
        ("balance_asc", vec!["Small", "Medium", "Large"]),
        ("oldest", vec!["Small", "Large", "Medium"]),
    ] {
        let (status, body) = json_get(&app, &format!("/jars?sort={sort}"), &cookie).await;
        assert_eq!(status, StatusCode::OK, "{sort}");
        let names: Vec<&str> = body["jars"]
            .as_array()
            .unwrap()
            .iter()
            .map(|j| j["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, expected, "{sort}");
    }
}

#[test]
fn jar_name_length_bounds() {
    assert!(validate_jar_name("A").is_err());
    assert_eq!(validate_jar_name("Ab").unwrap(), "Ab");
    assert!(validate_jar_name(&"x".repeat(50)).is_ok());
    assert!(validate_jar_name(&"x".repeat(51)).is_err());
    // Length counts characters, not bytes
    assert!(validate_jar_name(&"é".repeat(50)).is_ok());
    assert!(validate_jar_name(&"é".repeat(51)).is_err());
    assert_eq!(validate_jar_name("  Ab  ").unwrap(), "Ab");
    assert!(validate_jar_name(" A ").is_err());
}

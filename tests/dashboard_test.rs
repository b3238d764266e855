mod common;

use axum::http::StatusCode;
use serde_json::json;
use time::{Duration, OffsetDateTime, macros::format_description};

use common::{create_wallet, json_get, json_post};

fn date_string(date: time::Date) -> String {
    date.format(format_description!("[year]-[month]-[day]"))
        .unwrap()
}

#[tokio::test]
async fn empty_dashboard_is_all_zero() {
    let app = common::setup_test_app().await.expect("setup failed");
    let (_, cookie) = common::logged_in_user(&app, "ana@example.com")
        .await
        .unwrap();

    let (status, body) = json_get(&app, "/dashboard", &cookie).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_wallet_balance"], 0.0);
    assert_eq!(body["wallet_count"], 0);
    assert_eq!(body["total_jar_balance"], 0.0);
    assert_eq!(body["goal_count"], 0);
    assert_eq!(body["overdue_transaction_count"], 0);
    assert_eq!(body["monthly_income"], 0.0);
    assert_eq!(body["monthly_expense"], 0.0);
}

#[tokio::test]
async fn dashboard_totals_everything_the_user_owns() {
    let app = common::setup_test_app().await.expect("setup failed");
    let (_, cookie) = common::logged_in_user(&app, "ana@example.com")
        .await
        .unwrap();

    let today = OffsetDateTime::now_utc().date();
    let first_of_month = today.replace_day(1).unwrap();
    let last_month = first_of_month - Duration::days(1);

    let checking = create_wallet(&app, &cookie, "Checking", 1000.0).await;
    create_wallet(&app, &cookie, "Cash", 50.5).await;

    for (name, amount, kind, due) in [
        ("Salary", 2000.0, "income", first_of_month),
        ("Rent", 900.0, "expense", first_of_month),
        ("Old salary", 1800.0, "income", last_month),
    ] {
        let (status, body) = json_post(
            &app,
            "/transactions",
            &cookie,
            json!({
                "wallet_id": checking,
                "name": name,
                "amount": amount,
                "kind": kind,
                "due_date": date_string(due)
            }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
    }
    // 1000 + 2000 - 900 + 1800 = 3900 in checking

    let (status, _) = json_post(
        &app,
        "/jars",
        &cookie,
        json!({ "name": "Vacation", "balance": 300.0 }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    for (name, accumulated, deadline) in [
        ("Done", 100.0, today + Duration::days(10)),
        ("Late", 0.0, today - Duration::days(1)),
        ("Open", 10.0, today + Duration::days(10)),
    ] {
        let (status, _) = json_post(
            &app,
            "/goals",
            &cookie,
            json!({
                "name": name,
                "target_amount": 100.0,
                "accumulated_amount": accumulated,
                "deadline": date_string(deadline)
            }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = json_get(&app, "/dashboard", &cookie).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_wallet_balance"], 3950.5);
    assert_eq!(body["wallet_count"], 2);
    assert_eq!(body["total_jar_balance"], 300.0);
    assert_eq!(body["jar_count"], 1);
    assert_eq!(body["goal_count"], 3);
    assert_eq!(body["completed_goal_count"], 1);
    assert_eq!(body["overdue_goal_count"], 1);
    assert_eq!(body["active_transaction_count"], 3);
    // Everything due on the 1st is overdue unless today is the 1st
    let expected_overdue = if today == first_of_month { 1 } else { 3 };
    assert_eq!(body["overdue_transaction_count"], expected_overdue);
    assert_eq!(body["monthly_income"], 2000.0);
    assert_eq!(body["monthly_expense"], 900.0);
}

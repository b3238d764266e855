mod common;

use std::time::Duration;

use axum::http::StatusCode;
use finance_server::with_transaction;

async fn user_count(app: &common::TestApp) -> i64 {
    let conn = app.state.main_db.read().await;
    let mut rows = conn
        .query("SELECT COUNT(*) FROM users", ())
        .await
        .expect("count users");
    let row = rows.next().await.expect("next row").expect("count row");
    row.get::<i64>(0).expect("count value")
}

async fn insert_user(conn: &libsql::Connection, id: &str, email: &str) -> Result<(), (StatusCode, String)> {
    conn.execute(
        "INSERT INTO users (id, email, full_name, password_hash, created_at) VALUES (?, ?, NULL, 'hash', '2024-01-01T00:00:00.000000Z')",
        (id, email),
    )
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(())
}

#[tokio::test]
async fn cancelled_transaction_rolls_back_and_frees_connection() {
    let app = common::setup_test_app().await.expect("setup failed");
    let db = app.state.main_db.clone();

    let cancelled = tokio::time::timeout(
        Duration::from_millis(50),
        with_transaction(&db, |conn| {
            Box::pin(async move {
                insert_user(conn, "user-1", "first@example.com").await?;
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, (StatusCode, String)>(())
            })
        }),
    )
    .await;
    assert!(cancelled.is_err(), "transaction should have timed out");

    let next = with_transaction(&db, |conn| {
        Box::pin(async move {
            insert_user(conn, "user-2", "second@example.com").await?;
            Ok::<_, (StatusCode, String)>(())
        })
    })
    .await;
    assert!(next.is_ok(), "next transaction failed: {next:?}");

    assert_eq!(user_count(&app).await, 1, "cancelled insert must be rolled back");
    assert!(db.read().await.is_autocommit());
}

#[tokio::test]
async fn failed_transaction_rolls_back() {
    let app = common::setup_test_app().await.expect("setup failed");
    let db = app.state.main_db.clone();

    let result = with_transaction(&db, |conn| {
        Box::pin(async move {
            insert_user(conn, "user-1", "first@example.com").await?;
            Err::<(), _>((StatusCode::CONFLICT, "rejected".to_string()))
        })
    })
    .await;
    assert_eq!(result.unwrap_err().0, StatusCode::CONFLICT);

    assert_eq!(user_count(&app).await, 0);
    assert!(db.read().await.is_autocommit());
}

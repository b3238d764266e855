#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use finance_server::{AppState, constants::*, database, router};
use serde_json::Value;
use time::Duration;
use tower::util::ServiceExt;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer, cookie::Key};
use uuid::Uuid;

pub const TEST_PASSWORD: &str = "password123";

#[derive(Clone)]
pub struct TestConfig {
    pub temp_dir_path: String,
}

impl TestConfig {
    pub fn new() -> anyhow::Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let temp_dir_path = temp_dir.path().to_string_lossy().to_string();
        std::mem::forget(temp_dir);
        Ok(Self { temp_dir_path })
    }

    pub fn data_path(&self) -> String {
        self.temp_dir_path.clone()
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

pub async fn setup_test_app() -> anyhow::Result<TestApp> {
    let test_config = TestConfig::new()?;

    let main_db = database::init_main_db(&test_config.data_path())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize database: {}", e))?;

    let app_state = AppState { main_db };

    let session_secret = "test_secret_key_at_least_64_chars_long_test_secret_key_at_least_64_";
    let session_key = Key::try_from(session_secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid session secret: {}", e))?;

    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_name(SESSION_NAME)
        .with_expiry(Expiry::OnInactivity(Duration::days(SESSION_EXPIRY_DAYS)))
        .with_signed(session_key);

    let router = router::api_routes()
        .layer(session_layer)
        .with_state(app_state.clone());

    Ok(TestApp {
        router,
        state: app_state,
    })
}

pub async fn create_test_user(
    app_state: &AppState,
    email: &str,
    password: &str,
) -> anyhow::Result<String> {
    use argon2::{
        Argon2,
        password_hash::{PasswordHasher, SaltString},
    };
    use password_hash::rand_core::OsRng;

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();

    let user_id = Uuid::new_v4().to_string();

    let conn = app_state.main_db.write().await;
    conn.execute(
        "INSERT INTO users (id, email, full_name, password_hash, created_at) VALUES (?, ?, NULL, ?, '2024-01-01T00:00:00.000000Z')",
        (user_id.as_str(), email, hash.as_str()),
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to create test user: {}", e))?;

    Ok(user_id)
}

/// Log in and return the `name=value` part of the session cookie.
pub async fn login_user(app: &Router, email: &str, password: &str) -> anyhow::Result<String> {
    let payload = serde_json::json!({
        "email": email,
        "password": password
    });

    let request = Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .map_err(|e| anyhow::anyhow!("Failed to build request: {}", e))?;

    let response = app
        .clone()
        .oneshot(request)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to execute request: {}", e))?;

    session_cookie(&response).ok_or_else(|| anyhow::anyhow!("No session cookie in response"))
}

pub fn session_cookie<B>(response: &axum::http::Response<B>) -> Option<String> {
    response
        .headers()
        .get("set-cookie")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

/// Create a user and log them in in one step.
pub async fn logged_in_user(app: &TestApp, email: &str) -> anyhow::Result<(String, String)> {
    let user_id = create_test_user(&app.state, email, TEST_PASSWORD).await?;
    let cookie = login_user(&app.router, email, TEST_PASSWORD).await?;
    Ok((user_id, cookie))
}

pub async fn send(
    app: &TestApp,
    method: &str,
    uri: &str,
    cookie: Option<&str>,
    payload: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    let body = match payload {
        Some(payload) => Body::from(payload.to_string()),
        None => Body::empty(),
    };
    let request = builder.body(body).expect("build request");

    let response = app
        .router
        .clone()
        .oneshot(request)
        .await
        .expect("execute request");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let body = serde_json::from_slice(&bytes).unwrap_or_else(|_| {
        Value::String(String::from_utf8(bytes.to_vec()).expect("utf8"))
    });
    (status, body)
}

pub async fn json_post(app: &TestApp, uri: &str, cookie: &str, payload: Value) -> (StatusCode, Value) {
    send(app, "POST", uri, Some(cookie), Some(payload)).await
}

pub async fn json_put(app: &TestApp, uri: &str, cookie: &str, payload: Value) -> (StatusCode, Value) {
    send(app, "PUT", uri, Some(cookie), Some(payload)).await
}

pub async fn json_get(app: &TestApp, uri: &str, cookie: &str) -> (StatusCode, Value) {
    send(app, "GET", uri, Some(cookie), None).await
}

pub async fn json_delete(app: &TestApp, uri: &str, cookie: &str) -> (StatusCode, Value) {
    send(app, "DELETE", uri, Some(cookie), None).await
}

/// Create a wallet and return its id.
pub async fn create_wallet(app: &TestApp, cookie: &str, name: &str, balance: f64) -> String {
    let (status, body) = json_post(
        app,
        "/wallets",
        cookie,
        serde_json::json!({ "name": name, "balance": balance }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create wallet: {body}");
    body["id"].as_str().expect("wallet id").to_string()
}

pub async fn wallet_balance(app: &TestApp, cookie: &str, wallet_id: &str) -> f64 {
    let (status, body) = json_get(app, &format!("/wallets/{wallet_id}"), cookie).await;
    assert_eq!(status, StatusCode::OK, "get wallet: {body}");
    body["balance"].as_f64().expect("balance")
}

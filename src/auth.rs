use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use axum::{Json, extract::State, http::StatusCode};
use password_hash::rand_core::OsRng;
use tower_sessions::Session;
use uuid::Uuid;

use crate::constants::*;
use crate::models::{ChangePasswordPayload, LoginPayload, PublicUser, RegisterPayload};
use crate::utils::{bad_request, db_error_with_context, now_timestamp};
use crate::{AppState, Db};

/// Normalise and validate an email address: trimmed, lower-cased, a single
/// `@` with something on both sides.
pub fn validate_email(email: &str) -> Result<String, (StatusCode, String)> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err(bad_request("Email cannot be empty"));
    }
    if email.len() > MAX_EMAIL_LENGTH {
        return Err(bad_request(format!(
            "Email must be at most {} characters",
            MAX_EMAIL_LENGTH
        )));
    }
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.contains(char::is_whitespace) =>
        {
            Ok(email)
        }
        _ => Err(bad_request("Invalid email address")),
    }
}

pub fn validate_password(password: &str) -> Result<(), (StatusCode, String)> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(bad_request(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    if length > MAX_PASSWORD_LENGTH {
        return Err(bad_request(format!(
            "Password must be at most {} characters",
            MAX_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

fn validate_full_name(full_name: Option<&str>) -> Result<Option<String>, (StatusCode, String)> {
    match full_name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) if name.chars().count() > MAX_FULL_NAME_LENGTH => Err(bad_request(format!(
            "Full name must be at most {} characters",
            MAX_FULL_NAME_LENGTH
        ))),
        Some(name) => Ok(Some(name.to_string())),
        None => Ok(None),
    }
}

pub fn hash_password(password: &str) -> Result<String, (StatusCode, String)> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            tracing::error!(error = %e, "password hashing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to hash password".to_string(),
            )
        })
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::error!(error = %e, "stored password hash is malformed");
            false
        }
    }
}

/// The user stored in the session, or 401 when there is none.
pub async fn get_current_user(session: &Session) -> Result<PublicUser, (StatusCode, String)> {
    session
        .get::<PublicUser>(SESSION_USER_KEY)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "failed to read session");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ERR_INVALID_SESSION.to_string(),
            )
        })?
        .ok_or_else(|| (StatusCode::UNAUTHORIZED, ERR_UNAUTHORIZED.to_string()))
}

async fn start_session(session: &Session, user: &PublicUser) -> Result<(), (StatusCode, String)> {
    session.cycle_id().await.map_err(|e| {
        tracing::error!(error = %e, "failed to cycle session id");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            ERR_INVALID_SESSION.to_string(),
        )
    })?;
    session.insert(SESSION_USER_KEY, user).await.map_err(|e| {
        tracing::error!(error = %e, "failed to store user in session");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            ERR_INVALID_SESSION.to_string(),
        )
    })
}

struct StoredUser {
    user: PublicUser,
    password_hash: String,
}

async fn find_user_by_email(
    db: &Db,
    email: &str,
) -> Result<Option<StoredUser>, (StatusCode, String)> {
    let conn = db.read().await;
    let mut rows = conn
        .query(
            "SELECT id, email, full_name, password_hash FROM users WHERE email = ?",
            [email],
        )
        .await
        .map_err(|e| db_error_with_context("failed to query user", e))?;

    let Some(row) = rows
        .next()
        .await
        .map_err(|e| db_error_with_context("failed to read user", e))?
    else {
        return Ok(None);
    };

    let read = |e: libsql::Error| db_error_with_context("invalid user data", e);
    Ok(Some(StoredUser {
        user: PublicUser {
            id: row.get(0).map_err(read)?,
            email: row.get(1).map_err(read)?,
            full_name: row.get(2).map_err(read)?,
        },
        password_hash: row.get(3).map_err(read)?,
    }))
}

async fn find_password_hash(db: &Db, user_id: &str) -> Result<String, (StatusCode, String)> {
    let conn = db.read().await;
    let mut rows = conn
        .query("SELECT password_hash FROM users WHERE id = ?", [user_id])
        .await
        .map_err(|e| db_error_with_context("failed to query user", e))?;

    match rows
        .next()
        .await
        .map_err(|e| db_error_with_context("failed to read user", e))?
    {
        Some(row) => row
            .get(0)
            .map_err(|e| db_error_with_context("invalid user data", e)),
        None => Err((StatusCode::UNAUTHORIZED, ERR_UNAUTHORIZED.to_string())),
    }
}

pub async fn register(
    State(app_state): State<AppState>,
    session: Session,
    Json(payload): Json<RegisterPayload>,
) -> Result<(StatusCode, Json<PublicUser>), (StatusCode, String)> {
    let email = validate_email(&payload.email)?;
    validate_password(&payload.password)?;
    let full_name = validate_full_name(payload.full_name.as_deref())?;

    if find_user_by_email(&app_state.main_db, &email).await?.is_some() {
        return Err((
            StatusCode::CONFLICT,
            "Email is already registered".to_string(),
        ));
    }

    let password_hash = hash_password(&payload.password)?;
    let user = PublicUser {
        id: Uuid::new_v4().to_string(),
        email,
        full_name,
    };
    let now = now_timestamp()?;

    {
        let conn = app_state.main_db.write().await;
        conn.execute(
            "INSERT INTO users (id, email, full_name, password_hash, created_at) VALUES (?, ?, ?, ?, ?)",
            (
                user.id.as_str(),
                user.email.as_str(),
                user.full_name.as_deref(),
                password_hash.as_str(),
                now.as_str(),
            ),
        )
        .await
        .map_err(|e| {
            // Lost a race against a concurrent registration for the same email
            if e.to_string().contains("UNIQUE") {
                (
                    StatusCode::CONFLICT,
                    "Email is already registered".to_string(),
                )
            } else {
                db_error_with_context("user creation failed", e)
            }
        })?;
    }

    start_session(&session, &user).await?;
    tracing::info!(user_id = %user.id, "user registered");

    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(
    State(app_state): State<AppState>,
    session: Session,
    Json(payload): Json<LoginPayload>,
) -> Result<(StatusCode, Json<PublicUser>), (StatusCode, String)> {
    let invalid = || {
        (
            StatusCode::UNAUTHORIZED,
            ERR_INVALID_CREDENTIALS.to_string(),
        )
    };

    let email = payload.email.trim().to_lowercase();
    let stored = find_user_by_email(&app_state.main_db, &email)
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&payload.password, &stored.password_hash) {
        tracing::info!(user_id = %stored.user.id, "rejected login with wrong password");
        return Err(invalid());
    }

    start_session(&session, &stored.user).await?;

    Ok((StatusCode::OK, Json(stored.user)))
}

pub async fn me(session: Session) -> Result<(StatusCode, Json<PublicUser>), (StatusCode, String)> {
    let user = get_current_user(&session).await?;
    Ok((StatusCode::OK, Json(user)))
}

pub async fn logout(session: Session) -> Result<StatusCode, (StatusCode, String)> {
    session.flush().await.map_err(|e| {
        tracing::error!(error = %e, "failed to flush session");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            ERR_INVALID_SESSION.to_string(),
        )
    })?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn change_password(
    State(app_state): State<AppState>,
    session: Session,
    Json(payload): Json<ChangePasswordPayload>,
) -> Result<StatusCode, (StatusCode, String)> {
    let user = get_current_user(&session).await?;
    validate_password(&payload.new_password)?;

    let stored_hash = find_password_hash(&app_state.main_db, &user.id).await?;
    if !verify_password(&payload.current_password, &stored_hash) {
        return Err((
            StatusCode::UNAUTHORIZED,
            "Current password is incorrect".to_string(),
        ));
    }

    let new_hash = hash_password(&payload.new_password)?;
    let conn = app_state.main_db.write().await;
    let affected_rows = conn
        .execute(
            "UPDATE users SET password_hash = ? WHERE id = ?",
            (new_hash.as_str(), user.id.as_str()),
        )
        .await
        .map_err(|e| db_error_with_context("failed to update password", e))?;

    if affected_rows == 0 {
        return Err((StatusCode::UNAUTHORIZED, ERR_UNAUTHORIZED.to_string()));
    }

    tracing::info!(user_id = %user.id, "password changed");
    Ok(StatusCode::NO_CONTENT)
}

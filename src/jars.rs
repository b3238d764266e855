use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use libsql::{Connection, params};
use tower_sessions::Session;
use uuid::Uuid;

use crate::auth::get_current_user;
use crate::constants::*;
use crate::finance::{balance_evolution, deposit, round_cents, validate_balance, withdraw};
use crate::models::{
    CreateJarPayload, GetJarHistoryResponse, GetJarsResponse, JarEntryKind, JarHistoryEntry,
    JarMovementPayload, JarStatistics, JarStatisticsResponse, ListQuery, SavingsJar,
    UpdateJarPayload,
};
use crate::utils::{
    bad_request, db_error_with_context, fetch_count, not_found, now_timestamp,
    validate_description, validate_limit, validate_name, validate_offset,
};
use crate::{AppState, with_transaction};

const JAR_COLUMNS: &str = "id, owner_user_id, name, balance, description, created_at, updated_at";
const HISTORY_COLUMNS: &str =
    "id, jar_id, kind, amount, previous_balance, new_balance, description, created_at";

pub fn validate_jar_name(name: &str) -> Result<String, (StatusCode, String)> {
    validate_name(name, "Jar name", MIN_NAME_LENGTH, MAX_JAR_NAME_LENGTH)
}

pub fn extract_jar_from_row(row: libsql::Row) -> Result<SavingsJar, (StatusCode, String)> {
    let read = |e: libsql::Error| db_error_with_context("invalid jar data", e);

    Ok(SavingsJar {
        id: row.get(0).map_err(read)?,
        owner_user_id: row.get(1).map_err(read)?,
        name: row.get(2).map_err(read)?,
        balance: row.get(3).map_err(read)?,
        description: row.get(4).map_err(read)?,
        created_at: row.get(5).map_err(read)?,
        updated_at: row.get(6).map_err(read)?,
    })
}

pub fn extract_history_entry_from_row(
    row: libsql::Row,
) -> Result<JarHistoryEntry, (StatusCode, String)> {
    let read = |e: libsql::Error| db_error_with_context("invalid jar history data", e);

    let kind: String = row.get(2).map_err(read)?;
    let kind = kind
        .parse::<JarEntryKind>()
        .map_err(|e| db_error_with_context("invalid jar history data", e))?;

    Ok(JarHistoryEntry {
        id: row.get(0).map_err(read)?,
        jar_id: row.get(1).map_err(read)?,
        kind,
        amount: row.get(3).map_err(read)?,
        previous_balance: row.get(4).map_err(read)?,
        new_balance: row.get(5).map_err(read)?,
        description: row.get(6).map_err(read)?,
        created_at: row.get(7).map_err(read)?,
    })
}

async fn fetch_jar(
    conn: &Connection,
    user_id: &str,
    jar_id: &str,
) -> Result<Option<SavingsJar>, (StatusCode, String)> {
    let mut rows = conn
        .query(
            &format!(
                "SELECT {} FROM savings_jars WHERE id = ? AND owner_user_id = ?",
                JAR_COLUMNS
            ),
            (jar_id, user_id),
        )
        .await
        .map_err(|e| db_error_with_context("failed to query jar", e))?;

    match rows
        .next()
        .await
        .map_err(|e| db_error_with_context("failed to read jar", e))?
    {
        Some(row) => Ok(Some(extract_jar_from_row(row)?)),
        None => Ok(None),
    }
}

async fn fetch_history(
    conn: &Connection,
    user_id: &str,
    jar_id: &str,
) -> Result<Vec<JarHistoryEntry>, (StatusCode, String)> {
    let mut rows = conn
        .query(
            &format!(
                "SELECT {} FROM jar_history WHERE jar_id = ? AND owner_user_id = ? ORDER BY created_at DESC, rowid DESC",
                HISTORY_COLUMNS
            ),
            (jar_id, user_id),
        )
        .await
        .map_err(|e| db_error_with_context("failed to query jar history", e))?;

    let mut entries = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| db_error_with_context("failed to read jar history", e))?
    {
        entries.push(extract_history_entry_from_row(row)?);
    }
    Ok(entries)
}

async fn insert_history_entry(
    conn: &Connection,
    user_id: &str,
    entry: &JarHistoryEntry,
) -> Result<(), (StatusCode, String)> {
    conn.execute(
        "INSERT INTO jar_history (id, jar_id, owner_user_id, kind, amount, previous_balance, new_balance, description, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            entry.id.as_str(),
            entry.jar_id.as_str(),
            user_id,
            entry.kind.as_str(),
            entry.amount,
            entry.previous_balance,
            entry.new_balance,
            entry.description.as_deref(),
            entry.created_at.as_str(),
        ],
    )
    .await
    .map_err(|e| db_error_with_context("failed to record jar history", e))?;
    Ok(())
}

pub async fn create_jar(
    State(app_state): State<AppState>,
    session: Session,
    Json(payload): Json<CreateJarPayload>,
) -> Result<(StatusCode, Json<SavingsJar>), (StatusCode, String)> {
    let user = get_current_user(&session).await?;

    let name = validate_jar_name(&payload.name)?;
    let balance = validate_balance(payload.balance.unwrap_or(0.0), MAX_MOVEMENT_AMOUNT)?;
    let description = validate_description(payload.description.as_deref())?;
    let now = now_timestamp()?;

    let jar = SavingsJar {
        id: Uuid::new_v4().to_string(),
        owner_user_id: user.id,
        name,
        balance,
        description,
        created_at: now.clone(),
        updated_at: now,
    };

    let jar = with_transaction(&app_state.main_db, |conn| {
        Box::pin(async move {
            conn.execute(
                "INSERT INTO savings_jars (id, owner_user_id, name, balance, description, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
                (
                    jar.id.as_str(),
                    jar.owner_user_id.as_str(),
                    jar.name.as_str(),
                    jar.balance,
                    jar.description.as_deref(),
                    jar.created_at.as_str(),
                    jar.updated_at.as_str(),
                ),
            )
            .await
            .map_err(|e| db_error_with_context("jar creation failed", e))?;

            if jar.balance > 0.0 {
                let entry = JarHistoryEntry {
                    id: Uuid::new_v4().to_string(),
                    jar_id: jar.id.clone(),
                    kind: JarEntryKind::Deposit,
                    amount: jar.balance,
                    previous_balance: 0.0,
                    new_balance: jar.balance,
                    description: Some(INITIAL_BALANCE_DESCRIPTION.to_string()),
                    created_at: jar.created_at.clone(),
                };
                insert_history_entry(conn, &jar.owner_user_id, &entry).await?;
            }

            Ok::<_, (StatusCode, String)>(jar)
        })
    })
    .await?;

    Ok((StatusCode::CREATED, Json(jar)))
}

pub async fn get_jars(
    State(app_state): State<AppState>,
    session: Session,
    Query(query): Query<ListQuery>,
) -> Result<(StatusCode, Json<GetJarsResponse>), (StatusCode, String)> {
    let user = get_current_user(&session).await?;
    let limit = validate_limit(query.limit, DEFAULT_LIST_LIMIT)?;
    let offset = validate_offset(query.offset)?;

    let conn = app_state.main_db.read().await;

    let total_count = fetch_count(
        &conn,
        "SELECT COUNT(*) FROM savings_jars WHERE owner_user_id = ?",
        [user.id.as_str()],
        "failed to count jars",
    )
    .await?;

    let mut rows = conn
        .query(
            &format!(
                "SELECT {} FROM savings_jars WHERE owner_user_id = ? ORDER BY {} LIMIT ? OFFSET ?",
                JAR_COLUMNS,
                query.sort.order_by()
            ),
            (user.id.as_str(), limit, offset),
        )
        .await
        .map_err(|e| db_error_with_context("failed to query jars", e))?;

    let mut jars = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| db_error_with_context("failed to read jars", e))?
    {
        jars.push(extract_jar_from_row(row)?);
    }

    Ok((StatusCode::OK, Json(GetJarsResponse { jars, total_count })))
}

pub async fn get_jar(
    State(app_state): State<AppState>,
    session: Session,
    Path(jar_id): Path<String>,
) -> Result<(StatusCode, Json<SavingsJar>), (StatusCode, String)> {
    let user = get_current_user(&session).await?;

    let conn = app_state.main_db.read().await;
    let jar = fetch_jar(&conn, &user.id, &jar_id)
        .await?
        .ok_or_else(|| not_found("Jar"))?;

    Ok((StatusCode::OK, Json(jar)))
}

/// Rename or re-describe a jar. The balance only moves through deposits and
/// withdrawals so the history always adds up.
pub async fn update_jar(
    State(app_state): State<AppState>,
    session: Session,
    Path(jar_id): Path<String>,
    Json(payload): Json<UpdateJarPayload>,
) -> Result<(StatusCode, Json<SavingsJar>), (StatusCode, String)> {
    let user = get_current_user(&session).await?;

    if payload.name.is_none() && payload.description.is_none() {
        return Err(bad_request(
            "At least one field must be provided for update",
        ));
    }

    let name = payload.name.as_deref().map(validate_jar_name).transpose()?;
    let description = payload
        .description
        .as_deref()
        .map(|d| validate_description(Some(d)))
        .transpose()?;

    let conn = app_state.main_db.write().await;

    let existing = fetch_jar(&conn, &user.id, &jar_id)
        .await?
        .ok_or_else(|| not_found("Jar"))?;

    let updated = SavingsJar {
        name: name.unwrap_or(existing.name),
        description: description.unwrap_or(existing.description),
        updated_at: now_timestamp()?,
        ..existing
    };

    let affected_rows = conn
        .execute(
            "UPDATE savings_jars SET name = ?, description = ?, updated_at = ? WHERE id = ? AND owner_user_id = ?",
            (
                updated.name.as_str(),
                updated.description.as_deref(),
                updated.updated_at.as_str(),
                jar_id.as_str(),
                user.id.as_str(),
            ),
        )
        .await
        .map_err(|e| db_error_with_context("failed to update jar", e))?;

    if affected_rows == 0 {
        return Err(not_found("Jar"));
    }

    Ok((StatusCode::OK, Json(updated)))
}

pub async fn delete_jar(
    State(app_state): State<AppState>,
    session: Session,
    Path(jar_id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    let user = get_current_user(&session).await?;

    with_transaction(&app_state.main_db, |conn| {
        let user_id = user.id.clone();
        let jar_id = jar_id.clone();
        Box::pin(async move {
            if fetch_jar(conn, &user_id, &jar_id).await?.is_none() {
                return Err(not_found("Jar"));
            }

            conn.execute(
                "DELETE FROM jar_history WHERE jar_id = ? AND owner_user_id = ?",
                (jar_id.as_str(), user_id.as_str()),
            )
            .await
            .map_err(|e| db_error_with_context("failed to delete jar history", e))?;

            conn.execute(
                "DELETE FROM savings_jars WHERE id = ? AND owner_user_id = ?",
                (jar_id.as_str(), user_id.as_str()),
            )
            .await
            .map_err(|e| db_error_with_context("failed to delete jar", e))?;

            Ok(())
        })
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Move money into or out of a jar and append the matching history entry.
async fn move_jar_balance(
    app_state: &AppState,
    user_id: String,
    jar_id: String,
    kind: JarEntryKind,
    payload: JarMovementPayload,
) -> Result<SavingsJar, (StatusCode, String)> {
    let description = validate_description(payload.description.as_deref())?;
    let now = now_timestamp()?;

    let jar = with_transaction(&app_state.main_db, |conn| {
        Box::pin(async move {
            let jar = fetch_jar(conn, &user_id, &jar_id)
                .await?
                .ok_or_else(|| not_found("Jar"))?;

            let new_balance = match kind {
                JarEntryKind::Deposit => deposit(jar.balance, payload.amount)?,
                JarEntryKind::Withdrawal => withdraw(jar.balance, payload.amount)?,
            };

            let entry = JarHistoryEntry {
                id: Uuid::new_v4().to_string(),
                jar_id: jar.id.clone(),
                kind,
                amount: round_cents(payload.amount),
                previous_balance: jar.balance,
                new_balance,
                description,
                created_at: now.clone(),
            };

            conn.execute(
                "UPDATE savings_jars SET balance = ?, updated_at = ? WHERE id = ? AND owner_user_id = ?",
                (new_balance, now.as_str(), jar.id.as_str(), user_id.as_str()),
            )
            .await
            .map_err(|e| db_error_with_context("failed to update jar balance", e))?;

            insert_history_entry(conn, &user_id, &entry).await?;

            Ok::<_, (StatusCode, String)>(SavingsJar {
                balance: new_balance,
                updated_at: now,
                ..jar
            })
        })
    })
    .await?;

    tracing::debug!(jar_id = %jar.id, kind = %kind, balance = jar.balance, "jar balance moved");

    Ok(jar)
}

pub async fn deposit_to_jar(
    State(app_state): State<AppState>,
    session: Session,
    Path(jar_id): Path<String>,
    Json(payload): Json<JarMovementPayload>,
) -> Result<(StatusCode, Json<SavingsJar>), (StatusCode, String)> {
    let user = get_current_user(&session).await?;
    let jar = move_jar_balance(&app_state, user.id, jar_id, JarEntryKind::Deposit, payload).await?;
    Ok((StatusCode::OK, Json(jar)))
}

pub async fn withdraw_from_jar(
    State(app_state): State<AppState>,
    session: Session,
    Path(jar_id): Path<String>,
    Json(payload): Json<JarMovementPayload>,
) -> Result<(StatusCode, Json<SavingsJar>), (StatusCode, String)> {
    let user = get_current_user(&session).await?;
    let jar =
        move_jar_balance(&app_state, user.id, jar_id, JarEntryKind::Withdrawal, payload).await?;
    Ok((StatusCode::OK, Json(jar)))
}

pub async fn get_jar_history(
    State(app_state): State<AppState>,
    session: Session,
    Path(jar_id): Path<String>,
) -> Result<(StatusCode, Json<GetJarHistoryResponse>), (StatusCode, String)> {
    let user = get_current_user(&session).await?;

    let conn = app_state.main_db.read().await;
    if fetch_jar(&conn, &user.id, &jar_id).await?.is_none() {
        return Err(not_found("Jar"));
    }
    let entries = fetch_history(&conn, &user.id, &jar_id).await?;

    Ok((StatusCode::OK, Json(GetJarHistoryResponse { entries })))
}

pub async fn get_jar_statistics(
    State(app_state): State<AppState>,
    session: Session,
    Path(jar_id): Path<String>,
) -> Result<(StatusCode, Json<JarStatisticsResponse>), (StatusCode, String)> {
    let user = get_current_user(&session).await?;

    let conn = app_state.main_db.read().await;
    let jar = fetch_jar(&conn, &user.id, &jar_id)
        .await?
        .ok_or_else(|| not_found("Jar"))?;
    let entries = fetch_history(&conn, &user.id, &jar_id).await?;

    Ok((
        StatusCode::OK,
        Json(JarStatisticsResponse {
            statistics: JarStatistics::from_history(&entries),
            balance_evolution: balance_evolution(&jar.created_at, &entries),
            jar_id: jar.id,
            balance: jar.balance,
        }),
    ))
}

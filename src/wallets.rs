use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use libsql::Connection;
use tower_sessions::Session;
use uuid::Uuid;

use crate::auth::get_current_user;
use crate::constants::*;
use crate::finance::validate_balance;
use crate::models::{
    CreateWalletPayload, GetWalletsResponse, ListQuery, UpdateWalletPayload, Wallet,
};
use crate::utils::{
    bad_request, db_error_with_context, fetch_count, not_found, now_timestamp,
    validate_description, validate_limit, validate_name, validate_offset,
};
use crate::{AppState, with_transaction};

const WALLET_COLUMNS: &str =
    "id, owner_user_id, name, balance, description, created_at, updated_at";

pub fn validate_wallet_name(name: &str) -> Result<String, (StatusCode, String)> {
    validate_name(name, "Wallet name", MIN_NAME_LENGTH, MAX_WALLET_NAME_LENGTH)
}

pub fn extract_wallet_from_row(row: libsql::Row) -> Result<Wallet, (StatusCode, String)> {
    let read = |e: libsql::Error| db_error_with_context("invalid wallet data", e);

    Ok(Wallet {
        id: row.get(0).map_err(read)?,
        owner_user_id: row.get(1).map_err(read)?,
        name: row.get(2).map_err(read)?,
        balance: row.get(3).map_err(read)?,
        description: row.get(4).map_err(read)?,
        created_at: row.get(5).map_err(read)?,
        updated_at: row.get(6).map_err(read)?,
    })
}

/// Load a wallet owned by `user_id`.
pub(crate) async fn fetch_wallet(
    conn: &Connection,
    user_id: &str,
    wallet_id: &str,
) -> Result<Option<Wallet>, (StatusCode, String)> {
    let mut rows = conn
        .query(
            &format!(
                "SELECT {} FROM wallets WHERE id = ? AND owner_user_id = ?",
                WALLET_COLUMNS
            ),
            (wallet_id, user_id),
        )
        .await
        .map_err(|e| db_error_with_context("failed to query wallet", e))?;

    match rows
        .next()
        .await
        .map_err(|e| db_error_with_context("failed to read wallet", e))?
    {
        Some(row) => Ok(Some(extract_wallet_from_row(row)?)),
        None => Ok(None),
    }
}

pub(crate) async fn store_wallet_balance(
    conn: &Connection,
    user_id: &str,
    wallet_id: &str,
    balance: f64,
    now: &str,
) -> Result<(), (StatusCode, String)> {
    let affected_rows = conn
        .execute(
            "UPDATE wallets SET balance = ?, updated_at = ? WHERE id = ? AND owner_user_id = ?",
            (balance, now, wallet_id, user_id),
        )
        .await
        .map_err(|e| db_error_with_context("failed to update wallet balance", e))?;

    if affected_rows == 0 {
        return Err(not_found("Wallet"));
    }
    Ok(())
}

pub async fn create_wallet(
    State(app_state): State<AppState>,
    session: Session,
    Json(payload): Json<CreateWalletPayload>,
) -> Result<(StatusCode, Json<Wallet>), (StatusCode, String)> {
    let user = get_current_user(&session).await?;

    let name = validate_wallet_name(&payload.name)?;
    let balance = validate_balance(payload.balance.unwrap_or(0.0), MAX_MOVEMENT_AMOUNT)?;
    let description = validate_description(payload.description.as_deref())?;
    let now = now_timestamp()?;

    let wallet = Wallet {
        id: Uuid::new_v4().to_string(),
        owner_user_id: user.id,
        name,
        balance,
        description,
        created_at: now.clone(),
        updated_at: now,
    };

    let conn = app_state.main_db.write().await;
    conn.execute(
        "INSERT INTO wallets (id, owner_user_id, name, balance, description, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        (
            wallet.id.as_str(),
            wallet.owner_user_id.as_str(),
            wallet.name.as_str(),
            wallet.balance,
            wallet.description.as_deref(),
            wallet.created_at.as_str(),
            wallet.updated_at.as_str(),
        ),
    )
    .await
    .map_err(|e| db_error_with_context("wallet creation failed", e))?;

    tracing::debug!(wallet_id = %wallet.id, "wallet created");

    Ok((StatusCode::CREATED, Json(wallet)))
}

pub async fn get_wallets(
    State(app_state): State<AppState>,
    session: Session,
    Query(query): Query<ListQuery>,
) -> Result<(StatusCode, Json<GetWalletsResponse>), (StatusCode, String)> {
    let user = get_current_user(&session).await?;
    let limit = validate_limit(query.limit, DEFAULT_LIST_LIMIT)?;
    let offset = validate_offset(query.offset)?;

    let conn = app_state.main_db.read().await;

    let total_count = fetch_count(
        &conn,
        "SELECT COUNT(*) FROM wallets WHERE owner_user_id = ?",
        [user.id.as_str()],
        "failed to count wallets",
    )
    .await?;

    let mut rows = conn
        .query(
            &format!(
                "SELECT {} FROM wallets WHERE owner_user_id = ? ORDER BY {} LIMIT ? OFFSET ?",
                WALLET_COLUMNS,
                query.sort.order_by()
            ),
            (user.id.as_str(), limit, offset),
        )
        .await
        .map_err(|e| db_error_with_context("failed to query wallets", e))?;

    let mut wallets = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| db_error_with_context("failed to read wallets", e))?
    {
        wallets.push(extract_wallet_from_row(row)?);
    }

    Ok((
        StatusCode::OK,
        Json(GetWalletsResponse {
            wallets,
            total_count,
        }),
    ))
}

pub async fn get_wallet(
    State(app_state): State<AppState>,
    session: Session,
    Path(wallet_id): Path<String>,
) -> Result<(StatusCode, Json<Wallet>), (StatusCode, String)> {
    let user = get_current_user(&session).await?;

    let conn = app_state.main_db.read().await;
    let wallet = fetch_wallet(&conn, &user.id, &wallet_id)
        .await?
        .ok_or_else(|| not_found("Wallet"))?;

    Ok((StatusCode::OK, Json(wallet)))
}

pub async fn update_wallet(
    State(app_state): State<AppState>,
    session: Session,
    Path(wallet_id): Path<String>,
    Json(payload): Json<UpdateWalletPayload>,
) -> Result<(StatusCode, Json<Wallet>), (StatusCode, String)> {
    let user = get_current_user(&session).await?;

    if payload.name.is_none() && payload.balance.is_none() && payload.description.is_none() {
        return Err(bad_request(
            "At least one field must be provided for update",
        ));
    }

    let name = payload
        .name
        .as_deref()
        .map(validate_wallet_name)
        .transpose()?;
    let balance = payload
        .balance
        .map(|b| validate_balance(b, MAX_MOVEMENT_AMOUNT))
        .transpose()?;
    let description = payload
        .description
        .as_deref()
        .map(|d| validate_description(Some(d)))
        .transpose()?;

    let conn = app_state.main_db.write().await;

    let existing = fetch_wallet(&conn, &user.id, &wallet_id)
        .await?
        .ok_or_else(|| not_found("Wallet"))?;

    let updated = Wallet {
        name: name.unwrap_or(existing.name),
        balance: balance.unwrap_or(existing.balance),
        description: description.unwrap_or(existing.description),
        updated_at: now_timestamp()?,
        ..existing
    };

    let affected_rows = conn
        .execute(
            "UPDATE wallets SET name = ?, balance = ?, description = ?, updated_at = ? WHERE id = ? AND owner_user_id = ?",
            (
                updated.name.as_str(),
                updated.balance,
                updated.description.as_deref(),
                updated.updated_at.as_str(),
                wallet_id.as_str(),
                user.id.as_str(),
            ),
        )
        .await
        .map_err(|e| db_error_with_context("failed to update wallet", e))?;

    if affected_rows == 0 {
        return Err(not_found("Wallet"));
    }

    Ok((StatusCode::OK, Json(updated)))
}

/// Delete a wallet together with every transaction booked against it.
pub async fn delete_wallet(
    State(app_state): State<AppState>,
    session: Session,
    Path(wallet_id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    let user = get_current_user(&session).await?;

    with_transaction(&app_state.main_db, |conn| {
        let user_id = user.id.clone();
        let wallet_id = wallet_id.clone();
        Box::pin(async move {
            if fetch_wallet(conn, &user_id, &wallet_id).await?.is_none() {
                return Err(not_found("Wallet"));
            }

            conn.execute(
                "DELETE FROM transactions WHERE wallet_id = ? AND owner_user_id = ?",
                (wallet_id.as_str(), user_id.as_str()),
            )
            .await
            .map_err(|e| db_error_with_context("failed to delete wallet transactions", e))?;

            conn.execute(
                "DELETE FROM wallets WHERE id = ? AND owner_user_id = ?",
                (wallet_id.as_str(), user_id.as_str()),
            )
            .await
            .map_err(|e| db_error_with_context("failed to delete wallet", e))?;

            Ok(())
        })
    })
    .await?;

    tracing::debug!(wallet_id = %wallet_id, "wallet deleted");

    Ok(StatusCode::NO_CONTENT)
}

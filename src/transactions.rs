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
use crate::finance::{rebook, validate_amount};
use crate::models::{
    CreateTransactionPayload, GetTransactionsQuery, GetTransactionsResponse, Recurrence,
    Transaction, TransactionKind, UpdateTransactionPayload,
};
use crate::utils::{
    bad_request, db_error_with_context, fetch_count, format_date, not_found, now_timestamp,
    parse_date, today, validate_description, validate_limit, validate_name, validate_offset,
};
use crate::wallets::{fetch_wallet, store_wallet_balance};
use crate::{AppState, with_transaction};

const TRANSACTION_COLUMNS: &str = "id, owner_user_id, wallet_id, name, amount, kind, recurrence, due_date, description, active, created_at, updated_at";

pub fn validate_transaction_name(name: &str) -> Result<String, (StatusCode, String)> {
    validate_name(
        name,
        "Transaction name",
        MIN_NAME_LENGTH,
        MAX_TRANSACTION_NAME_LENGTH,
    )
}

fn next_due_date(recurrence: Recurrence, due_date: &str) -> Option<String> {
    parse_date(due_date)
        .ok()
        .and_then(|date| recurrence.next_due_date(date))
        .map(format_date)
}

pub fn extract_transaction_from_row(
    row: libsql::Row,
) -> Result<Transaction, (StatusCode, String)> {
    let read = |e: libsql::Error| db_error_with_context("invalid transaction data", e);

    let kind: String = row.get(5).map_err(read)?;
    let kind = kind
        .parse::<TransactionKind>()
        .map_err(|e| db_error_with_context("invalid transaction data", e))?;
    let recurrence: String = row.get(6).map_err(read)?;
    let recurrence = recurrence
        .parse::<Recurrence>()
        .map_err(|e| db_error_with_context("invalid transaction data", e))?;
    let due_date: String = row.get(7).map_err(read)?;

    Ok(Transaction {
        id: row.get(0).map_err(read)?,
        owner_user_id: row.get(1).map_err(read)?,
        wallet_id: row.get(2).map_err(read)?,
        name: row.get(3).map_err(read)?,
        amount: row.get(4).map_err(read)?,
        kind,
        recurrence,
        next_due_date: next_due_date(recurrence, &due_date),
        due_date,
        description: row.get(8).map_err(read)?,
        active: row.get(9).map_err(read)?,
        created_at: row.get(10).map_err(read)?,
        updated_at: row.get(11).map_err(read)?,
    })
}

async fn fetch_transaction(
    conn: &Connection,
    user_id: &str,
    transaction_id: &str,
) -> Result<Option<Transaction>, (StatusCode, String)> {
    let mut rows = conn
        .query(
            &format!(
                "SELECT {} FROM transactions WHERE id = ? AND owner_user_id = ?",
                TRANSACTION_COLUMNS
            ),
            (transaction_id, user_id),
        )
        .await
        .map_err(|e| db_error_with_context("failed to query transaction", e))?;

    match rows
        .next()
        .await
        .map_err(|e| db_error_with_context("failed to read transaction", e))?
    {
        Some(row) => Ok(Some(extract_transaction_from_row(row)?)),
        None => Ok(None),
    }
}

async fn collect_transactions(
    mut rows: libsql::Rows,
) -> Result<Vec<Transaction>, (StatusCode, String)> {
    let mut transactions = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| db_error_with_context("failed to read transactions", e))?
    {
        transactions.push(extract_transaction_from_row(row)?);
    }
    Ok(transactions)
}

/// Book a new transaction and move the wallet balance in the same database
/// transaction.
pub async fn create_transaction(
    State(app_state): State<AppState>,
    session: Session,
    Json(payload): Json<CreateTransactionPayload>,
) -> Result<(StatusCode, Json<Transaction>), (StatusCode, String)> {
    let user = get_current_user(&session).await?;

    let name = validate_transaction_name(&payload.name)?;
    let amount = validate_amount(payload.amount, MAX_MOVEMENT_AMOUNT)?;
    let recurrence = payload.recurrence.unwrap_or_default();
    let due_date = match payload.due_date.as_deref() {
        Some(date) => parse_date(date)?,
        None => today(),
    };
    let description = validate_description(payload.description.as_deref())?;
    if payload.wallet_id.trim().is_empty() {
        return Err(bad_request("Wallet ID cannot be empty"));
    }
    let now = now_timestamp()?;

    let transaction = Transaction {
        id: Uuid::new_v4().to_string(),
        owner_user_id: user.id.clone(),
        wallet_id: payload.wallet_id.trim().to_string(),
        name,
        amount,
        kind: payload.kind,
        recurrence,
        due_date: format_date(due_date),
        next_due_date: recurrence.next_due_date(due_date).map(format_date),
        description,
        active: true,
        created_at: now.clone(),
        updated_at: now,
    };

    let transaction = with_transaction(&app_state.main_db, |conn| {
        Box::pin(async move {
            let wallet = fetch_wallet(conn, &transaction.owner_user_id, &transaction.wallet_id)
                .await?
                .ok_or_else(|| bad_request("Wallet does not exist"))?;

            let new_balance = transaction.kind.apply(wallet.balance, transaction.amount)?;

            conn.execute(
                "INSERT INTO transactions (id, owner_user_id, wallet_id, name, amount, kind, recurrence, due_date, description, active, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    transaction.id.as_str(),
                    transaction.owner_user_id.as_str(),
                    transaction.wallet_id.as_str(),
                    transaction.name.as_str(),
                    transaction.amount,
                    transaction.kind.as_str(),
                    transaction.recurrence.as_str(),
                    transaction.due_date.as_str(),
                    transaction.description.as_deref(),
                    transaction.active,
                    transaction.created_at.as_str(),
                    transaction.updated_at.as_str(),
                ],
            )
            .await
            .map_err(|e| db_error_with_context("transaction creation failed", e))?;

            store_wallet_balance(
                conn,
                &transaction.owner_user_id,
                &transaction.wallet_id,
                new_balance,
                &transaction.updated_at,
            )
            .await?;

            Ok::<_, (StatusCode, String)>(transaction)
        })
    })
    .await?;

    tracing::debug!(
        transaction_id = %transaction.id,
        wallet_id = %transaction.wallet_id,
        kind = %transaction.kind,
        "transaction booked"
    );

    Ok((StatusCode::CREATED, Json(transaction)))
}

pub async fn get_transactions(
    State(app_state): State<AppState>,
    session: Session,
    Query(query): Query<GetTransactionsQuery>,
) -> Result<(StatusCode, Json<GetTransactionsResponse>), (StatusCode, String)> {
    let user = get_current_user(&session).await?;
    let limit = validate_limit(query.limit, DEFAULT_TRANSACTIONS_LIMIT)?;
    let offset = validate_offset(query.offset)?;

    let wallet_filter = query
        .wallet_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());
    let active_filter = query.active;

    // Active lists are agendas, ordered by what is due next
    let order_by = if active_filter == Some(true) {
        "due_date ASC, rowid ASC"
    } else {
        "created_at DESC, rowid DESC"
    };

    let conn = app_state.main_db.read().await;

    let total_count = fetch_count(
        &conn,
        "SELECT COUNT(*) FROM transactions WHERE owner_user_id = ? AND (? IS NULL OR wallet_id = ?) AND (? IS NULL OR active = ?)",
        (
            user.id.as_str(),
            wallet_filter,
            wallet_filter,
            active_filter,
            active_filter,
        ),
        "failed to count transactions",
    )
    .await?;

    let rows = conn
        .query(
            &format!(
                "SELECT {} FROM transactions WHERE owner_user_id = ? AND (? IS NULL OR wallet_id = ?) AND (? IS NULL OR active = ?) ORDER BY {} LIMIT ? OFFSET ?",
                TRANSACTION_COLUMNS, order_by
            ),
            (
                user.id.as_str(),
                wallet_filter,
                wallet_filter,
                active_filter,
                active_filter,
                limit,
                offset,
            ),
        )
        .await
        .map_err(|e| db_error_with_context("failed to query transactions", e))?;

    let transactions = collect_transactions(rows).await?;

    Ok((
        StatusCode::OK,
        Json(GetTransactionsResponse {
            transactions,
            total_count,
        }),
    ))
}

/// Active transactions whose due date has already passed.
pub async fn get_overdue_transactions(
    State(app_state): State<AppState>,
    session: Session,
) -> Result<(StatusCode, Json<GetTransactionsResponse>), (StatusCode, String)> {
    let user = get_current_user(&session).await?;
    let today = format_date(today());

    let conn = app_state.main_db.read().await;
    let rows = conn
        .query(
            &format!(
                "SELECT {} FROM transactions WHERE owner_user_id = ? AND active = TRUE AND due_date < ? ORDER BY due_date ASC, rowid ASC",
                TRANSACTION_COLUMNS
            ),
            (user.id.as_str(), today.as_str()),
        )
        .await
        .map_err(|e| db_error_with_context("failed to query overdue transactions", e))?;

    let transactions = collect_transactions(rows).await?;
    let total_count = transactions.len() as u32;

    Ok((
        StatusCode::OK,
        Json(GetTransactionsResponse {
            transactions,
            total_count,
        }),
    ))
}

pub async fn get_transaction(
    State(app_state): State<AppState>,
    session: Session,
    Path(transaction_id): Path<String>,
) -> Result<(StatusCode, Json<Transaction>), (StatusCode, String)> {
    let user = get_current_user(&session).await?;

    let conn = app_state.main_db.read().await;
    let transaction = fetch_transaction(&conn, &user.id, &transaction_id)
        .await?
        .ok_or_else(|| not_found("Transaction"))?;

    Ok((StatusCode::OK, Json(transaction)))
}

pub async fn update_transaction(
    State(app_state): State<AppState>,
    session: Session,
    Path(transaction_id): Path<String>,
    Json(payload): Json<UpdateTransactionPayload>,
) -> Result<(StatusCode, Json<Transaction>), (StatusCode, String)> {
    let user = get_current_user(&session).await?;

    if payload.name.is_none()
        && payload.amount.is_none()
        && payload.kind.is_none()
        && payload.recurrence.is_none()
        && payload.due_date.is_none()
        && payload.description.is_none()
        && payload.active.is_none()
    {
        return Err(bad_request(
            "At least one field must be provided for update",
        ));
    }

    let name = payload
        .name
        .as_deref()
        .map(validate_transaction_name)
        .transpose()?;
    let amount = payload
        .amount
        .map(|a| validate_amount(a, MAX_MOVEMENT_AMOUNT))
        .transpose()?;
    let due_date = payload.due_date.as_deref().map(parse_date).transpose()?;
    let description = payload
        .description
        .as_deref()
        .map(|d| validate_description(Some(d)))
        .transpose()?;
    let now = now_timestamp()?;
    let user_id = user.id;

    let updated = with_transaction(&app_state.main_db, |conn| {
        Box::pin(async move {
            let existing = fetch_transaction(conn, &user_id, &transaction_id)
                .await?
                .ok_or_else(|| not_found("Transaction"))?;

            let recurrence = payload.recurrence.unwrap_or(existing.recurrence);
            let due_date = due_date
                .map(format_date)
                .unwrap_or_else(|| existing.due_date.clone());

            let updated = Transaction {
                name: name.unwrap_or_else(|| existing.name.clone()),
                amount: amount.unwrap_or(existing.amount),
                kind: payload.kind.unwrap_or(existing.kind),
                recurrence,
                next_due_date: next_due_date(recurrence, &due_date),
                due_date,
                description: description.unwrap_or_else(|| existing.description.clone()),
                active: payload.active.unwrap_or(existing.active),
                updated_at: now,
                ..existing.clone()
            };

            if updated.amount != existing.amount || updated.kind != existing.kind {
                // A wallet deleted out from under the row leaves nothing to rebalance
                if let Some(wallet) = fetch_wallet(conn, &user_id, &existing.wallet_id).await? {
                    let new_balance = rebook(
                        wallet.balance,
                        (existing.kind, existing.amount),
                        (updated.kind, updated.amount),
                    )?;
                    store_wallet_balance(
                        conn,
                        &user_id,
                        &existing.wallet_id,
                        new_balance,
                        &updated.updated_at,
                    )
                    .await?;
                }
            }

            let affected_rows = conn
                .execute(
                    "UPDATE transactions SET name = ?, amount = ?, kind = ?, recurrence = ?, due_date = ?, description = ?, active = ?, updated_at = ? WHERE id = ? AND owner_user_id = ?",
                    params![
                        updated.name.as_str(),
                        updated.amount,
                        updated.kind.as_str(),
                        updated.recurrence.as_str(),
                        updated.due_date.as_str(),
                        updated.description.as_deref(),
                        updated.active,
                        updated.updated_at.as_str(),
                        updated.id.as_str(),
                        user_id.as_str(),
                    ],
                )
                .await
                .map_err(|e| db_error_with_context("failed to update transaction", e))?;

            if affected_rows == 0 {
                return Err(not_found("Transaction"));
            }

            Ok(updated)
        })
    })
    .await?;

    Ok((StatusCode::OK, Json(updated)))
}

async fn set_active(
    app_state: &AppState,
    user_id: &str,
    transaction_id: &str,
    active: bool,
) -> Result<Transaction, (StatusCode, String)> {
    let now = now_timestamp()?;
    let conn = app_state.main_db.write().await;

    let affected_rows = conn
        .execute(
            "UPDATE transactions SET active = ?, updated_at = ? WHERE id = ? AND owner_user_id = ?",
            (active, now.as_str(), transaction_id, user_id),
        )
        .await
        .map_err(|e| db_error_with_context("failed to update transaction", e))?;

    if affected_rows == 0 {
        return Err(not_found("Transaction"));
    }

    fetch_transaction(&conn, user_id, transaction_id)
        .await?
        .ok_or_else(|| not_found("Transaction"))
}

pub async fn activate_transaction(
    State(app_state): State<AppState>,
    session: Session,
    Path(transaction_id): Path<String>,
) -> Result<(StatusCode, Json<Transaction>), (StatusCode, String)> {
    let user = get_current_user(&session).await?;
    let transaction = set_active(&app_state, &user.id, &transaction_id, true).await?;
    Ok((StatusCode::OK, Json(transaction)))
}

pub async fn deactivate_transaction(
    State(app_state): State<AppState>,
    session: Session,
    Path(transaction_id): Path<String>,
) -> Result<(StatusCode, Json<Transaction>), (StatusCode, String)> {
    let user = get_current_user(&session).await?;
    let transaction = set_active(&app_state, &user.id, &transaction_id, false).await?;
    Ok((StatusCode::OK, Json(transaction)))
}

/// Remove a transaction and take its effect back out of the wallet.
pub async fn delete_transaction(
    State(app_state): State<AppState>,
    session: Session,
    Path(transaction_id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    let user = get_current_user(&session).await?;
    let now = now_timestamp()?;

    with_transaction(&app_state.main_db, |conn| {
        let user_id = user.id.clone();
        let transaction_id = transaction_id.clone();
        Box::pin(async move {
            let existing = fetch_transaction(conn, &user_id, &transaction_id)
                .await?
                .ok_or_else(|| not_found("Transaction"))?;

            if let Some(wallet) = fetch_wallet(conn, &user_id, &existing.wallet_id).await? {
                let new_balance = existing.kind.revert(wallet.balance, existing.amount)?;
                store_wallet_balance(conn, &user_id, &wallet.id, new_balance, &now).await?;
            }

            conn.execute(
                "DELETE FROM transactions WHERE id = ? AND owner_user_id = ?",
                (transaction_id.as_str(), user_id.as_str()),
            )
            .await
            .map_err(|e| db_error_with_context("failed to delete transaction", e))?;

            Ok::<_, (StatusCode, String)>(())
        })
    })
    .await?;

    tracing::debug!(transaction_id = %transaction_id, "transaction deleted");

    Ok(StatusCode::NO_CONTENT)
}

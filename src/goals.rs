use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use libsql::{Connection, params};
use time::Date;
use tower_sessions::Session;
use uuid::Uuid;

use crate::auth::get_current_user;
use crate::constants::*;
use crate::finance::{
    days_until, deposit, goal_progress, is_goal_completed, is_overdue, remaining_amount,
    validate_amount, validate_balance, withdraw,
};
use crate::models::{
    CreateGoalPayload, GetGoalsQuery, GetGoalsResponse, Goal, GoalMovementPayload, GoalStatus,
    UpdateGoalPayload,
};
use crate::utils::{
    bad_request, db_error_with_context, fetch_count, format_date, not_found, now_timestamp,
    parse_date, today, validate_description, validate_limit, validate_name, validate_offset,
};
use crate::{AppState, with_transaction};

const GOAL_COLUMNS: &str = "id, owner_user_id, name, target_amount, accumulated_amount, deadline, completed, description, created_at, updated_at";

pub fn validate_goal_name(name: &str) -> Result<String, (StatusCode, String)> {
    validate_name(name, "Goal name", MIN_NAME_LENGTH, MAX_GOAL_NAME_LENGTH)
}

fn validate_target(target: f64) -> Result<f64, (StatusCode, String)> {
    Ok(validate_amount(target, MAX_GOAL_TARGET_AMOUNT)?)
}

/// Fill in the fields derived from the stored amounts and the deadline.
fn with_derived_fields(goal: Goal, today: Date) -> Goal {
    let (days_remaining, overdue) = match parse_date(&goal.deadline) {
        Ok(deadline) => (
            days_until(deadline, today),
            is_overdue(deadline, goal.completed, today),
        ),
        Err(_) => (0, false),
    };

    Goal {
        progress: goal_progress(goal.accumulated_amount, goal.target_amount),
        remaining_amount: remaining_amount(goal.accumulated_amount, goal.target_amount),
        days_remaining,
        overdue,
        ..goal
    }
}

pub fn extract_goal_from_row(row: libsql::Row) -> Result<Goal, (StatusCode, String)> {
    let read = |e: libsql::Error| db_error_with_context("invalid goal data", e);

    let goal = Goal {
        id: row.get(0).map_err(read)?,
        owner_user_id: row.get(1).map_err(read)?,
        name: row.get(2).map_err(read)?,
        target_amount: row.get(3).map_err(read)?,
        accumulated_amount: row.get(4).map_err(read)?,
        deadline: row.get(5).map_err(read)?,
        completed: row.get(6).map_err(read)?,
        description: row.get(7).map_err(read)?,
        progress: 0.0,
        remaining_amount: 0.0,
        days_remaining: 0,
        overdue: false,
        created_at: row.get(8).map_err(read)?,
        updated_at: row.get(9).map_err(read)?,
    };

    Ok(with_derived_fields(goal, today()))
}

async fn fetch_goal(
    conn: &Connection,
    user_id: &str,
    goal_id: &str,
) -> Result<Option<Goal>, (StatusCode, String)> {
    let mut rows = conn
        .query(
            &format!(
                "SELECT {} FROM goals WHERE id = ? AND owner_user_id = ?",
                GOAL_COLUMNS
            ),
            (goal_id, user_id),
        )
        .await
        .map_err(|e| db_error_with_context("failed to query goal", e))?;

    match rows
        .next()
        .await
        .map_err(|e| db_error_with_context("failed to read goal", e))?
    {
        Some(row) => Ok(Some(extract_goal_from_row(row)?)),
        None => Ok(None),
    }
}

pub async fn create_goal(
    State(app_state): State<AppState>,
    session: Session,
    Json(payload): Json<CreateGoalPayload>,
) -> Result<(StatusCode, Json<Goal>), (StatusCode, String)> {
    let user = get_current_user(&session).await?;

    let name = validate_goal_name(&payload.name)?;
    let target_amount = validate_target(payload.target_amount)?;
    let accumulated_amount = validate_balance(
        payload.accumulated_amount.unwrap_or(0.0),
        MAX_GOAL_TARGET_AMOUNT,
    )?;
    let deadline = format_date(parse_date(&payload.deadline)?);
    let description = validate_description(payload.description.as_deref())?;
    let now = now_timestamp()?;

    let goal = with_derived_fields(
        Goal {
            id: Uuid::new_v4().to_string(),
            owner_user_id: user.id,
            name,
            target_amount,
            accumulated_amount,
            deadline,
            completed: is_goal_completed(accumulated_amount, target_amount),
            description,
            progress: 0.0,
            remaining_amount: 0.0,
            days_remaining: 0,
            overdue: false,
            created_at: now.clone(),
            updated_at: now,
        },
        today(),
    );

    let conn = app_state.main_db.write().await;
    conn.execute(
        "INSERT INTO goals (id, owner_user_id, name, target_amount, accumulated_amount, deadline, completed, description, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            goal.id.as_str(),
            goal.owner_user_id.as_str(),
            goal.name.as_str(),
            goal.target_amount,
            goal.accumulated_amount,
            goal.deadline.as_str(),
            goal.completed,
            goal.description.as_deref(),
            goal.created_at.as_str(),
            goal.updated_at.as_str(),
        ],
    )
    .await
    .map_err(|e| db_error_with_context("goal creation failed", e))?;

    Ok((StatusCode::CREATED, Json(goal)))
}

pub async fn get_goals(
    State(app_state): State<AppState>,
    session: Session,
    Query(query): Query<GetGoalsQuery>,
) -> Result<(StatusCode, Json<GetGoalsResponse>), (StatusCode, String)> {
    let user = get_current_user(&session).await?;
    let limit = validate_limit(query.limit, DEFAULT_LIST_LIMIT)?;
    let offset = validate_offset(query.offset)?;

    let (filter, order) = match query.status.unwrap_or_default() {
        GoalStatus::All => ("", "created_at DESC, rowid DESC"),
        GoalStatus::InProgress => (" AND completed = FALSE", "deadline ASC, rowid ASC"),
        GoalStatus::Completed => (" AND completed = TRUE", "updated_at DESC, rowid DESC"),
    };

    let conn = app_state.main_db.read().await;

    let total_count = fetch_count(
        &conn,
        &format!(
            "SELECT COUNT(*) FROM goals WHERE owner_user_id = ?{}",
            filter
        ),
        [user.id.as_str()],
        "failed to count goals",
    )
    .await?;

    let mut rows = conn
        .query(
            &format!(
                "SELECT {} FROM goals WHERE owner_user_id = ?{} ORDER BY {} LIMIT ? OFFSET ?",
                GOAL_COLUMNS, filter, order
            ),
            (user.id.as_str(), limit, offset),
        )
        .await
        .map_err(|e| db_error_with_context("failed to query goals", e))?;

    let mut goals = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| db_error_with_context("failed to read goals", e))?
    {
        goals.push(extract_goal_from_row(row)?);
    }

    Ok((StatusCode::OK, Json(GetGoalsResponse { goals, total_count })))
}

pub async fn get_goal(
    State(app_state): State<AppState>,
    session: Session,
    Path(goal_id): Path<String>,
) -> Result<(StatusCode, Json<Goal>), (StatusCode, String)> {
    let user = get_current_user(&session).await?;

    let conn = app_state.main_db.read().await;
    let goal = fetch_goal(&conn, &user.id, &goal_id)
        .await?
        .ok_or_else(|| not_found("Goal"))?;

    Ok((StatusCode::OK, Json(goal)))
}

async fn store_goal(conn: &Connection, goal: &Goal) -> Result<(), (StatusCode, String)> {
    let affected_rows = conn
        .execute(
            "UPDATE goals SET name = ?, target_amount = ?, accumulated_amount = ?, deadline = ?, completed = ?, description = ?, updated_at = ? WHERE id = ? AND owner_user_id = ?",
            params![
                goal.name.as_str(),
                goal.target_amount,
                goal.accumulated_amount,
                goal.deadline.as_str(),
                goal.completed,
                goal.description.as_deref(),
                goal.updated_at.as_str(),
                goal.id.as_str(),
                goal.owner_user_id.as_str(),
            ],
        )
        .await
        .map_err(|e| db_error_with_context("failed to update goal", e))?;

    if affected_rows == 0 {
        return Err(not_found("Goal"));
    }
    Ok(())
}

pub async fn update_goal(
    State(app_state): State<AppState>,
    session: Session,
    Path(goal_id): Path<String>,
    Json(payload): Json<UpdateGoalPayload>,
) -> Result<(StatusCode, Json<Goal>), (StatusCode, String)> {
    let user = get_current_user(&session).await?;

    if payload.name.is_none()
        && payload.target_amount.is_none()
        && payload.deadline.is_none()
        && payload.description.is_none()
    {
        return Err(bad_request(
            "At least one field must be provided for update",
        ));
    }

    let name = payload.name.as_deref().map(validate_goal_name).transpose()?;
    let target_amount = payload.target_amount.map(validate_target).transpose()?;
    let deadline = payload
        .deadline
        .as_deref()
        .map(|d| parse_date(d).map(format_date))
        .transpose()?;
    let description = payload
        .description
        .as_deref()
        .map(|d| validate_description(Some(d)))
        .transpose()?;

    let conn = app_state.main_db.write().await;

    let existing = fetch_goal(&conn, &user.id, &goal_id)
        .await?
        .ok_or_else(|| not_found("Goal"))?;

    let target_amount = target_amount.unwrap_or(existing.target_amount);
    let updated = with_derived_fields(
        Goal {
            name: name.unwrap_or(existing.name),
            target_amount,
            deadline: deadline.unwrap_or(existing.deadline),
            description: description.unwrap_or(existing.description),
            completed: is_goal_completed(existing.accumulated_amount, target_amount),
            updated_at: now_timestamp()?,
            ..existing
        },
        today(),
    );

    store_goal(&conn, &updated).await?;

    Ok((StatusCode::OK, Json(updated)))
}

pub async fn delete_goal(
    State(app_state): State<AppState>,
    session: Session,
    Path(goal_id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    let user = get_current_user(&session).await?;

    let conn = app_state.main_db.write().await;
    let affected_rows = conn
        .execute(
            "DELETE FROM goals WHERE id = ? AND owner_user_id = ?",
            (goal_id.as_str(), user.id.as_str()),
        )
        .await
        .map_err(|e| db_error_with_context("failed to delete goal", e))?;

    if affected_rows == 0 {
        return Err(not_found("Goal"));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Clone, Copy)]
enum GoalMovement {
    Deposit,
    Withdrawal,
}

async fn move_goal_amount(
    app_state: &AppState,
    user_id: String,
    goal_id: String,
    movement: GoalMovement,
    amount: f64,
) -> Result<Goal, (StatusCode, String)> {
    let now = now_timestamp()?;

    with_transaction(&app_state.main_db, |conn| {
        Box::pin(async move {
            let goal = fetch_goal(conn, &user_id, &goal_id)
                .await?
                .ok_or_else(|| not_found("Goal"))?;

            let accumulated_amount = match movement {
                GoalMovement::Deposit => deposit(goal.accumulated_amount, amount)?,
                GoalMovement::Withdrawal => withdraw(goal.accumulated_amount, amount)?,
            };

            let updated = with_derived_fields(
                Goal {
                    accumulated_amount,
                    completed: is_goal_completed(accumulated_amount, goal.target_amount),
                    updated_at: now,
                    ..goal
                },
                today(),
            );
            store_goal(conn, &updated).await?;

            Ok::<_, (StatusCode, String)>(updated)
        })
    })
    .await
}

pub async fn deposit_to_goal(
    State(app_state): State<AppState>,
    session: Session,
    Path(goal_id): Path<String>,
    Json(payload): Json<GoalMovementPayload>,
) -> Result<(StatusCode, Json<Goal>), (StatusCode, String)> {
    let user = get_current_user(&session).await?;
    let goal = move_goal_amount(
        &app_state,
        user.id,
        goal_id,
        GoalMovement::Deposit,
        payload.amount,
    )
    .await?;
    Ok((StatusCode::OK, Json(goal)))
}

pub async fn withdraw_from_goal(
    State(app_state): State<AppState>,
    session: Session,
    Path(goal_id): Path<String>,
    Json(payload): Json<GoalMovementPayload>,
) -> Result<(StatusCode, Json<Goal>), (StatusCode, String)> {
    let user = get_current_user(&session).await?;
    let goal = move_goal_amount(
        &app_state,
        user.id,
        goal_id,
        GoalMovement::Withdrawal,
        payload.amount,
    )
    .await?;
    Ok((StatusCode::OK, Json(goal)))
}

use axum::{Json, extract::State, http::StatusCode};
use tower_sessions::Session;

use crate::AppState;
use crate::auth::get_current_user;
use crate::finance::month_bounds;
use crate::models::{DashboardSummary, TransactionKind};
use crate::utils::{fetch_count, fetch_sum, format_date, today};

/// Totals across everything the current user owns.
pub async fn get_dashboard(
    State(app_state): State<AppState>,
    session: Session,
) -> Result<(StatusCode, Json<DashboardSummary>), (StatusCode, String)> {
    let user = get_current_user(&session).await?;
    let user_id = user.id.as_str();

    let today = today();
    let (month_start, month_end) = month_bounds(today);
    let today = format_date(today);
    let month_start = format_date(month_start);
    let month_end = format_date(month_end);

    let conn = app_state.main_db.read().await;

    let total_wallet_balance = fetch_sum(
        &conn,
        "SELECT SUM(balance) FROM wallets WHERE owner_user_id = ?",
        [user_id],
        "failed to sum wallet balances",
    )
    .await?;
    let wallet_count = fetch_count(
        &conn,
        "SELECT COUNT(*) FROM wallets WHERE owner_user_id = ?",
        [user_id],
        "failed to count wallets",
    )
    .await?;

    let total_jar_balance = fetch_sum(
        &conn,
        "SELECT SUM(balance) FROM savings_jars WHERE owner_user_id = ?",
        [user_id],
        "failed to sum jar balances",
    )
    .await?;
    let jar_count = fetch_count(
        &conn,
        "SELECT COUNT(*) FROM savings_jars WHERE owner_user_id = ?",
        [user_id],
        "failed to count jars",
    )
    .await?;

    let goal_count = fetch_count(
        &conn,
        "SELECT COUNT(*) FROM goals WHERE owner_user_id = ?",
        [user_id],
        "failed to count goals",
    )
    .await?;
    let completed_goal_count = fetch_count(
        &conn,
        "SELECT COUNT(*) FROM goals WHERE owner_user_id = ? AND completed = TRUE",
        [user_id],
        "failed to count completed goals",
    )
    .await?;
    let overdue_goal_count = fetch_count(
        &conn,
        "SELECT COUNT(*) FROM goals WHERE owner_user_id = ? AND completed = FALSE AND deadline < ?",
        (user_id, today.as_str()),
        "failed to count overdue goals",
    )
    .await?;

    let active_transaction_count = fetch_count(
        &conn,
        "SELECT COUNT(*) FROM transactions WHERE owner_user_id = ? AND active = TRUE",
        [user_id],
        "failed to count active transactions",
    )
    .await?;
    let overdue_transaction_count = fetch_count(
        &conn,
        "SELECT COUNT(*) FROM transactions WHERE owner_user_id = ? AND active = TRUE AND due_date < ?",
        (user_id, today.as_str()),
        "failed to count overdue transactions",
    )
    .await?;

    let monthly_sum = "SELECT SUM(amount) FROM transactions WHERE owner_user_id = ? AND active = TRUE AND kind = ? AND due_date >= ? AND due_date <= ?";
    let monthly_income = fetch_sum(
        &conn,
        monthly_sum,
        (
            user_id,
            TransactionKind::Income.as_str(),
            month_start.as_str(),
            month_end.as_str(),
        ),
        "failed to sum monthly income",
    )
    .await?;
    let monthly_expense = fetch_sum(
        &conn,
        monthly_sum,
        (
            user_id,
            TransactionKind::Expense.as_str(),
            month_start.as_str(),
            month_end.as_str(),
        ),
        "failed to sum monthly expenses",
    )
    .await?;

    Ok((
        StatusCode::OK,
        Json(DashboardSummary {
            total_wallet_balance,
            wallet_count,
            total_jar_balance,
            jar_count,
            goal_count,
            completed_goal_count,
            overdue_goal_count,
            active_transaction_count,
            overdue_transaction_count,
            monthly_income,
            monthly_expense,
        }),
    ))
}

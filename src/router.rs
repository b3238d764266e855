use axum::{
    Router,
    routing::{get, post, put},
};

use crate::{AppState, auth, dashboard, goals, jars, transactions, wallets};

/// Every API route. Session and CORS layers are added by the caller.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/password", put(auth::change_password))
        .route(
            "/wallets",
            post(wallets::create_wallet).get(wallets::get_wallets),
        )
        .route(
            "/wallets/{id}",
            get(wallets::get_wallet)
                .put(wallets::update_wallet)
                .delete(wallets::delete_wallet),
        )
        .route(
            "/transactions",
            post(transactions::create_transaction).get(transactions::get_transactions),
        )
        .route(
            "/transactions/overdue",
            get(transactions::get_overdue_transactions),
        )
        .route(
            "/transactions/{id}",
            get(transactions::get_transaction)
                .put(transactions::update_transaction)
                .delete(transactions::delete_transaction),
        )
        .route(
            "/transactions/{id}/activate",
            post(transactions::activate_transaction),
        )
        .route(
            "/transactions/{id}/deactivate",
            post(transactions::deactivate_transaction),
        )
        .route("/jars", post(jars::create_jar).get(jars::get_jars))
        .route(
            "/jars/{id}",
            get(jars::get_jar)
                .put(jars::update_jar)
                .delete(jars::delete_jar),
        )
        .route("/jars/{id}/deposit", post(jars::deposit_to_jar))
        .route("/jars/{id}/withdraw", post(jars::withdraw_from_jar))
        .route("/jars/{id}/history", get(jars::get_jar_history))
        .route("/jars/{id}/statistics", get(jars::get_jar_statistics))
        .route("/goals", post(goals::create_goal).get(goals::get_goals))
        .route(
            "/goals/{id}",
            get(goals::get_goal)
                .put(goals::update_goal)
                .delete(goals::delete_goal),
        )
        .route("/goals/{id}/deposit", post(goals::deposit_to_goal))
        .route("/goals/{id}/withdraw", post(goals::withdraw_from_goal))
        .route("/dashboard", get(dashboard::get_dashboard))
}

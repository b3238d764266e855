pub mod auth;
pub mod config;
pub mod constants;
pub mod dashboard;
pub mod database;
pub mod finance;
pub mod goals;
pub mod jars;
pub mod models;
pub mod router;
pub mod transactions;
pub mod utils;
pub mod wallets;

// Re-export types at crate root for convenient importing
pub use crate::database::{Db, TransactionError, with_transaction};

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    /// The single application database; every row carries its owner's id
    pub main_db: Db,
}

use anyhow::Result;
use libsql::{Builder, Connection};
use std::future::Future;
use std::pin::Pin;
use std::{path::Path, sync::Arc};
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use crate::constants::DATABASE_FILE_NAME;

const CREATE_USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id             TEXT    PRIMARY KEY,
    email          TEXT    UNIQUE NOT NULL,
    full_name      TEXT,
    password_hash  TEXT    NOT NULL,
    created_at     TEXT    NOT NULL
);
"#;

const CREATE_WALLETS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS wallets (
    id             TEXT    PRIMARY KEY,
    owner_user_id  TEXT    NOT NULL,
    name           TEXT    NOT NULL,
    balance        REAL    NOT NULL DEFAULT 0,
    description    TEXT,
    created_at     TEXT    NOT NULL,
    updated_at     TEXT    NOT NULL,
    FOREIGN KEY (owner_user_id) REFERENCES users(id)
);
"#;

const CREATE_TRANSACTIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS transactions (
    id             TEXT    PRIMARY KEY,
    owner_user_id  TEXT    NOT NULL,
    wallet_id      TEXT    NOT NULL,
    name           TEXT    NOT NULL,
    amount         REAL    NOT NULL,
    kind           TEXT    NOT NULL CHECK (kind IN ('income', 'expense')),
    recurrence     TEXT    NOT NULL CHECK (recurrence IN ('none', 'weekly', 'biweekly', 'monthly')),
    due_date       TEXT    NOT NULL,
    description    TEXT,
    active         BOOLEAN NOT NULL DEFAULT TRUE,
    created_at     TEXT    NOT NULL,
    updated_at     TEXT    NOT NULL,
    FOREIGN KEY (owner_user_id) REFERENCES users(id),
    FOREIGN KEY (wallet_id) REFERENCES wallets(id)
);
"#;

const CREATE_SAVINGS_JARS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS savings_jars (
    id             TEXT    PRIMARY KEY,
    owner_user_id  TEXT    NOT NULL,
    name           TEXT    NOT NULL,
    balance        REAL    NOT NULL DEFAULT 0,
    description    TEXT,
    created_at     TEXT    NOT NULL,
    updated_at     TEXT    NOT NULL,
    FOREIGN KEY (owner_user_id) REFERENCES users(id)
);
"#;

const CREATE_JAR_HISTORY_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS jar_history (
    id               TEXT    PRIMARY KEY,
    jar_id           TEXT    NOT NULL,
    owner_user_id    TEXT    NOT NULL,
    kind             TEXT    NOT NULL CHECK (kind IN ('deposit', 'withdrawal')),
    amount           REAL    NOT NULL,
    previous_balance REAL    NOT NULL,
    new_balance      REAL    NOT NULL,
    description      TEXT,
    created_at       TEXT    NOT NULL,
    FOREIGN KEY (jar_id) REFERENCES savings_jars(id)
);
"#;

const CREATE_GOALS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS goals (
    id                 TEXT    PRIMARY KEY,
    owner_user_id      TEXT    NOT NULL,
    name               TEXT    NOT NULL,
    target_amount      REAL    NOT NULL,
    accumulated_amount REAL    NOT NULL DEFAULT 0,
    deadline           TEXT    NOT NULL,
    completed          BOOLEAN NOT NULL DEFAULT FALSE,
    description        TEXT,
    created_at         TEXT    NOT NULL,
    updated_at         TEXT    NOT NULL,
    FOREIGN KEY (owner_user_id) REFERENCES users(id)
);
"#;

const CREATE_INDEXES: [&str; 6] = [
    "CREATE INDEX IF NOT EXISTS idx_wallets_owner ON wallets(owner_user_id, created_at);",
    "CREATE INDEX IF NOT EXISTS idx_transactions_owner ON transactions(owner_user_id, created_at);",
    "CREATE INDEX IF NOT EXISTS idx_transactions_due ON transactions(owner_user_id, active, due_date);",
    "CREATE INDEX IF NOT EXISTS idx_jars_owner ON savings_jars(owner_user_id, created_at);",
    "CREATE INDEX IF NOT EXISTS idx_jar_history_jar ON jar_history(jar_id, created_at);",
    "CREATE INDEX IF NOT EXISTS idx_goals_owner ON goals(owner_user_id, created_at);",
];

pub type Db = Arc<RwLock<Connection>>;

/// Open (or create) the application database and make sure every table exists.
pub async fn init_main_db(data_dir: &str) -> Result<Db> {
    tokio::fs::create_dir_all(data_dir).await?;
    let path = Path::new(data_dir).join(DATABASE_FILE_NAME);
    let db = Builder::new_local(path).build().await?;
    let conn = db.connect()?;

    conn.execute("PRAGMA foreign_keys = ON", ()).await?;

    conn.execute(CREATE_USERS_TABLE, ()).await?;
    conn.execute(CREATE_WALLETS_TABLE, ()).await?;
    conn.execute(CREATE_TRANSACTIONS_TABLE, ()).await?;
    conn.execute(CREATE_SAVINGS_JARS_TABLE, ()).await?;
    conn.execute(CREATE_JAR_HISTORY_TABLE, ()).await?;
    conn.execute(CREATE_GOALS_TABLE, ()).await?;
    for statement in CREATE_INDEXES {
        conn.execute(statement, ()).await?;
    }

    tracing::info!(path = %Path::new(data_dir).join(DATABASE_FILE_NAME).display(), "database ready");

    Ok(Arc::new(RwLock::new(conn)))
}

/// Execute a function within a database transaction, returning handler-compatible errors
///
/// The closure must return a boxed future to handle lifetime issues with async closures.
/// Dropping the returned future part way through (client disconnect, timeout) still
/// rolls the transaction back before any other request can use the connection.
pub async fn with_transaction<F, T, E>(db: &Db, f: F) -> Result<T, E>
where
    F: for<'a> FnOnce(&'a Connection) -> Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>,
    E: From<TransactionError>,
{
    let mut txn = TransactionGuard::begin(db).await?;
    let Some(conn) = txn.conn.as_deref() else {
        return Err(TransactionError::Begin.into());
    };

    let outcome = f(conn).await;
    match outcome {
        Ok(result) => {
            if let Err(e) = conn.execute("COMMIT", ()).await {
                tracing::error!(error = %e, "failed to commit transaction");
                let _ = conn.execute("ROLLBACK", ()).await;
                txn.finished = true;
                return Err(TransactionError::Commit.into());
            }
            txn.finished = true;
            Ok(result)
        }
        Err(e) => {
            if let Err(rollback_err) = conn.execute("ROLLBACK", ()).await {
                tracing::error!(error = %rollback_err, "failed to roll back transaction");
            }
            txn.finished = true;
            Err(e)
        }
    }
}

/// Exclusive access to the connection for the lifetime of one transaction.
///
/// If it is dropped before the transaction finished, the write lock moves
/// into a spawned task that issues `ROLLBACK` and only then releases it.
struct TransactionGuard {
    conn: Option<OwnedRwLockWriteGuard<Connection>>,
    finished: bool,
}

impl TransactionGuard {
    async fn begin(db: &Db) -> Result<Self, TransactionError> {
        let conn = db.clone().write_owned().await;

        if !conn.is_autocommit() {
            // A transaction outlived its request without the drop-time rollback
            tracing::warn!("rolling back a transaction left open on the shared connection");
            let _ = conn.execute("ROLLBACK", ()).await;
        }

        conn.execute("BEGIN TRANSACTION", ()).await.map_err(|e| {
            tracing::error!(error = %e, "failed to begin transaction");
            TransactionError::Begin
        })?;

        Ok(Self {
            conn: Some(conn),
            finished: false,
        })
    }
}

impl Drop for TransactionGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let Some(conn) = self.conn.take() else {
            return;
        };

        tracing::warn!("transaction dropped before completion, rolling back");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = conn.execute("ROLLBACK", ()).await {
                        tracing::error!(error = %e, "failed to roll back dropped transaction");
                    }
                });
            }
            // The next `begin` sees the open transaction and rolls it back
            Err(_) => tracing::error!("no runtime to roll back dropped transaction"),
        }
    }
}

/// Errors that can occur during transaction management
#[derive(Debug)]
pub enum TransactionError {
    Begin,
    Commit,
}

impl From<TransactionError> for (axum::http::StatusCode, String) {
    fn from(e: TransactionError) -> Self {
        let context = match e {
            TransactionError::Begin => "failed to begin transaction",
            TransactionError::Commit => "failed to commit transaction",
        };
        (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            format!("Database error: {}", context),
        )
    }
}

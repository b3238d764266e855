use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PublicUser {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
}

#[derive(Deserialize)]
pub struct RegisterPayload {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ChangePasswordPayload {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Deserialize, Default)]
pub struct ListQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    #[serde(default)]
    pub sort: ListSort,
}

/// Ordering of wallet and jar listings.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ListSort {
    #[default]
    Newest,
    Oldest,
    NameAsc,
    NameDesc,
    BalanceDesc,
    BalanceAsc,
}

impl ListSort {
    /// `ORDER BY` clause; `rowid` keeps ties stable.
    pub fn order_by(self) -> &'static str {
        match self {
            ListSort::Newest => "created_at DESC, rowid DESC",
            ListSort::Oldest => "created_at ASC, rowid ASC",
            ListSort::NameAsc => "name COLLATE NOCASE ASC, rowid ASC",
            ListSort::NameDesc => "name COLLATE NOCASE DESC, rowid DESC",
            ListSort::BalanceDesc => "balance DESC, rowid DESC",
            ListSort::BalanceAsc => "balance ASC, rowid ASC",
        }
    }
}

/// Error returned when a stored enum value is not recognised.
#[derive(Debug, thiserror::Error, PartialEq)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! text_enum {
    ($name:ident, $label:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($text => Ok($name::$variant),)+
                    _ => Err(UnknownVariant {
                        kind: $label,
                        value: value.to_string(),
                    }),
                }
            }
        }
    };
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

text_enum!(TransactionKind, "transaction kind", {
    Income => "income",
    Expense => "expense",
});

/// How often a transaction repeats.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    #[default]
    #[serde(rename = "none")]
    OneOff,
    Weekly,
    Biweekly,
    Monthly,
}

text_enum!(Recurrence, "recurrence", {
    OneOff => "none",
    Weekly => "weekly",
    Biweekly => "biweekly",
    Monthly => "monthly",
});

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JarEntryKind {
    Deposit,
    Withdrawal,
}

text_enum!(JarEntryKind, "jar entry kind", {
    Deposit => "deposit",
    Withdrawal => "withdrawal",
});

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    #[default]
    All,
    InProgress,
    Completed,
}

// Wallets

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Wallet {
    pub id: String,
    pub owner_user_id: String,
    pub name: String,
    pub balance: f64,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Deserialize)]
pub struct CreateWalletPayload {
    pub name: String,
    pub balance: Option<f64>,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateWalletPayload {
    pub name: Option<String>,
    pub balance: Option<f64>,
    pub description: Option<String>,
}

#[derive(Serialize)]
pub struct GetWalletsResponse {
    pub wallets: Vec<Wallet>,
    pub total_count: u32,
}

// Transactions

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Transaction {
    pub id: String,
    pub owner_user_id: String,
    pub wallet_id: String,
    pub name: String,
    pub amount: f64,
    pub kind: TransactionKind,
    pub recurrence: Recurrence,
    pub due_date: String,
    pub next_due_date: Option<String>,
    pub description: Option<String>,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Deserialize)]
pub struct CreateTransactionPayload {
    pub wallet_id: String,
    pub name: String,
    pub amount: f64,
    pub kind: TransactionKind,
    pub recurrence: Option<Recurrence>,
    pub due_date: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateTransactionPayload {
    pub name: Option<String>,
    pub amount: Option<f64>,
    pub kind: Option<TransactionKind>,
    pub recurrence: Option<Recurrence>,
    pub due_date: Option<String>,
    pub description: Option<String>,
    pub active: Option<bool>,
}

#[derive(Deserialize)]
pub struct GetTransactionsQuery {
    pub wallet_id: Option<String>,
    pub active: Option<bool>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Serialize)]
pub struct GetTransactionsResponse {
    pub transactions: Vec<Transaction>,
    pub total_count: u32,
}

// Savings jars

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SavingsJar {
    pub id: String,
    pub owner_user_id: String,
    pub name: String,
    pub balance: f64,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Deserialize)]
pub struct CreateJarPayload {
    pub name: String,
    pub balance: Option<f64>,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateJarPayload {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct JarMovementPayload {
    pub amount: f64,
    pub description: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct JarHistoryEntry {
    pub id: String,
    pub jar_id: String,
    pub kind: JarEntryKind,
    pub amount: f64,
    pub previous_balance: f64,
    pub new_balance: f64,
    pub description: Option<String>,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct GetJarsResponse {
    pub jars: Vec<SavingsJar>,
    pub total_count: u32,
}

#[derive(Serialize)]
pub struct GetJarHistoryResponse {
    pub entries: Vec<JarHistoryEntry>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct JarStatistics {
    pub total_deposits: f64,
    pub total_withdrawals: f64,
    pub deposit_count: u32,
    pub withdrawal_count: u32,
    pub average_deposit: f64,
    pub average_withdrawal: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BalancePoint {
    pub date: String,
    pub balance: f64,
}

#[derive(Serialize)]
pub struct JarStatisticsResponse {
    pub jar_id: String,
    pub balance: f64,
    pub statistics: JarStatistics,
    pub balance_evolution: Vec<BalancePoint>,
}

// Financial goals

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Goal {
    pub id: String,
    pub owner_user_id: String,
    pub name: String,
    pub target_amount: f64,
    pub accumulated_amount: f64,
    pub deadline: String,
    pub completed: bool,
    pub description: Option<String>,
    /// Percentage of the target reached, capped at 100.
    pub progress: f64,
    pub remaining_amount: f64,
    pub days_remaining: i64,
    pub overdue: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Deserialize)]
pub struct CreateGoalPayload {
    pub name: String,
    pub target_amount: f64,
    pub deadline: String,
    pub accumulated_amount: Option<f64>,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateGoalPayload {
    pub name: Option<String>,
    pub target_amount: Option<f64>,
    pub deadline: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct GoalMovementPayload {
    pub amount: f64,
}

#[derive(Deserialize)]
pub struct GetGoalsQuery {
    pub status: Option<GoalStatus>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Serialize)]
pub struct GetGoalsResponse {
    pub goals: Vec<Goal>,
    pub total_count: u32,
}

// Dashboard

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DashboardSummary {
    pub total_wallet_balance: f64,
    pub wallet_count: u32,
    pub total_jar_balance: f64,
    pub jar_count: u32,
    pub goal_count: u32,
    pub completed_goal_count: u32,
    pub overdue_goal_count: u32,
    pub active_transaction_count: u32,
    pub overdue_transaction_count: u32,
    pub monthly_income: f64,
    pub monthly_expense: f64,
}

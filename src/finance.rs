//! Balance arithmetic and the business rules shared by wallets, transactions,
//! savings jars and goals.
//!
//! Everything in here is pure: handlers load the current state, run it
//! through these functions and persist the result.

use axum::http::StatusCode;
use time::{Date, Duration, Month};

use crate::constants::*;
use crate::models::{
    BalancePoint, JarEntryKind, JarHistoryEntry, JarStatistics, Recurrence, TransactionKind,
};

/// A violated balance or amount rule.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum FinanceError {
    #[error("Amount must be a valid finite number")]
    InvalidAmount,

    #[error("Amount must be greater than zero")]
    NonPositiveAmount,

    #[error("Amount cannot exceed {0:.2}")]
    AmountTooLarge(f64),

    #[error("Balance cannot be negative")]
    NegativeBalance,

    /// The withdrawal is larger than what is available.
    #[error("Insufficient balance: only {available:.2} available")]
    InsufficientFunds { available: f64 },
}

impl From<FinanceError> for (StatusCode, String) {
    fn from(e: FinanceError) -> Self {
        let status = match e {
            FinanceError::InsufficientFunds { .. } => StatusCode::CONFLICT,
            _ => StatusCode::BAD_REQUEST,
        };
        tracing::debug!(error = %e, "finance rule rejected request");
        (status, e.to_string())
    }
}

pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Validate a movement amount: finite, strictly positive and at most `max`.
///
/// Returns the amount rounded to cents.
pub fn validate_amount(amount: f64, max: f64) -> Result<f64, FinanceError> {
    if !amount.is_finite() {
        return Err(FinanceError::InvalidAmount);
    }
    let amount = round_cents(amount);
    if amount <= 0.0 {
        return Err(FinanceError::NonPositiveAmount);
    }
    if amount > max {
        return Err(FinanceError::AmountTooLarge(max));
    }
    Ok(amount)
}

/// Validate a balance set directly (opening balances and manual corrections).
pub fn validate_balance(balance: f64, max: f64) -> Result<f64, FinanceError> {
    if !balance.is_finite() {
        return Err(FinanceError::InvalidAmount);
    }
    let balance = ensure_non_negative(round_cents(balance))?;
    if balance > max {
        return Err(FinanceError::AmountTooLarge(max));
    }
    Ok(balance)
}

pub fn ensure_non_negative(balance: f64) -> Result<f64, FinanceError> {
    if balance < 0.0 {
        Err(FinanceError::NegativeBalance)
    } else {
        Ok(balance)
    }
}

/// Add `amount` to `balance`.
pub fn deposit(balance: f64, amount: f64) -> Result<f64, FinanceError> {
    let amount = validate_amount(amount, MAX_MOVEMENT_AMOUNT)?;
    Ok(round_cents(balance + amount))
}

/// Take `amount` out of `balance`, refusing to go below zero.
pub fn withdraw(balance: f64, amount: f64) -> Result<f64, FinanceError> {
    let amount = validate_amount(amount, MAX_MOVEMENT_AMOUNT)?;
    if amount > balance {
        return Err(FinanceError::InsufficientFunds { available: balance });
    }
    Ok(round_cents(balance - amount))
}

impl TransactionKind {
    /// The wallet balance after this transaction is booked.
    pub fn apply(self, balance: f64, amount: f64) -> Result<f64, FinanceError> {
        match self {
            TransactionKind::Income => deposit(balance, amount),
            TransactionKind::Expense => withdraw(balance, amount),
        }
    }

    /// The wallet balance after this transaction is taken back out.
    pub fn revert(self, balance: f64, amount: f64) -> Result<f64, FinanceError> {
        match self {
            TransactionKind::Income => withdraw(balance, amount),
            TransactionKind::Expense => deposit(balance, amount),
        }
    }

    /// Effect on the wallet balance: positive for income, negative for expenses.
    pub fn signed(self, amount: f64) -> f64 {
        match self {
            TransactionKind::Income => amount,
            TransactionKind::Expense => -amount,
        }
    }
}

/// Replace a booked transaction's effect with a new one in a single step.
///
/// Only the net result has to stay non-negative.
pub fn rebook(
    balance: f64,
    old: (TransactionKind, f64),
    new: (TransactionKind, f64),
) -> Result<f64, FinanceError> {
    let amount = validate_amount(new.1, MAX_MOVEMENT_AMOUNT)?;
    let updated = round_cents(balance - old.0.signed(old.1) + new.0.signed(amount));
    if updated < 0.0 {
        return Err(FinanceError::InsufficientFunds { available: balance });
    }
    Ok(updated)
}

impl Recurrence {
    /// The due date following `due_date`, or `None` for one-off transactions.
    ///
    /// Monthly recurrences keep the day of month, clamped to the last day of
    /// shorter months (Jan 31 -> Feb 28/29).
    pub fn next_due_date(self, due_date: Date) -> Option<Date> {
        match self {
            Recurrence::OneOff => None,
            Recurrence::Weekly => due_date.checked_add(Duration::days(7)),
            Recurrence::Biweekly => due_date.checked_add(Duration::days(15)),
            Recurrence::Monthly => add_one_month(due_date),
        }
    }
}

fn add_one_month(date: Date) -> Option<Date> {
    let (year, month) = match date.month() {
        Month::December => (date.year() + 1, Month::January),
        month => (date.year(), month.next()),
    };

    let mut day = date.day();
    loop {
        if let Ok(next) = Date::from_calendar_date(year, month, day) {
            return Some(next);
        }
        if day <= 28 {
            return None;
        }
        day -= 1;
    }
}

/// First and last day of the month containing `date`.
pub fn month_bounds(date: Date) -> (Date, Date) {
    let first = date.replace_day(1).unwrap_or(date);
    let last = add_one_month(first)
        .and_then(|next| next.previous_day())
        .unwrap_or(date);
    (first, last)
}

pub fn is_goal_completed(accumulated: f64, target: f64) -> bool {
    accumulated >= target
}

/// Percentage of `target` reached, capped at 100.
pub fn goal_progress(accumulated: f64, target: f64) -> f64 {
    if target <= 0.0 {
        return 0.0;
    }
    round_cents((accumulated / target * 100.0).min(100.0))
}

pub fn remaining_amount(accumulated: f64, target: f64) -> f64 {
    round_cents((target - accumulated).max(0.0))
}

/// Whole days from `today` until `deadline`; negative once it has passed.
pub fn days_until(deadline: Date, today: Date) -> i64 {
    (deadline - today).whole_days()
}

/// A goal becomes overdue the day after its deadline.
pub fn is_overdue(deadline: Date, completed: bool, today: Date) -> bool {
    today > deadline && !completed
}

impl JarStatistics {
    pub fn from_history(entries: &[JarHistoryEntry]) -> Self {
        let mut stats = JarStatistics::default();

        for entry in entries {
            match entry.kind {
                JarEntryKind::Deposit => {
                    stats.total_deposits += entry.amount;
                    stats.deposit_count += 1;
                }
                JarEntryKind::Withdrawal => {
                    stats.total_withdrawals += entry.amount;
                    stats.withdrawal_count += 1;
                }
            }
        }

        stats.total_deposits = round_cents(stats.total_deposits);
        stats.total_withdrawals = round_cents(stats.total_withdrawals);
        if stats.deposit_count > 0 {
            stats.average_deposit =
                round_cents(stats.total_deposits / f64::from(stats.deposit_count));
        }
        if stats.withdrawal_count > 0 {
            stats.average_withdrawal =
                round_cents(stats.total_withdrawals / f64::from(stats.withdrawal_count));
        }

        stats
    }
}

/// Balance over time: a zero point on the creation date, then one point per
/// history entry in chronological order.
pub fn balance_evolution(created_on: &str, entries: &[JarHistoryEntry]) -> Vec<BalancePoint> {
    // History is listed newest first; reversing keeps equal timestamps in
    // insertion order through the stable sort.
    let mut ordered: Vec<&JarHistoryEntry> = entries.iter().rev().collect();
    ordered.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    let mut points = Vec::with_capacity(ordered.len() + 1);
    points.push(BalancePoint {
        date: date_part(created_on).to_string(),
        balance: 0.0,
    });
    points.extend(ordered.into_iter().map(|entry| BalancePoint {
        date: date_part(&entry.created_at).to_string(),
        balance: entry.new_balance,
    }));
    points
}

fn date_part(timestamp: &str) -> &str {
    timestamp.get(..10).unwrap_or(timestamp)
}

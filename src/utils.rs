use std::fmt::Display;

use axum::http::StatusCode;
use libsql::{Connection, params::IntoParams};
use time::{Date, OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};

use crate::constants::*;

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

// Fixed-width so that string order matches chronological order.
const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
);

pub fn db_error_with_context(context: &str, err: impl Display) -> (StatusCode, String) {
    tracing::error!(error = %err, "database error: {}", context);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Database error: {}", context),
    )
}

pub fn not_found(entity: &str) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("{} not found", entity))
}

pub fn bad_request(message: impl Into<String>) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, message.into())
}

/// Check a trimmed name against inclusive character-count bounds.
pub fn validate_name(
    value: &str,
    field_name: &str,
    min_length: usize,
    max_length: usize,
) -> Result<String, (StatusCode, String)> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(bad_request(format!("{} cannot be empty", field_name)));
    }
    let length = trimmed.chars().count();
    if length < min_length || length > max_length {
        return Err(bad_request(format!(
            "{} must be between {} and {} characters",
            field_name, min_length, max_length
        )));
    }
    Ok(trimmed.to_string())
}

/// Blank descriptions are stored as NULL.
pub fn validate_description(
    value: Option<&str>,
) -> Result<Option<String>, (StatusCode, String)> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(description) if description.chars().count() > MAX_DESCRIPTION_LENGTH => {
            Err(bad_request(format!(
                "Description must be at most {} characters",
                MAX_DESCRIPTION_LENGTH
            )))
        }
        Some(description) => Ok(Some(description.to_string())),
        None => Ok(None),
    }
}

pub fn parse_date(value: &str) -> Result<Date, (StatusCode, String)> {
    if value.trim().is_empty() {
        return Err(bad_request("Date cannot be empty"));
    }

    Date::parse(value.trim(), DATE_FORMAT).map_err(|_| bad_request("Invalid date format"))
}

pub fn format_date(date: Date) -> String {
    date.format(DATE_FORMAT)
        .unwrap_or_else(|_| date.to_string())
}

pub fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

pub fn now_timestamp() -> Result<String, (StatusCode, String)> {
    OffsetDateTime::now_utc()
        .format(TIMESTAMP_FORMAT)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

pub fn validate_limit(limit: Option<u32>, default: u32) -> Result<u32, (StatusCode, String)> {
    match limit {
        Some(0) => Err(bad_request("Limit must be greater than 0")),
        Some(l) if l > MAX_LIMIT => Err(bad_request(format!(
            "Limit cannot exceed {}",
            MAX_LIMIT
        ))),
        Some(l) => Ok(l),
        None => Ok(default),
    }
}

pub fn validate_offset(offset: Option<u32>) -> Result<u32, (StatusCode, String)> {
    match offset {
        Some(o) if o > MAX_OFFSET => Err(bad_request(format!(
            "Offset cannot exceed {}",
            MAX_OFFSET
        ))),
        Some(o) => Ok(o),
        None => Ok(0),
    }
}

/// Run a `SELECT COUNT(*)` style query and return the single value.
pub async fn fetch_count(
    conn: &Connection,
    sql: &str,
    params: impl IntoParams,
    context: &str,
) -> Result<u32, (StatusCode, String)> {
    let mut rows = conn
        .query(sql, params)
        .await
        .map_err(|e| db_error_with_context(context, e))?;

    match rows.next().await.map_err(|e| db_error_with_context(context, e))? {
        Some(row) => row.get(0).map_err(|e| db_error_with_context(context, e)),
        None => Ok(0),
    }
}

/// Run a `SELECT SUM(...)` style query; NULL sums come back as zero.
pub async fn fetch_sum(
    conn: &Connection,
    sql: &str,
    params: impl IntoParams,
    context: &str,
) -> Result<f64, (StatusCode, String)> {
    let mut rows = conn
        .query(sql, params)
        .await
        .map_err(|e| db_error_with_context(context, e))?;

    match rows.next().await.map_err(|e| db_error_with_context(context, e))? {
        Some(row) => {
            let sum: Option<f64> = row.get(0).map_err(|e| db_error_with_context(context, e))?;
            Ok(crate::finance::round_cents(sum.unwrap_or(0.0)))
        }
        None => Ok(0.0),
    }
}

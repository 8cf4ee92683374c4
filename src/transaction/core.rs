//! Defines the core data model and database queries for transactions.
//!
//! Every query here is scoped to an owner. A transaction belonging to another
//! user behaves exactly like a transaction that does not exist.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    category::{Category, PaymentType},
    database_id::TransactionId,
    user::UserID,
};

/// The location used when a transaction is recorded without one.
pub const DEFAULT_LOCATION: &str = "Unknown";

// ============================================================================
// MODELS
// ============================================================================

/// An event where money was spent, saved, or invested.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The user the transaction belongs to.
    pub user_id: UserID,
    /// A text description of what the transaction was for.
    pub description: String,
    /// How the transaction was paid for.
    pub payment_type: PaymentType,
    /// What the transaction was for.
    pub category: Category,
    /// The amount of money involved. Always zero or more.
    pub amount: f64,
    /// Where the transaction happened.
    pub location: String,
    /// When the transaction happened.
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    /// When the transaction was recorded (UTC).
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// When the transaction was last modified (UTC).
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// A validated transaction that has not been saved yet.
///
/// Use [NewTransaction::new] to validate the fields. The owner is supplied
/// separately when the transaction is inserted so that it always comes from
/// the authenticated session, never from client input.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    description: String,
    payment_type: PaymentType,
    category: Category,
    amount: f64,
    location: String,
    date: OffsetDateTime,
}

impl NewTransaction {
    /// Validate the fields for a new transaction.
    ///
    /// A missing `location` falls back to [DEFAULT_LOCATION].
    ///
    /// # Errors
    ///
    /// Returns:
    /// - [Error::InvalidDescription] if the description is shorter than 3 or longer than 255 characters.
    /// - [Error::InvalidAmount] if the amount is negative or not a finite number.
    /// - [Error::InvalidLocation] if the location is longer than 100 characters.
    /// - [Error::FutureDate] if the date is in the future.
    pub fn new(
        description: String,
        payment_type: PaymentType,
        category: Category,
        amount: f64,
        location: Option<String>,
        date: OffsetDateTime,
    ) -> Result<Self, Error> {
        validate_description(&description)?;
        validate_amount(amount)?;
        validate_date(date)?;

        let location = match location {
            Some(location) => {
                validate_location(&location)?;
                location
            }
            None => DEFAULT_LOCATION.to_owned(),
        };

        Ok(Self {
            description,
            payment_type,
            category,
            amount,
            location,
            date,
        })
    }
}

/// The fields of a transaction that a client may edit.
///
/// Fields left out of the request are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionUpdate {
    /// The new description, if any.
    pub description: Option<String>,
    /// The new payment type, if any.
    pub payment_type: Option<PaymentType>,
    /// The new category, if any.
    pub category: Option<Category>,
    /// The new amount, if any.
    pub amount: Option<f64>,
    /// The new location, if any.
    pub location: Option<String>,
    /// The new date, if any.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub date: Option<OffsetDateTime>,
}

// ============================================================================
// VALIDATION
// ============================================================================

pub(crate) fn validate_description(description: &str) -> Result<(), Error> {
    // Character counts, not byte lengths, so multibyte text is measured the
    // way the user sees it.
    let length = description.chars().count();

    if length < 3 {
        return Err(Error::InvalidDescription(
            "description must be at least 3 characters long".to_owned(),
        ));
    }

    if length > 255 {
        return Err(Error::InvalidDescription(
            "description must be at most 255 characters long".to_owned(),
        ));
    }

    Ok(())
}

pub(crate) fn validate_amount(amount: f64) -> Result<(), Error> {
    if !amount.is_finite() {
        return Err(Error::InvalidAmount(
            "amount must be a finite number".to_owned(),
        ));
    }

    if amount < 0.0 {
        return Err(Error::InvalidAmount("amount cannot be negative".to_owned()));
    }

    Ok(())
}

pub(crate) fn validate_location(location: &str) -> Result<(), Error> {
    if location.chars().count() > 100 {
        return Err(Error::InvalidLocation(
            "location must be at most 100 characters long".to_owned(),
        ));
    }

    Ok(())
}

pub(crate) fn validate_date(date: OffsetDateTime) -> Result<(), Error> {
    if date > OffsetDateTime::now_utc() {
        return Err(Error::FutureDate(date));
    }

    Ok(())
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES user(id) ON DELETE CASCADE,
                description TEXT NOT NULL,
                payment_type TEXT NOT NULL,
                category TEXT NOT NULL,
                amount REAL NOT NULL,
                location TEXT NOT NULL,
                date TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
                )",
        (),
    )?;

    // Composite index used by the list and statistics queries.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_user_updated
            ON \"transaction\"(user_id, updated_at);",
        (),
    )?;

    Ok(())
}

/// Insert a validated transaction owned by `user_id`.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn create_transaction(
    user_id: UserID,
    new_transaction: NewTransaction,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let now = OffsetDateTime::now_utc();

    let transaction = connection
        .prepare(
            "INSERT INTO \"transaction\"
                (user_id, description, payment_type, category, amount, location, date, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             RETURNING id, user_id, description, payment_type, category, amount, location, date, created_at, updated_at",
        )?
        .query_row(
            (
                user_id.as_i64(),
                new_transaction.description,
                new_transaction.payment_type,
                new_transaction.category,
                new_transaction.amount,
                new_transaction.location,
                new_transaction.date,
                now,
                now,
            ),
            map_transaction_row,
        )?;

    Ok(transaction)
}

/// Retrieve one of `user_id`'s transactions by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a transaction owned by `user_id`,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_transaction(
    id: TransactionId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(
            "SELECT id, user_id, description, payment_type, category, amount, location, date, created_at, updated_at
            FROM \"transaction\"
            WHERE id = ?1 AND user_id = ?2",
        )?
        .query_row((id, user_id.as_i64()), map_transaction_row)?;

    Ok(transaction)
}

/// Get all of `user_id`'s transactions, most recently modified first.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn get_transactions_by_user(
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let transactions = connection
        .prepare(
            "SELECT id, user_id, description, payment_type, category, amount, location, date, created_at, updated_at
            FROM \"transaction\"
            WHERE user_id = ?1
            ORDER BY updated_at DESC, id DESC",
        )?
        .query_map((user_id.as_i64(),), map_transaction_row)?
        .collect::<Result<Vec<Transaction>, rusqlite::Error>>()?;

    Ok(transactions)
}

/// Apply `update` to one of `user_id`'s transactions and bump its modified time.
///
/// Only the fields present in `update` change, and each supplied field is
/// validated before anything is written.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a transaction owned by `user_id`,
/// - a validation error if a supplied field is invalid,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_transaction(
    id: TransactionId,
    user_id: UserID,
    update: TransactionUpdate,
    connection: &Connection,
) -> Result<Transaction, Error> {
    if let Some(ref description) = update.description {
        validate_description(description)?;
    }

    if let Some(amount) = update.amount {
        validate_amount(amount)?;
    }

    if let Some(ref location) = update.location {
        validate_location(location)?;
    }

    if let Some(date) = update.date {
        validate_date(date)?;
    }

    let existing = get_transaction(id, user_id, connection)?;
    let now = OffsetDateTime::now_utc();

    let updated = Transaction {
        id: existing.id,
        user_id: existing.user_id,
        description: update.description.unwrap_or(existing.description),
        payment_type: update.payment_type.unwrap_or(existing.payment_type),
        category: update.category.unwrap_or(existing.category),
        amount: update.amount.unwrap_or(existing.amount),
        location: update.location.unwrap_or(existing.location),
        date: update.date.unwrap_or(existing.date),
        created_at: existing.created_at,
        updated_at: now,
    };

    let rows_changed = connection.execute(
        "UPDATE \"transaction\"
        SET description = ?1, payment_type = ?2, category = ?3, amount = ?4, location = ?5,
            date = ?6, updated_at = ?7
        WHERE id = ?8 AND user_id = ?9",
        (
            &updated.description,
            updated.payment_type,
            updated.category,
            updated.amount,
            &updated.location,
            updated.date,
            updated.updated_at,
            updated.id,
            updated.user_id.as_i64(),
        ),
    )?;

    if rows_changed == 0 {
        return Err(Error::NotFound);
    }

    Ok(updated)
}

/// Delete one of `user_id`'s transactions and return the deleted row.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a transaction owned by `user_id`,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_transaction(
    id: TransactionId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(
            "DELETE FROM \"transaction\"
            WHERE id = ?1 AND user_id = ?2
            RETURNING id, user_id, description, payment_type, category, amount, location, date, created_at, updated_at",
        )?
        .query_row((id, user_id.as_i64()), map_transaction_row)?;

    Ok(transaction)
}

/// Map a database row to a Transaction.
fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        description: row.get(2)?,
        payment_type: row.get(3)?,
        category: row.get(4)?,
        amount: row.get(5)?,
        location: row.get(6)?,
        date: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================

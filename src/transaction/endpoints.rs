//! Defines the JSON endpoints for transaction CRUD.
//!
//! All handlers here sit behind the auth middleware and read the owner from
//! the request extensions. Missing records come back as a JSON `null` with a
//! 200 status so that clients can tell "no such record" apart from a failure.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::Deserialize;
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    category::{Category, PaymentType},
    database_id::TransactionId,
    transaction::{
        NewTransaction, Transaction, TransactionUpdate,
        core::{
            create_transaction, delete_transaction, get_transaction, get_transactions_by_user,
            update_transaction,
        },
    },
    user::UserID,
};

/// The state needed to query and modify transactions.
#[derive(Clone)]
pub struct TransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for TransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The request body for creating a transaction.
///
/// There is deliberately no owner field. The owner always comes from the
/// authenticated session, and any extra fields in the request body are
/// ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionData {
    /// Text detailing the transaction.
    pub description: String,
    /// How the transaction was paid for.
    pub payment_type: PaymentType,
    /// What the transaction was for.
    pub category: Category,
    /// The value of the transaction in dollars.
    pub amount: f64,
    /// Where the transaction happened. Defaults to "Unknown" when omitted.
    #[serde(default)]
    pub location: Option<String>,
    /// The date when the transaction occurred.
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
}

/// A route handler for creating a new transaction owned by the logged in user.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn create_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Json(data): Json<CreateTransactionData>,
) -> Response {
    let new_transaction = match NewTransaction::new(
        data.description,
        data.payment_type,
        data.category,
        data.amount,
        data.location,
        data.date,
    ) {
        Ok(new_transaction) => new_transaction,
        Err(error) => return error.into_response(),
    };

    let connection = state
        .db_connection
        .lock()
        .expect("Could not acquire database lock");

    match create_transaction(user_id, new_transaction, &connection) {
        Ok(transaction) => (StatusCode::CREATED, Json(transaction)).into_response(),
        Err(error) => error.into_response(),
    }
}

/// A route handler for listing the logged in user's transactions, most
/// recently modified first.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn get_transactions_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
) -> Response {
    let connection = state
        .db_connection
        .lock()
        .expect("Could not acquire database lock");

    match get_transactions_by_user(user_id, &connection) {
        Ok(transactions) => Json(transactions).into_response(),
        Err(error) => error.into_response(),
    }
}

/// A route handler for getting one of the logged in user's transactions.
///
/// Responds with `null` if the transaction does not exist or belongs to
/// another user.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn get_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Path(transaction_id): Path<TransactionId>,
) -> Response {
    let connection = state
        .db_connection
        .lock()
        .expect("Could not acquire database lock");

    match get_transaction(transaction_id, user_id, &connection) {
        Ok(transaction) => Json(transaction).into_response(),
        Err(Error::NotFound) => Json(None::<Transaction>).into_response(),
        Err(error) => error.into_response(),
    }
}

/// A route handler for editing one of the logged in user's transactions.
///
/// Only the fields present in the request body change. Responds with `null`
/// if the transaction does not exist or belongs to another user.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn update_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Path(transaction_id): Path<TransactionId>,
    Json(update): Json<TransactionUpdate>,
) -> Response {
    let connection = state
        .db_connection
        .lock()
        .expect("Could not acquire database lock");

    match update_transaction(transaction_id, user_id, update, &connection) {
        Ok(transaction) => Json(transaction).into_response(),
        Err(Error::NotFound) => Json(None::<Transaction>).into_response(),
        Err(error) => error.into_response(),
    }
}

/// A route handler for deleting one of the logged in user's transactions.
///
/// Responds with the deleted transaction, or `null` if the transaction does
/// not exist or belongs to another user.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn delete_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Path(transaction_id): Path<TransactionId>,
) -> Response {
    let connection = state
        .db_connection
        .lock()
        .expect("Could not acquire database lock");

    match delete_transaction(transaction_id, user_id, &connection) {
        Ok(transaction) => Json(transaction).into_response(),
        Err(Error::NotFound) => Json(None::<Transaction>).into_response(),
        Err(error) => error.into_response(),
    }
}

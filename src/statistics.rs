//! Per-category transaction totals.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::Serialize;

use crate::{
    AppState, Error, category::Category, transaction::get_transactions_by_user, user::UserID,
};

/// The total amount recorded for one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotal {
    /// The category the total belongs to.
    pub category: Category,
    /// The sum of all transaction amounts in the category.
    pub total_amount: f64,
}

/// Sum the amounts of `user_id`'s transactions by category.
///
/// Categories with no transactions are absent from the result.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn category_totals(
    user_id: UserID,
    connection: &Connection,
) -> Result<HashMap<Category, f64>, Error> {
    let transactions = get_transactions_by_user(user_id, connection)?;

    let mut totals = HashMap::new();

    for transaction in transactions {
        *totals.entry(transaction.category).or_insert(0.0) += transaction.amount;
    }

    Ok(totals)
}

/// The state needed to compute statistics.
#[derive(Clone)]
pub struct StatisticsState {
    /// The database connection for reading transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for StatisticsState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler for the logged in user's per-category totals.
///
/// The totals are recomputed from the stored transactions on every request,
/// so they are always consistent with the latest edits.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn get_category_statistics(
    State(state): State<StatisticsState>,
    Extension(user_id): Extension<UserID>,
) -> Response {
    let connection = state
        .db_connection
        .lock()
        .expect("Could not acquire database lock");

    let totals = match category_totals(user_id, &connection) {
        Ok(totals) => totals,
        Err(error) => return error.into_response(),
    };

    let mut totals: Vec<CategoryTotal> = totals
        .into_iter()
        .map(|(category, total_amount)| CategoryTotal {
            category,
            total_amount,
        })
        .collect();
    // Sort for a deterministic response order.
    totals.sort_by_key(|total| total.category);

    Json(totals).into_response()
}

//! Database initialization.

use rusqlite::Connection;

use crate::{
    session::create_session_table, transaction::create_transaction_table, user::create_user_table,
};

/// Create the tables and indices for the application's domain models.
///
/// # Errors
///
/// Returns an error if there is an SQL error.
pub fn initialize(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.pragma_update(None, "foreign_keys", "ON")?;

    create_user_table(connection)?;
    create_session_table(connection)?;
    create_transaction_table(connection)?;

    Ok(())
}

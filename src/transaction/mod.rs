//! Transaction management for the finance tracker.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model and `NewTransaction` validation
//! - Database functions for storing, querying, and updating transactions
//! - The JSON endpoint handlers for transaction CRUD

mod core;
mod endpoints;

pub use core::{
    DEFAULT_LOCATION, NewTransaction, Transaction, TransactionUpdate, create_transaction,
    create_transaction_table, delete_transaction, get_transaction, get_transactions_by_user,
    update_transaction,
};
pub use endpoints::{
    create_transaction_endpoint, delete_transaction_endpoint, get_transaction_endpoint,
    get_transactions_endpoint, update_transaction_endpoint,
};

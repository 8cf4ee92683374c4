//! Type aliases for database row IDs.

/// Alias of i64 for database row IDs.
pub type DatabaseId = i64;

/// The ID of a transaction row.
pub type TransactionId = DatabaseId;

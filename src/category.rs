//! The category and payment type labels attached to every transaction.

use std::fmt::{Display, Formatter};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// What a transaction was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Money put aside.
    Saving,
    /// Money spent.
    Expense,
    /// Money invested.
    Investment,
}

impl Category {
    /// The category as the lowercase string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Saving => "saving",
            Category::Expense => "expense",
            Category::Investment => "investment",
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ToSql for Category {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Category {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "saving" => Ok(Category::Saving),
            "expense" => Ok(Category::Expense),
            "investment" => Ok(Category::Investment),
            other => Err(FromSqlError::Other(
                format!("unknown category '{other}'").into(),
            )),
        }
    }
}

/// How a transaction was paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    /// Paid with cash.
    Cash,
    /// Paid by card.
    Card,
}

impl PaymentType {
    /// The payment type as the lowercase string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Cash => "cash",
            PaymentType::Card => "card",
        }
    }
}

impl Display for PaymentType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ToSql for PaymentType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for PaymentType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "cash" => Ok(PaymentType::Cash),
            "card" => Ok(PaymentType::Card),
            other => Err(FromSqlError::Other(
                format!("unknown payment type '{other}'").into(),
            )),
        }
    }
}

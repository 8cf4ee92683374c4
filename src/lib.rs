//! Pocketbook is a personal finance tracker.
//!
//! This library provides a JSON REST API for user accounts, cookie-backed
//! sessions, and owner-scoped, categorized transactions with per-category
//! totals.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use time::OffsetDateTime;
use tokio::signal;

mod app_state;
mod auth;
mod category;
mod current_user;
mod database_id;
mod db;
mod endpoints;
mod log_in;
mod log_out;
mod logging;
mod password;
mod register_user;
mod routing;
mod session;
mod statistics;
mod transaction;
mod user;

pub use app_state::AppState;
pub use db::initialize as initialize_db;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use password::{PasswordHash, ValidatedPassword};
pub use routing::build_router;
pub use session::remove_expired_sessions;
pub use user::{User, UserID};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The user provided an invalid combination of username and password.
    ///
    /// This error is deliberately the same whether the username is unknown or
    /// the password is wrong, so a caller cannot probe which usernames exist.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// The request did not carry a valid, unexpired session.
    #[error("unauthorized")]
    Unauthorized,

    /// The username used at sign-up is already taken.
    #[error("a user with that username already exists")]
    DuplicateUsername,

    /// The username did not meet the account constraints.
    #[error("invalid username: {0}")]
    InvalidUsername(String),

    /// The display name did not meet the account constraints.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// The raw password did not meet the password policy.
    #[error("invalid password: {0}")]
    InvalidPassword(String),

    /// The transaction description was too short or too long.
    #[error("invalid description: {0}")]
    InvalidDescription(String),

    /// The transaction amount was negative or not a finite number.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// The transaction location was too long.
    #[error("invalid location: {0}")]
    InvalidLocation(String),

    /// A date in the future was used to create or edit a transaction.
    ///
    /// Transactions record events that have already happened, therefore future
    /// dates are not allowed.
    #[error("{0} is a date in the future, which is not allowed")]
    FutureDate(OffsetDateTime),

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows. The
    /// transaction endpoints translate it into a JSON `null` body so that
    /// clients can tell "no such record" apart from a system failure.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    /// When communicating with the application client this error should be
    /// replaced with a general error type indicating an internal server error.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.ends_with("user.username") =>
            {
                Error::DuplicateUsername
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            // Logged once in `IntoResponse`, alongside the other internal errors.
            error => Error::SqlError(error),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::InvalidCredentials | Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::DuplicateUsername => StatusCode::CONFLICT,
            Error::InvalidUsername(_)
            | Error::InvalidName(_)
            | Error::InvalidPassword(_)
            | Error::InvalidDescription(_)
            | Error::InvalidAmount(_)
            | Error::InvalidLocation(_)
            | Error::FutureDate(_) => StatusCode::BAD_REQUEST,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::HashingError(_) | Error::SqlError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &self {
            // Internal failures are logged with full detail server-side and
            // reduced to an opaque message client-side.
            Error::HashingError(_) | Error::SqlError(_) => {
                tracing::error!("An unexpected error occurred: {}", self);
                "an internal error occurred".to_owned()
            }
            error => error.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

//! This file defines the endpoint for logging out the current user.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use rusqlite::Connection;
use serde_json::json;

use crate::{
    AppState,
    auth::{get_token_from_cookies, invalidate_session_cookie},
    session::delete_session,
};

/// The state needed to log out a user.
#[derive(Clone)]
pub struct LogOutState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for LogOutState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<LogOutState> for Key {
    fn from_ref(state: &LogOutState) -> Self {
        state.cookie_key.clone()
    }
}

/// Handler for log-out requests via the POST method.
///
/// Destroys the server-side session and expires the session cookie. Logging
/// out without a valid session is a no-op that still responds with 200, so
/// the endpoint is idempotent.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn post_log_out(State(state): State<LogOutState>, jar: PrivateCookieJar) -> Response {
    if let Ok(token) = get_token_from_cookies(&jar) {
        let connection = state
            .db_connection
            .lock()
            .expect("Could not acquire database lock");

        if let Err(error) = delete_session(&token, &connection) {
            return error.into_response();
        }
    }

    let jar = invalidate_session_cookie(jar);

    (jar, Json(json!({ "message": "Logged out successfully" }))).into_response()
}

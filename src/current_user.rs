//! This file defines the endpoint for getting the currently logged in user.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use rusqlite::Connection;

use crate::{
    AppState,
    auth::get_token_from_cookies,
    session::resolve_current_user,
    user::User,
};

/// The state needed to look up the current user.
#[derive(Clone)]
pub struct CurrentUserState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CurrentUserState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<CurrentUserState> for Key {
    fn from_ref(state: &CurrentUserState) -> Self {
        state.cookie_key.clone()
    }
}

/// Handler for getting the currently logged in user.
///
/// Responds with the user for the request's session, or `null` when there is
/// no session, the session has expired, or the user no longer exists. Being
/// anonymous is a normal answer here, not an error.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn get_current_user(
    State(state): State<CurrentUserState>,
    jar: PrivateCookieJar,
) -> Response {
    let token = match get_token_from_cookies(&jar) {
        Ok(token) => token,
        Err(_) => return Json(None::<User>).into_response(),
    };

    let user = {
        let connection = state
            .db_connection
            .lock()
            .expect("Could not acquire database lock");

        resolve_current_user(&token, &connection)
    };

    match user {
        Ok(user) => Json(user).into_response(),
        Err(error) => error.into_response(),
    }
}

//! Authentication middleware that resolves the session cookie to a user.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use rusqlite::Connection;

use crate::{
    AppState, Error, auth::cookie::get_token_from_cookies, session::resolve_current_user,
};

/// The state needed for the auth middleware
#[derive(Clone)]
pub struct AuthState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<AuthState> for Key {
    fn from_ref(state: &AuthState) -> Self {
        state.cookie_key.clone()
    }
}

/// Middleware function that checks for a valid session cookie.
/// The user ID is placed into the request and the request executed normally if the session is
/// valid, otherwise a 401 response is returned.
///
/// The response is the same whether the cookie is missing, tampered with, unknown, or expired, so
/// a caller cannot tell which case it hit.
///
/// **Note**: Route handlers can use the function argument `Extension(user_id): Extension<UserID>` to receive the user ID.
///
/// **Note**: The app state must contain an `axum_extra::extract::cookie::Key` for decrypting and verifying the cookie contents.
pub async fn auth_guard(State(state): State<AuthState>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();
    let jar = match PrivateCookieJar::from_request_parts(&mut parts, &state).await {
        Ok(jar) => jar,
        Err(err) => {
            tracing::error!("Error getting cookie jar: {err:?}.");
            return Error::Unauthorized.into_response();
        }
    };

    let token = match get_token_from_cookies(&jar) {
        Ok(token) => token,
        Err(_) => return Error::Unauthorized.into_response(),
    };

    let user = {
        let connection = state
            .db_connection
            .lock()
            .expect("Could not acquire database lock");

        resolve_current_user(&token, &connection)
    };

    match user {
        Ok(Some(user)) => {
            parts.extensions.insert(user.id);
            let request = Request::from_parts(parts, body);

            next.run(request).await
        }
        Ok(None) => Error::Unauthorized.into_response(),
        Err(error) => error.into_response(),
    }
}

//! This file defines the endpoint for handling log-in requests.
//! The auth module handles the lower level session and cookie logic.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use rusqlite::Connection;
use serde::Deserialize;
use time::Duration;

use crate::{
    AppState, Error,
    auth::set_session_cookie,
    password::PasswordHash,
    session::create_session,
    user::get_user_by_username,
};

/// A throwaway bcrypt hash that is verified when the username is unknown, so
/// that both log-in failure paths cost a hash verification. Without it, the
/// response time would reveal whether a username exists.
const DUMMY_PASSWORD_HASH: &str = "$2b$12$Gwf0uvxH3L7JLfo0CC/NCOoijK2vQ/wbgP.LeNup8vj6gg31IiFkm";

/// The raw data entered by the user when logging in.
///
/// The password is stored as a plain string. There is no need for validation here since
/// it will be compared against the password hash in the database.
#[derive(Debug, Clone, Deserialize)]
pub struct LogInData {
    /// The username entered during log-in.
    pub username: String,
    /// The password entered during log-in.
    pub password: String,
}

/// The state needed to perform a login.
#[derive(Clone)]
pub struct LogInState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// How long the new session stays valid.
    pub session_duration: Duration,
    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for LogInState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            session_duration: state.session_duration,
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<LogInState> for Key {
    fn from_ref(state: &LogInState) -> Self {
        state.cookie_key.clone()
    }
}

/// Handler for log-in requests via the POST method.
///
/// On success a brand-new session is opened, the session cookie is set, and
/// the user is returned. Both failure cases, an unknown username and a wrong
/// password, produce exactly the same response.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn post_log_in(
    State(state): State<LogInState>,
    jar: PrivateCookieJar,
    Json(data): Json<LogInData>,
) -> Response {
    // Fetch under the lock, verify outside it. bcrypt verification takes long
    // enough that holding the lock through it would stall other requests.
    let user = {
        let connection = state
            .db_connection
            .lock()
            .expect("Could not acquire database lock");

        get_user_by_username(&data.username, &connection)
    };

    let user = match user {
        Ok(user) => user,
        Err(Error::NotFound) => {
            let _ = PasswordHash::new_unchecked(DUMMY_PASSWORD_HASH).verify(&data.password);

            return Error::InvalidCredentials.into_response();
        }
        Err(error) => return error.into_response(),
    };

    if !user.password_hash.verify(&data.password) {
        return Error::InvalidCredentials.into_response();
    }

    let session = {
        let connection = state
            .db_connection
            .lock()
            .expect("Could not acquire database lock");

        create_session(user.id, state.session_duration, &connection)
    };

    match session {
        Ok(session) => {
            let jar = set_session_cookie(jar, &session.token, session.expires_at);

            (jar, Json(user)).into_response()
        }
        Err(error) => error.into_response(),
    }
}

#[cfg(test)]
mod log_in_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Router, http::StatusCode, routing::post};
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::{Value, json};

    use crate::{
        app_state::create_cookie_key,
        auth::COOKIE_TOKEN,
        db::initialize,
        endpoints,
        log_in::{LogInState, post_log_in},
        password::{PasswordHash, ValidatedPassword},
        session::DEFAULT_SESSION_DURATION,
        user::{Gender, NewUser, Username, create_user},
    };

    const TEST_PASSWORD: &str = "hunter21";

    fn get_test_server() -> TestServer {
        let connection =
            Connection::open_in_memory().expect("Could not open in-memory SQLite database");
        initialize(&connection).expect("Could not initialize database");

        let password_hash = PasswordHash::from_raw_password(
            &ValidatedPassword::new_unchecked(TEST_PASSWORD),
            // A low cost keeps the test fast. The handler still uses the
            // default cost in production.
            4,
        )
        .expect("Could not hash test password");

        create_user(
            NewUser {
                username: Username::new_unchecked("alice99"),
                name: "Alice Smith".to_owned(),
                password_hash,
                profile_picture: "https://example.com/avatar.png".to_owned(),
                gender: Gender::Female,
            },
            &connection,
        )
        .expect("Could not create test user");

        let state = LogInState {
            cookie_key: create_cookie_key("foobar"),
            session_duration: DEFAULT_SESSION_DURATION,
            db_connection: Arc::new(Mutex::new(connection)),
        };

        let app = Router::new()
            .route(endpoints::LOG_IN, post(post_log_in))
            .with_state(state);

        TestServer::try_new(app).expect("Could not create test server.")
    }

    #[tokio::test]
    async fn log_in_succeeds_with_valid_credentials() {
        let server = get_test_server();

        let response = server
            .post(endpoints::LOG_IN)
            .json(&json!({ "username": "alice99", "password": TEST_PASSWORD }))
            .await;

        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["username"], "alice99");
        assert!(
            body.get("passwordHash").is_none() && body.get("password_hash").is_none(),
            "the password hash must not be serialized, got {body}"
        );

        let cookie = response.cookie(COOKIE_TOKEN);
        assert!(!cookie.value().is_empty(), "expected a session cookie");
    }

    #[tokio::test]
    async fn log_in_fails_with_wrong_password() {
        let server = get_test_server();

        let response = server
            .post(endpoints::LOG_IN)
            .json(&json!({ "username": "alice99", "password": "wrongpassword1" }))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_username_and_wrong_password_are_indistinguishable() {
        let server = get_test_server();

        let wrong_password = server
            .post(endpoints::LOG_IN)
            .json(&json!({ "username": "alice99", "password": "wrongpassword1" }))
            .await;
        let unknown_username = server
            .post(endpoints::LOG_IN)
            .json(&json!({ "username": "nobody99", "password": "wrongpassword1" }))
            .await;

        assert_eq!(wrong_password.status_code(), unknown_username.status_code());
        assert_eq!(wrong_password.text(), unknown_username.text());
    }

    #[tokio::test]
    async fn each_log_in_issues_a_fresh_token() {
        let server = get_test_server();
        let credentials = json!({ "username": "alice99", "password": TEST_PASSWORD });

        let first = server.post(endpoints::LOG_IN).json(&credentials).await;
        let second = server.post(endpoints::LOG_IN).json(&credentials).await;

        first.assert_status_ok();
        second.assert_status_ok();
        assert_ne!(
            first.cookie(COOKIE_TOKEN).value(),
            second.cookie(COOKIE_TOKEN).value(),
            "each log in should issue an independently random token"
        );
    }
}

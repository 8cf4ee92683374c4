//! This file defines the sign-up endpoint for creating a new user account.
//! The auth module handles the lower level session and cookie logic.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use rusqlite::Connection;
use serde::Deserialize;
use time::Duration;

use crate::{
    AppState,
    auth::set_session_cookie,
    password::{PasswordHash, ValidatedPassword},
    session::create_session,
    user::{Gender, NewUser, Username, create_user, validate_name},
};

/// The data submitted when signing up.
#[derive(Debug, Deserialize)]
pub struct RegisterData {
    /// The username for the new account.
    pub username: String,
    /// The display name for the new account.
    pub name: String,
    /// The raw password for the new account.
    pub password: String,
    /// The gender of the new user, used to pick a default avatar.
    pub gender: Gender,
}

/// The state needed to register a new user.
#[derive(Clone)]
pub struct RegisterState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// How long the new user's session stays valid.
    pub session_duration: Duration,
    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for RegisterState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            session_duration: state.session_duration,
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<RegisterState> for Key {
    fn from_ref(state: &RegisterState) -> Self {
        state.cookie_key.clone()
    }
}

/// The default avatar URL for a new user.
pub(crate) fn default_profile_picture(gender: Gender, username: &str) -> String {
    match gender {
        Gender::Male => format!("https://avatar.iran.liara.run/public/boy?username={username}"),
        Gender::Female => format!("https://avatar.iran.liara.run/public/girl?username={username}"),
    }
}

/// Handler for sign-up requests via the POST method.
///
/// On success the new user is persisted, a session is opened, and the user is
/// returned without their password hash.
///
/// # Errors
///
/// This function will return an error in a few situations.
/// - A field does not meet the account constraints.
/// - The username is already taken.
/// - An internal error occurred when hashing the password.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn register_user(
    State(state): State<RegisterState>,
    jar: PrivateCookieJar,
    Json(data): Json<RegisterData>,
) -> Response {
    let username = match Username::new(&data.username) {
        Ok(username) => username,
        Err(error) => return error.into_response(),
    };

    if let Err(error) = validate_name(&data.name) {
        return error.into_response();
    }

    let password = match ValidatedPassword::new(&data.password) {
        Ok(password) => password,
        Err(error) => return error.into_response(),
    };

    // Hashing is deliberately slow, so do it before taking the database lock.
    let password_hash = match PasswordHash::from_raw_password(&password, bcrypt::DEFAULT_COST) {
        Ok(password_hash) => password_hash,
        Err(error) => return error.into_response(),
    };

    let profile_picture = default_profile_picture(data.gender, username.as_str());

    let result = {
        let connection = state
            .db_connection
            .lock()
            .expect("Could not acquire database lock");

        create_user(
            NewUser {
                username,
                name: data.name,
                password_hash,
                profile_picture,
                gender: data.gender,
            },
            &connection,
        )
        .and_then(|user| {
            let session = create_session(user.id, state.session_duration, &connection)?;

            Ok((user, session))
        })
    };

    match result {
        Ok((user, session)) => {
            let jar = set_session_cookie(jar, &session.token, session.expires_at);

            (StatusCode::CREATED, jar, Json(user)).into_response()
        }
        Err(error) => error.into_response(),
    }
}

#[cfg(test)]
mod register_user_tests {
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
        register_user::{RegisterState, register_user},
        session::DEFAULT_SESSION_DURATION,
    };

    fn get_test_server() -> TestServer {
        let connection =
            Connection::open_in_memory().expect("Could not open in-memory SQLite database");
        initialize(&connection).expect("Could not initialize database");

        let state = RegisterState {
            cookie_key: create_cookie_key("foobar"),
            session_duration: DEFAULT_SESSION_DURATION,
            db_connection: Arc::new(Mutex::new(connection)),
        };

        let app = Router::new()
            .route(endpoints::USERS, post(register_user))
            .with_state(state);

        TestServer::try_new(app).expect("Could not create test server.")
    }

    fn sign_up_data(username: &str) -> Value {
        json!({
            "username": username,
            "name": "Alice Smith",
            "password": "hunter21",
            "gender": "female",
        })
    }

    #[tokio::test]
    async fn sign_up_creates_user_and_session() {
        let server = get_test_server();

        let response = server.post(endpoints::USERS).json(&sign_up_data("alice99")).await;

        response.assert_status(StatusCode::CREATED);

        let body: Value = response.json();
        assert_eq!(body["username"], "alice99");
        assert_eq!(body["name"], "Alice Smith");
        assert_eq!(
            body["profilePicture"],
            "https://avatar.iran.liara.run/public/girl?username=alice99"
        );
        assert!(
            body.get("passwordHash").is_none() && body.get("password_hash").is_none(),
            "the password hash must not be serialized, got {body}"
        );

        let cookie = response.cookie(COOKIE_TOKEN);
        assert!(!cookie.value().is_empty(), "expected a session cookie");
    }

    #[tokio::test]
    async fn sign_up_with_duplicate_username_is_conflict() {
        let server = get_test_server();
        server
            .post(endpoints::USERS)
            .json(&sign_up_data("alice99"))
            .await
            .assert_status(StatusCode::CREATED);

        let response = server.post(endpoints::USERS).json(&sign_up_data("alice99")).await;

        response.assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn sign_up_with_invalid_username_is_bad_request() {
        let server = get_test_server();

        let response = server.post(endpoints::USERS).json(&sign_up_data("ab")).await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn sign_up_with_weak_password_is_bad_request() {
        let server = get_test_server();
        let data = json!({
            "username": "alice99",
            "name": "Alice Smith",
            "password": "password",
            "gender": "female",
        });

        let response = server.post(endpoints::USERS).json(&data).await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn male_users_get_the_boy_avatar() {
        let server = get_test_server();
        let data = json!({
            "username": "bob1234",
            "name": "Bob Smith",
            "password": "hunter21",
            "gender": "male",
        });

        let response = server.post(endpoints::USERS).json(&data).await;

        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        assert_eq!(
            body["profilePicture"],
            "https://avatar.iran.liara.run/public/boy?username=bob1234"
        );
    }
}

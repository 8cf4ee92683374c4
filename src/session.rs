//! The durable session store.
//!
//! Sessions are rows in SQLite keyed by an opaque random token, so logins
//! survive server restarts. Expired rows are ignored on read and removed by a
//! periodic sweep in the server binary.

use rand::{RngCore, rngs::OsRng};
use rusqlite::Connection;
use time::{Duration, OffsetDateTime};

use crate::{
    Error,
    user::{User, UserID, get_user_by_id},
};

/// How long a session stays valid after it is created.
pub const DEFAULT_SESSION_DURATION: Duration = Duration::days(7);

/// An opaque session token.
///
/// Tokens are 32 bytes of OS randomness, hex encoded. They carry no meaning
/// on their own and are only ever compared against the session table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// Generate a fresh random token.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);

        let token = bytes.iter().map(|byte| format!("{byte:02x}")).collect();

        Self(token)
    }

    /// Create a token from a raw string, e.g. a cookie value.
    pub fn from_raw(raw: &str) -> Self {
        Self(raw.to_owned())
    }

    /// The token string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A session row.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// The opaque token identifying the session.
    pub token: SessionToken,
    /// The user the session belongs to.
    pub user_id: UserID,
    /// When the session stops being valid.
    pub expires_at: OffsetDateTime,
}

/// Create the session table in the database.
///
/// # Errors
///
/// Returns an error if there is an SQL error.
pub fn create_session_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS session (
            token TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES user(id) ON DELETE CASCADE,
            expires_at TEXT NOT NULL
        )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_session_expires_at ON session(expires_at)",
        (),
    )?;

    Ok(())
}

/// Insert a new session for `user_id` lasting `duration` from now.
///
/// # Errors
///
/// Returns [Error::SqlError] if there is an unexpected SQL error.
pub fn create_session(
    user_id: UserID,
    duration: Duration,
    connection: &Connection,
) -> Result<Session, Error> {
    let token = SessionToken::generate();
    let expires_at = OffsetDateTime::now_utc() + duration;

    connection.execute(
        "INSERT INTO session (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
        (token.as_str(), user_id.as_i64(), expires_at),
    )?;

    Ok(Session {
        token,
        user_id,
        expires_at,
    })
}

/// Get the session for `token`, if it exists and has not expired.
///
/// An expired session row is deleted on the way through, so readers never see
/// stale sessions even between sweeps.
///
/// # Errors
///
/// Returns:
/// - [Error::NotFound] if there is no session for the token, or it has expired.
/// - [Error::SqlError] if there is an unexpected SQL error.
pub fn get_session(token: &SessionToken, connection: &Connection) -> Result<Session, Error> {
    let session = connection.query_row(
        "SELECT token, user_id, expires_at FROM session WHERE token = ?1",
        (token.as_str(),),
        |row| {
            Ok(Session {
                token: SessionToken::from_raw(&row.get::<usize, String>(0)?),
                user_id: UserID::new(row.get(1)?),
                expires_at: row.get(2)?,
            })
        },
    )?;

    if session.expires_at <= OffsetDateTime::now_utc() {
        delete_session(token, connection)?;
        return Err(Error::NotFound);
    }

    Ok(session)
}

/// Delete the session for `token`.
///
/// Deleting a session that does not exist is a no-op, so logout stays
/// idempotent.
///
/// # Errors
///
/// Returns [Error::SqlError] if there is an unexpected SQL error.
pub fn delete_session(token: &SessionToken, connection: &Connection) -> Result<(), Error> {
    connection.execute("DELETE FROM session WHERE token = ?1", (token.as_str(),))?;

    Ok(())
}

/// Delete all expired sessions and return how many were removed.
///
/// # Errors
///
/// Returns [Error::SqlError] if there is an unexpected SQL error.
pub fn remove_expired_sessions(connection: &Connection) -> Result<usize, Error> {
    let removed = connection.execute(
        "DELETE FROM session WHERE expires_at <= ?1",
        (OffsetDateTime::now_utc(),),
    )?;

    Ok(removed)
}

/// Resolve a session token to its user.
///
/// Returns `None` when the token has no live session or the user no longer
/// exists. Those cases are indistinguishable to the caller on purpose.
///
/// # Errors
///
/// Returns [Error::SqlError] if there is an unexpected SQL error.
pub fn resolve_current_user(
    token: &SessionToken,
    connection: &Connection,
) -> Result<Option<User>, Error> {
    let session = match get_session(token, connection) {
        Ok(session) => session,
        Err(Error::NotFound) => return Ok(None),
        Err(error) => return Err(error),
    };

    match get_user_by_id(session.user_id, connection) {
        Ok(user) => Ok(Some(user)),
        Err(Error::NotFound) => Ok(None),
        Err(error) => Err(error),
    }
}

#[cfg(test)]
mod session_tests {
    use rusqlite::Connection;
    use time::{Duration, OffsetDateTime};

    use crate::{
        Error,
        password::PasswordHash,
        session::{
            DEFAULT_SESSION_DURATION, SessionToken, create_session, create_session_table,
            delete_session, get_session, remove_expired_sessions, resolve_current_user,
        },
        user::{Gender, NewUser, User, Username, create_user, create_user_table},
    };

    fn get_test_connection() -> Connection {
        let connection =
            Connection::open_in_memory().expect("Could not open in-memory database.");
        connection
            .pragma_update(None, "foreign_keys", "ON")
            .expect("Could not enable foreign keys.");
        create_user_table(&connection).expect("Could not create user table.");
        create_session_table(&connection).expect("Could not create session table.");

        connection
    }

    fn insert_test_user(connection: &Connection) -> User {
        create_user(
            NewUser {
                username: Username::new_unchecked("alice99"),
                name: "Alice".to_owned(),
                password_hash: PasswordHash::new_unchecked("hash"),
                profile_picture: "https://example.com/avatar.png".to_owned(),
                gender: Gender::Female,
            },
            connection,
        )
        .expect("Could not create test user.")
    }

    #[test]
    fn generated_tokens_are_unique_hex() {
        let first = SessionToken::generate();
        let second = SessionToken::generate();

        assert_ne!(first, second, "two generated tokens should not collide");
        assert_eq!(first.as_str().len(), 64);
        assert!(first.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn create_session_then_get_session_round_trips() {
        let connection = get_test_connection();
        let user = insert_test_user(&connection);

        let want = create_session(user.id, DEFAULT_SESSION_DURATION, &connection).unwrap();
        let got = get_session(&want.token, &connection).unwrap();

        assert_eq!(got, want, "got {got:?}, want {want:?}");
        assert!(got.expires_at > OffsetDateTime::now_utc() + Duration::days(6));
    }

    #[test]
    fn get_unknown_session_is_not_found() {
        let connection = get_test_connection();

        let result = get_session(&SessionToken::from_raw("deadbeef"), &connection);

        assert_eq!(result.unwrap_err(), Error::NotFound);
    }

    #[test]
    fn expired_session_is_not_found_and_deleted() {
        let connection = get_test_connection();
        let user = insert_test_user(&connection);
        let session = create_session(user.id, Duration::seconds(-1), &connection).unwrap();

        let result = get_session(&session.token, &connection);
        assert_eq!(result.unwrap_err(), Error::NotFound);

        let remaining: i64 = connection
            .query_row("SELECT COUNT(*) FROM session", (), |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 0, "expired session should have been deleted");
    }

    #[test]
    fn delete_session_is_idempotent() {
        let connection = get_test_connection();
        let user = insert_test_user(&connection);
        let session = create_session(user.id, DEFAULT_SESSION_DURATION, &connection).unwrap();

        delete_session(&session.token, &connection).unwrap();
        delete_session(&session.token, &connection).unwrap();

        let result = get_session(&session.token, &connection);
        assert_eq!(result.unwrap_err(), Error::NotFound);
    }

    #[test]
    fn remove_expired_sessions_only_removes_expired_rows() {
        let connection = get_test_connection();
        let user = insert_test_user(&connection);
        create_session(user.id, Duration::seconds(-1), &connection).unwrap();
        create_session(user.id, Duration::seconds(-10), &connection).unwrap();
        let live = create_session(user.id, DEFAULT_SESSION_DURATION, &connection).unwrap();

        let removed = remove_expired_sessions(&connection).unwrap();

        assert_eq!(removed, 2, "got {removed} removed sessions, want 2");
        assert!(get_session(&live.token, &connection).is_ok());
    }

    #[test]
    fn resolve_current_user_returns_session_owner() {
        let connection = get_test_connection();
        let user = insert_test_user(&connection);
        let session = create_session(user.id, DEFAULT_SESSION_DURATION, &connection).unwrap();

        let got = resolve_current_user(&session.token, &connection).unwrap();

        assert_eq!(got, Some(user));
    }

    #[test]
    fn resolve_current_user_with_unknown_token_is_none() {
        let connection = get_test_connection();

        let got = resolve_current_user(&SessionToken::from_raw("deadbeef"), &connection).unwrap();

        assert_eq!(got, None);
    }

    #[test]
    fn resolve_current_user_with_expired_session_is_none() {
        let connection = get_test_connection();
        let user = insert_test_user(&connection);
        let session = create_session(user.id, Duration::seconds(-1), &connection).unwrap();

        let got = resolve_current_user(&session.token, &connection).unwrap();

        assert_eq!(got, None);
    }
}

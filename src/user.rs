//! The user account model, its validation rules, and its SQL.

use std::fmt::{Display, Formatter};

use rusqlite::{
    Connection, Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, password::PasswordHash};

/// The ID of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// The underlying integer ID.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user's gender, used to pick a default profile picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    /// Male.
    Male,
    /// Female.
    Female,
}

impl Gender {
    /// The gender as the lowercase string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

impl ToSql for Gender {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Gender {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            other => Err(FromSqlError::Other(
                format!("unknown gender '{other}'").into(),
            )),
        }
    }
}

/// A username that meets the account constraints.
///
/// Usernames are case-sensitive and must be between 4 and 20 alphanumeric
/// ASCII characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Username(String);

impl Username {
    /// Create a username from a raw string.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidUsername] if the string does not meet the
    /// username constraints.
    pub fn new(raw: &str) -> Result<Self, Error> {
        if raw.len() < 4 {
            return Err(Error::InvalidUsername(
                "username must be at least 4 characters long".to_owned(),
            ));
        }

        if raw.len() > 20 {
            return Err(Error::InvalidUsername(
                "username must be at most 20 characters long".to_owned(),
            ));
        }

        if !raw.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::InvalidUsername(
                "username may only contain letters and numbers".to_owned(),
            ));
        }

        Ok(Self(raw.to_owned()))
    }

    /// Create a username without any validation.
    ///
    /// Intended for loading usernames from the database and for tests.
    pub fn new_unchecked(raw: &str) -> Self {
        Self(raw.to_owned())
    }

    /// The username string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Username {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Check that a display name is between 2 and 50 characters long.
///
/// # Errors
///
/// Returns [Error::InvalidName] if the name is too short or too long.
pub fn validate_name(name: &str) -> Result<(), Error> {
    let length = name.chars().count();

    if length < 2 {
        return Err(Error::InvalidName(
            "name must be at least 2 characters long".to_owned(),
        ));
    }

    if length > 50 {
        return Err(Error::InvalidName(
            "name must be at most 50 characters long".to_owned(),
        ));
    }

    Ok(())
}

/// A user of the application.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// The user's ID.
    pub id: UserID,
    /// The user's unique username.
    pub username: Username,
    /// The user's display name.
    pub name: String,
    /// The bcrypt hash of the user's password. Never sent to clients.
    #[serde(skip_serializing)]
    pub password_hash: PasswordHash,
    /// URL of the user's profile picture.
    pub profile_picture: String,
    /// The user's gender.
    pub gender: Gender,
    /// When the account was created (UTC).
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// When the account was last modified (UTC).
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// The data needed to insert a new user row.
///
/// All fields are expected to be validated before this struct is built.
pub struct NewUser {
    /// The user's unique username.
    pub username: Username,
    /// The user's display name.
    pub name: String,
    /// The bcrypt hash of the user's password.
    pub password_hash: PasswordHash,
    /// URL of the user's profile picture.
    pub profile_picture: String,
    /// The user's gender.
    pub gender: Gender,
}

/// Create the user table in the database.
///
/// # Errors
///
/// Returns an error if there is an SQL error.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
            id INTEGER PRIMARY KEY,
            username TEXT UNIQUE NOT NULL,
            name TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            profile_picture TEXT NOT NULL,
            gender TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        (),
    )?;

    Ok(())
}

/// Insert a new user into the database and return the created row.
///
/// # Errors
///
/// Returns:
/// - [Error::DuplicateUsername] if the username is already taken.
/// - [Error::SqlError] if there is an unexpected SQL error.
pub fn create_user(new_user: NewUser, connection: &Connection) -> Result<User, Error> {
    let now = OffsetDateTime::now_utc();

    let id = connection
        .query_row(
            "INSERT INTO user (username, name, password_hash, profile_picture, gender, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            RETURNING id",
            (
                new_user.username.as_str(),
                &new_user.name,
                new_user.password_hash.as_str(),
                &new_user.profile_picture,
                new_user.gender,
                now,
                now,
            ),
            |row| row.get::<usize, i64>(0),
        )?;

    Ok(User {
        id: UserID::new(id),
        username: new_user.username,
        name: new_user.name,
        password_hash: new_user.password_hash,
        profile_picture: new_user.profile_picture,
        gender: new_user.gender,
        created_at: now,
        updated_at: now,
    })
}

/// Get the user with the given username, if one exists.
///
/// # Errors
///
/// Returns:
/// - [Error::NotFound] if there is no user with that username.
/// - [Error::SqlError] if there is an unexpected SQL error.
pub fn get_user_by_username(username: &str, connection: &Connection) -> Result<User, Error> {
    let user = connection.query_row(
        "SELECT id, username, name, password_hash, profile_picture, gender, created_at, updated_at
        FROM user
        WHERE username = ?1",
        (username,),
        map_user_row,
    )?;

    Ok(user)
}

/// Get the user with the given ID, if one exists.
///
/// # Errors
///
/// Returns:
/// - [Error::NotFound] if there is no user with that ID.
/// - [Error::SqlError] if there is an unexpected SQL error.
pub fn get_user_by_id(id: UserID, connection: &Connection) -> Result<User, Error> {
    let user = connection.query_row(
        "SELECT id, username, name, password_hash, profile_picture, gender, created_at, updated_at
        FROM user
        WHERE id = ?1",
        (id.as_i64(),),
        map_user_row,
    )?;

    Ok(user)
}

fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    Ok(User {
        id: UserID::new(row.get(0)?),
        username: Username::new_unchecked(&row.get::<usize, String>(1)?),
        name: row.get(2)?,
        password_hash: PasswordHash::new_unchecked(&row.get::<usize, String>(3)?),
        profile_picture: row.get(4)?,
        gender: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}



#[cfg(test)]
mod user_sql_tests {
    use rusqlite::Connection;

    use crate::{
        Error,
        password::PasswordHash,
        user::{
            Gender, NewUser, UserID, Username, create_user, create_user_table, get_user_by_id,
            get_user_by_username,
        },
    };

    fn get_test_connection() -> Connection {
        let connection =
            Connection::open_in_memory().expect("Could not open in-memory database.");
        create_user_table(&connection).expect("Could not create user table.");

        connection
    }

    fn new_test_user(username: &str) -> NewUser {
        NewUser {
            username: Username::new_unchecked(username),
            name: "Test User".to_owned(),
            password_hash: PasswordHash::new_unchecked("hash"),
            profile_picture: format!("https://avatar.iran.liara.run/public/boy?username={username}"),
            gender: Gender::Male,
        }
    }

    #[test]
    fn create_user_returns_row_with_id() {
        let connection = get_test_connection();

        let user = create_user(new_test_user("alice99"), &connection).unwrap();

        assert_eq!(user.id, UserID::new(1));
        assert_eq!(user.username.as_str(), "alice99");
        assert_eq!(user.created_at, user.updated_at);
    }

    #[test]
    fn create_user_with_duplicate_username_fails() {
        let connection = get_test_connection();
        create_user(new_test_user("alice99"), &connection).unwrap();

        let result = create_user(new_test_user("alice99"), &connection);

        assert_eq!(result.unwrap_err(), Error::DuplicateUsername);
    }

    #[test]
    fn usernames_are_case_sensitive() {
        let connection = get_test_connection();
        create_user(new_test_user("alice99"), &connection).unwrap();

        let result = create_user(new_test_user("ALICE99"), &connection);

        assert!(result.is_ok(), "got {result:?}, want Ok");
    }

    #[test]
    fn get_user_by_username_returns_stored_user() {
        let connection = get_test_connection();
        let want = create_user(new_test_user("alice99"), &connection).unwrap();

        let got = get_user_by_username("alice99", &connection).unwrap();

        assert_eq!(got, want, "got {got:?}, want {want:?}");
    }

    #[test]
    fn get_user_by_unknown_username_is_not_found() {
        let connection = get_test_connection();

        let result = get_user_by_username("nobody", &connection);

        assert_eq!(result.unwrap_err(), Error::NotFound);
    }

    #[test]
    fn get_user_by_id_returns_stored_user() {
        let connection = get_test_connection();
        let want = create_user(new_test_user("alice99"), &connection).unwrap();

        let got = get_user_by_id(want.id, &connection).unwrap();

        assert_eq!(got, want, "got {got:?}, want {want:?}");
    }
}

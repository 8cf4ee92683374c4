//! Password validation and hashing.
//!
//! Raw passwords are checked against the account policy before they are ever
//! hashed, and only the bcrypt hash is stored.

use std::fmt::{Debug, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::Error;

/// The set of special characters allowed in passwords.
const ALLOWED_SPECIAL_CHARACTERS: &str = "@$!%*#?&";

/// A raw password that meets the password policy.
///
/// Passwords must be between 6 and 100 characters long, contain at least one
/// letter and one digit, and use only ASCII letters, digits, and the special
/// characters `@$!%*#?&`.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ValidatedPassword(String);

impl ValidatedPassword {
    /// Create a validated password from a raw password string.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidPassword] if the raw password does not meet the
    /// password policy.
    pub fn new(raw_password: &str) -> Result<Self, Error> {
        if raw_password.len() < 6 {
            return Err(Error::InvalidPassword(
                "password must be at least 6 characters long".to_owned(),
            ));
        }

        if raw_password.len() > 100 {
            return Err(Error::InvalidPassword(
                "password must be at most 100 characters long".to_owned(),
            ));
        }

        if !raw_password.chars().any(|c| c.is_ascii_alphabetic()) {
            return Err(Error::InvalidPassword(
                "password must contain at least one letter".to_owned(),
            ));
        }

        if !raw_password.chars().any(|c| c.is_ascii_digit()) {
            return Err(Error::InvalidPassword(
                "password must contain at least one number".to_owned(),
            ));
        }

        if raw_password
            .chars()
            .any(|c| !c.is_ascii_alphanumeric() && !ALLOWED_SPECIAL_CHARACTERS.contains(c))
        {
            return Err(Error::InvalidPassword(format!(
                "password may only contain letters, numbers, and the special characters {ALLOWED_SPECIAL_CHARACTERS}"
            )));
        }

        Ok(Self(raw_password.to_owned()))
    }

    /// Create a validated password without any validation.
    ///
    /// Intended for tests that need a known raw password.
    pub fn new_unchecked(raw_password: &str) -> Self {
        Self(raw_password.to_owned())
    }

    /// The raw password string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Do not print raw passwords, even in debug output.
impl Debug for ValidatedPassword {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ValidatedPassword(\"********\")")
    }
}

impl Display for ValidatedPassword {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "********")
    }
}

/// A bcrypt hash of a user's password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Hash a validated raw password with bcrypt.
    ///
    /// `cost` controls how expensive hashing is; use [bcrypt::DEFAULT_COST]
    /// outside of tests.
    ///
    /// # Errors
    ///
    /// Returns [Error::HashingError] if the hashing function fails.
    pub fn from_raw_password(password: &ValidatedPassword, cost: u32) -> Result<Self, Error> {
        let hash = bcrypt::hash(password.as_str(), cost)
            .map_err(|error| Error::HashingError(error.to_string()))?;

        Ok(Self(hash))
    }

    /// Create a password hash from a string that is already a bcrypt hash.
    ///
    /// Intended for loading hashes from the database and for tests.
    pub fn new_unchecked(hash: &str) -> Self {
        Self(hash.to_owned())
    }

    /// Check whether `raw_password` matches this hash.
    ///
    /// A malformed stored hash is treated as a mismatch rather than an error,
    /// so the caller sees the same credential failure either way.
    pub fn verify(&self, raw_password: &str) -> bool {
        match bcrypt::verify(raw_password, &self.0) {
            Ok(is_match) => is_match,
            Err(error) => {
                tracing::warn!("could not verify password against stored hash: {error}");
                false
            }
        }
    }

    /// The hash string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PasswordHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod validated_password_tests {
    use crate::{Error, password::ValidatedPassword};

    #[test]
    fn accepts_password_meeting_policy() {
        let result = ValidatedPassword::new("hunter2!");

        assert!(result.is_ok(), "got {result:?}, want Ok");
    }

    #[test]
    fn rejects_too_short_password() {
        let result = ValidatedPassword::new("ab1");

        assert!(
            matches!(result, Err(Error::InvalidPassword(_))),
            "got {result:?}, want Err(InvalidPassword)"
        );
    }

    #[test]
    fn rejects_too_long_password() {
        let raw = format!("a1{}", "x".repeat(99));

        let result = ValidatedPassword::new(&raw);

        assert!(
            matches!(result, Err(Error::InvalidPassword(_))),
            "got {result:?}, want Err(InvalidPassword)"
        );
    }

    #[test]
    fn rejects_password_without_digit() {
        let result = ValidatedPassword::new("abcdefgh");

        assert!(
            matches!(result, Err(Error::InvalidPassword(_))),
            "got {result:?}, want Err(InvalidPassword)"
        );
    }

    #[test]
    fn rejects_password_without_letter() {
        let result = ValidatedPassword::new("12345678");

        assert!(
            matches!(result, Err(Error::InvalidPassword(_))),
            "got {result:?}, want Err(InvalidPassword)"
        );
    }

    #[test]
    fn rejects_disallowed_characters() {
        let result = ValidatedPassword::new("abc 123");

        assert!(
            matches!(result, Err(Error::InvalidPassword(_))),
            "got {result:?}, want Err(InvalidPassword)"
        );
    }

    #[test]
    fn debug_and_display_hide_the_password() {
        let password = ValidatedPassword::new_unchecked("hunter2!");

        assert_eq!(format!("{password:?}"), "ValidatedPassword(\"********\")");
        assert_eq!(password.to_string(), "********");
    }
}

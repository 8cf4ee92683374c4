//! Defines functions for handling the session cookie.

use axum_extra::extract::{
    PrivateCookieJar,
    cookie::{Cookie, SameSite},
};
use time::{Duration, OffsetDateTime};

use crate::{Error, session::SessionToken};

pub(crate) const COOKIE_TOKEN: &str = "session_token";

/// Add the session cookie to the cookie jar, indicating that a user is logged in.
///
/// The cookie expires alongside the server-side session, so a stale cookie is
/// dropped by the browser around the same time the session row stops working.
///
/// Returns the cookie jar with the cookie added.
pub(crate) fn set_session_cookie(
    jar: PrivateCookieJar,
    token: &SessionToken,
    expires_at: OffsetDateTime,
) -> PrivateCookieJar {
    jar.add(
        Cookie::build((COOKIE_TOKEN, token.as_str().to_owned()))
            .expires(expires_at)
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true),
    )
}

/// Set the session cookie to an invalid value and set its max age to zero, which should delete the cookie on the client side.
pub(crate) fn invalidate_session_cookie(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.add(
        Cookie::build((COOKIE_TOKEN, "deleted"))
            .expires(OffsetDateTime::UNIX_EPOCH)
            .max_age(Duration::ZERO)
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true),
    )
}

/// Get the session token from the cookie jar.
///
/// # Errors
///
/// Returns [Error::Unauthorized] if the cookie is missing.
pub(crate) fn get_token_from_cookies(jar: &PrivateCookieJar) -> Result<SessionToken, Error> {
    jar.get(COOKIE_TOKEN)
        .map(|cookie| SessionToken::from_raw(cookie.value_trimmed()))
        .ok_or(Error::Unauthorized)
}

#[cfg(test)]
mod cookie_tests {
    use axum_extra::extract::{PrivateCookieJar, cookie::Key};
    use sha2::{Digest, Sha512};
    use time::{Duration, OffsetDateTime};

    use crate::{
        Error,
        auth::cookie::{
            COOKIE_TOKEN, get_token_from_cookies, invalidate_session_cookie, set_session_cookie,
        },
        session::SessionToken,
    };

    fn get_jar() -> PrivateCookieJar {
        let hash = Sha512::digest(b"foobar");
        let key = Key::from(&hash);

        PrivateCookieJar::new(key)
    }

    #[test]
    fn can_set_and_read_back_session_cookie() {
        let token = SessionToken::generate();
        let expires_at = OffsetDateTime::now_utc() + Duration::days(7);

        let jar = set_session_cookie(get_jar(), &token, expires_at);
        let got = get_token_from_cookies(&jar).unwrap();

        assert_eq!(got, token);

        let cookie = jar.get(COOKIE_TOKEN).unwrap();
        assert_eq!(cookie.expires_datetime(), Some(expires_at));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
    }

    #[test]
    fn missing_cookie_is_unauthorized() {
        let result = get_token_from_cookies(&get_jar());

        assert_eq!(result.unwrap_err(), Error::Unauthorized);
    }

    #[test]
    fn invalidate_session_cookie_expires_the_cookie() {
        let token = SessionToken::generate();
        let jar = set_session_cookie(get_jar(), &token, OffsetDateTime::now_utc());

        let jar = invalidate_session_cookie(jar);
        let cookie = jar.get(COOKIE_TOKEN).unwrap();

        assert_eq!(cookie.value(), "deleted");
        assert_eq!(cookie.expires_datetime(), Some(OffsetDateTime::UNIX_EPOCH));
        assert_eq!(cookie.max_age(), Some(Duration::ZERO));
    }
}

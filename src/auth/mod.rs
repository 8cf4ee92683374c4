pub(crate) mod cookie;
mod middleware;

pub(crate) use cookie::{get_token_from_cookies, invalidate_session_cookie, set_session_cookie};
pub use middleware::{AuthState, auth_guard};

#[cfg(test)]
pub(crate) use cookie::COOKIE_TOKEN;

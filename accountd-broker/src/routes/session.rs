//! Visitor session cookie
//!
//! The cookie carries only an opaque random token; everything else
//! lives server-side in the ephemeral store, keyed by that token.

use tower_cookies::cookie::SameSite;
use tower_cookies::{Cookie, Cookies};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "accountd_session";

/// The visitor's session token, if they have one
pub fn session_token(cookies: &Cookies) -> Option<String> {
    cookies.get(SESSION_COOKIE).map(|c| c.value().to_string())
}

/// The visitor's session token, minting and setting one if needed
pub fn ensure_session_token(cookies: &Cookies) -> String {
    if let Some(token) = session_token(cookies) {
        return token;
    }

    let token = Uuid::new_v4().simple().to_string();
    let mut cookie = Cookie::new(SESSION_COOKIE, token.clone());
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookies.add(cookie);
    token
}

//! Credential persistence: bearer token, cookie jar and the binary file
//! that keeps both across restarts.

mod cookies;
mod store;
mod token;

pub use cookies::{Cookie, CookieJar, CookieKey, parse_set_cookie};
pub use store::{CredentialRecord, CredentialStore};
pub use token::{MAX_TOKEN_LEN, Token};

#[cfg(test)]
pub(crate) use token::token_with_expiry;

//! Login material for one platform account
//!
//! A `Credentials` value is immutable after construction and owned
//! exclusively by the session manager. Two strategies are supported:
//! a raw browser cookie string and an email/password pair.

use std::collections::HashMap;
use std::fmt;

/// Login material for one account
#[derive(Clone)]
pub enum Credentials {
    /// Raw cookie string captured from an authenticated browser session
    Cookie {
        /// Cookie header value, `"name=value; name2=value2"` form
        cookies: String,
        /// Account (shop) identifier the bot operates as
        account: String,
    },

    /// Business login with email and password
    Password {
        email: String,
        secret: String,
        /// Account (shop) identifier the bot operates as
        account: String,
    },
}

impl Credentials {
    /// The account identifier this credential belongs to.
    pub fn account(&self) -> &str {
        match self {
            Self::Cookie { account, .. } => account,
            Self::Password { account, .. } => account,
        }
    }

    /// Parse a `"name=value; name2=value2"` cookie string into a map.
    ///
    /// Pairs without a `=` are skipped; values may themselves contain `=`.
    pub fn parse_cookie_str(cookie_str: &str) -> HashMap<String, String> {
        let mut cookies = HashMap::new();
        for item in cookie_str.split("; ") {
            if let Some((key, value)) = item.split_once('=') {
                cookies.insert(key.to_string(), value.to_string());
            }
        }
        cookies
    }
}

// Secrets must not leak into logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cookie { account, .. } => f
                .debug_struct("Credentials::Cookie")
                .field("account", account)
                .field("cookies", &"<redacted>")
                .finish(),
            Self::Password { email, account, .. } => f
                .debug_struct("Credentials::Password")
                .field("account", account)
                .field("email", email)
                .field("secret", &"<redacted>")
                .finish(),
        }
    }
}

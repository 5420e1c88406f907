//! Request input shapes and their basic checks.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Maximum accepted length for names, titles and emails.
pub const MAX_TEXT_LEN: usize = 512;

/// Maximum accepted length for a bookmark URL.
pub const MAX_URL_LEN: usize = 2048;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}$")
        .expect("email pattern is a valid regex")
});

/// Returns true if `s` has the shape of an email address.
pub fn is_valid_email(s: &str) -> bool {
    EMAIL_RE.is_match(s)
}

/// Input for account creation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
}

impl NewAccount {
    /// Trim and check the fields.
    pub fn validate(self) -> crate::Result<Self> {
        let name = require_text("name", &self.name, MAX_TEXT_LEN)?;
        let email = require_text("email", &self.email, MAX_TEXT_LEN)?;
        if !is_valid_email(&email) {
            return Err(crate::Error::InvalidEmail(email));
        }
        Ok(Self { name, email })
    }
}

/// Input for bookmark creation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewBookmark {
    pub title: String,
    pub url: String,
}

impl NewBookmark {
    /// Trim and check the fields.
    pub fn validate(self) -> crate::Result<Self> {
        let title = require_text("title", &self.title, MAX_TEXT_LEN)?;
        let url = require_text("url", &self.url, MAX_URL_LEN)?;
        Ok(Self { title, url })
    }
}

fn require_text(field: &str, value: &str, max_len: usize) -> crate::Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(crate::Error::InvalidInput(format!("{field} must not be empty")));
    }
    if value.chars().count() > max_len {
        return Err(crate::Error::InvalidInput(format!(
            "{field} exceeds {max_len} characters"
        )));
    }
    Ok(value.to_string())
}

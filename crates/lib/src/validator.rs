//! # Query Safety Validator
//!
//! A conservative textual filter applied to every SQL string before it reaches
//! the remote database. It does not parse SQL: a statement must start with
//! `SELECT` and must not contain any denylisted keyword as a whole word, even
//! inside a string literal or a comment. Rejecting a harmless query such as
//! `SELECT * FROM t WHERE name = 'update'` is accepted behavior.
//!
//! [`validate`] is the only way to obtain a [`SafeSql`], and the database
//! execution capability only accepts a `SafeSql`.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Statement keywords that must not appear anywhere in an executable query.
pub const FORBIDDEN_KEYWORDS: &[&str] = &[
    "DROP", "DELETE", "INSERT", "UPDATE", "ALTER", "CREATE", "TRUNCATE", "GRANT", "REVOKE",
    "EXEC", "EXECUTE",
];

static FORBIDDEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = FORBIDDEN_KEYWORDS.join("|");
    Regex::new(&format!(r"(?i)\b({alternation})\b")).expect("forbidden keyword pattern is valid")
});

static LEADING_SELECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^SELECT\b").expect("leading select pattern is valid"));

/// Why a statement was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsafeReason {
    Empty,
    NotSelect,
    ForbiddenKeyword(String),
}

impl fmt::Display for UnsafeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "the statement is empty"),
            Self::NotSelect => write!(f, "only SELECT statements may be executed"),
            Self::ForbiddenKeyword(keyword) => {
                write!(f, "the statement contains the forbidden keyword {keyword}")
            }
        }
    }
}

/// A SQL string that has passed [`validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeSql(String);

impl SafeSql {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for SafeSql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Checks `sql` and wraps the trimmed statement in a [`SafeSql`].
pub fn validate(sql: &str) -> Result<SafeSql, UnsafeReason> {
    let trimmed = sql.trim();
    if trimmed.is_empty() {
        return Err(UnsafeReason::Empty);
    }
    if !LEADING_SELECT.is_match(trimmed) {
        return Err(UnsafeReason::NotSelect);
    }
    if let Some(keyword) = forbidden_keyword(trimmed) {
        return Err(UnsafeReason::ForbiddenKeyword(keyword));
    }
    Ok(SafeSql(trimmed.to_string()))
}

/// Returns the first denylisted keyword in `text`, uppercased.
pub fn forbidden_keyword(text: &str) -> Option<String> {
    FORBIDDEN_PATTERN
        .find(text)
        .map(|found| found.as_str().to_ascii_uppercase())
}

/// Returns true only if `sql` may be executed against the remote database.
pub fn is_safe(sql: &str) -> bool {
    validate(sql).is_ok()
}

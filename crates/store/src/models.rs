//! Stored records and parameter types.

use chrono::{DateTime, Utc};

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub user_id: String,
    pub username: String,
    /// Argon2 PHC string.
    pub password: String,
    pub nickname: String,
    pub email: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A blog post owned by a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub post_id: String,
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One row of the casbin-style policy table.
///
/// `ptype` is `p` for rules (`v0..v3` = subject, object, action, effect)
/// and `g` for role bindings (`v0` = principal, `v1` = role).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PolicyRow {
    pub ptype: String,
    pub v0: String,
    pub v1: String,
    pub v2: String,
    pub v3: String,
}

impl PolicyRow {
    /// A `p` row.
    pub fn rule(subject: &str, object: &str, action: &str, effect: &str) -> Self {
        Self {
            ptype: "p".into(),
            v0: subject.into(),
            v1: object.into(),
            v2: action.into(),
            v3: effect.into(),
        }
    }

    /// A `g` row binding `principal` to `role`.
    pub fn binding(principal: &str, role: &str) -> Self {
        Self {
            ptype: "g".into(),
            v0: principal.into(),
            v1: role.into(),
            v2: String::new(),
            v3: String::new(),
        }
    }
}

/// Parameters for user creation.
#[derive(Debug, Clone, Copy)]
pub struct CreateUserParams<'a> {
    pub username: &'a str,
    pub password_hash: &'a str,
    pub nickname: &'a str,
    pub email: &'a str,
    pub phone: &'a str,
}

/// Partial user update; `None` leaves the column unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateUserParams<'a> {
    pub username: Option<&'a str>,
    pub password_hash: Option<&'a str>,
    pub nickname: Option<&'a str>,
    pub email: Option<&'a str>,
    pub phone: Option<&'a str>,
}

/// Partial post update; `None` leaves the column unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdatePostParams<'a> {
    pub title: Option<&'a str>,
    pub content: Option<&'a str>,
}

/// Paging window for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Page {
    /// Build a page from wire values, clamping negatives to zero.
    #[must_use]
    pub fn new(offset: i64, limit: i64) -> Self {
        Self {
            offset: usize::try_from(offset).unwrap_or(0),
            limit: usize::try_from(limit).unwrap_or(0),
        }
    }
}

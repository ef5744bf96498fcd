//! Field-rule validation.
//!
//! Rules are plain functions keyed by field name. A message exposes its
//! named values through [`Fields`]; a [`Rules`] table can then check every
//! declared field ([`Rules::validate_all_fields`]) or an explicit subset
//! ([`Rules::validate_selected_fields`]), the latter for partial updates
//! where only some fields are populated.
//!
//! Fields that are absent (unset optionals) are skipped in both modes.

use std::collections::HashMap;

use crate::AppResult;

/// A borrowed field value handed to a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Str(&'a str),
    Int(i64),
    List(&'a [String]),
}

impl<'a> FieldValue<'a> {
    /// The string content, or `""` for non-string values.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'a str {
        match self {
            Self::Str(s) => *s,
            _ => "",
        }
    }

    /// The integer content, or `0` for non-integer values.
    #[inline]
    #[must_use]
    pub const fn as_int(&self) -> i64 {
        match self {
            Self::Int(i) => *i,
            _ => 0,
        }
    }
}

/// Named field access for validation.
pub trait Fields {
    /// Every field name the message declares, in declaration order.
    fn field_names(&self) -> &'static [&'static str];

    /// The value of `name`, or `None` if the field is unset or unknown.
    fn field(&self, name: &str) -> Option<FieldValue<'_>>;
}

/// A single field rule.
pub type Rule = fn(FieldValue<'_>) -> AppResult<()>;

/// Validation rules keyed by field name.
#[derive(Clone, Default)]
pub struct Rules {
    rules: HashMap<&'static str, Rule>,
}

impl std::fmt::Debug for Rules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.rules.keys()).finish()
    }
}

impl Rules {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `rule` for `field`, replacing any previous rule.
    #[must_use]
    pub fn with(mut self, field: &'static str, rule: Rule) -> Self {
        self.rules.insert(field, rule);
        self
    }

    /// Merge `other` into `self`; rules in `other` win on conflict.
    #[must_use]
    pub fn merge(mut self, other: &Self) -> Self {
        self.rules.extend(other.rules.iter().map(|(k, v)| (*k, *v)));
        self
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.rules.contains_key(field)
    }

    /// Apply every rule whose field the message declares and populates.
    ///
    /// # Errors
    /// Returns the first rule failure, in field declaration order.
    pub fn validate_all_fields<T: Fields + ?Sized>(&self, message: &T) -> AppResult<()> {
        self.validate_selected_fields(message, message.field_names())
    }

    /// Apply the rules of the named fields only.
    ///
    /// # Errors
    /// Returns the first rule failure, in the order of `names`.
    pub fn validate_selected_fields<T: Fields + ?Sized>(
        &self,
        message: &T,
        names: &[&str],
    ) -> AppResult<()> {
        for name in names {
            let (Some(rule), Some(value)) = (self.rules.get(name), message.field(name)) else {
                continue;
            };
            rule(value)?;
        }
        Ok(())
    }
}

/// Domain-level rule functions shared by the request validators.
pub mod domain {
    use std::sync::LazyLock;

    use regex::Regex;

    use super::FieldValue;
    use crate::{AppError, AppResult};

    /// Minimum password length.
    pub const MIN_PASSWORD_LENGTH: usize = 6;
    /// Nicknames must be shorter than this many characters.
    pub const MAX_NICKNAME_LENGTH: usize = 30;

    static USERNAME_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{3,20}$").expect("valid username regex"));
    static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").expect("valid email regex")
    });
    static PHONE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^1[3-9]\d{9}$").expect("valid phone regex"));

    /// Username: 3-20 letters, digits or underscores.
    pub fn username(value: FieldValue<'_>) -> AppResult<()> {
        if USERNAME_RE.is_match(value.as_str()) {
            Ok(())
        } else {
            Err(AppError::field("username", "Invalid username: Username must consist of letters, digits, and underscores only, and its length must be between 3 and 20 characters"))
        }
    }

    /// Password: at least six characters with a letter and a digit.
    pub fn password(value: FieldValue<'_>) -> AppResult<()> {
        check_password("password", value.as_str())
    }

    pub fn old_password(value: FieldValue<'_>) -> AppResult<()> {
        check_password("old_password", value.as_str())
    }

    pub fn new_password(value: FieldValue<'_>) -> AppResult<()> {
        check_password("new_password", value.as_str())
    }

    fn check_password(field: &str, password: &str) -> AppResult<()> {
        if password.is_empty() {
            return Err(AppError::field(field, "password cannot be empty"));
        }
        if password.len() < MIN_PASSWORD_LENGTH {
            return Err(AppError::field(
                field,
                format!("password must be at least {MIN_PASSWORD_LENGTH} characters long"),
            ));
        }

        let has_letter = password.bytes().any(|b| b.is_ascii_alphabetic());
        let has_digit = password.bytes().any(|b| b.is_ascii_digit());
        if !has_letter || !has_digit {
            return Err(AppError::field(
                field,
                "password must contain both letters and numbers",
            ));
        }

        Ok(())
    }

    pub fn nickname(value: FieldValue<'_>) -> AppResult<()> {
        if value.as_str().chars().count() >= MAX_NICKNAME_LENGTH {
            return Err(AppError::field(
                "nickname",
                format!("nickname must be less than {MAX_NICKNAME_LENGTH} characters"),
            ));
        }
        Ok(())
    }

    pub fn email(value: FieldValue<'_>) -> AppResult<()> {
        let email = value.as_str();
        if email.is_empty() {
            return Err(AppError::field("email", "email cannot be empty"));
        }
        if !EMAIL_RE.is_match(email) {
            return Err(AppError::field("email", "invalid email format"));
        }
        Ok(())
    }

    pub fn phone(value: FieldValue<'_>) -> AppResult<()> {
        let phone = value.as_str();
        if phone.is_empty() {
            return Err(AppError::field("phone", "phone cannot be empty"));
        }
        if !PHONE_RE.is_match(phone) {
            return Err(AppError::field("phone", "invalid phone format"));
        }
        Ok(())
    }

    pub fn limit(value: FieldValue<'_>) -> AppResult<()> {
        if value.as_int() <= 0 {
            return Err(AppError::field("limit", "limit must be greater than 0"));
        }
        Ok(())
    }

    pub fn offset(value: FieldValue<'_>) -> AppResult<()> {
        if value.as_int() < 0 {
            return Err(AppError::field("offset", "offset must not be negative"));
        }
        Ok(())
    }

    pub fn user_id(value: FieldValue<'_>) -> AppResult<()> {
        non_empty("user_id", value)
    }

    pub fn post_id(value: FieldValue<'_>) -> AppResult<()> {
        non_empty("post_id", value)
    }

    pub fn title(value: FieldValue<'_>) -> AppResult<()> {
        non_empty("title", value)
    }

    pub fn content(value: FieldValue<'_>) -> AppResult<()> {
        non_empty("content", value)
    }

    fn non_empty(field: &str, value: FieldValue<'_>) -> AppResult<()> {
        if value.as_str().trim().is_empty() {
            return Err(AppError::field(field, format!("{field} cannot be empty")));
        }
        Ok(())
    }
}

//! Policy model: rules, role bindings and compiled snapshots.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use blog_store::PolicyRow;
use regex::Regex;

use super::{Decision, PolicyError};

/// Rule outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Allow,
    Deny,
}

impl FromStr for Effect {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "allow" => Ok(Self::Allow),
            "deny" => Ok(Self::Deny),
            other => Err(PolicyError::InvalidEffect(other.to_string())),
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        })
    }
}

/// `(subject, object pattern, action, effect)`.
///
/// `object` may contain `*` wildcards; an `action` of `*` matches any action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRule {
    pub subject: String,
    pub object: String,
    pub action: String,
    pub effect: Effect,
}

impl PolicyRule {
    pub fn new(subject: &str, object: &str, action: &str, effect: Effect) -> Self {
        Self {
            subject: subject.to_string(),
            object: object.to_string(),
            action: action.to_string(),
            effect,
        }
    }
}

/// Principal → role association.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleBinding {
    pub principal: String,
    pub role: String,
}

impl RoleBinding {
    pub fn new(principal: &str, role: &str) -> Self {
        Self {
            principal: principal.to_string(),
            role: role.to_string(),
        }
    }
}

/// Uncompiled policy as loaded from a source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicySet {
    pub rules: Vec<PolicyRule>,
    pub bindings: Vec<RoleBinding>,
}

impl PolicySet {
    #[must_use]
    pub fn rule(mut self, subject: &str, object: &str, action: &str, effect: Effect) -> Self {
        self.rules
            .push(PolicyRule::new(subject, object, action, effect));
        self
    }

    #[must_use]
    pub fn binding(mut self, principal: &str, role: &str) -> Self {
        self.bindings.push(RoleBinding::new(principal, role));
        self
    }

    /// Interpret casbin-style table rows.
    ///
    /// # Errors
    /// Returns the first row with an unknown `ptype`, a missing value or an
    /// unknown effect.
    pub fn from_rows(rows: &[PolicyRow]) -> Result<Self, PolicyError> {
        let mut set = Self::default();
        for (index, row) in rows.iter().enumerate() {
            let invalid = |reason: &str| PolicyError::InvalidRow {
                index,
                reason: reason.to_string(),
            };
            match row.ptype.as_str() {
                "p" => {
                    if row.v0.is_empty() || row.v1.is_empty() || row.v2.is_empty() {
                        return Err(invalid("rule needs subject, object and action"));
                    }
                    let effect = if row.v3.is_empty() {
                        Effect::Allow
                    } else {
                        row.v3.parse()?
                    };
                    set.rules
                        .push(PolicyRule::new(&row.v0, &row.v1, &row.v2, effect));
                }
                "g" => {
                    if row.v0.is_empty() || row.v1.is_empty() {
                        return Err(invalid("binding needs principal and role"));
                    }
                    set.bindings.push(RoleBinding::new(&row.v0, &row.v1));
                }
                other => return Err(invalid(&format!("unknown ptype {other:?}"))),
            }
        }
        Ok(set)
    }
}

/// Parse casbin-style CSV policy text into table rows.
///
/// Lines look like `p, role::user, /blog.v1.BlogService/*, CALL, allow`
/// or `g, user-000000, role::admin`. Blank lines and `#` comments are skipped.
///
/// # Errors
/// Returns `PolicyError::InvalidRow` with the 1-based line number.
pub fn parse_csv(text: &str) -> Result<Vec<PolicyRow>, PolicyError> {
    let mut rows = Vec::new();
    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let values: Vec<&str> = line.split(',').map(str::trim).collect();
        let invalid = |reason: &str| PolicyError::InvalidRow {
            index: number + 1,
            reason: reason.to_string(),
        };
        let value = |i: usize| values.get(i).copied().unwrap_or_default();

        let row = match values[0] {
            "p" if (4..=5).contains(&values.len()) => {
                PolicyRow::rule(value(1), value(2), value(3), value(4))
            }
            "g" if values.len() == 3 => PolicyRow::binding(value(1), value(2)),
            "p" | "g" => return Err(invalid("wrong number of values")),
            other => return Err(invalid(&format!("unknown ptype {other:?}"))),
        };
        rows.push(row);
    }
    Ok(rows)
}

/// Object pattern with `*` wildcards.
#[derive(Debug, Clone)]
enum ObjectPattern {
    Exact(String),
    Glob(Regex),
}

impl ObjectPattern {
    fn compile(pattern: &str) -> Result<Self, PolicyError> {
        if !pattern.contains('*') {
            return Ok(Self::Exact(pattern.to_string()));
        }

        let body = pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        Regex::new(&format!("^{body}$"))
            .map(Self::Glob)
            .map_err(|source| PolicyError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })
    }

    fn matches(&self, object: &str) -> bool {
        match self {
            Self::Exact(exact) => exact == object,
            Self::Glob(regex) => regex.is_match(object),
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    rule: PolicyRule,
    object: ObjectPattern,
}

impl CompiledRule {
    fn matches(&self, object: &str, action: &str) -> bool {
        (self.rule.action == "*" || self.rule.action == action) && self.object.matches(object)
    }
}

/// Immutable, compiled policy used to answer authorization queries.
#[derive(Debug, Clone, Default)]
pub struct PolicySnapshot {
    rules: Vec<CompiledRule>,
    roles: HashMap<String, Vec<String>>,
}

impl PolicySnapshot {
    /// Compile every object pattern of `set`.
    ///
    /// # Errors
    /// Returns `PolicyError::InvalidPattern` if a pattern does not compile.
    pub fn compile(set: PolicySet) -> Result<Self, PolicyError> {
        let rules = set
            .rules
            .into_iter()
            .map(|rule| {
                let object = ObjectPattern::compile(&rule.object)?;
                Ok(CompiledRule { rule, object })
            })
            .collect::<Result<Vec<_>, PolicyError>>()?;

        let mut roles: HashMap<String, Vec<String>> = HashMap::new();
        for binding in set.bindings {
            let entry = roles.entry(binding.principal).or_default();
            if !entry.contains(&binding.role) {
                entry.push(binding.role);
            }
        }

        Ok(Self { rules, roles })
    }

    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Roles bound to `principal`.
    #[must_use]
    pub fn roles_for(&self, principal: &str) -> &[String] {
        self.roles.get(principal).map_or(&[], Vec::as_slice)
    }

    /// Evaluate `(subject, object, action)`.
    ///
    /// Candidates are the subject and its roles. Any matching deny wins
    /// regardless of rule order; otherwise any matching allow grants;
    /// otherwise the request is denied.
    #[must_use]
    pub fn evaluate(&self, subject: &str, object: &str, action: &str) -> Decision {
        let roles = self.roles_for(subject);
        let is_candidate = |s: &str| s == subject || roles.iter().any(|r| r == s);

        let mut allowed_by = None;
        for compiled in &self.rules {
            if !is_candidate(&compiled.rule.subject) || !compiled.matches(object, action) {
                continue;
            }
            match compiled.rule.effect {
                Effect::Deny => return Decision::deny(Some(compiled.rule.clone())),
                Effect::Allow => {
                    allowed_by.get_or_insert_with(|| compiled.rule.clone());
                }
            }
        }

        match allowed_by {
            Some(rule) => Decision::allow(rule),
            None => Decision::deny(None),
        }
    }
}

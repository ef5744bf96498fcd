//! Methods exempt from authentication and authorization.

use std::collections::HashSet;

use phf::phf_set;

/// Methods that are always public.
/// Uses compile-time perfect hash function for O(1) lookup with zero runtime initialization.
static PUBLIC_METHODS: phf::Set<&'static str> = phf_set! {
    "/blog.v1.BlogService/Healthz",
    "/blog.v1.BlogService/CreateUser",
    "/blog.v1.BlogService/Login",
};

/// Exact-match set of full method names, fixed at startup.
#[derive(Debug, Clone, Default)]
pub struct Whitelist {
    extra: HashSet<String>,
}

impl Whitelist {
    /// The built-in public methods plus `extra`.
    pub fn new<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            extra: extra.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `method` bypasses authentication and authorization.
    ///
    /// Matching is exact: no prefixes, no globs.
    #[must_use]
    pub fn contains(&self, method: &str) -> bool {
        PUBLIC_METHODS.contains(method) || self.extra.contains(method)
    }
}

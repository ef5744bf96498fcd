//! Resource identifiers of the form `user-xxxxxx`.

use std::sync::atomic::{AtomicU64, Ordering};

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz1234567890";
const CODE_LEN: usize = 6;

/// Kinds of resources with generated identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    User,
    Post,
}

impl ResourceKind {
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Post => "post",
        }
    }
}

/// Monotonic identifier generator for one resource kind.
#[derive(Debug)]
pub struct IdGenerator {
    kind: ResourceKind,
    next: AtomicU64,
}

impl IdGenerator {
    #[must_use]
    pub const fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            next: AtomicU64::new(1),
        }
    }

    /// Next identifier, e.g. `post-baaaaa`.
    pub fn next_id(&self) -> String {
        let seq = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.kind.prefix(), encode(seq))
    }
}

fn encode(mut seq: u64) -> String {
    let base = ALPHABET.len() as u64;
    let mut code = [ALPHABET[0]; CODE_LEN];
    for slot in &mut code {
        *slot = ALPHABET[(seq % base) as usize];
        seq /= base;
    }
    code.iter().map(|&b| char::from(b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_carry_kind_prefix_and_fixed_width_code() {
        let users = IdGenerator::new(ResourceKind::User);
        let id = users.next_id();
        assert!(id.starts_with("user-"));
        assert_eq!(id.len(), "user-".len() + CODE_LEN);
    }

    #[test]
    fn ids_are_unique() {
        let posts = IdGenerator::new(ResourceKind::Post);
        let ids: std::collections::HashSet<_> = (0..500).map(|_| posts.next_id()).collect();
        assert_eq!(ids.len(), 500);
    }
}

//! Where policy comes from.

use std::future::Future;
use std::path::Path;

use blog_store::{PolicyRepository, PolicyRow};
use tracing::debug;

use super::{parse_csv, PolicyError, PolicySet};

/// Loads the full policy set.
///
/// Implementations must return the complete set each time; the reloading
/// engine replaces its snapshot wholesale.
pub trait PolicySource: Send + Sync + 'static {
    fn load(&self) -> impl Future<Output = Result<PolicySet, PolicyError>> + Send;
}

/// Policy backed by the policy table in the store.
#[derive(Debug, Clone)]
pub struct StorePolicySource {
    repo: PolicyRepository,
}

impl StorePolicySource {
    #[must_use]
    pub const fn new(repo: PolicyRepository) -> Self {
        Self { repo }
    }
}

impl PolicySource for StorePolicySource {
    async fn load(&self) -> Result<PolicySet, PolicyError> {
        let rows = self
            .repo
            .list_rows()
            .await
            .map_err(|e| PolicyError::Source(e.to_string()))?;
        PolicySet::from_rows(&rows)
    }
}

/// Fixed, in-memory policy.
#[derive(Debug, Clone, Default)]
pub struct StaticPolicySource {
    set: PolicySet,
}

impl StaticPolicySource {
    #[must_use]
    pub const fn new(set: PolicySet) -> Self {
        Self { set }
    }
}

impl PolicySource for StaticPolicySource {
    async fn load(&self) -> Result<PolicySet, PolicyError> {
        Ok(self.set.clone())
    }
}

/// Read casbin-style CSV policy rows from `path`.
///
/// # Errors
/// Returns `PolicyError::Io` if the file cannot be read, or
/// `PolicyError::InvalidRow` for a malformed line.
pub async fn load_policy_file(path: impl AsRef<Path>) -> Result<Vec<PolicyRow>, PolicyError> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path).await?;
    let rows = parse_csv(&text)?;
    debug!(path = %path.display(), rows = rows.len(), "Policy file loaded");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_source_reads_current_rows() {
        let repo = PolicyRepository::new();
        let source = StorePolicySource::new(repo.clone());
        assert!(source.load().await.unwrap().rules.is_empty());

        repo.add_rows([
            PolicyRow::rule("role::admin", "*", "*", "allow"),
            PolicyRow::binding("user-000000", "role::admin"),
        ])
        .await
        .unwrap();

        let set = source.load().await.unwrap();
        assert_eq!(set.rules.len(), 1);
        assert_eq!(set.bindings.len(), 1);
    }

    #[tokio::test]
    async fn store_source_rejects_bad_rows() {
        let repo = PolicyRepository::new();
        repo.add_rows([PolicyRow::rule("a", "b", "c", "perhaps")])
            .await
            .unwrap();
        assert!(StorePolicySource::new(repo).load().await.is_err());
    }

    #[tokio::test]
    async fn missing_policy_file_is_io_error() {
        let err = load_policy_file("/nonexistent/policy.csv").await.unwrap_err();
        assert!(matches!(err, PolicyError::Io(_)));
    }

    #[tokio::test]
    async fn policy_file_is_parsed() {
        let path = std::env::temp_dir().join(format!("blog-policy-{}.csv", std::process::id()));
        tokio::fs::write(&path, "p, role::admin, *, *, allow\ng, user-000000, role::admin\n")
            .await
            .unwrap();

        let rows = load_policy_file(&path).await.unwrap();
        let _ = tokio::fs::remove_file(&path).await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], PolicyRow::binding("user-000000", "role::admin"));
    }
}

//! Policy row repository backing the authorization engine.

use std::sync::Arc;

use blog_core::AppResult;
use tokio::sync::RwLock;

use crate::PolicyRow;

/// In-memory casbin-style policy table.
#[derive(Debug, Clone, Default)]
pub struct PolicyRepository {
    rows: Arc<RwLock<Vec<PolicyRow>>>,
}

impl PolicyRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every row.
    pub async fn list_rows(&self) -> AppResult<Vec<PolicyRow>> {
        Ok(self.rows.read().await.clone())
    }

    /// Append rows, skipping exact duplicates.
    pub async fn add_rows(&self, new_rows: impl IntoIterator<Item = PolicyRow>) -> AppResult<usize> {
        let mut rows = self.rows.write().await;
        let mut added = 0;
        for row in new_rows {
            if !rows.contains(&row) {
                rows.push(row);
                added += 1;
            }
        }
        Ok(added)
    }

    /// Remove every row whose first value is `subject`.
    pub async fn remove_subject(&self, subject: &str) -> AppResult<usize> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|r| r.v0 != subject);
        Ok(before - rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicates_are_ignored() {
        let repo = PolicyRepository::new();
        let added = repo
            .add_rows([
                PolicyRow::binding("user-a", "role::user"),
                PolicyRow::binding("user-a", "role::user"),
            ])
            .await
            .unwrap();
        assert_eq!(added, 1);
        assert_eq!(repo.list_rows().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn remove_subject_drops_bindings_and_rules() {
        let repo = PolicyRepository::new();
        repo.add_rows([
            PolicyRow::binding("user-a", "role::user"),
            PolicyRow::rule("user-a", "/blog.v1.BlogService/*", "CALL", "allow"),
            PolicyRow::binding("user-b", "role::user"),
        ])
        .await
        .unwrap();

        assert_eq!(repo.remove_subject("user-a").await.unwrap(), 2);
        assert_eq!(
            repo.list_rows().await.unwrap(),
            vec![PolicyRow::binding("user-b", "role::user")]
        );
    }
}

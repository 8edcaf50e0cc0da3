//! Best-effort removal of the account's stored media.
//!
//! Orphaned blobs are an acceptable residual (an out-of-band sweep can
//! collect them later); blocking account deletion on object-store
//! availability is not. Every listing or deletion error is therefore
//! counted and logged, never propagated.

use std::sync::Arc;

use futures::StreamExt;
use object_store::ObjectStore;
use uuid::Uuid;

use common::storage::account_prefixes;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReclaimReport {
    pub objects_removed: u64,
    pub failures: u64,
}

pub struct StorageReclaimer {
    object_store: Arc<dyn ObjectStore>,
}

impl StorageReclaimer {
    pub fn new(object_store: Arc<dyn ObjectStore>) -> Self {
        Self { object_store }
    }

    /// Sweeps both media prefixes belonging to the account.
    pub async fn reclaim(&self, account_id: Uuid) -> ReclaimReport {
        let mut report = ReclaimReport::default();

        for prefix in account_prefixes(account_id) {
            let mut paths = Vec::new();
            let mut listing = self.object_store.list(Some(&prefix));
            while let Some(entry) = listing.next().await {
                match entry {
                    Ok(meta) => paths.push(meta.location),
                    Err(e) => {
                        tracing::error!(prefix = %prefix, error = %e, "Could not list media under prefix");
                        report.failures += 1;
                        break;
                    }
                }
            }

            for path in paths {
                match self.object_store.delete(&path).await {
                    Ok(()) => {
                        tracing::debug!(path = %path, "Removed media object");
                        report.objects_removed += 1;
                    }
                    Err(e) => {
                        tracing::error!(path = %path, error = %e, "Could not remove media object");
                        report.failures += 1;
                    }
                }
            }
        }

        tracing::info!(
            account_id = %account_id,
            removed = report.objects_removed,
            failures = report.failures,
            "Storage reclamation finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::testing::FlakyObjectStore;
    use object_store::PutPayload;
    use object_store::memory::InMemory;
    use object_store::path::Path;

    async fn put(store: &dyn ObjectStore, path: &str) {
        store
            .put(&Path::from(path), PutPayload::from_static(b"bytes"))
            .await
            .unwrap();
    }

    async fn object_count(store: &dyn ObjectStore) -> usize {
        store.list(None).collect::<Vec<_>>().await.len()
    }

    #[tokio::test]
    async fn test_removes_only_this_accounts_objects() {
        let store = Arc::new(InMemory::new());
        let account_id = Uuid::new_v4();
        let other_id = Uuid::new_v4();
        put(store.as_ref(), &format!("avatars/{account_id}/avatar.png")).await;
        put(
            store.as_ref(),
            &format!("session-media/{account_id}/s1/cover.jpg"),
        )
        .await;
        put(store.as_ref(), &format!("avatars/{other_id}/avatar.png")).await;

        let report = StorageReclaimer::new(store.clone()).reclaim(account_id).await;

        assert_eq!(report.objects_removed, 2);
        assert_eq!(report.failures, 0);
        assert_eq!(object_count(store.as_ref()).await, 1);
    }

    #[tokio::test]
    async fn test_empty_prefixes_reclaim_nothing() {
        let store = Arc::new(InMemory::new());
        let report = StorageReclaimer::new(store).reclaim(Uuid::new_v4()).await;
        assert_eq!(report, ReclaimReport::default());
    }

    #[tokio::test]
    async fn test_list_failures_are_absorbed() {
        let store = Arc::new(FlakyObjectStore::new());
        store.fail_lists(true);

        let report = StorageReclaimer::new(store.clone()).reclaim(Uuid::new_v4()).await;

        // One failure per prefix, nothing removed, no panic and no error
        assert_eq!(report.objects_removed, 0);
        assert_eq!(report.failures, 2);
    }

    #[tokio::test]
    async fn test_delete_failures_are_absorbed_and_retryable() {
        let store = Arc::new(FlakyObjectStore::new());
        let account_id = Uuid::new_v4();
        put(store.as_ref(), &format!("avatars/{account_id}/a.png")).await;
        put(store.as_ref(), &format!("avatars/{account_id}/b.png")).await;

        store.fail_deletes(true);
        let reclaimer = StorageReclaimer::new(store.clone());
        let report = reclaimer.reclaim(account_id).await;
        assert_eq!(report.objects_removed, 0);
        assert_eq!(report.failures, 2);

        // The objects survived the failed pass and a later pass collects them
        store.fail_deletes(false);
        let report = reclaimer.reclaim(account_id).await;
        assert_eq!(report.objects_removed, 2);
        assert_eq!(report.failures, 0);
        assert_eq!(object_count(store.as_ref()).await, 0);
    }
}

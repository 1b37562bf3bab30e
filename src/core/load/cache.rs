//! Per-run id cache
//!
//! Maps `(resource type, natural key)` to the remote id the server holds for
//! it. Each key owns an async mutex: the first caller queries the server
//! while holding it, later callers wait and reuse the answer, so a key is
//! queried at most once per run. Ids returned by submissions are stored
//! directly.

use crate::adapters::fhir::{query_target_ids, FhirClient};
use crate::domain::{FhirError, NaturalKey, RemoteId, ResourceType, Result};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;

/// Cached answer for one key
#[derive(Debug, Clone, PartialEq, Eq)]
enum Resolution {
    Missing,
    Found(RemoteId),
    Ambiguous(Vec<RemoteId>),
}

type Slot = Arc<Mutex<Option<Resolution>>>;

/// Shared id cache for one ingest run
#[derive(Default)]
pub struct IdCache {
    slots: StdMutex<HashMap<(ResourceType, NaturalKey), Slot>>,
}

impl IdCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, resource_type: ResourceType, key: &NaturalKey) -> Slot {
        let mut slots = match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        slots
            .entry((resource_type, key.clone()))
            .or_default()
            .clone()
    }

    /// Resolves a key against the FHIR server, at most once per run
    pub async fn resolve(
        &self,
        client: &FhirClient,
        resource_type: ResourceType,
        key: &NaturalKey,
    ) -> Result<Option<RemoteId>> {
        self.resolve_with(resource_type, key, || {
            query_target_ids(client, resource_type, key)
        })
        .await
    }

    /// Resolves a key with the given query, at most once per run
    ///
    /// Transport failures are not cached; the next caller queries again.
    /// More than one match is cached and reported as
    /// [`FhirError::AmbiguousMatch`] to every caller.
    pub async fn resolve_with<F, Fut>(
        &self,
        resource_type: ResourceType,
        key: &NaturalKey,
        query: F,
    ) -> Result<Option<RemoteId>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<RemoteId>>>,
    {
        let slot = self.slot(resource_type, key);
        let mut state = slot.lock().await;

        if state.is_none() {
            let mut ids = query().await?;
            *state = Some(match ids.len() {
                0 => Resolution::Missing,
                1 => Resolution::Found(ids.remove(0)),
                _ => Resolution::Ambiguous(ids),
            });
        }

        match state.as_ref() {
            Some(Resolution::Found(id)) => Ok(Some(id.clone())),
            Some(Resolution::Ambiguous(ids)) => Err(FhirError::AmbiguousMatch {
                resource_type: resource_type.to_string(),
                key: key.to_string(),
                ids: ids.iter().map(|id| id.as_str().to_string()).collect(),
            }
            .into()),
            Some(Resolution::Missing) | None => Ok(None),
        }
    }

    /// Records the id a submission returned for a key
    pub async fn store(&self, resource_type: ResourceType, key: &NaturalKey, id: RemoteId) {
        let slot = self.slot(resource_type, key);
        *slot.lock().await = Some(Resolution::Found(id));
    }

    /// Number of keys seen so far
    pub fn len(&self) -> usize {
        match self.slots.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StrandError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn id(value: &str) -> RemoteId {
        RemoteId::new(value).unwrap()
    }

    #[tokio::test]
    async fn test_concurrent_resolution_queries_once() {
        let cache = Arc::new(IdCache::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let key = NaturalKey::identifier("PT_1");

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let calls = calls.clone();
                let key = key.clone();
                tokio::spawn(async move {
                    cache
                        .resolve_with(ResourceType::Patient, &key, || async {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            Ok(vec![id("42")])
                        })
                        .await
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), Some(id("42")));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_is_cached() {
        let cache = IdCache::new();
        let key = NaturalKey::identifier("PT_1");
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let resolved = cache
                .resolve_with(ResourceType::Patient, &key, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![])
                })
                .await
                .unwrap();
            assert!(resolved.is_none());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ambiguous_match_lists_ids() {
        let cache = IdCache::new();
        let key = NaturalKey::identifier("PT_1");

        let err = cache
            .resolve_with(ResourceType::Patient, &key, || async {
                Ok(vec![id("1"), id("2")])
            })
            .await
            .unwrap_err();

        match err {
            StrandError::Fhir(FhirError::AmbiguousMatch { ids, key, .. }) => {
                assert_eq!(ids, vec!["1".to_string(), "2".to_string()]);
                assert_eq!(key, "{identifier=PT_1}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_store_overrides_missing() {
        let cache = IdCache::new();
        let key = NaturalKey::identifier("PT_1");
        cache
            .resolve_with(ResourceType::Patient, &key, || async { Ok(vec![]) })
            .await
            .unwrap();

        cache.store(ResourceType::Patient, &key, id("7")).await;

        let calls = AtomicUsize::new(0);
        let resolved = cache
            .resolve_with(ResourceType::Patient, &key, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(vec![])
            })
            .await
            .unwrap();
        assert_eq!(resolved, Some(id("7")));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_query_is_not_cached() {
        let cache = IdCache::new();
        let key = NaturalKey::identifier("PT_1");

        let first = cache
            .resolve_with(ResourceType::Patient, &key, || async {
                Err(FhirError::ConnectionFailed("refused".to_string()).into())
            })
            .await;
        assert!(first.is_err());

        let second = cache
            .resolve_with(ResourceType::Patient, &key, || async { Ok(vec![id("3")]) })
            .await
            .unwrap();
        assert_eq!(second, Some(id("3")));
    }
}

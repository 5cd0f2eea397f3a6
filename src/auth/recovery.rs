//! Registry of data requests issued by protected screens, so the step-up overlay
//! can re-issue whatever failed (or never completed) while the session needed a
//! password re-proof.

use crate::api::{Code, ServiceError};
use std::{
    collections::BTreeMap,
    fmt,
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use ulid::Ulid;

type RequestFuture = Pin<Box<dyn Future<Output = Result<(), ServiceError>> + Send>>;
type Refetch = Arc<dyn Fn() -> RequestFuture + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestStatus {
    /// Registered, not completed yet.
    Pending,
    Failed(Code),
    Succeeded,
}

impl RequestStatus {
    #[must_use]
    pub fn is_outstanding(self) -> bool {
        !matches!(self, Self::Succeeded)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecoverySummary {
    pub retried: usize,
    pub recovered: usize,
    pub still_failing: usize,
}

struct Entry {
    label: String,
    status: RequestStatus,
    refetch: Refetch,
}

#[derive(Clone, Default)]
pub struct RequestRegistry {
    entries: Arc<Mutex<BTreeMap<Ulid, Entry>>>,
}

impl fmt::Debug for RequestRegistry {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.lock();
        formatter
            .debug_map()
            .entries(entries.iter().map(|(id, entry)| (id, (&entry.label, entry.status))))
            .finish()
    }
}

impl RequestRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<Ulid, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a re-issuable request as `Pending`.
    pub fn register<F, Fut>(&self, label: impl Into<String>, refetch: F) -> Ulid
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ServiceError>> + Send + 'static,
    {
        let id = Ulid::new();
        let label = label.into();
        debug!(%id, label = %label, "request registered");
        self.lock().insert(
            id,
            Entry {
                label,
                status: RequestStatus::Pending,
                refetch: Arc::new(move || Box::pin(refetch()) as RequestFuture),
            },
        );
        id
    }

    /// Runs a registered request once and records the outcome.
    ///
    /// # Errors
    /// The request's error, or `NotFound` for an unknown id.
    pub async fn fetch(&self, id: Ulid) -> Result<(), ServiceError> {
        let Some(refetch) = self.lock().get(&id).map(|entry| Arc::clone(&entry.refetch)) else {
            return Err(ServiceError::new(Code::NotFound, "request not registered"));
        };
        let result = refetch().await;
        self.mark(id, status_of(&result));
        result
    }

    pub fn mark(&self, id: Ulid, status: RequestStatus) {
        if let Some(entry) = self.lock().get_mut(&id) {
            entry.status = status;
        }
    }

    #[must_use]
    pub fn status(&self, id: Ulid) -> Option<RequestStatus> {
        self.lock().get(&id).map(|entry| entry.status)
    }

    /// Labels of every request still pending or failed.
    #[must_use]
    pub fn outstanding(&self) -> Vec<(Ulid, String)> {
        self.lock()
            .iter()
            .filter(|(_, entry)| entry.status.is_outstanding())
            .map(|(id, entry)| (*id, entry.label.clone()))
            .collect()
    }

    /// Drops a request whose screen went away.
    pub fn forget(&self, id: Ulid) {
        self.lock().remove(&id);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Re-issues every pending or failed request concurrently.
    pub async fn retry_outstanding(&self) -> RecoverySummary {
        let outstanding: Vec<(Ulid, Refetch)> = self
            .lock()
            .iter()
            .filter(|(_, entry)| entry.status.is_outstanding())
            .map(|(id, entry)| (*id, Arc::clone(&entry.refetch)))
            .collect();

        let mut summary = RecoverySummary {
            retried: outstanding.len(),
            ..RecoverySummary::default()
        };
        let mut set = JoinSet::new();
        for (id, refetch) in outstanding {
            set.spawn(async move { (id, refetch().await) });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((id, result)) => {
                    if result.is_ok() {
                        summary.recovered += 1;
                    } else {
                        summary.still_failing += 1;
                    }
                    self.mark(id, status_of(&result));
                }
                Err(err) => {
                    warn!("re-issued request aborted: {err}");
                    summary.still_failing += 1;
                }
            }
        }

        info!(
            retried = summary.retried,
            recovered = summary.recovered,
            still_failing = summary.still_failing,
            "re-issued outstanding requests"
        );
        summary
    }
}

fn status_of(result: &Result<(), ServiceError>) -> RequestStatus {
    match result {
        Ok(()) => RequestStatus::Succeeded,
        Err(err) => RequestStatus::Failed(err.code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// A request that fails with `Unauthenticated` until `healthy` is set.
    fn flaky(healthy: &Arc<AtomicBool>, calls: &Arc<AtomicUsize>) -> impl Fn() -> RequestFuture {
        let healthy = Arc::clone(healthy);
        let calls = Arc::clone(calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            let ok = healthy.load(Ordering::SeqCst);
            Box::pin(async move {
                if ok {
                    Ok(())
                } else {
                    Err(ServiceError::new(Code::Unauthenticated, "session expired"))
                }
            })
        }
    }

    #[tokio::test]
    async fn fetch_records_status() {
        let registry = RequestRegistry::new();
        let healthy = Arc::new(AtomicBool::new(false));
        let calls = Arc::new(AtomicUsize::new(0));
        let id = registry.register("patients", flaky(&healthy, &calls));
        assert_eq!(registry.status(id), Some(RequestStatus::Pending));

        assert!(registry.fetch(id).await.is_err());
        assert_eq!(
            registry.status(id),
            Some(RequestStatus::Failed(Code::Unauthenticated))
        );

        healthy.store(true, Ordering::SeqCst);
        registry.fetch(id).await.unwrap();
        assert_eq!(registry.status(id), Some(RequestStatus::Succeeded));
        assert!(registry.outstanding().is_empty());
    }

    #[tokio::test]
    async fn retry_outstanding_skips_succeeded() {
        let registry = RequestRegistry::new();
        let healthy = Arc::new(AtomicBool::new(true));
        let done_calls = Arc::new(AtomicUsize::new(0));
        let done = registry.register("companies", flaky(&healthy, &done_calls));
        registry.fetch(done).await.unwrap();

        let broken = Arc::new(AtomicBool::new(false));
        let failed_calls = Arc::new(AtomicUsize::new(0));
        let failed = registry.register("notes", flaky(&broken, &failed_calls));
        assert!(registry.fetch(failed).await.is_err());
        let never_ran = registry.register("nurses", flaky(&healthy, &Arc::new(AtomicUsize::new(0))));

        broken.store(true, Ordering::SeqCst);
        let summary = registry.retry_outstanding().await;
        assert_eq!(
            summary,
            RecoverySummary {
                retried: 2,
                recovered: 2,
                still_failing: 0
            }
        );
        assert_eq!(done_calls.load(Ordering::SeqCst), 1);
        assert_eq!(failed_calls.load(Ordering::SeqCst), 2);
        assert_eq!(registry.status(never_ran), Some(RequestStatus::Succeeded));
    }

    #[tokio::test]
    async fn still_failing_is_reported() {
        let registry = RequestRegistry::new();
        let broken = Arc::new(AtomicBool::new(false));
        let calls = Arc::new(AtomicUsize::new(0));
        let id = registry.register("billing", flaky(&broken, &calls));

        let summary = registry.retry_outstanding().await;
        assert_eq!(summary.still_failing, 1);
        assert_eq!(registry.outstanding(), vec![(id, "billing".to_string())]);
    }

    #[tokio::test]
    async fn unknown_and_forgotten_ids() {
        let registry = RequestRegistry::new();
        let err = registry.fetch(Ulid::new()).await.unwrap_err();
        assert_eq!(err.code, Code::NotFound);

        let id = registry.register("settings", || async { Ok(()) });
        assert_eq!(registry.len(), 1);
        registry.forget(id);
        assert!(registry.is_empty());
        assert_eq!(registry.status(id), None);

        registry.register("patients", || async { Ok(()) });
        registry.clear();
        assert!(registry.outstanding().is_empty());
    }
}

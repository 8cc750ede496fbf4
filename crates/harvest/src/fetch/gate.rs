//! Admission gate bounding simultaneous in-flight requests.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Counting gate shared by every fetch of a run.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

impl AdmissionGate {
    /// Create a gate admitting at most `limit` holders (at least one).
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    /// Wait for a slot. Returns `None` only if the gate has been closed.
    pub async fn acquire(&self) -> Option<AdmissionGuard> {
        let permit = self.semaphore.clone().acquire_owned().await.ok()?;
        Some(AdmissionGuard { _permit: permit })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

/// Holds a slot until dropped.
#[derive(Debug)]
pub struct AdmissionGuard {
    _permit: OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_guard_releases_on_drop() {
        let gate = AdmissionGate::new(2);
        let g1 = gate.acquire().await.unwrap();
        let _g2 = gate.acquire().await.unwrap();
        assert_eq!(gate.available(), 0);

        drop(g1);
        assert_eq!(gate.available(), 1);
    }

    #[tokio::test]
    async fn test_zero_limit_still_admits_one() {
        let gate = AdmissionGate::new(0);
        assert_eq!(gate.limit(), 1);
        let _g = gate.acquire().await.unwrap();
    }
}

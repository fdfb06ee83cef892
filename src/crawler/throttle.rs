//! Politeness throttle shared by every request of a run
//!
//! This module handles:
//! - Global concurrency limiting via a semaphore
//! - Per-host concurrency limiting via one semaphore per host
//! - A minimum delay between two requests to the same host

use crate::state::HostState;
use crate::url::host_key;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};
use url::Url;

/// Permission to send one request
///
/// Dropping it releases both the global and the per-host slot.
pub struct ThrottlePermit {
    _host: OwnedSemaphorePermit,
    _global: OwnedSemaphorePermit,
}

struct HostSlot {
    semaphore: Arc<Semaphore>,
    state: HostState,
}

/// Throttle coordinates:
/// - Global concurrency limits (max concurrent requests)
/// - Per-host concurrency limits (max concurrent requests per host)
/// - Per-host rate limits (minimum time between requests)
pub struct Throttle {
    global_semaphore: Arc<Semaphore>,
    per_host_limit: usize,
    min_delay: Duration,
    hosts: Mutex<HashMap<String, HostSlot>>,
}

impl Throttle {
    pub fn new(max_concurrent: usize, max_per_host: usize, min_delay: Duration) -> Self {
        Self {
            global_semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            per_host_limit: max_per_host.max(1),
            min_delay,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    /// Waits until a request to `url` is allowed
    ///
    /// The per-host slot is taken before the global one so a request queued
    /// behind a busy host never sits on a global slot.
    pub async fn acquire(&self, url: &Url) -> Result<ThrottlePermit, AcquireError> {
        let key = host_key(url).unwrap_or_default();

        let host_semaphore = self.with_host(&key, |slot| slot.semaphore.clone());
        let host_permit = host_semaphore.acquire_owned().await?;
        let global_permit = self.global_semaphore.clone().acquire_owned().await?;

        let wait = self.with_host(&key, |slot| {
            slot.state.reserve_slot(self.min_delay, Instant::now())
        });
        if !wait.is_zero() {
            tracing::trace!("Waiting {:?} before next request to {}", wait, key);
            tokio::time::sleep(wait).await;
        }

        Ok(ThrottlePermit {
            _host: host_permit,
            _global: global_permit,
        })
    }

    /// Number of requests sent to each host so far, sorted by host
    pub fn request_counts(&self) -> Vec<(String, u32)> {
        let hosts = match self.hosts.lock() {
            Ok(hosts) => hosts,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut counts: Vec<_> = hosts
            .iter()
            .map(|(host, slot)| (host.clone(), slot.state.request_count))
            .collect();
        counts.sort();
        counts
    }

    fn with_host<T>(&self, key: &str, f: impl FnOnce(&mut HostSlot) -> T) -> T {
        let mut hosts = match self.hosts.lock() {
            Ok(hosts) => hosts,
            Err(poisoned) => poisoned.into_inner(),
        };
        let slot = hosts.entry(key.to_string()).or_insert_with(|| HostSlot {
            semaphore: Arc::new(Semaphore::new(self.per_host_limit)),
            state: HostState::new(),
        });
        f(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_min_delay_between_same_host_requests() {
        let throttle = Throttle::new(8, 2, Duration::from_millis(60));
        let page = url("http://127.0.0.1:9000/publications");

        let start = Instant::now();
        drop(throttle.acquire(&page).await.unwrap());
        drop(throttle.acquire(&page).await.unwrap());

        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn test_different_hosts_do_not_wait() {
        let throttle = Throttle::new(8, 2, Duration::from_secs(5));

        let start = Instant::now();
        let _a = throttle.acquire(&url("http://a.example.org/")).await.unwrap();
        let _b = throttle.acquire(&url("http://b.example.org/")).await.unwrap();

        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_per_host_cap_blocks() {
        let throttle = Throttle::new(8, 1, Duration::ZERO);
        let page = url("http://a.example.org/x");

        let held = throttle.acquire(&page).await.unwrap();
        let blocked =
            tokio::time::timeout(Duration::from_millis(50), throttle.acquire(&page)).await;
        assert!(blocked.is_err());

        drop(held);
        let freed = tokio::time::timeout(Duration::from_millis(500), throttle.acquire(&page)).await;
        assert!(freed.is_ok());
    }

    #[tokio::test]
    async fn test_global_cap_blocks_other_hosts() {
        let throttle = Throttle::new(1, 1, Duration::ZERO);

        let _held = throttle.acquire(&url("http://a.example.org/")).await.unwrap();
        let blocked = tokio::time::timeout(
            Duration::from_millis(50),
            throttle.acquire(&url("http://b.example.org/")),
        )
        .await;
        assert!(blocked.is_err());
    }

    #[tokio::test]
    async fn test_request_counts() {
        let throttle = Throttle::new(8, 2, Duration::ZERO);
        for _ in 0..3 {
            drop(throttle.acquire(&url("http://a.example.org/")).await.unwrap());
        }
        drop(throttle.acquire(&url("http://b.example.org:8080/")).await.unwrap());

        assert_eq!(
            throttle.request_counts(),
            vec![
                ("a.example.org".to_string(), 3),
                ("b.example.org:8080".to_string(), 1)
            ]
        );
    }
}

//! Fixed-window rate governor
//!
//! Each client key owns a window `{start, count}` behind its own mutex, so one
//! client's counter is updated atomically while different clients never block
//! one another. Windows live in a bounded map that drops idle clients.

use moka::sync::Cache;
use parking_lot::Mutex;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Outcome of a gated request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub accepted: bool,
    /// Requests left in the current window
    pub remaining: u32,
}

#[derive(Debug)]
struct RateWindow {
    start: Instant,
    count: u32,
}

/// Per-client fixed-window counter
pub struct RateGovernor {
    capacity: u32,
    window: Duration,
    windows: Cache<String, Arc<Mutex<RateWindow>>>,
}

impl RateGovernor {
    /// `capacity` requests per `window` per client; at most `max_clients`
    /// windows are kept and a window idle for `idle` is dropped.
    pub fn new(capacity: u32, window: Duration, max_clients: u64, idle: Duration) -> Self {
        let windows = Cache::builder()
            .max_capacity(max_clients)
            .time_to_idle(idle.max(window))
            .build();

        Self {
            capacity,
            window,
            windows,
        }
    }

    /// Count one request for `key` and decide whether to admit it
    pub fn admit(&self, key: &str) -> Admission {
        let now = Instant::now();
        let window = self.windows.get_with_by_ref(key, || {
            Arc::new(Mutex::new(RateWindow {
                start: now,
                count: 0,
            }))
        });

        let mut window = window.lock();
        if now.saturating_duration_since(window.start) >= self.window {
            window.start = now;
            window.count = 0;
        }
        window.count = window.count.saturating_add(1);

        if window.count > self.capacity {
            Admission {
                accepted: false,
                remaining: 0,
            }
        } else {
            Admission {
                accepted: true,
                remaining: self.capacity - window.count,
            }
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Number of tracked clients (approximate)
    pub fn tracked_clients(&self) -> u64 {
        self.windows.run_pending_tasks();
        self.windows.entry_count()
    }
}

/// Resolve the client key: client id header, then first forwarded-for hop,
/// then the peer address.
pub fn resolve_client_key(
    client_id: Option<&str>,
    forwarded_for: Option<&str>,
    peer: Option<IpAddr>,
) -> String {
    if let Some(id) = client_id.map(str::trim).filter(|s| !s.is_empty()) {
        return format!("cid:{}", id);
    }
    if let Some(hop) = forwarded_for
        .and_then(|xff| xff.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        return format!("xff:{}", hop);
    }
    match peer {
        Some(ip) => format!("ip:{}", ip),
        None => "ip:unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn governor(capacity: u32, window_ms: u64) -> RateGovernor {
        RateGovernor::new(
            capacity,
            Duration::from_millis(window_ms),
            1000,
            Duration::from_secs(300),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_rejects_then_resets() {
        let governor = governor(2, 1000);

        assert_eq!(
            governor.admit("cid:a"),
            Admission {
                accepted: true,
                remaining: 1
            }
        );
        assert!(governor.admit("cid:a").accepted);
        assert_eq!(
            governor.admit("cid:a"),
            Admission {
                accepted: false,
                remaining: 0
            }
        );

        tokio::time::advance(Duration::from_millis(1000)).await;
        assert_eq!(
            governor.admit("cid:a"),
            Admission {
                accepted: true,
                remaining: 1
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_clients_are_independent() {
        let governor = governor(1, 1000);
        assert!(governor.admit("ip:10.0.0.1").accepted);
        assert!(!governor.admit("ip:10.0.0.1").accepted);
        assert!(governor.admit("ip:10.0.0.2").accepted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_does_not_slide() {
        let governor = governor(2, 1000);
        assert!(governor.admit("k").accepted);
        tokio::time::advance(Duration::from_millis(600)).await;
        assert!(governor.admit("k").accepted);
        tokio::time::advance(Duration::from_millis(300)).await;
        assert!(!governor.admit("k").accepted);
        // the window opened at the first request, not the last
        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(governor.admit("k").accepted);
    }

    #[tokio::test]
    async fn test_concurrent_admits_count_exactly() {
        let governor = Arc::new(governor(50, 60_000));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let governor = governor.clone();
                tokio::task::spawn_blocking(move || {
                    (0..10).filter(|_| governor.admit("shared").accepted).count()
                })
            })
            .collect();

        let mut admitted = 0;
        for handle in handles {
            admitted += handle.await.unwrap();
        }
        assert_eq!(admitted, 50);
    }

    #[test]
    fn test_tracked_clients_stay_bounded() {
        let governor = RateGovernor::new(5, Duration::from_secs(60), 16, Duration::from_secs(300));
        for i in 0..200 {
            assert!(governor.admit(&format!("ip:10.0.{}.{}", i / 256, i % 256)).accepted);
        }
        assert!(governor.tracked_clients() <= 16);
    }

    #[test]
    fn test_resolve_client_key() {
        let peer: IpAddr = "192.0.2.7".parse().unwrap();
        assert_eq!(
            resolve_client_key(Some("app-1"), Some("203.0.113.9"), Some(peer)),
            "cid:app-1"
        );
        assert_eq!(
            resolve_client_key(Some("  "), Some(" 203.0.113.9 , 10.0.0.1"), Some(peer)),
            "xff:203.0.113.9"
        );
        assert_eq!(resolve_client_key(None, None, Some(peer)), "ip:192.0.2.7");
        assert_eq!(resolve_client_key(None, None, None), "ip:unknown");
    }
}

//! Per-client fixed-window quota.
//!
//! Each client identity owns a window holding a counter and an expiry. Every
//! request increments the counter; the request is admitted while the counter
//! stays within the ceiling. Over-limit attempts still count. The counter resets
//! only once the window has expired, so bursts across a window edge are
//! possible.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::HeaderMap;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::RateLimitConfig;
use crate::observability::metrics;

/// Key under which quota is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientIdentity(IpAddr);

impl ClientIdentity {
    /// Derive the identity for a request.
    ///
    /// With `trust_proxy` the first parseable `X-Forwarded-For` entry wins;
    /// otherwise, or when the header is missing or garbage, the peer address is used.
    pub fn from_request(peer: SocketAddr, headers: &HeaderMap, trust_proxy: bool) -> Self {
        if trust_proxy {
            let forwarded = headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .and_then(|v| v.trim().parse::<IpAddr>().ok());
            if let Some(ip) = forwarded {
                return Self(ip);
            }
        }
        Self(peer.ip())
    }

    pub fn ip(&self) -> IpAddr {
        self.0
    }
}

impl From<IpAddr> for ClientIdentity {
    fn from(ip: IpAddr) -> Self {
        Self(ip)
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Outcome of a quota check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    Admitted { remaining: u32 },
    Denied { retry_after: Duration },
}

impl QuotaDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, QuotaDecision::Admitted { .. })
    }
}

#[derive(Debug, Clone, Copy)]
struct QuotaWindow {
    count: u32,
    expires_at: Instant,
}

/// Concurrent fixed-window counter keyed by client identity.
///
/// Each identity's window is updated under its map shard lock, so concurrent
/// requests from one client never lose increments while unrelated clients
/// mostly proceed in parallel.
#[derive(Debug)]
pub struct QuotaTracker {
    windows: DashMap<ClientIdentity, QuotaWindow>,
    points: u32,
    window: Duration,
}

impl QuotaTracker {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            windows: DashMap::new(),
            points: config.points,
            window: Duration::from_secs(config.window_secs),
        }
    }

    /// Consume one point for `identity` at the current instant.
    pub fn consume(&self, identity: ClientIdentity) -> QuotaDecision {
        self.consume_at(identity, Instant::now())
    }

    /// Consume one point for `identity` as of `now`.
    pub fn consume_at(&self, identity: ClientIdentity, now: Instant) -> QuotaDecision {
        let mut entry = self.windows.entry(identity).or_insert_with(|| QuotaWindow {
            count: 0,
            expires_at: now + self.window,
        });
        let window = entry.value_mut();

        if now >= window.expires_at {
            window.count = 0;
            window.expires_at = now + self.window;
        }

        window.count = window.count.saturating_add(1);

        if window.count <= self.points {
            QuotaDecision::Admitted {
                remaining: self.points - window.count,
            }
        } else {
            QuotaDecision::Denied {
                retry_after: window.expires_at.saturating_duration_since(now),
            }
        }
    }

    /// Drop windows that have expired as of `now`. Returns how many were removed.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, window| window.expires_at > now);
        let removed = before.saturating_sub(self.windows.len());
        metrics::record_quota_clients(self.windows.len());
        removed
    }

    /// Number of identities currently holding a window.
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    /// Periodically evict expired windows until shutdown.
    pub fn spawn_sweeper(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.window);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = self.sweep_at(Instant::now());
                        if removed > 0 {
                            tracing::debug!(
                                removed,
                                remaining = self.tracked_clients(),
                                "Evicted expired quota windows"
                            );
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::debug!("Quota sweeper received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        })
    }
}

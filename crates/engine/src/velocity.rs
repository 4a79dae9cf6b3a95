//! Rolling-window accounting of accepted votes.
//!
//! Each key holds the timestamps of votes that made it into the ledger. A
//! count always covers `(now - window, now]`, so a slot frees up exactly one
//! window after the vote that used it rather than at a wall-clock boundary.
//!
//! Writes happen only after a successful ledger append; the fraud guard reads
//! counts and never writes. To keep read-check-append-record from
//! over-admitting under concurrency, callers hold the key's gate for the
//! whole cycle.
//!
//! The window lives in this process's memory. Several API instances behind
//! one database each enforce their own ceiling, so a deployment that scales
//! out multiplies the effective limit by the instance count.
//!
//! # Memory
//!
//! `sweep` drops keys whose newest event has left the window. A key with any
//! event still inside the trailing interval is never dropped.

use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::config::VelocityScope;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VelocityKey {
    Ip(IpAddr),
    IpAndVoter(IpAddr, Uuid),
}

impl VelocityKey {
    pub fn for_scope(scope: VelocityScope, ip: IpAddr, voter_user_id: Uuid) -> Self {
        match scope {
            VelocityScope::Ip => Self::Ip(ip),
            VelocityScope::IpAndVoter => Self::IpAndVoter(ip, voter_user_id),
        }
    }
}

pub struct VelocityWindow {
    window: TimeDelta,
    events: DashMap<VelocityKey, VecDeque<DateTime<Utc>>>,
    gates: DashMap<VelocityKey, Arc<Mutex<()>>>,
}

impl VelocityWindow {
    pub fn new(window: TimeDelta) -> Self {
        Self {
            window,
            events: DashMap::new(),
            gates: DashMap::new(),
        }
    }

    /// Events recorded for `key` strictly after `now - window`.
    pub fn count_within(&self, key: &VelocityKey, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.window;
        self.events
            .get(key)
            .map(|events| events.iter().filter(|&&at| at > cutoff).count())
            .unwrap_or(0)
    }

    pub fn record(&self, key: VelocityKey, at: DateTime<Utc>) {
        let cutoff = at - self.window;
        let mut events = self.events.entry(key).or_default();
        events.retain(|&t| t > cutoff);
        events.push_back(at);
    }

    /// Serialize admission for one key. Hold the guard from the velocity
    /// check until the vote is recorded.
    pub async fn gate(&self, key: &VelocityKey) -> OwnedMutexGuard<()> {
        let gate = Arc::clone(self.gates.entry(key.clone()).or_default().value());
        gate.lock_owned().await
    }

    /// Drop keys with no event inside the window ending at `now`. Returns the
    /// number of keys removed.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.window;
        let before = self.events.len();

        self.events.retain(|_, events| {
            events.retain(|&t| t > cutoff);
            !events.is_empty()
        });
        // A gate referenced outside the map is held or awaited right now
        self.gates
            .retain(|key, gate| Arc::strong_count(gate) > 1 || self.events.contains_key(key));

        let removed = before.saturating_sub(self.events.len());
        if removed > 0 {
            tracing::debug!(removed, tracked = self.events.len(), "swept velocity window");
        }
        removed
    }

    pub fn tracked_keys(&self) -> usize {
        self.events.len()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap() + TimeDelta::seconds(secs)
    }

    fn ip_key() -> VelocityKey {
        VelocityKey::Ip("192.0.2.7".parse().unwrap())
    }

    #[test]
    fn test_window_rolls_instead_of_resetting() {
        let window = VelocityWindow::new(TimeDelta::seconds(60));
        for secs in 0..10 {
            window.record(ip_key(), t(secs * 6));
        }

        // Events at 0, 6, ..., 54
        assert_eq!(window.count_within(&ip_key(), t(59)), 10);
        // At 61 only the event at 0 has left the window
        assert_eq!(window.count_within(&ip_key(), t(61)), 9);
        assert_eq!(window.count_within(&ip_key(), t(200)), 0);
    }

    #[test]
    fn test_scope_separates_voters_behind_one_ip() {
        let ip = "198.51.100.1".parse().unwrap();
        let a = VelocityKey::for_scope(VelocityScope::IpAndVoter, ip, Uuid::new_v4());
        let b = VelocityKey::for_scope(VelocityScope::IpAndVoter, ip, Uuid::new_v4());
        let window = VelocityWindow::new(TimeDelta::seconds(60));

        window.record(a.clone(), t(0));

        assert_eq!(window.count_within(&a, t(1)), 1);
        assert_eq!(window.count_within(&b, t(1)), 0);
        assert_eq!(
            VelocityKey::for_scope(VelocityScope::Ip, ip, Uuid::new_v4()),
            VelocityKey::Ip(ip)
        );
    }

    #[test]
    fn test_sweep_keeps_keys_still_inside_window() {
        let window = VelocityWindow::new(TimeDelta::seconds(60));
        let stale = VelocityKey::Ip("203.0.113.1".parse().unwrap());
        window.record(stale.clone(), t(0));
        window.record(ip_key(), t(30));

        let removed = window.sweep(t(70));

        assert_eq!(removed, 1);
        assert_eq!(window.tracked_keys(), 1);
        assert_eq!(window.count_within(&ip_key(), t(70)), 1);
        assert_eq!(window.count_within(&stale, t(70)), 0);
    }

    #[tokio::test]
    async fn test_gate_is_exclusive_per_key() {
        let window = VelocityWindow::new(TimeDelta::seconds(60));
        let other = VelocityKey::Ip("203.0.113.9".parse().unwrap());

        let guard = window.gate(&ip_key()).await;
        // A different key is not blocked
        let _other = window.gate(&other).await;

        let gate = Arc::clone(window.gates.get(&ip_key()).unwrap().value());
        assert!(gate.try_lock().is_err());
        drop(guard);
        assert!(gate.try_lock().is_ok());
    }
}

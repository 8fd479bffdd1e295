// This file is part of the product ImmoShot.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};

const LIMITER_CHANNEL_DEPTH: usize = 64;

/// Expired windows are only swept once the map grows past this; the limiter
/// is advisory, per-process state, so an idle key lingering a while is fine.
const MAX_TRACKED_WINDOWS: usize = 4096;

/// Fixed-window request counter keyed by a caller-supplied string, typically
/// `"{action}_{principal}"`. A window admits `max_requests` calls, then
/// denies until it expires; the next call after expiry opens a fresh window.
/// Bursting up to ~2x the nominal rate across a window boundary is an
/// accepted property of the fixed-window scheme, not a bug.
///
/// State is in-memory only. A process restart clears every counter; the
/// limiter is a throttle and abuse deterrent, not an entitlement ledger.
#[derive(Clone)]
pub struct ActionRateLimiter {
    sender: mpsc::Sender<LimiterCommand>,
}

impl ActionRateLimiter {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel(LIMITER_CHANNEL_DEPTH);
        tokio::spawn(async move {
            let mut state = FixedWindowState::new();
            state.run(receiver).await;
        });
        Self { sender }
    }

    /// Returns whether the caller may proceed. Fails closed: if the limiter
    /// task is gone the request is denied.
    pub async fn allow(&self, key: &str, max_requests: u32, window: Duration) -> bool {
        let (reply, receive) = oneshot::channel();
        let command = LimiterCommand::Check {
            key: key.to_string(),
            max_requests,
            window,
            reply,
        };
        if self.sender.send(command).await.is_err() {
            return false;
        }
        receive.await.unwrap_or(false)
    }
}

impl Default for ActionRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

enum LimiterCommand {
    Check {
        key: String,
        max_requests: u32,
        window: Duration,
        reply: oneshot::Sender<bool>,
    },
}

struct RateWindow {
    window_start: Instant,
    count: u32,
}

struct FixedWindowState {
    windows: HashMap<String, RateWindow>,
}

impl FixedWindowState {
    fn new() -> Self {
        Self {
            windows: HashMap::new(),
        }
    }

    async fn run(&mut self, mut receiver: mpsc::Receiver<LimiterCommand>) {
        while let Some(command) = receiver.recv().await {
            match command {
                LimiterCommand::Check {
                    key,
                    max_requests,
                    window,
                    reply,
                } => {
                    let allowed = self.check(&key, max_requests, window, Instant::now());
                    let _ = reply.send(allowed);
                }
            }
        }
    }

    fn check(&mut self, key: &str, max_requests: u32, window: Duration, now: Instant) -> bool {
        if self.windows.len() > MAX_TRACKED_WINDOWS {
            self.prune(window, now);
        }

        let state = self
            .windows
            .entry(key.to_string())
            .or_insert(RateWindow {
                window_start: now,
                count: 0,
            });

        if now.duration_since(state.window_start) >= window {
            state.window_start = now;
            state.count = 0;
        }

        state.count = state.count.saturating_add(1);
        state.count <= max_requests
    }

    fn prune(&mut self, window: Duration, now: Instant) {
        self.windows
            .retain(|_, state| now.duration_since(state.window_start) < window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_exactly_max_requests_per_window() {
        let mut state = FixedWindowState::new();
        let now = Instant::now();
        let window = Duration::from_secs(60);

        for attempt in 1..=5 {
            assert!(
                state.check("upload_u1", 5, window, now),
                "attempt {} should pass",
                attempt
            );
        }
        assert!(!state.check("upload_u1", 5, window, now));
        assert!(!state.check("upload_u1", 5, window, now));
    }

    #[test]
    fn window_expiry_resets_the_counter() {
        let mut state = FixedWindowState::new();
        let start = Instant::now();
        let window = Duration::from_secs(60);

        for _ in 0..6 {
            state.check("login_ip1", 5, window, start);
        }
        assert!(!state.check("login_ip1", 5, window, start));

        let later = start + Duration::from_secs(61);
        assert!(state.check("login_ip1", 5, window, later));
    }

    #[test]
    fn keys_are_independent() {
        let mut state = FixedWindowState::new();
        let now = Instant::now();
        let window = Duration::from_secs(60);

        assert!(state.check("a", 1, window, now));
        assert!(!state.check("a", 1, window, now));
        assert!(state.check("b", 1, window, now));
    }

    #[test]
    fn boundary_burst_is_permitted() {
        // Documented fixed-window property: a full window right before the
        // boundary plus a full window right after passes 2x max_requests.
        let mut state = FixedWindowState::new();
        let start = Instant::now();
        let window = Duration::from_secs(60);

        let mut admitted = 0;
        for _ in 0..5 {
            if state.check("k", 5, window, start) {
                admitted += 1;
            }
        }
        for _ in 0..5 {
            if state.check("k", 5, window, start + Duration::from_secs(60)) {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 10);
    }

    #[test]
    fn prune_drops_only_expired_windows() {
        let mut state = FixedWindowState::new();
        let start = Instant::now();
        let window = Duration::from_secs(60);

        state.check("old", 5, window, start);
        state.check("fresh", 5, window, start + Duration::from_secs(59));
        state.prune(window, start + Duration::from_secs(61));

        assert!(!state.windows.contains_key("old"));
        assert!(state.windows.contains_key("fresh"));
    }

    #[actix_web::test]
    async fn limiter_handle_round_trip() {
        let limiter = ActionRateLimiter::new();
        let window = Duration::from_secs(60);

        for _ in 0..2 {
            assert!(limiter.allow("resend_u9", 2, window).await);
        }
        assert!(!limiter.allow("resend_u9", 2, window).await);
    }
}

// This file is part of the product ImmoShot.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::audit::{SecurityEventKind, SecurityEventLog, Severity};
use crate::config::AdminSessionConfig;
use async_trait::async_trait;
use log::{info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

const GUARD_CHANNEL_DEPTH: usize = 64;

/// Role lookup the guard consults before trusting a session with admin
/// standing. Authoritative: queried again on every extension instead of
/// cached at watch time.
#[async_trait]
pub trait RoleCheck: Send + Sync {
    async fn has_admin_role(&self, user_id: &str) -> bool;
}

/// Sign-out collaborator invoked on timeout. Must be idempotent; the guard
/// fires it exactly once per expiry but the session may already be gone.
#[async_trait]
pub trait SignOut: Send + Sync {
    async fn sign_out(&self, session_id: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardPhase {
    Active,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardTransition {
    WarningEntered,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardStatus {
    pub remaining_seconds: u64,
    pub warning_active: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub enum GuardError {
    NotWatched,
    NotAdmin,
}

impl GuardError {
    pub fn code(&self) -> &'static str {
        match self {
            GuardError::NotWatched => "session_not_watched",
            GuardError::NotAdmin => "admin_role_required",
        }
    }
}

/// Countdown for one watched session. Pure so the transition behavior can
/// be driven tick by tick in tests without a timer.
#[derive(Debug, Clone, Copy)]
pub struct CountdownState {
    remaining_seconds: u64,
    phase: GuardPhase,
}

impl CountdownState {
    pub fn new(timeout_seconds: u64) -> Self {
        Self {
            remaining_seconds: timeout_seconds,
            phase: GuardPhase::Active,
        }
    }

    pub fn status(&self) -> GuardStatus {
        GuardStatus {
            remaining_seconds: self.remaining_seconds,
            warning_active: self.phase == GuardPhase::Warning,
        }
    }

    /// Advances the countdown by one second.
    pub fn tick(&mut self, warning_threshold_seconds: u64) -> Option<GuardTransition> {
        if self.remaining_seconds == 0 {
            // Already expired; the owner removes the watch on Expired.
            return None;
        }

        self.remaining_seconds -= 1;

        if self.remaining_seconds == 0 {
            return Some(GuardTransition::Expired);
        }

        if self.phase == GuardPhase::Active && self.remaining_seconds <= warning_threshold_seconds {
            self.phase = GuardPhase::Warning;
            return Some(GuardTransition::WarningEntered);
        }

        None
    }

    /// Resets the countdown to the full timeout and clears the warning.
    pub fn extend(&mut self, timeout_seconds: u64) {
        self.remaining_seconds = timeout_seconds;
        self.phase = GuardPhase::Active;
    }
}

/// Watches admin sessions and forces a sign-out when one idles past its
/// timeout. Non-admin sessions are never watched, so the guard stays inert
/// for them. One interval task drives every watched countdown; both the
/// ticker and the actor are cancelled when the guard is dropped, so no
/// orphaned countdown can fire after its owner is gone.
pub struct AdminSessionGuard {
    sender: mpsc::Sender<GuardCommand>,
    actor: JoinHandle<()>,
    ticker: JoinHandle<()>,
}

impl AdminSessionGuard {
    pub fn new(
        config: AdminSessionConfig,
        roles: Arc<dyn RoleCheck>,
        sign_out: Arc<dyn SignOut>,
        audit: SecurityEventLog,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(GUARD_CHANNEL_DEPTH);

        let actor = tokio::spawn(async move {
            let mut state = GuardState::new(config, roles, sign_out, audit);
            state.run(receiver).await;
        });

        let tick_sender = sender.clone();
        let ticker = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            // The first tick completes immediately; skip it so watches get
            // a full first second.
            interval.tick().await;
            loop {
                interval.tick().await;
                if tick_sender.send(GuardCommand::Tick).await.is_err() {
                    break;
                }
            }
        });

        Self {
            sender,
            actor,
            ticker,
        }
    }

    /// Starts watching a session. Callers check the role first; the guard
    /// re-checks on extension, not here.
    pub async fn watch(&self, session_id: &str, user_id: &str) {
        let command = GuardCommand::Watch {
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
        };
        if self.sender.send(command).await.is_err() {
            warn!("Session guard channel closed while adding watch");
        }
    }

    /// Stops watching without signing out (logout, session invalidated
    /// elsewhere). Idempotent.
    pub fn unwatch(&self, session_id: &str) {
        let command = GuardCommand::Unwatch {
            session_id: session_id.to_string(),
        };
        if self.sender.try_send(command).is_err() {
            warn!("Session guard channel unavailable while removing watch");
        }
    }

    pub async fn status(&self, session_id: &str) -> Option<GuardStatus> {
        let (reply, receive) = oneshot::channel();
        let command = GuardCommand::Status {
            session_id: session_id.to_string(),
            reply,
        };
        if self.sender.send(command).await.is_err() {
            return None;
        }
        receive.await.unwrap_or(None)
    }

    pub async fn extend(&self, session_id: &str) -> Result<GuardStatus, GuardError> {
        let (reply, receive) = oneshot::channel();
        let command = GuardCommand::Extend {
            session_id: session_id.to_string(),
            reply,
        };
        if self.sender.send(command).await.is_err() {
            return Err(GuardError::NotWatched);
        }
        receive.await.unwrap_or(Err(GuardError::NotWatched))
    }
}

impl Drop for AdminSessionGuard {
    fn drop(&mut self) {
        self.ticker.abort();
        self.actor.abort();
    }
}

enum GuardCommand {
    Watch {
        session_id: String,
        user_id: String,
    },
    Unwatch {
        session_id: String,
    },
    Status {
        session_id: String,
        reply: oneshot::Sender<Option<GuardStatus>>,
    },
    Extend {
        session_id: String,
        reply: oneshot::Sender<Result<GuardStatus, GuardError>>,
    },
    Tick,
}

struct WatchEntry {
    user_id: String,
    countdown: CountdownState,
}

struct GuardState {
    config: AdminSessionConfig,
    roles: Arc<dyn RoleCheck>,
    sign_out: Arc<dyn SignOut>,
    audit: SecurityEventLog,
    watches: HashMap<String, WatchEntry>,
}

impl GuardState {
    fn new(
        config: AdminSessionConfig,
        roles: Arc<dyn RoleCheck>,
        sign_out: Arc<dyn SignOut>,
        audit: SecurityEventLog,
    ) -> Self {
        Self {
            config,
            roles,
            sign_out,
            audit,
            watches: HashMap::new(),
        }
    }

    async fn run(&mut self, mut receiver: mpsc::Receiver<GuardCommand>) {
        while let Some(command) = receiver.recv().await {
            match command {
                GuardCommand::Watch {
                    session_id,
                    user_id,
                } => self.handle_watch(session_id, user_id),
                GuardCommand::Unwatch { session_id } => {
                    self.watches.remove(&session_id);
                }
                GuardCommand::Status { session_id, reply } => {
                    let status = self
                        .watches
                        .get(&session_id)
                        .map(|entry| entry.countdown.status());
                    let _ = reply.send(status);
                }
                GuardCommand::Extend { session_id, reply } => {
                    let _ = reply.send(self.handle_extend(&session_id).await);
                }
                GuardCommand::Tick => self.handle_tick().await,
            }
        }
    }

    fn handle_watch(&mut self, session_id: String, user_id: String) {
        info!(
            "Admin session watch started for {} ({} minute timeout)",
            user_id, self.config.timeout_minutes
        );
        self.watches.insert(
            session_id,
            WatchEntry {
                user_id,
                countdown: CountdownState::new(self.config.timeout_seconds()),
            },
        );
    }

    async fn handle_extend(&mut self, session_id: &str) -> Result<GuardStatus, GuardError> {
        let user_id = match self.watches.get(session_id) {
            Some(entry) => entry.user_id.clone(),
            None => return Err(GuardError::NotWatched),
        };

        // The role is authoritative, never the watch list: a user demoted
        // mid-session loses the extension and the watch.
        if !self.roles.has_admin_role(&user_id).await {
            self.watches.remove(session_id);
            warn!(
                "🚫 Admin session extension refused for {}: role revoked",
                user_id
            );
            return Err(GuardError::NotAdmin);
        }

        let timeout = self.config.timeout_seconds();
        let entry = match self.watches.get_mut(session_id) {
            Some(entry) => entry,
            None => return Err(GuardError::NotWatched),
        };
        entry.countdown.extend(timeout);

        self.audit.record(
            SecurityEventKind::AdminSessionExtended,
            serde_json::json!({
                "user": user_id,
                "timeout_minutes": self.config.timeout_minutes,
            }),
            Severity::Low,
        );

        Ok(entry.countdown.status())
    }

    async fn handle_tick(&mut self) {
        let warning_threshold = self.config.warning_seconds;
        let mut expired = Vec::new();

        for (session_id, entry) in self.watches.iter_mut() {
            match entry.countdown.tick(warning_threshold) {
                Some(GuardTransition::WarningEntered) => {
                    self.audit.record(
                        SecurityEventKind::AdminSessionWarning,
                        serde_json::json!({
                            "user": entry.user_id,
                            "remaining_seconds": entry.countdown.status().remaining_seconds,
                        }),
                        Severity::Medium,
                    );
                }
                Some(GuardTransition::Expired) => {
                    expired.push((session_id.clone(), entry.user_id.clone()));
                }
                None => {}
            }
        }

        // Remove before signing out so a slow collaborator cannot make the
        // same expiry fire twice.
        for (session_id, user_id) in expired {
            self.watches.remove(&session_id);
            warn!("🚨 Admin session for {} timed out, signing out", user_id);
            self.sign_out.sign_out(&session_id).await;
            self.audit.record(
                SecurityEventKind::AdminSessionTimeout,
                serde_json::json!({ "user": user_id }),
                Severity::High,
            );
        }
    }
}

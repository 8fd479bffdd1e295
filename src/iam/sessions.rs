// This file is part of the product ImmoShot.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::password::random_token;
use crate::security::SignOut;
use async_trait::async_trait;
use log::warn;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};

pub const SESSION_COOKIE_NAME: &str = "immoshot_session";

const SESSION_TTL_SECONDS: u64 = 86400;
const SESSION_CHANNEL_DEPTH: usize = 64;
const MAX_SESSIONS: usize = 10000;

/// Resolved identity of a live session.
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    pub session_id: String,
    pub email: String,
    pub name: String,
    pub is_admin: bool,
}

/// Opaque-id cookie sessions held in memory. `invalidate` doubles as the
/// sign-out collaborator for the admin session guard: removing an id that
/// is already gone is a no-op, which gives the guard its idempotent
/// sign-out.
#[derive(Clone)]
pub struct SessionStore {
    sender: mpsc::Sender<SessionCommand>,
}

impl SessionStore {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel(SESSION_CHANNEL_DEPTH);
        tokio::spawn(async move {
            let mut state = SessionState::new();
            state.run(receiver).await;
        });
        Self { sender }
    }

    pub async fn issue(&self, email: &str, name: &str, is_admin: bool) -> Option<String> {
        let (reply, receive) = oneshot::channel();
        let command = SessionCommand::Issue {
            email: email.to_string(),
            name: name.to_string(),
            is_admin,
            reply,
        };
        if self.sender.send(command).await.is_err() {
            warn!("Session store channel closed while issuing session");
            return None;
        }
        receive.await.ok()
    }

    pub async fn resolve(&self, session_id: &str) -> Option<SessionIdentity> {
        let (reply, receive) = oneshot::channel();
        let command = SessionCommand::Resolve {
            session_id: session_id.to_string(),
            reply,
        };
        if self.sender.send(command).await.is_err() {
            return None;
        }
        receive.await.unwrap_or(None)
    }

    pub fn invalidate(&self, session_id: &str) {
        let command = SessionCommand::Invalidate {
            session_id: session_id.to_string(),
        };
        if self.sender.try_send(command).is_err() {
            warn!("Session store channel unavailable while invalidating session");
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SignOut for SessionStore {
    async fn sign_out(&self, session_id: &str) {
        self.invalidate(session_id);
    }
}

enum SessionCommand {
    Issue {
        email: String,
        name: String,
        is_admin: bool,
        reply: oneshot::Sender<String>,
    },
    Resolve {
        session_id: String,
        reply: oneshot::Sender<Option<SessionIdentity>>,
    },
    Invalidate {
        session_id: String,
    },
}

struct SessionRecord {
    email: String,
    name: String,
    is_admin: bool,
    expires_at: Instant,
}

struct SessionState {
    sessions: HashMap<String, SessionRecord>,
    session_order: VecDeque<String>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            session_order: VecDeque::new(),
        }
    }

    async fn run(&mut self, mut receiver: mpsc::Receiver<SessionCommand>) {
        while let Some(command) = receiver.recv().await {
            match command {
                SessionCommand::Issue {
                    email,
                    name,
                    is_admin,
                    reply,
                } => {
                    let _ = reply.send(self.issue(email, name, is_admin, Instant::now()));
                }
                SessionCommand::Resolve { session_id, reply } => {
                    let _ = reply.send(self.resolve(&session_id, Instant::now()));
                }
                SessionCommand::Invalidate { session_id } => {
                    self.invalidate(&session_id);
                }
            }
        }
    }

    fn issue(&mut self, email: String, name: String, is_admin: bool, now: Instant) -> String {
        self.cleanup_expired(now);

        let session_id = random_token("ssn");
        self.sessions.insert(
            session_id.clone(),
            SessionRecord {
                email,
                name,
                is_admin,
                expires_at: now + Duration::from_secs(SESSION_TTL_SECONDS),
            },
        );
        self.session_order.push_back(session_id.clone());
        self.prune_overflow();

        session_id
    }

    fn resolve(&mut self, session_id: &str, now: Instant) -> Option<SessionIdentity> {
        let record = self.sessions.get(session_id)?;
        if record.expires_at <= now {
            self.invalidate(session_id);
            return None;
        }
        Some(SessionIdentity {
            session_id: session_id.to_string(),
            email: record.email.clone(),
            name: record.name.clone(),
            is_admin: record.is_admin,
        })
    }

    fn invalidate(&mut self, session_id: &str) {
        self.sessions.remove(session_id);
        self.session_order.retain(|id| id != session_id);
    }

    fn cleanup_expired(&mut self, now: Instant) {
        self.sessions.retain(|_, record| record.expires_at > now);
        self.session_order
            .retain(|id| self.sessions.contains_key(id));
    }

    fn prune_overflow(&mut self) {
        while self.sessions.len() > MAX_SESSIONS {
            if let Some(oldest) = self.session_order.pop_front() {
                self.sessions.remove(&oldest);
            } else {
                break;
            }
        }
    }
}

// This file is part of the product ImmoShot.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use std::path::PathBuf;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventKind {
    XssAttemptBlocked,
    FileValidationFailed,
    RateLimitExceeded,
    AdminSessionWarning,
    AdminSessionExtended,
    AdminSessionTimeout,
    LoginFailed,
    CsrfRejected,
}

impl SecurityEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityEventKind::XssAttemptBlocked => "xss_attempt_blocked",
            SecurityEventKind::FileValidationFailed => "file_validation_failed",
            SecurityEventKind::RateLimitExceeded => "rate_limit_exceeded",
            SecurityEventKind::AdminSessionWarning => "admin_session_warning",
            SecurityEventKind::AdminSessionExtended => "admin_session_extended",
            SecurityEventKind::AdminSessionTimeout => "admin_session_timeout",
            SecurityEventKind::LoginFailed => "login_failed",
            SecurityEventKind::CsrfRejected => "csrf_rejected",
        }
    }
}

enum AuditCommand {
    Record {
        kind: SecurityEventKind,
        details: Value,
        severity: Severity,
    },
}

/// Fire-and-forget audit sink. `record` never blocks and never surfaces an
/// error to the caller; a failed append only produces a log warning.
#[derive(Clone)]
pub struct SecurityEventLog {
    sender: mpsc::UnboundedSender<AuditCommand>,
}

impl SecurityEventLog {
    pub fn new(audit_file: PathBuf) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut state = AuditState::new(audit_file);
            state.run(receiver).await;
        });
        Self { sender }
    }

    pub fn record(&self, kind: SecurityEventKind, details: Value, severity: Severity) {
        let command = AuditCommand::Record {
            kind,
            details,
            severity,
        };
        if self.sender.send(command).is_err() {
            warn!("Security event log channel closed while recording event");
        }
    }
}

struct AuditState {
    audit_file: PathBuf,
}

impl AuditState {
    fn new(audit_file: PathBuf) -> Self {
        Self { audit_file }
    }

    async fn run(&mut self, mut receiver: mpsc::UnboundedReceiver<AuditCommand>) {
        while let Some(command) = receiver.recv().await {
            match command {
                AuditCommand::Record {
                    kind,
                    details,
                    severity,
                } => self.handle_record(kind, details, severity),
            }
        }
    }

    fn handle_record(&mut self, kind: SecurityEventKind, details: Value, severity: Severity) {
        match severity {
            Severity::Critical | Severity::High => warn!(
                "🚨 SECURITY EVENT [{}] {}: {}",
                severity.as_str(),
                kind.as_str(),
                details
            ),
            Severity::Medium => info!(
                "SECURITY EVENT [{}] {}: {}",
                severity.as_str(),
                kind.as_str(),
                details
            ),
            Severity::Low => debug!(
                "SECURITY EVENT [{}] {}: {}",
                severity.as_str(),
                kind.as_str(),
                details
            ),
        }

        let record = serde_json::json!({
            "ts": chrono::Utc::now().to_rfc3339(),
            "event": kind.as_str(),
            "severity": severity.as_str(),
            "details": details,
        });

        if let Err(err) = self.append_line(&record) {
            warn!(
                "Failed to append security event to {}: {}",
                self.audit_file.display(),
                err
            );
        }
    }

    fn append_line(&self, record: &Value) -> std::io::Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.audit_file)?;
        writeln!(file, "{}", record)
    }
}

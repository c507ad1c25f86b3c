//! Credential health tracking for outbound provider calls.
//!
//! A rejected credential (HTTP 401/403) flips an in-memory breaker and sends
//! at most one operator alert per cooldown window. The first success after a
//! failure clears the breaker and the alert timestamp. State is process-local:
//! redeploying with a corrected credential is the expected remediation.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use axkan_types::error::ProviderError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

/// Maximum characters of the provider response carried in an alert.
const ALERT_DETAIL_CHARS: usize = 300;

/// Sends operator notifications.
pub trait Notifier: Send + Sync {
    fn notify(
        &self,
        alert: &CredentialAlert,
    ) -> impl std::future::Future<Output = Result<(), ProviderError>> + Send;
}

/// An operator alert about a rejected credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialAlert {
    /// Which credential failed (e.g. "whatsapp").
    pub credential: String,
    pub status: u16,
    /// Leading part of the provider response body.
    pub detail: String,
    pub at: DateTime<Utc>,
}

impl CredentialAlert {
    pub fn subject(&self) -> String {
        format!("Axkan bot DOWN: {} credential rejected", self.credential)
    }

    /// Steps the operator should take to restore the credential.
    pub fn remediation(&self) -> &'static [&'static str] {
        &[
            "Open Meta Business settings and select the system user that owns the app.",
            "Generate a new permanent token with the whatsapp_business_messaging permission.",
            "Update the credential in the deployment environment.",
            "Redeploy the service so the new credential is picked up.",
        ]
    }

    /// Plain-text rendering used by notifiers without HTML support.
    pub fn body_text(&self) -> String {
        let steps = self
            .remediation()
            .iter()
            .enumerate()
            .map(|(i, s)| format!("{}. {s}", i + 1))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "The {} credential was rejected and the bot stopped replying.\n\n\
             HTTP status: {}\nError: {}\nTime (UTC): {}\n\nHow to fix:\n{steps}\n\n\
             This alert is sent at most once per cooldown window.",
            self.credential,
            self.status,
            if self.detail.is_empty() { "N/A" } else { &self.detail },
            self.at.to_rfc3339(),
        )
    }
}

/// Breaker flag plus the time of the last alert.
#[derive(Debug, Default, Clone)]
pub struct HealthState {
    broken: bool,
    last_alert: Option<Instant>,
    last_alert_at: Option<DateTime<Utc>>,
}

/// What a recorded auth failure changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureOutcome {
    /// The breaker was closed before this failure.
    pub newly_broken: bool,
    /// An alert is due: none was sent within the cooldown window.
    pub alert_due: bool,
}

impl HealthState {
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Flip the breaker and decide whether an alert is due at `now`.
    ///
    /// When an alert is due the alert timestamp is taken immediately, so
    /// concurrent failures observe it and stay quiet.
    pub fn record_auth_failure(&mut self, now: Instant, cooldown: Duration) -> FailureOutcome {
        let newly_broken = !self.broken;
        self.broken = true;

        let alert_due = match self.last_alert {
            Some(sent) => now.saturating_duration_since(sent) >= cooldown,
            None => true,
        };
        if alert_due {
            self.last_alert = Some(now);
            self.last_alert_at = Some(Utc::now());
        }

        FailureOutcome {
            newly_broken,
            alert_due,
        }
    }

    /// Clear the breaker and the alert timestamp. Returns `true` if the
    /// breaker was set.
    pub fn record_success(&mut self) -> bool {
        if !self.broken {
            return false;
        }
        self.broken = false;
        self.last_alert = None;
        self.last_alert_at = None;
        true
    }
}

/// Serializable view of a monitor for operators.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub credential: String,
    pub status: &'static str,
    pub last_alert_at: Option<DateTime<Utc>>,
}

/// Watches the results of calls made with one credential.
pub struct TokenHealthMonitor<N: Notifier> {
    credential: String,
    cooldown: Duration,
    state: Mutex<HealthState>,
    notifier: N,
}

impl<N: Notifier> TokenHealthMonitor<N> {
    pub fn new(credential: impl Into<String>, cooldown: Duration, notifier: N) -> Self {
        Self {
            credential: credential.into(),
            cooldown,
            state: Mutex::new(HealthState::default()),
            notifier,
        }
    }

    pub fn credential(&self) -> &str {
        &self.credential
    }

    pub fn is_broken(&self) -> bool {
        self.state().is_broken()
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let state = self.state();
        HealthSnapshot {
            credential: self.credential.clone(),
            status: if state.broken { "broken" } else { "healthy" },
            last_alert_at: state.last_alert_at,
        }
    }

    /// Feed the outcome of a provider call to the monitor.
    ///
    /// Only auth rejections and successes move the breaker; transient and
    /// other errors leave it untouched.
    pub async fn observe<T>(&self, result: &Result<T, ProviderError>) {
        match result {
            Ok(_) => self.record_success(),
            Err(ProviderError::Auth { status, body }) => {
                self.record_auth_failure_at(*status, body, Instant::now())
                    .await;
            }
            Err(_) => {}
        }
    }

    pub fn record_success(&self) {
        if self.state().record_success() {
            info!(credential = %self.credential, "credential recovered, provider calls succeeding again");
        }
    }

    /// Record a rejected credential at `now`. Returns `true` if an alert
    /// was dispatched.
    pub async fn record_auth_failure_at(&self, status: u16, body: &str, now: Instant) -> bool {
        let outcome = self.state().record_auth_failure(now, self.cooldown);

        error!(
            credential = %self.credential,
            status,
            response = %truncate(body, 200),
            "provider rejected credential"
        );
        if outcome.newly_broken {
            error!(
                credential = %self.credential,
                "credential is dead, outbound calls will fail until it is replaced"
            );
        }
        if !outcome.alert_due {
            return false;
        }

        let alert = CredentialAlert {
            credential: self.credential.clone(),
            status,
            detail: truncate(body, ALERT_DETAIL_CHARS),
            at: Utc::now(),
        };
        match self.notifier.notify(&alert).await {
            Ok(()) => error!(credential = %self.credential, "credential alert sent"),
            Err(e) => warn!(credential = %self.credential, error = %e, "failed to send credential alert"),
        }
        true
    }

    fn state(&self) -> MutexGuard<'_, HealthState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

//! Periodic session re-validation.
//!
//! Runs independently of the chat pipeline and only ever forces logout.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::Session;
use crate::api::auth::AuthApi;

/// Outcome of one validity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCheck {
    /// Token is unexpired and the backend accepted it.
    Valid,
    /// The session was (or already is) logged out.
    LoggedOut,
    /// Check failed for a reason that says nothing about the session.
    Inconclusive,
}

#[derive(Debug, Clone)]
pub struct SessionMonitor {
    session: Session,
    auth: AuthApi,
    interval: Duration,
}

impl SessionMonitor {
    pub fn new(session: Session, auth: AuthApi, interval: Duration) -> Self {
        Self {
            session,
            auth,
            interval,
        }
    }

    /// Runs one check: local expiry first, then `GET /auth/verify-session`.
    pub async fn check_once(&self) -> SessionCheck {
        if !self.session.is_authenticated() {
            self.session.logout();
            return SessionCheck::LoggedOut;
        }

        match self.auth.verify_session().await {
            Ok(()) => SessionCheck::Valid,
            Err(err) if err.revokes_session() => {
                self.session.logout();
                SessionCheck::LoggedOut
            }
            Err(err) => {
                tracing::warn!(error = %err, "Session check failed, keeping session");
                SessionCheck::Inconclusive
            }
        }
    }

    /// Checks immediately, then once per interval until logged out or
    /// cancelled.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if self.check_once().await == SessionCheck::LoggedOut {
                            tracing::info!("Session monitor stopping: logged out");
                            break;
                        }
                    }
                }
            }
        })
    }
}

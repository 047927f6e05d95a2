//! Diagnostic session state and keepalive for one component.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::broker::Broker;
use crate::component::Component;
use crate::config::SessionConfig;
use crate::security::{self, SecurityKeyMaterial};
use crate::uds::{Request, Response, UdsError};

/// The diagnostic session a component is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Default,
    Programming,
    Extended,
    Other(u8),
}

impl SessionState {
    fn from_id(session: u8) -> Self {
        match session {
            0x01 => SessionState::Default,
            0x02 => SessionState::Programming,
            0x03 => SessionState::Extended,
            other => SessionState::Other(other),
        }
    }
}

/// Tracks session and security state for one component and keeps
/// non-default sessions alive with suppressed tester-present requests.
pub struct SessionManager {
    broker: Arc<Broker>,
    component: Component,
    config: SessionConfig,
    state: RwLock<SessionState>,
    unlocked_level: RwLock<Option<u8>>,
    keepalive: Mutex<Option<JoinHandle<()>>>,
}

impl SessionManager {
    pub fn new(broker: Arc<Broker>, component: Component, config: SessionConfig) -> Self {
        Self {
            broker,
            component,
            config,
            state: RwLock::new(SessionState::Default),
            unlocked_level: RwLock::new(None),
            keepalive: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Security level currently unlocked, if any.
    pub fn unlocked_level(&self) -> Option<u8> {
        *self.unlocked_level.read()
    }

    /// Transition to a diagnostic session (UDS 0x10).
    ///
    /// Per ISO 14229 every transition re-locks security access, so the
    /// recorded unlocked level is cleared. Keepalive runs while the
    /// component is outside the default session.
    pub async fn change_session(&self, session: u8) -> Result<(), UdsError> {
        let tx = self
            .broker
            .request(&self.component, Request::SessionControl { session })
            .await?;

        match tx.wait().await? {
            Some(Response::SessionControl { session: echoed, .. }) if echoed == session => {}
            other => {
                return Err(UdsError::UnexpectedResponse(format!(
                    "session control answered with {other:?}"
                )))
            }
        }

        *self.state.write() = SessionState::from_id(session);
        *self.unlocked_level.write() = None;

        if session == self.config.default_session {
            self.stop_keepalive();
        } else {
            self.start_keepalive();
        }

        info!(
            component = %self.component.id,
            session = format_args!("0x{session:02X}"),
            "session changed (security re-locked)"
        );
        Ok(())
    }

    /// Unlock a security level via the seed/key handshake.
    pub async fn unlock(&self, material: &SecurityKeyMaterial) -> Result<(), UdsError> {
        security::unlock(&self.broker, &self.component, material).await?;
        *self.unlocked_level.write() = Some(material.level);
        Ok(())
    }

    /// Reset tracked state after an ECU reset or power cycle.
    ///
    /// The ECU comes back in the default session with security locked;
    /// this updates the bookkeeping without any bus traffic (the ECU may
    /// still be rebooting).
    pub fn notify_ecu_reset(&self) {
        self.stop_keepalive();
        *self.state.write() = SessionState::Default;
        *self.unlocked_level.write() = None;
        info!(component = %self.component.id, "session state reset to default");
    }

    fn start_keepalive(&self) {
        if !self.config.keepalive_enabled {
            return;
        }
        self.stop_keepalive();

        let broker = self.broker.clone();
        let component = self.component.clone();
        let interval = Duration::from_millis(self.config.keepalive_interval_ms);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // Skip the immediate first tick; the session was just set up.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let result = broker
                    .request(
                        &component,
                        Request::TesterPresent {
                            suppress_response: true,
                        },
                    )
                    .await;
                match result {
                    // No response expected; wait() completes immediately.
                    Ok(tx) => {
                        let _ = tx.wait().await;
                    }
                    Err(e) => error!(error = %e, "tester present failed"),
                }
            }
        });

        *self.keepalive.lock() = Some(handle);
        debug!(
            interval_ms = self.config.keepalive_interval_ms,
            "keepalive started"
        );
    }

    fn stop_keepalive(&self) {
        if let Some(handle) = self.keepalive.lock().take() {
            handle.abort();
            debug!("keepalive stopped");
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if let Some(handle) = self.keepalive.get_mut().take() {
            handle.abort();
        }
    }
}

//! Service lifecycle
//!
//! Each registered service owns a [`Lifecycle`] moving through
//! `Stopped → Starting → Running → Stopping → Stopped`. Start and stop are
//! idempotent and never fail towards the host: a failing hook is logged and
//! the service ends up `Stopped`.

use crate::error::IdCheckError;
use crate::service::{panic_message, AuthenticatorService};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU8, Ordering};
use tracing::{debug, error, info, warn};

/// Lifecycle state of a service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// Not running
    Stopped,
    /// Start hook in progress
    Starting,
    /// Ready to validate applications
    Running,
    /// Stop hook in progress
    Stopping,
}

impl LifecycleState {
    fn as_u8(self) -> u8 {
        match self {
            LifecycleState::Stopped => 0,
            LifecycleState::Starting => 1,
            LifecycleState::Running => 2,
            LifecycleState::Stopping => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => LifecycleState::Starting,
            2 => LifecycleState::Running,
            3 => LifecycleState::Stopping,
            _ => LifecycleState::Stopped,
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Stopped => write!(f, "stopped"),
            LifecycleState::Starting => write!(f, "starting"),
            LifecycleState::Running => write!(f, "running"),
            LifecycleState::Stopping => write!(f, "stopping"),
        }
    }
}

/// Puts a lifecycle back to `Stopped` when dropped while armed, i.e. when
/// a hook future is abandoned mid-transition
struct ResetGuard<'a> {
    state: &'a AtomicU8,
    armed: bool,
}

impl ResetGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ResetGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state
                .store(LifecycleState::Stopped.as_u8(), Ordering::Release);
        }
    }
}

/// Lifecycle controller for one service instance
///
/// The state is written only through compare-and-swap transitions, so
/// concurrent `start`/`stop` calls cannot both run a hook. Readers may see
/// a slightly stale state.
#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicU8,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    /// Create a stopped lifecycle
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(LifecycleState::Stopped.as_u8()),
        }
    }

    /// Current state
    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Readiness flag
    pub fn is_running(&self) -> bool {
        self.state() == LifecycleState::Running
    }

    fn transition(&self, from: LifecycleState, to: LifecycleState) -> bool {
        self.state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn set(&self, state: LifecycleState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    fn reset_on_drop(&self) -> ResetGuard<'_> {
        ResetGuard {
            state: &self.state,
            armed: true,
        }
    }

    /// Start the service
    ///
    /// No-op unless the service is `Stopped`. Returns the resulting state:
    /// `Running` on success, `Stopped` if the start hook failed. Dropping
    /// the future mid-hook leaves the service `Stopped`.
    pub async fn start(&self, service: &dyn AuthenticatorService) -> LifecycleState {
        if !self.transition(LifecycleState::Stopped, LifecycleState::Starting) {
            debug!(
                service = service.name(),
                state = %self.state(),
                "Start ignored, service is not stopped"
            );
            return self.state();
        }

        let guard = self.reset_on_drop();
        let hook = AssertUnwindSafe(service.on_start()).catch_unwind().await;
        guard.disarm();
        match hook.unwrap_or_else(|panic| Err(IdCheckError::Service(panic_message(panic)))) {
            Ok(()) => {
                self.set(LifecycleState::Running);
                info!(
                    service = service.name(),
                    description = service.description(),
                    "Authenticator service started"
                );
            }
            Err(e) => {
                self.set(LifecycleState::Stopped);
                error!(
                    service = service.name(),
                    error = %e,
                    "Authenticator service failed to start"
                );
            }
        }

        self.state()
    }

    /// Stop the service
    ///
    /// No-op unless the service is `Running`. Always ends `Stopped`, even
    /// if the stop hook fails or the future is dropped mid-hook.
    pub async fn stop(&self, service: &dyn AuthenticatorService) -> LifecycleState {
        if !self.transition(LifecycleState::Running, LifecycleState::Stopping) {
            debug!(
                service = service.name(),
                state = %self.state(),
                "Stop ignored, service is not running"
            );
            return self.state();
        }

        let guard = self.reset_on_drop();
        let hook = AssertUnwindSafe(service.on_stop()).catch_unwind().await;
        guard.disarm();
        if let Err(e) = hook.unwrap_or_else(|panic| Err(IdCheckError::Service(panic_message(panic)))) {
            warn!(
                service = service.name(),
                error = %e,
                "Authenticator service stop hook failed"
            );
        }

        self.set(LifecycleState::Stopped);
        info!(service = service.name(), "Authenticator service stopped");

        self.state()
    }
}

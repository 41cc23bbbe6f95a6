//! Client login gating on pool readiness.

use std::sync::Arc;

use tracing::warn;

use super::health::HealthOrchestrator;

/// Decision for an incoming client login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Every worker has answered a probe.
    Allowed,
    /// The pool is still coming up.
    Denied {
        /// Text shown to the client.
        message: String,
        /// Workers that have answered a probe so far.
        loaded: usize,
        /// Workers in the pool.
        expected: usize,
    },
}

impl Admission {
    /// Whether the login may proceed.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Admits clients only once the whole pool has started.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    orchestrator: Arc<HealthOrchestrator>,
    deny_message: String,
}

impl AdmissionGate {
    /// Gate logins on `orchestrator`'s readiness.
    #[must_use]
    pub fn new(orchestrator: Arc<HealthOrchestrator>, deny_message: impl Into<String>) -> Self {
        Self {
            orchestrator,
            deny_message: deny_message.into(),
        }
    }

    /// Decide whether a login may proceed right now.
    #[must_use]
    pub fn check(&self) -> Admission {
        if self.orchestrator.all_started() {
            return Admission::Allowed;
        }

        let loaded = self.orchestrator.started_count();
        let expected = self.orchestrator.workers().len();
        warn!(loaded, expected, "login attempted before pool finished starting");

        Admission::Denied {
            message: self.deny_message.clone(),
            loaded,
            expected,
        }
    }
}

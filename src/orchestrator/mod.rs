//! Worker pool supervision.
//!
//! Covers worker directory provisioning, process start and termination,
//! restart deduplication, periodic health checking and login gating.

pub mod admission;
pub mod health;
pub mod process;
pub mod provisioner;
pub mod restart_guard;

pub use admission::{Admission, AdmissionGate};
pub use health::{spawn_health_loop, Collaborators, HealthOrchestrator, ProbeOutcome, Reaction};
pub use process::{ProcessControl, ProcessHandle, ShellProcessControl};
pub use provisioner::{FixedSnapshot, Provisioner, RandomSnapshot, SnapshotPicker};
pub use restart_guard::RestartGuard;

//! Outcome reporting for warm-up and shutdown passes.
//!
//! Both passes are best effort: a failing component is logged, recorded in a
//! [`LifecycleReport`] and skipped, and the pass moves on to the next one.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use switchyard_core::{BoxError, ComponentKind};
use tracing::{debug, warn};

/// One component that failed during a lifecycle pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleFailure {
    /// Filter or handler.
    pub kind: ComponentKind,
    /// The component name.
    pub name: String,
    /// What went wrong.
    pub reason: String,
}

impl fmt::Display for LifecycleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}': {}", self.kind, self.name, self.reason)
    }
}

/// Summary of a warm-up or shutdown pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LifecycleReport {
    /// Components processed successfully, in processing order.
    pub completed: Vec<(ComponentKind, String)>,
    /// Components that failed.
    pub failures: Vec<LifecycleFailure>,
}

impl LifecycleReport {
    pub(crate) fn record_success(&mut self, kind: ComponentKind, name: &str) {
        self.completed.push((kind, name.to_string()));
    }

    pub(crate) fn record_failure(
        &mut self,
        kind: ComponentKind,
        name: &str,
        reason: impl Into<String>,
    ) {
        self.failures.push(LifecycleFailure {
            kind,
            name: name.to_string(),
            reason: reason.into(),
        });
    }

    /// Returns `true` if no component failed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of components processed successfully.
    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    /// Returns whether the named component completed.
    pub fn completed(&self, kind: ComponentKind, name: &str) -> bool {
        self.completed.iter().any(|(k, n)| *k == kind && n == name)
    }

    /// Returns whether the named component failed.
    pub fn failed(&self, kind: ComponentKind, name: &str) -> bool {
        self.failures.iter().any(|f| f.kind == kind && f.name == name)
    }

    /// Appends another report.
    pub fn merge(&mut self, other: LifecycleReport) {
        self.completed.extend(other.completed);
        self.failures.extend(other.failures);
    }
}

impl fmt::Display for LifecycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} completed, {} failed",
            self.completed.len(),
            self.failures.len()
        )
    }
}

/// Runs one component's `destroy`, converting an error or a panic into a
/// recorded failure so the caller can continue with the next component.
pub(crate) fn destroy_isolated<F>(
    kind: ComponentKind,
    name: &str,
    destroy: F,
    report: &mut LifecycleReport,
)
where
    F: FnOnce() -> Result<(), BoxError>,
{
    let outcome = match panic::catch_unwind(AssertUnwindSafe(destroy)) {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(_) => Err("destroy panicked".to_string()),
    };

    match outcome {
        Ok(()) => {
            debug!(kind = %kind, name = %name, "Destroyed");
            report.record_success(kind, name);
        }
        Err(reason) => {
            warn!(kind = %kind, name = %name, error = %reason, "Destroy failed, continuing");
            report.record_failure(kind, name, reason);
        }
    }
}

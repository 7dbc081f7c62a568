//! Rich wait errors with debugging context
//!
//! A wait that runs out of time is reported with the resource it was
//! watching, what it was waiting for, the last state it saw and, for pods,
//! the most recent events.
//!
//! # Example
//!
//! ```ignore
//! match runner::await_running(&ctx).await {
//!     Err(ContextError::WaitTimeout(err)) => {
//!         println!("Resource: {}", err.resource);
//!         println!("Last state: {}", err.last_state);
//!         for event in &err.events {
//!             println!("  {} - {}", event.reason, event.message);
//!         }
//!     }
//!     _ => {}
//! }
//! ```

use crate::conditions::{Outcome, WaitOptions};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Event, Pod};
use kube::core::ObjectList;
use std::fmt;
use std::time::Duration;

/// A simplified event for wait error context
#[derive(Debug, Clone)]
pub struct WaitEvent {
    /// Event reason (e.g., "Pulling", "BackOff", "FailedScheduling")
    pub reason: String,
    /// Event message
    pub message: String,
    /// Timestamp as `HH:MM:SS`
    pub timestamp: Option<String>,
}

impl From<&Event> for WaitEvent {
    fn from(event: &Event) -> Self {
        let timestamp = event
            .last_timestamp
            .as_ref()
            .or(event.first_timestamp.as_ref())
            .map(|t| t.0.format("%H:%M:%S").to_string());

        Self {
            reason: event.reason.clone().unwrap_or_default(),
            message: event.message.clone().unwrap_or_default(),
            timestamp,
        }
    }
}

/// Error returned when a condition did not hold before its deadline
#[derive(Debug, Clone)]
pub struct WaitError {
    /// Resource reference (e.g., "pod/test-runner")
    pub resource: String,
    /// What the wait expected (e.g., "be deleted")
    pub goal: String,
    /// Description of the last observed state
    pub last_state: String,
    /// How long we waited before giving up
    pub elapsed: Duration,
    /// The timeout that was configured
    pub timeout: Duration,
    /// Number of fetches performed
    pub attempts: u32,
    /// Recent events related to the resource
    pub events: Vec<WaitEvent>,
}

impl WaitError {
    pub fn new(
        resource: impl Into<String>,
        goal: impl Into<String>,
        timeout: Duration,
        elapsed: Duration,
    ) -> Self {
        Self {
            resource: resource.into(),
            goal: goal.into(),
            last_state: "unknown".to_string(),
            elapsed,
            timeout,
            attempts: 0,
            events: Vec::new(),
        }
    }

    /// Build from a timed-out poll, describing the last value it fetched
    pub fn from_outcome<V: ResourceState>(
        resource: impl Into<String>,
        goal: impl Into<String>,
        options: &WaitOptions,
        outcome: &Outcome<V>,
    ) -> Self {
        let mut err = Self::new(resource, goal, options.timeout, outcome.elapsed());
        err.attempts = outcome.attempts();
        if let Outcome::TimedOut {
            last: Some(value), ..
        } = outcome
        {
            err.last_state = value.state_description();
        }
        err
    }

    /// Set the last observed state
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.last_state = state.into();
        self
    }

    /// Add events to the error
    pub fn with_events(mut self, events: Vec<WaitEvent>) -> Self {
        self.events = events;
        self
    }
}

impl fmt::Display for WaitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "Timed out waiting for {} to {}", self.resource, self.goal)?;
        writeln!(f, "├─ Last state: {}", self.last_state)?;
        writeln!(f, "├─ Attempts: {}", self.attempts)?;
        writeln!(f, "├─ Elapsed: {:?}", self.elapsed)?;
        writeln!(f, "└─ Timeout: {:?}", self.timeout)?;

        if !self.events.is_empty() {
            writeln!(f)?;
            writeln!(f, "Recent events:")?;
            for (i, event) in self.events.iter().enumerate() {
                let prefix = if i == self.events.len() - 1 {
                    "└─"
                } else {
                    "├─"
                };
                let ts = event.timestamp.as_deref().unwrap_or("??:??:??");
                writeln!(f, "{} [{}] {}: {}", prefix, ts, event.reason, event.message)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for WaitError {}

/// Helper trait for extracting state description from K8s resources
pub trait ResourceState {
    /// Get a human-readable description of the resource's current state
    fn state_description(&self) -> String;
}

/// Phase of a pod, if the API server has reported one
pub fn pod_phase(pod: &Pod) -> Option<&str> {
    pod.status.as_ref().and_then(|s| s.phase.as_deref())
}

/// Exit code of a pod whose containers have all terminated
///
/// The first non-zero code wins. `None` while any container has not
/// terminated, or before the kubelet reported container statuses. The
/// phase can still read `Running` for a while after this is `Some`.
pub fn terminated_exit_code(pod: &Pod) -> Option<i32> {
    let statuses = pod.status.as_ref()?.container_statuses.as_ref()?;
    if statuses.is_empty() {
        return None;
    }

    let mut code = 0;
    for status in statuses {
        let terminated = status.state.as_ref()?.terminated.as_ref()?;
        if code == 0 {
            code = terminated.exit_code;
        }
    }
    Some(code)
}

impl ResourceState for Pod {
    fn state_description(&self) -> String {
        let phase = pod_phase(self).unwrap_or("Unknown");

        let containers = self
            .status
            .as_ref()
            .and_then(|s| s.container_statuses.as_ref());

        match containers {
            Some(statuses) => {
                let total = statuses.len();
                let ready = statuses.iter().filter(|c| c.ready).count();

                let waiting_reasons: Vec<&str> = statuses
                    .iter()
                    .filter_map(|c| {
                        c.state
                            .as_ref()
                            .and_then(|s| s.waiting.as_ref())
                            .and_then(|w| w.reason.as_deref())
                    })
                    .collect();

                if waiting_reasons.is_empty() {
                    format!("phase={}, containers {}/{} ready", phase, ready, total)
                } else {
                    format!(
                        "phase={}, containers {}/{} ready, waiting: {}",
                        phase,
                        ready,
                        total,
                        waiting_reasons.join(", ")
                    )
                }
            }
            None => format!("phase={}, no container status", phase),
        }
    }
}

impl ResourceState for ObjectList<Pod> {
    fn state_description(&self) -> String {
        if self.items.is_empty() {
            return "no pods".to_string();
        }

        let pods: Vec<String> = self
            .items
            .iter()
            .map(|pod| {
                let name = pod.metadata.name.as_deref().unwrap_or("<unnamed>");
                let terminating = if pod.metadata.deletion_timestamp.is_some() {
                    ", terminating"
                } else {
                    ""
                };
                format!(
                    "{} ({}{})",
                    name,
                    pod_phase(pod).unwrap_or("Unknown"),
                    terminating
                )
            })
            .collect();

        format!("{} pod(s) remaining: {}", pods.len(), pods.join(", "))
    }
}

impl ResourceState for Deployment {
    fn state_description(&self) -> String {
        let spec_replicas = self.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
        let ready = self
            .status
            .as_ref()
            .and_then(|s| s.ready_replicas)
            .unwrap_or(0);
        let unavailable = self
            .status
            .as_ref()
            .and_then(|s| s.unavailable_replicas)
            .unwrap_or(0);

        if unavailable > 0 {
            format!(
                "{}/{} ready, {} unavailable",
                ready, spec_replicas, unavailable
            )
        } else {
            format!("{}/{} ready", ready, spec_replicas)
        }
    }
}

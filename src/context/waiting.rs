use super::{Context, ContextError};
use crate::conditions::{poll_until, Outcome, WaitOptions};
use crate::wait::{pod_phase, terminated_exit_code, WaitError, WaitEvent};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Event, Pod};
use kube::api::ObjectList;
use tracing::{debug, info};

/// Number of events attached to a pod wait timeout
const MAX_EVENTS: usize = 10;

/// Whether a pod got past `Pending`
///
/// A pod that already finished counts: its logs can still be read.
pub fn has_started(pod: &Pod) -> bool {
    matches!(pod_phase(pod), Some("Running" | "Succeeded" | "Failed"))
}

/// Whether a pod is done, judged by its phase or by its containers
///
/// Containers report termination before the pod phase catches up.
pub fn has_finished(pod: &Pod) -> bool {
    matches!(pod_phase(pod), Some("Succeeded" | "Failed")) || terminated_exit_code(pod).is_some()
}

/// Whether a deployment has all requested replicas ready
pub fn deployment_ready(deployment: &Deployment) -> bool {
    let wanted = deployment
        .spec
        .as_ref()
        .and_then(|s| s.replicas)
        .unwrap_or(1);
    let ready = deployment
        .status
        .as_ref()
        .and_then(|s| s.ready_replicas)
        .unwrap_or(0);
    ready >= wanted
}

impl Context {
    /// Wait until no pod named `name` is listed in the run namespace
    pub async fn wait_pod_absent(
        &self,
        name: &str,
        options: &WaitOptions,
    ) -> Result<(), ContextError> {
        debug!(namespace = %self.namespace(), pod = %name, timeout = ?options.timeout, "Waiting for pod deletion");

        let outcome = poll_until(
            move || self.list_named::<Pod>(name),
            |pods: &ObjectList<Pod>| pods.items.is_empty(),
            options,
        )
        .await?;

        match outcome {
            Outcome::Ready { elapsed, .. } => {
                info!(pod = %name, elapsed = ?elapsed, "Pod is gone");
                Ok(())
            }
            timed_out => Err(WaitError::from_outcome(
                format!("pod/{name}"),
                "be deleted",
                options,
                &timed_out,
            )
            .into()),
        }
    }

    /// Wait until pod `name` has started (see [`has_started`])
    ///
    /// On timeout the error carries the pod's last state and recent events.
    pub async fn wait_pod_started(
        &self,
        name: &str,
        options: &WaitOptions,
    ) -> Result<Pod, ContextError> {
        debug!(namespace = %self.namespace(), pod = %name, timeout = ?options.timeout, "Waiting for pod to start");

        let outcome = poll_until(move || self.get::<Pod>(name), has_started, options).await?;

        match outcome {
            Outcome::Ready { value, elapsed, .. } => {
                info!(pod = %name, phase = ?pod_phase(&value), elapsed = ?elapsed, "Pod started");
                Ok(value)
            }
            timed_out => {
                let mut err = WaitError::from_outcome(
                    format!("pod/{name}"),
                    "start running",
                    options,
                    &timed_out,
                );
                if matches!(timed_out, Outcome::TimedOut { last: None, .. }) {
                    err = err.with_state("never found");
                }
                let events = self.recent_events(name).await;
                Err(err.with_events(events).into())
            }
        }
    }

    /// Wait until pod `name` has finished (see [`has_finished`])
    pub async fn wait_pod_finished(
        &self,
        name: &str,
        options: &WaitOptions,
    ) -> Result<Pod, ContextError> {
        debug!(namespace = %self.namespace(), pod = %name, timeout = ?options.timeout, "Waiting for pod to finish");

        let outcome = poll_until(move || self.get::<Pod>(name), has_finished, options).await?;

        match outcome {
            Outcome::Ready { value, elapsed, .. } => {
                info!(pod = %name, phase = ?pod_phase(&value), elapsed = ?elapsed, "Pod finished");
                Ok(value)
            }
            timed_out => Err(WaitError::from_outcome(
                format!("pod/{name}"),
                "finish",
                options,
                &timed_out,
            )
            .into()),
        }
    }

    /// Wait until deployment `name` reports all replicas ready
    pub async fn wait_deployment_ready(
        &self,
        name: &str,
        options: &WaitOptions,
    ) -> Result<Deployment, ContextError> {
        debug!(namespace = %self.namespace(), deployment = %name, timeout = ?options.timeout, "Waiting for deployment");

        let outcome = poll_until(
            move || self.get::<Deployment>(name),
            deployment_ready,
            options,
        )
        .await?;

        match outcome {
            Outcome::Ready { value, elapsed, .. } => {
                info!(deployment = %name, elapsed = ?elapsed, "Deployment ready");
                Ok(value)
            }
            timed_out => Err(WaitError::from_outcome(
                format!("deployment/{name}"),
                "become ready",
                options,
                &timed_out,
            )
            .into()),
        }
    }

    /// Latest events about `name`, oldest first; empty if they can't be read
    async fn recent_events(&self, name: &str) -> Vec<WaitEvent> {
        let fields = format!("involvedObject.name={name}");
        match self.list_with_fields::<Event>(&fields, name).await {
            Ok(list) => {
                let mut events = list.items;
                events.sort_by(|a, b| a.last_timestamp.cmp(&b.last_timestamp));
                let skip = events.len().saturating_sub(MAX_EVENTS);
                events.iter().skip(skip).map(WaitEvent::from).collect()
            }
            Err(e) => {
                debug!(pod = %name, error = %e, "Could not fetch events");
                Vec::new()
            }
        }
    }
}

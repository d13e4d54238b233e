// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Prometheus gauge families published by the pollers.
//!
//! Gauges are only ever set, never reset: a failed fetch simply leaves the
//! previous value in place until the next successful cycle.

use prometheus::{GaugeVec, Opts, Registry};

use crate::models::{EnterpriseRunner, QuotaSnapshot, Workflow, WorkflowUsage};

/// Billable seconds per workflow and OS bucket.
pub const WORKFLOW_USAGE_SECONDS: &str = "github_workflow_usage_seconds";
/// Remaining API calls for the credential.
pub const REMAINING_LIMITS: &str = "github_remaining_limits";
/// Online status of enterprise runners.
pub const RUNNER_ENTERPRISE_STATUS: &str = "github_runner_enterprise_status";

/// Shared metric sink written by every poller.
#[derive(Debug, Clone,)]
pub struct ExporterMetrics
{
    workflow_usage:   GaugeVec,
    remaining_limits: GaugeVec,
    runner_status:    GaugeVec,
    credential_label: Option<String,>,
}

impl ExporterMetrics
{
    /// Creates the gauge families and registers them with `registry`.
    ///
    /// When `credential_label` is set, the remaining-limits family carries an
    /// extra `app_id` label with that value; it must already be hashed.
    ///
    /// # Errors
    ///
    /// Returns the registry error when a family is already registered.
    pub fn register(registry: &Registry, credential_label: Option<String,>,) -> Result<Self, prometheus::Error,>
    {
        let workflow_usage = GaugeVec::new(
            Opts::new(
                WORKFLOW_USAGE_SECONDS,
                "Number of billable seconds used by a specific workflow during the current billing cycle. \
                 Any job re-runs are also included in the usage. Only apply to workflows in private \
                 repositories that use GitHub-hosted runners.",
            ),
            &["repo", "id", "node_id", "name", "state", "os",],
        )?;
        let quota_labels: &[&str] =
            if credential_label.is_some() { &["app_id", "type",] } else { &["type",] };
        let remaining_limits = GaugeVec::new(Opts::new(REMAINING_LIMITS, "remaining limits",), quota_labels,)?;
        let runner_status =
            GaugeVec::new(Opts::new(RUNNER_ENTERPRISE_STATUS, "runner status",), &["os", "name", "id",],)?;

        registry.register(Box::new(workflow_usage.clone(),),)?;
        registry.register(Box::new(remaining_limits.clone(),),)?;
        registry.register(Box::new(runner_status.clone(),),)?;

        Ok(Self {
            workflow_usage,
            remaining_limits,
            runner_status,
            credential_label,
        },)
    }

    /// Publishes the three OS buckets of `usage` for `workflow`.
    pub fn record_workflow_usage(&self, workflow: &Workflow, usage: &WorkflowUsage,)
    {
        let id = workflow.id.to_string();
        for (bucket, seconds,) in usage.seconds() {
            self.workflow_usage
                .with_label_values(&[
                    workflow.repository.as_str(),
                    id.as_str(),
                    workflow.node_id.as_str(),
                    workflow.name.as_str(),
                    workflow.state.as_str(),
                    bucket.as_label(),
                ],)
                .set(seconds,);
        }
    }

    /// Publishes the remaining-call counters of `snapshot`.
    pub fn record_quota(&self, snapshot: &QuotaSnapshot,)
    {
        for (kind, remaining,) in snapshot.entries() {
            let gauge = match self.credential_label.as_deref() {
                Some(credential,) => self.remaining_limits.with_label_values(&[credential, kind,],),
                None => self.remaining_limits.with_label_values(&[kind,],),
            };
            gauge.set(remaining as f64,);
        }
    }

    /// Publishes the online status of `runner`.
    pub fn record_runner(&self, runner: &EnterpriseRunner,)
    {
        let id = runner.id.to_string();
        self.runner_status
            .with_label_values(&[runner.os.as_str(), runner.name.as_str(), id.as_str(),],)
            .set(runner.status_value(),);
    }

    /// Current value of a workflow usage gauge, when it has been set.
    pub fn workflow_usage_seconds(&self, repository: &str, workflow_id: u64, bucket: &str,) -> Option<f64,>
    {
        self.find(WORKFLOW_USAGE_SECONDS, &[("repo", repository,), ("id", &workflow_id.to_string(),), ("os", bucket,),],)
    }

    /// Current value of a remaining-limits gauge, when it has been set.
    pub fn remaining(&self, kind: &str,) -> Option<f64,>
    {
        self.find(REMAINING_LIMITS, &[("type", kind,)],)
    }

    /// Current value of a runner status gauge, when it has been set.
    pub fn runner_status(&self, runner_id: u64,) -> Option<f64,>
    {
        self.find(RUNNER_ENTERPRISE_STATUS, &[("id", &runner_id.to_string(),)],)
    }

    fn find(&self, family: &str, labels: &[(&str, &str,)],) -> Option<f64,>
    {
        let vec = match family {
            WORKFLOW_USAGE_SECONDS => &self.workflow_usage,
            REMAINING_LIMITS => &self.remaining_limits,
            _ => &self.runner_status,
        };
        prometheus::core::Collector::collect(vec,)
            .into_iter()
            .flat_map(|family| family.get_metric().to_vec(),)
            .find(|metric| {
                labels.iter().all(|(name, value,)| {
                    metric.get_label().iter().any(|pair| pair.get_name() == *name && pair.get_value() == *value,)
                },)
            },)
            .map(|metric| metric.get_gauge().get_value(),)
    }
}

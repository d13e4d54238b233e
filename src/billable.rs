// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Billable-usage poller for every discovered workflow.

use std::{sync::Arc, time::Duration};

use tracing::{debug, info, warn};

use crate::{
    api::GitHubApi,
    discover::DiscoveryReader,
    error::FetchError,
    metrics::ExporterMetrics,
    retry::RateLimitedExecutor,
    schedule::pause,
};

/// Periodically publishes `github_workflow_usage_seconds`.
pub struct BillablePoller
{
    api:      Arc<dyn GitHubApi,>,
    executor: RateLimitedExecutor,
    reader:   DiscoveryReader,
    metrics:  ExporterMetrics,
    interval: Duration,
}

impl std::fmt::Debug for BillablePoller
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_,>,) -> std::fmt::Result
    {
        f.debug_struct("BillablePoller",).field("interval", &self.interval,).finish_non_exhaustive()
    }
}

impl BillablePoller
{
    /// Creates a poller publishing usage for the repositories `reader` exposes
    /// once every `interval`.
    pub fn new(
        api: Arc<dyn GitHubApi,>,
        executor: RateLimitedExecutor,
        reader: DiscoveryReader,
        metrics: ExporterMetrics,
        interval: Duration,
    ) -> Self
    {
        Self {
            api,
            executor,
            reader,
            metrics,
            interval,
        }
    }

    /// Runs usage cycles until shutdown.
    pub async fn run(self,)
    {
        info!("Billable usage loop started (interval: {:?})", self.interval);
        loop {
            self.poll_once().await;
            if pause(self.executor.shutdown(), self.interval,).await.is_cancelled() {
                break;
            }
        }
        info!("Billable usage loop stopped");
    }

    /// Fetches and publishes usage for the snapshot current at call time.
    ///
    /// The snapshot is taken once, so a discovery publish during the cycle
    /// only takes effect on the next one. Returns the number of workflows
    /// whose gauges were updated.
    pub async fn poll_once(&self,) -> usize
    {
        let snapshot = self.reader.snapshot();
        if snapshot.is_empty() {
            debug!("No workflows discovered yet, nothing to poll");
            return 0;
        }

        let mut published = 0;
        for (repository, workflow,) in snapshot.iter_workflows() {
            let result = self
                .executor
                .execute("GetWorkflowUsage", || self.api.workflow_usage(repository, workflow.id,),)
                .await;
            match result {
                Ok(usage,) => {
                    self.metrics.record_workflow_usage(workflow, &usage,);
                    published += 1;
                }
                Err(FetchError::Cancelled,) => {
                    debug!("Billable usage cycle interrupted by shutdown");
                    return published;
                }
                Err(error,) => {
                    warn!("Skipping usage of workflow {} in {}: {}", workflow.id, repository, error);
                }
            }
        }

        info!("Updated billable usage for {} of {} workflows", published, snapshot.workflow_count());
        published
    }
}

// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Online status of self-hosted runners registered at the enterprise level.

use std::{sync::Arc, time::Duration};

use tracing::{debug, info, warn};

use crate::{
    api::{DEFAULT_PER_PAGE, GitHubApi},
    metrics::ExporterMetrics,
    paginate::walk_pages,
    retry::RateLimitedExecutor,
    schedule::pause,
};

/// Periodically publishes `github_runner_enterprise_status`.
pub struct RunnerPoller
{
    api:        Arc<dyn GitHubApi,>,
    executor:   RateLimitedExecutor,
    enterprise: String,
    metrics:    ExporterMetrics,
    interval:   Duration,
}

impl std::fmt::Debug for RunnerPoller
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_,>,) -> std::fmt::Result
    {
        f.debug_struct("RunnerPoller",)
            .field("enterprise", &self.enterprise,)
            .field("interval", &self.interval,)
            .finish_non_exhaustive()
    }
}

impl RunnerPoller
{
    /// Creates a poller for the runners of `enterprise`. An empty slug leaves
    /// the poller idle.
    pub fn new(
        api: Arc<dyn GitHubApi,>,
        executor: RateLimitedExecutor,
        enterprise: impl Into<String,>,
        metrics: ExporterMetrics,
        interval: Duration,
    ) -> Self
    {
        Self {
            api,
            executor,
            enterprise: enterprise.into(),
            metrics,
            interval,
        }
    }

    /// Runs runner polls until shutdown.
    ///
    /// Returns immediately, without any request, when no enterprise is
    /// configured.
    pub async fn run(self,)
    {
        if self.enterprise.is_empty() {
            debug!("No enterprise configured, runner status polling disabled");
            return;
        }

        info!("Enterprise runner loop started for {} (interval: {:?})", self.enterprise, self.interval);
        loop {
            self.poll_once().await;
            if pause(self.executor.shutdown(), self.interval,).await.is_cancelled() {
                break;
            }
        }
        info!("Enterprise runner loop stopped");
    }

    /// Lists every runner and publishes its status.
    ///
    /// Returns the number of runners published; an incomplete listing
    /// publishes nothing.
    pub async fn poll_once(&self,) -> usize
    {
        if self.enterprise.is_empty() {
            return 0;
        }

        let walk = walk_pages(&self.executor, "ListRunnersForEnterprise", DEFAULT_PER_PAGE, |page| {
            self.api.list_enterprise_runners(&self.enterprise, page,)
        },)
        .await;
        if !walk.complete {
            warn!(
                "Runner listing for {} incomplete after {} runners, skipping this cycle",
                self.enterprise,
                walk.items.len()
            );
            return 0;
        }

        for runner in &walk.items {
            self.metrics.record_runner(runner,);
        }
        debug!("Published status of {} runners for {}", walk.items.len(), self.enterprise);
        walk.items.len()
    }
}

#[cfg(test)]
mod tests
{
    use prometheus::Registry;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::{
        error::FetchError,
        fake::{ApiCall, ScriptedApi},
        models::{EnterpriseRunner, Page},
        retry::RetryPolicy,
    };

    fn runner(id: u64, status: &str,) -> EnterpriseRunner
    {
        EnterpriseRunner {
            id,
            name: format!("runner-{id}"),
            os: "linux".to_owned(),
            status: status.to_owned(),
        }
    }

    fn poller(api: Arc<ScriptedApi,>, enterprise: &str,) -> (RunnerPoller, ExporterMetrics,)
    {
        let metrics = ExporterMetrics::register(&Registry::new(), None,).expect("register",);
        let executor = RateLimitedExecutor::new(RetryPolicy::default(), CancellationToken::new(),);
        let poller = RunnerPoller::new(api, executor, enterprise, metrics.clone(), Duration::from_secs(30,),);
        (poller, metrics,)
    }

    #[tokio::test]
    async fn empty_enterprise_issues_no_requests()
    {
        let api = Arc::new(ScriptedApi::default(),);
        let (poller, _,) = poller(api.clone(), "",);

        poller.run().await;

        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn runners_across_pages_are_published()
    {
        let api = Arc::new(ScriptedApi::default(),);
        api.push_runners("acme-ent", 1, Ok(Page {
            items: vec![runner(1, "online",)], next_page: 2,
        },),);
        api.push_runners("acme-ent", 2, Ok(Page::last(vec![runner(2, "offline",)],),),);
        let (poller, metrics,) = poller(api.clone(), "acme-ent",);

        assert_eq!(poller.poll_once().await, 2);
        assert_eq!(metrics.runner_status(1,), Some(1.0));
        assert_eq!(metrics.runner_status(2,), Some(0.0));
        assert_eq!(api.calls(), [
            ApiCall::Runners("acme-ent".to_owned(), 1,),
            ApiCall::Runners("acme-ent".to_owned(), 2,),
        ]);
    }

    #[tokio::test]
    async fn incomplete_listing_publishes_nothing()
    {
        let api = Arc::new(ScriptedApi::default(),);
        api.push_runners("acme-ent", 1, Ok(Page {
            items: vec![runner(1, "online",)], next_page: 2,
        },),);
        api.push_runners("acme-ent", 2, Err(FetchError::Status {
            status: 500, message: "boom".to_owned(),
        },),);
        let (poller, metrics,) = poller(api, "acme-ent",);

        assert_eq!(poller.poll_once().await, 0);
        assert_eq!(metrics.runner_status(1,), None);
    }
}

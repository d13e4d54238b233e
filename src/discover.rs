// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Discovers the repositories and workflows worth polling.
//!
//! A discovery cycle builds a complete [`DiscoverySnapshot`] off to the side
//! and publishes it through a single-writer, multi-reader handoff. Readers
//! grab an `Arc` to the current snapshot once per cycle and are never exposed
//! to a half-built one.

use std::{
    collections::BTreeMap,
    sync::Arc,
    time::Duration,
};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    api::{DEFAULT_PER_PAGE, GitHubApi},
    error::FetchError,
    models::Workflow,
    paginate::walk_pages,
    retry::RateLimitedExecutor,
    schedule::pause,
};

/// Immutable result of one discovery cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq,)]
pub struct DiscoverySnapshot
{
    repo_counts:               BTreeMap<String, u64,>,
    organization_repositories: BTreeMap<String, Vec<String,>,>,
    workflows:                 BTreeMap<String, BTreeMap<u64, Workflow,>,>,
}

impl DiscoverySnapshot
{
    /// Aggregate repository count recorded for `organization`.
    pub fn repo_count(&self, organization: &str,) -> Option<u64,>
    {
        self.repo_counts.get(organization,).copied()
    }

    /// Candidate repositories recorded for `organization`.
    pub fn organization_repositories(&self, organization: &str,) -> Option<&[String],>
    {
        self.organization_repositories.get(organization,).map(Vec::as_slice,)
    }

    /// Workflows known for the `owner/name` repository.
    pub fn workflows(&self, repository: &str,) -> Option<&BTreeMap<u64, Workflow,>,>
    {
        self.workflows.get(repository,)
    }

    /// Repositories in the active set, in name order.
    pub fn active_repositories(&self,) -> impl Iterator<Item = &str,> + '_
    {
        self.workflows.keys().map(String::as_str,)
    }

    /// Every `(repository, workflow)` pair in the active set.
    pub fn iter_workflows(&self,) -> impl Iterator<Item = (&str, &Workflow,),> + '_
    {
        self.workflows
            .iter()
            .flat_map(|(repository, workflows,)| {
                workflows.values().map(move |workflow| (repository.as_str(), workflow,),)
            },)
    }

    /// Number of repositories in the active set.
    pub fn repository_count(&self,) -> usize
    {
        self.workflows.len()
    }

    /// Number of workflows across the active set.
    pub fn workflow_count(&self,) -> usize
    {
        self.workflows.values().map(BTreeMap::len,).sum()
    }

    /// `true` before the first discovery cycle or when nothing qualified.
    pub fn is_empty(&self,) -> bool
    {
        self.workflows.is_empty()
    }
}

/// Accumulates a [`DiscoverySnapshot`] during a cycle.
#[derive(Debug, Default,)]
pub struct SnapshotBuilder
{
    snapshot: DiscoverySnapshot,
}

impl SnapshotBuilder
{
    /// Records the aggregate repository count of `organization`.
    pub fn repo_count(&mut self, organization: &str, count: u64,) -> &mut Self
    {
        self.snapshot.repo_counts.insert(organization.to_owned(), count,);
        self
    }

    /// Records the candidate repositories of `organization`.
    pub fn organization_repositories(&mut self, organization: &str, repositories: Vec<String,>,) -> &mut Self
    {
        self.snapshot.organization_repositories.insert(organization.to_owned(), repositories,);
        self
    }

    /// Adds `repository` to the active set. Repositories without workflows
    /// are ignored.
    pub fn workflows(&mut self, repository: &str, workflows: Vec<Workflow,>,) -> &mut Self
    {
        if workflows.is_empty() {
            return self;
        }
        let by_id = workflows.into_iter().map(|workflow| (workflow.id, workflow,),).collect();
        self.snapshot.workflows.insert(repository.to_owned(), by_id,);
        self
    }

    /// Finishes the snapshot.
    pub fn build(self,) -> DiscoverySnapshot
    {
        self.snapshot
    }
}

/// Creates the discovery handoff, seeded with an empty snapshot.
pub fn discovery_cache() -> (DiscoveryPublisher, DiscoveryReader,)
{
    let (sender, receiver,) = watch::channel(Arc::new(DiscoverySnapshot::default(),),);
    (
        DiscoveryPublisher {
            sender,
        },
        DiscoveryReader {
            receiver,
        },
    )
}

/// Write side of the discovery handoff, owned by the discovery loop.
#[derive(Debug,)]
pub struct DiscoveryPublisher
{
    sender: watch::Sender<Arc<DiscoverySnapshot,>,>,
}

impl DiscoveryPublisher
{
    /// Snapshot most recently published.
    pub fn current(&self,) -> Arc<DiscoverySnapshot,>
    {
        self.sender.borrow().clone()
    }

    /// Replaces the published snapshot in one swap.
    pub fn publish(&self, snapshot: DiscoverySnapshot,) -> Arc<DiscoverySnapshot,>
    {
        let snapshot = Arc::new(snapshot,);
        self.sender.send_replace(snapshot.clone(),);
        snapshot
    }
}

/// Read side of the discovery handoff.
#[derive(Debug, Clone,)]
pub struct DiscoveryReader
{
    receiver: watch::Receiver<Arc<DiscoverySnapshot,>,>,
}

impl DiscoveryReader
{
    /// Snapshot published most recently; stays valid for as long as the
    /// caller holds it, regardless of later publications.
    pub fn snapshot(&self,) -> Arc<DiscoverySnapshot,>
    {
        self.receiver.borrow().clone()
    }
}

/// Where candidate repositories come from.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub enum RepositorySource
{
    /// Explicit `owner/name` list; organizations are ignored.
    Static(Vec<String,>,),
    /// Every monitorable repository of these organizations.
    Organizations(Vec<String,>,),
}

/// Result of comparing an organization's repository count with the previous
/// cycle.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub enum OrganizationChange
{
    /// Count unchanged: reuse the repositories discovered last time.
    Unchanged(Vec<String,>,),
    /// Count changed, unknown, or never listed: list everything again.
    Changed,
}

/// Decides whether `organization` needs a full repository listing.
///
/// Only the aggregate count is compared, so a repository removed and another
/// added within the same cycle goes unnoticed until the count moves.
pub fn detect_organization_change(
    previous: &DiscoverySnapshot,
    organization: &str,
    current_count: Option<u64,>,
) -> OrganizationChange
{
    match (previous.repo_count(organization,), current_count, previous.organization_repositories(organization,),) {
        (Some(before,), Some(now,), Some(repositories,),) if before == now => {
            OrganizationChange::Unchanged(repositories.to_vec(),)
        }
        _ => OrganizationChange::Changed,
    }
}

/// Periodic rebuild of the discovery snapshot.
pub struct Discovery
{
    api:       Arc<dyn GitHubApi,>,
    executor:  RateLimitedExecutor,
    source:    RepositorySource,
    publisher: DiscoveryPublisher,
    interval:  Duration,
}

impl std::fmt::Debug for Discovery
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_,>,) -> std::fmt::Result
    {
        f.debug_struct("Discovery",)
            .field("source", &self.source,)
            .field("interval", &self.interval,)
            .finish_non_exhaustive()
    }
}

impl Discovery
{
    /// Creates the discovery loop.
    pub fn new(
        api: Arc<dyn GitHubApi,>,
        executor: RateLimitedExecutor,
        source: RepositorySource,
        publisher: DiscoveryPublisher,
        interval: Duration,
    ) -> Self
    {
        Self {
            api,
            executor,
            source,
            publisher,
            interval,
        }
    }

    /// Runs discovery cycles until shutdown.
    pub async fn run(self,)
    {
        info!("Discovery loop started (interval: {:?})", self.interval);
        loop {
            self.run_cycle().await;
            if pause(self.executor.shutdown(), self.interval,).await.is_cancelled() {
                break;
            }
        }
        info!("Discovery loop stopped");
    }

    /// Builds and publishes one snapshot.
    ///
    /// Returns `None`, leaving the previous snapshot in place, when shutdown
    /// interrupts the cycle.
    pub async fn run_cycle(&self,) -> Option<Arc<DiscoverySnapshot,>,>
    {
        let previous = self.publisher.current();
        let mut builder = SnapshotBuilder::default();

        let candidates = match &self.source {
            RepositorySource::Static(repositories,) => repositories.clone(),
            RepositorySource::Organizations(organizations,) => {
                let mut candidates = Vec::new();
                for organization in organizations {
                    candidates.extend(self.organization_candidates(&previous, organization, &mut builder,).await,);
                }
                candidates
            }
        };

        for repository in &candidates {
            if self.executor.shutdown().is_cancelled() {
                break;
            }
            let walk = walk_pages(&self.executor, "ListWorkflows", DEFAULT_PER_PAGE, |page| {
                self.api.list_workflows(repository, page,)
            },)
            .await;
            if walk.items.is_empty() {
                debug!("Dropping repository {} without workflows", repository);
                continue;
            }
            debug!("Fetched {} workflows for repository {}", walk.items.len(), repository);
            builder.workflows(repository, walk.items,);
        }

        if self.executor.shutdown().is_cancelled() {
            debug!("Discovery cycle interrupted by shutdown; keeping previous snapshot");
            return None;
        }

        let snapshot = self.publisher.publish(builder.build(),);
        info!(
            "Discovered {} workflows across {} repositories",
            snapshot.workflow_count(),
            snapshot.repository_count()
        );
        Some(snapshot,)
    }

    async fn organization_candidates(
        &self,
        previous: &DiscoverySnapshot,
        organization: &str,
        builder: &mut SnapshotBuilder,
    ) -> Vec<String,>
    {
        let current_count = match self
            .executor
            .execute("Organizations.Get", || self.api.organization_repo_count(organization,),)
            .await
        {
            Ok(count,) => Some(count,),
            Err(FetchError::Cancelled,) => return Vec::new(),
            Err(_,) => None,
        };

        // The count is only recorded next to a complete repository set, so a
        // partial listing is listed again on the next cycle.
        let (repositories, complete,) = match detect_organization_change(previous, organization, current_count,) {
            OrganizationChange::Unchanged(repositories,) => {
                info!(
                    "Skipping repository listing for {}, repo count unchanged at {}",
                    organization,
                    current_count.unwrap_or_default()
                );
                (repositories, true,)
            }
            OrganizationChange::Changed => {
                let walk = walk_pages(&self.executor, "ListByOrg", DEFAULT_PER_PAGE, |page| {
                    self.api.list_organization_repositories(organization, page,)
                },)
                .await;
                if !walk.complete {
                    warn!(
                        "Repository listing for {} incomplete, continuing with {} repositories",
                        organization,
                        walk.items.len()
                    );
                }
                let repositories = walk
                    .items
                    .into_iter()
                    .filter(|repository| {
                        let keep = repository.is_monitorable();
                        if !keep {
                            debug!("Skipping archived or disabled repository {}", repository.full_name);
                        }
                        keep
                    },)
                    .map(|repository| repository.full_name,)
                    .collect();
                (repositories, walk.complete,)
            }
        };

        if let (Some(count,), true,) = (current_count, complete,) {
            builder.repo_count(organization, count,);
        }
        builder.organization_repositories(organization, repositories.clone(),);
        repositories
    }
}

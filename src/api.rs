// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Boundary between the pollers and the GitHub REST API.
//!
//! Each method issues exactly one HTTP request and reports failures as a
//! classified [`FetchError`]. Retrying, pagination, and scheduling are layered
//! on top by [`crate::retry`], [`crate::paginate`], and the pollers.

use async_trait::async_trait;

use crate::{
    error::FetchError,
    models::{EnterpriseRunner, Page, PageRequest, QuotaSnapshot, Repository, Workflow, WorkflowUsage},
};

/// Page size used for every paginated listing.
pub const DEFAULT_PER_PAGE: u32 = 100;

/// Single-request operations the exporter needs from GitHub.
#[async_trait]
pub trait GitHubApi: Send + Sync
{
    /// Aggregate repository count of an organization: public, total private
    /// and owned private repositories added together.
    async fn organization_repo_count(&self, organization: &str,) -> Result<u64, FetchError,>;

    /// One page of the repositories owned by `organization`.
    async fn list_organization_repositories(
        &self,
        organization: &str,
        page: PageRequest,
    ) -> Result<Page<Repository,>, FetchError,>;

    /// One page of workflow definitions for the `owner/name` repository.
    async fn list_workflows(
        &self,
        repository: &str,
        page: PageRequest,
    ) -> Result<Page<Workflow,>, FetchError,>;

    /// Billable usage of one workflow for the current billing cycle.
    async fn workflow_usage(
        &self,
        repository: &str,
        workflow_id: u64,
    ) -> Result<WorkflowUsage, FetchError,>;

    /// Remaining-call counters for the authenticated credential.
    async fn rate_limits(&self,) -> Result<QuotaSnapshot, FetchError,>;

    /// One page of self-hosted runners registered for `enterprise`.
    async fn list_enterprise_runners(
        &self,
        enterprise: &str,
        page: PageRequest,
    ) -> Result<Page<EnterpriseRunner,>, FetchError,>;
}

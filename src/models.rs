// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Domain entities fetched from GitHub on every cycle.
//!
//! Nothing here outlives a process: the values are rebuilt from the API on
//! each discovery or polling cycle and only their gauge projections are kept.

use serde::{Deserialize, Serialize};

/// Repository candidate returned by an organization listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
pub struct Repository
{
    /// Full `owner/name` identifier.
    pub full_name:    String,
    /// Login of the owning organization.
    pub organization: String,
    /// Whether the repository is archived.
    pub archived:     bool,
    /// Whether the repository is disabled.
    pub disabled:     bool,
}

impl Repository
{
    /// Archived and disabled repositories are never monitored.
    pub fn is_monitorable(&self,) -> bool
    {
        !self.archived && !self.disabled
    }
}

/// Workflow definition discovered for a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
pub struct Workflow
{
    /// Numeric identifier, unique within the repository.
    pub id:         u64,
    /// Opaque global node identifier.
    pub node_id:    String,
    /// Display name of the workflow.
    pub name:       String,
    /// Lifecycle state such as `active` or `disabled_manually`.
    pub state:      String,
    /// Full name of the owning repository.
    pub repository: String,
}

/// Operating system bucket used by the billing API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,)]
pub enum OsBucket
{
    /// macOS hosted runners.
    MacOs,
    /// Windows hosted runners.
    Windows,
    /// Ubuntu hosted runners.
    Ubuntu,
}

impl OsBucket
{
    /// Every bucket in the order gauges are published.
    pub const ALL: [Self; 3] = [Self::MacOs, Self::Windows, Self::Ubuntu,];

    /// Label value exported for the bucket.
    pub fn as_label(self,) -> &'static str
    {
        match self {
            Self::MacOs => "MACOS",
            Self::Windows => "WINDOWS",
            Self::Ubuntu => "UBUNTU",
        }
    }
}

/// Billable milliseconds per OS bucket for one workflow in the current
/// billing cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq,)]
pub struct WorkflowUsage
{
    /// Billable milliseconds on macOS runners.
    pub macos_ms:   u64,
    /// Billable milliseconds on Windows runners.
    pub windows_ms: u64,
    /// Billable milliseconds on Ubuntu runners.
    pub ubuntu_ms:  u64,
}

impl WorkflowUsage
{
    /// Billable milliseconds recorded for `bucket`.
    pub fn milliseconds(&self, bucket: OsBucket,) -> u64
    {
        match bucket {
            OsBucket::MacOs => self.macos_ms,
            OsBucket::Windows => self.windows_ms,
            OsBucket::Ubuntu => self.ubuntu_ms,
        }
    }

    /// Billable seconds for every bucket, in [`OsBucket::ALL`] order.
    pub fn seconds(&self,) -> [(OsBucket, f64,); 3]
    {
        OsBucket::ALL.map(|bucket| (bucket, billable_seconds(self.milliseconds(bucket,),),),)
    }
}

/// Converts billable milliseconds to seconds without rounding.
pub fn billable_seconds(milliseconds: u64,) -> f64
{
    milliseconds as f64 / 1000.0
}

/// Remaining-call counters for the active credential.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq,)]
pub struct QuotaSnapshot
{
    /// Remaining REST core calls.
    pub core:    u64,
    /// Remaining search calls.
    pub search:  u64,
    /// Remaining GraphQL calls.
    pub graphql: u64,
}

impl QuotaSnapshot
{
    /// Counters paired with their exported `type` label.
    pub fn entries(&self,) -> [(&'static str, u64,); 3]
    {
        [("core", self.core,), ("search", self.search,), ("graphql", self.graphql,),]
    }
}

/// Self-hosted runner registered at enterprise scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
pub struct EnterpriseRunner
{
    /// Runner identifier.
    pub id:     u64,
    /// Runner name.
    pub name:   String,
    /// Operating system reported by the runner.
    pub os:     String,
    /// Connection status, `online` when reachable.
    pub status: String,
}

impl EnterpriseRunner
{
    /// Gauge value: `1.0` when online, `0.0` otherwise.
    pub fn status_value(&self,) -> f64
    {
        if self.status == "online" { 1.0 } else { 0.0 }
    }
}

/// One page of a list endpoint together with the next-page cursor.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub struct Page<T,>
{
    /// Items carried by this page.
    pub items:     Vec<T,>,
    /// Next page number, or [`Page::LAST`] when the listing is exhausted.
    pub next_page: u32,
}

impl<T,> Page<T,>
{
    /// Cursor value meaning "no next page".
    pub const LAST: u32 = 0;

    /// Builds a page that terminates the walk.
    pub fn last(items: Vec<T,>,) -> Self
    {
        Self {
            items,
            next_page: Self::LAST,
        }
    }
}

/// Page number and size requested from a list endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash,)]
pub struct PageRequest
{
    /// One-based page number.
    pub page:     u32,
    /// Items per page.
    pub per_page: u32,
}

// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Prometheus exporter for GitHub Actions.
//!
//! The crate polls the GitHub REST API for the billable usage of every
//! workflow in the monitored repositories, the API quota left for the
//! exporter's own credential, and the online status of enterprise runners,
//! and publishes the results as gauges:
//!
//! - `github_workflow_usage_seconds{repo, id, node_id, name, state, os}`
//! - `github_remaining_limits{[app_id], type}`
//! - `github_runner_enterprise_status{os, name, id}`
//!
//! Every request goes through [`RateLimitedExecutor`], which waits out
//! primary and secondary rate limits instead of failing. Repository and
//! workflow discovery runs on its own loop and hands an immutable
//! [`DiscoverySnapshot`] to the usage poller.

mod api;
mod billable;
mod client;
mod config;
mod discover;
mod error;
#[cfg(test)]
mod fake;
pub mod logging;
mod metrics;
mod models;
mod paginate;
mod quota;
mod retry;
mod runners;
mod schedule;
mod server;

pub use api::{DEFAULT_PER_PAGE, GitHubApi};
pub use billable::BillablePoller;
pub use client::{DEFAULT_API_URL, OctocrabApi, build_client, classify_response, parse_next_page};
pub use config::{
    DEFAULT_LISTEN_ADDRESS, DEFAULT_METRICS_PATH, DEFAULT_REFRESH_SECONDS, ExporterConfig, Settings,
    SettingsOverrides, load_config, parse_config,
};
pub use discover::{
    Discovery, DiscoveryPublisher, DiscoveryReader, DiscoverySnapshot, OrganizationChange, RepositorySource,
    SnapshotBuilder, detect_organization_change, discovery_cache,
};
pub use error::{Error, FetchError, io_error, retry_after_seconds, server_error};
pub use metrics::{ExporterMetrics, REMAINING_LIMITS, RUNNER_ENTERPRISE_STATUS, WORKFLOW_USAGE_SECONDS};
pub use models::{
    EnterpriseRunner, OsBucket, Page, PageRequest, QuotaSnapshot, Repository, Workflow, WorkflowUsage,
    billable_seconds,
};
pub use paginate::{PageWalk, walk_pages};
pub use quota::{DEFAULT_MAX_MULTIPLIER, DEFAULT_QUOTA_INTERVAL, JITTER_UNIT, QuotaMonitor, hash_credential};
pub use retry::{RateLimitedExecutor, RetryDecision, RetryPolicy};
pub use runners::RunnerPoller;
pub use schedule::{Pause, pause};
pub use server::{bind, router, serve};

// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! [`GitHubApi`] implementation backed by an authenticated [`Octocrab`]
//! client.
//!
//! Requests go through octocrab's raw `_get` so the status code and headers
//! stay available: throttling is recognised from `x-ratelimit-*`,
//! `Retry-After`, and the error payload, and the next-page cursor comes from
//! the `Link` header.

use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use http::{HeaderMap, StatusCode, header};
use octocrab::Octocrab;
use regex::Regex;
use serde::{Deserialize, de::DeserializeOwned};
use tracing::debug;

use crate::{
    api::GitHubApi,
    error::{Error, FetchError},
    models::{EnterpriseRunner, Page, PageRequest, QuotaSnapshot, Repository, Workflow, WorkflowUsage},
};

/// Public GitHub API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

static PAGE_PARAMETER: LazyLock<Regex,> =
    LazyLock::new(|| Regex::new(r"[?&]page=(\d+)",).expect("valid page parameter pattern",),);

/// Builds an authenticated octocrab client for `api_url`.
///
/// # Errors
///
/// Returns [`Error::Client`] when the base URL is invalid or the client cannot
/// be constructed.
pub fn build_client(token: &str, api_url: &str,) -> Result<Octocrab, Error,>
{
    Octocrab::builder()
        .personal_token(token.to_owned(),)
        .base_uri(api_url,)
        .map_err(|e| Error::client(format!("invalid API URL {api_url}: {e}"),),)?
        .build()
        .map_err(|e| Error::client(e.to_string(),),)
}

/// GitHub REST API accessed through octocrab.
#[derive(Debug, Clone,)]
pub struct OctocrabApi
{
    client: Octocrab,
}

impl OctocrabApi
{
    /// Wraps an already authenticated client.
    pub fn new(client: Octocrab,) -> Self
    {
        Self {
            client,
        }
    }

    async fn get_json<T: DeserializeOwned,>(&self, route: String,) -> Result<(T, HeaderMap,), FetchError,>
    {
        debug!("GET {route}");
        let response = self.client._get(route,).await.map_err(|e| FetchError::transport(e.to_string(),),)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = self
            .client
            .body_to_string(response,)
            .await
            .map_err(|e| FetchError::transport(e.to_string(),),)?;

        if !status.is_success() {
            return Err(classify_response(status, &headers, &body,),);
        }

        let value = serde_json::from_str(&body,).map_err(|e| FetchError::decode(e.to_string(),),)?;
        Ok((value, headers,),)
    }

    async fn get_page<T: DeserializeOwned,>(
        &self,
        route: &str,
        page: PageRequest,
    ) -> Result<(T, u32,), FetchError,>
    {
        let separator = if route.contains('?',) { '&' } else { '?' };
        let (value, headers,) = self
            .get_json(format!("{route}{separator}per_page={}&page={}", page.per_page, page.page),)
            .await?;
        let next_page = headers
            .get(header::LINK,)
            .and_then(|value| value.to_str().ok(),)
            .map_or(Page::<T,>::LAST, parse_next_page,);
        Ok((value, next_page,),)
    }
}

#[async_trait]
impl GitHubApi for OctocrabApi
{
    async fn organization_repo_count(&self, organization: &str,) -> Result<u64, FetchError,>
    {
        let (org, _,): (OrganizationPayload, _,) = self.get_json(format!("/orgs/{organization}"),).await?;
        Ok(org.public_repos + org.total_private_repos + org.owned_private_repos,)
    }

    async fn list_organization_repositories(
        &self,
        organization: &str,
        page: PageRequest,
    ) -> Result<Page<Repository,>, FetchError,>
    {
        let (repositories, next_page,): (Vec<RepositoryPayload,>, _,) =
            self.get_page(&format!("/orgs/{organization}/repos"), page,).await?;
        let items = repositories
            .into_iter()
            .map(|repo| Repository {
                full_name:    repo.full_name,
                organization: repo.owner.login,
                archived:     repo.archived,
                disabled:     repo.disabled,
            },)
            .collect();
        Ok(Page {
            items,
            next_page,
        },)
    }

    async fn list_workflows(
        &self,
        repository: &str,
        page: PageRequest,
    ) -> Result<Page<Workflow,>, FetchError,>
    {
        let (listing, next_page,): (WorkflowListPayload, _,) =
            self.get_page(&format!("/repos/{repository}/actions/workflows"), page,).await?;
        let items = listing
            .workflows
            .into_iter()
            .map(|workflow| Workflow {
                id:         workflow.id,
                node_id:    workflow.node_id,
                name:       workflow.name,
                state:      workflow.state,
                repository: repository.to_owned(),
            },)
            .collect();
        Ok(Page {
            items,
            next_page,
        },)
    }

    async fn workflow_usage(
        &self,
        repository: &str,
        workflow_id: u64,
    ) -> Result<WorkflowUsage, FetchError,>
    {
        let (timing, _,): (WorkflowTimingPayload, _,) = self
            .get_json(format!("/repos/{repository}/actions/workflows/{workflow_id}/timing"),)
            .await?;
        Ok(WorkflowUsage {
            macos_ms:   timing.billable.macos.total_ms,
            windows_ms: timing.billable.windows.total_ms,
            ubuntu_ms:  timing.billable.ubuntu.total_ms,
        },)
    }

    async fn rate_limits(&self,) -> Result<QuotaSnapshot, FetchError,>
    {
        let (limits, _,): (RateLimitPayload, _,) = self.get_json("/rate_limit".to_owned(),).await?;
        Ok(QuotaSnapshot {
            core:    limits.resources.core.remaining,
            search:  limits.resources.search.remaining,
            graphql: limits.resources.graphql.map_or(0, |resource| resource.remaining,),
        },)
    }

    async fn list_enterprise_runners(
        &self,
        enterprise: &str,
        page: PageRequest,
    ) -> Result<Page<EnterpriseRunner,>, FetchError,>
    {
        let (listing, next_page,): (RunnerListPayload, _,) =
            self.get_page(&format!("/enterprises/{enterprise}/actions/runners"), page,).await?;
        let items = listing
            .runners
            .into_iter()
            .map(|runner| EnterpriseRunner {
                id:     runner.id,
                name:   runner.name,
                os:     runner.os,
                status: runner.status,
            },)
            .collect();
        Ok(Page {
            items,
            next_page,
        },)
    }
}

/// Classifies a non-success response into a [`FetchError`].
///
/// A 403/429 with `x-ratelimit-remaining: 0` and a parseable reset timestamp
/// is a primary limit. A 403/429 whose payload points at the secondary (or
/// legacy abuse) rate limit documentation is a secondary limit. Any other 403
/// is [`FetchError::Forbidden`]; everything else is [`FetchError::Status`].
pub fn classify_response(status: StatusCode, headers: &HeaderMap, body: &str,) -> FetchError
{
    let payload: ErrorPayload = serde_json::from_str(body,).unwrap_or_default();
    let message = payload
        .message
        .clone()
        .filter(|message| !message.is_empty(),)
        .or_else(|| Some(body.trim().to_owned(),).filter(|text| !text.is_empty(),),)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error",).to_owned(),);
    let retry_after = header_value(headers, header::RETRY_AFTER.as_str(),).map(str::to_owned,);
    let throttled = status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS;

    if throttled && header_value(headers, RATE_LIMIT_REMAINING,) == Some("0",) {
        if let Some(reset,) = header_value(headers, RATE_LIMIT_RESET,).and_then(parse_reset,) {
            return FetchError::PrimaryRateLimit {
                reset,
            };
        }
    }

    if throttled && payload.is_secondary_limit() {
        return FetchError::SecondaryRateLimit {
            retry_after,
        };
    }

    if status == StatusCode::FORBIDDEN {
        return FetchError::Forbidden {
            message,
            retry_after,
        };
    }

    FetchError::Status {
        status: status.as_u16(),
        message,
    }
}

/// Extracts the `rel="next"` page number from a `Link` header.
///
/// Returns [`Page::LAST`] when no next link is present.
///
/// # Example
///
/// ```
/// use actions_usage_exporter::parse_next_page;
///
/// let link = r#"<https://api.github.com/orgs/acme/repos?per_page=100&page=2>; rel="next", <https://api.github.com/orgs/acme/repos?per_page=100&page=5>; rel="last""#;
/// assert_eq!(parse_next_page(link,), 2);
/// assert_eq!(parse_next_page("",), 0);
/// ```
pub fn parse_next_page(link: &str,) -> u32
{
    link.split(',',)
        .filter(|part| part.contains(r#"rel="next""#,),)
        .find_map(|part| {
            let target = part.split(';',).next()?.trim().trim_start_matches('<',).trim_end_matches('>',);
            PAGE_PARAMETER.captures(target,)?.get(1,)?.as_str().parse::<u32>().ok()
        },)
        .unwrap_or(Page::<()>::LAST,)
}

fn header_value<'a,>(headers: &'a HeaderMap, name: &str,) -> Option<&'a str,>
{
    headers.get(name,).and_then(|value| value.to_str().ok(),).map(str::trim,)
}

fn parse_reset(raw: &str,) -> Option<DateTime<Utc,>,>
{
    let seconds = raw.parse::<i64>().ok()?;
    Utc.timestamp_opt(seconds, 0,).single()
}

#[derive(Debug, Default, Deserialize,)]
struct ErrorPayload
{
    #[serde(default)]
    message:           Option<String,>,
    #[serde(default)]
    documentation_url: Option<String,>,
}

impl ErrorPayload
{
    fn is_secondary_limit(&self,) -> bool
    {
        let documented = self.documentation_url.as_deref().is_some_and(|url| {
            url.contains("secondary-rate-limits",) || url.contains("abuse-rate-limits",)
        },);
        let described = self.message.as_deref().is_some_and(|message| {
            let lowered = message.to_ascii_lowercase();
            lowered.contains("secondary rate limit",) || lowered.contains("abuse detection",)
        },);
        documented || described
    }
}

#[derive(Debug, Deserialize,)]
struct OrganizationPayload
{
    #[serde(default)]
    public_repos:        u64,
    #[serde(default)]
    total_private_repos: u64,
    #[serde(default)]
    owned_private_repos: u64,
}

#[derive(Debug, Deserialize,)]
struct OwnerPayload
{
    login: String,
}

#[derive(Debug, Deserialize,)]
struct RepositoryPayload
{
    full_name: String,
    owner:     OwnerPayload,
    #[serde(default)]
    archived:  bool,
    #[serde(default)]
    disabled:  bool,
}

#[derive(Debug, Deserialize,)]
struct WorkflowListPayload
{
    #[serde(default)]
    workflows: Vec<WorkflowPayload,>,
}

#[derive(Debug, Deserialize,)]
struct WorkflowPayload
{
    id:      u64,
    node_id: String,
    name:    String,
    state:   String,
}

#[derive(Debug, Deserialize,)]
struct WorkflowTimingPayload
{
    #[serde(default)]
    billable: BillablePayload,
}

#[derive(Debug, Default, Deserialize,)]
struct BillablePayload
{
    #[serde(default, rename = "MACOS")]
    macos:   BucketPayload,
    #[serde(default, rename = "WINDOWS")]
    windows: BucketPayload,
    #[serde(default, rename = "UBUNTU")]
    ubuntu:  BucketPayload,
}

#[derive(Debug, Default, Deserialize,)]
struct BucketPayload
{
    #[serde(default)]
    total_ms: u64,
}

#[derive(Debug, Deserialize,)]
struct RateLimitPayload
{
    resources: RateLimitResources,
}

#[derive(Debug, Deserialize,)]
struct RateLimitResources
{
    core:    RateLimitResource,
    search:  RateLimitResource,
    #[serde(default)]
    graphql: Option<RateLimitResource,>,
}

#[derive(Debug, Deserialize,)]
struct RateLimitResource
{
    remaining: u64,
}

#[derive(Debug, Deserialize,)]
struct RunnerListPayload
{
    #[serde(default)]
    runners: Vec<RunnerPayload,>,
}

#[derive(Debug, Deserialize,)]
struct RunnerPayload
{
    id:     u64,
    name:   String,
    os:     String,
    status: String,
}

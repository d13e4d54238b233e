// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Scripted in-memory [`GitHubApi`] used by unit tests.
//!
//! Responses are queued per request key and consumed in order. A request
//! with nothing queued fails with a 404 status error, and every request is
//! recorded so tests can assert which calls were (not) issued.

use std::{
    collections::{HashMap, VecDeque},
    hash::Hash,
    sync::Mutex,
};

use async_trait::async_trait;

use crate::{
    api::GitHubApi,
    error::FetchError,
    models::{EnterpriseRunner, Page, PageRequest, QuotaSnapshot, Repository, Workflow, WorkflowUsage},
};

type Queue<K, T,> = HashMap<K, VecDeque<Result<T, FetchError,>,>,>;

/// Request issued against the fake.
#[derive(Debug, Clone, PartialEq, Eq, Hash,)]
pub enum ApiCall
{
    RepoCount(String,),
    OrganizationRepositories(String, u32,),
    Workflows(String, u32,),
    Usage(String, u64,),
    RateLimits,
    Runners(String, u32,),
}

#[derive(Debug, Default,)]
struct Script
{
    calls:        Vec<ApiCall,>,
    repo_counts:  Queue<String, u64,>,
    repositories: Queue<(String, u32,), Page<Repository,>,>,
    workflows:    Queue<(String, u32,), Page<Workflow,>,>,
    usage:        Queue<(String, u64,), WorkflowUsage,>,
    rate_limits:  Queue<(), QuotaSnapshot,>,
    runners:      Queue<(String, u32,), Page<EnterpriseRunner,>,>,
}

#[derive(Debug, Default,)]
pub struct ScriptedApi
{
    script: Mutex<Script,>,
}

fn next<K: Hash + Eq, T,>(queue: &mut Queue<K, T,>, key: &K,) -> Result<T, FetchError,>
{
    queue.get_mut(key,).and_then(VecDeque::pop_front,).unwrap_or_else(|| {
        Err(FetchError::Status {
            status: 404, message: "not scripted".to_owned(),
        },)
    },)
}

impl ScriptedApi
{
    pub fn calls(&self,) -> Vec<ApiCall,>
    {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn push_repo_count(&self, organization: &str, response: Result<u64, FetchError,>,)
    {
        let mut script = self.script.lock().unwrap();
        script.repo_counts.entry(organization.to_owned(),).or_default().push_back(response,);
    }

    pub fn push_org_repositories(&self, organization: &str, page: u32, response: Result<Page<Repository,>, FetchError,>,)
    {
        let mut script = self.script.lock().unwrap();
        script.repositories.entry((organization.to_owned(), page,),).or_default().push_back(response,);
    }

    pub fn push_workflows(&self, repository: &str, page: u32, response: Result<Page<Workflow,>, FetchError,>,)
    {
        let mut script = self.script.lock().unwrap();
        script.workflows.entry((repository.to_owned(), page,),).or_default().push_back(response,);
    }

    pub fn push_usage(&self, repository: &str, workflow_id: u64, response: Result<WorkflowUsage, FetchError,>,)
    {
        let mut script = self.script.lock().unwrap();
        script.usage.entry((repository.to_owned(), workflow_id,),).or_default().push_back(response,);
    }

    pub fn push_rate_limits(&self, response: Result<QuotaSnapshot, FetchError,>,)
    {
        let mut script = self.script.lock().unwrap();
        script.rate_limits.entry((),).or_default().push_back(response,);
    }

    pub fn push_runners(&self, enterprise: &str, page: u32, response: Result<Page<EnterpriseRunner,>, FetchError,>,)
    {
        let mut script = self.script.lock().unwrap();
        script.runners.entry((enterprise.to_owned(), page,),).or_default().push_back(response,);
    }
}

#[async_trait]
impl GitHubApi for ScriptedApi
{
    async fn organization_repo_count(&self, organization: &str,) -> Result<u64, FetchError,>
    {
        let mut script = self.script.lock().unwrap();
        script.calls.push(ApiCall::RepoCount(organization.to_owned(),),);
        next(&mut script.repo_counts, &organization.to_owned(),)
    }

    async fn list_organization_repositories(
        &self,
        organization: &str,
        page: PageRequest,
    ) -> Result<Page<Repository,>, FetchError,>
    {
        let mut script = self.script.lock().unwrap();
        script.calls.push(ApiCall::OrganizationRepositories(organization.to_owned(), page.page,),);
        next(&mut script.repositories, &(organization.to_owned(), page.page,),)
    }

    async fn list_workflows(&self, repository: &str, page: PageRequest,) -> Result<Page<Workflow,>, FetchError,>
    {
        let mut script = self.script.lock().unwrap();
        script.calls.push(ApiCall::Workflows(repository.to_owned(), page.page,),);
        next(&mut script.workflows, &(repository.to_owned(), page.page,),)
    }

    async fn workflow_usage(&self, repository: &str, workflow_id: u64,) -> Result<WorkflowUsage, FetchError,>
    {
        let mut script = self.script.lock().unwrap();
        script.calls.push(ApiCall::Usage(repository.to_owned(), workflow_id,),);
        next(&mut script.usage, &(repository.to_owned(), workflow_id,),)
    }

    async fn rate_limits(&self,) -> Result<QuotaSnapshot, FetchError,>
    {
        let mut script = self.script.lock().unwrap();
        script.calls.push(ApiCall::RateLimits,);
        next(&mut script.rate_limits, &(),)
    }

    async fn list_enterprise_runners(
        &self,
        enterprise: &str,
        page: PageRequest,
    ) -> Result<Page<EnterpriseRunner,>, FetchError,>
    {
        let mut script = self.script.lock().unwrap();
        script.calls.push(ApiCall::Runners(enterprise.to_owned(), page.page,),);
        next(&mut script.runners, &(enterprise.to_owned(), page.page,),)
    }
}

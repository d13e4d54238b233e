// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Exporter configuration.
//!
//! Settings come from two layers: an optional YAML document providing
//! defaults, and command-line flags (with environment fallbacks) that
//! override it. [`Settings::resolve`] merges both and validates the result
//! into the typed form consumed by `main`.

use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    client::DEFAULT_API_URL,
    discover::RepositorySource,
    error::{self, Error},
    quota::{DEFAULT_QUOTA_INTERVAL, hash_credential},
};

/// Default base refresh interval in seconds.
pub const DEFAULT_REFRESH_SECONDS: u64 = 30;
/// Multiplier applied to the base refresh for discovery and billable usage.
pub const SLOW_CYCLE_FACTOR: u32 = 5;
/// Default exposition listen address.
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:9999";
/// Default exposition path.
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

/// YAML document supplying default settings.
///
/// # Examples
///
/// ```
/// use actions_usage_exporter::ExporterConfig;
///
/// let yaml = r#"
/// organizations: [acme]
/// enterprise: acme-ent
/// refresh: 60
/// "#;
/// let config: ExporterConfig = serde_yaml::from_str(yaml,).expect("valid configuration",);
/// assert_eq!(config.organizations, ["acme"]);
/// assert_eq!(config.refresh, Some(60));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize,)]
#[serde(deny_unknown_fields)]
pub struct ExporterConfig
{
    /// Organizations whose repositories are discovered.
    #[serde(default, alias = "orgs")]
    pub organizations: Vec<String,>,

    /// Explicit `owner/name` repositories; take precedence over organizations.
    #[serde(default, alias = "repos")]
    pub repositories: Vec<String,>,

    /// Enterprise slug whose runners are monitored.
    #[serde(default)]
    pub enterprise: Option<String,>,

    /// Base refresh interval in seconds.
    #[serde(default)]
    pub refresh: Option<u64,>,

    /// REST API base URL, for GitHub Enterprise Server.
    #[serde(default, alias = "api-url", alias = "apiUrl")]
    pub api_url: Option<String,>,
}

/// Loads a configuration document from disk.
///
/// # Errors
///
/// Returns [`Error::Io`] when the file cannot be read and [`Error::Parse`]
/// when it is not a valid document.
pub fn load_config(path: &Path,) -> Result<ExporterConfig, Error,>
{
    let contents = fs::read_to_string(path,).map_err(|source| error::io_error(path, source,),)?;
    parse_config(&contents,)
}

/// Parses a configuration document. An empty document yields the defaults.
///
/// # Errors
///
/// Returns [`Error::Parse`] when the YAML cannot be decoded.
pub fn parse_config(contents: &str,) -> Result<ExporterConfig, Error,>
{
    if contents.trim().is_empty() {
        return Ok(ExporterConfig::default(),);
    }
    Ok(serde_yaml::from_str(contents,)?,)
}

/// Values supplied on the command line or through the environment.
///
/// Empty collections and `None` mean "not given" and fall back to the
/// configuration document, then to the built-in defaults.
#[derive(Clone, Default,)]
pub struct SettingsOverrides
{
    /// GitHub API token.
    pub token:                         Option<String,>,
    /// REST API base URL.
    pub api_url:                       Option<String,>,
    /// Base refresh interval in seconds.
    pub refresh:                       Option<u64,>,
    /// Organizations to discover repositories from.
    pub organizations:                 Vec<String,>,
    /// Explicit `owner/name` repositories.
    pub repositories:                  Vec<String,>,
    /// Enterprise slug whose runners are monitored.
    pub enterprise:                    Option<String,>,
    /// Credential identifier hashed into the quota label.
    pub app_id:                        Option<String,>,
    /// Whether the quota family carries the hashed `app_id` label.
    pub partition_quota_by_credential: bool,
    /// Seconds between two quota polls.
    pub quota_interval:                Option<u64,>,
    /// Exposition listen address.
    pub listen_address:                Option<String,>,
    /// Exposition path.
    pub metrics_path:                  Option<String,>,
}

/// Validated exporter settings.
#[derive(Clone, PartialEq, Eq,)]
pub struct Settings
{
    /// GitHub API token, never printed.
    pub token:          String,
    /// REST API base URL.
    pub api_url:        String,
    /// Base refresh interval, used as is by the runner poller.
    pub refresh:        Duration,
    /// Where the monitored repositories come from.
    pub source:         RepositorySource,
    /// Empty when enterprise runner polling is disabled.
    pub enterprise:     String,
    /// Hashed credential label for the quota family, when partitioned.
    pub quota_label:    Option<String,>,
    /// Delay between two quota polls when nothing is throttled.
    pub quota_interval: Duration,
    /// Exposition listen address.
    pub listen_address: String,
    /// Exposition path.
    pub metrics_path:   String,
}

impl std::fmt::Debug for Settings
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_,>,) -> std::fmt::Result
    {
        f.debug_struct("Settings",)
            .field("token", &"<redacted>",)
            .field("api_url", &self.api_url,)
            .field("refresh", &self.refresh,)
            .field("source", &self.source,)
            .field("enterprise", &self.enterprise,)
            .field("quota_label", &self.quota_label,)
            .field("quota_interval", &self.quota_interval,)
            .field("listen_address", &self.listen_address,)
            .field("metrics_path", &self.metrics_path,)
            .finish()
    }
}

impl std::fmt::Debug for SettingsOverrides
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_,>,) -> std::fmt::Result
    {
        f.debug_struct("SettingsOverrides",)
            .field("token", &self.token.as_ref().map(|_| "<redacted>",),)
            .field("organizations", &self.organizations,)
            .field("repositories", &self.repositories,)
            .field("enterprise", &self.enterprise,)
            .finish_non_exhaustive()
    }
}

impl Settings
{
    /// Merges `overrides` over `document` and validates the result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when the token is missing, the refresh
    /// interval is zero, a repository is not in `owner/name` form, neither
    /// organizations nor repositories are given, or quota partitioning is
    /// requested without an app id.
    pub fn resolve(overrides: SettingsOverrides, document: ExporterConfig,) -> Result<Self, Error,>
    {
        let token = overrides.token.map(|token| token.trim().to_owned(),).unwrap_or_default();
        if token.is_empty() {
            return Err(Error::validation("a GitHub token is required",),);
        }

        let refresh = overrides.refresh.or(document.refresh,).unwrap_or(DEFAULT_REFRESH_SECONDS,);
        if refresh == 0 {
            return Err(Error::validation("refresh interval must be greater than zero",),);
        }

        let repositories = first_non_empty(overrides.repositories, document.repositories,);
        for repository in &repositories {
            validate_repository(repository,)?;
        }
        let organizations = first_non_empty(overrides.organizations, document.organizations,);
        let source = if !repositories.is_empty() {
            RepositorySource::Static(repositories,)
        } else if !organizations.is_empty() {
            RepositorySource::Organizations(organizations,)
        } else {
            return Err(Error::validation("at least one organization or repository must be configured",),);
        };

        let quota_label = if overrides.partition_quota_by_credential {
            let app_id = overrides.app_id.as_deref().map(str::trim,).unwrap_or_default();
            if app_id.is_empty() {
                return Err(Error::validation("partitioning quota by credential requires an app id",),);
            }
            Some(hash_credential(app_id,),)
        } else {
            None
        };

        let quota_interval = match overrides.quota_interval {
            Some(0,) => return Err(Error::validation("quota interval must be greater than zero",),),
            Some(seconds,) => Duration::from_secs(seconds,),
            None => DEFAULT_QUOTA_INTERVAL,
        };

        let metrics_path = overrides.metrics_path.unwrap_or_else(|| DEFAULT_METRICS_PATH.to_owned(),);
        if !metrics_path.starts_with('/',) {
            return Err(Error::validation(format!("metrics path '{metrics_path}' must start with '/'"),),);
        }

        Ok(Self {
            token,
            api_url: overrides.api_url.or(document.api_url,).unwrap_or_else(|| DEFAULT_API_URL.to_owned(),),
            refresh: Duration::from_secs(refresh,),
            source,
            enterprise: overrides.enterprise.or(document.enterprise,).unwrap_or_default().trim().to_owned(),
            quota_label,
            quota_interval,
            listen_address: overrides.listen_address.unwrap_or_else(|| DEFAULT_LISTEN_ADDRESS.to_owned(),),
            metrics_path,
        },)
    }

    /// Interval of the discovery and billable-usage loops.
    pub fn slow_interval(&self,) -> Duration
    {
        self.refresh * SLOW_CYCLE_FACTOR
    }
}

fn first_non_empty(preferred: Vec<String,>, fallback: Vec<String,>,) -> Vec<String,>
{
    let preferred = clean(preferred,);
    if preferred.is_empty() { clean(fallback,) } else { preferred }
}

fn clean(values: Vec<String,>,) -> Vec<String,>
{
    values.into_iter().map(|value| value.trim().to_owned(),).filter(|value| !value.is_empty(),).collect()
}

fn validate_repository(repository: &str,) -> Result<(), Error,>
{
    match repository.split_once('/',) {
        Some((owner, name,),) if !owner.is_empty() && !name.is_empty() && !name.contains('/',) => Ok((),),
        _ => Err(Error::validation(format!("repository '{repository}' must be in owner/name form"),),),
    }
}

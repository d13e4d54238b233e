// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Command-line entry point of the exporter.
//!
//! Resolves settings, spawns the discovery loop, the three pollers and the
//! exposition server, then waits for SIGINT or SIGTERM and shuts everything
//! down through one cancellation token.

use std::{path::PathBuf, process, sync::Arc};

use actions_usage_exporter::{
    BillablePoller, Discovery, Error, ExporterConfig, ExporterMetrics, GitHubApi, OctocrabApi, QuotaMonitor,
    RateLimitedExecutor, RetryPolicy, RunnerPoller, Settings, SettingsOverrides, bind, build_client,
    discovery_cache, load_config, logging, serve, server_error,
};
use clap::{ArgAction, Parser};
use prometheus::Registry;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Export GitHub Actions usage, API quota and runner status to Prometheus.
#[derive(Debug, Parser,)]
#[command(name = "actions-usage-exporter", version, about)]
struct Cli
{
    /// Token used to authenticate against the GitHub API.
    #[arg(long = "github-token", env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String,>,

    /// REST API base URL, for GitHub Enterprise Server.
    #[arg(long = "github-api-url", env = "GITHUB_API_URL", value_name = "URL")]
    api_url: Option<String,>,

    /// Base refresh interval in seconds.
    #[arg(long = "github-refresh", env = "GITHUB_REFRESH", value_name = "SECONDS")]
    refresh: Option<u64,>,

    /// Comma separated organizations to discover repositories from.
    #[arg(long = "github-orgs", env = "GITHUB_ORGAS", value_delimiter = ',')]
    organizations: Vec<String,>,

    /// Comma separated `owner/name` repositories to monitor.
    #[arg(long = "github-repos", env = "GITHUB_REPOS", value_delimiter = ',')]
    repositories: Vec<String,>,

    /// Enterprise slug whose self-hosted runners are monitored.
    #[arg(long = "enterprise-name", env = "ENTERPRISE_NAME")]
    enterprise: Option<String,>,

    /// Identifier of the credential, used to partition the quota gauges.
    #[arg(long = "github-app-id", env = "GITHUB_APP_ID")]
    app_id: Option<String,>,

    /// Label the quota gauges with a hash of the app id.
    #[arg(long = "partition-quota-by-credential", action = ArgAction::SetTrue)]
    partition_quota_by_credential: bool,

    /// Seconds between two quota polls.
    #[arg(long = "quota-interval", value_name = "SECONDS")]
    quota_interval: Option<u64,>,

    /// Address the exposition server listens on.
    #[arg(long = "listen-address", env = "LISTEN_ADDRESS", value_name = "ADDR")]
    listen_address: Option<String,>,

    /// Path serving the metrics.
    #[arg(long = "metrics-path", value_name = "PATH")]
    metrics_path: Option<String,>,

    /// Optional YAML document with default settings.
    #[arg(long = "config", value_name = "PATH")]
    config: Option<PathBuf,>,
}

impl Cli
{
    fn into_parts(self,) -> (SettingsOverrides, Option<PathBuf,>,)
    {
        let overrides = SettingsOverrides {
            token:                         self.github_token,
            api_url:                       self.api_url,
            refresh:                       self.refresh,
            organizations:                 self.organizations,
            repositories:                  self.repositories,
            enterprise:                    self.enterprise,
            app_id:                        self.app_id,
            partition_quota_by_credential: self.partition_quota_by_credential,
            quota_interval:                self.quota_interval,
            listen_address:                self.listen_address,
            metrics_path:                  self.metrics_path,
        };
        (overrides, self.config,)
    }

    /// Loads the optional document and merges the flags over it.
    fn settings(self,) -> Result<Settings, Error,>
    {
        let (overrides, config,) = self.into_parts();
        let document = match config {
            Some(path,) => load_config(&path,)?,
            None => ExporterConfig::default(),
        };
        Settings::resolve(overrides, document,)
    }
}

/// Entry point that reports errors and sets the appropriate exit status.
#[tokio::main]
async fn main()
{
    logging::init();
    if let Err(error,) = run(Cli::parse(),).await {
        eprintln!("{}", error.to_display_string());
        process::exit(1,);
    }
}

/// Runs the exporter until a termination signal arrives.
///
/// # Errors
///
/// Returns configuration, client, registration and listener errors raised
/// during start-up, and a server error when the exposition server fails.
async fn run(cli: Cli,) -> Result<(), Error,>
{
    let settings = cli.settings()?;
    info!("Starting exporter with {:?}", settings);

    let api: Arc<dyn GitHubApi,> = Arc::new(OctocrabApi::new(build_client(&settings.token, &settings.api_url,)?,),);
    let registry = Registry::new();
    let metrics = ExporterMetrics::register(&registry, settings.quota_label.clone(),)?;
    let listener = bind(&settings.listen_address,).await?;

    let shutdown = CancellationToken::new();
    let executor = RateLimitedExecutor::new(RetryPolicy::default(), shutdown.clone(),);
    let (publisher, reader,) = discovery_cache();

    let mut pollers = JoinSet::new();
    pollers.spawn(
        Discovery::new(
            api.clone(),
            executor.clone(),
            settings.source.clone(),
            publisher,
            settings.slow_interval(),
        )
        .run(),
    );
    pollers.spawn(
        BillablePoller::new(api.clone(), executor.clone(), reader, metrics.clone(), settings.slow_interval(),)
            .run(),
    );
    pollers.spawn(QuotaMonitor::new(api.clone(), metrics.clone(), settings.quota_interval, shutdown.clone(),).run(),);
    pollers.spawn(RunnerPoller::new(api, executor, settings.enterprise.clone(), metrics, settings.refresh,).run(),);

    let path = settings.metrics_path.clone();
    let server_shutdown = shutdown.clone();
    let mut server = tokio::spawn(async move { serve(listener, registry, &path, server_shutdown,).await },);

    let finished_early = tokio::select! {
        () = shutdown_signal() => None,
        joined = &mut server => Some(joined),
    };
    info!("Shutting down");
    shutdown.cancel();

    let joined = match finished_early {
        Some(joined,) => joined,
        None => server.await,
    };
    while let Some(result,) = pollers.join_next().await {
        if let Err(error,) = result {
            warn!("Poller task ended abnormally: {}", error);
        }
    }

    joined.map_err(|error| server_error(settings.listen_address.clone(), std::io::Error::other(error,),),)?
}

/// Completes on the first SIGINT or SIGTERM.
async fn shutdown_signal()
{
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match (signal(SignalKind::terminate(),), signal(SignalKind::interrupt(),),) {
            (Ok(mut terminate,), Ok(mut interrupt,),) => {
                tokio::select! {
                    _ = terminate.recv() => info!("Received SIGTERM"),
                    _ = interrupt.recv() => info!("Received SIGINT"),
                }
                return;
            }
            (Err(error,), _,) | (_, Err(error,),) => {
                warn!("Failed to install signal handlers, falling back to Ctrl+C: {}", error);
            }
        }
    }

    match tokio::signal::ctrl_c().await {
        Ok((),) => info!("Received Ctrl+C"),
        Err(error,) => {
            warn!("Failed to listen for Ctrl+C, running until killed: {}", error);
            std::future::pending::<(),>().await;
        }
    }
}

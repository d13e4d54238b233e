// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Self-monitoring of the API quota left for the exporter's credential.
//!
//! The monitor calls `GET /rate_limit` directly instead of going through the
//! executor: it is itself the component that backs off, and its back-off for
//! forbidden responses is coarser than the executor's.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    api::GitHubApi,
    error::{FetchError, retry_after_seconds},
    metrics::ExporterMetrics,
    schedule::pause,
};

/// Default time between two quota polls.
pub const DEFAULT_QUOTA_INTERVAL: Duration = Duration::from_secs(5,);
/// Granularity of the random extra delay after a forbidden response.
pub const JITTER_UNIT: Duration = Duration::from_secs(60,);
/// Default exclusive upper bound of the jitter multiplier.
pub const DEFAULT_MAX_MULTIPLIER: u32 = 3;

/// Lowercase hex SHA-256 of a credential identifier, used as a label value.
///
/// # Example
///
/// ```
/// use actions_usage_exporter::hash_credential;
///
/// let label = hash_credential("12345",);
/// assert_eq!(label.len(), 64);
/// assert!(!label.contains("12345"));
/// ```
pub fn hash_credential(identifier: &str,) -> String
{
    hex::encode(Sha256::digest(identifier.as_bytes(),),)
}

/// Periodically publishes `github_remaining_limits`.
pub struct QuotaMonitor
{
    api:            Arc<dyn GitHubApi,>,
    metrics:        ExporterMetrics,
    interval:       Duration,
    jitter_unit:    Duration,
    max_multiplier: u32,
    shutdown:       CancellationToken,
}

impl std::fmt::Debug for QuotaMonitor
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_,>,) -> std::fmt::Result
    {
        f.debug_struct("QuotaMonitor",)
            .field("interval", &self.interval,)
            .field("jitter_unit", &self.jitter_unit,)
            .field("max_multiplier", &self.max_multiplier,)
            .finish_non_exhaustive()
    }
}

impl QuotaMonitor
{
    /// Creates a monitor polling every `interval` with the default jitter.
    pub fn new(
        api: Arc<dyn GitHubApi,>,
        metrics: ExporterMetrics,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> Self
    {
        Self {
            api,
            metrics,
            interval,
            jitter_unit: JITTER_UNIT,
            max_multiplier: DEFAULT_MAX_MULTIPLIER,
            shutdown,
        }
    }

    /// Overrides the jitter applied after a forbidden response.
    ///
    /// The extra delay is `unit * k` with `k` drawn uniformly from
    /// `0..max_multiplier`; a zero multiplier disables it.
    pub fn with_jitter(mut self, unit: Duration, max_multiplier: u32,) -> Self
    {
        self.jitter_unit = unit;
        self.max_multiplier = max_multiplier;
        self
    }

    /// Runs quota polls until shutdown.
    pub async fn run(self,)
    {
        info!("Quota monitor started (interval: {:?})", self.interval);
        loop {
            let delay = self.poll_once().await;
            if pause(&self.shutdown, delay,).await.is_cancelled() {
                break;
            }
        }
        info!("Quota monitor stopped");
    }

    /// Polls the quota once and returns how long to wait before the next poll.
    pub async fn poll_once(&self,) -> Duration
    {
        match self.api.rate_limits().await {
            Ok(snapshot,) => {
                debug!(
                    "Remaining quota core={} search={} graphql={}",
                    snapshot.core, snapshot.search, snapshot.graphql
                );
                self.metrics.record_quota(&snapshot,);
                self.interval
            }
            Err(error,) => {
                let delay = self.delay_after(&error, Utc::now(), &mut rand::thread_rng(),);
                warn!("Quota poll failed, next attempt in {:?}: {}", delay, error);
                delay
            }
        }
    }

    /// Delay before the next poll after `error` observed at `now`.
    ///
    /// A primary limit waits until its reset. A forbidden or secondary-limit
    /// response with a parseable `Retry-After` waits for the hint plus the
    /// jitter. Anything else, a malformed hint included, waits the regular
    /// interval.
    pub fn delay_after<R: Rng + ?Sized,>(&self, error: &FetchError, now: DateTime<Utc,>, rng: &mut R,) -> Duration
    {
        match error {
            FetchError::PrimaryRateLimit {
                reset,
            } => (*reset - now).to_std().unwrap_or(Duration::ZERO,),
            FetchError::Forbidden {
                ..
            }
            | FetchError::SecondaryRateLimit {
                ..
            } => match retry_after_seconds(error.retry_after(),) {
                Some(seconds,) if seconds >= 0 => Duration::from_secs(seconds.unsigned_abs(),) + self.jitter(rng,),
                _ => self.interval,
            },
            _ => self.interval,
        }
    }

    fn jitter<R: Rng + ?Sized,>(&self, rng: &mut R,) -> Duration
    {
        if self.max_multiplier == 0 {
            return Duration::ZERO;
        }
        self.jitter_unit * rng.gen_range(0..self.max_multiplier,)
    }
}

#[cfg(test)]
mod tests
{
    use chrono::TimeDelta;
    use prometheus::Registry;
    use proptest::prelude::*;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::{
        fake::{ApiCall, ScriptedApi},
        models::QuotaSnapshot,
    };

    fn monitor(api: Arc<ScriptedApi,>,) -> (QuotaMonitor, ExporterMetrics,)
    {
        let metrics = ExporterMetrics::register(&Registry::new(), None,).expect("register",);
        let monitor =
            QuotaMonitor::new(api, metrics.clone(), DEFAULT_QUOTA_INTERVAL, CancellationToken::new(),);
        (monitor, metrics,)
    }

    fn forbidden(retry_after: Option<&str,>,) -> FetchError
    {
        FetchError::Forbidden {
            message:     "Forbidden".to_owned(),
            retry_after: retry_after.map(str::to_owned,),
        }
    }

    #[test]
    fn hash_is_lowercase_hex_sha256()
    {
        assert_eq!(
            hash_credential("abc",),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn primary_limit_waits_until_reset()
    {
        let (monitor, _,) = monitor(Arc::new(ScriptedApi::default(),),);
        let now = Utc::now();
        let error = FetchError::PrimaryRateLimit {
            reset: now + TimeDelta::seconds(42,),
        };
        assert_eq!(monitor.delay_after(&error, now, &mut StdRng::seed_from_u64(1,),), Duration::from_secs(42,));
    }

    #[test]
    fn past_reset_does_not_wait()
    {
        let (monitor, _,) = monitor(Arc::new(ScriptedApi::default(),),);
        let now = Utc::now();
        let error = FetchError::PrimaryRateLimit {
            reset: now - TimeDelta::seconds(5,),
        };
        assert_eq!(monitor.delay_after(&error, now, &mut StdRng::seed_from_u64(1,),), Duration::ZERO);
    }

    #[test]
    fn forbidden_with_hint_and_no_jitter_waits_for_hint()
    {
        let (monitor, _,) = monitor(Arc::new(ScriptedApi::default(),),);
        let monitor = monitor.with_jitter(JITTER_UNIT, 0,);
        let delay = monitor.delay_after(&forbidden(Some("30",),), Utc::now(), &mut StdRng::seed_from_u64(1,),);
        assert_eq!(delay, Duration::from_secs(30,));
    }

    #[test]
    fn malformed_hint_falls_back_to_interval()
    {
        let (monitor, _,) = monitor(Arc::new(ScriptedApi::default(),),);
        let mut rng = StdRng::seed_from_u64(7,);
        assert_eq!(monitor.delay_after(&forbidden(Some("soon",),), Utc::now(), &mut rng,), DEFAULT_QUOTA_INTERVAL);
        assert_eq!(monitor.delay_after(&forbidden(None,), Utc::now(), &mut rng,), DEFAULT_QUOTA_INTERVAL);
    }

    #[test]
    fn generic_error_waits_interval()
    {
        let (monitor, _,) = monitor(Arc::new(ScriptedApi::default(),),);
        let error = FetchError::transport("connection reset",);
        assert_eq!(monitor.delay_after(&error, Utc::now(), &mut StdRng::seed_from_u64(3,),), DEFAULT_QUOTA_INTERVAL);
    }

    proptest! {
        #[test]
        fn hinted_delay_stays_in_jitter_window(hint in 0u64..3600, seed in any::<u64>()) {
            let (monitor, _,) = monitor(Arc::new(ScriptedApi::default(),),);
            let error = FetchError::SecondaryRateLimit {
                retry_after: Some(hint.to_string(),),
            };
            let delay = monitor.delay_after(&error, Utc::now(), &mut StdRng::seed_from_u64(seed,),);
            let extra = delay - Duration::from_secs(hint,);
            prop_assert!(delay >= Duration::from_secs(hint,));
            prop_assert!(extra < JITTER_UNIT * DEFAULT_MAX_MULTIPLIER);
            prop_assert_eq!(extra.as_secs() % JITTER_UNIT.as_secs(), 0);
        }
    }

    #[tokio::test]
    async fn successful_poll_publishes_remaining_calls()
    {
        let api = Arc::new(ScriptedApi::default(),);
        api.push_rate_limits(Ok(QuotaSnapshot {
            core: 4321, search: 30, graphql: 4999,
        },),);
        let (monitor, metrics,) = monitor(api.clone(),);

        assert_eq!(monitor.poll_once().await, DEFAULT_QUOTA_INTERVAL);
        assert_eq!(metrics.remaining("core",), Some(4321.0));
        assert_eq!(metrics.remaining("search",), Some(30.0));
        assert_eq!(metrics.remaining("graphql",), Some(4999.0));
        assert_eq!(api.calls(), [ApiCall::RateLimits]);
    }

    #[tokio::test]
    async fn failed_poll_leaves_gauges_untouched()
    {
        let api = Arc::new(ScriptedApi::default(),);
        api.push_rate_limits(Ok(QuotaSnapshot {
            core: 10, search: 1, graphql: 2,
        },),);
        api.push_rate_limits(Err(FetchError::Status {
            status: 500, message: "boom".to_owned(),
        },),);
        let (monitor, metrics,) = monitor(api,);

        monitor.poll_once().await;
        assert_eq!(monitor.poll_once().await, DEFAULT_QUOTA_INTERVAL);
        assert_eq!(metrics.remaining("core",), Some(10.0));
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_on_shutdown()
    {
        let api = Arc::new(ScriptedApi::default(),);
        let shutdown = CancellationToken::new();
        let metrics = ExporterMetrics::register(&Registry::new(), None,).expect("register",);
        let monitor = QuotaMonitor::new(api.clone(), metrics, DEFAULT_QUOTA_INTERVAL, shutdown.clone(),);

        let task = tokio::spawn(monitor.run(),);
        tokio::time::sleep(Duration::from_secs(12,),).await;
        shutdown.cancel();
        task.await.expect("monitor task",);

        assert_eq!(api.calls().len(), 3);
    }
}

// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Rate-limit aware retry for single GitHub API calls.
//!
//! [`RetryPolicy`] turns a classified [`FetchError`] into a decision without
//! touching the network or the clock, and [`RateLimitedExecutor`] applies that
//! decision around a call, suspending cooperatively with shutdown.

use std::{future::Future, time::Duration};

use chrono::{DateTime, Utc};
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    error::{FetchError, retry_after_seconds},
    schedule::pause,
};

/// What to do after a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq,)]
pub enum RetryDecision
{
    /// Wait for the duration, then reissue the identical call.
    Retry(Duration,),
    /// Give up and hand the error to the caller.
    Surface,
}

/// Retry policy for GitHub's two throttling signals.
///
/// Primary limits wait until the announced reset. Secondary limits wait for a
/// positive `Retry-After` hint, or for a uniformly sampled jitter in
/// `[secondary_jitter_min_ms, secondary_jitter_max_ms)` when the hint is
/// missing, non-positive, or malformed. Every other error surfaces at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq,)]
pub struct RetryPolicy
{
    /// Inclusive lower bound of the secondary-limit jitter (default: 200).
    pub secondary_jitter_min_ms: u64,
    /// Exclusive upper bound of the secondary-limit jitter (default: 2000).
    pub secondary_jitter_max_ms: u64,
}

impl Default for RetryPolicy
{
    fn default() -> Self
    {
        Self {
            secondary_jitter_min_ms: 200, secondary_jitter_max_ms: 2000,
        }
    }
}

impl RetryPolicy
{
    /// Decides how to react to `error` observed at `now`.
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use actions_usage_exporter::{FetchError, RetryDecision, RetryPolicy};
    /// use chrono::{TimeDelta, Utc};
    ///
    /// let now = Utc::now();
    /// let error = FetchError::PrimaryRateLimit {
    ///     reset: now + TimeDelta::seconds(10,),
    /// };
    /// let decision = RetryPolicy::default().decide(&error, now, &mut rand::thread_rng(),);
    /// assert_eq!(decision, RetryDecision::Retry(Duration::from_secs(10,),));
    /// ```
    pub fn decide<R: Rng + ?Sized,>(
        &self,
        error: &FetchError,
        now: DateTime<Utc,>,
        rng: &mut R,
    ) -> RetryDecision
    {
        match error {
            FetchError::PrimaryRateLimit {
                reset,
            } => RetryDecision::Retry((*reset - now).to_std().unwrap_or(Duration::ZERO,),),
            FetchError::SecondaryRateLimit {
                retry_after,
            } => match retry_after_seconds(retry_after.as_deref(),) {
                Some(seconds,) if seconds > 0 => {
                    RetryDecision::Retry(Duration::from_secs(seconds.unsigned_abs(),),)
                }
                _ => RetryDecision::Retry(self.secondary_jitter(rng,),),
            },
            _ => RetryDecision::Surface,
        }
    }

    fn secondary_jitter<R: Rng + ?Sized,>(&self, rng: &mut R,) -> Duration
    {
        if self.secondary_jitter_max_ms <= self.secondary_jitter_min_ms {
            return Duration::from_millis(self.secondary_jitter_min_ms,);
        }
        Duration::from_millis(rng.gen_range(self.secondary_jitter_min_ms..self.secondary_jitter_max_ms,),)
    }
}

/// Runs single API calls under a [`RetryPolicy`].
///
/// Rate-limited calls are retried without an attempt limit because the wait
/// is bounded by the API itself. The only way out of a pending wait besides
/// its expiry is the shutdown token, which yields [`FetchError::Cancelled`].
#[derive(Debug, Clone,)]
pub struct RateLimitedExecutor
{
    policy:   RetryPolicy,
    shutdown: CancellationToken,
}

impl RateLimitedExecutor
{
    /// Creates an executor that observes `shutdown` at every suspension.
    pub fn new(policy: RetryPolicy, shutdown: CancellationToken,) -> Self
    {
        Self {
            policy,
            shutdown,
        }
    }

    /// Token observed by this executor.
    pub fn shutdown(&self,) -> &CancellationToken
    {
        &self.shutdown
    }

    /// Executes `call`, reissuing it while the policy asks for a retry.
    ///
    /// # Arguments
    ///
    /// * `operation` - Name of the operation for logging
    /// * `call` - Produces a fresh future for the identical request
    ///
    /// # Errors
    ///
    /// Returns the classified error when the policy surfaces it, or
    /// [`FetchError::Cancelled`] when shutdown interrupts a wait.
    pub async fn execute<F, Fut, T,>(&self, operation: &str, mut call: F,) -> Result<T, FetchError,>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError,>,>,
    {
        let mut attempt = 1u32;

        loop {
            if self.shutdown.is_cancelled() {
                return Err(FetchError::Cancelled,);
            }

            let error = match call().await {
                Ok(result,) => {
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}", operation, attempt);
                    }
                    return Ok(result,);
                }
                Err(error,) => error,
            };

            let decision = self.policy.decide(&error, Utc::now(), &mut rand::thread_rng(),);
            match decision {
                RetryDecision::Retry(delay,) => {
                    match &error {
                        FetchError::PrimaryRateLimit {
                            reset,
                        } => warn!("{} rate limited, pausing until {}", operation, reset),
                        _ => warn!(
                            "{} secondary rate limited, pausing for {} ms",
                            operation,
                            delay.as_millis()
                        ),
                    }
                    if pause(&self.shutdown, delay,).await.is_cancelled() {
                        return Err(FetchError::Cancelled,);
                    }
                    attempt += 1;
                }
                RetryDecision::Surface => {
                    warn!("{} failed: {}", operation, error);
                    return Err(error,);
                }
            }
        }
    }
}

// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Cancellable suspension shared by the executor and every polling loop.

use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Outcome of a [`pause`].
#[derive(Debug, Clone, Copy, PartialEq, Eq,)]
pub enum Pause
{
    /// The full duration elapsed.
    Elapsed,
    /// Shutdown was requested before the duration elapsed.
    Cancelled,
}

impl Pause
{
    /// Returns `true` when the pause was interrupted by shutdown.
    pub fn is_cancelled(self,) -> bool
    {
        self == Self::Cancelled
    }
}

/// Sleeps for `duration` unless `shutdown` fires first.
///
/// An already cancelled token returns immediately without sleeping.
pub async fn pause(shutdown: &CancellationToken, duration: Duration,) -> Pause
{
    if shutdown.is_cancelled() {
        return Pause::Cancelled;
    }

    tokio::select! {
        biased;
        () = shutdown.cancelled() => Pause::Cancelled,
        () = sleep(duration) => Pause::Elapsed,
    }
}

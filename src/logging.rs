// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Global tracing subscriber.

use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt::layer,
    prelude::*,
    registry,
};

/// Installs the process-wide subscriber.
///
/// The filter is read from `RUST_LOG` and defaults to `info`. Calling this
/// twice is harmless: the second installation is ignored.
pub fn init()
{
    let env_filter = EnvFilter::builder().with_default_directive(LevelFilter::INFO.into(),).from_env_lossy();
    let fmt_layer = layer().with_writer(std::io::stderr,).with_target(true,).with_filter(env_filter,);

    let _ = registry().with(fmt_layer,).try_init();
}

#![allow(non_shorthand_field_patterns)]
#![doc = "Error handling primitives shared across the exporter crate."]
// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! The derive emitted by [`masterror::Error`] expands pattern matches that
//! trigger the `non_shorthand_field_patterns` lint. The lint is disabled for
//! the module to keep the generated implementations warning-free.
//!
//! Two error surfaces live here. [`Error`] covers start-up failures that stop
//! the process (configuration, metric registration, the HTTP listener).
//! [`FetchError`] classifies a single failed GitHub API call so the retry
//! policy can decide whether to wait, retry, or give up on the unit of work.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

/// Unified error type returned while assembling and starting the exporter.
#[derive(Debug, masterror::Error)]
pub enum Error {
    /// Wraps I/O errors that occur while reading configuration files.
    #[error("failed to read configuration from {path:?}: {source}")]
    Io {
        /// Location of the configuration file.
        path:   PathBuf,
        /// Underlying I/O error.
        source: std::io::Error
    },
    /// Wraps YAML decoding errors.
    #[error("failed to parse configuration: {source}")]
    Parse {
        /// Source decoding error from serde_yaml.
        source: serde_yaml::Error
    },
    /// Returned when the configuration violates invariants.
    #[error("invalid configuration: {message}")]
    Validation {
        /// Human readable message describing the validation problem.
        message: String
    },
    /// Wraps failures registering gauge families with the registry.
    #[error("failed to register metrics: {source}")]
    Metrics {
        /// Underlying registry error.
        source: prometheus::Error
    },
    /// Returned when the GitHub client cannot be constructed.
    #[error("failed to initialize GitHub client: {message}")]
    Client {
        /// Human readable message describing the client failure.
        message: String
    },
    /// Wraps failures binding or running the exposition server.
    #[error("metrics server failed on {address}: {source}")]
    Server {
        /// Address the server was bound, or attempted to bind, to.
        address: String,
        /// Underlying I/O error reported by the operating system.
        source:  std::io::Error
    }
}

impl Error {
    /// Constructs a validation error from the provided displayable value.
    ///
    /// # Parameters
    ///
    /// * `message` - Human-readable description of the validation failure.
    pub fn validation<M>(message: M) -> Self
    where
        M: Into<String>
    {
        Self::Validation {
            message: message.into()
        }
    }

    /// Constructs a client error from the provided displayable value.
    pub fn client<M>(message: M) -> Self
    where
        M: Into<String>
    {
        Self::Client {
            message: message.into()
        }
    }

    /// Formats the error for diagnostics without the variant name.
    ///
    /// The returned string matches the [`std::fmt::Display`] implementation.
    pub fn to_display_string(&self) -> String {
        format!("{self}")
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(source: serde_yaml::Error) -> Self {
        Self::Parse {
            source
        }
    }
}

impl From<prometheus::Error> for Error {
    fn from(source: prometheus::Error) -> Self {
        Self::Metrics {
            source
        }
    }
}

/// Creates an [`Error::Io`] variant capturing the failing path and source.
///
/// # Parameters
///
/// * `path` - Location of the configuration file that triggered the error.
/// * `source` - I/O error reported by the operating system.
pub fn io_error(path: &Path, source: std::io::Error) -> Error {
    Error::Io {
        path: path.to_path_buf(),
        source
    }
}

/// Creates an [`Error::Server`] variant for the given listen address.
pub fn server_error(address: impl Into<String>, source: std::io::Error) -> Error {
    Error::Server {
        address: address.into(),
        source
    }
}

/// Classification of a failed GitHub API call.
///
/// The variants mirror the distinct throttling shapes returned by GitHub plus
/// the generic failure classes. Raw `Retry-After` header values are kept
/// verbatim so each caller can decide how to treat a malformed hint.
#[derive(Debug, Clone, PartialEq, Eq, masterror::Error)]
pub enum FetchError {
    /// Primary rate limit exhausted; requests succeed again after `reset`.
    #[error("primary rate limit exhausted until {reset}")]
    PrimaryRateLimit {
        /// Authoritative reset timestamp announced by the API.
        reset: DateTime<Utc>
    },
    /// Secondary (abuse) rate limit triggered.
    #[error("secondary rate limit triggered")]
    SecondaryRateLimit {
        /// Raw `Retry-After` header value, when present.
        retry_after: Option<String>
    },
    /// HTTP 403 that is not a recognised rate limit.
    #[error("forbidden: {message}")]
    Forbidden {
        /// Message reported by the API.
        message:     String,
        /// Raw `Retry-After` header value, when present.
        retry_after: Option<String>
    },
    /// Any other non-success HTTP status.
    #[error("unexpected status {status}: {message}")]
    Status {
        /// HTTP status code.
        status:  u16,
        /// Message reported by the API.
        message: String
    },
    /// The request never produced a response.
    #[error("transport failure: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String
    },
    /// The response body did not match the expected shape.
    #[error("failed to decode response: {message}")]
    Decode {
        /// Description of the decoding failure.
        message: String
    },
    /// The shutdown signal fired while the call was waiting to be retried.
    #[error("operation cancelled by shutdown")]
    Cancelled
}

impl FetchError {
    /// Constructs a transport error from the provided displayable value.
    pub fn transport<M>(message: M) -> Self
    where
        M: Into<String>
    {
        Self::Transport {
            message: message.into()
        }
    }

    /// Constructs a decode error from the provided displayable value.
    pub fn decode<M>(message: M) -> Self
    where
        M: Into<String>
    {
        Self::Decode {
            message: message.into()
        }
    }

    /// Raw `Retry-After` value carried by throttling and forbidden errors.
    pub fn retry_after(&self) -> Option<&str> {
        match self {
            Self::SecondaryRateLimit {
                retry_after
            }
            | Self::Forbidden {
                retry_after, ..
            } => retry_after.as_deref(),
            _ => None
        }
    }
}

/// Parses a `Retry-After` header value expressed in whole seconds.
///
/// Returns `None` when the value is absent or not an integer. Zero and
/// negative values are returned as-is; callers decide what they mean.
pub fn retry_after_seconds(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
}

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Origin AS number as it appears in the AS path, without any `AS` prefix.
pub type ASN = String;

/// Outcome of verifying one origin ASN against the registry.
///
/// `LookupFailed` means every attempt hit a transport error. It is counted
/// separately but is treated as unregistered when the report is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegistrationStatus {
    Registered,
    Unregistered,
    LookupFailed,
}

impl RegistrationStatus {
    pub fn from_registered(registered: bool) -> Self {
        if registered {
            RegistrationStatus::Registered
        } else {
            RegistrationStatus::Unregistered
        }
    }

    /// Collapses the tri-state into the boolean the cache stores.
    pub fn is_registered(&self) -> bool {
        matches!(self, RegistrationStatus::Registered)
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RegistrationStatus::Registered => "REGISTERED",
            RegistrationStatus::Unregistered => "UNREGISTERED",
            RegistrationStatus::LookupFailed => "LOOKUP_FAILED",
        };
        write!(f, "{}", s)
    }
}

/// How distinct prefixes are grouped before the aggregation sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AggregationScope {
    /// One sweep per origin ASN.
    #[default]
    PerOrigin,
    /// A single sweep over the whole table, ignoring origins.
    Global,
}

impl fmt::Display for AggregationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AggregationScope::PerOrigin => "PER_ORIGIN",
            AggregationScope::Global => "GLOBAL",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid IPv6 prefix '{0}'")]
    InvalidPrefix(String),

    #[error("prefix length {0} exceeds 128")]
    InvalidLength(u8),

    #[error("'{0}' is not an IPv6 prefix")]
    NotIpv6(String),

    #[error("route line has {0} column(s), expected at least 2")]
    MissingColumns(usize),

    #[error("route has an empty AS path")]
    EmptyAsPath,
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to write ASN cache {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize ASN cache: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("registry transport failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("registry command exited with {0}")]
    CommandFailed(std::process::ExitStatus),

    #[error("registry request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("registry returned HTTP {0}")]
    HttpStatus(u16),

    #[error("registry query timed out")]
    Timeout,
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("failed to read routes from {path}: {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write report to {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("failed to set up registry transport: {0}")]
    Registry(#[from] LookupError),

    #[error("failed to serialize report: {0}")]
    Report(#[from] serde_json::Error),
}

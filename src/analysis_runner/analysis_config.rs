use std::path::PathBuf;
use std::time::Duration;

use crate::registry::lookup::DEFAULT_QUERY_TIMEOUT;
use crate::registry::{RegistryTransport, VerifierConfig};
use crate::shared::AggregationScope;

pub const CACHE_FILE_NAME: &str = "asn_cache.json";

/// Configuration for a single analysis run
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Pipe-delimited routing table snapshot
    pub input: PathBuf,

    /// Where the ASN registration cache is loaded from and persisted to
    pub cache_path: PathBuf,

    /// Directory for the JSON metrics file; nothing is written when unset
    pub output_dir: Option<PathBuf>,

    pub scope: AggregationScope,

    pub transport: RegistryTransport,

    /// Per-query timeout handed to the registry transport
    pub query_timeout: Duration,

    pub verifier: VerifierConfig,

    /// Skip registry verification entirely
    pub skip_registry: bool,
}

impl AnalysisConfig {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        AnalysisConfig {
            input: input.into(),
            cache_path: default_cache_path(),
            output_dir: None,
            scope: AggregationScope::default(),
            transport: RegistryTransport::default(),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            verifier: VerifierConfig::default(),
            skip_registry: false,
        }
    }

    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = path.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn with_scope(mut self, scope: AggregationScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_transport(mut self, transport: RegistryTransport) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn with_verifier(mut self, verifier: VerifierConfig) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn with_skip_registry(mut self, skip: bool) -> Self {
        self.skip_registry = skip;
        self
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "input": self.input,
            "cache_path": self.cache_path,
            "output_dir": self.output_dir,
            "scope": self.scope,
            "transport": self.transport.to_string(),
            "query_timeout_secs": self.query_timeout.as_secs_f64(),
            "max_concurrency": self.verifier.max_concurrency,
            "max_attempts": self.verifier.max_attempts,
            "base_backoff_ms": self.verifier.base_backoff.as_millis() as u64,
            "skip_registry": self.skip_registry,
        })
    }
}

/// `<data dir>/ipv6-aggregation/asn_cache.json`, falling back to the
/// working directory when the platform has no data directory.
pub fn default_cache_path() -> PathBuf {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ipv6-aggregation")
        .join(CACHE_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::new("table.txt");
        assert_eq!(config.scope, AggregationScope::PerOrigin);
        assert_eq!(config.verifier.max_concurrency, 200);
        assert!(config.cache_path.ends_with("ipv6-aggregation/asn_cache.json"));
        assert!(config.output_dir.is_none());
        assert_eq!(config.to_json()["transport"], "whois -h whois.radb.net");
    }
}

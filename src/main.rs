use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use ipv6_aggregation::analysis_runner::{AnalysisConfig, AnalysisRunner};
use ipv6_aggregation::registry::lookup::{DEFAULT_QUERY_TIMEOUT, DEFAULT_WHOIS_SERVER, WHOIS_PORT};
use ipv6_aggregation::registry::verifier::{
    DEFAULT_BASE_BACKOFF, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_CONCURRENCY,
};
use ipv6_aggregation::registry::{RegistryTransport, VerifierConfig};
use ipv6_aggregation::AggregationScope;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Transport {
    /// Local `whois` client
    Whois,
    /// WHOIS protocol over TCP port 43
    Tcp,
    /// RIPEstat whois data call over HTTPS
    Ripestat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Scope {
    PerOrigin,
    Global,
}

/// IPv6 routing-table aggregation and origin registration metrics.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Pipe-delimited table (`prefix|as_path`, or raw `bgpdump -m` output)
    input: PathBuf,

    /// ASN registration cache file
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Directory to write the JSON metrics file into
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Group prefixes per origin ASN or over the whole table
    #[arg(long, value_enum, default_value = "per-origin")]
    scope: Scope,

    #[arg(long, value_enum, default_value = "whois")]
    transport: Transport,

    /// WHOIS server for the `whois` and `tcp` transports
    #[arg(long, default_value = DEFAULT_WHOIS_SERVER)]
    whois_server: String,

    /// Maximum registry lookups in flight
    #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENCY)]
    max_concurrency: usize,

    /// Attempts per ASN before it is treated as unregistered
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,

    /// Delay before the first retry in milliseconds, doubled on each further retry
    #[arg(long, default_value_t = DEFAULT_BASE_BACKOFF.as_millis() as u64)]
    backoff_ms: u64,

    /// Per-query timeout in seconds
    #[arg(long, default_value_t = DEFAULT_QUERY_TIMEOUT.as_secs())]
    timeout: u64,

    /// Skip registry verification
    #[arg(long)]
    skip_registry: bool,

    /// Print the metrics as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn into_config(self) -> AnalysisConfig {
        let transport = match self.transport {
            Transport::Whois => RegistryTransport::WhoisCommand {
                server: self.whois_server,
            },
            Transport::Tcp => RegistryTransport::WhoisTcp {
                server: self.whois_server,
                port: WHOIS_PORT,
            },
            Transport::Ripestat => RegistryTransport::RipeStat,
        };
        let scope = match self.scope {
            Scope::PerOrigin => AggregationScope::PerOrigin,
            Scope::Global => AggregationScope::Global,
        };
        let verifier = VerifierConfig::default()
            .with_max_concurrency(self.max_concurrency)
            .with_max_attempts(self.max_attempts)
            .with_base_backoff(Duration::from_millis(self.backoff_ms))
            .with_progress(std::io::stderr().is_terminal());

        let mut config = AnalysisConfig::new(self.input)
            .with_scope(scope)
            .with_transport(transport)
            .with_query_timeout(Duration::from_secs(self.timeout))
            .with_verifier(verifier)
            .with_skip_registry(self.skip_registry);
        if let Some(cache) = self.cache {
            config = config.with_cache_path(cache);
        }
        if let Some(output_dir) = self.output_dir {
            config = config.with_output_dir(output_dir);
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let json = args.json;
    let runner = AnalysisRunner::new(args.into_config());
    tracing::debug!(config = %runner.config.to_json(), "starting analysis");

    let snapshot = runner.run().await?;
    if json {
        println!("{}", snapshot.to_json()?);
    } else {
        print!("{}", snapshot);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_library_defaults() {
        let config = Args::try_parse_from(["ipv6-aggregation", "table.txt"])
            .unwrap()
            .into_config();
        let defaults = VerifierConfig::default();

        assert_eq!(config.verifier.max_concurrency, defaults.max_concurrency);
        assert_eq!(config.verifier.max_attempts, defaults.max_attempts);
        assert_eq!(config.verifier.base_backoff, defaults.base_backoff);
        assert_eq!(config.query_timeout, DEFAULT_QUERY_TIMEOUT);
    }

    #[test]
    fn test_retry_flags() {
        let config = Args::try_parse_from([
            "ipv6-aggregation",
            "table.txt",
            "--max-concurrency",
            "8",
            "--max-attempts",
            "5",
            "--backoff-ms",
            "250",
        ])
        .unwrap()
        .into_config();

        assert_eq!(config.verifier.max_concurrency, 8);
        assert_eq!(config.verifier.max_attempts, 5);
        assert_eq!(config.verifier.backoff(1), Duration::from_millis(250));
        assert_eq!(config.verifier.backoff(3), Duration::from_secs(1));
    }
}

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::info;

use crate::aggregation::AggregationEngine;
use crate::as_path::AsPathStats;
use crate::registry::{RegistryCache, RegistryLookup, RegistryVerifier};
use crate::report::{MetricsSnapshot, ReportBuilder};
use crate::routes::{load_routes, RouteTable};
use crate::shared::AnalysisError;

use super::analysis_config::AnalysisConfig;

/// Runs one batch pass: load the table, aggregate, verify origins, report.
pub struct AnalysisRunner {
    pub config: AnalysisConfig,
}

impl AnalysisRunner {
    pub fn new(config: AnalysisConfig) -> Self {
        AnalysisRunner { config }
    }

    pub async fn run(&self) -> Result<MetricsSnapshot, AnalysisError> {
        let table = load_routes(&self.config.input)?;

        let lookup = if self.config.skip_registry {
            None
        } else {
            Some(self.config.transport.build(self.config.query_timeout)?)
        };

        let snapshot = self.analyze(&table, lookup).await;

        if let Some(output_dir) = &self.config.output_dir {
            let path = snapshot.save_to_file(output_dir)?;
            info!(path = %path.display(), "metrics written");
        }
        Ok(snapshot)
    }

    /// Computes the metrics for an already loaded table. Registry
    /// verification runs only when a lookup is supplied.
    pub async fn analyze(
        &self,
        table: &RouteTable,
        lookup: Option<Arc<dyn RegistryLookup>>,
    ) -> MetricsSnapshot {
        let aggregation = AggregationEngine::new(self.config.scope).analyze(&table.routes);
        info!(
            prefixes = aggregation.total_prefixes,
            aggregatable = aggregation.aggregatable_prefixes,
            scope = %self.config.scope,
            "aggregation finished"
        );
        let as_paths = AsPathStats::from_routes(&table.routes);

        let mut builder = ReportBuilder::new(&table.routes)
            .with_skipped_rows(table.skipped_rows)
            .with_scope(self.config.scope)
            .with_aggregation(aggregation)
            .with_as_paths(as_paths);

        if let Some(lookup) = lookup {
            let cache = Arc::new(RegistryCache::load(&self.config.cache_path));
            let verifier = RegistryVerifier::new(lookup, self.config.verifier.clone());
            let origins: BTreeSet<&str> = table
                .routes
                .iter()
                .map(|route| route.origin_asn.as_str())
                .collect();

            let outcome = verifier.verify_all(origins, cache).await;
            builder = builder.with_verification(outcome);
        }

        builder.build()
    }
}

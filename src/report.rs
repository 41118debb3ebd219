use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::aggregation::AggregationStats;
use crate::as_path::AsPathStats;
use crate::prefix::Prefix;
use crate::registry::VerificationOutcome;
use crate::routes::AnnouncedRoute;
use crate::shared::{AggregationScope, AnalysisError, ASN};

/// Final metrics of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub generated_at: DateTime<Utc>,
    pub scope: AggregationScope,
    pub total_routes: usize,
    pub skipped_rows: usize,
    pub total_unique_prefixes: usize,
    pub average_prefix_length: f64,
    pub reductions: usize,
    pub aggregatable_prefixes: usize,
    pub non_aggregatable_prefixes: usize,
    pub disaggregation_factor: f64,
    pub longest_as_path: usize,
    pub average_as_path: f64,
    pub origin_asns: usize,
    pub registry_checked: bool,
    pub unregistered_asns: usize,
    /// Route rows whose origin is unregistered, duplicates included.
    pub unregistered_asn_prefixes: usize,
    pub unregistered_asn_unique_prefixes: usize,
    pub lookup_failures: usize,
    pub unregistered_detail: BTreeMap<ASN, BTreeSet<Prefix>>,
}

impl MetricsSnapshot {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Writes `metrics_<timestamp>.json` into `output_dir`.
    pub fn save_to_file(&self, output_dir: &Path) -> Result<PathBuf, AnalysisError> {
        let file_name = format!("metrics_{}.json", self.generated_at.format("%Y%m%dT%H%M%SZ"));
        let file_path = output_dir.join(file_name);
        let output_error = |source| AnalysisError::Output {
            path: file_path.clone(),
            source,
        };

        fs::create_dir_all(output_dir).map_err(output_error)?;
        fs::write(&file_path, self.to_json()?).map_err(output_error)?;
        Ok(file_path)
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Analysis Summary ({})", self.generated_at.format("%Y-%m-%d %H:%M UTC"))?;
        writeln!(f, "----------------")?;
        writeln!(f, "Routes analyzed: {} ({} skipped)", self.total_routes, self.skipped_rows)?;
        writeln!(f, "Total prefixes: {}", self.total_unique_prefixes)?;
        writeln!(f, "Average Prefix Length: {:.2}", self.average_prefix_length)?;
        writeln!(f, "Maximum Aggregateable Prefixes: {}", self.aggregatable_prefixes)?;
        writeln!(f, "Unaggregateables Prefixes: {}", self.non_aggregatable_prefixes)?;
        writeln!(f, "Disaggregation Factor: {:.2}", self.disaggregation_factor)?;
        writeln!(f, "Longest AS-Path: {}", self.longest_as_path)?;
        writeln!(f, "Average AS-Path: {:.2}", self.average_as_path)?;
        writeln!(f, "Origin ASNs: {}", self.origin_asns)?;
        if self.registry_checked {
            writeln!(f, "Total unregistered ASNs: {}", self.unregistered_asns)?;
            writeln!(
                f,
                "Prefixes from unregistered ASNs in the Routing Table: {}",
                self.unregistered_asn_prefixes
            )?;
            if self.lookup_failures > 0 {
                writeln!(f, "Registry lookups failed: {}", self.lookup_failures)?;
            }
        } else {
            writeln!(f, "Registry verification: skipped")?;
        }
        Ok(())
    }
}

/// Merges the per-component results into a [`MetricsSnapshot`].
pub struct ReportBuilder<'a> {
    routes: &'a [AnnouncedRoute],
    skipped_rows: usize,
    scope: AggregationScope,
    aggregation: AggregationStats,
    as_paths: AsPathStats,
    verification: Option<VerificationOutcome>,
    generated_at: DateTime<Utc>,
}

impl<'a> ReportBuilder<'a> {
    pub fn new(routes: &'a [AnnouncedRoute]) -> Self {
        ReportBuilder {
            routes,
            skipped_rows: 0,
            scope: AggregationScope::default(),
            aggregation: AggregationStats::default(),
            as_paths: AsPathStats::default(),
            verification: None,
            generated_at: Utc::now(),
        }
    }

    pub fn with_skipped_rows(mut self, skipped_rows: usize) -> Self {
        self.skipped_rows = skipped_rows;
        self
    }

    pub fn with_scope(mut self, scope: AggregationScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_aggregation(mut self, aggregation: AggregationStats) -> Self {
        self.aggregation = aggregation;
        self
    }

    pub fn with_as_paths(mut self, as_paths: AsPathStats) -> Self {
        self.as_paths = as_paths;
        self
    }

    pub fn with_verification(mut self, verification: VerificationOutcome) -> Self {
        self.verification = Some(verification);
        self
    }

    pub fn with_generated_at(mut self, generated_at: DateTime<Utc>) -> Self {
        self.generated_at = generated_at;
        self
    }

    pub fn build(self) -> MetricsSnapshot {
        let origins: BTreeSet<&str> = self.routes.iter().map(|r| r.origin_asn.as_str()).collect();

        let mut unregistered_asn_prefixes = 0;
        let mut unregistered_detail: BTreeMap<ASN, BTreeSet<Prefix>> = BTreeMap::new();
        if let Some(verification) = &self.verification {
            for route in self.routes {
                // An origin missing from the outcome was never classified
                // and is reported as unregistered.
                if verification.is_registered(&route.origin_asn) != Some(true) {
                    unregistered_asn_prefixes += 1;
                    unregistered_detail
                        .entry(route.origin_asn.clone())
                        .or_default()
                        .insert(route.prefix);
                }
            }
        }
        let unregistered_asn_unique_prefixes = unregistered_detail
            .values()
            .flatten()
            .collect::<BTreeSet<_>>()
            .len();

        MetricsSnapshot {
            generated_at: self.generated_at,
            scope: self.scope,
            total_routes: self.routes.len(),
            skipped_rows: self.skipped_rows,
            total_unique_prefixes: self.aggregation.total_prefixes,
            average_prefix_length: self.aggregation.average_prefix_length,
            reductions: self.aggregation.reductions,
            aggregatable_prefixes: self.aggregation.aggregatable_prefixes,
            non_aggregatable_prefixes: self.aggregation.non_aggregatable_prefixes,
            disaggregation_factor: self.aggregation.disaggregation_factor,
            longest_as_path: self.as_paths.longest,
            average_as_path: self.as_paths.average,
            origin_asns: origins.len(),
            registry_checked: self.verification.is_some(),
            unregistered_asns: unregistered_detail.len(),
            unregistered_asn_prefixes,
            unregistered_asn_unique_prefixes,
            lookup_failures: self
                .verification
                .as_ref()
                .map_or(0, |verification| verification.lookup_failures),
            unregistered_detail,
        }
    }
}

// Re-export all public modules
pub mod shared;
pub mod prefix;
pub mod routes;
pub mod as_path;
pub mod aggregation;
pub mod registry;
pub mod report;
pub mod analysis_runner;

// Re-export commonly used types at the crate root
pub use aggregation::{AggregationEngine, AggregationStats, PrefixTrie};
pub use analysis_runner::{AnalysisConfig, AnalysisRunner};
pub use prefix::Prefix;
pub use registry::{RegistryCache, RegistryLookup, RegistryVerifier, VerifierConfig};
pub use report::{MetricsSnapshot, ReportBuilder};
pub use routes::{AnnouncedRoute, RouteTable};
pub use shared::{AggregationScope, RegistrationStatus, ASN};

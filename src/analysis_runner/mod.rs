pub mod analysis_config;
pub mod analysis_runner;

pub use analysis_config::AnalysisConfig;
pub use analysis_runner::AnalysisRunner;

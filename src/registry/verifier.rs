use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::shared::{RegistrationStatus, ASN};

use super::cache::RegistryCache;
use super::lookup::{classify_response, RegistryLookup};

pub const DEFAULT_MAX_CONCURRENCY: usize = 200;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Ceiling on registry lookups in flight at once.
    pub max_concurrency: usize,
    /// Attempts per ASN before it is downgraded to unregistered.
    pub max_attempts: u32,
    /// Wait after the first failed attempt; doubled after each further one.
    pub base_backoff: Duration,
    pub show_progress: bool,
}

impl VerifierConfig {
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_base_backoff(mut self, base_backoff: Duration) -> Self {
        self.base_backoff = base_backoff;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Delay before attempt `attempt + 1`, where `attempt` counts from 1.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff
            .saturating_mul(1u32 << attempt.saturating_sub(1).min(16))
    }
}

impl Default for VerifierConfig {
    fn default() -> Self {
        VerifierConfig {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_backoff: DEFAULT_BASE_BACKOFF,
            show_progress: false,
        }
    }
}

/// Classification of every ASN handed to [`RegistryVerifier::verify_all`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VerificationOutcome {
    pub statuses: BTreeMap<ASN, RegistrationStatus>,
    pub from_cache: usize,
    pub looked_up: usize,
    pub lookup_failures: usize,
}

impl VerificationOutcome {
    /// Lookup failures count as unregistered.
    pub fn is_registered(&self, asn: &str) -> Option<bool> {
        self.statuses.get(asn).map(RegistrationStatus::is_registered)
    }

    pub fn unregistered(&self) -> BTreeSet<&str> {
        self.statuses
            .iter()
            .filter(|(_, status)| !status.is_registered())
            .map(|(asn, _)| asn.as_str())
            .collect()
    }
}

/// Checks origin ASNs against an external registry with at most
/// `max_concurrency` lookups in flight.
pub struct RegistryVerifier {
    lookup: Arc<dyn RegistryLookup>,
    config: VerifierConfig,
}

impl RegistryVerifier {
    pub fn new(lookup: Arc<dyn RegistryLookup>, config: VerifierConfig) -> Self {
        RegistryVerifier { lookup, config }
    }

    /// Classifies every distinct ASN. Cached answers are reused; the rest
    /// are looked up and written back to `cache` as each one completes.
    pub async fn verify_all<I>(&self, asns: I, cache: Arc<RegistryCache>) -> VerificationOutcome
    where
        I: IntoIterator,
        I::Item: Into<ASN>,
    {
        let distinct: BTreeSet<ASN> = asns.into_iter().map(Into::into).collect();
        let mut outcome = VerificationOutcome::default();

        let mut pending = BTreeSet::new();
        for asn in distinct {
            match cache.get(&asn) {
                Some(registered) => {
                    outcome.from_cache += 1;
                    outcome
                        .statuses
                        .insert(asn, RegistrationStatus::from_registered(registered));
                }
                None => {
                    pending.insert(asn);
                }
            }
        }

        if pending.is_empty() {
            debug!(cached = outcome.from_cache, "all origin ASNs answered from cache");
            return outcome;
        }
        info!(
            pending = pending.len(),
            cached = outcome.from_cache,
            max_concurrency = self.config.max_concurrency,
            "verifying origin ASNs"
        );

        let progress = self.progress_bar(pending.len() as u64);
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut join_set: JoinSet<(ASN, RegistrationStatus)> = JoinSet::new();

        for asn in pending.iter().cloned() {
            let semaphore = semaphore.clone();
            let lookup = self.lookup.clone();
            let config = self.config.clone();
            let cache = cache.clone();
            let progress = progress.clone();

            join_set.spawn(async move {
                let status = match semaphore.acquire_owned().await {
                    Ok(_permit) => verify_one(lookup.as_ref(), &asn, &config).await,
                    Err(_) => RegistrationStatus::LookupFailed,
                };
                let registered = status.is_registered();
                if let Err(e) = cache.put_and_persist(asn.clone(), registered).await {
                    warn!(asn = %asn, error = %e, "failed to persist ASN cache");
                }
                progress.inc(1);
                (asn, status)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((asn, status)) => {
                    outcome.looked_up += 1;
                    if status == RegistrationStatus::LookupFailed {
                        outcome.lookup_failures += 1;
                    }
                    outcome.statuses.insert(asn, status);
                }
                Err(e) => warn!(error = %e, "registry verification task failed"),
            }
        }
        progress.finish_and_clear();

        // A task that died never reported back; its ASN is still owed an answer.
        for asn in pending {
            if !outcome.statuses.contains_key(&asn) {
                if let Err(e) = cache.put_and_persist(asn.clone(), false).await {
                    warn!(asn = %asn, error = %e, "failed to persist ASN cache");
                }
                outcome.looked_up += 1;
                outcome.lookup_failures += 1;
                outcome.statuses.insert(asn, RegistrationStatus::LookupFailed);
            }
        }

        info!(
            looked_up = outcome.looked_up,
            failures = outcome.lookup_failures,
            unregistered = outcome.unregistered().len(),
            "registry verification finished"
        );
        outcome
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let progress = ProgressBar::new(len);
        let template = "{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} ASNs ({eta})";
        if let Ok(style) = ProgressStyle::with_template(template) {
            progress.set_style(style);
        }
        progress
    }
}

/// One ASN: query, retrying transport failures with exponential backoff.
/// Exhausting every attempt yields `LookupFailed`.
pub async fn verify_one(
    lookup: &dyn RegistryLookup,
    asn: &str,
    config: &VerifierConfig,
) -> RegistrationStatus {
    let max_attempts = config.max_attempts.max(1);
    for attempt in 1..=max_attempts {
        match lookup.query(asn).await {
            Ok(response) => return classify_response(&response),
            Err(e) if attempt < max_attempts => {
                let delay = config.backoff(attempt);
                debug!(
                    asn,
                    attempt,
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "registry lookup failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                warn!(
                    asn,
                    attempts = max_attempts,
                    error = %e,
                    "registry lookup failed, treating ASN as unregistered"
                );
            }
        }
    }
    RegistrationStatus::LookupFailed
}

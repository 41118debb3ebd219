use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::prefix::Prefix;
use crate::routes::AnnouncedRoute;
use crate::shared::AggregationScope;

use super::prefix_trie::PrefixTrie;

/// Results of one aggregation pass over a routing table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregationStats {
    pub total_prefixes: usize,
    pub average_prefix_length: f64,
    /// Successful supernet/sibling lookups during the sweep.
    pub reductions: usize,
    /// Distinct prefixes that took part in at least one reduction.
    pub aggregatable_prefixes: usize,
    pub non_aggregatable_prefixes: usize,
    /// Aggregated prefixes left once those covered by a shorter aggregated
    /// prefix are dropped.
    pub summarized_prefixes: usize,
    pub disaggregation_factor: f64,
    #[serde(skip)]
    pub aggregated: BTreeSet<Prefix>,
}

pub struct AggregationEngine {
    pub scope: AggregationScope,
}

impl AggregationEngine {
    pub fn new(scope: AggregationScope) -> Self {
        AggregationEngine { scope }
    }

    pub fn analyze(&self, routes: &[AnnouncedRoute]) -> AggregationStats {
        let distinct: BTreeSet<Prefix> = routes.iter().map(|route| route.prefix).collect();
        if distinct.is_empty() {
            return AggregationStats::default();
        }

        // One table-wide trie: a supernet from any origin makes a
        // sub-prefix redundant.
        let mut trie: PrefixTrie = distinct.iter().copied().collect();

        let mut reductions = 0;
        for (origin, group) in self.groups(routes, &distinct) {
            let group_reductions = sweep_group(&mut trie, &group);
            if group_reductions > 0 {
                debug!(origin, reductions = group_reductions, "aggregated prefixes for origin");
            }
            reductions += group_reductions;
        }
        // Flags accumulate across groups: a prefix counts once however many
        // groups paired it.
        let aggregated: BTreeSet<Prefix> = trie.aggregated_prefixes().into_iter().collect();

        let total_prefixes = distinct.len();
        let length_sum: usize = distinct.iter().map(|prefix| prefix.length() as usize).sum();
        let summarized_prefixes = summarized_count(&aggregated);
        let disaggregation_factor = if summarized_prefixes == 0 {
            0.0
        } else {
            total_prefixes as f64 / summarized_prefixes as f64
        };

        AggregationStats {
            total_prefixes,
            average_prefix_length: length_sum as f64 / total_prefixes as f64,
            reductions,
            aggregatable_prefixes: aggregated.len(),
            non_aggregatable_prefixes: total_prefixes - aggregated.len(),
            summarized_prefixes,
            disaggregation_factor,
            aggregated,
        }
    }

    /// Distinct prefixes per sweep group, each group ordered by
    /// (length, base).
    fn groups<'a>(
        &self,
        routes: &'a [AnnouncedRoute],
        distinct: &BTreeSet<Prefix>,
    ) -> BTreeMap<&'a str, BTreeSet<Prefix>> {
        match self.scope {
            AggregationScope::Global => BTreeMap::from([("*", distinct.clone())]),
            AggregationScope::PerOrigin => {
                let mut groups: BTreeMap<&str, BTreeSet<Prefix>> = BTreeMap::new();
                for route in routes {
                    groups
                        .entry(route.origin_asn.as_str())
                        .or_default()
                        .insert(route.prefix);
                }
                groups
            }
        }
    }
}

impl Default for AggregationEngine {
    fn default() -> Self {
        Self::new(AggregationScope::default())
    }
}

/// Broader prefixes are visited first so a supernet is consumed before its
/// sub-prefixes come up. Only pairings made within this group skip a
/// member; trie flags left by earlier groups do not.
fn sweep_group(trie: &mut PrefixTrie, group: &BTreeSet<Prefix>) -> usize {
    let mut reductions = 0;
    let mut aggregated_in_group = HashSet::new();

    for prefix in group {
        if aggregated_in_group.contains(prefix) {
            continue;
        }
        if let Some(matched) = trie.find_supernet_or_sibling(prefix) {
            reductions += 1;
            trie.mark_aggregated(prefix);
            trie.mark_aggregated(&matched);
            aggregated_in_group.insert(*prefix);
            aggregated_in_group.insert(matched);
        }
    }

    reductions
}

fn summarized_count(aggregated: &BTreeSet<Prefix>) -> usize {
    let trie: PrefixTrie = aggregated.iter().copied().collect();
    aggregated
        .iter()
        .filter(|prefix| trie.find_supernet(prefix).is_none())
        .count()
}

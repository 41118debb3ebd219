use serde::Serialize;

use crate::routes::AnnouncedRoute;
use crate::shared::ASN;

/// Splits an AS path into hop tokens, flattening AS-SET and confederation
/// notation (`{64500,64501}`) into plain tokens.
pub fn clean_as_path(as_path: &str) -> Vec<String> {
    as_path
        .replace(['{', '}'], "")
        .replace(',', " ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

pub fn path_length(as_path: &str) -> usize {
    clean_as_path(as_path).len()
}

/// Last hop of a cleaned path, the AS that originated the route.
pub fn origin_asn(hops: &[String]) -> Option<ASN> {
    hops.last().cloned()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AsPathStats {
    pub routes: usize,
    pub longest: usize,
    pub average: f64,
}

impl AsPathStats {
    /// Hop count statistics over every route row, duplicates included.
    pub fn from_routes(routes: &[AnnouncedRoute]) -> Self {
        if routes.is_empty() {
            return AsPathStats::default();
        }

        let lengths = routes.iter().map(|route| route.as_path.len());
        let longest = lengths.clone().max().unwrap_or(0);
        let total: usize = lengths.sum();

        AsPathStats {
            routes: routes.len(),
            longest,
            average: total as f64 / routes.len() as f64,
        }
    }
}

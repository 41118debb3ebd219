pub mod engine;
pub mod prefix_trie;

pub use engine::{AggregationEngine, AggregationStats};
pub use prefix_trie::{PrefixNode, PrefixTrie};

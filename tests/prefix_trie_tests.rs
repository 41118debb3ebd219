use ipv6_aggregation::aggregation::PrefixTrie;
use ipv6_aggregation::prefix::Prefix;

fn p(s: &str) -> Prefix {
    s.parse().unwrap()
}

fn trie_of(prefixes: &[&str]) -> PrefixTrie {
    prefixes.iter().map(|s| p(s)).collect()
}

#[test]
fn test_insert_twice_is_idempotent() {
    let mut trie = PrefixTrie::new();
    trie.insert(p("2001:db8::/33"));
    trie.insert(p("2001:db8::/33"));

    assert_eq!(trie.len(), 1);
    assert!(trie.contains(&p("2001:db8::/33")));

    // The second insert reaches the same terminal, so a mark survives it
    trie.mark_aggregated(&p("2001:db8::/33"));
    trie.insert(p("2001:db8::/33"));
    assert_eq!(trie.len(), 1);
    assert!(trie.is_aggregated(&p("2001:db8::/33")));
}

#[test]
fn test_sibling_detection() {
    let trie = trie_of(&["2001:db8::/33", "2001:db8:8000::/33"]);

    // Upper half finds the lower half and vice versa
    assert_eq!(
        trie.find_supernet_or_sibling(&p("2001:db8:8000::/33")),
        Some(p("2001:db8::/33"))
    );
    assert_eq!(
        trie.find_supernet_or_sibling(&p("2001:db8::/33")),
        Some(p("2001:db8:8000::/33"))
    );
}

#[test]
fn test_supernet_dominance() {
    let trie = trie_of(&["2001:db8::/32", "2001:db8::/40"]);

    assert_eq!(
        trie.find_supernet_or_sibling(&p("2001:db8::/40")),
        Some(p("2001:db8::/32"))
    );
    assert_eq!(trie.find_supernet_or_sibling(&p("2001:db8::/32")), None);
}

#[test]
fn test_longest_supernet_wins() {
    let trie = trie_of(&["2001:db8::/32", "2001:db8::/40", "2001:db8::/48"]);

    assert_eq!(trie.find_supernet(&p("2001:db8::/48")), Some(p("2001:db8::/40")));
    // Query prefixes need not be stored themselves
    assert_eq!(trie.find_supernet(&p("2001:db8:ff00::/64")), Some(p("2001:db8::/32")));
}

#[test]
fn test_sibling_preferred_over_supernet() {
    let trie = trie_of(&["2001:db8::/32", "2001:db8::/33", "2001:db8:8000::/33"]);

    assert_eq!(
        trie.find_supernet_or_sibling(&p("2001:db8::/33")),
        Some(p("2001:db8:8000::/33"))
    );
}

#[test]
fn test_no_false_aggregation() {
    let trie = trie_of(&["2001:db8::/48", "2001:db9::/48"]);

    assert_eq!(trie.find_supernet_or_sibling(&p("2001:db8::/48")), None);
    assert_eq!(trie.find_supernet_or_sibling(&p("2001:db9::/48")), None);
}

#[test]
fn test_adjacent_blocks_that_are_not_siblings() {
    // 2001:db8:8000::/33 and 2001:db9::/33 are adjacent but straddle a /32
    // boundary, so they do not form a /32 together
    let trie = trie_of(&["2001:db8:8000::/33", "2001:db9::/33"]);

    assert_eq!(trie.find_supernet_or_sibling(&p("2001:db8:8000::/33")), None);
    assert_eq!(trie.find_supernet_or_sibling(&p("2001:db9::/33")), None);
}

#[test]
fn test_different_lengths_are_not_siblings() {
    let trie = trie_of(&["2001:db8::/33", "2001:db8:8000::/34"]);

    assert_eq!(trie.find_supernet_or_sibling(&p("2001:db8::/33")), None);
    assert_eq!(trie.find_supernet_or_sibling(&p("2001:db8:8000::/34")), None);
}

#[test]
fn test_mark_aggregated() {
    let mut trie = trie_of(&["2001:db8::/32", "2001:db8::/40"]);

    trie.mark_aggregated(&p("2001:db8::/40"));
    assert!(trie.is_aggregated(&p("2001:db8::/40")));
    assert!(!trie.is_aggregated(&p("2001:db8::/32")));

    // Paths that exist without a matching terminal are left alone
    trie.mark_aggregated(&p("2001:db8::/36"));
    assert!(!trie.is_aggregated(&p("2001:db8::/36")));
    trie.mark_aggregated(&p("2001:dead::/32"));
    assert_eq!(trie.len(), 2);
}

#[test]
fn test_full_length_prefixes() {
    let trie = trie_of(&["2001:db8::/128", "2001:db8::1/128", "2001:db8::/127"]);

    assert_eq!(
        trie.find_supernet_or_sibling(&p("2001:db8::1/128")),
        Some(p("2001:db8::/128"))
    );
    assert_eq!(trie.find_supernet(&p("2001:db8::1/128")), Some(p("2001:db8::/127")));
}

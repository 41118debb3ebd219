use crate::prefix::Prefix;

/// One level of the binary trie. `left` follows a 0 bit, `right` a 1 bit.
#[derive(Debug, Default)]
pub struct PrefixNode {
    pub prefix: Option<Prefix>,
    pub aggregated: bool,
    pub left: Option<Box<PrefixNode>>,
    pub right: Option<Box<PrefixNode>>,
}

impl PrefixNode {
    pub fn new() -> Self {
        PrefixNode::default()
    }

    fn child(&self, bit: bool) -> Option<&PrefixNode> {
        if bit {
            self.right.as_deref()
        } else {
            self.left.as_deref()
        }
    }

    fn child_mut(&mut self, bit: bool) -> Option<&mut PrefixNode> {
        if bit {
            self.right.as_deref_mut()
        } else {
            self.left.as_deref_mut()
        }
    }

    fn child_or_insert(&mut self, bit: bool) -> &mut PrefixNode {
        let slot = if bit { &mut self.right } else { &mut self.left };
        slot.get_or_insert_with(|| Box::new(PrefixNode::new()))
    }
}

/// Bit trie over IPv6 prefixes, one address bit per level.
///
/// A node at depth `d` holds a terminal prefix only when that prefix is
/// `d` bits long, so every terminal seen while walking towards a prefix
/// numerically contains it.
#[derive(Debug, Default)]
pub struct PrefixTrie {
    root: PrefixNode,
    len: usize,
}

impl PrefixTrie {
    pub fn new() -> Self {
        PrefixTrie::default()
    }

    /// Number of distinct prefixes stored.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn insert(&mut self, prefix: Prefix) {
        let mut node = &mut self.root;
        for index in 0..prefix.length() {
            node = node.child_or_insert(prefix.bit(index));
        }
        if node.prefix.replace(prefix).is_none() {
            self.len += 1;
        }
    }

    pub fn contains(&self, prefix: &Prefix) -> bool {
        self.node(prefix)
            .map_or(false, |node| node.prefix.as_ref() == Some(prefix))
    }

    /// Returns the same-length sibling of `prefix` when it is stored,
    /// otherwise the longest stored prefix strictly shorter than `prefix`
    /// that contains it.
    pub fn find_supernet_or_sibling(&self, prefix: &Prefix) -> Option<Prefix> {
        if let Some(sibling) = prefix.sibling() {
            if self.contains(&sibling) {
                return Some(sibling);
            }
        }
        self.find_supernet(prefix)
    }

    /// Longest stored prefix strictly shorter than `prefix` containing it.
    pub fn find_supernet(&self, prefix: &Prefix) -> Option<Prefix> {
        let mut candidate = self.root.prefix.filter(|p| p.length() < prefix.length());
        let mut node = &self.root;
        for index in 0..prefix.length() {
            match node.child(prefix.bit(index)) {
                Some(child) => node = child,
                None => break,
            }
            if let Some(stored) = node.prefix {
                if stored.length() < prefix.length() {
                    candidate = Some(stored);
                }
            }
        }
        candidate
    }

    /// Flags the terminal for `prefix`. Unknown prefixes are ignored.
    pub fn mark_aggregated(&mut self, prefix: &Prefix) {
        if let Some(node) = self.node_mut(prefix) {
            if node.prefix.as_ref() == Some(prefix) {
                node.aggregated = true;
            }
        }
    }

    pub fn is_aggregated(&self, prefix: &Prefix) -> bool {
        self.node(prefix)
            .map_or(false, |node| node.aggregated && node.prefix.as_ref() == Some(prefix))
    }

    /// Flagged prefixes in trie order (pre-order, 0 branch first).
    pub fn aggregated_prefixes(&self) -> Vec<Prefix> {
        let mut prefixes = Vec::new();
        let mut stack: Vec<&PrefixNode> = vec![&self.root];
        while let Some(node) = stack.pop() {
            if let Some(prefix) = node.prefix.filter(|_| node.aggregated) {
                prefixes.push(prefix);
            }
            if let Some(right) = node.right.as_deref() {
                stack.push(right);
            }
            if let Some(left) = node.left.as_deref() {
                stack.push(left);
            }
        }
        prefixes
    }

    fn node(&self, prefix: &Prefix) -> Option<&PrefixNode> {
        let mut node = &self.root;
        for index in 0..prefix.length() {
            node = node.child(prefix.bit(index))?;
        }
        Some(node)
    }

    fn node_mut(&mut self, prefix: &Prefix) -> Option<&mut PrefixNode> {
        let mut node = &mut self.root;
        for index in 0..prefix.length() {
            node = node.child_mut(prefix.bit(index))?;
        }
        Some(node)
    }
}

impl FromIterator<Prefix> for PrefixTrie {
    fn from_iter<I: IntoIterator<Item = Prefix>>(iter: I) -> Self {
        let mut trie = PrefixTrie::new();
        for prefix in iter {
            trie.insert(prefix);
        }
        trie
    }
}

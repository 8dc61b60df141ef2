//! Pattern-keyed match tree.
//!
//! Every root-to-node path spells out one method + URL pattern, one [`Pattern`]
//! per segment. Children are kept in insertion order, which doubles as the
//! tie-break when several siblings match the same live segment. Lookups scan
//! siblings linearly: a regex can match arbitrary text, so there is no sound
//! way to index children by literal value.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. The tree is built
//! once at load time and only read afterwards.

use crate::definition::MockDefinition;
use crate::pattern::{CaptureSet, Pattern};

/// Handle to a node of a [`MatchTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug)]
struct MatchNode {
    /// `None` only for the root
    pattern: Option<Pattern>,
    children: Vec<NodeId>,
    definition: Option<MockDefinition>,
}

impl MatchNode {
    fn new(pattern: Option<Pattern>) -> Self {
        Self {
            pattern,
            children: Vec::new(),
            definition: None,
        }
    }
}

/// Ordered tree of segment patterns with definitions attached to nodes.
#[derive(Debug)]
pub struct MatchTree {
    nodes: Vec<MatchNode>,
}

impl MatchTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![MatchNode::new(None)],
        }
    }

    /// The synthetic root node. It has no pattern and consumes no segment.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn pattern(&self, node: NodeId) -> Option<&Pattern> {
        self.nodes[node.0].pattern.as_ref()
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    pub fn definition(&self, node: NodeId) -> Option<&MockDefinition> {
        self.nodes[node.0].definition.as_ref()
    }

    /// Insert a pattern sequence below `from` and return the node it ends at.
    ///
    /// `from` stands for the segments already consumed; the first pattern
    /// becomes one of its children. At each level an existing child with the
    /// same source string is reused, so inserting the same sequence twice adds
    /// nothing. An empty sequence returns `from`.
    pub fn insert<I>(&mut self, from: NodeId, patterns: I) -> NodeId
    where
        I: IntoIterator<Item = Pattern>,
    {
        let mut current = from;

        for pattern in patterns {
            let existing = self.nodes[current.0].children.iter().copied().find(|child| {
                self.nodes[child.0]
                    .pattern
                    .as_ref()
                    .is_some_and(|p| p.as_str() == pattern.as_str())
            });

            current = match existing {
                Some(child) => child,
                None => {
                    let child = NodeId(self.nodes.len());
                    self.nodes.push(MatchNode::new(Some(pattern)));
                    self.nodes[current.0].children.push(child);
                    child
                }
            };
        }

        current
    }

    /// Attach a definition to a node, returning the one it replaces.
    pub fn attach(&mut self, node: NodeId, definition: MockDefinition) -> Option<MockDefinition> {
        self.nodes[node.0].definition.replace(definition)
    }

    /// First child of `node` matching a live segment.
    ///
    /// A child matches when its source string equals the segment (no
    /// captures) or its pattern matches the segment (the pattern's captures).
    pub fn find_child(&self, node: NodeId, segment: &str) -> Option<(NodeId, CaptureSet)> {
        self.nodes[node.0].children.iter().find_map(|&child| {
            let pattern = self.nodes[child.0].pattern.as_ref()?;
            if pattern.as_str() == segment {
                return Some((child, CaptureSet::new()));
            }
            pattern.captures(segment).map(|captures| (child, captures))
        })
    }

    /// Walk the tree from the root, one live segment per level.
    ///
    /// Captures of deeper levels overwrite shallower ones. Fails as soon as a
    /// segment has no matching child, so extra trailing segments are a miss.
    /// With fewer segments than the tree is deep, the node reached is returned.
    pub fn resolve<'s, I>(&self, segments: I) -> Option<(NodeId, CaptureSet)>
    where
        I: IntoIterator<Item = &'s str>,
    {
        let mut node = self.root();
        let mut captures = CaptureSet::new();

        for segment in segments {
            let (child, found) = self.find_child(node, segment)?;
            captures.extend(found);
            node = child;
        }

        Some((node, captures))
    }
}

impl Default for MatchTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::ResponseTemplate;
    use proptest::prelude::*;

    fn patterns(sources: &[&str]) -> Vec<Pattern> {
        sources.iter().map(|s| Pattern::new(*s).unwrap()).collect()
    }

    fn definition(name: &str) -> MockDefinition {
        MockDefinition {
            name: name.to_string(),
            header_matchers: Vec::new(),
            body_matcher: None,
            response: ResponseTemplate {
                status: 200,
                headers: Vec::new(),
                body: Vec::new(),
            },
        }
    }

    #[test]
    fn test_new_tree_has_only_root() {
        let tree = MatchTree::new();
        assert!(tree.is_empty());
        assert_eq!(tree.len(), 1);
        assert!(tree.pattern(tree.root()).is_none());
        assert!(tree.children(tree.root()).is_empty());
    }

    #[test]
    fn test_empty_insert_is_noop() {
        let mut tree = MatchTree::new();
        let node = tree.insert(tree.root(), Vec::new());
        assert_eq!(node, tree.root());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_create_path() {
        let mut tree = MatchTree::new();
        let leaf = tree.insert(tree.root(), patterns(&["test", "child"]));

        assert_eq!(tree.children(tree.root()).len(), 1);
        let (test, _) = tree.find_child(tree.root(), "test").unwrap();
        let (child, _) = tree.find_child(test, "child").unwrap();
        assert_eq!(child, leaf);
        assert_eq!(tree.pattern(leaf).unwrap().as_str(), "child");
    }

    #[test]
    fn test_same_sequence_twice_adds_nothing() {
        let mut tree = MatchTree::new();
        let first = tree.insert(tree.root(), patterns(&["child1", "child2"]));
        let size = tree.len();
        let second = tree.insert(tree.root(), patterns(&["child1", "child2"]));

        assert_eq!(first, second);
        assert_eq!(tree.len(), size);
    }

    #[test]
    fn test_same_source_sibling_is_reused() {
        let mut tree = MatchTree::new();
        let first = tree.insert(tree.root(), patterns(&["child"]));
        let second = tree.insert(tree.root(), patterns(&["child"]));
        assert_eq!(first, second);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_add_adjacent() {
        let mut tree = MatchTree::new();
        tree.insert(tree.root(), patterns(&["child1", "child2"]));
        tree.insert(tree.root(), patterns(&["child1", "child3"]));

        let children = tree.children(tree.root());
        assert_eq!(children.len(), 1);
        assert_eq!(tree.children(children[0]).len(), 2);
    }

    #[test]
    fn test_insert_from_inner_node() {
        let mut tree = MatchTree::new();
        let child1 = tree.insert(tree.root(), patterns(&["child1"]));
        let child2 = tree.insert(child1, patterns(&["child2"]));

        let (found, _) = tree.resolve(["child1", "child2"]).unwrap();
        assert_eq!(found, child2);
    }

    #[test]
    fn test_no_skip_when_segment_equals_parent() {
        let mut tree = MatchTree::new();
        let get = tree.insert(tree.root(), patterns(&["get"]));
        let leaf = tree.insert(get, patterns(&["get"]));

        assert_ne!(leaf, get);
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.resolve(["get", "get"]).unwrap().0, leaf);
    }

    #[test]
    fn test_equivalent_regexes_stay_distinct() {
        let mut tree = MatchTree::new();
        let digits = tree.insert(tree.root(), patterns(&[r"\d+"]));
        let class = tree.insert(tree.root(), patterns(&["[0-9]+"]));

        assert_ne!(digits, class);
        // Both match, the first inserted wins.
        assert_eq!(tree.find_child(tree.root(), "123").unwrap().0, digits);
    }

    #[test]
    fn test_literal_insert_does_not_join_matching_regex() {
        let mut tree = MatchTree::new();
        let regex = tree.insert(tree.root(), patterns(&[r"\d+"]));
        let literal = tree.insert(tree.root(), patterns(&["123"]));
        assert_ne!(regex, literal);
        assert_eq!(tree.children(tree.root()).len(), 2);
    }

    #[test]
    fn test_find_child_by_source_has_no_captures() {
        let mut tree = MatchTree::new();
        let node = tree.insert(tree.root(), patterns(&[r"(?P<id>\d+)"]));

        let (found, captures) = tree.find_child(tree.root(), r"(?P<id>\d+)").unwrap();
        assert_eq!(found, node);
        assert!(captures.is_empty());
    }

    #[test]
    fn test_find_child_by_regex() {
        let mut tree = MatchTree::new();
        let node = tree.insert(tree.root(), patterns(&[r"(?P<id>\d+)"]));

        let (found, captures) = tree.find_child(tree.root(), "123").unwrap();
        assert_eq!(found, node);
        assert_eq!(captures.get("id"), Some(&"123".to_string()));
    }

    #[test]
    fn test_find_missing_child() {
        let mut tree = MatchTree::new();
        tree.insert(tree.root(), patterns(&["test"]));
        assert!(tree.find_child(tree.root(), "missing").is_none());
    }

    #[test]
    fn test_earlier_sibling_wins() {
        let mut tree = MatchTree::new();
        let literal = tree.insert(tree.root(), patterns(&["users"]));
        tree.insert(tree.root(), patterns(&["(?P<any>.+)"]));

        let (found, captures) = tree.find_child(tree.root(), "users").unwrap();
        assert_eq!(found, literal);
        assert!(captures.is_empty());
    }

    #[test]
    fn test_resolve_empty_tree() {
        let tree = MatchTree::new();
        assert!(tree.resolve(["test"]).is_none());
    }

    #[test]
    fn test_resolve_deep_regex_path() {
        let mut tree = MatchTree::new();
        let leaf = tree.insert(tree.root(), patterns(&[r"\d+", "test"]));
        let (found, _) = tree.resolve(["123", "test"]).unwrap();
        assert_eq!(found, leaf);
    }

    #[test]
    fn test_resolve_merges_captures_later_wins() {
        let mut tree = MatchTree::new();
        tree.insert(
            tree.root(),
            patterns(&["(?P<a>[a-z]+)", "(?P<a>[0-9]+)-(?P<b>[0-9]+)"]),
        );
        let (_, captures) = tree.resolve(["abc", "1-2"]).unwrap();
        assert_eq!(captures.get("a"), Some(&"1".to_string()));
        assert_eq!(captures.get("b"), Some(&"2".to_string()));
    }

    #[test]
    fn test_resolve_trailing_segment_is_miss() {
        let mut tree = MatchTree::new();
        tree.insert(tree.root(), patterns(&["get", "items"]));
        assert!(tree.resolve(["get", "items", "extra"]).is_none());
    }

    #[test]
    fn test_resolve_shorter_than_tree_returns_inner_node() {
        let mut tree = MatchTree::new();
        let get = tree.insert(tree.root(), patterns(&["get"]));
        tree.insert(get, patterns(&["items"]));

        let (found, _) = tree.resolve(["get"]).unwrap();
        assert_eq!(found, get);
        assert!(tree.definition(found).is_none());
    }

    #[test]
    fn test_attach_last_write_wins() {
        let mut tree = MatchTree::new();
        let node = tree.insert(tree.root(), patterns(&["get"]));

        assert!(tree.attach(node, definition("first")).is_none());
        let replaced = tree.attach(node, definition("second")).unwrap();
        assert_eq!(replaced.name, "first");
        assert_eq!(tree.definition(node).unwrap().name, "second");
    }

    proptest! {
        #[test]
        fn prop_resolve_after_insert_reaches_leaf(
            segments in prop::collection::vec("[a-z]{1,6}", 1..6)
        ) {
            let mut tree = MatchTree::new();
            let sources: Vec<&str> = segments.iter().map(String::as_str).collect();
            let leaf = tree.insert(tree.root(), patterns(&sources));

            let (found, _) = tree.resolve(sources.iter().copied()).unwrap();
            prop_assert_eq!(found, leaf);
        }

        #[test]
        fn prop_insert_is_idempotent(
            paths in prop::collection::vec(
                prop::collection::vec("[a-z0-9]{1,4}", 1..5),
                1..8,
            )
        ) {
            let mut tree = MatchTree::new();
            let first: Vec<NodeId> = paths
                .iter()
                .map(|p| {
                    let sources: Vec<&str> = p.iter().map(String::as_str).collect();
                    tree.insert(tree.root(), patterns(&sources))
                })
                .collect();
            let size = tree.len();

            for (path, expected) in paths.iter().zip(&first) {
                let sources: Vec<&str> = path.iter().map(String::as_str).collect();
                prop_assert_eq!(tree.insert(tree.root(), patterns(&sources)), *expected);
            }
            prop_assert_eq!(tree.len(), size);
        }
    }
}

//! Split documents into chunks keyed on grammar node kinds.
//!
//! Each node of the parsed tree is tested against a list of predicates in
//! document order. A node matching several predicates is emitted once per
//! matching predicate, in predicate order at that node.

use tracing::warn;

use crate::grammar::{Document, LanguageServices, NodeId, NodeKind, NodeRef, Position, Range};

mod mapper;

pub use mapper::{MappingRule, ProgramMapper};

/// Boxed node predicate, for predicate lists built at runtime.
pub type NodePredicate = Box<dyn Fn(NodeRef<'_>) -> bool + Send + Sync>;

/// Predicate matching nodes of one kind.
pub fn kind_is(kind: NodeKind) -> NodePredicate {
    Box::new(move |node: NodeRef<'_>| node.is(kind))
}

/// Options for [`split_by_node`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitOptions {
    /// Token types of comments that extend a chunk backwards. Empty disables
    /// comment lookup.
    pub comment_rule_names: Vec<String>,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            comment_rule_names: vec!["ML_COMMENT".to_string(), "SL_COMMENT".to_string()],
        }
    }
}

impl SplitOptions {
    pub fn without_comments() -> Self {
        Self {
            comment_rule_names: Vec::new(),
        }
    }

    pub fn with_comment_rules<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.comment_rule_names = names.into_iter().map(Into::into).collect();
        self
    }
}

/// Nodes selected by [`split_by_node_to_ast`], together with the document
/// that owns them.
#[derive(Debug, Clone)]
pub struct MatchedNodes {
    document: Document,
    ids: Vec<NodeId>,
}

impl MatchedNodes {
    fn empty(document: Document) -> Self {
        Self {
            document,
            ids: Vec::new(),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn ids(&self) -> &[NodeId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Matched nodes in emission order.
    pub fn iter(&self) -> impl Iterator<Item = NodeRef<'_>> + '_ {
        let tree = self.document.tree();
        self.ids
            .iter()
            .filter_map(move |&id| tree.map(|t| t.node_ref(id)))
    }
}

/// Parse `text` and collect every node matched by `predicates`.
///
/// Blank text and documents with lexer or parser errors give no nodes. Nodes
/// are not deduplicated: a node matching two predicates appears twice.
pub fn split_by_node_to_ast<P>(
    text: &str,
    predicates: &[P],
    services: &dyn LanguageServices,
) -> MatchedNodes
where
    P: Fn(NodeRef<'_>) -> bool,
{
    if text.trim().is_empty() {
        return MatchedNodes::empty(services.parse(""));
    }

    let document = services.parse(text);
    if document.has_parse_errors() {
        warn!(
            lexer_errors = document.lexer_errors(),
            parser_errors = document.parser_errors(),
            "document has syntax errors, not splitting"
        );
        return MatchedNodes::empty(document);
    }
    let ids = match document.tree() {
        Some(tree) => matching_ids(tree.preorder(), predicates),
        None => Vec::new(),
    };
    MatchedNodes { document, ids }
}

/// Parse `text` and cut out the source text of every matched node.
///
/// A chunk runs from the node's start (or the start of the comment attached
/// in front of it) to the node's end. Chunks that are blank after trimming
/// are dropped. Documents with lexer or parser errors give no chunks.
pub fn split_by_node<P>(
    text: &str,
    predicates: &[P],
    services: &dyn LanguageServices,
    options: &SplitOptions,
) -> Vec<String>
where
    P: Fn(NodeRef<'_>) -> bool,
{
    let matched = split_by_node_to_ast(text, predicates, services);
    let document = matched.document();

    let mut chunks = Vec::new();
    for node in matched.iter() {
        let start = chunk_start(document, node.id(), &options.comment_rule_names);
        let chunk = document.text_in_range(&Range::new(start, node.range.end));
        if !chunk.trim().is_empty() {
            chunks.push(chunk.to_string());
        }
    }
    chunks
}

fn matching_ids<'a, P>(nodes: impl Iterator<Item = NodeRef<'a>>, predicates: &[P]) -> Vec<NodeId>
where
    P: Fn(NodeRef<'_>) -> bool,
{
    let mut ids = Vec::new();
    for node in nodes {
        for predicate in predicates {
            if predicate(node) {
                ids.push(node.id());
            }
        }
    }
    ids
}

fn chunk_start(document: &Document, id: NodeId, comment_rules: &[String]) -> Position {
    let Some(tree) = document.tree() else {
        return Position::default();
    };
    let node = tree.node(id);
    match tree.find_comment(id, comment_rules) {
        Some(comment) if comment.range.start < node.range.start => comment.range.start,
        _ => node.range.start,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::DomainModelServices;

    const MODEL: &str = r#"// Shared types
datatype String

/* A person */
entity Person {
    name: String
    // the boss
    boss: Person
}

entity Empty {}
"#;

    #[test]
    fn test_split_entities_with_comments() {
        let services = DomainModelServices::new();
        let chunks = split_by_node(MODEL, &[kind_is(NodeKind::Entity)], &services, &SplitOptions::default());

        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].starts_with("/* A person */\nentity Person {"));
        assert!(chunks[0].ends_with('}'));
        assert_eq!(chunks[1], "entity Empty {}");
    }

    #[test]
    fn test_split_without_comments() {
        let services = DomainModelServices::new();
        let chunks = split_by_node(
            MODEL,
            &[kind_is(NodeKind::Entity)],
            &services,
            &SplitOptions::without_comments(),
        );
        assert!(chunks[0].starts_with("entity Person"));
    }

    #[test]
    fn test_first_element_picks_up_leading_comment() {
        let services = DomainModelServices::new();
        let chunks = split_by_node(MODEL, &[kind_is(NodeKind::DataType)], &services, &SplitOptions::default());
        assert_eq!(chunks, vec!["// Shared types\ndatatype String"]);
    }

    #[test]
    fn test_comment_inside_entity_attaches_to_feature() {
        let services = DomainModelServices::new();
        let chunks = split_by_node(MODEL, &[kind_is(NodeKind::Feature)], &services, &SplitOptions::default());
        assert_eq!(chunks, vec!["name: String", "// the boss\n    boss: Person"]);
    }

    #[test]
    fn test_blank_and_broken_input() {
        let services = DomainModelServices::new();
        let options = SplitOptions::default();
        let predicates = [kind_is(NodeKind::Entity)];

        assert!(split_by_node("   \n", &predicates, &services, &options).is_empty());
        assert!(split_by_node("entity A {", &predicates, &services, &options).is_empty());
        assert!(split_by_node_to_ast("", &predicates, &services).is_empty());
    }

    #[test]
    fn test_broken_input_gives_no_nodes_in_either_mode() {
        let services = DomainModelServices::new();
        let predicates = [kind_is(NodeKind::Entity)];
        let broken = "entity Broken { name String";

        let nodes = split_by_node_to_ast(broken, &predicates, &services);
        assert!(nodes.is_empty());
        assert!(nodes.document().has_parse_errors());

        let chunks = split_by_node(broken, &predicates, &services, &SplitOptions::default());
        assert_eq!(chunks.len(), nodes.len());
    }

    #[test]
    fn test_multiple_predicates_emit_per_match() {
        let services = DomainModelServices::new();
        let predicates = [kind_is(NodeKind::Entity), kind_is(NodeKind::Type)];

        let nodes = split_by_node_to_ast(MODEL, &predicates, &services);
        let kinds: Vec<NodeKind> = nodes.iter().map(|n| n.kind).collect();
        // Type wraps each declaration, so it is visited before its entity.
        assert_eq!(
            kinds,
            vec![NodeKind::Type, NodeKind::Type, NodeKind::Entity, NodeKind::Type, NodeKind::Entity]
        );

        let same = [kind_is(NodeKind::Entity), kind_is(NodeKind::Entity)];
        let chunks = split_by_node(MODEL, &same, &services, &SplitOptions::without_comments());
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0], chunks[1]);
    }

    #[test]
    fn test_ast_and_text_modes_agree() {
        let services = DomainModelServices::new();
        for kind in [NodeKind::Entity, NodeKind::Feature, NodeKind::QualifiedName] {
            let predicates = [kind_is(kind)];
            let nodes = split_by_node_to_ast(MODEL, &predicates, &services);
            let chunks = split_by_node(MODEL, &predicates, &services, &SplitOptions::default());
            assert_eq!(nodes.len(), chunks.len(), "{}", kind);
        }
    }

    #[test]
    fn test_closure_predicates() {
        let services = DomainModelServices::new();
        let named_person = |n: NodeRef<'_>| n.is(NodeKind::Entity) && n.name().as_deref() == Some("Person");
        let chunks = split_by_node(MODEL, &[named_person], &services, &SplitOptions::without_comments());
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("boss: Person"));
    }
}

//! Concrete syntax tree produced by a language parser.
//!
//! Nodes live in an arena owned by [`Tree`] and are addressed by [`NodeId`].
//! Every node keeps its line/character range, byte offsets and a link back to
//! the grammar element that produced it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

/// A position in a text document (0-indexed line and character).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.character + 1)
    }
}

/// A range in a text document. `end` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Whether `other` lies entirely within this range.
    pub fn contains(&self, other: &Range) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// Index of a node inside its [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// The grammar construct a node stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Domainmodel,
    AbstractElement,
    PackageDeclaration,
    Type,
    DataType,
    Entity,
    Feature,
    QualifiedName,
    Keyword,
    Id,
    Comment,
}

impl NodeKind {
    pub const ALL: [NodeKind; 11] = [
        NodeKind::Domainmodel,
        NodeKind::AbstractElement,
        NodeKind::PackageDeclaration,
        NodeKind::Type,
        NodeKind::DataType,
        NodeKind::Entity,
        NodeKind::Feature,
        NodeKind::QualifiedName,
        NodeKind::Keyword,
        NodeKind::Id,
        NodeKind::Comment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Domainmodel => "Domainmodel",
            NodeKind::AbstractElement => "AbstractElement",
            NodeKind::PackageDeclaration => "PackageDeclaration",
            NodeKind::Type => "Type",
            NodeKind::DataType => "DataType",
            NodeKind::Entity => "Entity",
            NodeKind::Feature => "Feature",
            NodeKind::QualifiedName => "QualifiedName",
            NodeKind::Keyword => "Keyword",
            NodeKind::Id => "ID",
            NodeKind::Comment => "Comment",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown node kind: {}", s))
    }
}

/// The grammar element that produced a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrammarSource {
    /// A call of the named rule. `None` when the call could not be linked to a rule.
    RuleCall(Option<String>),
    /// A keyword literal.
    Keyword(String),
}

impl GrammarSource {
    pub fn rule_call(rule: &str) -> Self {
        GrammarSource::RuleCall(Some(rule.to_string()))
    }

    /// Name of the called rule, if this is a resolved rule call.
    pub fn rule_name(&self) -> Option<&str> {
        match self {
            GrammarSource::RuleCall(rule) => rule.as_deref(),
            GrammarSource::Keyword(_) => None,
        }
    }
}

/// A node of the concrete syntax tree.
#[derive(Debug, Clone)]
pub struct CstNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub range: Range,
    /// Byte offset of the start of the node.
    pub offset: usize,
    /// Byte offset one past the end of the node.
    pub end: usize,
    pub grammar_source: Option<GrammarSource>,
    /// The assignment this node was parsed for (`name`, `type`, ...).
    pub feature: Option<&'static str>,
    /// Token type name for leaf nodes (`ID`, `SL_COMMENT`, or the keyword itself).
    pub token_type: Option<String>,
    /// Source text for leaf nodes.
    pub image: Option<String>,
    pub hidden: bool,
    pub leaf: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl CstNode {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Whether this is a hidden leaf whose token type is one of `names`.
    pub fn is_comment(&self, names: &[String]) -> bool {
        self.leaf
            && self.hidden
            && self
                .token_type
                .as_deref()
                .map(|t| names.iter().any(|n| n == t))
                .unwrap_or(false)
    }
}

/// An immutable concrete syntax tree. The root is always the first node.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<CstNode>,
}

impl Tree {
    pub fn root(&self) -> &CstNode {
        &self.nodes[0]
    }

    pub fn root_id(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &CstNode {
        &self.nodes[id.0]
    }

    pub fn node_ref(&self, id: NodeId) -> NodeRef<'_> {
        NodeRef { tree: self, id }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over every node in document order (pre-order).
    pub fn preorder(&self) -> Preorder<'_> {
        Preorder {
            tree: self,
            stack: vec![NodeId(0)],
        }
    }

    /// The node visited right before `id` among its siblings, climbing to the
    /// parent whenever `id` is a first child.
    pub fn previous_node(&self, id: NodeId) -> Option<&CstNode> {
        let mut current = id;
        while let Some(parent) = self.node(current).parent {
            let siblings = &self.node(parent).children;
            if let Some(index) = siblings.iter().position(|&c| c == current) {
                if index > 0 {
                    return Some(self.node(siblings[index - 1]));
                }
            }
            current = parent;
        }
        None
    }

    /// Find the comment directly attached in front of a node.
    ///
    /// The previous node must itself be a comment of one of `names`; for the
    /// root, the hidden nodes before its first visible child are searched.
    pub fn find_comment(&self, id: NodeId, names: &[String]) -> Option<&CstNode> {
        if names.is_empty() {
            return None;
        }
        if let Some(previous) = self.previous_node(id) {
            if previous.is_comment(names) {
                return Some(previous);
            }
        }
        let node = self.node(id);
        if node.parent.is_none() {
            let first_visible = node
                .children
                .iter()
                .position(|&c| !self.node(c).hidden)
                .unwrap_or(node.children.len());
            return node.children[..first_visible]
                .iter()
                .rev()
                .map(|&c| self.node(c))
                .find(|c| c.is_comment(names));
        }
        None
    }

    /// Concatenated text of the visible leaves below `id`.
    pub fn text_of(&self, id: NodeId) -> String {
        let node = self.node(id);
        if node.leaf {
            return node.image.clone().unwrap_or_default();
        }
        let mut text = String::new();
        let mut stack: Vec<NodeId> = node.children.iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            let n = self.node(current);
            if n.leaf {
                if !n.hidden {
                    text.push_str(n.image.as_deref().unwrap_or(""));
                }
            } else {
                stack.extend(n.children.iter().rev().copied());
            }
        }
        text
    }
}

/// Pre-order iterator over a [`Tree`].
pub struct Preorder<'a> {
    tree: &'a Tree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = NodeRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let node = self.tree.node(id);
        self.stack.extend(node.children.iter().rev().copied());
        Some(NodeRef {
            tree: self.tree,
            id,
        })
    }
}

/// A node together with the tree it belongs to.
///
/// This is what predicates and mappers look at: it derefs to [`CstNode`] and
/// can navigate to children by assignment name.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    tree: &'a Tree,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> &'a Tree {
        self.tree
    }

    pub fn node(&self) -> &'a CstNode {
        self.tree.node(self.id)
    }

    pub fn is(&self, kind: NodeKind) -> bool {
        self.node().kind == kind
    }

    pub fn parent(&self) -> Option<NodeRef<'a>> {
        self.node().parent.map(|id| self.tree.node_ref(id))
    }

    pub fn children(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let tree = self.tree;
        tree.node(self.id)
            .children
            .iter()
            .map(move |&id| tree.node_ref(id))
    }

    /// First child assigned to `feature`.
    pub fn child(&self, feature: &str) -> Option<NodeRef<'a>> {
        self.children().find(|c| c.node().feature == Some(feature))
    }

    /// All children assigned to `feature`, in order.
    pub fn children_for(&self, feature: &'a str) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        self.children()
            .filter(move |c| c.node().feature == Some(feature))
    }

    /// Visible text of the node (whitespace and comments dropped).
    pub fn text(&self) -> String {
        self.tree.text_of(self.id)
    }

    /// Text of the `name` assignment, if present.
    pub fn name(&self) -> Option<String> {
        self.child("name").map(|c| c.text())
    }
}

impl Deref for NodeRef<'_> {
    type Target = CstNode;

    fn deref(&self) -> &CstNode {
        self.tree.node(self.id)
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("kind", &self.node().kind)
            .field("range", &self.node().range)
            .finish()
    }
}

/// A lexed token handed to the [`TreeBuilder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafToken {
    pub token_type: String,
    pub image: String,
    pub range: Range,
    pub offset: usize,
    pub end: usize,
}

/// Incrementally builds a [`Tree`] while a parser descends through the grammar.
///
/// Hidden tokens are buffered and attached when the next visible leaf is
/// added. If the innermost open node has no content yet, they are placed in
/// front of the outermost node that was opened without content, so a comment
/// ends up as the previous sibling of the element it precedes.
pub struct TreeBuilder {
    nodes: Vec<CstNode>,
    stack: Vec<NodeId>,
    pending_hidden: Vec<LeafToken>,
    /// Position each node was created at, indexed like `nodes`.
    anchors: Vec<(Position, usize)>,
    last_end: (Position, usize),
}

impl TreeBuilder {
    pub fn new(root_kind: NodeKind) -> Self {
        let root = blank_node(NodeId(0), root_kind, None, None);
        Self {
            nodes: vec![root],
            stack: vec![NodeId(0)],
            pending_hidden: Vec::new(),
            anchors: vec![(Position::default(), 0)],
            last_end: (Position::default(), 0),
        }
    }

    fn current(&self) -> NodeId {
        *self.stack.last().unwrap_or(&NodeId(0))
    }

    /// Open a composite node as the last child of the current node.
    pub fn open(
        &mut self,
        kind: NodeKind,
        source: Option<GrammarSource>,
        feature: Option<&'static str>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        let mut node = blank_node(id, kind, source, feature);
        let parent = self.current();
        node.parent = Some(parent);
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        self.stack.push(id);
        self.anchors.push(self.last_end);
        id
    }

    /// Close the innermost open node. The root is never closed.
    pub fn close(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    /// Buffer a hidden token (comment) until the next visible leaf.
    pub fn hidden(&mut self, token: LeafToken) {
        self.pending_hidden.push(token);
    }

    /// Add a visible leaf to the current node.
    pub fn leaf(
        &mut self,
        kind: NodeKind,
        token: LeafToken,
        source: Option<GrammarSource>,
        feature: Option<&'static str>,
    ) -> NodeId {
        self.flush_hidden();
        let parent = self.current();
        let id = self.push_leaf(kind, token, source, feature, false, parent);
        self.nodes[parent.0].children.push(id);
        id
    }

    fn push_leaf(
        &mut self,
        kind: NodeKind,
        token: LeafToken,
        source: Option<GrammarSource>,
        feature: Option<&'static str>,
        hidden: bool,
        parent: NodeId,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.anchors.push((token.range.start, token.offset));
        self.last_end = (token.range.end, token.end);
        self.nodes.push(CstNode {
            id,
            kind,
            range: token.range,
            offset: token.offset,
            end: token.end,
            grammar_source: source,
            feature,
            token_type: Some(token.token_type),
            image: Some(token.image),
            hidden,
            leaf: true,
            parent: Some(parent),
            children: Vec::new(),
        });
        id
    }

    fn flush_hidden(&mut self) {
        if self.pending_hidden.is_empty() {
            return;
        }
        let tokens = std::mem::take(&mut self.pending_hidden);
        let current = self.current();

        if !self.nodes[current.0].children.is_empty() {
            for token in tokens {
                let id = self.push_leaf(NodeKind::Comment, token, None, None, true, current);
                self.nodes[current.0].children.push(id);
            }
            return;
        }

        let mut target = current;
        while let Some(parent) = self.nodes[target.0].parent {
            let index = self.nodes[parent.0]
                .children
                .iter()
                .position(|&c| c == target)
                .unwrap_or(0);
            if index > 0 {
                self.insert_hidden(parent, index, tokens);
                return;
            }
            target = parent;
        }
        self.insert_hidden(NodeId(0), 0, tokens);
    }

    fn insert_hidden(&mut self, parent: NodeId, index: usize, tokens: Vec<LeafToken>) {
        let ids: Vec<NodeId> = tokens
            .into_iter()
            .map(|token| self.push_leaf(NodeKind::Comment, token, None, None, true, parent))
            .collect();
        let children = &mut self.nodes[parent.0].children;
        children.splice(index..index, ids);
    }

    /// Finish the tree, attaching trailing hidden tokens to the root and
    /// computing composite ranges from their visible leaves.
    pub fn finish(mut self) -> Tree {
        self.stack.truncate(1);
        if !self.pending_hidden.is_empty() {
            let tokens = std::mem::take(&mut self.pending_hidden);
            let end = self.nodes[0].children.len();
            self.insert_hidden(NodeId(0), end, tokens);
        }

        // Children always have larger ids than their parent, so a reverse
        // sweep sees every child span before the parent needs it.
        let mut spans: Vec<Option<(Range, usize, usize)>> = vec![None; self.nodes.len()];
        for index in (0..self.nodes.len()).rev() {
            let node = &self.nodes[index];
            if node.leaf {
                if !node.hidden {
                    spans[index] = Some((node.range, node.offset, node.end));
                }
                continue;
            }
            let first = node.children.iter().find_map(|c| spans[c.0]);
            let last = node.children.iter().rev().find_map(|c| spans[c.0]);
            if let (Some(first), Some(last)) = (first, last) {
                spans[index] = Some((Range::new(first.0.start, last.0.end), first.1, last.2));
            }
        }

        for (index, node) in self.nodes.iter_mut().enumerate() {
            if node.leaf {
                continue;
            }
            match spans[index] {
                Some((range, offset, end)) => {
                    node.range = range;
                    node.offset = offset;
                    node.end = end;
                }
                None => {
                    let (position, offset) = self.anchors.get(index).copied().unwrap_or_default();
                    node.range = Range::new(position, position);
                    node.offset = offset;
                    node.end = offset;
                }
            }
        }

        Tree { nodes: self.nodes }
    }
}

fn blank_node(
    id: NodeId,
    kind: NodeKind,
    source: Option<GrammarSource>,
    feature: Option<&'static str>,
) -> CstNode {
    CstNode {
        id,
        kind,
        range: Range::default(),
        offset: 0,
        end: 0,
        grammar_source: source,
        feature,
        token_type: None,
        image: None,
        hidden: false,
        leaf: false,
        parent: None,
        children: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(token_type: &str, image: &str, line: u32, start: u32, offset: usize) -> LeafToken {
        let len = image.chars().count() as u32;
        LeafToken {
            token_type: token_type.to_string(),
            image: image.to_string(),
            range: Range::new(Position::new(line, start), Position::new(line, start + len)),
            offset,
            end: offset + image.len(),
        }
    }

    #[test]
    fn test_composite_range_skips_hidden_leaves() {
        let mut builder = TreeBuilder::new(NodeKind::Domainmodel);
        builder.hidden(token("SL_COMMENT", "// note", 0, 0, 0));
        builder.open(NodeKind::DataType, Some(GrammarSource::rule_call("DataType")), None);
        builder.leaf(
            NodeKind::Keyword,
            token("datatype", "datatype", 1, 0, 8),
            Some(GrammarSource::Keyword("datatype".into())),
            None,
        );
        builder.leaf(
            NodeKind::Id,
            token("ID", "Text", 1, 9, 17),
            Some(GrammarSource::rule_call("ID")),
            Some("name"),
        );
        builder.close();
        let tree = builder.finish();

        let datatype = tree
            .preorder()
            .find(|n| n.is(NodeKind::DataType))
            .expect("datatype node");
        assert_eq!(datatype.range.start, Position::new(1, 0));
        assert_eq!(datatype.range.end, Position::new(1, 13));
        assert_eq!(datatype.name().as_deref(), Some("Text"));
    }

    #[test]
    fn test_hidden_tokens_hoisted_before_new_node() {
        let mut builder = TreeBuilder::new(NodeKind::Domainmodel);
        builder.open(NodeKind::DataType, Some(GrammarSource::rule_call("DataType")), None);
        builder.leaf(NodeKind::Keyword, token("datatype", "datatype", 0, 0, 0), None, None);
        builder.close();
        builder.hidden(token("SL_COMMENT", "// second", 1, 0, 9));
        let outer = builder.open(
            NodeKind::AbstractElement,
            Some(GrammarSource::rule_call("AbstractElement")),
            None,
        );
        builder.open(NodeKind::Entity, Some(GrammarSource::rule_call("Entity")), None);
        builder.leaf(NodeKind::Keyword, token("entity", "entity", 2, 0, 19), None, None);
        builder.close();
        builder.close();
        let tree = builder.finish();

        let root_children = tree.root().children();
        assert_eq!(root_children.len(), 3);
        assert!(tree.node(root_children[1]).hidden);
        assert_eq!(root_children[2], outer);

        let entity = tree.preorder().find(|n| n.is(NodeKind::Entity)).unwrap();
        let names = vec!["SL_COMMENT".to_string()];
        let comment = tree.find_comment(entity.id(), &names).expect("comment");
        assert_eq!(comment.image.as_deref(), Some("// second"));
    }

    #[test]
    fn test_preorder_visits_in_document_order() {
        let mut builder = TreeBuilder::new(NodeKind::Domainmodel);
        builder.open(NodeKind::Entity, None, None);
        builder.leaf(NodeKind::Id, token("ID", "A", 0, 0, 0), None, Some("name"));
        builder.close();
        builder.open(NodeKind::Entity, None, None);
        builder.leaf(NodeKind::Id, token("ID", "B", 0, 2, 2), None, Some("name"));
        builder.close();
        let tree = builder.finish();

        let names: Vec<String> = tree
            .preorder()
            .filter(|n| n.is(NodeKind::Entity))
            .filter_map(|n| n.name())
            .collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn test_node_kind_from_str() {
        assert_eq!("entity".parse::<NodeKind>(), Ok(NodeKind::Entity));
        assert_eq!("ID".parse::<NodeKind>(), Ok(NodeKind::Id));
        assert!("widget".parse::<NodeKind>().is_err());
    }
}

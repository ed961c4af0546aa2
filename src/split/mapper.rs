//! Map matched nodes to strings with a list of (predicate, formatter) rules.

use crate::grammar::{LanguageServices, NodeRef};

use super::split_by_node_to_ast;

type Formatter = Box<dyn Fn(NodeRef<'_>) -> String + Send + Sync>;
type Predicate = Box<dyn Fn(NodeRef<'_>) -> bool + Send + Sync>;

/// One mapping rule: nodes accepted by `predicate` are rendered by `map`.
pub struct MappingRule {
    predicate: Predicate,
    map: Formatter,
}

impl MappingRule {
    pub fn new<P, M>(predicate: P, map: M) -> Self
    where
        P: Fn(NodeRef<'_>) -> bool + Send + Sync + 'static,
        M: Fn(NodeRef<'_>) -> String + Send + Sync + 'static,
    {
        Self {
            predicate: Box::new(predicate),
            map: Box::new(map),
        }
    }

    pub fn matches(&self, node: NodeRef<'_>) -> bool {
        (self.predicate)(node)
    }

    pub fn apply(&self, node: NodeRef<'_>) -> String {
        (self.map)(node)
    }
}

/// Renders a document through an ordered list of [`MappingRule`]s.
pub struct ProgramMapper<'s> {
    services: &'s dyn LanguageServices,
    rules: Vec<MappingRule>,
}

impl<'s> ProgramMapper<'s> {
    pub fn new(services: &'s dyn LanguageServices) -> Self {
        Self {
            services,
            rules: Vec::new(),
        }
    }

    pub fn with_rule(mut self, rule: MappingRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[MappingRule] {
        &self.rules
    }

    /// Map every node matched by any rule, in document order. For each node
    /// every rule is tried, so one node yields one string per matching rule.
    pub fn map(&self, text: &str) -> Vec<String> {
        if self.rules.is_empty() {
            return Vec::new();
        }

        let any_rule = |node: NodeRef<'_>| self.rules.iter().any(|r| r.matches(node));
        let matched = split_by_node_to_ast(text, &[any_rule], self.services);

        let mut out = Vec::new();
        for node in matched.iter() {
            for rule in &self.rules {
                if rule.matches(node) {
                    out.push(rule.apply(node));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{DomainModelServices, NodeKind};

    const MODEL: &str = r#"
datatype Text
entity Person {
    name: Text
    many friends: Person
}
entity Team extends Person {}
"#;

    fn entity_rule() -> MappingRule {
        MappingRule::new(
            |n| n.is(NodeKind::Entity),
            |n| format!("entity {}", n.name().unwrap_or_default()),
        )
    }

    #[test]
    fn test_map_in_document_order() {
        let services = DomainModelServices::new();
        let mapper = ProgramMapper::new(&services)
            .with_rule(entity_rule())
            .with_rule(MappingRule::new(
                |n| n.is(NodeKind::Feature),
                |n| {
                    let many = if n.child("many").is_some() { "*" } else { "" };
                    format!(
                        "  {}: {}{}",
                        n.name().unwrap_or_default(),
                        n.child("type").map(|t| t.text()).unwrap_or_default(),
                        many
                    )
                },
            ));

        assert_eq!(
            mapper.map(MODEL),
            vec![
                "entity Person",
                "  name: Text",
                "  friends: Person*",
                "entity Team",
            ]
        );
    }

    #[test]
    fn test_node_matching_two_rules_maps_twice() {
        let services = DomainModelServices::new();
        let mapper = ProgramMapper::new(&services)
            .with_rule(entity_rule())
            .with_rule(MappingRule::new(
                |n| n.is(NodeKind::Entity) && n.child("superType").is_some(),
                |n| format!("{} has a parent", n.name().unwrap_or_default()),
            ));

        assert_eq!(
            mapper.map(MODEL),
            vec!["entity Person", "entity Team", "Team has a parent"]
        );
    }

    #[test]
    fn test_broken_document_maps_to_nothing() {
        let services = DomainModelServices::new();
        let mapper = ProgramMapper::new(&services).with_rule(entity_rule());
        assert!(mapper.map("entity Broken { name String").is_empty());
    }

    #[test]
    fn test_no_rules_or_no_matches() {
        let services = DomainModelServices::new();
        assert!(ProgramMapper::new(&services).map(MODEL).is_empty());

        let mapper = ProgramMapper::new(&services).with_rule(MappingRule::new(
            |n| n.is(NodeKind::PackageDeclaration),
            |n| n.text(),
        ));
        assert!(mapper.map(MODEL).is_empty());
    }
}

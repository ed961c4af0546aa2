//! Semantic checks for DomainModel trees: reference linking, duplicate names
//! and naming conventions.

use std::collections::HashMap;

use super::cst::{NodeKind, NodeRef, Tree};
use super::document::Diagnostic;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeclKind {
    DataType,
    Entity,
}

struct Reference<'a> {
    node: NodeRef<'a>,
    name: String,
    /// Enclosing package names, innermost first, ending with the global scope.
    scopes: Vec<String>,
    entities_only: bool,
}

#[derive(Default)]
struct Collector<'a> {
    declarations: HashMap<String, DeclKind>,
    references: Vec<Reference<'a>>,
    diagnostics: Vec<Diagnostic>,
}

/// Run all checks and return their diagnostics.
pub fn validate(tree: &Tree) -> Vec<Diagnostic> {
    let mut collector = Collector::default();
    collect(tree.node_ref(tree.root_id()), "", &mut collector);

    for reference in &collector.references {
        if !resolves(reference, &collector.declarations) {
            let target = if reference.entities_only {
                "Entity"
            } else {
                "Type"
            };
            collector.diagnostics.push(Diagnostic::error(
                format!(
                    "Could not resolve reference to {} named '{}'.",
                    target, reference.name
                ),
                reference.node.range,
            ));
        }
    }

    collector.diagnostics
}

fn qualify(package: &str, name: &str) -> String {
    if package.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", package, name)
    }
}

fn scopes_of(package: &str) -> Vec<String> {
    let mut scopes = Vec::new();
    let mut current = package;
    while !current.is_empty() {
        scopes.push(current.to_string());
        current = current.rfind('.').map(|i| &current[..i]).unwrap_or("");
    }
    scopes.push(String::new());
    scopes
}

fn collect<'a>(node: NodeRef<'a>, package: &str, out: &mut Collector<'a>) {
    match node.kind {
        NodeKind::PackageDeclaration => {
            let name = node.name().unwrap_or_default();
            let inner = qualify(package, &name);
            for child in node.children() {
                collect(child, &inner, out);
            }
            return;
        }
        NodeKind::DataType | NodeKind::Entity => {
            let kind = if node.kind == NodeKind::Entity {
                DeclKind::Entity
            } else {
                DeclKind::DataType
            };
            if let Some(name_node) = node.child("name") {
                let name = name_node.text();
                if name.chars().next().is_some_and(|c| c.is_lowercase()) {
                    out.diagnostics.push(Diagnostic::warning(
                        "Type name should start with a capital.",
                        name_node.range,
                    ));
                }
                let qualified = qualify(package, &name);
                if out.declarations.insert(qualified.clone(), kind).is_some() {
                    out.diagnostics.push(Diagnostic::error(
                        format!("Duplicate element name '{}'.", qualified),
                        name_node.range,
                    ));
                }
            }
            if let Some(super_type) = node.child("superType") {
                push_reference(super_type, package, true, out);
            }
        }
        NodeKind::Feature => {
            if let Some(type_ref) = node.child("type") {
                push_reference(type_ref, package, false, out);
            }
        }
        _ => {}
    }

    for child in node.children() {
        collect(child, package, out);
    }
}

fn push_reference<'a>(node: NodeRef<'a>, package: &str, entities_only: bool, out: &mut Collector<'a>) {
    let name = node.text();
    if name.is_empty() {
        return;
    }
    out.references.push(Reference {
        node,
        name,
        scopes: scopes_of(package),
        entities_only,
    });
}

fn resolves(reference: &Reference<'_>, declarations: &HashMap<String, DeclKind>) -> bool {
    reference.scopes.iter().any(|scope| {
        match declarations.get(&qualify(scope, &reference.name)) {
            Some(DeclKind::Entity) => true,
            Some(DeclKind::DataType) => !reference.entities_only,
            None => false,
        }
    })
}

#[cfg(test)]
mod tests {
    use crate::grammar::{DiagnosticSeverity, DomainModelServices, LanguageServices};

    fn diagnostics(text: &str) -> Vec<(DiagnosticSeverity, String)> {
        DomainModelServices::new()
            .parse(text)
            .diagnostics()
            .iter()
            .map(|d| (d.severity, d.message.clone()))
            .collect()
    }

    #[test]
    fn test_references_resolve_relative_and_qualified() {
        let text = r#"
datatype String
package shop {
    entity Item { name: String }
    package orders {
        entity Order extends shop.Item {
            many items: Item
            label: String
        }
    }
}
"#;
        assert!(diagnostics(text).is_empty());
    }

    #[test]
    fn test_unresolved_reference() {
        let found = diagnostics("entity A { b: Missing }");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, DiagnosticSeverity::Error);
        assert_eq!(found[0].1, "Could not resolve reference to Type named 'Missing'.");
    }

    #[test]
    fn test_extends_requires_entity() {
        let found = diagnostics("datatype Text\nentity A extends Text {}");
        assert_eq!(found.len(), 1);
        assert!(found[0].1.contains("reference to Entity named 'Text'"));
    }

    #[test]
    fn test_duplicate_names() {
        let found = diagnostics("datatype A\nentity A {}");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].1, "Duplicate element name 'A'.");
    }

    #[test]
    fn test_lowercase_type_name_warns() {
        let found = diagnostics("entity person {}");
        assert_eq!(
            found,
            vec![(
                DiagnosticSeverity::Warning,
                "Type name should start with a capital.".to_string()
            )]
        );
    }
}

//! Integration tests for document splitting and the program mapper.

use std::path::PathBuf;

use grambench::grammar::{DomainModelServices, NodeKind, NodeRef};
use grambench::split::{
    kind_is, split_by_node, split_by_node_to_ast, MappingRule, NodePredicate, ProgramMapper,
    SplitOptions,
};

fn library() -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata/library.dmodel");
    std::fs::read_to_string(path).expect("should read fixture")
}

#[test]
fn test_entities_with_attached_comments() {
    let services = DomainModelServices::new();
    let chunks = split_by_node(
        &library(),
        &[kind_is(NodeKind::Entity)],
        &services,
        &SplitOptions::default(),
    );

    assert_eq!(chunks.len(), 3);
    assert!(chunks[0].starts_with("/* A lendable item. */"));
    assert!(chunks[0].trim_end().ends_with('}'));
    assert!(chunks[1].starts_with("entity Author"));
    assert!(chunks[2].starts_with("// Borrowed copies"));
    assert!(chunks[2].contains("entity Loan extends Book"));
}

#[test]
fn test_entities_without_comments() {
    let services = DomainModelServices::new();
    let chunks = split_by_node(
        &library(),
        &[kind_is(NodeKind::Entity)],
        &services,
        &SplitOptions::without_comments(),
    );

    assert_eq!(chunks.len(), 3);
    assert!(chunks.iter().all(|c| c.starts_with("entity ")));
}

#[test]
fn test_chunk_and_node_counts_agree() {
    let services = DomainModelServices::new();
    let text = library();
    let predicates: Vec<NodePredicate> = vec![
        kind_is(NodeKind::DataType),
        kind_is(NodeKind::Entity),
        kind_is(NodeKind::Feature),
    ];

    let chunks = split_by_node(&text, &predicates, &services, &SplitOptions::default());
    let nodes = split_by_node_to_ast(&text, &predicates, &services);
    assert_eq!(chunks.len(), nodes.len());
    assert_eq!(nodes.len(), 2 + 3 + 5);
}

#[test]
fn test_package_scenario_single_entity_chunk() {
    let services = DomainModelServices::new();
    let chunks = split_by_node(
        "package foo.bar { datatype String; entity Person { name: String } }",
        &[kind_is(NodeKind::Entity)],
        &services,
        &SplitOptions::default(),
    );

    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].contains("entity Person"));
}

#[test]
fn test_syntax_errors_give_no_chunks() {
    let services = DomainModelServices::new();
    let chunks = split_by_node(
        "entity Broken { name String",
        &[kind_is(NodeKind::Entity)],
        &services,
        &SplitOptions::default(),
    );
    assert!(chunks.is_empty());
}

#[test]
fn test_mapper_over_fixture() {
    let services = DomainModelServices::new();
    let mapper = ProgramMapper::new(&services)
        .with_rule(MappingRule::new(
            |n| n.is(NodeKind::Entity),
            |n: NodeRef<'_>| format!("entity {}", n.name().unwrap_or_default()),
        ))
        .with_rule(MappingRule::new(
            |n| n.is(NodeKind::Feature) && n.child("many").is_some(),
            |n: NodeRef<'_>| format!("many {}", n.name().unwrap_or_default()),
        ));

    assert_eq!(
        mapper.map(&library()),
        vec!["entity Book", "many authors", "entity Author", "entity Loan"]
    );
}

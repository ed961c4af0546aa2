//! Grammar model and the parsing services the analysis modules consume.
//!
//! This module provides:
//! - `Grammar`/`Rule`: the rule inventory of a language, with import links
//! - `GrammarRegistry`: name-based lookup used to resolve grammar imports
//! - `LanguageServices` trait: parse text into a [`Document`]
//! - A concrete implementation for the DomainModel language

use std::collections::{HashMap, HashSet, VecDeque};
use thiserror::Error;

pub mod cst;
mod document;
mod domainmodel;
pub mod lexer;
mod validate;

pub use cst::{
    CstNode, GrammarSource, LeafToken, NodeId, NodeKind, NodeRef, Position, Range, Tree,
    TreeBuilder,
};
pub use document::{Diagnostic, DiagnosticSeverity, Document, LineIndex};
pub use domainmodel::{common_grammar, domainmodel_grammar, DomainModelServices};

/// Errors raised while resolving grammars.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GrammarError {
    #[error("grammar {grammar:?} imports unknown grammar {import:?}")]
    UnresolvedImport { grammar: String, import: String },
}

/// Whether a rule produces structure or tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Parser,
    Terminal,
}

/// A named grammar production.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub name: String,
    pub kind: RuleKind,
    /// The grammar's designated entry rule.
    pub entry: bool,
    /// Hidden terminals (whitespace, comments).
    pub hidden: bool,
}

impl Rule {
    pub fn parser(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: RuleKind::Parser,
            entry: false,
            hidden: false,
        }
    }

    pub fn terminal(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: RuleKind::Terminal,
            entry: false,
            hidden: false,
        }
    }

    pub fn as_entry(mut self) -> Self {
        self.entry = true;
        self
    }

    pub fn as_hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

/// A grammar: its own rules plus the names of the grammars it imports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grammar {
    pub name: String,
    pub rules: Vec<Rule>,
    pub imports: Vec<String>,
}

impl Grammar {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            rules: Vec::new(),
            imports: Vec::new(),
        }
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_import(mut self, grammar: &str) -> Self {
        self.imports.push(grammar.to_string());
        self
    }

    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }

    pub fn entry_rule(&self) -> Option<&Rule> {
        self.rules.iter().find(|r| r.entry)
    }
}

/// Grammars addressable by name.
#[derive(Debug, Clone, Default)]
pub struct GrammarRegistry {
    grammars: HashMap<String, Grammar>,
}

impl GrammarRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, grammar: Grammar) {
        self.grammars.insert(grammar.name.clone(), grammar);
    }

    pub fn with(mut self, grammar: Grammar) -> Self {
        self.register(grammar);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Grammar> {
        self.grammars.get(name)
    }

    /// Rules of every grammar transitively imported by `grammar`, in import
    /// order. Each grammar contributes once, even with import cycles.
    pub fn imported_rules<'a>(&'a self, grammar: &Grammar) -> Result<Vec<&'a Rule>, GrammarError> {
        let mut rules = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        seen.insert(grammar.name.as_str());
        let mut queue: VecDeque<(String, String)> = grammar
            .imports
            .iter()
            .map(|i| (grammar.name.clone(), i.clone()))
            .collect();

        while let Some((importer, name)) = queue.pop_front() {
            let imported = self
                .grammars
                .get(&name)
                .ok_or_else(|| GrammarError::UnresolvedImport {
                    grammar: importer,
                    import: name.clone(),
                })?;
            if !seen.insert(imported.name.as_str()) {
                continue;
            }
            rules.extend(imported.rules.iter());
            queue.extend(
                imported
                    .imports
                    .iter()
                    .map(|i| (imported.name.clone(), i.clone())),
            );
        }

        Ok(rules)
    }
}

/// Parsing services for one language.
///
/// `parse` never fails: lexing and parsing problems are reported as
/// diagnostics on the returned document.
pub trait LanguageServices: Send + Sync {
    /// Returns the language identifier (e.g., "domainmodel").
    fn language_id(&self) -> &'static str;

    /// The language's own grammar.
    fn grammar(&self) -> &Grammar;

    /// Grammars available for import resolution.
    fn registry(&self) -> &GrammarRegistry;

    /// Parse and validate source text.
    fn parse(&self, text: &str) -> Document;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_imported_rules_transitive() {
        let registry = GrammarRegistry::new()
            .with(Grammar::new("Base").with_rule(Rule::terminal("ID")))
            .with(
                Grammar::new("Mid")
                    .with_rule(Rule::parser("Name"))
                    .with_import("Base"),
            );
        let top = Grammar::new("Top").with_import("Mid");

        let names: Vec<&str> = registry
            .imported_rules(&top)
            .unwrap()
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["Name", "ID"]);
    }

    #[test]
    fn test_imported_rules_cycle() {
        let registry = GrammarRegistry::new()
            .with(Grammar::new("A").with_rule(Rule::parser("X")).with_import("B"))
            .with(Grammar::new("B").with_rule(Rule::parser("Y")).with_import("A"));
        let a = registry.get("A").unwrap().clone();

        let rules = registry.imported_rules(&a).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].name, "Y");
    }

    #[test]
    fn test_unresolved_import() {
        let registry = GrammarRegistry::new();
        let grammar = Grammar::new("Top").with_import("Missing");

        let err = registry.imported_rules(&grammar).unwrap_err();
        assert_eq!(
            err,
            GrammarError::UnresolvedImport {
                grammar: "Top".to_string(),
                import: "Missing".to_string(),
            }
        );
    }
}

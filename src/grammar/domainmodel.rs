//! The DomainModel language: packages, data types and entities with features.
//!
//! ```text
//! entry Domainmodel: (elements+=AbstractElement)*;
//! AbstractElement: PackageDeclaration | Type;
//! PackageDeclaration: 'package' name=QualifiedName '{' (elements+=AbstractElement)* '}';
//! Type: DataType | Entity;
//! DataType: 'datatype' name=ID ';'?;
//! Entity: 'entity' name=ID ('extends' superType=[Entity:QualifiedName])? '{' (features+=Feature)* '}';
//! Feature: (many?='many')? name=ID ':' type=[Type:QualifiedName] ';'?;
//! QualifiedName: ID ('.' ID)*;
//! ```
//!
//! Terminals come from the imported `Common` grammar.

use super::cst::{GrammarSource, LeafToken, NodeKind, Range, TreeBuilder};
use super::document::{Diagnostic, Document, LineIndex};
use super::lexer::{tokenize, Lexeme, TokenKind};
use super::validate::validate;
use super::{Grammar, GrammarRegistry, LanguageServices, Rule};

/// The `Common` terminal grammar.
pub fn common_grammar() -> Grammar {
    Grammar::new("Common")
        .with_rule(Rule::terminal("WS").as_hidden())
        .with_rule(Rule::terminal("ID"))
        .with_rule(Rule::terminal("INT"))
        .with_rule(Rule::terminal("STRING"))
        .with_rule(Rule::terminal("ML_COMMENT").as_hidden())
        .with_rule(Rule::terminal("SL_COMMENT").as_hidden())
}

/// The `DomainModel` grammar.
pub fn domainmodel_grammar() -> Grammar {
    Grammar::new("DomainModel")
        .with_rule(Rule::parser("Domainmodel").as_entry())
        .with_rule(Rule::parser("AbstractElement"))
        .with_rule(Rule::parser("PackageDeclaration"))
        .with_rule(Rule::parser("Type"))
        .with_rule(Rule::parser("DataType"))
        .with_rule(Rule::parser("Entity"))
        .with_rule(Rule::parser("Feature"))
        .with_rule(Rule::parser("QualifiedName"))
        .with_import("Common")
}

/// Language services for DomainModel documents.
pub struct DomainModelServices {
    grammar: Grammar,
    registry: GrammarRegistry,
}

impl DomainModelServices {
    pub fn new() -> Self {
        let grammar = domainmodel_grammar();
        let registry = GrammarRegistry::new()
            .with(common_grammar())
            .with(grammar.clone());
        Self { grammar, registry }
    }

    /// Services whose registry lacks some grammars, so imports may not resolve.
    pub fn with_registry(registry: GrammarRegistry) -> Self {
        Self {
            grammar: domainmodel_grammar(),
            registry,
        }
    }
}

impl Default for DomainModelServices {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageServices for DomainModelServices {
    fn language_id(&self) -> &'static str {
        "domainmodel"
    }

    fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    fn registry(&self) -> &GrammarRegistry {
        &self.registry
    }

    fn parse(&self, text: &str) -> Document {
        if text.trim().is_empty() {
            return Document::empty(text);
        }

        let index = LineIndex::new(text);
        let (tokens, lex_errors) = tokenize(text);

        let mut diagnostics: Vec<Diagnostic> = lex_errors
            .iter()
            .map(|span| {
                Diagnostic::error(
                    format!("Unexpected character sequence `{}`.", &text[span.clone()]),
                    span_range(text, &index, span),
                )
            })
            .collect();

        let mut parser = Parser::new(text, &index, tokens);
        parser.parse_model();
        let parser_errors = parser.errors.len();
        diagnostics.append(&mut parser.errors);
        let tree = parser.builder.finish();

        diagnostics.extend(validate(&tree));

        Document::new(text, Some(tree), diagnostics, lex_errors.len(), parser_errors)
    }
}

fn span_range(text: &str, index: &LineIndex, span: &std::ops::Range<usize>) -> Range {
    Range::new(
        index.position_at(text, span.start),
        index.position_at(text, span.end),
    )
}

/// Recursive-descent parser feeding a [`TreeBuilder`].
///
/// Missing tokens are reported and assumed present; unexpected tokens are
/// reported and skipped.
struct Parser<'a> {
    text: &'a str,
    index: &'a LineIndex,
    tokens: Vec<Lexeme>,
    pos: usize,
    builder: TreeBuilder,
    errors: Vec<Diagnostic>,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str, index: &'a LineIndex, tokens: Vec<Lexeme>) -> Self {
        Self {
            text,
            index,
            tokens,
            pos: 0,
            builder: TreeBuilder::new(NodeKind::Domainmodel),
            errors: Vec::new(),
        }
    }

    /// Move hidden tokens into the builder and return the next visible one.
    fn peek(&mut self) -> Option<TokenKind> {
        while let Some(lexeme) = self.tokens.get(self.pos) {
            if !lexeme.kind.is_hidden() {
                return Some(lexeme.kind);
            }
            let token = self.leaf_token(self.pos);
            self.builder.hidden(token);
            self.pos += 1;
        }
        None
    }

    fn leaf_token(&self, pos: usize) -> LeafToken {
        let lexeme = &self.tokens[pos];
        LeafToken {
            token_type: lexeme.kind.type_name().to_string(),
            image: self.text[lexeme.span.clone()].to_string(),
            range: span_range(self.text, self.index, &lexeme.span),
            offset: lexeme.span.start,
            end: lexeme.span.end,
        }
    }

    fn current_range(&self) -> Range {
        match self.tokens.get(self.pos) {
            Some(lexeme) => span_range(self.text, self.index, &lexeme.span),
            None => {
                let end = self.index.position_at(self.text, self.text.len());
                Range::new(end, end)
            }
        }
    }

    fn found(&self) -> String {
        match self.tokens.get(self.pos) {
            Some(lexeme) => self.text[lexeme.span.clone()].to_string(),
            None => "EOF".to_string(),
        }
    }

    fn error(&mut self, message: String) {
        let range = self.current_range();
        self.errors.push(Diagnostic::error(message, range));
    }

    fn consume(&mut self, kind: NodeKind, source: GrammarSource, feature: Option<&'static str>) {
        let token = self.leaf_token(self.pos);
        self.builder.leaf(kind, token, Some(source), feature);
        self.pos += 1;
    }

    fn keyword(&mut self, expected: TokenKind, feature: Option<&'static str>) -> bool {
        if self.peek() == Some(expected) {
            let image = expected.type_name().to_string();
            self.consume(NodeKind::Keyword, GrammarSource::Keyword(image), feature);
            true
        } else {
            let message = format!(
                "Expecting keyword '{}' but found `{}`.",
                expected.type_name(),
                self.found()
            );
            self.error(message);
            false
        }
    }

    fn optional_keyword(&mut self, expected: TokenKind) {
        if self.peek() == Some(expected) {
            let image = expected.type_name().to_string();
            self.consume(NodeKind::Keyword, GrammarSource::Keyword(image), None);
        }
    }

    fn id(&mut self, feature: Option<&'static str>) {
        if self.peek() == Some(TokenKind::Id) {
            self.consume(NodeKind::Id, GrammarSource::rule_call("ID"), feature);
        } else {
            let message = format!("Expecting token of type 'ID' but found `{}`.", self.found());
            self.error(message);
        }
    }

    fn skip_unexpected(&mut self) {
        let message = format!("Unexpected token `{}`.", self.found());
        self.error(message);
        self.pos += 1;
    }

    fn starts_element(kind: TokenKind) -> bool {
        matches!(
            kind,
            TokenKind::Package | TokenKind::Datatype | TokenKind::Entity
        )
    }

    fn parse_model(&mut self) {
        while let Some(kind) = self.peek() {
            if Self::starts_element(kind) {
                self.parse_abstract_element();
            } else {
                self.skip_unexpected();
            }
        }
    }

    fn parse_abstract_element(&mut self) {
        self.builder.open(
            NodeKind::AbstractElement,
            Some(GrammarSource::rule_call("AbstractElement")),
            Some("elements"),
        );
        match self.peek() {
            Some(TokenKind::Package) => self.parse_package(),
            _ => self.parse_type(),
        }
        self.builder.close();
    }

    fn parse_package(&mut self) {
        self.builder.open(
            NodeKind::PackageDeclaration,
            Some(GrammarSource::rule_call("PackageDeclaration")),
            None,
        );
        self.keyword(TokenKind::Package, None);
        self.parse_qualified_name(Some("name"));
        if self.keyword(TokenKind::LBrace, None) {
            loop {
                match self.peek() {
                    None | Some(TokenKind::RBrace) => break,
                    Some(kind) if Self::starts_element(kind) => self.parse_abstract_element(),
                    Some(_) => self.skip_unexpected(),
                }
            }
            self.keyword(TokenKind::RBrace, None);
        }
        self.builder.close();
    }

    fn parse_type(&mut self) {
        self.builder
            .open(NodeKind::Type, Some(GrammarSource::rule_call("Type")), None);
        match self.peek() {
            Some(TokenKind::Datatype) => self.parse_datatype(),
            _ => self.parse_entity(),
        }
        self.builder.close();
    }

    fn parse_datatype(&mut self) {
        self.builder.open(
            NodeKind::DataType,
            Some(GrammarSource::rule_call("DataType")),
            None,
        );
        self.keyword(TokenKind::Datatype, None);
        self.id(Some("name"));
        self.optional_keyword(TokenKind::Semicolon);
        self.builder.close();
    }

    fn parse_entity(&mut self) {
        self.builder
            .open(NodeKind::Entity, Some(GrammarSource::rule_call("Entity")), None);
        self.keyword(TokenKind::Entity, None);
        self.id(Some("name"));
        if self.peek() == Some(TokenKind::Extends) {
            self.keyword(TokenKind::Extends, None);
            self.parse_qualified_name(Some("superType"));
        }
        if self.keyword(TokenKind::LBrace, None) {
            loop {
                match self.peek() {
                    None | Some(TokenKind::RBrace) => break,
                    Some(TokenKind::Id) | Some(TokenKind::Many) => self.parse_feature(),
                    Some(_) => self.skip_unexpected(),
                }
            }
            self.keyword(TokenKind::RBrace, None);
        }
        self.builder.close();
    }

    fn parse_feature(&mut self) {
        self.builder.open(
            NodeKind::Feature,
            Some(GrammarSource::rule_call("Feature")),
            Some("features"),
        );
        if self.peek() == Some(TokenKind::Many) {
            self.keyword(TokenKind::Many, Some("many"));
        }
        self.id(Some("name"));
        self.keyword(TokenKind::Colon, None);
        self.parse_qualified_name(Some("type"));
        self.optional_keyword(TokenKind::Semicolon);
        self.builder.close();
    }

    fn parse_qualified_name(&mut self, feature: Option<&'static str>) {
        self.builder.open(
            NodeKind::QualifiedName,
            Some(GrammarSource::rule_call("QualifiedName")),
            feature,
        );
        self.id(None);
        while self.peek() == Some(TokenKind::Dot) {
            self.keyword(TokenKind::Dot, None);
            self.id(None);
        }
        self.builder.close();
    }
}

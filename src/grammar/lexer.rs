//! Tokenizer for the DomainModel language, built on logos.
//!
//! Whitespace is skipped by the lexer itself (the `WS` terminal never reaches
//! the tree). Comments are kept and flagged as hidden so the parser can
//! attach them to the tree.

use logos::Logos;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum TokenKind {
    #[token("package")]
    Package,
    #[token("datatype")]
    Datatype,
    #[token("entity")]
    Entity,
    #[token("extends")]
    Extends,
    #[token("many")]
    Many,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token(".")]
    Dot,
    #[regex(r"[_a-zA-Z][_a-zA-Z0-9]*")]
    Id,
    #[regex(r"[0-9]+")]
    Int,
    #[regex(r#""[^"]*""#)]
    String,
    #[regex(r"/\*([^*]|\*+[^*/])*\*+/")]
    MlComment,
    #[regex(r"//[^\n\r]*")]
    SlComment,
}

impl TokenKind {
    /// Token type name as it appears in the grammar.
    pub fn type_name(&self) -> &'static str {
        match self {
            TokenKind::Package => "package",
            TokenKind::Datatype => "datatype",
            TokenKind::Entity => "entity",
            TokenKind::Extends => "extends",
            TokenKind::Many => "many",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Colon => ":",
            TokenKind::Semicolon => ";",
            TokenKind::Dot => ".",
            TokenKind::Id => "ID",
            TokenKind::Int => "INT",
            TokenKind::String => "STRING",
            TokenKind::MlComment => "ML_COMMENT",
            TokenKind::SlComment => "SL_COMMENT",
        }
    }

    pub fn is_hidden(&self) -> bool {
        matches!(self, TokenKind::MlComment | TokenKind::SlComment)
    }

    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::Package
                | TokenKind::Datatype
                | TokenKind::Entity
                | TokenKind::Extends
                | TokenKind::Many
                | TokenKind::LBrace
                | TokenKind::RBrace
                | TokenKind::Colon
                | TokenKind::Semicolon
                | TokenKind::Dot
        )
    }
}

/// A token with its byte span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexeme {
    pub kind: TokenKind,
    pub span: std::ops::Range<usize>,
}

/// Tokenize source text. Unrecognized input is returned separately as byte
/// spans so the caller can report it.
pub fn tokenize(source: &str) -> (Vec<Lexeme>, Vec<std::ops::Range<usize>>) {
    let mut lexer = TokenKind::lexer(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    while let Some(result) = lexer.next() {
        match result {
            Ok(kind) => tokens.push(Lexeme {
                kind,
                span: lexer.span(),
            }),
            Err(()) => errors.push(lexer.span()),
        }
    }

    (tokens, errors)
}

//! Grambench - grammar-aware analysis and evaluation of DSL documents.
//!
//! Grambench measures how documents written in a grammar-defined language
//! exercise that grammar, cuts documents into chunks along grammar
//! constructs, and runs batches of generated responses through scorers.
//!
//! # Architecture
//!
//! - `grammar`: rule inventories, concrete syntax trees and the DomainModel
//!   language services every other module parses through
//! - `statistics`: per-rule usage counts, coverage and diversity metrics
//! - `split`: syntax-aware document splitting and the program mapper
//! - `eval`: cases, runners, scorers, the evaluation matrix, averaging and
//!   persisted run history
//! - `config`: YAML matrix file schema
//! - `report`: output formatting (pretty, JSON)
//!
//! # Adding a New Language
//!
//! Implement the `LanguageServices` trait for it (see
//! `src/grammar/domainmodel.rs`) and pass it wherever a
//! `&dyn LanguageServices` is expected.

pub mod cli;
pub mod config;
pub mod eval;
pub mod grammar;
pub mod report;
pub mod split;
pub mod statistics;

pub use config::MatrixFile;
pub use eval::{
    average_across_cases, average_across_runners, merge_scorers, EvalCase, EvalMatrix,
    EvaluatorResult, MatrixConfig, PartialResult, Runner, Scorer,
};
pub use grammar::{DomainModelServices, LanguageServices, NodeKind, NodeRef};
pub use split::{split_by_node, split_by_node_to_ast, MappingRule, ProgramMapper, SplitOptions};
pub use statistics::{collect_syntax_usage_statistics, AnalysisMode, AnalysisOptions, SyntaxStatistic};

//! Evaluation of generated text against expected text.
//!
//! This module provides:
//! - `EvalCase` loading from YAML case documents
//! - `Scorer` implementations and `merge_scorers`
//! - `Runner` backends (in-process closures and external commands)
//! - `EvalMatrix`: the runner x case x scorer scheduler
//! - Result averaging and persisted run history

pub mod aggregate;
pub mod case;
pub mod history;
pub mod matrix;
pub mod runners;
pub mod scorers;
pub mod types;

pub use aggregate::{average_across_cases, average_across_runners, numeric_keys};
pub use case::{load_cases_from_file, load_cases_from_yaml_str, CaseError, EvalCase, HistoryItem, Role};
pub use history::{
    last_report_path, list_reports, load_last_report, load_report, report_file_name, write_report,
    HistoryError, Report, ReportConfig, LAST_REPORT_FILE,
};
pub use matrix::{EvalMatrix, MatrixConfig, MatrixError, MatrixState};
pub use runners::{CommandRunner, FnRunner, Runner};
pub use scorers::{
    code_or_text, extract_code_blocks, merge_scorers, scorer_by_name, EditDistanceScorer,
    ExactMatchScorer, MergedScorer, Scorer, ValidationScorer, SCORER_NAMES,
};
pub use types::{as_number, number_value, DataMap, EvaluatorResult, PartialResult, ResultMetadata};

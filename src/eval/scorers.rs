//! Scorers: turn an (actual, expected) pair into a metric record.

use futures::future::{BoxFuture, FutureExt};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;

use crate::grammar::{DiagnosticSeverity, LanguageServices};
use crate::statistics::{collect_syntax_usage_statistics, AnalysisMode, AnalysisOptions};

use super::types::PartialResult;

lazy_static! {
    static ref CODE_BLOCK: Regex = Regex::new(r"```[^\n]*\n([\s\S]*?)```").unwrap();
}

/// A named scoring function.
pub trait Scorer: Send + Sync {
    fn name(&self) -> &str;

    fn score<'a>(
        &'a self,
        actual: &'a str,
        expected: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<PartialResult>>;
}

/// Bodies of the fenced code blocks in `text`, in order.
pub fn extract_code_blocks(text: &str) -> Vec<&str> {
    CODE_BLOCK
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect()
}

/// The code blocks of `text` joined by newlines, or `text` itself when it
/// contains none.
pub fn code_or_text(text: &str) -> String {
    let blocks = extract_code_blocks(text);
    if blocks.is_empty() {
        text.to_string()
    } else {
        blocks.join("\n")
    }
}

/// Parses the actual response and reports its diagnostics.
///
/// `failures` is 1 when no tree could be built at all (empty response).
pub struct ValidationScorer {
    services: Arc<dyn LanguageServices>,
    options: AnalysisOptions,
}

impl ValidationScorer {
    pub fn new(services: Arc<dyn LanguageServices>) -> Self {
        Self {
            services,
            options: AnalysisOptions::default(),
        }
    }

    pub fn with_options(mut self, options: AnalysisOptions) -> Self {
        self.options = options;
        self
    }

    fn validate(&self, actual: &str) -> PartialResult {
        let document = self.services.parse(actual);
        let failures = u64::from(document.tree().is_none());

        let mut result = PartialResult::new()
            .with_data("failures", failures)
            .with_data("errors", document.count(DiagnosticSeverity::Error))
            .with_data("warnings", document.count(DiagnosticSeverity::Warning))
            .with_data("infos", document.count(DiagnosticSeverity::Information))
            .with_data("hints", document.count(DiagnosticSeverity::Hint))
            .with_data("lexer_errors", document.lexer_errors())
            .with_data("parser_errors", document.parser_errors())
            .with_data(
                "diagnostics",
                serde_json::to_value(document.diagnostics()).unwrap_or(Value::Null),
            );

        if self.options.analysis_mode != AnalysisMode::NoStatistic {
            let statistic = collect_syntax_usage_statistics(
                document.tree(),
                self.services.grammar(),
                self.services.registry(),
                &self.options,
            );
            result = result.with_metadata(
                "syntax_statistics",
                serde_json::to_value(&statistic).unwrap_or(Value::Null),
            );
        }
        result
    }
}

impl Scorer for ValidationScorer {
    fn name(&self) -> &str {
        "validation"
    }

    fn score<'a>(
        &'a self,
        actual: &'a str,
        _expected: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<PartialResult>> {
        async move { Ok(self.validate(actual)) }.boxed()
    }
}

/// Levenshtein distance over characters, plus similarity in [0, 1].
pub struct EditDistanceScorer;

impl Scorer for EditDistanceScorer {
    fn name(&self) -> &str {
        "edit-distance"
    }

    fn score<'a>(
        &'a self,
        actual: &'a str,
        expected: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<PartialResult>> {
        async move {
            let distance = levenshtein(actual, expected);
            let longest = actual.chars().count().max(expected.chars().count());
            let similarity = if longest == 0 {
                1.0
            } else {
                1.0 - distance as f64 / longest as f64
            };
            Ok(PartialResult::new()
                .with_data("edit_distance", distance)
                .with_data("similarity", similarity))
        }
        .boxed()
    }
}

/// 1 when both texts are equal after trimming, 0 otherwise.
pub struct ExactMatchScorer;

impl Scorer for ExactMatchScorer {
    fn name(&self) -> &str {
        "exact-match"
    }

    fn score<'a>(
        &'a self,
        actual: &'a str,
        expected: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<PartialResult>> {
        async move {
            let matched = actual.trim() == expected.trim();
            Ok(PartialResult::new().with_data("exact_match", u8::from(matched)))
        }
        .boxed()
    }
}

/// Runs scorers left to right and merges their maps; later keys win.
pub struct MergedScorer {
    name: String,
    scorers: Vec<Box<dyn Scorer>>,
}

impl MergedScorer {
    pub fn scorers(&self) -> &[Box<dyn Scorer>] {
        &self.scorers
    }
}

/// Combine scorers into one.
pub fn merge_scorers(scorers: Vec<Box<dyn Scorer>>) -> MergedScorer {
    let name = scorers
        .iter()
        .map(|s| s.name())
        .collect::<Vec<_>>()
        .join("+");
    MergedScorer { name, scorers }
}

impl Scorer for MergedScorer {
    fn name(&self) -> &str {
        &self.name
    }

    fn score<'a>(
        &'a self,
        actual: &'a str,
        expected: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<PartialResult>> {
        async move {
            let mut merged = PartialResult::new();
            for scorer in &self.scorers {
                let part = scorer.score(actual, expected).await?;
                if part.name.is_some() {
                    merged.name = part.name;
                }
                merged.metadata.extend(part.metadata);
                merged.data.extend(part.data);
            }
            Ok(merged)
        }
        .boxed()
    }
}

/// Build a built-in scorer by name.
pub fn scorer_by_name(
    name: &str,
    services: &Arc<dyn LanguageServices>,
    options: &AnalysisOptions,
) -> Option<Box<dyn Scorer>> {
    match name {
        "validation" => Some(Box::new(
            ValidationScorer::new(Arc::clone(services)).with_options(options.clone()),
        )),
        "edit-distance" => Some(Box::new(EditDistanceScorer)),
        "exact-match" => Some(Box::new(ExactMatchScorer)),
        _ => None,
    }
}

/// Names accepted by [`scorer_by_name`].
pub const SCORER_NAMES: [&str; 3] = ["validation", "edit-distance", "exact-match"];

fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

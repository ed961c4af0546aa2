//! The evaluation matrix: runners x cases x repetitions x scorers.
//!
//! Everything runs sequentially so that timings belong to exactly one call.
//! A failing runner or scorer aborts the whole run and nothing is written.

use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

use super::case::EvalCase;
use super::history::{write_report, Report, ReportConfig};
use super::runners::Runner;
use super::scorers::{code_or_text, Scorer};
use super::types::{number_value, EvaluatorResult, ResultMetadata};

/// Configuration errors detected before anything runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatrixError {
    #[error("duplicate runner name: {0}")]
    DuplicateRunner(String),
    #[error("matrix has no runners")]
    NoRunners,
    #[error("num_runs must be at least 1")]
    InvalidRunCount,
}

/// Lifecycle of an [`EvalMatrix`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixState {
    Idle,
    Running,
    Completed,
    Failed,
}

fn default_num_runs() -> u32 {
    1
}

/// Identity and persistence settings of a matrix run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub history_folder: PathBuf,
    #[serde(default = "default_num_runs")]
    pub num_runs: u32,
}

impl MatrixConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            history_folder: PathBuf::from("history"),
            num_runs: 1,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_history_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.history_folder = folder.into();
        self
    }

    pub fn with_num_runs(mut self, num_runs: u32) -> Self {
        self.num_runs = num_runs;
        self
    }
}

/// A configured matrix, ready to run.
pub struct EvalMatrix {
    config: MatrixConfig,
    runners: Vec<Box<dyn Runner>>,
    scorers: Vec<Box<dyn Scorer>>,
    cases: Vec<EvalCase>,
    state: MatrixState,
    report: Option<Report>,
}

impl EvalMatrix {
    pub fn new(
        config: MatrixConfig,
        runners: Vec<Box<dyn Runner>>,
        scorers: Vec<Box<dyn Scorer>>,
        cases: Vec<EvalCase>,
    ) -> Self {
        Self {
            config,
            runners,
            scorers,
            cases,
            state: MatrixState::Idle,
            report: None,
        }
    }

    pub fn config(&self) -> &MatrixConfig {
        &self.config
    }

    pub fn state(&self) -> MatrixState {
        self.state
    }

    /// The report written by the last completed run.
    pub fn report(&self) -> Option<&Report> {
        self.report.as_ref()
    }

    /// Check the configuration without running anything.
    pub fn validate(&self) -> Result<(), MatrixError> {
        if self.runners.is_empty() {
            return Err(MatrixError::NoRunners);
        }
        if self.config.num_runs == 0 {
            return Err(MatrixError::InvalidRunCount);
        }
        let mut seen = HashSet::new();
        for runner in &self.runners {
            if !seen.insert(runner.name()) {
                return Err(MatrixError::DuplicateRunner(runner.name().to_string()));
            }
        }
        Ok(())
    }

    /// Run every combination, write the report and return all results.
    pub async fn run(&mut self) -> anyhow::Result<Vec<EvaluatorResult>> {
        self.validate()?;

        self.state = MatrixState::Running;
        let started = Utc::now();
        let clock = Instant::now();
        info!(
            matrix = %self.config.name,
            runners = self.runners.len(),
            cases = self.cases.len(),
            scorers = self.scorers.len(),
            num_runs = self.config.num_runs,
            "matrix started"
        );

        let outcome = match self.execute().await {
            Ok(results) => {
                let report = Report {
                    config: self.report_config(),
                    date: started.to_rfc3339_opts(SecondsFormat::Millis, true),
                    run_time: format!("{:.3}s", clock.elapsed().as_secs_f64()),
                    results,
                };
                write_report(&self.config.history_folder, &report).map(|_| {
                    let results = report.results.clone();
                    self.report = Some(report);
                    results
                })
            }
            Err(e) => Err(e),
        };

        self.state = match outcome {
            Ok(_) => MatrixState::Completed,
            Err(_) => MatrixState::Failed,
        };
        if let Ok(results) = &outcome {
            info!(
                matrix = %self.config.name,
                results = results.len(),
                elapsed = clock.elapsed().as_secs_f64(),
                "matrix completed"
            );
        }
        outcome
    }

    async fn execute(&self) -> anyhow::Result<Vec<EvaluatorResult>> {
        let mut results = Vec::new();

        for runner in &self.runners {
            for case in &self.cases {
                for run_count in 1..=self.config.num_runs {
                    debug!(runner = runner.name(), case = %case.name, run_count, "running");
                    let runner_clock = Instant::now();
                    let response = runner
                        .run(&case.prompt, &case.history)
                        .await
                        .with_context(|| {
                            format!("runner {:?} failed on case {:?}", runner.name(), case.name)
                        })?;
                    let runner_duration = runner_clock.elapsed().as_secs_f64();

                    let scored_text = if case.only_check_codeblocks {
                        code_or_text(&response)
                    } else {
                        response.clone()
                    };

                    for scorer in &self.scorers {
                        let scorer_clock = Instant::now();
                        let partial = scorer
                            .score(&scored_text, &case.expected_response)
                            .await
                            .with_context(|| {
                                format!(
                                    "scorer {:?} failed on case {:?} for runner {:?}",
                                    scorer.name(),
                                    case.name,
                                    runner.name()
                                )
                            })?;
                        let duration = scorer_clock.elapsed().as_secs_f64();
                        debug!(scorer = scorer.name(), duration, "scored");

                        let name = partial.name.unwrap_or_else(|| {
                            format!("{} - {} - {}", runner.name(), case.name, scorer.name())
                        });
                        let mut data = partial.data;
                        data.insert("_runtime".to_string(), number_value(duration));

                        let mut metadata = ResultMetadata::from_extra(partial.metadata);
                        metadata.runner = Some(runner.name().to_string());
                        metadata.evaluator = Some(scorer.name().to_string());
                        metadata.test_case = Some(case.clone());
                        metadata.actual_response = Some(response.clone());
                        metadata.duration = Some(duration);
                        metadata.run_count = Some(run_count);
                        metadata
                            .extra
                            .insert("runner_duration".to_string(), number_value(runner_duration));

                        results.push(EvaluatorResult {
                            name,
                            metadata,
                            data,
                        });
                    }
                }
            }
        }

        Ok(results)
    }

    fn report_config(&self) -> ReportConfig {
        ReportConfig {
            matrix: self.config.clone(),
            runners: self.runners.iter().map(|r| r.name().to_string()).collect(),
            evaluators: self.scorers.iter().map(|s| s.name().to_string()).collect(),
            cases: self.cases.clone(),
        }
    }
}

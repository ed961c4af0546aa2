//! Matrix configuration file schema.
//!
//! A matrix file describes one evaluation run:
//!
//! ```yaml
//! name: DomainModel smoke test
//! description: Compare two local generators
//! history_folder: history
//! num_runs: 3
//! cases: cases.yaml
//! runners:
//!   - name: cat
//!     command: [cat]
//! scorers: [validation, edit-distance]
//! analysis:
//!   exclude_rules: [QualifiedName]
//! ```
//!
//! Relative paths are resolved against the directory of the file.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::eval::{
    load_cases_from_file, scorer_by_name, CommandRunner, EvalCase, MatrixConfig, Runner, Scorer,
    SCORER_NAMES,
};
use crate::grammar::LanguageServices;
use crate::statistics::AnalysisOptions;

/// A runner backed by an external command.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RunnerSpec {
    pub name: String,
    /// Program followed by its arguments.
    pub command: Vec<String>,
}

/// Top-level matrix file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MatrixFile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_history_folder")]
    pub history_folder: PathBuf,
    #[serde(default = "default_num_runs")]
    pub num_runs: u32,
    /// Case document (see [`crate::eval::case`]).
    pub cases: PathBuf,
    #[serde(default)]
    pub runners: Vec<RunnerSpec>,
    /// Built-in scorer names, run in order. Default: `[validation]`
    #[serde(default = "default_scorers")]
    pub scorers: Vec<String>,
    #[serde(default)]
    pub analysis: AnalysisOptions,
    #[serde(skip)]
    base_dir: PathBuf,
}

fn default_history_folder() -> PathBuf {
    PathBuf::from("history")
}

fn default_num_runs() -> u32 {
    1
}

fn default_scorers() -> Vec<String> {
    vec!["validation".to_string()]
}

impl MatrixFile {
    /// Parse a matrix file from YAML.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read matrix file {}", path.display()))?;
        let mut file: MatrixFile = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse matrix file {}", path.display()))?;
        file.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(file)
    }

    /// Parse a matrix file from a YAML string; paths resolve against `base_dir`.
    pub fn from_yaml_str(content: &str, base_dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let mut file: MatrixFile = serde_yaml::from_str(content)?;
        file.base_dir = base_dir.into();
        Ok(file)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn cases_path(&self) -> PathBuf {
        self.resolve(&self.cases)
    }

    pub fn history_path(&self) -> PathBuf {
        self.resolve(&self.history_folder)
    }

    pub fn matrix_config(&self) -> MatrixConfig {
        MatrixConfig::new(&self.name)
            .with_description(&self.description)
            .with_history_folder(self.history_path())
            .with_num_runs(self.num_runs)
    }

    pub fn load_cases(&self) -> anyhow::Result<Vec<EvalCase>> {
        Ok(load_cases_from_file(self.cases_path())?)
    }

    pub fn build_runners(&self) -> anyhow::Result<Vec<Box<dyn Runner>>> {
        self.runners
            .iter()
            .map(|spec| {
                CommandRunner::from_command(&spec.name, &spec.command)
                    .map(|r| Box::new(r) as Box<dyn Runner>)
            })
            .collect()
    }

    pub fn build_scorers(
        &self,
        services: &Arc<dyn LanguageServices>,
    ) -> anyhow::Result<Vec<Box<dyn Scorer>>> {
        self.scorers
            .iter()
            .map(|name| {
                scorer_by_name(name, services, &self.analysis)
                    .ok_or_else(|| anyhow::anyhow!("unknown scorer {:?}", name))
            })
            .collect()
    }
}

/// Validate a matrix file before any work is attempted.
pub fn validate(file: &MatrixFile) -> anyhow::Result<()> {
    if file.name.trim().is_empty() {
        anyhow::bail!("matrix name must not be empty");
    }
    if file.runners.is_empty() {
        anyhow::bail!("matrix {:?} has no runners", file.name);
    }
    if file.num_runs == 0 {
        anyhow::bail!("num_runs must be at least 1");
    }
    for runner in &file.runners {
        if runner.command.is_empty() {
            anyhow::bail!("runner {:?} has an empty command", runner.name);
        }
    }
    for scorer in &file.scorers {
        if !SCORER_NAMES.contains(&scorer.as_str()) {
            anyhow::bail!(
                "unknown scorer {:?}, must be one of {}",
                scorer,
                SCORER_NAMES.join(", ")
            );
        }
    }
    Ok(())
}

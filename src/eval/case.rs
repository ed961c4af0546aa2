//! Evaluation cases and their YAML document format.
//!
//! ```yaml
//! eval_cases:
//!   - name: person
//!     prompt: Write an entity named Person.
//!     expected_response: "entity Person {}"
//!     history:
//!       - role: system
//!         content: You write DomainModel code.
//!     tags: [entity]
//!     only_check_codeblocks: true
//! ```

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while loading a case document.
#[derive(Error, Debug)]
pub enum CaseError {
    #[error("case document has no `eval_cases` list")]
    MissingCases,
    #[error("invalid eval cases: {}", .0.join("; "))]
    Invalid(Vec<String>),
    #[error("failed to parse case document: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("failed to read case file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    System,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::System => "system",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "system" => Ok(Role::System),
            "assistant" => Ok(Role::Assistant),
            other => Err(format!(
                "unknown role {:?} (expected user, system or assistant)",
                other
            )),
        }
    }
}

/// One prior turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub role: Role,
    pub content: String,
}

impl HistoryItem {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// A prompt together with the response it should produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalCase {
    pub name: String,
    pub prompt: String,
    pub expected_response: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<HistoryItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Score only the fenced code blocks of the response.
    #[serde(default)]
    pub only_check_codeblocks: bool,
}

impl EvalCase {
    pub fn new(
        name: impl Into<String>,
        prompt: impl Into<String>,
        expected_response: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            prompt: prompt.into(),
            expected_response: expected_response.into(),
            history: Vec::new(),
            tags: Vec::new(),
            only_check_codeblocks: false,
        }
    }

    pub fn with_history(mut self, history: Vec<HistoryItem>) -> Self {
        self.history = history;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_codeblocks_only(mut self, only: bool) -> Self {
        self.only_check_codeblocks = only;
        self
    }
}

/// Load cases from a YAML document with a top-level `eval_cases` list.
///
/// Every entry is checked; if any is malformed, all problems are returned
/// together (one message per case) and no cases are loaded.
pub fn load_cases_from_yaml_str(content: &str) -> Result<Vec<EvalCase>, CaseError> {
    let document: Value = serde_yaml::from_str(content)?;
    let entries = document
        .get("eval_cases")
        .and_then(Value::as_sequence)
        .ok_or(CaseError::MissingCases)?;

    let mut cases = Vec::with_capacity(entries.len());
    let mut errors = Vec::new();
    for (index, entry) in entries.iter().enumerate() {
        match decode_case(entry) {
            Ok(case) => cases.push(case),
            Err(problems) => errors.push(format!("eval_cases[{}]: {}", index, problems.join(", "))),
        }
    }

    if errors.is_empty() {
        Ok(cases)
    } else {
        Err(CaseError::Invalid(errors))
    }
}

/// Load cases from a YAML file.
pub fn load_cases_from_file<P: AsRef<Path>>(path: P) -> Result<Vec<EvalCase>, CaseError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| CaseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_cases_from_yaml_str(&content)
}

fn decode_case(entry: &Value) -> Result<EvalCase, Vec<String>> {
    if !entry.is_mapping() {
        return Err(vec!["expected a mapping".to_string()]);
    }

    let mut problems = Vec::new();
    let name = required_string(entry, "name", &mut problems);
    let prompt = required_string(entry, "prompt", &mut problems);
    let expected = required_string(entry, "expected_response", &mut problems);

    let history = match entry.get("history") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Sequence(items)) => items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| match decode_history_item(item) {
                Ok(item) => Some(item),
                Err(e) => {
                    problems.push(format!("history[{}]: {}", i, e));
                    None
                }
            })
            .collect(),
        Some(_) => {
            problems.push("`history` must be a list".to_string());
            Vec::new()
        }
    };

    let tags = match entry.get("tags") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Sequence(items)) => {
            let tags: Vec<String> = items
                .iter()
                .filter_map(|t| t.as_str().map(str::to_string))
                .collect();
            if tags.len() != items.len() {
                problems.push("`tags` must be a list of strings".to_string());
            }
            tags
        }
        Some(_) => {
            problems.push("`tags` must be a list of strings".to_string());
            Vec::new()
        }
    };

    let only_check_codeblocks = match entry.get("only_check_codeblocks") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(_) => {
            problems.push("`only_check_codeblocks` must be a boolean".to_string());
            false
        }
    };

    match (name, prompt, expected) {
        (Some(name), Some(prompt), Some(expected)) if problems.is_empty() => Ok(EvalCase {
            name,
            prompt,
            expected_response: expected,
            history,
            tags,
            only_check_codeblocks,
        }),
        _ => Err(problems),
    }
}

fn required_string(entry: &Value, key: &str, problems: &mut Vec<String>) -> Option<String> {
    match entry.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        None | Some(Value::Null) => {
            problems.push(format!("missing `{}`", key));
            None
        }
        Some(_) => {
            problems.push(format!("`{}` must be a string", key));
            None
        }
    }
}

fn decode_history_item(item: &Value) -> Result<HistoryItem, String> {
    let role = item
        .get("role")
        .and_then(Value::as_str)
        .ok_or_else(|| "missing `role`".to_string())?
        .parse::<Role>()?;
    let content = item
        .get("content")
        .and_then(Value::as_str)
        .ok_or_else(|| "missing `content`".to_string())?;
    Ok(HistoryItem::new(role, content))
}

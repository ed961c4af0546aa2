//! Persisted matrix reports.
//!
//! Every completed matrix run writes one JSON report named after its start
//! time and the matrix name. A pointer file in the same folder holds the
//! file name of the most recent report.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use super::case::EvalCase;
use super::matrix::MatrixConfig;
use super::types::EvaluatorResult;

/// Name of the pointer file holding the latest report's file name.
pub const LAST_REPORT_FILE: &str = "last_report.txt";

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("no previous report found in {}", .0.display())]
    NoLastReport(PathBuf),
}

/// The configuration a report was produced with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(flatten)]
    pub matrix: MatrixConfig,
    pub runners: Vec<String>,
    pub evaluators: Vec<String>,
    pub cases: Vec<EvalCase>,
}

/// One matrix run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub config: ReportConfig,
    /// ISO-8601 start time.
    pub date: String,
    /// Elapsed seconds with an `s` suffix.
    #[serde(rename = "runTime")]
    pub run_time: String,
    pub results: Vec<EvaluatorResult>,
}

/// File name for a report started at `date` for matrix `name`.
pub fn report_file_name(date: &str, name: &str) -> String {
    let timestamp = date.replace([':', '.'], "-");
    let name = name
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .replace('/', "");
    format!("{}_{}.json", timestamp, name)
}

/// Write `report` into `folder` and point the last-report file at it.
///
/// The report file is removed again when the pointer cannot be updated, so a
/// failed write leaves no batch behind.
pub fn write_report(folder: &Path, report: &Report) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(folder)
        .with_context(|| format!("failed to create history folder {}", folder.display()))?;

    let file_name = report_file_name(&report.date, &report.config.matrix.name);
    let path = folder.join(&file_name);
    let json = serde_json::to_string_pretty(report)?;
    fs::write(&path, json).with_context(|| format!("failed to write report {}", path.display()))?;
    if let Err(e) = fs::write(folder.join(LAST_REPORT_FILE), &file_name) {
        let _ = fs::remove_file(&path);
        return Err(e).with_context(|| {
            format!("failed to update {} in {}", LAST_REPORT_FILE, folder.display())
        });
    }

    info!(path = %path.display(), results = report.results.len(), "report written");
    Ok(path)
}

/// Load a report file.
pub fn load_report(path: &Path) -> anyhow::Result<Report> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read report {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse report {}", path.display()))
}

/// Path of the most recent report in `folder`.
pub fn last_report_path(folder: &Path) -> Result<PathBuf, HistoryError> {
    let pointer = fs::read_to_string(folder.join(LAST_REPORT_FILE))
        .map_err(|_| HistoryError::NoLastReport(folder.to_path_buf()))?;
    let file_name = pointer.trim();
    if file_name.is_empty() {
        return Err(HistoryError::NoLastReport(folder.to_path_buf()));
    }
    Ok(folder.join(file_name))
}

/// Load the most recent report in `folder`.
pub fn load_last_report(folder: &Path) -> anyhow::Result<Report> {
    let path = last_report_path(folder)?;
    load_report(&path)
}

/// All report files in `folder`, oldest first.
pub fn list_reports(folder: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if !folder.exists() {
        return Ok(Vec::new());
    }
    let mut reports: Vec<PathBuf> = fs::read_dir(folder)
        .with_context(|| format!("failed to list {}", folder.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    // Names start with the timestamp, so name order is time order.
    reports.sort();
    Ok(reports)
}

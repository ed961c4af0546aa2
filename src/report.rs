//! Output formatting for evaluation results.
//!
//! Supports two output formats:
//! - Pretty: colored terminal table of averaged metrics
//! - JSON: the averaged records, for programmatic consumption

use colored::*;
use serde::Serialize;
use std::io::Write;

use crate::eval::{numeric_keys, EvaluatorResult, Report};

/// JSON summary of an aggregate.
#[derive(Serialize)]
pub struct JsonSummary<'a> {
    pub name: &'a str,
    pub date: &'a str,
    #[serde(rename = "runTime")]
    pub run_time: &'a str,
    pub results: &'a [EvaluatorResult],
}

/// Write an aggregate as pretty-printed JSON.
pub fn write_json<W: Write>(
    out: &mut W,
    report: &Report,
    aggregated: &[EvaluatorResult],
) -> anyhow::Result<()> {
    let summary = JsonSummary {
        name: &report.config.matrix.name,
        date: &report.date,
        run_time: &report.run_time,
        results: aggregated,
    };
    serde_json::to_writer_pretty(&mut *out, &summary)?;
    writeln!(out)?;
    Ok(())
}

/// Write an aggregate as a colored table.
pub fn write_pretty<W: Write>(
    out: &mut W,
    report: &Report,
    aggregated: &[EvaluatorResult],
) -> anyhow::Result<()> {
    // Header
    writeln!(out)?;
    writeln!(
        out,
        "  {} v{}",
        "grambench".cyan().bold(),
        env!("CARGO_PKG_VERSION")
    )?;
    writeln!(out)?;
    writeln!(out, "  {}{}", "Matrix:   ".dimmed(), report.config.matrix.name)?;
    if !report.config.matrix.description.is_empty() {
        writeln!(out, "  {}{}", "About:    ".dimmed(), report.config.matrix.description)?;
    }
    writeln!(out, "  {}{}", "Date:     ".dimmed(), report.date)?;
    writeln!(out, "  {}{}", "Run time: ".dimmed(), report.run_time)?;
    writeln!(
        out,
        "  {}{} runner(s), {} case(s), {} scorer(s), {} run(s) each",
        "Matrix:   ".dimmed(),
        report.config.runners.len(),
        report.config.cases.len(),
        report.config.evaluators.len(),
        report.config.matrix.num_runs
    )?;
    writeln!(out)?;

    if aggregated.is_empty() {
        writeln!(out, "  {}", "No results.".yellow())?;
        writeln!(out)?;
        return Ok(());
    }

    write_table(out, aggregated)?;
    writeln!(out)?;
    Ok(())
}

fn write_table<W: Write>(out: &mut W, rows: &[EvaluatorResult]) -> anyhow::Result<()> {
    let keys = numeric_keys(rows);
    let name_width = rows
        .iter()
        .map(|r| r.name.chars().count())
        .max()
        .unwrap_or(0)
        .max(4);
    let widths: Vec<usize> = keys.iter().map(|k| k.len().max(8)).collect();

    write!(out, "  {:<width$}", "NAME".bold(), width = name_width)?;
    for (key, width) in keys.iter().zip(&widths) {
        write!(out, "  {:>width$}", key.as_str().bold(), width = *width)?;
    }
    writeln!(out)?;

    for row in rows {
        write!(out, "  {:<width$}", row.name, width = name_width)?;
        for (key, width) in keys.iter().zip(&widths) {
            let cell = match row.number(key) {
                Some(value) => format_value(key, value),
                None => "-".dimmed(),
            };
            write!(out, "  {:>width$}", cell, width = *width)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Error-like counters are red when non-zero.
fn format_value(key: &str, value: f64) -> ColoredString {
    let text = format!("{:.2}", value);
    match key {
        "failures" | "errors" | "lexer_errors" | "parser_errors" if value > 0.0 => text.red(),
        "warnings" if value > 0.0 => text.yellow(),
        _ => text.normal(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{EvalCase, MatrixConfig, ReportConfig};
    use serde_json::json;

    fn report() -> Report {
        Report {
            config: ReportConfig {
                matrix: MatrixConfig::new("demo"),
                runners: vec!["alpha".into()],
                evaluators: vec!["validation".into()],
                cases: vec![EvalCase::new("c", "p", "e")],
            },
            date: "2024-05-01T10:00:00.000Z".into(),
            run_time: "1.250s".into(),
            results: Vec::new(),
        }
    }

    fn row(name: &str, data: serde_json::Value) -> EvaluatorResult {
        EvaluatorResult::new(name, data.as_object().cloned().unwrap_or_default())
    }

    #[test]
    fn test_pretty_lists_rows_and_metrics() {
        let rows = vec![
            row("alpha", json!({"errors": 1.5, "note": "x"})),
            row("beta", json!({"errors": 0, "similarity": 0.75})),
        ];
        let mut out = Vec::new();
        write_pretty(&mut out, &report(), &rows).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("demo"));
        assert!(text.contains("alpha"));
        assert!(text.contains("beta"));
        assert!(text.contains("similarity"));
        assert!(text.contains("1.50"));
        assert!(text.contains("0.75"));
        assert!(!text.contains("note"));
    }

    #[test]
    fn test_pretty_without_results() {
        let mut out = Vec::new();
        write_pretty(&mut out, &report(), &[]).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("No results."));
    }

    #[test]
    fn test_json_summary() {
        let rows = vec![row("alpha", json!({"errors": 2.0}))];
        let mut out = Vec::new();
        write_json(&mut out, &report(), &rows).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["name"], "demo");
        assert_eq!(value["runTime"], "1.250s");
        assert_eq!(value["results"][0]["data"]["errors"], json!(2.0));
    }
}

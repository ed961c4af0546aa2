//! Command-line interface for grambench.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::error;

use crate::config::{self, MatrixFile};
use crate::eval::{average_across_cases, average_across_runners, load_last_report, EvalMatrix, EvaluatorResult};
use crate::grammar::{DomainModelServices, LanguageServices, NodeKind, NodeRef};
use crate::report;
use crate::split::{kind_is, split_by_node, split_by_node_to_ast, MappingRule, NodePredicate, ProgramMapper, SplitOptions};
use crate::statistics::{collect_syntax_usage_statistics, AnalysisOptions};

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Grammar usage statistics, document splitting and evaluation matrices.
///
/// Grambench measures how DomainModel documents exercise their grammar,
/// cuts documents into chunks per grammar construct, and runs batches of
/// generated responses through scorers, keeping a history of every run.
#[derive(Parser)]
#[command(name = "grambench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run an evaluation matrix described by a YAML file
    Matrix(MatrixArgs),
    /// Show the aggregate of the most recent matrix run
    Report(ReportArgs),
    /// Print syntax usage statistics of a document as JSON
    Stats(StatsArgs),
    /// Split a document into chunks per node kind
    Split(SplitArgs),
    /// Print a one-line summary per entity, feature and datatype
    Map(MapArgs),
}

/// Output format for aggregates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Pretty,
    Json,
}

/// Aggregation level for reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum By {
    Cases,
    Runners,
}

/// Arguments for the matrix command.
#[derive(Parser)]
pub struct MatrixArgs {
    /// Path to the matrix YAML file
    pub config: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "pretty")]
    pub format: Format,

    /// Exit non-zero when any runner averages errors or failures above zero
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for the report command.
#[derive(Parser)]
pub struct ReportArgs {
    /// History folder holding the reports
    #[arg(long, default_value = "history")]
    pub history: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "pretty")]
    pub format: Format,

    /// Average per result name or per runner
    #[arg(long, value_enum, default_value = "runners")]
    pub by: By,
}

/// Arguments for the stats command.
#[derive(Parser)]
pub struct StatsArgs {
    /// DomainModel file to analyze
    pub file: PathBuf,

    /// Rule to leave out of the inventory (repeatable)
    #[arg(short, long = "exclude")]
    pub exclude: Vec<String>,

    /// Count hidden rules such as comments
    #[arg(long)]
    pub hidden: bool,

    /// Only list the grammar's own rules
    #[arg(long)]
    pub no_imports: bool,

    /// Skip entropy, Gini and Simpson metrics
    #[arg(long)]
    pub no_diversity: bool,
}

/// Arguments for the split command.
#[derive(Parser)]
pub struct SplitArgs {
    /// DomainModel file to split
    pub file: PathBuf,

    /// Node kind to split on (repeatable), e.g. Entity, DataType, Feature
    #[arg(short, long = "kind", required = true)]
    pub kinds: Vec<String>,

    /// Do not extend chunks to attached comments
    #[arg(long)]
    pub no_comments: bool,

    /// Print matched nodes instead of text chunks
    #[arg(long)]
    pub ast: bool,
}

/// Arguments for the map command.
#[derive(Parser)]
pub struct MapArgs {
    /// DomainModel file to map
    pub file: PathBuf,
}

fn read_source(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn render(format: Format, report: &crate::eval::Report, rows: &[EvaluatorResult]) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match format {
        Format::Json => report::write_json(&mut out, report, rows),
        Format::Pretty => report::write_pretty(&mut out, report, rows),
    }
}

/// Run the matrix command.
pub fn run_matrix(args: &MatrixArgs) -> anyhow::Result<i32> {
    let file = match MatrixFile::parse_file(&args.config) {
        Ok(f) => f,
        Err(e) => {
            error!(error = %format!("{:#}", e), "cannot load matrix file");
            return Ok(EXIT_ERROR);
        }
    };

    if let Err(e) = config::validate(&file) {
        error!(error = %e, "invalid matrix file");
        return Ok(EXIT_ERROR);
    }

    let cases = file.load_cases()?;
    let services: Arc<dyn LanguageServices> = Arc::new(DomainModelServices::new());
    let runners = file.build_runners()?;
    let scorers = file.build_scorers(&services)?;

    let mut matrix = EvalMatrix::new(file.matrix_config(), runners, scorers, cases);
    let runtime = tokio::runtime::Runtime::new()?;
    let results = runtime.block_on(matrix.run())?;

    let report = matrix
        .report()
        .ok_or_else(|| anyhow::anyhow!("matrix {:?} completed without a report", file.name))?;
    let by_runner = average_across_runners(&results);
    render(args.format, report, &by_runner)?;

    let failing = by_runner.iter().any(|r| {
        r.number("errors").unwrap_or(0.0) > 0.0 || r.number("failures").unwrap_or(0.0) > 0.0
    });
    if args.strict && failing {
        Ok(EXIT_FAILED)
    } else {
        Ok(EXIT_SUCCESS)
    }
}

/// Run the report command.
pub fn run_report(args: &ReportArgs) -> anyhow::Result<i32> {
    let report = match load_last_report(&args.history) {
        Ok(r) => r,
        Err(e) => {
            error!(error = %format!("{:#}", e), "cannot load last report");
            return Ok(EXIT_ERROR);
        }
    };

    let rows = match args.by {
        By::Cases => average_across_cases(&report.results),
        By::Runners => average_across_runners(&report.results),
    };
    render(args.format, &report, &rows)?;
    Ok(EXIT_SUCCESS)
}

/// Run the stats command.
pub fn run_stats(args: &StatsArgs) -> anyhow::Result<i32> {
    let text = read_source(&args.file)?;
    let services = DomainModelServices::new();
    let document = services.parse(&text);

    let options = AnalysisOptions::default()
        .with_excluded_rules(args.exclude.iter().cloned())
        .with_hidden_rules(args.hidden)
        .with_imported_rules(!args.no_imports)
        .with_diversity(!args.no_diversity);
    let statistic = collect_syntax_usage_statistics(
        document.tree(),
        services.grammar(),
        services.registry(),
        &options,
    );

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, &statistic)?;
    writeln!(out)?;
    Ok(EXIT_SUCCESS)
}

/// Run the split command.
pub fn run_split(args: &SplitArgs) -> anyhow::Result<i32> {
    let mut predicates: Vec<NodePredicate> = Vec::new();
    for name in &args.kinds {
        match name.parse::<NodeKind>() {
            Ok(kind) => predicates.push(kind_is(kind)),
            Err(e) => {
                error!(error = %e, "invalid --kind");
                return Ok(EXIT_ERROR);
            }
        }
    }

    let text = read_source(&args.file)?;
    let services = DomainModelServices::new();

    if args.ast {
        let nodes = split_by_node_to_ast(&text, &predicates, &services);
        for node in nodes.iter() {
            println!(
                "{} {}-{} {}",
                node.kind,
                node.range.start,
                node.range.end,
                node.name().unwrap_or_default()
            );
        }
        return Ok(EXIT_SUCCESS);
    }

    let options = if args.no_comments {
        SplitOptions::without_comments()
    } else {
        SplitOptions::default()
    };
    let chunks = split_by_node(&text, &predicates, &services, &options);
    if chunks.is_empty() {
        eprintln!("Warning: no chunks (empty document, syntax errors or no matches)");
    }
    for (i, chunk) in chunks.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("{}", chunk);
    }
    Ok(EXIT_SUCCESS)
}

/// Rules used by the map command.
pub fn summary_rules() -> Vec<MappingRule> {
    vec![
        MappingRule::new(
            |n| n.is(NodeKind::DataType),
            |n| format!("datatype {}", n.name().unwrap_or_default()),
        ),
        MappingRule::new(|n| n.is(NodeKind::Entity), summarize_entity),
        MappingRule::new(
            |n| n.is(NodeKind::Feature),
            |n| {
                let many = if n.child("many").is_some() { "[]" } else { "" };
                format!(
                    "  {}: {}{}",
                    n.name().unwrap_or_default(),
                    n.child("type").map(|t| t.text()).unwrap_or_default(),
                    many
                )
            },
        ),
    ]
}

fn summarize_entity(node: NodeRef<'_>) -> String {
    let mut line = format!("entity {}", node.name().unwrap_or_default());
    if let Some(parent) = node.child("superType") {
        line.push_str(&format!(" extends {}", parent.text()));
    }
    let features = node.children_for("features").count();
    line.push_str(&format!(" ({} features)", features));
    line
}

/// Run the map command.
pub fn run_map(args: &MapArgs) -> anyhow::Result<i32> {
    let text = read_source(&args.file)?;
    let services = DomainModelServices::new();
    let mapper = summary_rules()
        .into_iter()
        .fold(ProgramMapper::new(&services), ProgramMapper::with_rule);

    for line in mapper.map(&text) {
        println!("{}", line);
    }
    Ok(EXIT_SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_split_args() {
        let cli = Cli::parse_from(["grambench", "split", "model.dmodel", "-k", "Entity", "--kind", "Feature", "--ast"]);
        match cli.command {
            Commands::Split(args) => {
                assert_eq!(args.kinds, vec!["Entity", "Feature"]);
                assert!(args.ast);
                assert!(!args.no_comments);
            }
            _ => panic!("expected split"),
        }
    }

    #[test]
    fn test_parse_report_args() {
        let cli = Cli::parse_from(["grambench", "report", "--format", "json", "--by", "cases"]);
        match cli.command {
            Commands::Report(args) => {
                assert_eq!(args.format, Format::Json);
                assert_eq!(args.by, By::Cases);
                assert_eq!(args.history, PathBuf::from("history"));
            }
            _ => panic!("expected report"),
        }
    }

    #[test]
    fn test_summary_rules() {
        let services = DomainModelServices::new();
        let mapper = summary_rules()
            .into_iter()
            .fold(ProgramMapper::new(&services), ProgramMapper::with_rule);
        let lines = mapper.map("datatype Text\nentity A {}\nentity B extends A { many tags: Text }");

        assert_eq!(
            lines,
            vec![
                "datatype Text",
                "entity A (0 features)",
                "entity B extends A (1 features)",
                "  tags: Text[]",
            ]
        );
    }
}

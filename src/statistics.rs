//! Syntax usage statistics: how a document exercises the rules of a grammar.
//!
//! Walks a parsed tree, tallies rule invocations and derives coverage and
//! diversity metrics (Shannon entropy, Gini coefficient, Simpson index).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::grammar::{Grammar, GrammarRegistry, GrammarSource, Rule, Tree};

/// Reserved whitespace terminal, never counted.
pub const WHITESPACE_RULE: &str = "WS";

/// Bucket for rule calls that could not be linked to a rule.
pub const UNKNOWN_RULE: &str = "unknown";

/// Whether statistics are computed at all by callers that embed them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisMode {
    #[default]
    All,
    NoStatistic,
}

/// Options for [`collect_syntax_usage_statistics`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    pub analysis_mode: AnalysisMode,
    /// Rules left out of the zero-filled inventory (`WS` always is).
    pub exclude_rules: Vec<String>,
    /// Also list rules of transitively imported grammars.
    pub include_imported_rules: bool,
    /// List and count hidden terminals such as comments.
    pub include_hidden_rules: bool,
    pub compute_diversity: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            analysis_mode: AnalysisMode::All,
            exclude_rules: Vec::new(),
            include_imported_rules: true,
            include_hidden_rules: false,
            compute_diversity: true,
        }
    }
}

impl AnalysisOptions {
    pub fn with_mode(mut self, mode: AnalysisMode) -> Self {
        self.analysis_mode = mode;
        self
    }

    pub fn with_excluded_rules<I, S>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_rules = rules.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_imported_rules(mut self, include: bool) -> Self {
        self.include_imported_rules = include;
        self
    }

    pub fn with_hidden_rules(mut self, include: bool) -> Self {
        self.include_hidden_rules = include;
        self
    }

    pub fn with_diversity(mut self, compute: bool) -> Self {
        self.compute_diversity = compute;
        self
    }

    fn is_excluded(&self, rule: &str) -> bool {
        rule == WHITESPACE_RULE || self.exclude_rules.iter().any(|r| r == rule)
    }
}

/// Diversity of rule usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diversity {
    pub entropy: f64,
    pub gini_coefficient: f64,
    pub simpson_index: f64,
}

/// Rule usage of one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntaxStatistic {
    pub rule_usage: BTreeMap<String, u64>,
    /// Percentage (0-100) of listed rules used at least once.
    pub coverage: f64,
    pub diversity: Diversity,
}

impl SyntaxStatistic {
    pub fn total_usage(&self) -> u64 {
        self.rule_usage.values().sum()
    }

    pub fn usage(&self, rule: &str) -> u64 {
        self.rule_usage.get(rule).copied().unwrap_or(0)
    }
}

/// Collect rule usage statistics for a parsed tree.
///
/// Every candidate rule is listed at zero first; entry rules, excluded rules
/// and (unless enabled) hidden rules are left out of that inventory. Rule
/// calls found in the tree are always tallied. Without a tree the
/// zero-filled inventory is returned with zero coverage and diversity.
pub fn collect_syntax_usage_statistics(
    tree: Option<&Tree>,
    grammar: &Grammar,
    registry: &GrammarRegistry,
    options: &AnalysisOptions,
) -> SyntaxStatistic {
    let mut rule_usage: BTreeMap<String, u64> = candidate_rules(grammar, registry, options)
        .into_iter()
        .filter(|rule| !rule.entry && !options.is_excluded(&rule.name))
        .filter(|rule| !rule.hidden || options.include_hidden_rules)
        .map(|rule| (rule.name.clone(), 0))
        .collect();

    let Some(tree) = tree else {
        return SyntaxStatistic {
            rule_usage,
            ..Default::default()
        };
    };

    for node in tree.preorder() {
        if node.hidden {
            if options.include_hidden_rules && node.leaf {
                if let Some(token_type) = &node.token_type {
                    *rule_usage.entry(token_type.clone()).or_insert(0) += 1;
                }
            }
            continue;
        }
        if let Some(GrammarSource::RuleCall(target)) = &node.grammar_source {
            let key = target.as_deref().unwrap_or(UNKNOWN_RULE);
            *rule_usage.entry(key.to_string()).or_insert(0) += 1;
        }
    }

    let coverage = coverage(&rule_usage);
    let diversity = if options.compute_diversity {
        let counts: Vec<u64> = rule_usage.values().copied().collect();
        Diversity {
            entropy: shannon_entropy(&counts),
            gini_coefficient: gini_coefficient(&counts),
            simpson_index: simpson_index(&counts),
        }
    } else {
        Diversity::default()
    };

    SyntaxStatistic {
        rule_usage,
        coverage,
        diversity,
    }
}

fn candidate_rules<'a>(
    grammar: &'a Grammar,
    registry: &'a GrammarRegistry,
    options: &AnalysisOptions,
) -> Vec<&'a Rule> {
    let mut rules: Vec<&Rule> = grammar.rules.iter().collect();
    if options.include_imported_rules {
        match registry.imported_rules(grammar) {
            Ok(imported) => rules.extend(imported),
            Err(e) => {
                warn!(grammar = %grammar.name, error = %e, "import resolution failed, using local rules only");
            }
        }
    }
    rules
}

/// Percentage of entries with non-zero usage.
pub fn coverage(rule_usage: &BTreeMap<String, u64>) -> f64 {
    if rule_usage.is_empty() {
        return 0.0;
    }
    let used = rule_usage.values().filter(|&&c| c > 0).count();
    used as f64 / rule_usage.len() as f64 * 100.0
}

/// Shannon entropy (base 2) of the usage distribution.
pub fn shannon_entropy(counts: &[u64]) -> f64 {
    let total: u64 = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total;
            -p * p.log2()
        })
        .sum()
}

/// Gini coefficient of the usage counts (0 = even, towards 1 = concentrated).
pub fn gini_coefficient(counts: &[u64]) -> f64 {
    let n = counts.len();
    let total: u64 = counts.iter().sum();
    if n == 0 || total == 0 {
        return 0.0;
    }
    let mut sorted = counts.to_vec();
    sorted.sort_unstable();
    let n = n as f64;
    let weighted: f64 = sorted
        .iter()
        .enumerate()
        .map(|(i, &c)| (2.0 * (i as f64 + 1.0) - n - 1.0) * c as f64)
        .sum();
    weighted / (n * total as f64)
}

/// Simpson diversity index, `1 - sum(p_i^2)`.
pub fn simpson_index(counts: &[u64]) -> f64 {
    let total: u64 = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    let dominance: f64 = counts
        .iter()
        .map(|&c| {
            let p = c as f64 / total;
            p * p
        })
        .sum();
    1.0 - dominance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{
        DomainModelServices, GrammarRegistry, LanguageServices, LeafToken, NodeKind, Position,
        Range, TreeBuilder,
    };

    const MODEL: &str = "package foo.bar {\n  datatype String;\n  entity Person { name: String }\n}\n";

    fn stats(text: &str, options: &AnalysisOptions) -> SyntaxStatistic {
        let services = DomainModelServices::new();
        let doc = services.parse(text);
        collect_syntax_usage_statistics(doc.tree(), services.grammar(), services.registry(), options)
    }

    #[test]
    fn test_counts_rule_calls() {
        let result = stats(MODEL, &AnalysisOptions::default());

        // foo, bar, String, Person, name, String
        assert_eq!(result.usage("ID"), 6);
        assert_eq!(result.usage("Entity"), 1);
        assert_eq!(result.usage("QualifiedName"), 2);
        assert!(!result.rule_usage.contains_key("Domainmodel"));
        assert!(!result.rule_usage.contains_key("WS"));
        assert!(!result.rule_usage.contains_key("SL_COMMENT"));
        assert!(result.coverage > 0.0 && result.coverage < 100.0);
    }

    #[test]
    fn test_empty_document_is_zero_filled() {
        let result = stats("", &AnalysisOptions::default());

        assert!(!result.rule_usage.is_empty());
        assert!(result.rule_usage.values().all(|&c| c == 0));
        assert_eq!(result.coverage, 0.0);
        assert_eq!(result.diversity, Diversity::default());
    }

    #[test]
    fn test_imported_rules_toggle() {
        let with_imports = stats("", &AnalysisOptions::default());
        let without = stats("", &AnalysisOptions::default().with_imported_rules(false));

        assert!(with_imports.rule_usage.contains_key("INT"));
        assert!(!without.rule_usage.contains_key("INT"));
        assert!(without.rule_usage.contains_key("Feature"));
    }

    #[test]
    fn test_hidden_rules_counted_when_enabled() {
        let text = "// one\n/* two */ datatype A";
        let hidden = stats(text, &AnalysisOptions::default().with_hidden_rules(true));
        assert_eq!(hidden.usage("SL_COMMENT"), 1);
        assert_eq!(hidden.usage("ML_COMMENT"), 1);
        assert!(!hidden.rule_usage.contains_key("WS"));

        let plain = stats(text, &AnalysisOptions::default());
        assert!(!plain.rule_usage.contains_key("SL_COMMENT"));
    }

    #[test]
    fn test_exclusion_never_lowers_coverage() {
        let base = stats(MODEL, &AnalysisOptions::default());
        for rule in base.rule_usage.keys() {
            let excluded = stats(MODEL, &AnalysisOptions::default().with_excluded_rules([rule.as_str()]));
            assert!(
                excluded.coverage >= base.coverage,
                "excluding {} lowered coverage",
                rule
            );
        }
    }

    #[test]
    fn test_unresolved_import_falls_back_to_local_rules() {
        let services = DomainModelServices::with_registry(GrammarRegistry::new());
        let doc = services.parse("datatype A");
        let result = collect_syntax_usage_statistics(
            doc.tree(),
            services.grammar(),
            services.registry(),
            &AnalysisOptions::default(),
        );

        assert!(result.rule_usage.contains_key("Entity"));
        assert!(!result.rule_usage.contains_key("INT"));
        assert_eq!(result.usage("ID"), 1);
    }

    #[test]
    fn test_unlinked_rule_call_counted_as_unknown() {
        let mut builder = TreeBuilder::new(NodeKind::Domainmodel);
        builder.open(NodeKind::Entity, Some(GrammarSource::RuleCall(None)), None);
        builder.leaf(
            NodeKind::Id,
            LeafToken {
                token_type: "ID".into(),
                image: "X".into(),
                range: Range::new(Position::new(0, 0), Position::new(0, 1)),
                offset: 0,
                end: 1,
            },
            Some(GrammarSource::rule_call("ID")),
            Some("name"),
        );
        builder.close();
        let tree = builder.finish();

        let services = DomainModelServices::new();
        let result = collect_syntax_usage_statistics(
            Some(&tree),
            services.grammar(),
            services.registry(),
            &AnalysisOptions::default(),
        );
        assert_eq!(result.usage(UNKNOWN_RULE), 1);
        assert_eq!(result.usage("ID"), 1);
    }

    #[test]
    fn test_diversity_skipped() {
        let result = stats(MODEL, &AnalysisOptions::default().with_diversity(false));
        assert_eq!(result.diversity, Diversity::default());
        assert!(result.coverage > 0.0);
    }

    #[test]
    fn test_entropy() {
        assert_eq!(shannon_entropy(&[]), 0.0);
        assert_eq!(shannon_entropy(&[0, 0]), 0.0);
        assert!((shannon_entropy(&[1, 1]) - 1.0).abs() < 1e-12);
        assert!((shannon_entropy(&[2, 2, 2, 2, 0]) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_gini() {
        assert_eq!(gini_coefficient(&[]), 0.0);
        assert_eq!(gini_coefficient(&[0, 0, 0]), 0.0);
        assert!(gini_coefficient(&[5, 5, 5]).abs() < 1e-12);
        // sorted [0, 0, 4]: (2*3 - 4) * 4 / (3 * 4)
        assert!((gini_coefficient(&[4, 0, 0]) - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_simpson() {
        assert_eq!(simpson_index(&[0]), 0.0);
        assert_eq!(simpson_index(&[7]), 0.0);
        assert!((simpson_index(&[1, 1, 0]) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_statistic_serializes_camel_case() {
        let result = stats(MODEL, &AnalysisOptions::default());
        let json = serde_json::to_value(&result).unwrap();
        assert!(json["ruleUsage"]["ID"].is_number());
        assert!(json["diversity"]["giniCoefficient"].is_number());
        assert!(json["diversity"]["simpsonIndex"].is_number());
    }
}

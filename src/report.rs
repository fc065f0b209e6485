// ABOUTME: Readiness report aggregation and human-readable rendering
// ABOUTME: Folds rule results into a READY / NOT READY verdict per cluster target

use crate::rules::{RuleResult, RuleTarget};
use serde::{Serialize, Serializer};

const RULE_WIDTH: usize = 61;

/// All rule results for one cluster target
///
/// `ready()` is true exactly when every recorded result passed, so a target
/// with no databases and no cluster issues is ready.
#[derive(Debug, Clone, Default)]
pub struct ReadinessReport {
    pub target: String,
    pub databases: Vec<String>,
    pub results: Vec<RuleResult>,
}

impl ReadinessReport {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Default::default()
        }
    }

    pub fn record(&mut self, result: RuleResult) {
        self.results.push(result);
    }

    pub fn ready(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &RuleResult> {
        self.results.iter().filter(|r| !r.passed)
    }

    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }

    /// Results recorded for one database, in evaluation order
    pub fn for_database<'a>(&'a self, database: &'a str) -> impl Iterator<Item = &'a RuleResult> {
        self.results
            .iter()
            .filter(move |r| matches!(&r.target, RuleTarget::Database(name) if name == database))
    }
}

#[derive(Serialize)]
struct ReportView<'a> {
    target: &'a str,
    ready: bool,
    databases: &'a [String],
    results: &'a [RuleResult],
}

impl Serialize for ReadinessReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ReportView {
            target: &self.target,
            ready: self.ready(),
            databases: &self.databases,
            results: &self.results,
        }
        .serialize(serializer)
    }
}

pub fn cluster_header(label: &str) -> Vec<String> {
    vec![
        String::new(),
        "═".repeat(RULE_WIDTH),
        format!("Blue/Green readiness check: {}", label),
        "═".repeat(RULE_WIDTH),
    ]
}

pub fn database_header(database: &str) -> Vec<String> {
    vec![
        String::new(),
        format!("Database: {}", database),
        "─".repeat(RULE_WIDTH),
    ]
}

pub fn cluster_rules_header() -> Vec<String> {
    vec![
        String::new(),
        "Cluster-wide checks".to_string(),
        "─".repeat(RULE_WIDTH),
    ]
}

/// Pass/warn block for one rule result
pub fn render_result(result: &RuleResult) -> Vec<String> {
    let icon = if result.passed { "✓ PASS" } else { "⚠ WARN" };
    let mut lines = vec![format!("  {}  {}", icon, result.rule.title())];

    if let Some(detail) = &result.detail {
        lines.extend(detail.lines().map(|l| format!("      {}", l)));
    }
    lines.extend(result.remediation.iter().map(|s| format!("        {}", s)));
    lines
}

/// Final verdict banner for a target
pub fn render_verdict(report: &ReadinessReport) -> Vec<String> {
    let verdict = if report.ready() {
        format!("✓ {}: READY for Blue/Green Deployment switchover", report.target)
    } else {
        format!(
            "✗ {}: NOT READY ({} issue(s) found)",
            report.target,
            report.failed_count()
        )
    };

    vec![
        String::new(),
        "═".repeat(RULE_WIDTH),
        verdict,
        format!(
            "  {} database(s) checked, {} rule result(s)",
            report.databases.len(),
            report.results.len()
        ),
        "═".repeat(RULE_WIDTH),
    ]
}

/// Banner for a target that could not be evaluated at all
pub fn render_unreachable(label: &str, error: &str) -> Vec<String> {
    let mut lines = vec![
        String::new(),
        "═".repeat(RULE_WIDTH),
        format!("✗ {}: NOT CHECKED (connection failed)", label),
    ];
    lines.extend(error.lines().map(|l| format!("      {}", l)));
    lines.push("═".repeat(RULE_WIDTH));
    lines
}

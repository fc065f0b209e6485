// ABOUTME: Readiness check command - evaluates every target, database, and rule in order
// ABOUTME: Streams per-rule results to the report sink and folds them into a verdict

use crate::config::{ResolvedTargets, RunConfig};
use crate::error::ReadinessError;
use crate::output::{log_file_name, ReportWriter};
use crate::postgres::catalog::{CatalogSession, Connector, PgConnector};
use crate::report::{self, ReadinessReport};
use crate::rules::{evaluate_cluster_rule, evaluate_database_rule, Rule, RuleResult, RuleTarget};
use crate::target::{ClusterTarget, SkippedLine};
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::{self, Write};

/// Run completed; a NOT READY verdict alone does not change this
pub const EXIT_OK: u8 = 0;
/// No target could be evaluated
pub const EXIT_NOTHING_CHECKED: u8 = 1;
/// `--fail-on-not-ready` and some target is NOT READY or unreachable
pub const EXIT_NOT_READY: u8 = 3;

/// A target whose connection or enumeration failed
#[derive(Debug, Clone, Serialize)]
pub struct UnreachableTarget {
    pub target: String,
    pub error: String,
}

#[derive(Debug)]
pub enum TargetOutcome {
    Evaluated(ReadinessReport),
    Unreachable(UnreachableTarget),
}

/// Results of a whole run across all targets
#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    pub reports: Vec<ReadinessReport>,
    pub unreachable: Vec<UnreachableTarget>,
    pub skipped_lines: Vec<SkippedLine>,
}

impl RunSummary {
    pub fn all_ready(&self) -> bool {
        self.unreachable.is_empty() && self.reports.iter().all(ReadinessReport::ready)
    }

    /// Process exit status for this run
    ///
    /// A NOT READY verdict is informational unless `fail_on_not_ready` is set.
    pub fn exit_code(&self, fail_on_not_ready: bool) -> u8 {
        if self.reports.is_empty() {
            EXIT_NOTHING_CHECKED
        } else if fail_on_not_ready && !self.all_ready() {
            EXIT_NOT_READY
        } else {
            EXIT_OK
        }
    }
}

/// Run the readiness check for resolved targets against live clusters
///
/// Returns the process exit code. Report lines go to stdout and, unless
/// disabled, to `<prefix>_<timestamp>.log`. With `--json` the text report
/// moves to stderr and stdout carries only the JSON summary.
pub async fn check(config: &RunConfig, resolved: &ResolvedTargets) -> Result<u8> {
    let summary = if config.json {
        let summary = run_report(config, resolved, ReportWriter::new(io::stderr())).await?;
        let mut stdout = io::stdout().lock();
        write_json_summary(&mut stdout, &summary)?;
        summary
    } else {
        run_report(config, resolved, ReportWriter::stdout()).await?
    };

    Ok(summary.exit_code(config.fail_on_not_ready))
}

async fn run_report<W: Write>(
    config: &RunConfig,
    resolved: &ResolvedTargets,
    mut out: ReportWriter<W>,
) -> Result<RunSummary> {
    if config.log.to_file {
        let path = log_file_name(&config.log.prefix, chrono::Local::now());
        out = out.with_log_file(&path)?;
        tracing::info!("Writing report to {}", path.display());
    }

    let summary = check_targets(&PgConnector, resolved, &mut out).await?;

    if let Some(path) = out.log_path() {
        let line = format!("Report written to {}", path.display());
        out.line(&line)?;
    }
    out.flush()?;

    Ok(summary)
}

/// Write the run summary as one pretty-printed JSON document
pub fn write_json_summary<W: Write>(writer: &mut W, summary: &RunSummary) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, summary).context("Failed to serialize report")?;
    writeln!(writer).context("Failed to write JSON report")?;
    writer.flush().context("Failed to write JSON report")?;
    Ok(())
}

/// Evaluate every target in order, one at a time
pub async fn check_targets<C: Connector, W: Write>(
    connector: &C,
    resolved: &ResolvedTargets,
    out: &mut ReportWriter<W>,
) -> Result<RunSummary> {
    let mut summary = RunSummary {
        skipped_lines: resolved.skipped.clone(),
        ..Default::default()
    };

    for skipped in &resolved.skipped {
        tracing::warn!(
            "Skipping endpoints file line {}: {} ({})",
            skipped.line,
            skipped.reason,
            skipped.content
        );
        out.line(&format!(
            "⚠ Skipped endpoints file line {}: {} ({})",
            skipped.line, skipped.reason, skipped.content
        ))?;
    }

    if resolved.targets.is_empty() {
        tracing::warn!("No cluster targets to check");
        out.line("⚠ No cluster targets to check")?;
    }

    for target in &resolved.targets {
        match check_target(connector, target, out).await? {
            TargetOutcome::Evaluated(report) => summary.reports.push(report),
            TargetOutcome::Unreachable(failure) => summary.unreachable.push(failure),
        }
    }

    if resolved.targets.len() > 1 || !resolved.skipped.is_empty() {
        let ready = summary.reports.iter().filter(|r| r.ready()).count();
        out.lines([
            String::new(),
            format!(
                "Summary: {} ready, {} not ready, {} unreachable, {} skipped line(s)",
                ready,
                summary.reports.len() - ready,
                summary.unreachable.len(),
                summary.skipped_lines.len()
            ),
        ])?;
    }

    Ok(summary)
}

/// Evaluate one cluster target
///
/// Connection or enumeration failure ends this target only. Per-database
/// rules run for each enumerated database, then each cluster rule runs once.
pub async fn check_target<C: Connector, W: Write>(
    connector: &C,
    target: &ClusterTarget,
    out: &mut ReportWriter<W>,
) -> Result<TargetOutcome> {
    let label = target.label();
    out.lines(report::cluster_header(&label))?;

    tracing::info!(
        "Connecting to {} as {} (database {}, credentials from {})...",
        label,
        target.user,
        target.maintenance_database(),
        target.credential
    );
    let admin = match connector.connect(target, target.maintenance_database()).await {
        Ok(session) => session,
        Err(e) => return mark_unreachable(out, &label, &format!("{:#}", e)),
    };

    let databases = match target.single_database() {
        Some(database) => vec![database.to_string()],
        None => match admin.list_databases().await {
            Ok(databases) => databases,
            Err(e) => return mark_unreachable(out, &label, &format!("{:#}", e)),
        },
    };
    tracing::info!("Checking {} database(s) on {}", databases.len(), label);

    let mut report = ReadinessReport::new(label.clone());
    report.databases = databases.clone();

    for database in &databases {
        out.lines(report::database_header(database))?;

        if database == target.maintenance_database() {
            check_database(&admin, database, &mut report, out).await?;
            continue;
        }

        match connector.connect(target, database).await {
            Ok(session) => check_database(&session, database, &mut report, out).await?,
            Err(e) => {
                let error = ReadinessError::Connection {
                    target: format!("database {} on {}", database, label),
                    message: format!("{:#}", e),
                };
                tracing::warn!("{}", error);
                for rule in Rule::DATABASE_RULES {
                    let result = RuleResult::fail(
                        rule,
                        RuleTarget::Database(database.clone()),
                        error.to_string(),
                    );
                    out.lines(report::render_result(&result))?;
                    report.record(result);
                }
            }
        }
    }

    out.lines(report::cluster_rules_header())?;
    for rule in Rule::CLUSTER_RULES {
        let result = evaluate_cluster_rule(&admin, &label, rule).await;
        out.lines(report::render_result(&result))?;
        report.record(result);
    }

    out.lines(report::render_verdict(&report))?;
    Ok(TargetOutcome::Evaluated(report))
}

async fn check_database<S: CatalogSession, W: Write>(
    session: &S,
    database: &str,
    report: &mut ReadinessReport,
    out: &mut ReportWriter<W>,
) -> Result<()> {
    for rule in Rule::DATABASE_RULES {
        let result = evaluate_database_rule(session, database, rule).await;
        out.lines(report::render_result(&result))?;
        report.record(result);
    }
    Ok(())
}

fn mark_unreachable<W: Write>(
    out: &mut ReportWriter<W>,
    label: &str,
    message: &str,
) -> Result<TargetOutcome> {
    let error = ReadinessError::Connection {
        target: label.to_string(),
        message: message.to_string(),
    };
    tracing::error!("{}", error);
    out.lines(report::render_unreachable(label, message))?;

    Ok(TargetOutcome::Unreachable(UnreachableTarget {
        target: label.to_string(),
        error: error.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postgres::catalog::LogicalSlot;
    use crate::rules::{ReplicaIdentity, TableIdentity};
    use anyhow::bail;
    use std::cell::Cell;
    use std::rc::Rc;
    use tokio_postgres::config::SslMode;

    #[derive(Default)]
    struct Calls {
        connects: Cell<usize>,
        list_databases: Cell<usize>,
        table_identities: Cell<usize>,
        large_objects: Cell<usize>,
        foreign_tables: Cell<usize>,
        logical_slots: Cell<usize>,
    }

    fn bump(cell: &Cell<usize>) {
        cell.set(cell.get() + 1);
    }

    /// In-memory cluster: hosts named "down" refuse connections and
    /// databases named "locked" refuse per-database connections
    struct FakeCluster {
        databases: Vec<String>,
        tables: Vec<TableIdentity>,
        slots: Vec<LogicalSlot>,
        calls: Rc<Calls>,
    }

    impl FakeCluster {
        fn with_databases(names: &[&str]) -> Self {
            Self {
                databases: names.iter().map(|n| n.to_string()).collect(),
                tables: Vec::new(),
                slots: Vec::new(),
                calls: Rc::new(Calls::default()),
            }
        }
    }

    struct FakeSession {
        databases: Vec<String>,
        tables: Vec<TableIdentity>,
        slots: Vec<LogicalSlot>,
        calls: Rc<Calls>,
    }

    impl Connector for FakeCluster {
        type Session = FakeSession;

        async fn connect(&self, target: &ClusterTarget, database: &str) -> Result<FakeSession> {
            bump(&self.calls.connects);
            if target.host == "down" {
                bail!("Connection refused: Unable to reach database server.");
            }
            if database == "locked" {
                bail!("permission denied for database \"locked\"");
            }
            Ok(FakeSession {
                databases: self.databases.clone(),
                tables: self.tables.clone(),
                slots: self.slots.clone(),
                calls: Rc::clone(&self.calls),
            })
        }
    }

    impl CatalogSession for FakeSession {
        async fn list_databases(&self) -> Result<Vec<String>> {
            bump(&self.calls.list_databases);
            Ok(self.databases.clone())
        }

        async fn table_identities(&self) -> Result<Vec<TableIdentity>> {
            bump(&self.calls.table_identities);
            Ok(self.tables.clone())
        }

        async fn large_object_count(&self) -> Result<i64> {
            bump(&self.calls.large_objects);
            Ok(0)
        }

        async fn foreign_tables(&self) -> Result<Vec<String>> {
            bump(&self.calls.foreign_tables);
            Ok(Vec::new())
        }

        async fn logical_slots(&self) -> Result<Vec<LogicalSlot>> {
            bump(&self.calls.logical_slots);
            Ok(self.slots.clone())
        }
    }

    fn cluster_target(host: &str) -> ClusterTarget {
        ClusterTarget::cluster(host, 5432, "admin", "secret", SslMode::Disable)
    }

    fn resolved(targets: Vec<ClusterTarget>) -> ResolvedTargets {
        ResolvedTargets {
            targets,
            skipped: Vec::new(),
        }
    }

    fn console(out: ReportWriter<Vec<u8>>) -> String {
        String::from_utf8(out.into_console().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_cluster_rule_runs_once_per_target() {
        let fake = FakeCluster::with_databases(&["a", "b", "c", "d", "e"]);
        let mut out = ReportWriter::new(Vec::new());

        let outcome = check_target(&fake, &cluster_target("prod"), &mut out)
            .await
            .unwrap();

        assert_eq!(fake.calls.list_databases.get(), 1);
        assert_eq!(fake.calls.table_identities.get(), 5);
        assert_eq!(fake.calls.large_objects.get(), 5);
        assert_eq!(fake.calls.foreign_tables.get(), 5);
        assert_eq!(fake.calls.logical_slots.get(), 1);

        match outcome {
            TargetOutcome::Evaluated(report) => {
                assert_eq!(report.databases.len(), 5);
                assert_eq!(report.results.len(), 5 * 3 + 1);
                assert!(report.ready());
            }
            TargetOutcome::Unreachable(_) => panic!("target should be reachable"),
        }
    }

    #[tokio::test]
    async fn test_rules_run_in_fixed_order() {
        let fake = FakeCluster::with_databases(&["app"]);
        let mut out = ReportWriter::new(Vec::new());

        let TargetOutcome::Evaluated(report) =
            check_target(&fake, &cluster_target("prod"), &mut out)
                .await
                .unwrap()
        else {
            panic!("target should be reachable");
        };

        let order: Vec<Rule> = report.results.iter().map(|r| r.rule).collect();
        assert_eq!(
            order,
            vec![
                Rule::PrimaryKeyReplicaIdentity,
                Rule::LargeObjects,
                Rule::ForeignTables,
                Rule::LogicalReplicationSlots,
            ]
        );
    }

    #[tokio::test]
    async fn test_zero_databases_is_ready() {
        let fake = FakeCluster::with_databases(&[]);
        let mut out = ReportWriter::new(Vec::new());

        let summary = check_targets(&fake, &resolved(vec![cluster_target("prod")]), &mut out)
            .await
            .unwrap();

        assert_eq!(summary.reports.len(), 1);
        assert_eq!(summary.reports[0].results.len(), 1);
        assert!(summary.all_ready());
        assert_eq!(summary.exit_code(true), EXIT_OK);
        assert!(console(out).contains("READY for Blue/Green Deployment switchover"));
    }

    #[tokio::test]
    async fn test_single_database_target_skips_enumeration() {
        let fake = FakeCluster::with_databases(&["ignored", "also_ignored"]);
        let target =
            ClusterTarget::from_connection_string("postgresql://admin:pw@prod:5432/orders")
                .unwrap();
        let mut out = ReportWriter::new(Vec::new());

        let TargetOutcome::Evaluated(report) = check_target(&fake, &target, &mut out)
            .await
            .unwrap()
        else {
            panic!("target should be reachable");
        };

        assert_eq!(fake.calls.list_databases.get(), 0);
        assert_eq!(fake.calls.connects.get(), 1);
        assert_eq!(report.databases, vec!["orders".to_string()]);
    }

    #[tokio::test]
    async fn test_noncompliant_table_makes_cluster_not_ready() {
        let mut fake = FakeCluster::with_databases(&["app"]);
        fake.tables = vec![TableIdentity {
            qualified_name: "public.events".to_string(),
            has_primary_key: false,
            replica_identity: ReplicaIdentity::Default,
            columns: vec!["id".to_string()],
        }];
        let mut out = ReportWriter::new(Vec::new());

        let summary = check_targets(&fake, &resolved(vec![cluster_target("prod")]), &mut out)
            .await
            .unwrap();

        assert!(!summary.reports[0].ready());
        assert_eq!(summary.exit_code(false), EXIT_OK);
        assert_eq!(summary.exit_code(true), EXIT_NOT_READY);

        let text = console(out);
        assert!(text.contains("Database: app"));
        assert!(text.contains(
            "ALTER TABLE public.events REPLICA IDENTITY FULL; ALTER TABLE public.events ADD PRIMARY KEY (id);"
        ));
        assert!(text.contains("NOT READY (1 issue(s) found)"));
    }

    #[tokio::test]
    async fn test_logical_slot_reported_once() {
        let mut fake = FakeCluster::with_databases(&["a", "b"]);
        fake.slots = vec![LogicalSlot {
            name: "cdc_slot".to_string(),
            database: Some("a".to_string()),
        }];
        let mut out = ReportWriter::new(Vec::new());

        let summary = check_targets(&fake, &resolved(vec![cluster_target("prod")]), &mut out)
            .await
            .unwrap();

        assert_eq!(summary.reports[0].failed_count(), 1);
        assert_eq!(console(out).matches("cdc_slot").count(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_only_target_exits_nonzero() {
        let fake = FakeCluster::with_databases(&["app"]);
        let mut out = ReportWriter::new(Vec::new());

        let summary = check_targets(&fake, &resolved(vec![cluster_target("down")]), &mut out)
            .await
            .unwrap();

        assert!(summary.reports.is_empty());
        assert_eq!(summary.unreachable.len(), 1);
        assert!(summary.unreachable[0].error.contains("Connection refused"));
        assert_eq!(summary.exit_code(false), EXIT_NOTHING_CHECKED);
        assert!(console(out).contains("NOT CHECKED"));
    }

    #[tokio::test]
    async fn test_unreachable_target_does_not_stop_others() {
        let fake = FakeCluster::with_databases(&["app"]);
        let mut out = ReportWriter::new(Vec::new());
        let targets = vec![cluster_target("down"), cluster_target("prod")];

        let summary = check_targets(&fake, &resolved(targets), &mut out)
            .await
            .unwrap();

        assert_eq!(summary.unreachable.len(), 1);
        assert_eq!(summary.reports.len(), 1);
        assert_eq!(summary.reports[0].target, "prod:5432");
        assert_eq!(summary.exit_code(false), EXIT_OK);
        assert_eq!(summary.exit_code(true), EXIT_NOT_READY);
        assert!(console(out).contains("Summary: 1 ready, 0 not ready, 1 unreachable"));
    }

    #[tokio::test]
    async fn test_database_connection_failure_is_local() {
        let fake = FakeCluster::with_databases(&["app", "locked", "zeta"]);
        let mut out = ReportWriter::new(Vec::new());

        let TargetOutcome::Evaluated(report) =
            check_target(&fake, &cluster_target("prod"), &mut out)
                .await
                .unwrap()
        else {
            panic!("target should be reachable");
        };

        let locked: Vec<&RuleResult> = report.for_database("locked").collect();
        assert_eq!(locked.len(), 3);
        assert!(locked.iter().all(|r| !r.passed));
        assert!(locked[0].detail.as_deref().unwrap().contains("permission denied"));

        assert!(report.for_database("zeta").all(|r| r.passed));
        assert_eq!(fake.calls.table_identities.get(), 2);
        assert_eq!(fake.calls.logical_slots.get(), 1);
    }

    #[tokio::test]
    async fn test_skipped_endpoint_lines_are_reported() {
        let fake = FakeCluster::with_databases(&[]);
        let mut out = ReportWriter::new(Vec::new());
        let resolved = ResolvedTargets {
            targets: vec![ClusterTarget::endpoint(
                &crate::target::Endpoint {
                    line: 1,
                    host: "prod".to_string(),
                    database: "app".to_string(),
                },
                5432,
                "checker",
                "pw",
                SslMode::Disable,
            )],
            skipped: vec![SkippedLine {
                line: 2,
                content: "garbage".to_string(),
                reason: "expected host:database".to_string(),
            }],
        };

        let summary = check_targets(&fake, &resolved, &mut out).await.unwrap();

        assert_eq!(summary.reports.len(), 1);
        assert_eq!(summary.skipped_lines.len(), 1);
        assert_eq!(summary.exit_code(false), EXIT_OK);
        let text = console(out);
        assert!(text.contains("Skipped endpoints file line 2"));
        assert!(text.contains("Database: app"));
    }

    #[tokio::test]
    async fn test_no_targets_exits_nonzero() {
        let fake = FakeCluster::with_databases(&[]);
        let mut out = ReportWriter::new(Vec::new());

        let summary = check_targets(&fake, &ResolvedTargets::default(), &mut out)
            .await
            .unwrap();
        assert_eq!(summary.exit_code(false), EXIT_NOTHING_CHECKED);
    }

    #[test]
    fn test_json_summary_is_a_single_document() {
        let mut report = ReadinessReport::new("db1:5432");
        report.databases.push("app".to_string());
        report.record(RuleResult::pass(
            Rule::LargeObjects,
            RuleTarget::Database("app".to_string()),
        ));
        let summary = RunSummary {
            reports: vec![report],
            unreachable: vec![UnreachableTarget {
                target: "down:5432".to_string(),
                error: "Could not connect to down:5432: refused".to_string(),
            }],
            skipped_lines: Vec::new(),
        };

        let mut buf = Vec::new();
        write_json_summary(&mut buf, &summary).unwrap();

        let json: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(json["reports"][0]["target"], "db1:5432");
        assert_eq!(json["reports"][0]["ready"], true);
        assert_eq!(json["unreachable"][0]["target"], "down:5432");
        assert!(json["skipped_lines"].as_array().unwrap().is_empty());
    }
}

// ABOUTME: Runs a single readiness rule and interprets its catalog result
// ABOUTME: Query failures become failed rule results instead of aborting the run

use crate::error::ReadinessError;
use crate::postgres::catalog::{CatalogSession, LogicalSlot};
use crate::rules::remediation::{suggest_statement, TableIdentity};
use crate::rules::{Rule, RuleResult, RuleTarget};

/// Evaluate a per-database rule on a session connected to `database`
pub async fn evaluate_database_rule<S: CatalogSession>(
    session: &S,
    database: &str,
    rule: Rule,
) -> RuleResult {
    evaluate(session, rule, RuleTarget::Database(database.to_string())).await
}

/// Evaluate a cluster-wide rule; `cluster` is the target label
pub async fn evaluate_cluster_rule<S: CatalogSession>(
    session: &S,
    cluster: &str,
    rule: Rule,
) -> RuleResult {
    evaluate(session, rule, RuleTarget::Cluster(cluster.to_string())).await
}

async fn evaluate<S: CatalogSession>(session: &S, rule: Rule, target: RuleTarget) -> RuleResult {
    tracing::debug!("Evaluating {} on {}", rule, target);

    let outcome = match rule {
        Rule::PrimaryKeyReplicaIdentity => session
            .table_identities()
            .await
            .map(|tables| interpret_table_identities(&target, &tables)),
        Rule::LargeObjects => session
            .large_object_count()
            .await
            .map(|count| interpret_large_objects(&target, count)),
        Rule::ForeignTables => session
            .foreign_tables()
            .await
            .map(|tables| interpret_foreign_tables(&target, &tables)),
        Rule::LogicalReplicationSlots => session
            .logical_slots()
            .await
            .map(|slots| interpret_logical_slots(&target, &slots)),
    };

    outcome.unwrap_or_else(|e| {
        let error = ReadinessError::Query {
            rule: rule.name().to_string(),
            message: format!("{:#}", e),
        };
        tracing::warn!("{} on {}", error, target);
        RuleResult::fail(rule, target, error.to_string())
    })
}

fn target_name(target: &RuleTarget) -> &str {
    match target {
        RuleTarget::Database(name) | RuleTarget::Cluster(name) => name,
    }
}

fn interpret_table_identities(target: &RuleTarget, tables: &[TableIdentity]) -> RuleResult {
    let rule = Rule::PrimaryKeyReplicaIdentity;
    let statements: Vec<String> = tables.iter().filter_map(suggest_statement).collect();

    if statements.is_empty() {
        return RuleResult::pass(rule, target.clone());
    }

    let detail = format!(
        "Database {}: {} table(s) need a primary key and/or REPLICA IDENTITY FULL. \
         Suggested SQL (the primary key uses every column; review it before running):",
        target_name(target),
        statements.len()
    );
    RuleResult::fail(rule, target.clone(), detail).with_remediation(statements)
}

fn interpret_large_objects(target: &RuleTarget, count: i64) -> RuleResult {
    let rule = Rule::LargeObjects;
    if count == 0 {
        return RuleResult::pass(rule, target.clone());
    }

    RuleResult::fail(
        rule,
        target.clone(),
        format!(
            "Database {} contains {} large object(s). Large objects are not replicated \
             by Blue/Green Deployments; move them to bytea columns or external storage \
             before switchover.",
            target_name(target),
            count
        ),
    )
}

fn interpret_foreign_tables(target: &RuleTarget, tables: &[String]) -> RuleResult {
    let rule = Rule::ForeignTables;
    if tables.is_empty() {
        return RuleResult::pass(rule, target.clone());
    }

    RuleResult::fail(
        rule,
        target.clone(),
        format!(
            "Database {} contains foreign tables ({}). Foreign table data is not \
             replicated by Blue/Green Deployments; verify the foreign servers are \
             reachable from the green environment.",
            target_name(target),
            tables.join(", ")
        ),
    )
}

fn interpret_logical_slots(target: &RuleTarget, slots: &[LogicalSlot]) -> RuleResult {
    let rule = Rule::LogicalReplicationSlots;
    if slots.is_empty() {
        return RuleResult::pass(rule, target.clone());
    }

    let names: Vec<String> = slots
        .iter()
        .map(|slot| match &slot.database {
            Some(db) => format!("{} ({})", slot.name, db),
            None => slot.name.clone(),
        })
        .collect();

    RuleResult::fail(
        rule,
        target.clone(),
        format!(
            "Cluster {} has logical replication slots: {}. Blue/Green Deployments \
             cannot be created while logical replication slots exist; drop them with \
             pg_drop_replication_slot() first.",
            target_name(target),
            names.join(", ")
        ),
    )
}

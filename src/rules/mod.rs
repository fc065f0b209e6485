// ABOUTME: The fixed catalogue of Blue/Green readiness rules
// ABOUTME: Defines rule scope, catalog query text, and the result record

pub mod evaluate;
pub mod remediation;

pub use evaluate::{evaluate_cluster_rule, evaluate_database_rule};
pub use remediation::{
    plan_remediation, suggest_statement, Remediation, ReplicaIdentity, TableIdentity,
};

use serde::Serialize;
use std::fmt;

/// A readiness rule
///
/// Rules are independent of each other. Per-database rules run in the order
/// of [`Rule::DATABASE_RULES`]; cluster rules run once per target afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    PrimaryKeyReplicaIdentity,
    LargeObjects,
    ForeignTables,
    LogicalReplicationSlots,
}

impl Rule {
    pub const DATABASE_RULES: [Rule; 3] = [
        Rule::PrimaryKeyReplicaIdentity,
        Rule::LargeObjects,
        Rule::ForeignTables,
    ];

    pub const CLUSTER_RULES: [Rule; 1] = [Rule::LogicalReplicationSlots];

    pub fn name(self) -> &'static str {
        match self {
            Rule::PrimaryKeyReplicaIdentity => "primary_key_replica_identity",
            Rule::LargeObjects => "large_objects",
            Rule::ForeignTables => "foreign_tables",
            Rule::LogicalReplicationSlots => "logical_replication_slots",
        }
    }

    /// Heading used in the text report
    pub fn title(self) -> &'static str {
        match self {
            Rule::PrimaryKeyReplicaIdentity => "Primary keys and replica identity",
            Rule::LargeObjects => "Large objects",
            Rule::ForeignTables => "Foreign tables",
            Rule::LogicalReplicationSlots => "Logical replication slots",
        }
    }

    /// Read-only catalog query backing this rule
    pub fn query(self) -> &'static str {
        match self {
            Rule::PrimaryKeyReplicaIdentity => PRIMARY_KEY_REPLICA_IDENTITY_QUERY,
            Rule::LargeObjects => LARGE_OBJECTS_QUERY,
            Rule::ForeignTables => FOREIGN_TABLES_QUERY,
            Rule::LogicalReplicationSlots => LOGICAL_SLOTS_QUERY,
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// One row per ordinary user table; compliance is decided in `remediation`
const PRIMARY_KEY_REPLICA_IDENTITY_QUERY: &str = "SELECT
        quote_ident(n.nspname) || '.' || quote_ident(c.relname) AS table_name,
        EXISTS (
            SELECT 1
            FROM pg_catalog.pg_index i
            WHERE i.indrelid = c.oid AND i.indisprimary
        ) AS has_primary_key,
        c.relreplident::text AS replica_identity,
        ARRAY(
            SELECT quote_ident(a.attname)
            FROM pg_catalog.pg_attribute a
            WHERE a.attrelid = c.oid
              AND a.attnum > 0
              AND NOT a.attisdropped
            ORDER BY a.attnum
        ) AS columns
     FROM pg_catalog.pg_class c
     JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
     WHERE c.relkind = 'r'
       AND n.nspname NOT IN ('pg_catalog', 'information_schema')
       AND n.nspname NOT LIKE 'pg_toast%'
       AND n.nspname NOT LIKE 'pg_temp%'
     ORDER BY n.nspname, c.relname";

// pg_largeobject needs superuser to read; its metadata relation holds one row per object
const LARGE_OBJECTS_QUERY: &str = "SELECT count(*) FROM pg_catalog.pg_largeobject_metadata";

const FOREIGN_TABLES_QUERY: &str = "SELECT
        quote_ident(foreign_table_schema::text) || '.' || quote_ident(foreign_table_name::text)
     FROM information_schema.foreign_tables
     ORDER BY foreign_table_schema, foreign_table_name";

const LOGICAL_SLOTS_QUERY: &str = "SELECT slot_name::text, database::text
     FROM pg_catalog.pg_replication_slots
     WHERE slot_type = 'logical'
     ORDER BY slot_name";

/// What a rule result is about
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", content = "name", rename_all = "snake_case")]
pub enum RuleTarget {
    Database(String),
    Cluster(String),
}

impl fmt::Display for RuleTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleTarget::Database(name) => write!(f, "database {}", name),
            RuleTarget::Cluster(label) => write!(f, "cluster {}", label),
        }
    }
}

/// Outcome of one rule against one database or cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleResult {
    pub rule: Rule,
    pub target: RuleTarget,
    pub passed: bool,
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remediation: Vec<String>,
}

impl RuleResult {
    pub fn pass(rule: Rule, target: RuleTarget) -> Self {
        Self {
            rule,
            target,
            passed: true,
            detail: None,
            remediation: Vec::new(),
        }
    }

    pub fn fail(rule: Rule, target: RuleTarget, detail: impl Into<String>) -> Self {
        Self {
            rule,
            target,
            passed: false,
            detail: Some(detail.into()),
            remediation: Vec::new(),
        }
    }

    pub fn with_remediation(mut self, statements: Vec<String>) -> Self {
        self.remediation = statements;
        self
    }
}

// ABOUTME: Primary-key and replica-identity remediation planning
// ABOUTME: Maps a table's key/identity state to suggested ALTER TABLE statements

/// Replica identity as stored in `pg_class.relreplident`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaIdentity {
    Default,
    Nothing,
    Full,
    Index,
}

impl ReplicaIdentity {
    /// Decode the single-character catalog code
    ///
    /// Unknown codes are treated as `Default`, which is never compliant.
    pub fn from_code(code: &str) -> Self {
        match code {
            "f" => Self::Full,
            "n" => Self::Nothing,
            "i" => Self::Index,
            _ => Self::Default,
        }
    }

    pub fn is_full(self) -> bool {
        self == Self::Full
    }
}

/// Key and identity state of one ordinary table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableIdentity {
    /// Schema-qualified, already quoted for SQL
    pub qualified_name: String,
    pub has_primary_key: bool,
    pub replica_identity: ReplicaIdentity,
    /// Non-dropped columns in declaration order, already quoted
    pub columns: Vec<String>,
}

/// What a table needs before it can be replicated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Remediation {
    ReplicaIdentityFull,
    AddPrimaryKey { columns: Vec<String> },
    ReplicaIdentityFullAndPrimaryKey { columns: Vec<String> },
}

/// Decide the remediation for a table, if any
///
/// The primary-key suggestion uses every column and is a starting point
/// only. A table without columns cannot take a key, so it only ever gets the
/// replica identity clause.
pub fn plan_remediation(table: &TableIdentity) -> Option<Remediation> {
    let needs_identity = !table.replica_identity.is_full();
    let needs_key = !table.has_primary_key && !table.columns.is_empty();

    match (needs_identity, needs_key) {
        (false, false) => None,
        (true, false) => Some(Remediation::ReplicaIdentityFull),
        (false, true) => Some(Remediation::AddPrimaryKey {
            columns: table.columns.clone(),
        }),
        (true, true) => Some(Remediation::ReplicaIdentityFullAndPrimaryKey {
            columns: table.columns.clone(),
        }),
    }
}

impl Remediation {
    /// Clauses in execution order: replica identity first, then the key
    pub fn clauses(&self) -> Vec<String> {
        match self {
            Self::ReplicaIdentityFull => vec![replica_identity_clause()],
            Self::AddPrimaryKey { columns } => vec![primary_key_clause(columns)],
            Self::ReplicaIdentityFullAndPrimaryKey { columns } => {
                vec![replica_identity_clause(), primary_key_clause(columns)]
            }
        }
    }

    /// Render as semicolon-terminated `ALTER TABLE` statements on one line
    pub fn render(&self, qualified_name: &str) -> String {
        self.clauses()
            .iter()
            .map(|clause| format!("ALTER TABLE {} {};", qualified_name, clause))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn replica_identity_clause() -> String {
    "REPLICA IDENTITY FULL".to_string()
}

fn primary_key_clause(columns: &[String]) -> String {
    format!("ADD PRIMARY KEY ({})", columns.join(", "))
}

/// Render the suggestion for a table, or `None` when it is compliant
pub fn suggest_statement(table: &TableIdentity) -> Option<String> {
    plan_remediation(table).map(|r| r.render(&table.qualified_name))
}

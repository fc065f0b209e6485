// ABOUTME: Read-only catalog queries used by the readiness rules
// ABOUTME: Defines the session seam the evaluator runs against and its tokio-postgres impl

use crate::postgres::connection;
use crate::rules::{ReplicaIdentity, Rule, TableIdentity};
use crate::target::ClusterTarget;
use anyhow::{Context, Result};
use tokio_postgres::Client;

/// Administrative databases that are never evaluated
pub const EXCLUDED_DATABASES: &[&str] = &["rdsadmin", "template0", "template1"];

const LIST_DATABASES_QUERY: &str = "SELECT datname::text
     FROM pg_catalog.pg_database
     WHERE datistemplate = false
       AND datname <> ALL($1::text[])
     ORDER BY datname";

/// A logical replication slot found on the cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalSlot {
    pub name: String,
    pub database: Option<String>,
}

/// Catalog lookups available on an open database session
///
/// Each method issues exactly one query.
#[allow(async_fn_in_trait)]
pub trait CatalogSession {
    async fn list_databases(&self) -> Result<Vec<String>>;
    async fn table_identities(&self) -> Result<Vec<TableIdentity>>;
    async fn large_object_count(&self) -> Result<i64>;
    async fn foreign_tables(&self) -> Result<Vec<String>>;
    async fn logical_slots(&self) -> Result<Vec<LogicalSlot>>;
}

/// Opens sessions against databases of a cluster target
#[allow(async_fn_in_trait)]
pub trait Connector {
    type Session: CatalogSession;

    async fn connect(&self, target: &ClusterTarget, database: &str) -> Result<Self::Session>;
}

/// Connector backed by `tokio-postgres` with TLS
#[derive(Debug, Clone, Copy, Default)]
pub struct PgConnector;

impl Connector for PgConnector {
    type Session = Client;

    async fn connect(&self, target: &ClusterTarget, database: &str) -> Result<Client> {
        tracing::debug!("Connecting to {} on {}", database, target.label());
        connection::connect(&target.config_for(database)).await
    }
}

impl CatalogSession for Client {
    async fn list_databases(&self) -> Result<Vec<String>> {
        list_databases(self).await
    }

    async fn table_identities(&self) -> Result<Vec<TableIdentity>> {
        list_table_identities(self).await
    }

    async fn large_object_count(&self) -> Result<i64> {
        count_large_objects(self).await
    }

    async fn foreign_tables(&self) -> Result<Vec<String>> {
        list_foreign_tables(self).await
    }

    async fn logical_slots(&self) -> Result<Vec<LogicalSlot>> {
        list_logical_slots(self).await
    }
}

/// List all non-template, non-administrative databases in the cluster
pub async fn list_databases(client: &Client) -> Result<Vec<String>> {
    let excluded: Vec<&str> = EXCLUDED_DATABASES.to_vec();
    let rows = client
        .query(LIST_DATABASES_QUERY, &[&excluded])
        .await
        .context("Failed to list databases")?;

    Ok(rows.iter().map(|row| row.get(0)).collect())
}

/// Key and replica-identity state of every ordinary user table
pub async fn list_table_identities(client: &Client) -> Result<Vec<TableIdentity>> {
    let rows = client
        .query(Rule::PrimaryKeyReplicaIdentity.query(), &[])
        .await
        .context("Failed to query primary keys and replica identity")?;

    let tables = rows
        .iter()
        .map(|row| {
            let identity: String = row.get(2);
            TableIdentity {
                qualified_name: row.get(0),
                has_primary_key: row.get(1),
                replica_identity: ReplicaIdentity::from_code(&identity),
                columns: row.get(3),
            }
        })
        .collect();

    Ok(tables)
}

pub async fn count_large_objects(client: &Client) -> Result<i64> {
    let row = client
        .query_one(Rule::LargeObjects.query(), &[])
        .await
        .context("Failed to query large objects")?;

    Ok(row.get(0))
}

pub async fn list_foreign_tables(client: &Client) -> Result<Vec<String>> {
    let rows = client
        .query(Rule::ForeignTables.query(), &[])
        .await
        .context("Failed to query foreign tables")?;

    Ok(rows.iter().map(|row| row.get(0)).collect())
}

pub async fn list_logical_slots(client: &Client) -> Result<Vec<LogicalSlot>> {
    let rows = client
        .query(Rule::LogicalReplicationSlots.query(), &[])
        .await
        .context("Failed to query replication slots")?;

    let slots = rows
        .iter()
        .map(|row| LogicalSlot {
            name: row.get(0),
            database: row.get(1),
        })
        .collect();

    Ok(slots)
}

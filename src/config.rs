// ABOUTME: Run configuration independent of the CLI parser
// ABOUTME: Validates credential pairing and resolves the cluster targets to check

use crate::error::ReadinessError;
use crate::target::{read_endpoints_file, ClusterTarget, SkippedLine};
use std::path::PathBuf;
use tokio_postgres::config::SslMode;

pub const DEFAULT_LOG_PREFIX: &str = "bgd_readiness";

/// How the cluster targets are selected; exactly one mode per run
#[derive(Debug, Clone)]
pub enum TargetSelection {
    /// Discrete flags; every database in the cluster is checked
    Cluster {
        host: String,
        port: u16,
        user: Option<String>,
        password: Option<String>,
    },
    /// A single database named by a connection string
    ConnectionString(String),
    /// `host:database` lines sharing one set of credentials
    EndpointsFile {
        path: PathBuf,
        port: u16,
        user: Option<String>,
        password: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct LogSettings {
    pub prefix: String,
    /// When false, report lines go to stdout only
    pub to_file: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_LOG_PREFIX.to_string(),
            to_file: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub selection: TargetSelection,
    pub ssl_mode: SslMode,
    pub log: LogSettings,
    pub json: bool,
    /// Exit non-zero when any target is NOT READY
    pub fail_on_not_ready: bool,
}

/// Targets to evaluate plus endpoint lines that were skipped
#[derive(Debug, Default)]
pub struct ResolvedTargets {
    pub targets: Vec<ClusterTarget>,
    pub skipped: Vec<SkippedLine>,
}

impl RunConfig {
    pub fn new(selection: TargetSelection) -> Self {
        Self {
            selection,
            ssl_mode: SslMode::Prefer,
            log: LogSettings::default(),
            json: false,
            fail_on_not_ready: false,
        }
    }

    /// Check credential pairing before any database work
    ///
    /// # Errors
    ///
    /// Returns `ReadinessError::Usage` naming the missing or empty flag.
    pub fn validate(&self) -> Result<(), ReadinessError> {
        match &self.selection {
            TargetSelection::Cluster {
                host,
                user,
                password,
                ..
            } => {
                require("--host", Some(host))?;
                require("--user", user.as_ref())?;
                require("--password (or PGPASSWORD)", password.as_ref())?;
            }
            TargetSelection::ConnectionString(s) => {
                require("--connection-string", Some(s))?;
            }
            TargetSelection::EndpointsFile { user, password, .. } => {
                require("--file-user", user.as_ref())?;
                require("--file-password (or BGD_FILE_PASSWORD)", password.as_ref())?;
            }
        }

        if self.log.to_file && self.log.prefix.trim().is_empty() {
            return Err(ReadinessError::usage(
                "--log-prefix cannot be empty (use --no-log to disable the log file)",
            ));
        }

        Ok(())
    }

    /// Build the list of cluster targets
    ///
    /// Reads the endpoints file in file mode. Malformed lines are returned in
    /// `skipped` and do not fail the run.
    pub fn resolve_targets(&self) -> Result<ResolvedTargets, ReadinessError> {
        self.validate()?;

        match &self.selection {
            TargetSelection::Cluster {
                host,
                port,
                user,
                password,
            } => Ok(ResolvedTargets {
                targets: vec![ClusterTarget::cluster(
                    host,
                    *port,
                    user.as_deref().unwrap_or_default(),
                    password.as_deref().unwrap_or_default(),
                    self.ssl_mode,
                )],
                skipped: Vec::new(),
            }),
            TargetSelection::ConnectionString(s) => Ok(ResolvedTargets {
                targets: vec![ClusterTarget::from_connection_string(s)?],
                skipped: Vec::new(),
            }),
            TargetSelection::EndpointsFile {
                path,
                port,
                user,
                password,
            } => {
                let (endpoints, skipped) = read_endpoints_file(path)?;
                let user = user.as_deref().unwrap_or_default();
                let password = password.as_deref().unwrap_or_default();
                let targets = endpoints
                    .iter()
                    .map(|e| ClusterTarget::endpoint(e, *port, user, password, self.ssl_mode))
                    .collect();
                Ok(ResolvedTargets { targets, skipped })
            }
        }
    }
}

fn require(flag: &str, value: Option<&String>) -> Result<(), ReadinessError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(()),
        _ => Err(ReadinessError::usage(format!("{} is required", flag))),
    }
}

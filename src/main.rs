// ABOUTME: CLI entry point for pg-bluegreen-readiness
// ABOUTME: Parses target-selection flags and runs the readiness check

use clap::error::ErrorKind;
use clap::parser::ValueSource;
use clap::{ArgGroup, ArgMatches, CommandFactory, FromArgMatches, Parser, ValueEnum};
use pg_bluegreen_readiness::commands;
use pg_bluegreen_readiness::config::{LogSettings, RunConfig, TargetSelection, DEFAULT_LOG_PREFIX};
use pg_bluegreen_readiness::error::ReadinessError;
use pg_bluegreen_readiness::target::DEFAULT_PORT;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_postgres::config::SslMode;

#[derive(Parser)]
#[command(name = "pg-bluegreen-readiness")]
#[command(
    about = "Check PostgreSQL (RDS/Aurora) clusters for Blue/Green Deployment readiness",
    long_about = None
)]
#[command(version)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .multiple(false)
        .args(["host", "connection_string", "endpoints_file"])
))]
struct Cli {
    /// Cluster endpoint; every database in the cluster is checked
    #[arg(long)]
    host: Option<String>,
    /// Port for --host and --endpoints-file targets
    #[arg(long, default_value_t = DEFAULT_PORT, conflicts_with = "connection_string")]
    port: u16,
    /// User for --host
    #[arg(long, requires = "host")]
    user: Option<String>,
    /// Password for --host
    #[arg(long, env = "PGPASSWORD", hide_env_values = true)]
    password: Option<String>,
    /// Connection string naming a single database to check
    #[arg(long)]
    connection_string: Option<String>,
    /// File of newline-delimited host:database pairs
    #[arg(long)]
    endpoints_file: Option<PathBuf>,
    /// User shared by every --endpoints-file target
    #[arg(long, requires = "endpoints_file")]
    file_user: Option<String>,
    /// Password shared by every --endpoints-file target
    #[arg(long, env = "BGD_FILE_PASSWORD", hide_env_values = true)]
    file_password: Option<String>,
    /// TLS mode for --host and --endpoints-file targets
    #[arg(
        long,
        value_enum,
        default_value_t = SslModeArg::Prefer,
        conflicts_with = "connection_string"
    )]
    ssl_mode: SslModeArg,
    /// Prefix of the timestamped log file
    #[arg(long, default_value = DEFAULT_LOG_PREFIX)]
    log_prefix: String,
    /// Print to stdout only; do not write a log file
    #[arg(long)]
    no_log: bool,
    /// Print a JSON summary on stdout; the text report goes to stderr
    #[arg(long)]
    json: bool,
    /// Exit with status 3 when any cluster is NOT READY or unreachable
    #[arg(long)]
    fail_on_not_ready: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum SslModeArg {
    Disable,
    Prefer,
    Require,
}

impl From<SslModeArg> for SslMode {
    fn from(mode: SslModeArg) -> Self {
        match mode {
            SslModeArg::Disable => SslMode::Disable,
            SslModeArg::Prefer => SslMode::Prefer,
            SslModeArg::Require => SslMode::Require,
        }
    }
}

impl Cli {
    fn into_config(self) -> RunConfig {
        let selection = if let Some(connection_string) = self.connection_string {
            TargetSelection::ConnectionString(connection_string)
        } else if let Some(path) = self.endpoints_file {
            TargetSelection::EndpointsFile {
                path,
                port: self.port,
                user: self.file_user,
                password: self.file_password,
            }
        } else {
            // The "mode" group guarantees --host is set here
            TargetSelection::Cluster {
                host: self.host.unwrap_or_default(),
                port: self.port,
                user: self.user,
                password: self.password,
            }
        };

        RunConfig {
            selection,
            ssl_mode: self.ssl_mode.into(),
            log: LogSettings {
                prefix: self.log_prefix,
                to_file: !self.no_log,
            },
            json: self.json,
            fail_on_not_ready: self.fail_on_not_ready,
        }
    }
}

// `requires` would also fire on values taken from the environment
const MODE_PASSWORDS: [(&str, &str, &str); 2] = [
    ("password", "--password", "host"),
    ("file_password", "--file-password", "endpoints_file"),
];

/// Reject a password flag given on the command line for another target mode
fn check_mode_passwords(matches: &ArgMatches) -> Result<(), clap::Error> {
    for (id, flag, mode) in MODE_PASSWORDS {
        let explicit = matches.value_source(id) == Some(ValueSource::CommandLine);
        if explicit && matches.value_source(mode).is_none() {
            return Err(Cli::command().error(
                ErrorKind::ArgumentConflict,
                format!("{} can only be used with --{}", flag, mode.replace('_', "-")),
            ));
        }
    }
    Ok(())
}

fn parse_cli() -> Cli {
    let matches = Cli::command().get_matches();
    if let Err(e) = check_mode_passwords(&matches) {
        e.exit()
    }
    Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit())
}

#[tokio::main]
async fn main() -> ExitCode {
    // Diagnostics go to stderr so stdout carries only the report
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = parse_cli().into_config();

    let resolved = match config.resolve_targets() {
        Ok(resolved) => resolved,
        Err(e) => {
            let kind = match e {
                ReadinessError::EndpointsFile { .. } => ErrorKind::Io,
                _ => ErrorKind::MissingRequiredArgument,
            };
            Cli::command().error(kind, e).exit()
        }
    };

    match commands::check(&config, &resolved).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

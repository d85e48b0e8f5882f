use std::time::Duration;

use bouncer_common::{
    ExporterConfig, parse_duration,
    error::{ExporterError, Result},
};
use clap::{ArgAction, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "bouncer-exporter",
    version,
    about = "Prometheus exporter for PgBouncer admin console statistics"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Address to listen on for the web interface and telemetry.
    #[arg(
        long = "web.listen-address",
        env = "WEB_LISTEN_ADDRESS",
        default_value = "0.0.0.0:9127",
        global = true
    )]
    pub listen_address: String,

    /// Path under which to expose metrics.
    #[arg(
        long = "web.telemetry-path",
        env = "WEB_TELEMETRY_PATH",
        default_value = "/metrics",
        global = true
    )]
    pub telemetry_path: String,

    /// Connection URL of the pgbouncer admin console.
    #[arg(long = "database-url", env = "DATABASE_URL", global = true)]
    pub database_url: Option<String>,

    /// Deadline for one scrape or health check, e.g. `2s`, `500ms` or `1m30s`.
    #[arg(
        long = "store-timeout",
        env = "STORE_TIMEOUT",
        default_value = "2s",
        value_parser = parse_duration,
        global = true
    )]
    pub store_timeout: Duration,

    #[arg(long = "export-stats", env = "EXPORT_STATS", default_value_t = true,
          num_args = 0..=1, default_missing_value = "true", action = ArgAction::Set, global = true)]
    pub export_stats: bool,

    #[arg(long = "export-pools", env = "EXPORT_POOLS", default_value_t = true,
          num_args = 0..=1, default_missing_value = "true", action = ArgAction::Set, global = true)]
    pub export_pools: bool,

    #[arg(long = "export-databases", env = "EXPORT_DATABASES", default_value_t = true,
          num_args = 0..=1, default_missing_value = "true", action = ArgAction::Set, global = true)]
    pub export_databases: bool,

    #[arg(long = "export-lists", env = "EXPORT_LISTS", default_value_t = true,
          num_args = 0..=1, default_missing_value = "true", action = ArgAction::Set, global = true)]
    pub export_lists: bool,

    #[arg(long = "export-servers", env = "EXPORT_SERVERS", default_value_t = false,
          num_args = 0..=1, default_missing_value = "true", action = ArgAction::Set, global = true)]
    pub export_servers: bool,

    #[arg(long = "export-clients", env = "EXPORT_CLIENTS", default_value_t = false,
          num_args = 0..=1, default_missing_value = "true", action = ArgAction::Set, global = true)]
    pub export_clients: bool,

    /// Space separated `key=value` labels added to every pgbouncer metric.
    #[arg(long = "default-labels", env = "DEFAULT_LABELS", default_value = "", global = true)]
    pub default_labels: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Starts the exporter server.
    Server,
    /// Checks the admin console once and exits.
    Health,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Server)
    }

    pub fn exporter_config(&self) -> Result<ExporterConfig> {
        let database_url = self
            .database_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                ExporterError::InvalidConfig(
                    "--database-url (or DATABASE_URL) is required".to_string(),
                )
            })?;

        let config = ExporterConfig {
            listen_address: self.listen_address.clone(),
            telemetry_path: self.telemetry_path.clone(),
            database_url,
            store_timeout: self.store_timeout,
            export_stats: self.export_stats,
            export_pools: self.export_pools,
            export_databases: self.export_databases,
            export_lists: self.export_lists,
            export_servers: self.export_servers,
            export_clients: self.export_clients,
            default_labels: self.default_labels.clone(),
        };
        config.validate()?;
        Ok(config)
    }
}

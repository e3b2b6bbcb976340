use std::path::PathBuf;

use clap::Parser;

/// A host/service monitoring control plane. Tails an external command
/// FIFO, applies typed commands to the monitored object graph, and drives
/// downtimes, flap detection and notifications through a worker pool.
#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about,
    long_about = "A host/service monitoring control plane.\n\
Tails an external command FIFO, parses each line against a typed command catalog,\n\
and drives the downtime, flap-detection and notification engines. Notification\n\
commands run on a pool of workers and their results are reaped asynchronously.\n\
\n\
EXAMPLES:\n\
  # Run against a pre-built object graph:\n\
  vigild --objects /etc/vigild/objects.json --command-file /var/lib/vigild/vigild.cmd\n\
\n\
  # Push a command into the running daemon:\n\
  printf '[%s] DISABLE_NOTIFICATIONS\\n' \"$(date +%s)\" > /var/lib/vigild/vigild.cmd\n\
\n\
  # Schedule one hour of fixed downtime for a host:\n\
  printf '[%s] SCHEDULE_HOST_DOWNTIME;srv1;%s;%s;1;0;3600;ops;maintenance\\n' \\\n\
      \"$(date +%s)\" \"$(date +%s)\" \"$(date -d '+1 hour' +%s)\" > /var/lib/vigild/vigild.cmd\n\
\n\
  # Inspect the command catalog:\n\
  vigild --list-commands\n\
\n\
See README for the full command reference and object file format."
)]
pub struct Args {
    /// Path of the external command FIFO to create and tail.
    #[arg(short = 'f', long, default_value = "/var/lib/vigild/vigild.cmd", value_name = "PATH")]
    pub command_file: PathBuf,

    /// JSON file describing the monitored object graph (hosts, services,
    /// contacts, groups, timeperiods).
    #[arg(short = 'o', long, value_name = "PATH")]
    pub objects: Option<PathBuf>,

    /// Number of worker threads executing notification commands.
    #[arg(long, default_value = "4", value_name = "N")]
    pub workers: usize,

    /// Seconds per scheduling "interval" unit (notification and check
    /// intervals are multiples of this).
    #[arg(long, default_value = "60", value_name = "SECONDS")]
    pub interval_length: u64,

    /// Seconds a notification command may run before it is killed.
    #[arg(long, default_value = "30", value_name = "SECONDS")]
    pub notification_timeout: u64,

    /// Default low flap threshold for hosts (percent state change).
    #[arg(long, default_value = "20.0", value_name = "PCT")]
    pub low_host_flap_threshold: f64,

    /// Default high flap threshold for hosts (percent state change).
    #[arg(long, default_value = "30.0", value_name = "PCT")]
    pub high_host_flap_threshold: f64,

    /// Default low flap threshold for services (percent state change).
    #[arg(long, default_value = "20.0", value_name = "PCT")]
    pub low_service_flap_threshold: f64,

    /// Default high flap threshold for services (percent state change).
    #[arg(long, default_value = "30.0", value_name = "PCT")]
    pub high_service_flap_threshold: f64,

    /// List every registered external command with its argument spec and
    /// exit.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub list_commands: bool,

    /// Don't log the EXTERNAL COMMAND line for each processed command.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub no_log_external_commands: bool,

    /// Don't log passive check results.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub no_log_passive_checks: bool,

    /// Don't log HOST/SERVICE NOTIFICATION lines.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub no_log_notifications: bool,

    /// Don't log NOTIFICATION SUPPRESSED reasons.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub no_suppression_reasons: bool,

    /// Tracing filter (overridden by RUST_LOG).
    #[arg(long, default_value = "vigild=info", value_name = "FILTER")]
    pub log_filter: String,

    /// OTLP endpoint for traces and metrics (e.g. http://localhost:4317).
    #[arg(long, value_name = "URL")]
    pub otel_endpoint: Option<String>,

    /// Include tracing targets in log output.
    #[arg(short = 'v', long, action = clap::ArgAction::SetTrue)]
    pub verbose: bool,
}

pub fn parse_args() -> Args {
    Args::parse()
}

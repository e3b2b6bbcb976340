use std::path::PathBuf;

/// Resolved runtime configuration, built from the CLI arguments and
/// shared with the worker threads.
#[derive(Clone, Debug)]
pub struct Config {
    pub command_file: PathBuf,
    pub objects_file: Option<PathBuf>,
    pub workers: usize,
    /// Seconds per scheduling interval unit.
    pub interval_length: i64,
    /// Per-job timeout for notification commands, in seconds.
    pub notification_timeout: i64,
    pub low_host_flap_threshold: f64,
    pub high_host_flap_threshold: f64,
    pub low_service_flap_threshold: f64,
    pub high_service_flap_threshold: f64,
    pub log_external_commands: bool,
    pub log_passive_checks: bool,
    pub log_notifications: bool,
    pub log_suppression_reasons: bool,
    pub verbose: bool,
    pub log_filter: String,
    pub otel_endpoint: Option<String>,
}

impl From<&crate::cli::Args> for Config {
    fn from(a: &crate::cli::Args) -> Self {
        Self {
            command_file: a.command_file.clone(),
            objects_file: a.objects.clone(),
            workers: a.workers,
            interval_length: a.interval_length as i64,
            notification_timeout: a.notification_timeout as i64,
            low_host_flap_threshold: a.low_host_flap_threshold,
            high_host_flap_threshold: a.high_host_flap_threshold,
            low_service_flap_threshold: a.low_service_flap_threshold,
            high_service_flap_threshold: a.high_service_flap_threshold,
            log_external_commands: !a.no_log_external_commands,
            log_passive_checks: !a.no_log_passive_checks,
            log_notifications: !a.no_log_notifications,
            log_suppression_reasons: !a.no_suppression_reasons,
            verbose: a.verbose,
            log_filter: a.log_filter.clone(),
            otel_endpoint: a.otel_endpoint.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            command_file: PathBuf::from("/var/lib/vigild/vigild.cmd"),
            objects_file: None,
            workers: 4,
            interval_length: 60,
            notification_timeout: 30,
            low_host_flap_threshold: 20.0,
            high_host_flap_threshold: 30.0,
            low_service_flap_threshold: 20.0,
            high_service_flap_threshold: 30.0,
            log_external_commands: true,
            log_passive_checks: true,
            log_notifications: true,
            log_suppression_reasons: true,
            verbose: false,
            log_filter: "vigild=info".to_string(),
            otel_endpoint: None,
        }
    }
}

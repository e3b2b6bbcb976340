// Main application entry point.
// Orchestrates command-line parsing, thread setup, the main event loop,
// signal handling, and final shutdown reporting.

use std::fs;
use std::io;
use std::process::exit;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, select, Receiver, Sender};
use signal_hook::consts::signal::*;
use signal_hook::iterator::Signals;
use tracing::{error, info, warn};

use vigild::cli;
use vigild::commandfile::CommandFileReader;
use vigild::config::Config;
use vigild::core::Core;
use vigild::objects::{ObjectConfig, ObjectStore};
use vigild::util::unix_now;
use vigild::workers::{WorkerPool, WorkerResult};
use vigild::{parse_mode, process_external_command};

/// Loads the monitored object graph, or an empty store when no file was
/// given (useful for catalog-only runs).
fn load_objects(config: &Config) -> io::Result<ObjectStore> {
    let Some(path) = &config.objects_file else {
        warn!("no object file given; starting with an empty object store");
        return Ok(ObjectStore::default());
    };
    let raw = fs::read_to_string(path)?;
    let parsed: ObjectConfig = serde_json::from_str(&raw)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
    ObjectStore::from_config(parsed)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
}

fn print_command_catalog(core: &Core) {
    println!("{:<48} {}", "COMMAND", "ARGUMENTS");
    println!("{}", "-".repeat(100));
    for desc in core.registry.iter() {
        println!("{:<48} {}", desc.name, desc.argspec());
    }
    println!("{}", "-".repeat(100));
    println!("{} commands registered", core.registry.len());
}

fn spawn_command_reader(
    config: &Config,
    tx: Sender<String>,
    running: Arc<AtomicBool>,
) -> io::Result<CommandFileReader> {
    CommandFileReader::spawn(config.command_file.clone(), tx, running)
}

fn main() -> io::Result<()> {
    let args = cli::parse_args();
    let config = Arc::new(Config::from(&args));

    let otel_meter = vigild::telemetry::init_tracing(&config);
    let command_counter = otel_meter.as_ref().map(|m| {
        m.u64_counter("external_commands.processed")
            .with_description("External commands accepted from the command file")
            .init()
    });

    let objects = match load_objects(&config) {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, "failed to load object configuration");
            exit(2);
        }
    };
    info!(
        hosts = objects.hosts.len(),
        services = objects.services.len(),
        contacts = objects.contacts.len(),
        "object store loaded"
    );

    let mut core = Core::new(Arc::clone(&config), objects, unix_now());

    // --- Catalog Listing Mode ---
    if args.list_commands {
        print_command_catalog(&core);
        return Ok(());
    }

    // --- Worker Pool ---
    let pool = WorkerPool::spawn(config.workers);
    core.jobs.connect(pool.request_sender());
    let results_rx: Receiver<Vec<u8>> = pool.results().clone();

    // --- Command-File Reader ---
    // Bounded so a runaway writer cannot balloon memory; the reader
    // blocks on the FIFO side instead.
    let (cmd_tx, cmd_rx) = bounded::<String>(1024);
    let reader_running = Arc::new(AtomicBool::new(true));
    let mut reader = match spawn_command_reader(&config, cmd_tx.clone(), Arc::clone(&reader_running))
    {
        Ok(r) => Some(r),
        Err(e) => {
            error!(error = %e, "failed to start command file reader");
            exit(2);
        }
    };

    // --- Signal Handling Thread ---
    let main_running = Arc::new(AtomicBool::new(true));
    let mut signals = Signals::new([SIGTERM, SIGINT, SIGQUIT])?;
    {
        let main_running = Arc::clone(&main_running);
        thread::spawn(move || {
            if let Some(sig) = signals.forever().next() {
                warn!(signal = sig, "received signal, shutting down");
                main_running.store(false, Ordering::SeqCst);
            }
        });
    }

    // --- Main Event Loop ---
    // Single writer: timer events, command lines and worker results all
    // funnel through this loop; handlers run to completion between waits.
    info!("entering main event loop");
    while main_running.load(Ordering::SeqCst) {
        core.now = unix_now();
        while let Some(action) = core.events.pop_due(core.now) {
            core.dispatch_event(action);
        }
        if core.program.sigshutdown {
            info!("shutdown requested by external command");
            break;
        }
        if core.program.sigrestart {
            info!("restart requested by external command, exiting for supervisor restart");
            break;
        }

        // the reader dying (fifo unlinked, fatal read error) warrants a
        // respawn, like any other worker
        if reader.as_ref().map(CommandFileReader::is_finished).unwrap_or(true) {
            warn!("command file reader seems to have died, respawning");
            if let Some(old) = reader.take() {
                old.shutdown();
            }
            reader_running.store(true, Ordering::SeqCst);
            match spawn_command_reader(&config, cmd_tx.clone(), Arc::clone(&reader_running)) {
                Ok(r) => reader = Some(r),
                Err(e) => {
                    error!(error = %e, "failed to respawn command file reader");
                    thread::sleep(Duration::from_secs(1));
                }
            }
        }

        let wait = match core.events.next_due() {
            Some(due) => Duration::from_millis(((due - core.now).clamp(0, 1) * 1000) as u64)
                .min(Duration::from_millis(250)),
            None => Duration::from_millis(250),
        };

        select! {
            recv(cmd_rx) -> msg => {
                if let Ok(line) = msg {
                    let _ = process_external_command(&mut core, &line, parse_mode::POSITIONAL);
                    if let Some(counter) = &command_counter {
                        counter.add(1, &[]);
                    }
                }
            }
            recv(results_rx) -> msg => {
                if let Ok(frame) = msg {
                    match WorkerResult::decode(&frame) {
                        Ok(result) => core.complete_job(&result),
                        Err(e) => warn!(error = %e, "dropping undecodable worker result frame"),
                    }
                }
            }
            default(wait) => {}
        }
    }

    // --- Shutdown ---
    let restart = core.program.sigrestart;
    reader_running.store(false, Ordering::SeqCst);
    drop(cmd_tx);
    if let Some(r) = reader.take() {
        r.shutdown();
    }
    pool.shutdown();

    info!(
        commands_processed = core.counters.commands_processed,
        commands_failed = core.counters.commands_failed,
        custom_commands = core.counters.custom_commands,
        notifications_sent = core.counters.notifications_sent,
        jobs_completed = core.counters.jobs_completed,
        pending_jobs = core.jobs.pending_count(),
        "vigild exiting"
    );

    if restart {
        // a supervisor (systemd, runit) turns this into a fresh start
        exit(1);
    }
    Ok(())
}

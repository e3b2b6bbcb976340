//! Worker RPC: notification and plugin commands run in a pool of worker
//! threads. Requests and responses cross the channel as KV-encoded byte
//! frames (the same codec used for every other worker exchange), and each
//! response is routed back to the callback registered for its job id,
//! exactly once.

use std::collections::HashMap;
use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::Core;
use crate::kvvec::KvVec;

/// Canonical frame separators between the core and its workers.
pub const KV_SEP: u8 = 0x00;
pub const PAIR_SEP: u8 = 0x01;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("worker channel is closed")]
    ChannelClosed,
    #[error("malformed worker frame: missing field '{0}'")]
    MissingField(&'static str),
    #[error("malformed worker frame: bad value for '{0}'")]
    BadField(&'static str),
}

/// A job request as it crosses the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerRequest {
    pub job_id: u64,
    pub command: String,
    /// Seconds the job may run before it is killed.
    pub timeout: i64,
}

impl WorkerRequest {
    pub fn encode(&self) -> Vec<u8> {
        let mut kvv = KvVec::new();
        kvv.push_u64("job_id", self.job_id);
        kvv.push_str("command", &self.command);
        kvv.push_i64("timeout", self.timeout);
        kvv.encode(KV_SEP, PAIR_SEP, 0)
    }

    pub fn decode(buf: &[u8]) -> Result<Self, WorkerError> {
        let kvv = KvVec::from_buf(buf, KV_SEP, PAIR_SEP);
        Ok(WorkerRequest {
            job_id: fetch_u64(&kvv, "job_id")?,
            command: fetch_str(&kvv, "command")?,
            timeout: fetch_i64(&kvv, "timeout")?,
        })
    }
}

/// A job result. `early_timeout` is set iff the job was killed for
/// exceeding its timeout (then `wait_status` is zero); `exited_ok` is
/// false when the job died from a signal, with the signal number in
/// `wait_status`. `error_code` is errno-domain (spawn failures).
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerResult {
    pub job_id: u64,
    pub command: String,
    pub wait_status: i32,
    pub early_timeout: bool,
    pub exited_ok: bool,
    pub error_code: i32,
    pub outstd: String,
    pub outerr: String,
    /// Wallclock runtime in seconds.
    pub runtime: f64,
}

impl WorkerResult {
    /// Exit code for a normally exited job (`wait_status` uses the
    /// classic `code << 8` encoding).
    pub fn exit_code(&self) -> i32 {
        (self.wait_status >> 8) & 0xff
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut kvv = KvVec::new();
        kvv.push_u64("job_id", self.job_id);
        kvv.push_str("command", &self.command);
        kvv.push_i64("wait_status", self.wait_status as i64);
        kvv.push_i64("early_timeout", self.early_timeout as i64);
        kvv.push_i64("exited_ok", self.exited_ok as i64);
        kvv.push_i64("error_code", self.error_code as i64);
        kvv.push_str("outstd", &self.outstd);
        kvv.push_str("outerr", &self.outerr);
        kvv.push_str("runtime", &format!("{:.6}", self.runtime));
        kvv.encode(KV_SEP, PAIR_SEP, 0)
    }

    pub fn decode(buf: &[u8]) -> Result<Self, WorkerError> {
        let kvv = KvVec::from_buf(buf, KV_SEP, PAIR_SEP);
        Ok(WorkerResult {
            job_id: fetch_u64(&kvv, "job_id")?,
            command: fetch_str(&kvv, "command")?,
            wait_status: fetch_i64(&kvv, "wait_status")? as i32,
            early_timeout: fetch_i64(&kvv, "early_timeout")? != 0,
            exited_ok: fetch_i64(&kvv, "exited_ok")? != 0,
            error_code: fetch_i64(&kvv, "error_code")? as i32,
            outstd: fetch_str(&kvv, "outstd")?,
            outerr: fetch_str(&kvv, "outerr")?,
            runtime: kvv
                .fetch_str("runtime")
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.0),
        })
    }
}

fn fetch_str(kvv: &KvVec, key: &'static str) -> Result<String, WorkerError> {
    kvv.fetch_str(key)
        .map(str::to_string)
        .ok_or(WorkerError::MissingField(key))
}

fn fetch_u64(kvv: &KvVec, key: &'static str) -> Result<u64, WorkerError> {
    kvv.fetch_str(key)
        .ok_or(WorkerError::MissingField(key))?
        .parse()
        .map_err(|_| WorkerError::BadField(key))
}

fn fetch_i64(kvv: &KvVec, key: &'static str) -> Result<i64, WorkerError> {
    kvv.fetch_str(key)
        .ok_or(WorkerError::MissingField(key))?
        .parse()
        .map_err(|_| WorkerError::BadField(key))
}

// --- job execution ------------------------------------------------------

/// Runs one job to completion, enforcing its timeout. Used by the pool
/// threads; exposed so tests can exercise the contract directly.
pub fn run_job(req: &WorkerRequest) -> WorkerResult {
    let started = Instant::now();
    let mut result = WorkerResult {
        job_id: req.job_id,
        command: req.command.clone(),
        wait_status: 0,
        early_timeout: false,
        exited_ok: false,
        error_code: 0,
        outstd: String::new(),
        outerr: String::new(),
        runtime: 0.0,
    };

    let mut child = match Command::new("/bin/sh")
        .arg("-c")
        .arg(&req.command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(c) => c,
        Err(e) => {
            result.error_code = e.raw_os_error().unwrap_or(-1);
            result.outerr = e.to_string();
            result.runtime = started.elapsed().as_secs_f64();
            return result;
        }
    };

    let deadline = if req.timeout > 0 {
        Some(started + Duration::from_secs(req.timeout as u64))
    } else {
        None
    };
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) => {
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    let _ = child.kill();
                    result.early_timeout = true;
                    break child.wait().ok();
                }
                thread::sleep(Duration::from_millis(25));
            }
            Err(e) => {
                result.error_code = e.raw_os_error().unwrap_or(-1);
                break None;
            }
        }
    };

    if let Some(mut out) = child.stdout.take() {
        let _ = out.read_to_string(&mut result.outstd);
    }
    if let Some(mut err) = child.stderr.take() {
        let _ = err.read_to_string(&mut result.outerr);
    }

    if let Some(status) = status {
        if result.early_timeout {
            // timeouts report wait_status zero, distinct from exits
            result.wait_status = 0;
        } else if let Some(code) = status.code() {
            result.exited_ok = true;
            result.wait_status = code << 8;
        } else {
            // killed by a signal
            #[cfg(unix)]
            {
                use std::os::unix::process::ExitStatusExt;
                result.wait_status = status.signal().unwrap_or(0);
            }
        }
    }
    result.runtime = started.elapsed().as_secs_f64();
    result
}

// --- the pool -----------------------------------------------------------

/// Worker thread pool. Frames go out on `req_tx`, results come back on
/// the receiver the main loop polls.
pub struct WorkerPool {
    req_tx: Sender<Vec<u8>>,
    res_rx: Receiver<Vec<u8>>,
    running: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `count` worker threads.
    pub fn spawn(count: usize) -> Self {
        let (req_tx, req_rx) = bounded::<Vec<u8>>(256);
        let (res_tx, res_rx) = bounded::<Vec<u8>>(256);
        let running = Arc::new(AtomicBool::new(true));
        let mut threads = Vec::with_capacity(count);
        for n in 0..count.max(1) {
            let rx = req_rx.clone();
            let tx = res_tx.clone();
            let flag = Arc::clone(&running);
            match thread::Builder::new()
                .name(format!("worker-{n}"))
                .spawn(move || worker_main(rx, tx, flag))
            {
                Ok(handle) => threads.push(handle),
                Err(e) => warn!(worker = n, error = %e, "failed to spawn worker thread"),
            }
        }
        WorkerPool {
            req_tx,
            res_rx,
            running,
            threads,
        }
    }

    pub fn request_sender(&self) -> Sender<Vec<u8>> {
        self.req_tx.clone()
    }

    pub fn results(&self) -> &Receiver<Vec<u8>> {
        &self.res_rx
    }

    /// Stops the pool and joins every worker.
    pub fn shutdown(self) {
        self.running.store(false, Ordering::SeqCst);
        drop(self.req_tx);
        for t in self.threads {
            let _ = t.join();
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads.len())
            .finish()
    }
}

fn worker_main(rx: Receiver<Vec<u8>>, tx: Sender<Vec<u8>>, running: Arc<AtomicBool>) {
    while running.load(Ordering::SeqCst) {
        let frame = match rx.recv_timeout(Duration::from_millis(250)) {
            Ok(f) => f,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        };
        let req = match WorkerRequest::decode(&frame) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "dropping undecodable worker request frame");
                continue;
            }
        };
        debug!(job_id = req.job_id, command = %req.command, "worker picked up job");
        let result = run_job(&req);
        if tx.send(result.encode()).is_err() {
            break;
        }
    }
}

// --- job table on the core ---------------------------------------------

/// Completion callback invoked with the core once the job's result frame
/// comes back.
pub type JobCallback = Box<dyn FnOnce(&mut Core, &WorkerResult)>;

struct PendingJob {
    command: String,
    callback: JobCallback,
}

/// Pending jobs awaiting their results, keyed by job id.
#[derive(Default)]
pub struct JobTable {
    next_id: u64,
    pending: HashMap<u64, PendingJob>,
    tx: Option<Sender<Vec<u8>>>,
}

impl JobTable {
    #[must_use]
    pub fn new() -> Self {
        JobTable::default()
    }

    /// Connects the table to a pool's request channel.
    pub fn connect(&mut self, tx: Sender<Vec<u8>>) {
        self.tx = Some(tx);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl std::fmt::Debug for JobTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobTable")
            .field("pending", &self.pending.len())
            .field("connected", &self.tx.is_some())
            .finish()
    }
}

impl Core {
    /// Submits a command to the worker pool and registers its callback.
    /// The callback fires exactly once, when the result frame is reaped.
    pub fn submit_job(
        &mut self,
        command: &str,
        timeout: i64,
        callback: JobCallback,
    ) -> Result<u64, WorkerError> {
        self.jobs.next_id += 1;
        let job_id = self.jobs.next_id;
        let req = WorkerRequest {
            job_id,
            command: command.to_string(),
            timeout,
        };
        if let Some(tx) = &self.jobs.tx {
            tx.send(req.encode())
                .map_err(|_| WorkerError::ChannelClosed)?;
        } else {
            // no pool attached (tests); the job stays pending
            debug!(job_id, command, "no worker pool attached, job not executed");
        }
        self.jobs.pending.insert(
            job_id,
            PendingJob {
                command: command.to_string(),
                callback,
            },
        );
        Ok(job_id)
    }

    /// Routes a reaped result to its callback.
    pub fn complete_job(&mut self, result: &WorkerResult) {
        match self.jobs.pending.remove(&result.job_id) {
            Some(job) => {
                self.counters.jobs_completed += 1;
                debug!(job_id = result.job_id, command = %job.command, "job completed");
                (job.callback)(self, result);
            }
            None => {
                warn!(job_id = result.job_id, "result for unknown job id dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_frames_roundtrip() {
        let req = WorkerRequest {
            job_id: 42,
            command: "/bin/sh -c 'echo hi'".to_string(),
            timeout: 30,
        };
        let back = WorkerRequest::decode(&req.encode()).unwrap();
        assert_eq!(back, req);
    }

    #[test]
    fn result_frames_roundtrip() {
        let res = WorkerResult {
            job_id: 7,
            command: "true".to_string(),
            wait_status: 2 << 8,
            early_timeout: false,
            exited_ok: true,
            error_code: 0,
            outstd: "out".to_string(),
            outerr: "err".to_string(),
            runtime: 0.25,
        };
        let back = WorkerResult::decode(&res.encode()).unwrap();
        assert_eq!(back.exit_code(), 2);
        assert_eq!(back, res);
    }

    #[test]
    fn job_runs_and_captures_output() {
        let res = run_job(&WorkerRequest {
            job_id: 1,
            command: "echo hello world; echo oops >&2".to_string(),
            timeout: 5,
        });
        assert!(res.exited_ok);
        assert!(!res.early_timeout);
        assert_eq!(res.wait_status, 0);
        assert_eq!(res.outstd, "hello world\n");
        assert_eq!(res.outerr, "oops\n");
    }

    #[test]
    fn nonzero_exit_is_reported() {
        let res = run_job(&WorkerRequest {
            job_id: 2,
            command: "exit 3".to_string(),
            timeout: 5,
        });
        assert!(res.exited_ok);
        assert_eq!(res.exit_code(), 3);
    }

    #[test]
    fn timeout_kills_and_flags() {
        let res = run_job(&WorkerRequest {
            job_id: 3,
            command: "sleep 10".to_string(),
            timeout: 1,
        });
        assert!(res.early_timeout);
        assert_eq!(res.wait_status, 0);
    }
}

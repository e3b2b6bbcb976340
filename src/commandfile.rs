//! Command-file intake: a dedicated thread owning the external command
//! FIFO, framing complete lines and forwarding them into a bounded
//! channel the main loop consumes.

use std::ffi::CString;
use std::io::{self, ErrorKind};
use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use tracing::{debug, error, warn};

/// Poll timeout, so the reader notices shutdown promptly.
const POLL_TIMEOUT_MS: i32 = 500;

/// Opens (creating if necessary) the command FIFO.
///
/// The path must refer to a FIFO; anything else is replaced by a fresh
/// one with mode `rw-rw----`. The fd is opened read-write and
/// non-blocking: read-write keeps poll() usable even when no writer is
/// connected.
pub fn open_command_file(path: &Path) -> io::Result<RawFd> {
    let cpath = CString::new(path.as_os_str().as_encoded_bytes()).map_err(|_| {
        io::Error::new(ErrorKind::InvalidInput, "command file path contains NUL")
    })?;

    // SAFETY: cpath is a valid NUL-terminated string for the stat call;
    // the struct is zero-initialized and only read on success.
    let mut st: libc::stat = unsafe { std::mem::zeroed() };
    let have_fifo = unsafe { libc::stat(cpath.as_ptr(), &mut st) } == 0
        && (st.st_mode & libc::S_IFMT) == libc::S_IFIFO;

    if !have_fifo {
        // SAFETY: mkfifo only reads the path and mode we pass.
        let res = unsafe { libc::mkfifo(cpath.as_ptr(), 0o660) };
        if res != 0 {
            let err = io::Error::last_os_error();
            error!(
                path = %path.display(),
                "could not create external command file as named pipe: {err}. If this file \
                 already exists and no other copy of the daemon is running, delete it."
            );
            return Err(err);
        }
    }

    // SAFETY: open with a valid path; the returned fd is checked below.
    let fd = unsafe { libc::open(cpath.as_ptr(), libc::O_RDWR | libc::O_NONBLOCK) };
    if fd < 0 {
        let err = io::Error::last_os_error();
        error!(path = %path.display(), "could not open external command file: {err}");
        return Err(err);
    }
    Ok(fd)
}

fn close_fd(fd: RawFd) {
    // SAFETY: fd came from open() and is closed exactly once.
    unsafe {
        libc::close(fd);
    }
}

/// Handle to the running intake thread.
pub struct CommandFileReader {
    handle: JoinHandle<()>,
    running: Arc<AtomicBool>,
}

impl CommandFileReader {
    /// Spawns the reader thread. Lines (without their newline) are sent
    /// over `tx`; dropping the receiving side stops the thread at its
    /// next poll tick.
    pub fn spawn(
        path: PathBuf,
        tx: Sender<String>,
        running: Arc<AtomicBool>,
    ) -> io::Result<CommandFileReader> {
        let fd = open_command_file(&path)?;
        let flag = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name("commandfile".to_string())
            .spawn(move || {
                reader_loop(fd, &tx, &flag);
                close_fd(fd);
                debug!("command file reader exiting");
            })?;
        Ok(CommandFileReader { handle, running })
    }

    /// Stops the thread and waits for it.
    pub fn shutdown(self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.handle.join();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

fn reader_loop(fd: RawFd, tx: &Sender<String>, running: &AtomicBool) {
    let mut pending: Vec<u8> = Vec::with_capacity(4096);
    let mut buf = [0u8; 4096];

    while running.load(Ordering::SeqCst) {
        let mut pfd = libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        };
        // SAFETY: pfd points at one valid pollfd for the duration of the
        // call.
        let pollval = unsafe { libc::poll(&mut pfd, 1, POLL_TIMEOUT_MS) };
        if pollval == 0 {
            continue;
        }
        if pollval < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == ErrorKind::Interrupted {
                continue;
            }
            error!("command file reader failed to poll: {err}");
            return;
        }

        // SAFETY: buf is a valid writable region of the given length.
        let n = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        if n < 0 {
            let err = io::Error::last_os_error();
            match err.kind() {
                ErrorKind::Interrupted | ErrorKind::WouldBlock => continue,
                _ => {
                    error!("command file reader failed to read: {err}");
                    return;
                }
            }
        }
        if n == 0 {
            // no writer connected right now; O_RDWR keeps the fifo alive
            continue;
        }
        pending.extend_from_slice(&buf[..n as usize]);

        // forward every complete line
        while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..line.len() - 1])
                .trim_end_matches('\r')
                .to_string();
            if text.is_empty() {
                continue;
            }
            if tx.send(text).is_err() {
                warn!("command channel closed, stopping command file reader");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_and_opens_a_fifo() {
        let dir = std::env::temp_dir().join(format!("vigild-fifo-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cmd.fifo");
        let fd = open_command_file(&path).expect("fifo should open");
        assert!(fd >= 0);
        close_fd(fd);
        // reopening an existing fifo also works
        let fd2 = open_command_file(&path).expect("existing fifo should reopen");
        close_fd(fd2);
        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_dir(&dir);
    }
}

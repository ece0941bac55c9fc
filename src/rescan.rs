// rescan.rs - Service registry refresh after configuration changes

use crate::error::{ElevateError, Result};
use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub const DEFAULT_RESCAN_PROGRAM: &str = "ls-control";
pub const DEFAULT_RESCAN_TIMEOUT: Duration = Duration::from_secs(10);
const SBIN_DIR: &str = "/usr/sbin";
const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RescanOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Asks the service bus to re-read its configuration.
pub trait Rescanner {
    /// Run the refresh and wait for it, giving up after `timeout`.
    fn rescan(&self, timeout: Duration) -> Result<RescanOutput>;
}

/// Refresh through an external command, `ls-control scan-services` by default.
#[derive(Debug, Clone)]
pub struct CommandRescanner {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandRescanner {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        CommandRescanner {
            program: program.into(),
            args,
        }
    }

    pub fn ls_control(program: impl Into<PathBuf>) -> Self {
        CommandRescanner::new(program, vec!["scan-services".to_string()])
    }

    fn describe(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// `PATH` with `/usr/sbin` in front, where `ls-control` lives on the device.
fn search_path(prefix: &Path) -> OsString {
    let mut dirs = vec![prefix.to_path_buf()];
    if let Some(existing) = std::env::var_os("PATH") {
        dirs.extend(std::env::split_paths(&existing));
    }
    std::env::join_paths(dirs).unwrap_or_else(|_| prefix.as_os_str().to_owned())
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Read `reader` to EOF on a helper thread and send the text back.
fn drain<R>(mut reader: R, stream: Stream, tx: Sender<(Stream, String)>)
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        let _ = tx.send((stream, String::from_utf8_lossy(&buf).into_owned()));
    });
}

impl Rescanner for CommandRescanner {
    fn rescan(&self, timeout: Duration) -> Result<RescanOutput> {
        let command = self.describe();
        debug!("running {} (timeout {:?})", command, timeout);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env("PATH", search_path(Path::new(SBIN_DIR)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ElevateError::RescanSpawn {
                command: command.clone(),
                source,
            })?;

        // Drain both pipes while polling.
        let (tx, rx) = mpsc::channel();
        if let Some(out) = child.stdout.take() {
            drain(out, Stream::Stdout, tx.clone());
        }
        if let Some(err) = child.stderr.take() {
            drain(err, Stream::Stderr, tx.clone());
        }
        drop(tx);

        let deadline = Instant::now() + timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(source) => {
                    return Err(ElevateError::RescanSpawn { command, source });
                }
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ElevateError::RescanTimedOut { command, timeout });
            }
            thread::sleep(POLL_INTERVAL);
        };

        // A grandchild may still hold the pipes open after the child exits;
        // the deadline bounds the wait for EOF as well.
        let mut output = RescanOutput::default();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok((Stream::Stdout, text)) => output.stdout = text,
                Ok((Stream::Stderr, text)) => output.stderr = text,
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    return Err(ElevateError::RescanTimedOut { command, timeout });
                }
            }
        }

        if !status.success() {
            debug!("{} stdout: {}", command, output.stdout.trim_end());
            debug!("{} stderr: {}", command, output.stderr.trim_end());
            return Err(ElevateError::RescanFailed {
                command,
                status: status.to_string(),
            });
        }
        Ok(output)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RescanOutcome {
    /// Nothing changed; the refresh was not run.
    Skipped,
    Completed(RescanOutput),
}

/// Run the refresh only if the reconciliation pass changed something.
pub fn trigger_rescan(
    rescanner: &dyn Rescanner,
    changed: bool,
    timeout: Duration,
) -> Result<RescanOutcome> {
    if !changed {
        info!("No changes, no rescan needed");
        return Ok(RescanOutcome::Skipped);
    }

    info!("Refreshing services...");
    let output = rescanner.rescan(timeout)?;
    for text in [&output.stdout, &output.stderr] {
        let text = text.trim_end();
        if !text.is_empty() {
            info!("{}", text);
        }
    }
    Ok(RescanOutcome::Completed(output))
}

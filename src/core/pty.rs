//! Pseudo-terminal backend
//!
//! This module provides the real [`Spawner`] used outside of tests: one
//! portable-pty master/child pair per session, plus a reader thread that
//! forwards the child's output to the registry.

use std::io::{self, Read, Write};
use std::thread;

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::process::{EventSink, Process, SpawnRequest, Spawner};

#[derive(Error, Debug)]
pub enum PtyError {
    #[error("Failed to open pseudo terminal: {0}")]
    Open(String),

    #[error("Failed to spawn process: {0}")]
    ProcessSpawn(String),

    #[error("Failed to resize pseudo terminal: {0}")]
    Resize(String),

    #[error("Failed to write to PTY: {0}")]
    Write(#[source] io::Error),

    #[error("Failed to kill process: {0}")]
    Kill(#[source] io::Error),

    #[error("Failed to start reader thread: {0}")]
    ReaderThread(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, PtyError>;

/// Size of one read from the PTY master
const READ_CHUNK: usize = 4096;

/// A shell running on a pseudo terminal.
pub struct PtyProcess {
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    child: Box<dyn Child + Send + Sync>,
    pid: Option<u32>,
}

impl PtyProcess {
    /// Open a PTY, spawn the shell on it and start forwarding output to `sink`.
    pub fn spawn(request: &SpawnRequest, sink: EventSink) -> Result<Self> {
        let pair = native_pty_system()
            .openpty(pty_size(request.cols, request.rows))
            .map_err(|e| PtyError::Open(e.to_string()))?;

        let cmd = shell_command(request);
        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::ProcessSpawn(e.to_string()))?;
        // The child holds its own copy; keeping ours would hide EOF on exit.
        drop(pair.slave);

        let pid = child.process_id();
        info!(session = %request.id, pid = ?pid, cwd = %request.cwd.display(), "PTY process started");

        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::Open(e.to_string()))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::Open(e.to_string()))?;

        let id = request.id;
        thread::Builder::new()
            .name(format!("pty-reader-{}", id))
            .spawn(move || {
                let mut buffer = vec![0u8; READ_CHUNK];
                loop {
                    match reader.read(&mut buffer) {
                        Ok(0) => {
                            debug!(session = %id, "PTY EOF");
                            break;
                        }
                        Ok(n) => {
                            if !sink.output(buffer[..n].to_vec()) {
                                // Registry dropped, nobody to report to
                                return;
                            }
                        }
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => {
                            // EIO is how Linux reports a hung-up slave
                            debug!(session = %id, error = %e, "PTY read ended");
                            break;
                        }
                    }
                }
                sink.exited();
            })
            .map_err(PtyError::ReaderThread)?;

        Ok(Self {
            master: pair.master,
            writer,
            child,
            pid,
        })
    }
}

impl Process for PtyProcess {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data).map_err(PtyError::Write)?;
        self.writer.flush().map_err(PtyError::Write)
    }

    fn resize(&mut self, cols: u16, rows: u16) -> Result<()> {
        self.master
            .resize(pty_size(cols, rows))
            .map_err(|e| PtyError::Resize(e.to_string()))
    }

    fn kill(&mut self) -> Result<()> {
        self.child.kill().map_err(PtyError::Kill)
    }

    fn try_wait(&mut self) -> Option<u32> {
        match self.child.try_wait() {
            Ok(Some(status)) => Some(status.exit_code()),
            Ok(None) => None,
            Err(e) => {
                warn!(pid = ?self.pid, error = %e, "try_wait failed");
                None
            }
        }
    }
}

/// Spawns login shells on native pseudo terminals.
#[derive(Debug, Default, Clone, Copy)]
pub struct PtySpawner;

impl Spawner for PtySpawner {
    fn spawn(&mut self, request: &SpawnRequest, sink: EventSink) -> Result<Box<dyn Process>> {
        Ok(Box::new(PtyProcess::spawn(request, sink)?))
    }
}

fn pty_size(cols: u16, rows: u16) -> PtySize {
    PtySize {
        rows,
        cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

/// Build the command line for an interactive login shell.
fn shell_command(request: &SpawnRequest) -> CommandBuilder {
    let shell = request.shell.clone().unwrap_or_else(default_shell);

    let mut cmd = CommandBuilder::new(&shell);
    #[cfg(unix)]
    {
        if request.shell.is_none() {
            cmd.arg("-l");
        }
    }
    cmd.cwd(&request.cwd);

    // Inherit the full host environment
    for (key, value) in std::env::vars_os() {
        cmd.env(key, value);
    }
    cmd.env("TERM", "xterm-256color");
    cmd.env("COLORTERM", "truecolor");
    cmd.env("PANEMUX", "1");
    cmd
}

/// The user's login shell.
#[cfg(unix)]
pub fn default_shell() -> String {
    std::env::var("SHELL")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "/bin/sh".to_string())
}

/// The user's command interpreter.
#[cfg(windows)]
pub fn default_shell() -> String {
    std::env::var("COMSPEC").unwrap_or_else(|_| "cmd.exe".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::process::ProcessEvent;
    use crate::core::session::SessionId;
    use std::path::PathBuf;
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    #[test]
    #[cfg(unix)]
    fn test_default_shell_is_absolute_or_name() {
        assert!(!default_shell().is_empty());
    }

    #[test]
    #[cfg(unix)]
    fn test_shell_echo_and_exit() {
        let (tx, rx) = mpsc::channel();
        let id = SessionId(7);
        let request = SpawnRequest {
            id,
            shell: Some("/bin/sh".to_string()),
            cwd: PathBuf::from("/"),
            cols: 80,
            rows: 24,
        };
        let mut process = PtyProcess::spawn(&request, EventSink::new(id, tx)).unwrap();
        process.resize(100, 40).unwrap();
        process.write(b"echo PANEMUX_PTY_OK; exit 0\n").unwrap();

        let mut output = Vec::new();
        let mut exited = false;
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(ProcessEvent::Output { id: got, data }) => {
                    assert_eq!(got, id);
                    output.extend_from_slice(&data);
                }
                Ok(ProcessEvent::Exited { id: got }) => {
                    assert_eq!(got, id);
                    exited = true;
                    break;
                }
                Err(_) => {}
            }
        }

        let text = String::from_utf8_lossy(&output);
        assert!(text.contains("PANEMUX_PTY_OK"), "unexpected output: {text}");
        assert!(exited, "shell should have exited");
    }
}

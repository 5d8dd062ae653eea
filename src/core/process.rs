//! Process seam between the session registry and the OS.
//!
//! The registry never talks to a PTY directly. It asks a [`Spawner`] for a
//! [`Process`] and receives the process's output and exit through the
//! [`EventSink`] handed over at spawn time.

use std::path::PathBuf;
use std::sync::mpsc::Sender;

use super::pty::PtyError;
use super::session::SessionId;

/// Event produced by a running process, tagged with its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// A chunk of output, in the order the process produced it
    Output { id: SessionId, data: Vec<u8> },
    /// The process output stream ended; no further events follow for `id`
    Exited { id: SessionId },
}

/// Sending half of the registry's event queue, bound to one session.
///
/// Sinks are cheap to clone and may be moved to reader threads. Sends after
/// the registry is gone are dropped.
#[derive(Clone)]
pub struct EventSink {
    id: SessionId,
    tx: Sender<ProcessEvent>,
}

impl EventSink {
    pub(crate) fn new(id: SessionId, tx: Sender<ProcessEvent>) -> Self {
        Self { id, tx }
    }

    /// Publish output. Returns false once nobody is listening anymore.
    pub fn output(&self, data: Vec<u8>) -> bool {
        self.tx
            .send(ProcessEvent::Output { id: self.id, data })
            .is_ok()
    }

    /// Publish the end of the process.
    pub fn exited(&self) {
        let _ = self.tx.send(ProcessEvent::Exited { id: self.id });
    }
}

/// What to spawn for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnRequest {
    pub id: SessionId,
    /// Shell override; `None` means the user's login shell
    pub shell: Option<String>,
    pub cwd: PathBuf,
    pub cols: u16,
    pub rows: u16,
}

/// A live interactive process owned by the registry.
pub trait Process: Send {
    fn pid(&self) -> Option<u32>;

    fn write(&mut self, data: &[u8]) -> Result<(), PtyError>;

    fn resize(&mut self, cols: u16, rows: u16) -> Result<(), PtyError>;

    /// Request termination. Completion is reported through the sink.
    fn kill(&mut self) -> Result<(), PtyError>;

    /// Exit code, if the process has already terminated.
    fn try_wait(&mut self) -> Option<u32>;
}

/// Factory for processes.
pub trait Spawner: Send {
    fn spawn(&mut self, request: &SpawnRequest, sink: EventSink)
        -> Result<Box<dyn Process>, PtyError>;
}

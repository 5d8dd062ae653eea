//! Session registry
//!
//! Owns one interactive process per session id. Everything else in the crate
//! refers to sessions by [`SessionId`] only; process handles never leave this
//! module.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::cwd;
use super::process::{EventSink, Process, ProcessEvent, SpawnRequest, Spawner};
use crate::error::{MuxError, Result};

/// Opaque session identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Lifecycle of a session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    /// Process spawned, no output seen yet
    Created,
    /// Process has produced output
    Running,
    /// Termination requested, waiting for the exit notification
    Exiting,
    /// Gone; the id is retired
    Closed,
}

/// Why a session ended without being asked to
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExitReason {
    /// The process terminated on its own
    Exited { code: Option<u32> },
    /// The process could not be started at all
    SpawnFailed(String),
}

/// Notifications published by the registry
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistryEvent {
    Output { id: SessionId, data: Vec<u8> },
    UnexpectedExit { id: SessionId, reason: ExitReason },
}

/// Snapshot of a session's bookkeeping
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionInfo {
    pub id: SessionId,
    pub pid: Option<u32>,
    pub cwd: PathBuf,
    pub cols: u16,
    pub rows: u16,
    pub state: LifecycleState,
}

/// A live or exiting session
pub struct Session {
    id: SessionId,
    process: Box<dyn Process>,
    /// Last known working directory
    cwd: PathBuf,
    cols: u16,
    rows: u16,
    state: LifecycleState,
}

impl Session {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn size(&self) -> (u16, u16) {
        (self.cols, self.rows)
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id,
            pid: self.process.pid(),
            cwd: self.cwd.clone(),
            cols: self.cols,
            rows: self.rows,
            state: self.state,
        }
    }
}

/// Defaults applied to every new session
#[derive(Clone, Debug)]
pub struct RegistryOptions {
    /// Shell override; `None` spawns the login shell
    pub shell: Option<String>,
    pub cols: u16,
    pub rows: u16,
    pub probe_timeout: Duration,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            shell: None,
            cols: 80,
            rows: 30,
            probe_timeout: Duration::from_millis(500),
        }
    }
}

/// Table of live sessions
pub struct SessionRegistry {
    spawner: Box<dyn Spawner>,
    options: RegistryOptions,
    /// Live sessions; the only ones that accept write/resize
    sessions: HashMap<SessionId, Session>,
    /// Sessions whose close was requested, parked until their exit arrives
    closing: HashMap<SessionId, Session>,
    /// Ids whose termination was user-initiated
    pending_close: HashSet<SessionId>,
    /// Ids that reached Closed and may not be reused
    retired: HashSet<SessionId>,
    /// Notifications produced on the control thread itself
    notices: VecDeque<RegistryEvent>,
    events_tx: Sender<ProcessEvent>,
    events_rx: Receiver<ProcessEvent>,
}

impl SessionRegistry {
    pub fn new(spawner: Box<dyn Spawner>, options: RegistryOptions) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            spawner,
            options,
            sessions: HashMap::new(),
            closing: HashMap::new(),
            pending_close: HashSet::new(),
            retired: HashSet::new(),
            notices: VecDeque::new(),
            events_tx,
            events_rx,
        }
    }

    /// Create a session, or return the existing one if `id` is already live.
    pub fn create(&mut self, id: SessionId, cwd: Option<PathBuf>) -> Result<SessionInfo> {
        if let Some(session) = self.sessions.get(&id) {
            debug!(session = %id, "create on live session, reusing");
            return Ok(session.info());
        }
        if self.retired.contains(&id) || self.closing.contains_key(&id) {
            return Err(MuxError::SessionRetired(id));
        }

        let request = SpawnRequest {
            id,
            shell: self.options.shell.clone(),
            cwd: cwd.unwrap_or_else(cwd::home_dir),
            cols: self.options.cols,
            rows: self.options.rows,
        };
        let sink = EventSink::new(id, self.events_tx.clone());

        let process = match self.spawner.spawn(&request, sink) {
            Ok(process) => process,
            Err(e) => {
                warn!(session = %id, error = %e, "failed to spawn session");
                self.retired.insert(id);
                let reason = e.to_string();
                self.notices.push_back(RegistryEvent::UnexpectedExit {
                    id,
                    reason: ExitReason::SpawnFailed(reason.clone()),
                });
                return Err(MuxError::Spawn { id, reason });
            }
        };

        info!(session = %id, cwd = %request.cwd.display(), "session created");
        let session = Session {
            id,
            process,
            cwd: request.cwd,
            cols: request.cols,
            rows: request.rows,
            state: LifecycleState::Created,
        };
        let info = session.info();
        self.sessions.insert(id, session);
        Ok(info)
    }

    /// Forward input to a live session. Silently dropped otherwise.
    pub fn write(&mut self, id: SessionId, data: &[u8]) {
        let Some(session) = self.sessions.get_mut(&id) else {
            debug!(session = %id, len = data.len(), "write to non-live session dropped");
            return;
        };
        if let Err(e) = session.process.write(data) {
            warn!(session = %id, error = %e, "write failed");
        }
    }

    /// Resize a live session's terminal. Zero dimensions are ignored.
    pub fn resize(&mut self, id: SessionId, cols: u16, rows: u16) {
        if cols == 0 || rows == 0 {
            let err = MuxError::InvalidGeometry { cols, rows };
            debug!(session = %id, error = %err, "resize dropped");
            return;
        }
        let Some(session) = self.sessions.get_mut(&id) else {
            debug!(session = %id, "resize of non-live session dropped");
            return;
        };
        match session.process.resize(cols, rows) {
            Ok(()) => {
                session.cols = cols;
                session.rows = rows;
            }
            Err(e) => warn!(session = %id, error = %e, "resize failed"),
        }
    }

    /// Request termination. The session stops accepting input immediately.
    pub fn close(&mut self, id: SessionId) -> Result<()> {
        let mut session = self
            .sessions
            .remove(&id)
            .ok_or(MuxError::SessionNotFound(id))?;

        self.pending_close.insert(id);
        session.state = LifecycleState::Exiting;
        if let Err(e) = session.process.kill() {
            // Usually the process is already gone; its exit is still pending
            warn!(session = %id, error = %e, "kill failed");
        }
        info!(session = %id, "session close requested");
        self.closing.insert(id, session);
        Ok(())
    }

    /// Best-effort current directory of a session, home directory on failure.
    pub fn working_directory(&mut self, id: SessionId) -> PathBuf {
        let timeout = self.options.probe_timeout;
        let Some(session) = self.sessions.get_mut(&id) else {
            debug!(session = %id, "cwd probe on non-live session");
            return cwd::home_dir();
        };
        let Some(pid) = session.process.pid() else {
            debug!(session = %id, "cwd probe without pid");
            return cwd::home_dir();
        };
        match cwd::probe(pid, timeout) {
            Ok(dir) => {
                session.cwd = dir.clone();
                dir
            }
            Err(e) => {
                debug!(session = %id, error = %e, "cwd probe failed, using home");
                cwd::home_dir()
            }
        }
    }

    /// Drain pending process events. Must be called from the control thread.
    pub fn poll_events(&mut self) -> Vec<RegistryEvent> {
        let mut events: Vec<RegistryEvent> = self.notices.drain(..).collect();

        loop {
            match self.events_rx.try_recv() {
                Ok(ProcessEvent::Output { id, data }) => {
                    let Some(session) = self.sessions.get_mut(&id) else {
                        // Closing or already gone
                        continue;
                    };
                    if session.state == LifecycleState::Created {
                        session.state = LifecycleState::Running;
                    }
                    events.push(RegistryEvent::Output { id, data });
                }
                Ok(ProcessEvent::Exited { id }) => {
                    if let Some(event) = self.handle_exit(id) {
                        events.push(event);
                    }
                }
                // The registry holds a sender, so the queue never disconnects
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        events
    }

    fn handle_exit(&mut self, id: SessionId) -> Option<RegistryEvent> {
        // Check-and-clear in one step: the classification happens here, on the
        // control thread, never where the close was issued.
        if self.pending_close.remove(&id) {
            if let Some(mut session) = self.closing.remove(&id) {
                let code = session.process.try_wait();
                session.state = LifecycleState::Closed;
                debug!(session = %id, code = ?code, "requested close completed");
            }
            self.retired.insert(id);
            return None;
        }

        let Some(mut session) = self.sessions.remove(&id) else {
            debug!(session = %id, "exit for unknown session ignored");
            return None;
        };
        let code = session.process.try_wait();
        session.state = LifecycleState::Closed;
        self.retired.insert(id);
        info!(session = %id, code = ?code, "session exited unexpectedly");
        Some(RegistryEvent::UnexpectedExit {
            id,
            reason: ExitReason::Exited { code },
        })
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn is_live(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    pub fn is_pending_close(&self, id: SessionId) -> bool {
        self.pending_close.contains(&id)
    }

    pub fn live_count(&self) -> usize {
        self.sessions.len()
    }
}

impl Drop for SessionRegistry {
    fn drop(&mut self) {
        for (id, session) in self.sessions.iter_mut().chain(self.closing.iter_mut()) {
            if let Err(e) = session.process.kill() {
                debug!(session = %id, error = %e, "kill on shutdown failed");
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory process doubles shared by the registry and facade tests.

    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::core::pty::PtyError;

    #[derive(Default)]
    pub struct FakeState {
        pub spawned: Vec<SpawnRequest>,
        pub writes: HashMap<SessionId, Vec<u8>>,
        pub resizes: Vec<(SessionId, u16, u16)>,
        pub kills: Vec<SessionId>,
        pub sinks: HashMap<SessionId, EventSink>,
        pub fail_spawn: bool,
        /// Pid reported by every fake process
        pub pid: Option<u32>,
    }

    /// Spawner whose processes only record what was done to them.
    #[derive(Clone, Default)]
    pub struct FakeSpawner {
        pub state: Arc<Mutex<FakeState>>,
    }

    impl FakeSpawner {
        pub fn spawn_count(&self) -> usize {
            self.state.lock().unwrap().spawned.len()
        }

        pub fn resizes(&self) -> Vec<(SessionId, u16, u16)> {
            self.state.lock().unwrap().resizes.clone()
        }

        pub fn written(&self, id: SessionId) -> Vec<u8> {
            self.state
                .lock()
                .unwrap()
                .writes
                .get(&id)
                .cloned()
                .unwrap_or_default()
        }

        pub fn kills(&self) -> Vec<SessionId> {
            self.state.lock().unwrap().kills.clone()
        }

        pub fn last_request(&self) -> SpawnRequest {
            self.state.lock().unwrap().spawned.last().cloned().unwrap()
        }

        pub fn emit_output(&self, id: SessionId, data: &[u8]) {
            let state = self.state.lock().unwrap();
            state.sinks[&id].output(data.to_vec());
        }

        pub fn emit_exit(&self, id: SessionId) {
            let state = self.state.lock().unwrap();
            state.sinks[&id].exited();
        }

        pub fn fail_next_spawns(&self) {
            self.state.lock().unwrap().fail_spawn = true;
        }

        /// Report the test runner's pid so directory lookups hit a live process
        pub fn report_own_pid(&self) {
            self.state.lock().unwrap().pid = Some(std::process::id());
        }
    }

    struct FakeProcess {
        id: SessionId,
        state: Arc<Mutex<FakeState>>,
    }

    impl Process for FakeProcess {
        fn pid(&self) -> Option<u32> {
            self.state.lock().unwrap().pid
        }

        fn write(&mut self, data: &[u8]) -> std::result::Result<(), PtyError> {
            let mut state = self.state.lock().unwrap();
            state.writes.entry(self.id).or_default().extend_from_slice(data);
            Ok(())
        }

        fn resize(&mut self, cols: u16, rows: u16) -> std::result::Result<(), PtyError> {
            self.state.lock().unwrap().resizes.push((self.id, cols, rows));
            Ok(())
        }

        fn kill(&mut self) -> std::result::Result<(), PtyError> {
            self.state.lock().unwrap().kills.push(self.id);
            Ok(())
        }

        fn try_wait(&mut self) -> Option<u32> {
            Some(0)
        }
    }

    impl Spawner for FakeSpawner {
        fn spawn(
            &mut self,
            request: &SpawnRequest,
            sink: EventSink,
        ) -> std::result::Result<Box<dyn Process>, PtyError> {
            let mut state = self.state.lock().unwrap();
            if state.fail_spawn {
                return Err(PtyError::ProcessSpawn("no such shell".to_string()));
            }
            state.spawned.push(request.clone());
            state.sinks.insert(request.id, sink);
            Ok(Box::new(FakeProcess {
                id: request.id,
                state: Arc::clone(&self.state),
            }))
        }
    }
}

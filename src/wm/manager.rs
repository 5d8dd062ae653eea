//! Multiplexer - the single entry point the UI talks to
//!
//! Owns the layout tree, the session registry, the resize coordinator and the
//! surfaces, and keeps them consistent: every pane with a session has exactly
//! one surface, and the active pane always exists in the tree.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::layout::{Axis, LayoutNode, LayoutTree, PaneId, Position};
use super::resize::{GridSize, GridSource, ResizeCoordinator, ResizeSettings, ResizeTrigger};
use super::surface::{SurfaceArena, SurfaceFactory};
use crate::assistant::{Suggestion, Translator};
use crate::core::cwd;
use crate::core::process::Spawner;
use crate::core::session::{ExitReason, RegistryEvent, RegistryOptions, SessionId, SessionRegistry};
use crate::error::{MuxError, Result};

/// Startup options for a [`Multiplexer`]
#[derive(Clone, Debug, Default)]
pub struct MuxOptions {
    pub registry: RegistryOptions,
    pub resize: ResizeSettings,
    /// Directory of the first pane; home if unset
    pub initial_cwd: Option<PathBuf>,
}

/// How to pick the pane to focus
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FocusTarget {
    Pane(PaneId),
    /// Display number as shown to the user
    Number(u32),
}

/// Where a pane's session is in its life
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaneState {
    NoSession,
    Live,
    RequestedClose,
    ExternallyExited,
}

/// Notifications returned by [`Multiplexer::pump`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MuxEvent {
    SessionOutput {
        session: SessionId,
        pane: Option<PaneId>,
        data: Vec<u8>,
    },
    SessionUnexpectedExit {
        session: SessionId,
        pane: Option<PaneId>,
        reason: ExitReason,
    },
}

/// Measurements over the current tree, one surface per pane
struct PaneGrid<'a> {
    layout: &'a LayoutTree,
    registry: &'a SessionRegistry,
    surfaces: &'a SurfaceArena,
}

impl GridSource for PaneGrid<'_> {
    fn visible_panes(&self) -> Vec<PaneId> {
        self.layout
            .panes()
            .into_iter()
            .filter(|p| p.session.map_or(false, |s| self.registry.is_live(s)))
            .map(|p| p.id)
            .collect()
    }

    fn measure(&mut self, pane: PaneId) -> GridSize {
        self.layout
            .pane(pane)
            .and_then(|p| p.session)
            .map(|s| self.surfaces.measure(s))
            .unwrap_or_default()
    }
}

pub struct Multiplexer {
    layout: LayoutTree,
    registry: SessionRegistry,
    coordinator: ResizeCoordinator,
    surfaces: SurfaceArena,
    factory: Box<dyn SurfaceFactory>,
    translator: Box<dyn Translator>,
    active: PaneId,
    /// Panes whose session ended on its own and await remove/restart
    exited: HashSet<PaneId>,
    /// Last directory known for each pane, used on restart
    last_cwd: HashMap<PaneId, PathBuf>,
    next_session: u64,
}

impl Multiplexer {
    /// Build the initial single-pane layout. No process runs until [`start`].
    ///
    /// [`start`]: Multiplexer::start
    pub fn new(
        options: MuxOptions,
        spawner: Box<dyn Spawner>,
        factory: Box<dyn SurfaceFactory>,
        translator: Box<dyn Translator>,
    ) -> Self {
        let layout = LayoutTree::new(options.initial_cwd.clone());
        let active = layout.pane_ids()[0];
        Self {
            layout,
            registry: SessionRegistry::new(spawner, options.registry),
            coordinator: ResizeCoordinator::new(options.resize),
            surfaces: SurfaceArena::new(),
            factory,
            translator,
            active,
            exited: HashSet::new(),
            last_cwd: HashMap::new(),
            next_session: 1,
        }
    }

    /// Spawn the first pane's session
    pub fn start(&mut self, now: Instant) -> Result<SessionId> {
        let pane = self.active;
        let cwd = self.layout.pane(pane).and_then(|p| p.initial_cwd.clone());
        let session = self.spawn_into(pane, cwd)?;
        if let Some(surface) = self.surfaces.get_mut(session) {
            surface.focus();
        }
        self.coordinator.trigger(ResizeTrigger::CONTAINER, now);
        Ok(session)
    }

    fn allocate_session(&mut self) -> SessionId {
        let id = SessionId(self.next_session);
        self.next_session += 1;
        id
    }

    /// Attach a fresh session and surface to `pane`.
    ///
    /// On spawn failure the pane keeps its surface; the registry has already
    /// queued an unexpected-exit notice for it.
    fn spawn_into(&mut self, pane: PaneId, cwd: Option<PathBuf>) -> Result<SessionId> {
        let session = self.allocate_session();
        self.layout.attach_session(pane, session)?;
        self.surfaces.insert(session, self.factory.create(session));
        let info = self.registry.create(session, cwd)?;
        self.last_cwd.insert(pane, info.cwd);
        debug!(pane = %pane, session = %session, "pane attached");
        Ok(session)
    }

    /// Probe the directory of `pane`'s session, remembering the answer
    fn probe_cwd(&mut self, pane: PaneId) -> PathBuf {
        let session = self.layout.pane(pane).and_then(|p| p.session);
        match session {
            Some(s) if self.registry.is_live(s) => {
                let dir = self.registry.working_directory(s);
                self.last_cwd.insert(pane, dir.clone());
                dir
            }
            _ => self
                .last_cwd
                .get(&pane)
                .cloned()
                .unwrap_or_else(cwd::home_dir),
        }
    }

    /// Split the active pane; the new pane starts in the active pane's
    /// directory and takes focus.
    pub fn split_active(&mut self, axis: Axis, position: Position, now: Instant) -> Result<PaneId> {
        let source = self.active;
        let dir = self.probe_cwd(source);
        let pane = self.layout.split(source, axis, position, Some(dir.clone()))?;
        info!(source = %source, pane = %pane, axis = ?axis, "pane split");

        if let Err(e) = self.spawn_into(pane, Some(dir)) {
            // The queued exit notice marks the pane as exited on the next pump
            warn!(pane = %pane, error = %e, "split pane has no session");
        }
        self.coordinator.trigger(ResizeTrigger::SPLIT, now);
        self.set_active(pane, now);
        Ok(pane)
    }

    /// Close a pane at the user's request. The last pane cannot be closed.
    pub fn close_pane(&mut self, pane: PaneId, now: Instant) -> Result<()> {
        let session = self
            .layout
            .pane(pane)
            .ok_or(MuxError::PaneNotFound(pane))?
            .session;
        if self.layout.pane_count() <= 1 {
            return Err(MuxError::LastPaneProtected);
        }

        if let Some(session) = session {
            if self.registry.is_live(session) {
                self.registry.close(session)?;
            }
            self.surfaces.remove(session);
        }
        let closed = self.layout.close(pane)?;
        self.exited.remove(&pane);
        self.last_cwd.remove(&pane);
        info!(pane = %pane, "pane closed");

        if self.active == pane {
            self.set_active(closed.focus_hint, now);
        }
        self.coordinator.trigger(ResizeTrigger::CLOSE, now);
        Ok(())
    }

    /// Focus a pane by id or display number
    pub fn switch_focus(&mut self, target: FocusTarget, now: Instant) -> Result<PaneId> {
        let pane = match target {
            FocusTarget::Pane(id) => self
                .layout
                .find_pane(id)
                .map(|loc| loc.pane.id)
                .ok_or(MuxError::PaneNotFound(id))?,
            FocusTarget::Number(n) => self
                .layout
                .find_pane_by_number(n)
                .ok_or(MuxError::PaneNumberNotFound(n))?,
        };
        self.set_active(pane, now);
        Ok(pane)
    }

    /// Focus the next pane in tree order
    pub fn focus_next(&mut self, now: Instant) -> PaneId {
        if let Some(next) = self.layout.next_pane_after(self.active) {
            self.set_active(next, now);
        }
        self.active
    }

    fn set_active(&mut self, pane: PaneId, now: Instant) {
        if pane != self.active {
            if let Some(old) = self.session_of(self.active) {
                if let Some(surface) = self.surfaces.get_mut(old) {
                    surface.blur();
                }
            }
        }
        self.active = pane;
        if let Some(session) = self.session_of(pane) {
            if let Some(surface) = self.surfaces.get_mut(session) {
                surface.focus();
            }
        }
        self.coordinator.trigger(ResizeTrigger::ACTIVATE, now);
    }

    /// Type text into the active pane's session
    pub fn send_input_to_active(&mut self, text: &str) {
        self.send_bytes_to_active(text.as_bytes());
    }

    pub fn send_bytes_to_active(&mut self, data: &[u8]) {
        match self.session_of(self.active) {
            Some(session) => self.registry.write(session, data),
            None => debug!(pane = %self.active, "input for pane without session dropped"),
        }
    }

    /// Keystrokes typed directly into a session's surface
    pub fn handle_surface_input(&mut self, session: SessionId, data: &[u8]) {
        self.registry.write(session, data);
    }

    /// The hosting window changed size
    pub fn window_resized(&mut self, now: Instant) {
        self.coordinator.trigger(ResizeTrigger::WINDOW, now);
    }

    /// A pane container changed size without a window resize
    pub fn container_resized(&mut self, now: Instant) {
        self.coordinator.trigger(ResizeTrigger::CONTAINER, now);
    }

    /// Drain session events, feeding surfaces and marking exited panes
    pub fn pump(&mut self) -> Vec<MuxEvent> {
        let mut events = Vec::new();
        for event in self.registry.poll_events() {
            match event {
                RegistryEvent::Output { id, data } => {
                    self.surfaces.write(id, &data);
                    events.push(MuxEvent::SessionOutput {
                        session: id,
                        pane: self.pane_of(id),
                        data,
                    });
                }
                RegistryEvent::UnexpectedExit { id, reason } => {
                    let pane = self.pane_of(id);
                    if let Some(pane) = pane {
                        info!(pane = %pane, session = %id, reason = ?reason, "pane session exited");
                        self.exited.insert(pane);
                    }
                    events.push(MuxEvent::SessionUnexpectedExit {
                        session: id,
                        pane,
                        reason,
                    });
                }
            }
        }
        events
    }

    /// Advance resize timers
    pub fn tick(&mut self, now: Instant) {
        let mut grid = PaneGrid {
            layout: &self.layout,
            registry: &self.registry,
            surfaces: &self.surfaces,
        };
        let settled = self.coordinator.poll(now, &mut grid);
        self.apply_sizes(settled);
    }

    /// A rendering frame finished
    pub fn frame(&mut self, now: Instant) {
        let mut grid = PaneGrid {
            layout: &self.layout,
            registry: &self.registry,
            surfaces: &self.surfaces,
        };
        let settled = self.coordinator.frame_boundary(now, &mut grid);
        self.apply_sizes(settled);
    }

    fn apply_sizes(&mut self, settled: Vec<(PaneId, GridSize)>) {
        for (pane, size) in settled {
            if let Some(session) = self.session_of(pane) {
                debug!(pane = %pane, cols = size.cols, rows = size.rows, "pane resized");
                self.registry.resize(session, size.cols, size.rows);
            }
        }
    }

    /// Answer "remove" to an exited pane
    pub fn remove_dead_pane(&mut self, pane: PaneId, now: Instant) -> Result<()> {
        match self.pane_state(pane) {
            Some(PaneState::ExternallyExited) => {}
            Some(_) => return Err(MuxError::PaneNotExited(pane)),
            None => return Err(MuxError::PaneNotFound(pane)),
        }
        self.close_pane(pane, now)
    }

    /// Answer "restart" to an exited pane: a fresh session in the same pane
    pub fn respawn_pane(&mut self, pane: PaneId, now: Instant) -> Result<SessionId> {
        match self.pane_state(pane) {
            Some(PaneState::ExternallyExited) => {}
            Some(_) => return Err(MuxError::PaneNotExited(pane)),
            None => return Err(MuxError::PaneNotFound(pane)),
        }
        if let Some(old) = self.session_of(pane) {
            self.surfaces.remove(old);
        }
        self.exited.remove(&pane);
        let dir = self.last_cwd.get(&pane).cloned();
        let session = self.spawn_into(pane, dir)?;
        info!(pane = %pane, session = %session, "pane restarted");
        if pane == self.active {
            if let Some(surface) = self.surfaces.get_mut(session) {
                surface.focus();
            }
        }
        self.coordinator.trigger(ResizeTrigger::ACTIVATE, now);
        Ok(session)
    }

    /// Ask the translator for a command to run in the active pane
    pub fn request_command(&mut self, prompt: &str) -> Suggestion {
        let dir = self.probe_cwd(self.active);
        match self.translator.translate(prompt, &dir) {
            Ok(translation) => Suggestion::from_translation(prompt, translation),
            Err(e) => {
                warn!(error = %e, "translation failed");
                Suggestion::from_error(prompt, &e)
            }
        }
    }

    /// Type an executable suggestion into the active pane, without Enter
    pub fn accept_suggestion(&mut self, suggestion: &Suggestion) -> bool {
        if !suggestion.executable || suggestion.command.is_empty() {
            return false;
        }
        self.send_input_to_active(&suggestion.command);
        true
    }

    pub fn pane_state(&self, pane: PaneId) -> Option<PaneState> {
        let session = self.layout.pane(pane)?.session;
        Some(match session {
            None => PaneState::NoSession,
            Some(s) if self.registry.is_live(s) => PaneState::Live,
            Some(s) if self.registry.is_pending_close(s) => PaneState::RequestedClose,
            Some(_) if self.exited.contains(&pane) => PaneState::ExternallyExited,
            // Spawn failed and the notice is not pumped yet
            Some(_) => PaneState::NoSession,
        })
    }

    pub fn active_pane(&self) -> PaneId {
        self.active
    }

    pub fn active_number(&self) -> Option<u32> {
        self.layout.pane(self.active).map(|p| p.display_number)
    }

    pub fn session_of(&self, pane: PaneId) -> Option<SessionId> {
        self.layout.pane(pane).and_then(|p| p.session)
    }

    fn pane_of(&self, session: SessionId) -> Option<PaneId> {
        self.layout
            .panes()
            .into_iter()
            .find(|p| p.session == Some(session))
            .map(|p| p.id)
    }

    pub fn layout(&self) -> &LayoutTree {
        &self.layout
    }

    pub fn snapshot(&self) -> LayoutNode {
        self.layout.snapshot()
    }

    pub fn summary(&self) -> String {
        self.layout.summary()
    }

    /// Panes awaiting a remove/restart answer
    pub fn exited_panes(&self) -> Vec<PaneId> {
        let mut panes: Vec<_> = self.exited.iter().copied().collect();
        panes.sort();
        panes
    }

    /// Nothing left running and nothing to restart
    pub fn is_finished(&self) -> bool {
        self.registry.live_count() == 0 && self.exited.len() >= self.layout.pane_count()
    }

    pub fn resize_idle(&self) -> bool {
        self.coordinator.is_idle()
    }

    pub fn next_resize_deadline(&self) -> Option<Instant> {
        self.coordinator.next_deadline()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::assistant::testing::ScriptedTranslator;
    use crate::assistant::{Translation, UnconfiguredTranslator};
    use crate::core::session::testing::FakeSpawner;
    use crate::wm::surface::testing::RecordingFactory;

    fn options() -> MuxOptions {
        MuxOptions {
            initial_cwd: Some(PathBuf::from("/work")),
            ..MuxOptions::default()
        }
    }

    fn started() -> (Multiplexer, FakeSpawner, RecordingFactory, Instant) {
        let spawner = FakeSpawner::default();
        let factory = RecordingFactory::with_size(100, 40);
        let mut mux = Multiplexer::new(
            options(),
            Box::new(spawner.clone()),
            Box::new(factory.clone()),
            Box::new(UnconfiguredTranslator),
        );
        let now = Instant::now();
        mux.start(now).unwrap();
        (mux, spawner, factory, now)
    }

    /// Run timers and frames until the coordinator goes idle
    fn settle(mux: &mut Multiplexer, mut now: Instant) -> Instant {
        for _ in 0..200 {
            now += Duration::from_millis(5);
            mux.tick(now);
            mux.frame(now);
            if mux.resize_idle() {
                break;
            }
        }
        now
    }

    #[test]
    fn test_start_spawns_in_initial_cwd() {
        let (mux, spawner, factory, _) = started();
        assert_eq!(spawner.spawn_count(), 1);
        assert_eq!(spawner.last_request().cwd, PathBuf::from("/work"));
        assert_eq!(mux.pane_state(mux.active_pane()), Some(PaneState::Live));
        assert_eq!(factory.log.borrow().focused, vec![SessionId(1)]);
    }

    #[test]
    fn test_split_then_close_scenario() {
        let (mut mux, spawner, factory, now) = started();
        let p1 = mux.active_pane();

        let p2 = mux.split_active(Axis::Horizontal, Position::After, now).unwrap();
        assert_eq!(mux.active_pane(), p2);
        let p3 = mux.split_active(Axis::Vertical, Position::After, now).unwrap();
        assert_eq!(mux.summary(), "H[1 V[2 3]]");
        assert_eq!(spawner.spawn_count(), 3);

        let s2 = mux.session_of(p2).unwrap();
        mux.close_pane(p2, now).unwrap();
        assert_eq!(mux.summary(), "H[1 3]");
        assert_eq!(mux.active_pane(), p3);
        assert_eq!(spawner.kills(), vec![s2]);
        assert_eq!(factory.log.borrow().disposed, vec![s2]);

        // Requested close stays silent
        spawner.emit_exit(s2);
        assert!(mux.pump().is_empty());

        mux.close_pane(p3, now).unwrap();
        assert_eq!(mux.active_pane(), p1);
        assert!(matches!(mux.close_pane(p1, now), Err(MuxError::LastPaneProtected)));
        assert_eq!(mux.pane_state(p1), Some(PaneState::Live));
    }

    #[test]
    fn test_closing_unknown_pane_is_not_found() {
        let (mut mux, _, _, now) = started();
        let err = mux.close_pane(PaneId(999), now).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_output_reaches_only_its_surface() {
        let (mut mux, spawner, factory, now) = started();
        let p2 = mux.split_active(Axis::Horizontal, Position::After, now).unwrap();
        let s1 = SessionId(1);
        let s2 = mux.session_of(p2).unwrap();

        spawner.emit_output(s2, b"two");
        spawner.emit_output(s1, b"one");
        spawner.emit_output(s2, b"!");
        let events = mux.pump();
        assert_eq!(events.len(), 3);
        assert!(matches!(
            &events[0],
            MuxEvent::SessionOutput { pane: Some(p), .. } if *p == p2
        ));

        let log = factory.log.borrow();
        assert_eq!(log.output[&s1], b"one".to_vec());
        assert_eq!(log.output[&s2], b"two!".to_vec());
    }

    #[test]
    fn test_unexpected_exit_keeps_pane_until_answered() {
        let (mut mux, spawner, _, now) = started();
        let p2 = mux.split_active(Axis::Horizontal, Position::After, now).unwrap();
        let s2 = mux.session_of(p2).unwrap();

        spawner.emit_exit(s2);
        let events = mux.pump();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            MuxEvent::SessionUnexpectedExit { session, pane: Some(p), .. } if *session == s2 && *p == p2
        ));
        assert_eq!(mux.pane_state(p2), Some(PaneState::ExternallyExited));
        assert_eq!(mux.layout().pane_count(), 2);

        // Input to the dead session goes nowhere
        mux.send_input_to_active("ls\r");
        assert!(spawner.written(s2).is_empty());

        mux.remove_dead_pane(p2, now).unwrap();
        assert_eq!(mux.layout().pane_count(), 1);
        assert!(mux.exited_panes().is_empty());
    }

    #[test]
    fn test_respawn_uses_fresh_session_in_last_directory() {
        let (mut mux, spawner, factory, now) = started();
        let p1 = mux.active_pane();
        spawner.emit_exit(SessionId(1));
        mux.pump();
        assert!(mux.is_finished());

        let session = mux.respawn_pane(p1, now).unwrap();
        assert_ne!(session, SessionId(1));
        assert_eq!(spawner.last_request().cwd, PathBuf::from("/work"));
        assert_eq!(mux.pane_state(p1), Some(PaneState::Live));
        assert!(factory.log.borrow().disposed.contains(&SessionId(1)));
        assert!(!mux.is_finished());

        // Only exited panes can be restarted
        assert!(matches!(
            mux.respawn_pane(p1, now),
            Err(MuxError::PaneNotExited(_))
        ));
    }

    #[test]
    fn test_switch_focus_by_number_and_id() {
        let (mut mux, _, _, now) = started();
        let p1 = mux.active_pane();
        let p2 = mux.split_active(Axis::Vertical, Position::After, now).unwrap();

        assert_eq!(mux.switch_focus(FocusTarget::Number(1), now).unwrap(), p1);
        assert_eq!(mux.switch_focus(FocusTarget::Pane(p2), now).unwrap(), p2);
        assert!(mux.switch_focus(FocusTarget::Number(7), now).is_err());
        assert_eq!(mux.active_pane(), p2);
        assert_eq!(mux.focus_next(now), p1);
    }

    #[test]
    fn test_input_goes_to_active_session() {
        let (mut mux, spawner, _, now) = started();
        let p2 = mux.split_active(Axis::Horizontal, Position::After, now).unwrap();
        mux.send_input_to_active("echo hi\r");
        mux.handle_surface_input(SessionId(1), b"x");

        assert_eq!(spawner.written(mux.session_of(p2).unwrap()), b"echo hi\r".to_vec());
        assert_eq!(spawner.written(SessionId(1)), b"x".to_vec());
    }

    #[test]
    fn test_split_burst_resizes_each_pane_once() {
        let (mut mux, spawner, _, now) = started();
        for _ in 0..3 {
            mux.split_active(Axis::Horizontal, Position::After, now).unwrap();
        }
        mux.window_resized(now);
        settle(&mut mux, now);

        let resizes = spawner.resizes();
        assert_eq!(resizes.len(), 4);
        let mut sessions: Vec<_> = resizes.iter().map(|r| r.0).collect();
        sessions.sort();
        sessions.dedup();
        assert_eq!(sessions.len(), 4);
        assert!(resizes.iter().all(|&(_, c, r)| (c, r) == (100, 40)));
    }

    #[test]
    fn test_hidden_surface_is_never_resized_to_zero() {
        let (mut mux, spawner, factory, now) = started();
        factory
            .log
            .borrow_mut()
            .sizes
            .insert(SessionId(1), GridSize::new(0, 0));
        mux.window_resized(now);
        settle(&mut mux, now);
        assert!(spawner.resizes().is_empty());
        assert!(mux.resize_idle());
    }

    #[test]
    fn test_spawn_failure_surfaces_as_exit() {
        let (mut mux, spawner, _, now) = started();
        spawner.fail_next_spawns();
        let p2 = mux.split_active(Axis::Horizontal, Position::After, now).unwrap();

        let events = mux.pump();
        assert!(matches!(
            &events[..],
            [MuxEvent::SessionUnexpectedExit { reason: ExitReason::SpawnFailed(_), .. }]
        ));
        assert_eq!(mux.pane_state(p2), Some(PaneState::ExternallyExited));
    }

    #[test]
    fn test_suggestion_is_typed_without_enter() {
        let spawner = FakeSpawner::default();
        let translator = ScriptedTranslator {
            answer: Some(Translation {
                command: "ls -la".to_string(),
                explanation: "list files".to_string(),
            }),
            ..Default::default()
        };
        let mut mux = Multiplexer::new(
            options(),
            Box::new(spawner.clone()),
            Box::new(RecordingFactory::with_size(80, 24)),
            Box::new(translator.clone()),
        );
        mux.start(Instant::now()).unwrap();

        let suggestion = mux.request_command("show everything here");
        assert!(suggestion.executable);
        assert!(mux.accept_suggestion(&suggestion));
        assert_eq!(spawner.written(SessionId(1)), b"ls -la".to_vec());
        assert_eq!(
            translator.asked.borrow()[0].0,
            "show everything here".to_string()
        );
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_split_starts_in_source_pane_directory() {
        let (mut mux, spawner, _, now) = started();
        assert_eq!(spawner.last_request().cwd, PathBuf::from("/work"));

        // The fake now points at a real process, so the lookup succeeds
        spawner.report_own_pid();
        let here = std::env::current_dir().unwrap();
        let p2 = mux.split_active(Axis::Horizontal, Position::After, now).unwrap();
        assert_eq!(spawner.last_request().cwd, here);
        assert_eq!(mux.layout().pane(p2).unwrap().initial_cwd, Some(here));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_translator_is_asked_in_active_pane_directory() {
        let spawner = FakeSpawner::default();
        let translator = ScriptedTranslator::default();
        let mut mux = Multiplexer::new(
            options(),
            Box::new(spawner.clone()),
            Box::new(RecordingFactory::with_size(80, 24)),
            Box::new(translator.clone()),
        );
        mux.start(Instant::now()).unwrap();
        spawner.report_own_pid();

        mux.request_command("where am i");
        let asked = translator.asked.borrow();
        assert_eq!(
            asked.as_slice(),
            &[("where am i".to_string(), std::env::current_dir().unwrap())]
        );
    }

    #[test]
    fn test_failed_translation_is_informational() {
        let (mut mux, spawner, _, _) = started();
        let suggestion = mux.request_command("anything");
        assert!(!suggestion.executable);
        assert!(!mux.accept_suggestion(&suggestion));
        assert!(spawner.written(SessionId(1)).is_empty());
    }
}

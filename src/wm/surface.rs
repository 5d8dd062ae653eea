//! Rendering surfaces
//!
//! A surface is whatever draws one session's output. The multiplexer owns
//! every surface in a [`SurfaceArena`] keyed by session id, so a surface
//! lives exactly as long as its session's pane and not as long as any
//! particular drawing of the layout.

use std::collections::HashMap;

use tracing::debug;

use super::resize::GridSize;
use crate::core::session::SessionId;

/// One pane's terminal surface
pub trait Surface {
    /// Feed process output
    fn write(&mut self, data: &[u8]);

    /// Current character grid; empty while hidden or not laid out
    fn measure_grid_size(&self) -> GridSize;

    /// The pane became active
    fn focus(&mut self);

    /// The pane stopped being active
    fn blur(&mut self) {}

    /// Release whatever the surface holds. Called once, before it is dropped.
    fn dispose(&mut self);
}

/// Creates and attaches surfaces for new sessions
pub trait SurfaceFactory {
    fn create(&mut self, session: SessionId) -> Box<dyn Surface>;
}

/// Surfaces indexed by session id
#[derive(Default)]
pub struct SurfaceArena {
    surfaces: HashMap<SessionId, Box<dyn Surface>>,
}

impl SurfaceArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a surface, disposing any previous one for the same session
    pub fn insert(&mut self, session: SessionId, surface: Box<dyn Surface>) {
        if let Some(mut old) = self.surfaces.insert(session, surface) {
            old.dispose();
        }
    }

    /// Dispose and drop the surface of `session`
    pub fn remove(&mut self, session: SessionId) -> bool {
        match self.surfaces.remove(&session) {
            Some(mut surface) => {
                surface.dispose();
                true
            }
            None => false,
        }
    }

    /// Route output; returns false if the session has no surface
    pub fn write(&mut self, session: SessionId, data: &[u8]) -> bool {
        match self.surfaces.get_mut(&session) {
            Some(surface) => {
                surface.write(data);
                true
            }
            None => {
                debug!(session = %session, len = data.len(), "output without surface dropped");
                false
            }
        }
    }

    pub fn measure(&self, session: SessionId) -> GridSize {
        self.surfaces
            .get(&session)
            .map(|s| s.measure_grid_size())
            .unwrap_or_default()
    }

    pub fn get_mut(&mut self, session: SessionId) -> Option<&mut (dyn Surface + 'static)> {
        self.surfaces.get_mut(&session).map(|s| s.as_mut())
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingFactory;
    use super::*;

    #[test]
    fn test_arena_routes_and_disposes() {
        let mut factory = RecordingFactory::with_size(80, 24);
        let mut arena = SurfaceArena::new();
        arena.insert(SessionId(1), factory.create(SessionId(1)));
        arena.insert(SessionId(2), factory.create(SessionId(2)));

        assert!(arena.write(SessionId(2), b"hello"));
        assert!(!arena.write(SessionId(3), b"lost"));
        assert_eq!(arena.measure(SessionId(1)), GridSize::new(80, 24));
        assert_eq!(arena.measure(SessionId(3)), GridSize::default());

        assert!(arena.remove(SessionId(1)));
        assert!(!arena.remove(SessionId(1)));

        let log = factory.log.borrow();
        assert_eq!(log.output[&SessionId(2)], b"hello".to_vec());
        assert_eq!(log.disposed, vec![SessionId(1)]);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_replacing_surface_disposes_old_one() {
        let mut factory = RecordingFactory::with_size(80, 24);
        let mut arena = SurfaceArena::new();
        arena.insert(SessionId(1), factory.create(SessionId(1)));
        arena.insert(SessionId(1), factory.create(SessionId(1)));
        assert_eq!(factory.log.borrow().disposed, vec![SessionId(1)]);
        assert_eq!(arena.len(), 1);
    }
}

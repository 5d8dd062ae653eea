//! Error taxonomy for the multiplexer core.
//!
//! Structural and process errors are contained by the component that detects
//! them. Most of these variants end up as logged no-ops; only spawn failures
//! and translation failures are meant to reach the user.

use thiserror::Error;

use crate::core::pty::PtyError;
use crate::core::session::SessionId;
use crate::wm::layout::PaneId;

#[derive(Error, Debug)]
pub enum MuxError {
    #[error("pane not found: {0}")]
    PaneNotFound(PaneId),

    #[error("no pane numbered {0}")]
    PaneNumberNotFound(u32),

    #[error("pane {0} is still running")]
    PaneNotExited(PaneId),

    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("the last remaining pane cannot be closed")]
    LastPaneProtected,

    #[error("invalid terminal geometry: {cols}x{rows}")]
    InvalidGeometry { cols: u16, rows: u16 },

    #[error("failed to spawn session {id}: {reason}")]
    Spawn { id: SessionId, reason: String },

    #[error("session {0} was closed and cannot be recreated")]
    SessionRetired(SessionId),

    #[error("working directory probe failed: {0}")]
    Probe(String),

    #[error("command translation failed: {0}")]
    Translation(String),

    #[error(transparent)]
    Pty(#[from] PtyError),
}

impl MuxError {
    /// Whether this error only means "the referenced id is gone".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            MuxError::PaneNotFound(_)
                | MuxError::PaneNumberNotFound(_)
                | MuxError::SessionNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, MuxError>;

//! Resize coordination
//!
//! Collapses bursts of "geometry may have changed" signals into one settled
//! measurement per pane. A cycle runs:
//!
//! ```text
//! trigger ─► Debouncing ─(deadline)─► Settling ─(N frames)─► measure
//!    ▲            │                                            │
//!    └── any new trigger restarts here        zero-sized panes ─► Retrying
//! ```
//!
//! The coordinator owns no clock and no surfaces. The control loop feeds it
//! `Instant`s and frame boundaries, and a [`GridSource`] answers measurements.

use std::time::{Duration, Instant};

use bitflags::bitflags;
use tracing::debug;

use super::layout::PaneId;

bitflags! {
    /// Why a re-measure was requested
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ResizeTrigger: u8 {
        const CONTAINER = 0b00001;
        const SPLIT     = 0b00010;
        const CLOSE     = 0b00100;
        const ACTIVATE  = 0b01000;
        const WINDOW    = 0b10000;
    }
}

/// Character grid of a surface
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GridSize {
    pub cols: u16,
    pub rows: u16,
}

impl GridSize {
    pub const fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    /// Not laid out yet (or hidden)
    pub fn is_empty(&self) -> bool {
        self.cols == 0 || self.rows == 0
    }
}

/// Where measurements come from
pub trait GridSource {
    /// Panes that currently have a surface worth measuring
    fn visible_panes(&self) -> Vec<PaneId>;

    fn measure(&mut self, pane: PaneId) -> GridSize;
}

#[derive(Clone, Debug)]
pub struct ResizeSettings {
    pub debounce: Duration,
    /// Frame boundaries to wait after the debounce fires
    pub settle_frames: u8,
    /// Re-measure attempts for panes that measured empty
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for ResizeSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(40),
            settle_frames: 2,
            max_retries: 5,
            retry_backoff: Duration::from_millis(16),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Phase {
    Idle,
    Debouncing { deadline: Instant },
    Settling { frames_seen: u8 },
    Retrying {
        pending: Vec<PaneId>,
        attempt: u32,
        next_at: Instant,
    },
}

/// Turns trigger bursts into settled per-pane sizes
pub struct ResizeCoordinator {
    settings: ResizeSettings,
    phase: Phase,
    /// Reasons accumulated during the current cycle
    reasons: ResizeTrigger,
}

impl ResizeCoordinator {
    pub fn new(settings: ResizeSettings) -> Self {
        Self {
            settings,
            phase: Phase::Idle,
            reasons: ResizeTrigger::empty(),
        }
    }

    /// Start or restart the cycle from the debounce step
    pub fn trigger(&mut self, reason: ResizeTrigger, now: Instant) {
        if let Phase::Retrying { pending, .. } = &self.phase {
            debug!(dropped = pending.len(), "resize retries superseded");
        }
        self.reasons |= reason;
        self.phase = Phase::Debouncing {
            deadline: now + self.settings.debounce,
        };
    }

    /// Advance timers. Returns sizes that settled during a retry.
    pub fn poll(&mut self, now: Instant, source: &mut dyn GridSource) -> Vec<(PaneId, GridSize)> {
        let due = match &self.phase {
            Phase::Debouncing { deadline } => now >= *deadline,
            Phase::Retrying { next_at, .. } => now >= *next_at,
            Phase::Idle | Phase::Settling { .. } => false,
        };
        if !due {
            return Vec::new();
        }

        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Retrying {
                pending, attempt, ..
            } => self.measure(pending, attempt, now, source),
            _ => {
                self.phase = Phase::Settling { frames_seen: 0 };
                Vec::new()
            }
        }
    }

    /// Report a rendering frame boundary. Measures once the surface settled.
    pub fn frame_boundary(
        &mut self,
        now: Instant,
        source: &mut dyn GridSource,
    ) -> Vec<(PaneId, GridSize)> {
        // A deadline that passed between polls still counts
        if matches!(self.phase, Phase::Debouncing { deadline } if now >= deadline) {
            self.phase = Phase::Settling { frames_seen: 0 };
            return Vec::new();
        }

        let Phase::Settling { frames_seen } = &mut self.phase else {
            return Vec::new();
        };
        *frames_seen += 1;
        if *frames_seen < self.settings.settle_frames {
            return Vec::new();
        }

        debug!(reasons = ?self.reasons, "measuring settled surfaces");
        let panes = source.visible_panes();
        self.measure(panes, 0, now, source)
    }

    fn measure(
        &mut self,
        panes: Vec<PaneId>,
        attempt: u32,
        now: Instant,
        source: &mut dyn GridSource,
    ) -> Vec<(PaneId, GridSize)> {
        let mut settled = Vec::new();
        let mut pending = Vec::new();
        for pane in panes {
            let size = source.measure(pane);
            if size.is_empty() {
                pending.push(pane);
            } else {
                settled.push((pane, size));
            }
        }

        if pending.is_empty() || attempt >= self.settings.max_retries {
            if !pending.is_empty() {
                debug!(panes = ?pending, "surfaces never laid out, giving up");
            }
            self.phase = Phase::Idle;
            self.reasons = ResizeTrigger::empty();
        } else {
            let next_attempt = attempt + 1;
            self.phase = Phase::Retrying {
                pending,
                attempt: next_attempt,
                next_at: now + self.settings.retry_backoff * next_attempt,
            };
        }
        settled
    }

    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    /// When the next timer in the cycle fires, if any
    pub fn next_deadline(&self) -> Option<Instant> {
        match &self.phase {
            Phase::Debouncing { deadline } => Some(*deadline),
            Phase::Retrying { next_at, .. } => Some(*next_at),
            Phase::Idle | Phase::Settling { .. } => None,
        }
    }
}

//! Window management - pane layout, resizing and the multiplexer facade.
//!
//! - **layout**: n-ary split tree of panes and groups
//! - **resize**: debounced, frame-settled resize coordination
//! - **surface**: rendering surface traits and their arena
//! - **manager**: `Multiplexer`, the facade the UI drives
//!
//! # Module Hierarchy
//!
//! ```text
//! wm/
//! ├── mod.rs      - Module exports
//! ├── manager.rs  - Multiplexer (top-level coordinator)
//! ├── layout.rs   - LayoutTree (panes and groups)
//! ├── resize.rs   - ResizeCoordinator
//! └── surface.rs  - Surface, SurfaceFactory, SurfaceArena
//! ```

pub mod layout;
pub mod manager;
pub mod resize;
pub mod surface;

pub use layout::{Axis, LayoutTree, PaneId, Position};
pub use manager::{FocusTarget, MuxEvent, MuxOptions, Multiplexer, PaneState};
pub use resize::{GridSize, ResizeSettings, ResizeTrigger};
pub use surface::{Surface, SurfaceFactory};

//! panemux - a terminal session multiplexer core
//!
//! Hosts several interactive shell sessions side by side, arranged as a tree
//! of split panes. The pieces:
//!
//! - [`wm::layout::LayoutTree`]: which panes exist and how they nest
//! - [`core::session::SessionRegistry`]: one PTY-backed process per session
//! - [`wm::resize::ResizeCoordinator`]: turns resize bursts into one settled
//!   resize per pane
//! - [`wm::manager::Multiplexer`]: the facade a UI drives
//!
//! The `panemux` binary is a small crossterm front end over the facade.

pub mod assistant;
pub mod config;
pub mod core;
pub mod error;
pub mod ui;
pub mod wm;

pub use error::{MuxError, Result};

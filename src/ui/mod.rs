//! User interface rendering and input handling.
//!
//! - **renderer**: host screen, passthrough surfaces and the status line
//! - **keymapper**: keyboard input to PTY byte sequences, prefix commands

pub mod keymapper;
pub mod renderer;

pub use keymapper::{InputModes, KeyMapper, Modifiers, PrefixCommand};
pub use renderer::{PassthroughFactory, PassthroughSurface, Screen, SharedScreen, Status};

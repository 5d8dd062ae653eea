//! Process-side components of the multiplexer.
//!
//! - **process**: `Spawner`/`Process` seam and the event sink processes report to
//! - **pty**: portable-pty backed login shells
//! - **session**: `SessionRegistry`, the owner of every live process
//! - **cwd**: best-effort working directory probe
//!
//! # Architecture
//!
//! ```text
//! SessionRegistry
//! ├── Spawner ──► Process (one per SessionId)
//! │                └── reader thread ──► EventSink ──┐
//! └── poll_events() ◄── mpsc queue ◄─────────────────┘
//! ```

pub mod cwd;
pub mod process;
pub mod pty;
pub mod session;

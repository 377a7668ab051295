//! # Kanso Wayland Presentation Library
//!
//! A minimal Wayland client that presents CPU-rendered frames through
//! shared-memory buffers on a single `xdg_toplevel` window.
//!
//! ## Architecture
//!
//! The protocol plumbing is kept apart from the decisions:
//! - `shm`: anonymous POSIX shared memory objects
//! - `protocol`: capability table and version negotiation
//! - `buffer`: the rotating pool of pixel buffers and buffer selection
//! - `window`: the surface state machine (configure handshake, frame pacing)
//! - `input`: seat capabilities and pointer-driven animation speed
//! - `renderer`: the pixel fill
//! - `wayland`: connection, dispatch glue and the render loop
//! - `config`: configuration parsing and management
//!
//! `window` and `input` never touch the socket. They consume closed event
//! enums and return the requests to carry out, so they are tested without a
//! compositor.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use kanso::KansoConfig;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = KansoConfig::default();
//!     kanso::wayland::run(&config)?;
//!     Ok(())
//! }
//! ```

pub mod buffer;
pub mod config;
pub mod error;
pub mod input;
pub mod logging;
pub mod protocol;
pub mod renderer;
pub mod shm;
pub mod wayland;
pub mod window;

// Re-export main types for easy access
pub use buffer::{BufferPool, Size};
pub use config::KansoConfig;
pub use error::{KansoError, Result};
pub use input::InputRouter;
pub use window::SurfaceState;

/// Version information for Kanso
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

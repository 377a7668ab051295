//! Error taxonomy for the presentation layer.
//!
//! Every failure the core can report is one variant of [`KansoError`]. Callers
//! decide which ones are fatal; inside kanso all of them end the session.

use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, KansoError>;

#[derive(Debug, Error)]
pub enum KansoError {
    /// The server implements a global below the version floor kanso needs.
    #[error(
        "the version ({advertised}) of the wayland global object {interface} is lower than \
         the minimal supported by kanso ({minimum})"
    )]
    VersionTooLow {
        interface: &'static str,
        advertised: u32,
        minimum: u32,
    },

    /// A global kanso cannot run without was never advertised.
    #[error("the wayland server did not advertise the required global object {0}")]
    MissingCapability(&'static str),

    /// Every attempt to create a uniquely named shared memory object failed.
    #[error("failed to open a POSIX shared memory object after {attempts} attempts")]
    ShmExhausted { attempts: u32 },

    #[error("invalid number of buffers being used: {0} (at least 2 are required)")]
    InvalidBufferCount(usize),

    /// The requested geometry does not fit the protocol's 32-bit size fields.
    #[error("a {width}x{height} pixel buffer exceeds the maximum shared memory pool size")]
    BufferTooLarge { width: i32, height: i32 },

    /// Rendering was requested into a slot without backing memory.
    #[error("pixel buffer {0} has no backing memory")]
    BufferNotAllocated(usize),

    #[error("surface request issued before the window was created")]
    WindowNotCreated,

    #[error("shared memory I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to connect to the wayland display: {0}")]
    Connect(#[from] wayland_client::ConnectError),

    #[error("failed to dispatch wayland events: {0}")]
    Dispatch(#[from] wayland_client::DispatchError),

    #[error("wayland connection failure: {0}")]
    Connection(#[from] wayland_client::backend::WaylandError),
}

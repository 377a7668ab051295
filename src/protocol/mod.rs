//! Wayland capability negotiation
//!
//! Each global kanso cares about is described by a [`Capability`] with the
//! range of protocol versions the client implements. Binding follows an
//! asymmetric policy:
//!
//! - **Below the floor**: the server lacks requests or events kanso relies on,
//!   so negotiation fails and the session must end before the object is used.
//! - **Above the ceiling**: the server offers newer features kanso does not
//!   use yet, so the version is clamped down to the ceiling.
//!
//! # Usage
//!
//! ```
//! use kanso::protocol::{negotiate_version, Capability};
//!
//! let range = Capability::Compositor.supported_versions();
//! assert_eq!(negotiate_version("wl_compositor", 9, range).unwrap(), 6);
//! assert!(negotiate_version("wl_compositor", 3, range).is_err());
//! ```

use crate::error::{KansoError, Result};

/// Inclusive range of protocol versions the client implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionRange {
    pub min: u32,
    pub max: u32,
}

impl VersionRange {
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    /// Lowers the ceiling to `limit`.
    ///
    /// Used to respect the highest version compiled into the protocol bindings.
    /// Returns `None` when `limit` is below the floor, since no acceptable
    /// version remains.
    pub fn capped_at(self, limit: u32) -> Option<Self> {
        (limit >= self.min).then(|| Self {
            min: self.min,
            max: self.max.min(limit),
        })
    }

    pub fn contains(&self, version: u32) -> bool {
        (self.min..=self.max).contains(&version)
    }
}

/// Server globals kanso binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `wl_compositor`: surface creation
    Compositor,
    /// `wl_shm`: shared memory pools
    Shm,
    /// `xdg_wm_base`: window management
    WmBase,
    /// `wl_seat`: input devices
    Seat,
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::Compositor,
        Capability::Shm,
        Capability::WmBase,
        Capability::Seat,
    ];

    /// Interface name as advertised by the registry.
    pub fn interface(self) -> &'static str {
        match self {
            Capability::Compositor => "wl_compositor",
            Capability::Shm => "wl_shm",
            Capability::WmBase => "xdg_wm_base",
            Capability::Seat => "wl_seat",
        }
    }

    pub fn from_interface(interface: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|capability| capability.interface() == interface)
    }

    pub fn supported_versions(self) -> VersionRange {
        match self {
            // damage_buffer needs v4
            Capability::Compositor => VersionRange::new(4, 6),
            Capability::Shm => VersionRange::new(2, 2),
            Capability::WmBase => VersionRange::new(5, 7),
            // pointer/keyboard release need v3, axis frames v5
            Capability::Seat => VersionRange::new(5, 8),
        }
    }

    /// Whether kanso can present anything without this global.
    pub fn is_required(self) -> bool {
        !matches!(self, Capability::Seat)
    }
}

/// Picks the version to bind a global at.
pub fn negotiate_version(
    interface: &'static str,
    advertised: u32,
    supported: VersionRange,
) -> Result<u32> {
    if advertised < supported.min {
        return Err(KansoError::VersionTooLow {
            interface,
            advertised,
            minimum: supported.min,
        });
    }
    if advertised > supported.max {
        return Ok(supported.max);
    }
    Ok(advertised)
}

/// A bound global: registry name, what the server offered and what was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityBinding {
    pub capability: Capability,
    pub name: u32,
    pub advertised_version: u32,
    pub accepted_version: u32,
}

impl CapabilityBinding {
    pub fn negotiate(
        capability: Capability,
        name: u32,
        advertised_version: u32,
        supported: VersionRange,
    ) -> Result<Self> {
        let accepted_version =
            negotiate_version(capability.interface(), advertised_version, supported)?;
        Ok(Self {
            capability,
            name,
            advertised_version,
            accepted_version,
        })
    }
}

//! Global registry bookkeeping
//!
//! Decides, for each advertised global, whether kanso binds it and at which
//! version. The `wl_registry` dispatch glue performs the actual bind.

use crate::error::{KansoError, Result};
use crate::protocol::{Capability, CapabilityBinding};
use log::{debug, info, trace, warn};

pub struct GlobalRegistry {
    bindings: Vec<CapabilityBinding>,
    /// Highest version of each interface the protocol bindings were built with.
    compiled_version: fn(Capability) -> u32,
}

impl GlobalRegistry {
    pub fn new(compiled_version: fn(Capability) -> u32) -> Self {
        Self {
            bindings: Vec::with_capacity(Capability::ALL.len()),
            compiled_version,
        }
    }

    /// Handles a `wl_registry.global` advertisement.
    ///
    /// Returns the binding to perform, `None` for globals kanso does not use
    /// (or already holds), and an error when a recognised global is too old.
    pub fn on_global(
        &mut self,
        name: u32,
        interface: &str,
        version: u32,
    ) -> Result<Option<CapabilityBinding>> {
        let Some(capability) = Capability::from_interface(interface) else {
            trace!("Available wayland global object: {} v{}", interface, version);
            return Ok(None);
        };

        if let Some(existing) = self.binding(capability) {
            debug!(
                "Ignoring second {} global (name {}), already bound to name {}",
                interface, name, existing.name
            );
            return Ok(None);
        }

        let policy = capability.supported_versions();
        let compiled = (self.compiled_version)(capability);
        let supported = policy
            .capped_at(compiled)
            .ok_or(KansoError::VersionTooLow {
                interface: capability.interface(),
                advertised: compiled,
                minimum: policy.min,
            })?;
        let binding = CapabilityBinding::negotiate(capability, name, version, supported)?;

        info!(
            "🔗 Successful bind to the wayland global object {} v{} (server offers v{})",
            interface, binding.accepted_version, binding.advertised_version
        );
        self.bindings.push(binding);
        Ok(Some(binding))
    }

    /// Handles a `wl_registry.global_remove`. Bound objects stay in use.
    pub fn on_global_remove(&self, name: u32) {
        match self.bindings.iter().find(|binding| binding.name == name) {
            Some(binding) => warn!(
                "Wayland global object {} (name {}) was removed; keeping the bound object",
                binding.capability.interface(),
                name
            ),
            None => trace!("Wayland global object {} removed", name),
        }
    }

    pub fn binding(&self, capability: Capability) -> Option<&CapabilityBinding> {
        self.bindings
            .iter()
            .find(|binding| binding.capability == capability)
    }

    pub fn bindings(&self) -> &[CapabilityBinding] {
        &self.bindings
    }

    /// Fails with the first required capability that was never bound.
    pub fn ensure_required(&self) -> Result<()> {
        match Capability::ALL
            .into_iter()
            .filter(|capability| capability.is_required())
            .find(|&capability| self.binding(capability).is_none())
        {
            Some(missing) => Err(KansoError::MissingCapability(missing.interface())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uncapped() -> GlobalRegistry {
        GlobalRegistry::new(|_| u32::MAX)
    }

    #[test]
    fn test_unknown_globals_are_ignored() {
        let mut registry = uncapped();
        assert!(registry.on_global(1, "wl_output", 4).unwrap().is_none());
        assert!(registry.on_global(2, "zwp_linux_dmabuf_v1", 5).unwrap().is_none());
        assert!(registry.bindings().is_empty());
    }

    #[test]
    fn test_bind_clamps_to_supported_maximum() {
        let mut registry = uncapped();
        let binding = registry.on_global(7, "wl_compositor", 9).unwrap().unwrap();
        assert_eq!(binding.capability, Capability::Compositor);
        assert_eq!(binding.name, 7);
        assert_eq!(binding.advertised_version, 9);
        assert_eq!(binding.accepted_version, 6);
    }

    #[test]
    fn test_bind_is_capped_at_compiled_version() {
        let mut registry = GlobalRegistry::new(|capability| match capability {
            Capability::WmBase => 6,
            _ => u32::MAX,
        });
        let binding = registry.on_global(3, "xdg_wm_base", 7).unwrap().unwrap();
        assert_eq!(binding.accepted_version, 6);
    }

    #[test]
    fn test_version_below_minimum_is_fatal() {
        let mut registry = uncapped();
        let err = registry.on_global(4, "xdg_wm_base", 4).unwrap_err();
        assert!(matches!(
            err,
            KansoError::VersionTooLow {
                interface: "xdg_wm_base",
                advertised: 4,
                minimum: 5,
            }
        ));
        assert!(registry.binding(Capability::WmBase).is_none());
    }

    #[test]
    fn test_duplicate_global_is_bound_once() {
        let mut registry = uncapped();
        assert!(registry.on_global(1, "wl_shm", 2).unwrap().is_some());
        assert!(registry.on_global(9, "wl_shm", 2).unwrap().is_none());
        assert_eq!(registry.binding(Capability::Shm).unwrap().name, 1);
    }

    #[test]
    fn test_required_capabilities() {
        let mut registry = uncapped();
        assert!(matches!(
            registry.ensure_required(),
            Err(KansoError::MissingCapability("wl_compositor"))
        ));

        registry.on_global(1, "wl_compositor", 6).unwrap();
        registry.on_global(2, "wl_shm", 2).unwrap();
        assert!(matches!(
            registry.ensure_required(),
            Err(KansoError::MissingCapability("xdg_wm_base"))
        ));

        // The seat is optional.
        registry.on_global(3, "xdg_wm_base", 5).unwrap();
        assert!(registry.ensure_required().is_ok());
    }

    #[test]
    fn test_global_remove_keeps_binding() {
        let mut registry = uncapped();
        registry.on_global(5, "wl_seat", 8).unwrap();
        registry.on_global_remove(5);
        registry.on_global_remove(42);
        assert_eq!(registry.binding(Capability::Seat).unwrap().name, 5);
        assert_eq!(registry.bindings().len(), 1);
    }

    #[test]
    fn test_compiled_version_below_floor_is_fatal() {
        let mut registry = GlobalRegistry::new(|capability| match capability {
            Capability::WmBase => 4,
            _ => u32::MAX,
        });
        let err = registry.on_global(3, "xdg_wm_base", 7).unwrap_err();
        assert!(matches!(
            err,
            KansoError::VersionTooLow {
                interface: "xdg_wm_base",
                advertised: 4,
                minimum: 5,
            }
        ));
        assert!(registry.binding(Capability::WmBase).is_none());
    }

    #[test]
    fn test_shm_version_one_is_too_old() {
        let mut registry = uncapped();
        let err = registry.on_global(2, "wl_shm", 1).unwrap_err();
        assert!(matches!(
            err,
            KansoError::VersionTooLow {
                interface: "wl_shm",
                advertised: 1,
                minimum: 2,
            }
        ));
        let binding = registry.on_global(2, "wl_shm", 2).unwrap().unwrap();
        assert_eq!(binding.accepted_version, 2);
    }
}

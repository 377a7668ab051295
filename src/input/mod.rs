//! Seat input routing
//!
//! Tracks which input devices the seat currently offers and turns pointer
//! button presses into the engine's animation speed. Like the surface state
//! machine, the router only decides; the session owns the `wl_pointer` and
//! `wl_keyboard` objects and carries out the [`SeatRequest`]s.

use log::{debug, trace};

/// Linux evdev button codes as sent by `wl_pointer.button`.
pub const BTN_LEFT: u32 = 0x110;
pub const BTN_RIGHT: u32 = 0x111;
pub const BTN_MIDDLE: u32 = 0x112;

/// Speed magnitude set while a button is held.
pub const DEFAULT_SPEED: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other(u32),
}

impl MouseButton {
    pub fn from_code(code: u32) -> Self {
        match code {
            BTN_LEFT => MouseButton::Left,
            BTN_RIGHT => MouseButton::Right,
            BTN_MIDDLE => MouseButton::Middle,
            other => MouseButton::Other(other),
        }
    }
}

/// Devices advertised by `wl_seat.capabilities`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeatCapabilities {
    pub pointer: bool,
    pub keyboard: bool,
}

/// Device objects the session must acquire or release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatRequest {
    AcquireKeyboard,
    ReleaseKeyboard,
    AcquirePointer,
    ReleasePointer,
}

/// Pointer events, one variant per `wl_pointer` event kanso distinguishes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Enter { x: f64, y: f64 },
    Leave,
    Motion { x: f64, y: f64 },
    Button { button: MouseButton, pressed: bool },
    Axis { horizontal: bool, value: f64 },
    Frame,
}

/// Seat capability tracking and pointer-to-speed mapping.
#[derive(Debug, Clone)]
pub struct InputRouter {
    capabilities: SeatCapabilities,
    speed: i32,
}

impl Default for InputRouter {
    fn default() -> Self {
        Self::new(DEFAULT_SPEED)
    }
}

impl InputRouter {
    pub fn new(speed: i32) -> Self {
        Self {
            capabilities: SeatCapabilities::default(),
            speed,
        }
    }

    /// Diffs the new capabilities against the held devices.
    pub fn on_capabilities(&mut self, capabilities: SeatCapabilities) -> Vec<SeatRequest> {
        let held = self.capabilities;
        let mut requests = Vec::new();

        match (held.keyboard, capabilities.keyboard) {
            (false, true) => requests.push(SeatRequest::AcquireKeyboard),
            (true, false) => requests.push(SeatRequest::ReleaseKeyboard),
            _ => {}
        }
        match (held.pointer, capabilities.pointer) {
            (false, true) => requests.push(SeatRequest::AcquirePointer),
            (true, false) => requests.push(SeatRequest::ReleasePointer),
            _ => {}
        }

        debug!(
            "Seat capabilities: pointer={} keyboard={} -> {:?}",
            capabilities.pointer, capabilities.keyboard, requests
        );
        self.capabilities = capabilities;
        requests
    }

    /// Maps a pointer event to a new animation speed, if it sets one.
    pub fn on_pointer(&mut self, event: PointerEvent) -> Option<i32> {
        match event {
            PointerEvent::Button { button, pressed } => match button {
                MouseButton::Left => Some(if pressed { -self.speed } else { 0 }),
                MouseButton::Right => Some(if pressed { self.speed } else { 0 }),
                MouseButton::Middle | MouseButton::Other(_) => None,
            },
            PointerEvent::Motion { x, y } => {
                trace!("Pointer motion to ({x:.1}, {y:.1})");
                None
            }
            PointerEvent::Enter { .. }
            | PointerEvent::Leave
            | PointerEvent::Axis { .. }
            | PointerEvent::Frame => None,
        }
    }

    pub fn capabilities(&self) -> SeatCapabilities {
        self.capabilities
    }
}

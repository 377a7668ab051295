//! Listener callbacks for every protocol object kanso creates.

use super::Session;
use crate::input::{MouseButton, PointerEvent, SeatCapabilities};
use crate::window::SurfaceEvent;
use log::{debug, trace};
use wayland_client::protocol::{
    wl_buffer::WlBuffer,
    wl_callback::{self, WlCallback},
    wl_compositor::WlCompositor,
    wl_keyboard::WlKeyboard,
    wl_pointer::{self, WlPointer},
    wl_registry::{self, WlRegistry},
    wl_seat::{self, WlSeat},
    wl_shm::{self, WlShm},
    wl_shm_pool::WlShmPool,
    wl_surface::WlSurface,
};
use wayland_client::{Connection, Dispatch, QueueHandle, WEnum};
use wayland_protocols::xdg::shell::client::{
    xdg_surface::{self, XdgSurface},
    xdg_toplevel::{self, XdgToplevel},
    xdg_wm_base::{self, XdgWmBase},
};

impl Dispatch<WlRegistry, ()> for Session {
    fn event(
        state: &mut Session,
        registry: &WlRegistry,
        event: wl_registry::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Session>,
    ) {
        match event {
            wl_registry::Event::Global {
                name,
                interface,
                version,
            } => match state.registry.on_global(name, &interface, version) {
                Ok(Some(binding)) => state.bind_global(registry, binding),
                Ok(None) => {}
                Err(err) => state.fail(err),
            },
            wl_registry::Event::GlobalRemove { name } => {
                state.registry.on_global_remove(name);
            }
            _ => {}
        }
    }
}

impl Dispatch<WlShm, ()> for Session {
    fn event(
        _state: &mut Session,
        _shm: &WlShm,
        event: wl_shm::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Session>,
    ) {
        if let wl_shm::Event::Format { format } = event {
            trace!("Shared memory pixel format available: {:?}", format);
        }
    }
}

impl Dispatch<XdgWmBase, ()> for Session {
    fn event(
        _state: &mut Session,
        wm_base: &XdgWmBase,
        event: xdg_wm_base::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Session>,
    ) {
        if let xdg_wm_base::Event::Ping { serial } = event {
            trace!("Ping {} from the window manager", serial);
            wm_base.pong(serial);
        }
    }
}

impl Dispatch<XdgSurface, ()> for Session {
    fn event(
        state: &mut Session,
        _xdg_surface: &XdgSurface,
        event: xdg_surface::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Session>,
    ) {
        if let xdg_surface::Event::Configure { serial } = event {
            state.handle_surface_event(SurfaceEvent::SurfaceConfigure { serial });
        }
    }
}

impl Dispatch<XdgToplevel, ()> for Session {
    fn event(
        state: &mut Session,
        _toplevel: &XdgToplevel,
        event: xdg_toplevel::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Session>,
    ) {
        match event {
            xdg_toplevel::Event::Configure { width, height, .. } => {
                state.handle_surface_event(SurfaceEvent::ToplevelConfigure { width, height });
            }
            xdg_toplevel::Event::Close => {
                state.handle_surface_event(SurfaceEvent::CloseRequested);
            }
            xdg_toplevel::Event::ConfigureBounds { width, height } => {
                debug!("Toplevel bounds suggested: {}x{}", width, height);
            }
            _ => {}
        }
    }
}

impl Dispatch<WlCallback, ()> for Session {
    fn event(
        state: &mut Session,
        _callback: &WlCallback,
        event: wl_callback::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Session>,
    ) {
        if let wl_callback::Event::Done { callback_data } = event {
            state.handle_surface_event(SurfaceEvent::FrameDone {
                time: callback_data,
            });
        }
    }
}

impl Dispatch<WlSeat, ()> for Session {
    fn event(
        state: &mut Session,
        _seat: &WlSeat,
        event: wl_seat::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Session>,
    ) {
        match event {
            wl_seat::Event::Capabilities {
                capabilities: WEnum::Value(capabilities),
            } => {
                let capabilities = SeatCapabilities {
                    pointer: capabilities.contains(wl_seat::Capability::Pointer),
                    keyboard: capabilities.contains(wl_seat::Capability::Keyboard),
                };
                for request in state.input.on_capabilities(capabilities) {
                    state.execute_seat(request);
                }
            }
            wl_seat::Event::Name { name } => debug!("Seat name: {}", name),
            _ => {}
        }
    }
}

impl Dispatch<WlPointer, ()> for Session {
    fn event(
        state: &mut Session,
        _pointer: &WlPointer,
        event: wl_pointer::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Session>,
    ) {
        let Some(event) = pointer_event(event) else {
            return;
        };
        if let Some(speed) = state.input.on_pointer(event) {
            state.surface.set_animation_speed(speed);
        }
    }
}

fn pointer_event(event: wl_pointer::Event) -> Option<PointerEvent> {
    let event = match event {
        wl_pointer::Event::Enter {
            surface_x,
            surface_y,
            ..
        } => PointerEvent::Enter {
            x: surface_x,
            y: surface_y,
        },
        wl_pointer::Event::Leave { .. } => PointerEvent::Leave,
        wl_pointer::Event::Motion {
            surface_x,
            surface_y,
            ..
        } => PointerEvent::Motion {
            x: surface_x,
            y: surface_y,
        },
        wl_pointer::Event::Button { button, state, .. } => PointerEvent::Button {
            button: MouseButton::from_code(button),
            pressed: matches!(state, WEnum::Value(wl_pointer::ButtonState::Pressed)),
        },
        wl_pointer::Event::Axis { axis, value, .. } => PointerEvent::Axis {
            horizontal: matches!(axis, WEnum::Value(wl_pointer::Axis::HorizontalScroll)),
            value,
        },
        wl_pointer::Event::Frame => PointerEvent::Frame,
        _ => return None,
    };
    Some(event)
}

wayland_client::delegate_noop!(Session: ignore WlCompositor);
wayland_client::delegate_noop!(Session: ignore WlSurface);
wayland_client::delegate_noop!(Session: ignore WlShmPool);
wayland_client::delegate_noop!(Session: ignore WlBuffer);
wayland_client::delegate_noop!(Session: ignore WlKeyboard);

//! Wayland client session
//!
//! [`ServerConnection`] owns the socket and the event queue; [`Session`] is the
//! dispatch state every listener callback mutates. Callbacks translate protocol
//! events into [`SurfaceEvent`]s and [`PointerEvent`](crate::input::PointerEvent)s,
//! hand them to the pure state machines and carry out the requests they return
//! against the real protocol objects.
//!
//! Everything runs on one thread. The only place kanso waits is the blocking
//! dispatch in [`run`].

mod dispatch;
pub mod registry;

use crate::buffer::{BufferBackend, BufferGeometry, BufferPool, Size};
use crate::config::KansoConfig;
use crate::error::{KansoError, Result};
use crate::fatal;
use crate::input::{InputRouter, SeatRequest};
use crate::protocol::{Capability, CapabilityBinding};
use crate::renderer::{GradientRenderer, PixelFill};
use crate::window::{SurfaceEvent, SurfaceRequest, SurfaceState};
use log::{debug, info, warn};
use registry::GlobalRegistry;
use std::fs::File;
use std::os::fd::AsFd;
use wayland_client::protocol::{
    wl_buffer::WlBuffer, wl_compositor::WlCompositor, wl_keyboard::WlKeyboard,
    wl_pointer::WlPointer, wl_registry::WlRegistry, wl_seat::WlSeat, wl_shm, wl_shm::WlShm,
    wl_shm_pool::WlShmPool, wl_surface::WlSurface,
};
use wayland_client::{Connection, Dispatch, EventQueue, Proxy, QueueHandle};
use wayland_protocols::xdg::shell::client::{
    xdg_surface::XdgSurface, xdg_toplevel::XdgToplevel, xdg_wm_base::XdgWmBase,
};

/// Interface version compiled into the protocol bindings.
fn compiled_version(capability: Capability) -> u32 {
    match capability {
        Capability::Compositor => WlCompositor::interface().version,
        Capability::Shm => WlShm::interface().version,
        Capability::WmBase => XdgWmBase::interface().version,
        Capability::Seat => WlSeat::interface().version,
    }
}

/// `wl_shm` backed pixel buffers.
pub struct ShmBackend {
    shm: WlShm,
    qh: QueueHandle<Session>,
}

impl BufferBackend for ShmBackend {
    type Pool = WlShmPool;
    type Buffer = WlBuffer;

    fn create_pool(&mut self, memory: &File, size: i32) -> WlShmPool {
        self.shm.create_pool(memory.as_fd(), size, &self.qh, ())
    }

    fn create_buffer(&mut self, pool: &WlShmPool, geometry: &BufferGeometry) -> WlBuffer {
        pool.create_buffer(
            0,
            geometry.width,
            geometry.height,
            geometry.stride,
            wl_shm::Format::Xrgb8888,
            &self.qh,
            (),
        )
    }

    fn destroy_buffer(&mut self, buffer: WlBuffer) {
        buffer.destroy();
    }

    fn destroy_pool(&mut self, pool: WlShmPool) {
        pool.destroy();
    }
}

/// Bound global objects.
#[derive(Default)]
pub struct Globals {
    pub compositor: Option<WlCompositor>,
    pub shm: Option<WlShm>,
    pub wm_base: Option<XdgWmBase>,
    pub seat: Option<WlSeat>,
}

/// The toplevel window's protocol objects, in creation order.
struct Window {
    surface: WlSurface,
    xdg_surface: XdgSurface,
    toplevel: XdgToplevel,
}

/// Session options taken from the configuration.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub title: String,
    pub buffer_count: usize,
    pub default_size: Size,
    pub step: i32,
    pub speed: i32,
}

impl From<&KansoConfig> for SessionOptions {
    fn from(config: &KansoConfig) -> Self {
        Self {
            title: config.window.title.clone(),
            buffer_count: config.buffers.count,
            default_size: Size::new(config.window.default_width, config.window.default_height),
            step: config.render.step,
            speed: config.input.speed,
        }
    }
}

/// Dispatch state shared by every listener.
pub struct Session {
    qh: QueueHandle<Session>,
    registry: GlobalRegistry,
    globals: Globals,
    window: Option<Window>,
    pool: Option<BufferPool<ShmBackend>>,
    surface: SurfaceState,
    input: InputRouter,
    pointer: Option<WlPointer>,
    keyboard: Option<WlKeyboard>,
    renderer: Box<dyn PixelFill>,
    options: SessionOptions,
    /// First fatal error raised inside a listener.
    fatal: Option<KansoError>,
}

impl Session {
    pub fn new(qh: QueueHandle<Session>, options: SessionOptions) -> Self {
        Self {
            qh,
            registry: GlobalRegistry::new(compiled_version),
            globals: Globals::default(),
            window: None,
            pool: None,
            surface: SurfaceState::new(options.buffer_count, options.default_size),
            input: InputRouter::new(options.speed),
            pointer: None,
            keyboard: None,
            renderer: Box::new(GradientRenderer::new(options.step)),
            options,
            fatal: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.surface.is_running() && self.fatal.is_none()
    }

    /// Records a fatal error and stops the loop. Only the first one is kept.
    fn fail(&mut self, err: KansoError) {
        self.surface.stop();
        match self.fatal {
            None => self.fatal = Some(err),
            Some(_) => debug!("Suppressed follow-up error: {}", err),
        }
    }

    /// Surfaces an error recorded by a listener.
    fn take_fatal(&mut self) -> Result<()> {
        match self.fatal.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn bind_global(&mut self, registry: &WlRegistry, binding: CapabilityBinding) {
        let qh = &self.qh;
        match binding.capability {
            Capability::Compositor => self.globals.compositor = Some(bind(registry, &binding, qh)),
            Capability::Shm => self.globals.shm = Some(bind(registry, &binding, qh)),
            Capability::WmBase => self.globals.wm_base = Some(bind(registry, &binding, qh)),
            Capability::Seat => self.globals.seat = Some(bind(registry, &binding, qh)),
        }
    }

    /// Creates the surface, its xdg role and the buffer pool, then commits the
    /// initial buffer-less state.
    fn create_window(&mut self) -> Result<()> {
        self.registry.ensure_required()?;
        let (Some(compositor), Some(shm), Some(wm_base)) = (
            self.globals.compositor.as_ref(),
            self.globals.shm.as_ref(),
            self.globals.wm_base.as_ref(),
        ) else {
            return Err(KansoError::MissingCapability(Capability::Compositor.interface()));
        };

        let backend = ShmBackend {
            shm: shm.clone(),
            qh: self.qh.clone(),
        };
        self.pool = Some(BufferPool::new(
            backend,
            self.options.buffer_count,
            self.options.default_size,
        )?);

        let surface = compositor.create_surface(&self.qh, ());
        let xdg_surface = wm_base.get_xdg_surface(&surface, &self.qh, ());
        let toplevel = xdg_surface.get_toplevel(&self.qh, ());
        toplevel.set_title(self.options.title.clone());
        self.window = Some(Window {
            surface,
            xdg_surface,
            toplevel,
        });

        info!("🪟 Created toplevel window \"{}\"", self.options.title);
        self.handle_surface_event(SurfaceEvent::Created);
        Ok(())
    }

    fn handle_surface_event(&mut self, event: SurfaceEvent) {
        let requests = self.surface.handle(event);
        for request in requests {
            if let Err(err) = self.execute(request) {
                self.fail(err);
                return;
            }
        }
    }

    fn execute(&mut self, request: SurfaceRequest) -> Result<()> {
        let (window, pool) = require_window(self.window.as_ref(), self.pool.as_mut())?;

        match request {
            SurfaceRequest::SetupBuffers { width, height } => {
                pool.setup(width, height)?;
            }
            SurfaceRequest::AckConfigure { serial } => window.xdg_surface.ack_configure(serial),
            SurfaceRequest::RequestFrame => {
                window.surface.frame(&self.qh, ());
            }
            SurfaceRequest::Render { index } => {
                let speed = self.surface.animation_speed();
                let renderer = &mut self.renderer;
                pool.render(index, |pixels, geometry| {
                    renderer.fill(pixels, geometry.width, geometry.height, geometry.stride, speed)
                })?;
            }
            SurfaceRequest::Attach { index } => {
                let buffer = pool
                    .get(index)
                    .and_then(|buffer| buffer.handle())
                    .ok_or(KansoError::BufferNotAllocated(index))?;
                window.surface.attach(Some(buffer), 0, 0);
            }
            SurfaceRequest::DamageBuffer { width, height } => {
                window.surface.damage_buffer(0, 0, width, height)
            }
            SurfaceRequest::Commit => window.surface.commit(),
        }
        Ok(())
    }

    fn execute_seat(&mut self, request: SeatRequest) {
        let Some(seat) = self.globals.seat.as_ref() else {
            return;
        };
        match request {
            SeatRequest::AcquireKeyboard if self.keyboard.is_some() => {
                warn!("Keyboard acquired twice, keeping the first one")
            }
            SeatRequest::AcquirePointer if self.pointer.is_some() => {
                warn!("Pointer acquired twice, keeping the first one")
            }
            SeatRequest::AcquireKeyboard => self.keyboard = Some(seat.get_keyboard(&self.qh, ())),
            SeatRequest::AcquirePointer => self.pointer = Some(seat.get_pointer(&self.qh, ())),
            SeatRequest::ReleaseKeyboard => {
                if let Some(keyboard) = self.keyboard.take() {
                    keyboard.release();
                }
            }
            SeatRequest::ReleasePointer => {
                if let Some(pointer) = self.pointer.take() {
                    pointer.release();
                }
            }
        }
    }

    /// Destroys everything in reverse creation order.
    fn shutdown(&mut self) {
        if let Some(mut pool) = self.pool.take() {
            pool.teardown();
        }
        if let Some(window) = self.window.take() {
            window.toplevel.destroy();
            window.xdg_surface.destroy();
            window.surface.destroy();
        }
        if let Some(pointer) = self.pointer.take() {
            pointer.release();
        }
        if let Some(keyboard) = self.keyboard.take() {
            keyboard.release();
        }
        if let Some(seat) = self.globals.seat.take() {
            seat.release();
        }
        if let Some(wm_base) = self.globals.wm_base.take() {
            wm_base.destroy();
        }
        debug!("Session objects destroyed");
    }
}

/// Surface requests only exist once `create_window` has built both halves.
fn require_window<'a>(
    window: Option<&'a Window>,
    pool: Option<&'a mut BufferPool<ShmBackend>>,
) -> Result<(&'a Window, &'a mut BufferPool<ShmBackend>)> {
    match (window, pool) {
        (Some(window), Some(pool)) => Ok((window, pool)),
        _ => Err(KansoError::WindowNotCreated),
    }
}

fn bind<I>(registry: &WlRegistry, binding: &CapabilityBinding, qh: &QueueHandle<Session>) -> I
where
    I: Proxy + 'static,
    Session: Dispatch<I, ()>,
{
    registry.bind::<I, (), Session>(binding.name, binding.accepted_version, qh, ())
}

/// Connection to the display server.
pub struct ServerConnection {
    connection: Connection,
    queue: EventQueue<Session>,
    /// Owned for the lifetime of the connection.
    _registry: WlRegistry,
}

impl ServerConnection {
    /// Connects through `WAYLAND_DISPLAY` and requests the registry.
    pub fn connect() -> Result<Self> {
        let connection = Connection::connect_to_env()?;
        let queue = connection.new_event_queue();
        let registry = connection.display().get_registry(&queue.handle(), ());
        info!("🔌 Connected to the wayland display");
        Ok(Self {
            connection,
            queue,
            _registry: registry,
        })
    }

    pub fn handle(&self) -> QueueHandle<Session> {
        self.queue.handle()
    }

    /// Waits until the server has processed every request sent so far.
    pub fn roundtrip(&mut self, session: &mut Session) -> Result<()> {
        self.queue.roundtrip(session)?;
        session.take_fatal()
    }

    /// One loop iteration: dispatch a batch of events, then flush.
    pub fn dispatch(&mut self, session: &mut Session) -> Result<()> {
        self.queue.blocking_dispatch(session)?;
        session.take_fatal()?;
        self.connection.flush()?;
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        self.connection.flush()?;
        Ok(())
    }
}

/// Runs the presentation loop until the window is closed.
pub fn run(config: &KansoConfig) -> Result<()> {
    let result = present(config);
    if let Err(err) = &result {
        fatal!("{}", err);
    }
    result
}

fn present(config: &KansoConfig) -> Result<()> {
    let mut server = ServerConnection::connect()?;
    let mut session = Session::new(server.handle(), SessionOptions::from(config));

    server.roundtrip(&mut session)?;
    session.create_window()?;
    server.flush()?;

    while session.is_running() {
        server.dispatch(&mut session)?;
    }
    session.take_fatal()?;

    info!("👋 Window closed, shutting down");
    session.shutdown();
    server.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_requests_need_a_window() {
        let err = require_window(None, None).err().unwrap();
        assert!(matches!(err, KansoError::WindowNotCreated));
    }
}

//! Rotating shared-memory pixel buffers
//!
//! A [`BufferPool`] owns a fixed number of [`PixelBuffer`] slots. Every slot
//! pairs its own shared memory object with a pool and a single presentable
//! buffer created through a [`BufferBackend`], which is the seam to the
//! display server's `wl_shm` protocol objects.
//!
//! # Memory lifetime
//!
//! Backing memory is mapped only while a slot is being rendered into
//! ([`BufferPool::render`]) and unmapped before the call returns, so no
//! mapping survives past the point where the buffer is handed to the server.
//!
//! # Selection
//!
//! [`select_next`] picks the slot for a new frame so that the one most recently
//! rendered, which may still be waiting to be shown, is never overwritten.

use crate::error::{KansoError, Result};
use log::{debug, info};
use memmap2::MmapMut;
use std::fs::File;

/// Packed 32-bit BGRX pixels.
pub const BYTES_PER_PIXEL: i32 = 4;

/// Slots per surface.
pub const DEFAULT_BUFFER_COUNT: usize = 3;

/// Surface size used until the server suggests one.
pub const STD_WIDTH: i32 = 1280;
pub const STD_HEIGHT: i32 = 720;

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// A size the server left for the client to decide.
    pub fn is_unset(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

impl Default for Size {
    fn default() -> Self {
        Self::new(STD_WIDTH, STD_HEIGHT)
    }
}

/// Layout of one pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferGeometry {
    pub width: i32,
    pub height: i32,
    /// Bytes per row
    pub stride: i32,
    /// Total bytes
    pub size: usize,
}

impl BufferGeometry {
    /// Geometry for `width` x `height`, falling back to `fallback` when either
    /// dimension is zero.
    pub fn resolve(width: i32, height: i32, fallback: Size) -> Result<Self> {
        let requested = Size::new(width, height);
        let Size { width, height } = if requested.is_unset() {
            fallback
        } else {
            requested
        };

        let stride = width
            .checked_mul(BYTES_PER_PIXEL)
            .ok_or(KansoError::BufferTooLarge { width, height })?;
        let size = stride
            .checked_mul(height)
            .ok_or(KansoError::BufferTooLarge { width, height })?;

        Ok(Self {
            width,
            height,
            stride,
            size: size as usize,
        })
    }

    pub fn dimensions(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// Creates and destroys the server-side objects behind a pixel buffer.
pub trait BufferBackend {
    type Pool;
    type Buffer;

    fn create_pool(&mut self, memory: &File, size: i32) -> Self::Pool;
    fn create_buffer(&mut self, pool: &Self::Pool, geometry: &BufferGeometry) -> Self::Buffer;
    fn destroy_buffer(&mut self, buffer: Self::Buffer);
    fn destroy_pool(&mut self, pool: Self::Pool);
}

/// One slot of the rotating pool.
pub struct PixelBuffer<B: BufferBackend> {
    geometry: BufferGeometry,
    memory: Option<File>,
    pool: Option<B::Pool>,
    buffer: Option<B::Buffer>,
}

impl<B: BufferBackend> PixelBuffer<B> {
    fn empty() -> Self {
        Self {
            geometry: BufferGeometry {
                width: 0,
                height: 0,
                stride: 0,
                size: 0,
            },
            memory: None,
            pool: None,
            buffer: None,
        }
    }

    pub fn geometry(&self) -> &BufferGeometry {
        &self.geometry
    }

    /// The presentable buffer, absent once the backing memory is released.
    pub fn handle(&self) -> Option<&B::Buffer> {
        self.buffer.as_ref()
    }

    pub fn is_allocated(&self) -> bool {
        self.memory.is_some() && self.buffer.is_some()
    }

    fn teardown(&mut self, backend: &mut B) {
        if let Some(buffer) = self.buffer.take() {
            backend.destroy_buffer(buffer);
        }
        if let Some(pool) = self.pool.take() {
            backend.destroy_pool(pool);
        }
        self.memory = None;
    }

    fn construct(
        &mut self,
        geometry: BufferGeometry,
        allocate: &mut impl FnMut(usize) -> Result<File>,
        backend: &mut B,
    ) -> Result<()> {
        let pool_size = i32::try_from(geometry.size).map_err(|_| KansoError::BufferTooLarge {
            width: geometry.width,
            height: geometry.height,
        })?;

        self.geometry = geometry;
        let memory = allocate(geometry.size)?;
        let pool = backend.create_pool(&memory, pool_size);
        self.buffer = Some(backend.create_buffer(&pool, &geometry));
        self.pool = Some(pool);
        self.memory = Some(memory);
        Ok(())
    }
}

/// Fixed-size set of pixel buffers for one surface.
pub struct BufferPool<B: BufferBackend> {
    buffers: Vec<PixelBuffer<B>>,
    backend: B,
    fallback: Size,
    allocate: Box<dyn FnMut(usize) -> Result<File>>,
}

impl<B: BufferBackend> BufferPool<B> {
    /// Creates `count` empty slots. At least two are needed to ever render
    /// into a buffer the server is not showing.
    pub fn new(backend: B, count: usize, fallback: Size) -> Result<Self> {
        Self::with_allocator(backend, count, fallback, crate::shm::allocate)
    }

    /// Like [`BufferPool::new`], with a custom shared memory allocator.
    pub fn with_allocator<A>(backend: B, count: usize, fallback: Size, allocate: A) -> Result<Self>
    where
        A: FnMut(usize) -> Result<File> + 'static,
    {
        if count < 2 {
            return Err(KansoError::InvalidBufferCount(count));
        }
        Ok(Self {
            buffers: (0..count).map(|_| PixelBuffer::empty()).collect(),
            backend,
            fallback,
            allocate: Box::new(allocate),
        })
    }

    /// Tears every slot down and rebuilds all of them at `width` x `height`.
    ///
    /// Either every slot holds a fresh buffer afterwards, or the call fails and
    /// every slot is empty.
    pub fn setup(&mut self, width: i32, height: i32) -> Result<BufferGeometry> {
        self.teardown();

        let geometry = BufferGeometry::resolve(width, height, self.fallback)?;
        for index in 0..self.buffers.len() {
            let result =
                self.buffers[index].construct(geometry, &mut self.allocate, &mut self.backend);
            if let Err(err) = result {
                self.teardown();
                return Err(err);
            }
            debug!("Pixel buffer {} ready ({} bytes)", index, geometry.size);
        }

        info!(
            "🖼️ {} pixel buffers set up at {}x{} (stride {})",
            self.buffers.len(),
            geometry.width,
            geometry.height,
            geometry.stride
        );
        Ok(geometry)
    }

    /// Releases every slot: buffer, then pool, then memory.
    pub fn teardown(&mut self) {
        for buffer in &mut self.buffers {
            buffer.teardown(&mut self.backend);
        }
    }

    /// Maps slot `index`, hands its pixels to `fill` and unmaps it again.
    pub fn render<F>(&self, index: usize, fill: F) -> Result<()>
    where
        F: FnOnce(&mut [u8], &BufferGeometry),
    {
        let buffer = self
            .buffers
            .get(index)
            .filter(|buffer| buffer.is_allocated())
            .ok_or(KansoError::BufferNotAllocated(index))?;
        let memory = buffer
            .memory
            .as_ref()
            .ok_or(KansoError::BufferNotAllocated(index))?;

        // SAFETY: the memory object is private to this process (unlinked at
        // creation) and the server only reads it after the next commit.
        let mut map = unsafe { MmapMut::map_mut(memory)? };
        let len = buffer.geometry.size.min(map.len());
        fill(&mut map[..len], &buffer.geometry);
        drop(map);
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&PixelBuffer<B>> {
        self.buffers.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PixelBuffer<B>> {
        self.buffers.iter()
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Geometry shared by all slots, if they are allocated.
    pub fn geometry(&self) -> Option<BufferGeometry> {
        self.buffers
            .first()
            .filter(|buffer| buffer.is_allocated())
            .map(|buffer| buffer.geometry)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: BufferBackend> Drop for BufferPool<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Picks the slot to render the next frame into.
///
/// With nothing attached yet this is slot 0. Otherwise the slots after the
/// attached one are probed in order and the first that is not the most
/// recently rendered wins. When every probe hits the most recently rendered
/// slot (only possible with two slots) the attached slot is reused instead.
///
/// # Panics
///
/// Panics if `count < 2`.
pub fn select_next(active: Option<usize>, last_rendered: Option<usize>, count: usize) -> usize {
    assert!(count >= 2, "invalid number of buffers being used: {count}");

    let Some(active) = active else {
        return 0;
    };
    (1..count)
        .map(|step| (active + step) % count)
        .find(|&candidate| Some(candidate) != last_rendered)
        .unwrap_or(active % count)
}

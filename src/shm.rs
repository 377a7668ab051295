//! Anonymous POSIX shared memory for pixel buffers
//!
//! Objects are created under a randomized name with `O_EXCL`, unlinked right
//! away and sized with `ftruncate`. The returned [`File`] is the only way to
//! reach the memory; no other process can open it by name.

use crate::error::{KansoError, Result};
use log::{debug, trace, warn};
use std::ffi::CString;
use std::fs::File;
use std::io;
use std::os::fd::{FromRawFd, OwnedFd};

/// Number of names tried before giving up.
pub const MAX_ATTEMPTS: u32 = 16;

/// Name template; every placeholder byte is replaced by a random letter.
const NAME_TEMPLATE: &str = "/kanso_shm_$$$$$$$$";
const PLACEHOLDER: u8 = b'$';

/// Below this much entropy a fresh seed is drawn before the next letter.
const RESEED_THRESHOLD: u64 = 0b10_0000;

/// Bits consumed per generated letter.
const BITS_PER_LETTER: u32 = 5;

/// Source of seeds for name randomization.
pub trait EntropySource {
    fn seed(&mut self) -> io::Result<u64>;
}

/// Seeds from `CLOCK_MONOTONIC`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl EntropySource for MonotonicClock {
    fn seed(&mut self) -> io::Result<u64> {
        let mut now = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        // SAFETY: `now` is a valid, writable timespec for the duration of the call.
        if unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut now) } < 0 {
            return Err(io::Error::last_os_error());
        }
        let nanos = now.tv_nsec as u64;
        Ok(nanos.wrapping_mul(nanos) ^ now.tv_sec as u64)
    }
}

/// Creates shared memory objects for pixel buffers.
#[derive(Debug)]
pub struct ShmAllocator<E = MonotonicClock> {
    entropy_source: E,
    entropy: u64,
}

impl Default for ShmAllocator<MonotonicClock> {
    fn default() -> Self {
        Self::new(MonotonicClock)
    }
}

impl<E: EntropySource> ShmAllocator<E> {
    pub fn new(entropy_source: E) -> Self {
        Self {
            entropy_source,
            entropy: 0,
        }
    }

    /// Creates an unlinked shared memory object of `size` bytes.
    ///
    /// A name collision or an unreadable clock consumes one attempt; any other
    /// OS failure is returned immediately.
    pub fn allocate(&mut self, size: usize) -> Result<File> {
        for attempt in 1..=MAX_ATTEMPTS {
            let mut name = NAME_TEMPLATE.as_bytes().to_vec();
            if let Err(err) = self.randomize(&mut name) {
                warn!("Couldn't read the clock to randomize a shm name (attempt {attempt}): {err}");
                continue;
            }

            match open_exclusive(&name) {
                Ok(fd) => {
                    unlink(&name);
                    let file = File::from(fd);
                    file.set_len(size as u64)?;
                    debug!(
                        "Created shm object {} ({} bytes) on attempt {}",
                        String::from_utf8_lossy(&name),
                        size,
                        attempt
                    );
                    return Ok(file);
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    trace!(
                        "shm name {} already taken, retrying",
                        String::from_utf8_lossy(&name)
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(KansoError::ShmExhausted {
            attempts: MAX_ATTEMPTS,
        })
    }

    /// Replaces every placeholder in `name` with a letter from `A..=P` or `a..=p`.
    fn randomize(&mut self, name: &mut [u8]) -> io::Result<()> {
        for byte in name.iter_mut() {
            if self.entropy <= RESEED_THRESHOLD {
                self.entropy = self.entropy_source.seed()?;
            }
            if *byte == PLACEHOLDER {
                *byte = letter(self.entropy);
                self.entropy >>= BITS_PER_LETTER;
            }
        }
        Ok(())
    }
}

/// Convenience wrapper over a clock-seeded [`ShmAllocator`].
pub fn allocate(size: usize) -> Result<File> {
    ShmAllocator::default().allocate(size)
}

/// Low four bits pick the letter, bit four picks the case.
fn letter(bits: u64) -> u8 {
    b'A' + (((bits & 0b1_0000) << 1) | (bits & 0b0_1111)) as u8
}

fn open_exclusive(name: &[u8]) -> io::Result<OwnedFd> {
    let c_name = CString::new(name).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    // SAFETY: `c_name` is a valid NUL-terminated string.
    let fd = unsafe {
        libc::shm_open(
            c_name.as_ptr(),
            libc::O_RDWR | libc::O_CREAT | libc::O_EXCL | libc::O_CLOEXEC,
            (libc::S_IRUSR | libc::S_IWUSR) as libc::mode_t,
        )
    };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: `fd` was just returned by shm_open and is owned by nobody else.
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

fn unlink(name: &[u8]) {
    if let Ok(c_name) = CString::new(name) {
        // SAFETY: `c_name` is a valid NUL-terminated string.
        unsafe { libc::shm_unlink(c_name.as_ptr()) };
    }
}

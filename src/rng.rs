use std::sync::Mutex;

use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};

/// Process-wide random source.
///
/// Normally backed by a seeded PRNG. For reproducible runs it can be
/// switched into a deterministic counter mode where every draw returns
/// the next value of a simple sequence: `range(min, max)` yields
/// `seq++ % (max - min + 1) + min` and byte fills write `0, 1, 2, ...`.
///
/// All methods take `&self`; the state sits behind a mutex so the
/// source can be shared through the compile [`Context`](crate::Context).
pub struct Rng {
    mode: Mutex<Mode>,
}

enum Mode {
    Pseudo(SmallRng),
    Counter(u64),
}

impl Rng {
    /// Pseudo-random source seeded from the OS.
    pub fn new() -> Rng {
        Rng {
            mode: Mutex::new(Mode::Pseudo(SmallRng::from_entropy())),
        }
    }

    /// Deterministic counter mode starting at `start`.
    pub fn counter(start: u64) -> Rng {
        Rng {
            mode: Mutex::new(Mode::Counter(start)),
        }
    }

    /// True if the source is in deterministic counter mode.
    pub fn is_counter(&self) -> bool {
        matches!(*self.mode.lock().unwrap(), Mode::Counter(_))
    }

    fn next(&self) -> u64 {
        let mut mode = self.mode.lock().unwrap();
        match &mut *mode {
            Mode::Pseudo(rng) => rng.next_u64(),
            Mode::Counter(seq) => {
                let v = *seq;
                *seq = seq.wrapping_add(1);
                v
            }
        }
    }

    /// Uniform value in `[min, max]` (inclusive on both ends).
    ///
    /// When `min..=max` spans the entire 64 bit range the raw draw is
    /// returned unmodified (the reduction would divide by zero).
    pub fn range_u64(&self, min: u64, max: u64) -> u64 {
        debug_assert!(min <= max);
        let r = self.next();
        let range = max.wrapping_sub(min).wrapping_add(1);
        if range == 0 {
            r
        } else {
            (r % range).wrapping_add(min)
        }
    }

    /// Uniform value in `[min, max]`.
    pub fn range_u32(&self, min: u32, max: u32) -> u32 {
        self.range_u64(min as u64, max as u64) as u32
    }

    /// Uniform value in `[min, max]`.
    pub fn range_u16(&self, min: u16, max: u16) -> u16 {
        self.range_u64(min as u64, max as u64) as u16
    }

    /// Uniform value in `[min, max]`.
    pub fn range_u8(&self, min: u8, max: u8) -> u8 {
        self.range_u64(min as u64, max as u64) as u8
    }

    /// Full-range random u8.
    pub fn u8(&self) -> u8 {
        self.next() as u8
    }

    /// Full-range random u32.
    pub fn u32(&self) -> u32 {
        self.next() as u32
    }

    /// Full-range random u64.
    pub fn u64(&self) -> u64 {
        self.next()
    }

    /// Fill `buf` with random bytes.
    ///
    /// In counter mode the buffer is filled with `0, 1, 2, ...` so
    /// generated payloads are recognizable in captures.
    pub fn fill(&self, buf: &mut [u8]) {
        let mut mode = self.mode.lock().unwrap();
        match &mut *mode {
            Mode::Pseudo(rng) => rng.fill_bytes(buf),
            Mode::Counter(_) => {
                for (n, b) in buf.iter_mut().enumerate() {
                    *b = n as u8;
                }
            }
        }
    }
}

impl Default for Rng {
    fn default() -> Rng {
        Rng::new()
    }
}

impl core::fmt::Debug for Rng {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match *self.mode.lock().unwrap() {
            Mode::Pseudo(_) => write!(f, "Rng::Pseudo"),
            Mode::Counter(seq) => write!(f, "Rng::Counter({seq})"),
        }
    }
}

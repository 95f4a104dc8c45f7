//! Blocking byte ring between the isochronous pipeline and the caller
//!
//! Single producer, single consumer. For a receive stream the transfer
//! completion callback produces and the application consumes; for a
//! transmit stream the roles flip. The callback side never blocks: it uses
//! the try variants and accounts for dropped bytes on overflow. The
//! application side waits with a caller-chosen timeout. `shutdown` wakes
//! every waiter so close never hangs.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{Error, Result};

pub struct ByteRing {
    state: Mutex<RingState>,
    not_empty: Condvar,
    not_full: Condvar,
}

struct RingState {
    buf: VecDeque<u8>,
    capacity: usize,
    shutdown: bool,
    dropped: u64,
}

impl ByteRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(RingState {
                buf: VecDeque::with_capacity(capacity),
                capacity,
                shutdown: false,
                dropped: 0,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, RingState>> {
        self.state
            .lock()
            .map_err(|_| Error::Host("ring lock poisoned".into()))
    }

    pub fn len(&self) -> usize {
        self.lock().map(|s| s.buf.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes discarded so far because the consumer fell behind
    pub fn dropped_bytes(&self) -> u64 {
        self.lock().map(|s| s.dropped).unwrap_or(0)
    }

    /// All-or-nothing non-blocking push for completion-callback context.
    /// Overflow drops the whole packet; partial audio frames are worthless.
    pub fn try_push(&self, data: &[u8]) -> bool {
        let Ok(mut state) = self.lock() else {
            return false;
        };
        if state.shutdown {
            return false;
        }
        if state.buf.len() + data.len() > state.capacity {
            state.dropped += data.len() as u64;
            debug!(
                packet = data.len(),
                dropped = state.dropped,
                "ring full, packet dropped"
            );
            return false;
        }
        state.buf.extend(data.iter().copied());
        self.not_empty.notify_one();
        true
    }

    /// Push the whole slice, waiting for space up to `timeout`
    pub fn push_timeout(&self, data: &[u8], timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock()?;
        if data.len() > state.capacity {
            return Err(Error::InvalidArg("write larger than ring capacity"));
        }
        loop {
            if state.shutdown {
                return Err(Error::InvalidState("ring shut down"));
            }
            if state.buf.len() + data.len() <= state.capacity {
                state.buf.extend(data.iter().copied());
                self.not_empty.notify_one();
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout("ring full"));
            }
            let (next, _) = self
                .not_full
                .wait_timeout(state, deadline - now)
                .map_err(|_| Error::Host("ring lock poisoned".into()))?;
            state = next;
        }
    }

    /// Non-blocking pop of up to `out.len()` bytes, for callback context
    pub fn try_pop(&self, out: &mut [u8]) -> usize {
        let Ok(mut state) = self.lock() else {
            return 0;
        };
        let n = Self::drain(&mut state, out);
        if n > 0 {
            self.not_full.notify_one();
        }
        n
    }

    /// Pop up to `out.len()` bytes, waiting up to `timeout` for the first
    /// byte. Returns 0 on timeout and after shutdown.
    pub fn pop_timeout(&self, out: &mut [u8], timeout: Duration) -> Result<usize> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock()?;
        loop {
            if !state.buf.is_empty() {
                let n = Self::drain(&mut state, out);
                self.not_full.notify_one();
                return Ok(n);
            }
            if state.shutdown {
                return Ok(0);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(0);
            }
            let (next, _) = self
                .not_empty
                .wait_timeout(state, deadline - now)
                .map_err(|_| Error::Host("ring lock poisoned".into()))?;
            state = next;
        }
    }

    fn drain(state: &mut RingState, out: &mut [u8]) -> usize {
        let n = out.len().min(state.buf.len());
        for slot in out.iter_mut().take(n) {
            // The length check above guarantees n pops succeed
            if let Some(byte) = state.buf.pop_front() {
                *slot = byte;
            }
        }
        n
    }

    /// Discard all buffered bytes
    pub fn flush(&self) {
        if let Ok(mut state) = self.lock() {
            state.buf.clear();
            self.not_full.notify_all();
        }
    }

    /// Wake every waiter and fail all further pushes; pops drain what is
    /// left and then return 0
    pub fn shutdown(&self) {
        if let Ok(mut state) = self.lock() {
            state.shutdown = true;
            self.not_empty.notify_all();
            self.not_full.notify_all();
        }
    }
}

//! Bounded-wait locking
//!
//! Serializes the slow paths (state transitions, control requests) without
//! letting a stuck caller block everyone else forever: acquisition gives up
//! after a deadline and surfaces `Error::Timeout`.

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// A mutex whose lock acquisition waits at most a caller-chosen duration.
///
/// The value is parked in an inner slot and moved into the guard, so the
/// plain mutex is only held for the brief take/put; holders of the guard
/// never keep the inner mutex locked.
pub struct TimedMutex<T> {
    slot: Mutex<Option<T>>,
    available: Condvar,
}

/// Guard returning the value to the mutex on drop
pub struct TimedGuard<'a, T> {
    mutex: &'a TimedMutex<T>,
    value: Option<T>,
}

impl<T> TimedMutex<T> {
    pub fn new(value: T) -> Self {
        Self {
            slot: Mutex::new(Some(value)),
            available: Condvar::new(),
        }
    }

    /// Acquire the lock, waiting up to `timeout`
    pub fn lock_timeout(&self, timeout: Duration) -> Result<TimedGuard<'_, T>> {
        let deadline = Instant::now() + timeout;
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| Error::Host("lock poisoned".into()))?;
        loop {
            if let Some(value) = slot.take() {
                return Ok(TimedGuard {
                    mutex: self,
                    value: Some(value),
                });
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout("lock busy"));
            }
            let (next, _) = self
                .available
                .wait_timeout(slot, deadline - now)
                .map_err(|_| Error::Host("lock poisoned".into()))?;
            slot = next;
        }
    }
}

impl<T> TimedGuard<'_, T> {
    pub fn get(&self) -> &T {
        // The option is only emptied on drop
        self.value.as_ref().unwrap_or_else(|| unreachable!())
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.value.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl<T> Drop for TimedGuard<'_, T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take()
            && let Ok(mut slot) = self.mutex.slot.lock()
        {
            *slot = Some(value);
            self.mutex.available.notify_one();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_lock_and_release() {
        let m = TimedMutex::new(5u32);
        {
            let mut guard = m.lock_timeout(Duration::from_millis(10)).unwrap();
            *guard.get_mut() += 1;
        }
        let guard = m.lock_timeout(Duration::from_millis(10)).unwrap();
        assert_eq!(*guard.get(), 6);
    }

    #[test]
    fn test_contended_lock_times_out() {
        let m = Arc::new(TimedMutex::new(()));
        let held = m.lock_timeout(Duration::from_millis(10)).unwrap();
        let m2 = Arc::clone(&m);
        let result = thread::spawn(move || {
            m2.lock_timeout(Duration::from_millis(50))
                .map(|_| ())
                .is_err()
        })
        .join()
        .unwrap();
        assert!(result);
        drop(held);
        assert!(m.lock_timeout(Duration::from_millis(10)).is_ok());
    }
}

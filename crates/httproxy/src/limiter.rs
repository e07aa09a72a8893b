//! Non-blocking admission control: a fixed pool of permits handed out
//! without ever suspending the caller. When the pool is full the caller
//! sheds the connection instead of queueing it — load-shedding, not
//! back-pressure.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Clone)]
pub struct ConnectionLimiter {
    inner: Arc<Inner>,
}

struct Inner {
    capacity: usize,
    in_use: AtomicUsize,
}

/// Held for the lifetime of one connection; releases its slot on drop.
pub struct Permit {
    inner: Arc<Inner>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.inner.in_use.fetch_sub(1, Ordering::AcqRel);
    }
}

impl ConnectionLimiter {
    pub fn new(capacity: usize) -> Self {
        ConnectionLimiter {
            inner: Arc::new(Inner {
                capacity,
                in_use: AtomicUsize::new(0),
            }),
        }
    }

    /// Attempts to acquire a permit without blocking. Returns `None` when
    /// the pool is already at capacity.
    pub fn try_acquire(&self) -> Option<Permit> {
        let mut current = self.inner.in_use.load(Ordering::Acquire);
        loop {
            if current >= self.inner.capacity {
                return None;
            }
            match self.inner.in_use.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return Some(Permit {
                        inner: self.inner.clone(),
                    })
                }
                Err(observed) => current = observed,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sheds_past_capacity() {
        let limiter = ConnectionLimiter::new(2);
        let a = limiter.try_acquire();
        let b = limiter.try_acquire();
        let c = limiter.try_acquire();
        assert!(a.is_some());
        assert!(b.is_some());
        assert!(c.is_none());
    }

    #[test]
    fn releases_on_drop() {
        let limiter = ConnectionLimiter::new(1);
        {
            let _a = limiter.try_acquire().unwrap();
            assert!(limiter.try_acquire().is_none());
        }
        assert!(limiter.try_acquire().is_some());
    }

    #[test]
    fn zero_capacity_always_sheds() {
        let limiter = ConnectionLimiter::new(0);
        assert!(limiter.try_acquire().is_none());
    }
}

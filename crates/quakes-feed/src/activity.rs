//! Reference-counted "network busy" state.
//!
//! Each in-flight request holds an [`ActivityGuard`]. The visible indicator
//! is on while at least one guard is alive and switches off only when the
//! last one drops. Counter and indicator are updated under the watch
//! channel's lock so concurrent acquire/release cannot leave it stuck.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug)]
struct ActivityInner {
    in_flight: AtomicUsize,
    visible: watch::Sender<bool>,
}

/// Shared handle to the process-wide activity counter.
#[derive(Debug, Clone)]
pub struct NetworkActivity {
    inner: Arc<ActivityInner>,
}

impl Default for NetworkActivity {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkActivity {
    #[must_use]
    pub fn new() -> Self {
        let (visible, _) = watch::channel(false);
        Self {
            inner: Arc::new(ActivityInner {
                in_flight: AtomicUsize::new(0),
                visible,
            }),
        }
    }

    /// Marks one request as in flight until the returned guard drops.
    #[must_use]
    pub fn acquire(&self) -> ActivityGuard {
        self.inner.adjust(true);
        ActivityGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_visible(&self) -> bool {
        *self.inner.visible.borrow()
    }

    /// Receives indicator transitions (`true` when busy).
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.visible.subscribe()
    }
}

impl ActivityInner {
    fn adjust(&self, increment: bool) {
        self.visible.send_if_modified(|visible| {
            let now = if increment {
                self.in_flight.fetch_add(1, Ordering::AcqRel) + 1
            } else {
                match self
                    .in_flight
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
                {
                    Ok(previous) => previous - 1,
                    Err(_) => 0,
                }
            };
            let busy = now > 0;
            if *visible == busy {
                false
            } else {
                *visible = busy;
                true
            }
        });
    }
}

/// Releases its slot exactly once, on drop.
#[derive(Debug)]
pub struct ActivityGuard {
    inner: Arc<ActivityInner>,
}

impl Drop for ActivityGuard {
    fn drop(&mut self) {
        self.inner.adjust(false);
    }
}

//! A process-wide termination barrier.
//!
//! Counts peers that have finished their iteration count and releases them
//! all together, rather than relying on package-level global state as the
//! algorithm's original implementation did.

use std::sync::Arc;

use tokio::sync::{Mutex, Notify};

#[derive(Debug)]
struct Inner {
    arrived: u32,
}

#[derive(Debug)]
pub struct Barrier {
    total: u32,
    inner: Mutex<Inner>,
    notify: Notify,
}

impl Barrier {
    pub fn new(total: u32) -> Arc<Self> {
        Arc::new(Barrier {
            total,
            inner: Mutex::new(Inner { arrived: 0 }),
            notify: Notify::new(),
        })
    }

    /// Blocks until every one of `total` peers has called this once.
    pub async fn arrive_and_wait(&self) {
        if self.total == 0 {
            return;
        }

        {
            let mut inner = self.inner.lock().await;
            inner.arrived += 1;
            if inner.arrived >= self.total {
                self.notify.notify_waiters();
                return;
            }
        }

        loop {
            let notified = self.notify.notified();
            {
                let inner = self.inner.lock().await;
                if inner.arrived >= self.total {
                    return;
                }
            }
            notified.await;
        }
    }
}

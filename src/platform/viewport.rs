/// Viewport primitives: container geometry and resize notifications

use std::sync::{Arc, Mutex, Weak};

/// Size of the box the preview is laid out in, in CSS-like pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainerSize {
    pub width: f64,
    pub height: f64,
}

impl ContainerSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

type ResizeHandler = Arc<dyn Fn(ContainerSize) + Send + Sync>;

struct Listeners {
    next_id: u64,
    handlers: Vec<(u64, ResizeHandler)>,
    last: Option<ContainerSize>,
}

/// Source of resize events for one window/container.
///
/// Cloning yields another handle to the same source.
#[derive(Clone)]
pub struct ResizeEvents {
    inner: Arc<Mutex<Listeners>>,
}

impl ResizeEvents {
    pub fn new() -> Self {
        ResizeEvents {
            inner: Arc::new(Mutex::new(Listeners {
                next_id: 0,
                handlers: Vec::new(),
                last: None,
            })),
        }
    }

    /// Register a handler; it stays attached until the returned
    /// `Subscription` is dropped.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(ContainerSize) + Send + Sync + 'static,
    {
        let mut l = lock(&self.inner);
        let id = l.next_id;
        l.next_id += 1;
        l.handlers.push((id, Arc::new(handler)));
        Subscription {
            id,
            source: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver a new container size to every attached handler
    pub fn emit(&self, size: ContainerSize) {
        let handlers: Vec<ResizeHandler> = {
            let mut l = lock(&self.inner);
            l.last = Some(size);
            l.handlers.iter().map(|(_, h)| h.clone()).collect()
        };
        // Handlers run outside the lock so they may subscribe or unsubscribe.
        for h in handlers {
            h(size);
        }
    }

    /// Most recently emitted size
    pub fn current(&self) -> Option<ContainerSize> {
        lock(&self.inner).last
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.inner).handlers.len()
    }
}

impl Default for ResizeEvents {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard for an attached resize handler; dropping it detaches the handler
pub struct Subscription {
    id: u64,
    source: Weak<Mutex<Listeners>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.source.upgrade() {
            lock(&inner).handlers.retain(|(id, _)| *id != self.id);
        }
    }
}

fn lock(m: &Mutex<Listeners>) -> std::sync::MutexGuard<'_, Listeners> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

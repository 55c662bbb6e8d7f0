//! Eviction notifications.
//!
//! Listeners are called synchronously, in registration order, after the
//! cache has dropped the features and revoked their regions.

use crate::types::Envelope;

/// Why features left the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// The cache was full and the eviction policy picked a victim.
    Capacity,
    /// [`SpatialCache::evict`](crate::SpatialCache::evict) was called.
    Manual,
    /// [`SpatialCache::remove`](crate::SpatialCache::remove) was called.
    Removed,
}

/// Features dropped in one eviction round.
#[derive(Debug, Clone, PartialEq)]
pub struct EvictionEvent {
    pub type_name: String,
    pub ids: Vec<String>,
    /// Area whose tracked regions were revoked.
    pub envelope: Option<Envelope>,
    pub reason: EvictionReason,
}

/// Subscriber for eviction events.
pub trait EvictionListener: Send {
    fn on_eviction(&mut self, event: &EvictionEvent);
}

impl<F> EvictionListener for F
where
    F: FnMut(&EvictionEvent) + Send,
{
    fn on_eviction(&mut self, event: &EvictionEvent) {
        self(event)
    }
}

/// Ordered subscriber list.
#[derive(Default)]
pub(crate) struct Listeners {
    inner: Vec<Box<dyn EvictionListener>>,
}

impl Listeners {
    pub(crate) fn push(&mut self, listener: Box<dyn EvictionListener>) {
        self.inner.push(listener);
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.len()
    }

    pub(crate) fn notify(&mut self, event: &EvictionEvent) {
        for listener in &mut self.inner {
            listener.on_eviction(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_listeners_run_in_registration_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut listeners = Listeners::default();
        for name in ["first", "second", "third"] {
            let calls = calls.clone();
            listeners.push(Box::new(move |event: &EvictionEvent| {
                calls.lock().unwrap().push((name, event.ids.len()));
            }));
        }
        assert_eq!(listeners.len(), 3);

        listeners.notify(&EvictionEvent {
            type_name: "poi".to_string(),
            ids: vec!["a".to_string(), "b".to_string()],
            envelope: None,
            reason: EvictionReason::Manual,
        });
        assert_eq!(
            *calls.lock().unwrap(),
            vec![("first", 2), ("second", 2), ("third", 2)]
        );
    }
}

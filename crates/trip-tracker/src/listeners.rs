use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

use crate::position::PositionUpdate;

type Handler = Arc<dyn Fn(&PositionUpdate) + Send + Sync>;

/// Token returned when a handler is registered, used to deregister it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Ordered list of position handlers shared between a subscriber and its
/// connection driver.
#[derive(Clone, Default)]
pub struct Listeners {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: AtomicU64,
    handlers: Mutex<Vec<(ListenerId, Handler)>>,
}

impl Listeners {
    pub fn add(&self, handler: impl Fn(&PositionUpdate) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, Arc::new(handler)));
        id
    }

    pub fn remove(&self, id: ListenerId) -> bool {
        let mut handlers = self.lock();
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        handlers.len() != before
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    /// Invoke every handler, in registration order, unless `token` has been
    /// cancelled.
    ///
    /// The list stays locked while handlers run so a concurrent `clear`
    /// cannot return until delivery of the current update is finished.
    /// Handlers must not register or deregister handlers.
    pub fn notify(&self, update: &PositionUpdate, token: &CancellationToken) -> usize {
        let handlers = self.lock();
        if token.is_cancelled() {
            return 0;
        }
        for (_, handler) in handlers.iter() {
            handler(update);
        }
        handlers.len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(ListenerId, Handler)>> {
        // a panicking handler must not wedge the subscriber
        self.inner.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn update(n: u8) -> PositionUpdate {
        PositionUpdate {
            latitude: f64::from(n),
            longitude: 0.0,
            timestamp: format!("2024-01-01T10:00:0{n}Z"),
        }
    }

    #[test]
    fn registration_order() {
        let listeners = Listeners::default();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for name in ["first", "second", "third"] {
            let seen = Arc::clone(&seen);
            listeners.add(move |_| seen.lock().expect("should lock").push(name));
        }

        let delivered = listeners.notify(&update(1), &CancellationToken::new());
        assert_eq!(delivered, 3);
        assert_eq!(*seen.lock().expect("should lock"), vec!["first", "second", "third"]);
    }

    #[test]
    fn remove_one() {
        let listeners = Listeners::default();
        let count = Arc::new(AtomicU64::new(0));

        let c1 = Arc::clone(&count);
        let first = listeners.add(move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        });
        let c2 = Arc::clone(&count);
        listeners.add(move |_| {
            c2.fetch_add(10, Ordering::SeqCst);
        });

        assert!(listeners.remove(first));
        assert!(!listeners.remove(first));

        listeners.notify(&update(1), &CancellationToken::new());
        assert_eq!(count.load(Ordering::SeqCst), 10);
        assert_eq!(listeners.count(), 1);
    }

    #[test]
    fn cancelled_token_skips_delivery() {
        let listeners = Listeners::default();
        let count = Arc::new(AtomicU64::new(0));

        let c = Arc::clone(&count);
        listeners.add(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        let token = CancellationToken::new();
        token.cancel();

        assert_eq!(listeners.notify(&update(1), &token), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}

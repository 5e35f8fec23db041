//! Listener table shared by the action bus and every store
//!
//! Delivery is synchronous and in subscription order. Listeners run
//! outside the lock; a publish issued while a delivery is in progress
//! (from a listener, or from another thread) is queued and drained by the
//! publisher already delivering, so fan-outs never interleave.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub(crate) type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

pub(crate) struct Fanout<T> {
    label: &'static str,
    inner: Mutex<Inner<T>>,
}

struct Inner<T> {
    next_id: u64,
    listeners: Vec<(u64, Listener<T>)>,
    queue: VecDeque<T>,
    draining: bool,
}

impl<T> Fanout<T> {
    pub(crate) fn new(label: &'static str) -> Self {
        Self {
            label,
            inner: Mutex::new(Inner {
                next_id: 0,
                listeners: Vec::new(),
                queue: VecDeque::new(),
                draining: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        // Listeners never run under this lock, so poisoning cannot hide
        // a half-applied update.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn add(&self, listener: Listener<T>) -> u64 {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.push((id, listener));
        id
    }

    pub(crate) fn remove(&self, id: u64) -> bool {
        let mut inner = self.lock();
        let before = inner.listeners.len();
        inner.listeners.retain(|(lid, _)| *lid != id);
        inner.listeners.len() != before
    }

    /// Drop every listener and anything still queued
    pub(crate) fn clear(&self) {
        let mut inner = self.lock();
        inner.listeners.clear();
        inner.queue.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().listeners.len()
    }

    pub(crate) fn publish(&self, value: T) {
        let mut inner = self.lock();
        inner.queue.push_back(value);
        if inner.draining {
            return;
        }
        inner.draining = true;

        loop {
            let Some(value) = inner.queue.pop_front() else {
                inner.draining = false;
                return;
            };
            let listeners: Vec<Listener<T>> =
                inner.listeners.iter().map(|(_, l)| Arc::clone(l)).collect();
            drop(inner);

            for listener in &listeners {
                self.deliver(listener, &value);
            }

            inner = self.lock();
        }
    }

    pub(crate) fn deliver(&self, listener: &Listener<T>, value: &T) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener(value)));
        if let Err(cause) = outcome {
            let reason = cause
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| cause.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            tracing::error!(target: "statebus", fanout = self.label, %reason, "listener panicked; delivery continues");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Listener<u32>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let make = {
            let log = Arc::clone(&log);
            move |name: &str| -> Listener<u32> {
                let log = Arc::clone(&log);
                let name = name.to_string();
                Arc::new(move |v: &u32| log.lock().unwrap().push(format!("{}:{}", name, v)))
            }
        };
        (log, make)
    }

    #[test]
    fn test_delivers_in_subscription_order() {
        let fanout: Fanout<u32> = Fanout::new("test");
        let (log, make) = recorder();
        fanout.add(make("a"));
        fanout.add(make("b"));

        fanout.publish(1);

        assert_eq!(*log.lock().unwrap(), vec!["a:1", "b:1"]);
    }

    #[test]
    fn test_removed_listener_stops_receiving() {
        let fanout: Fanout<u32> = Fanout::new("test");
        let (log, make) = recorder();
        let id = fanout.add(make("a"));
        fanout.add(make("b"));

        assert!(fanout.remove(id));
        assert!(!fanout.remove(id));
        fanout.publish(7);

        assert_eq!(*log.lock().unwrap(), vec!["b:7"]);
        assert_eq!(fanout.len(), 1);
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let fanout: Fanout<u32> = Fanout::new("test");
        let (log, make) = recorder();
        fanout.add(Arc::new(|_: &u32| panic!("boom")));
        fanout.add(make("after"));

        fanout.publish(3);
        fanout.publish(4);

        assert_eq!(*log.lock().unwrap(), vec!["after:3", "after:4"]);
    }

    #[test]
    fn test_reentrant_publish_is_queued() {
        let fanout: Arc<Fanout<u32>> = Arc::new(Fanout::new("test"));
        let (log, make) = recorder();
        {
            let weak = Arc::downgrade(&fanout);
            fanout.add(Arc::new(move |v: &u32| {
                if *v == 1 {
                    if let Some(f) = weak.upgrade() {
                        f.publish(2);
                    }
                }
            }));
        }
        fanout.add(make("b"));

        fanout.publish(1);

        // "b" sees 1 before 2 even though 2 was published mid-delivery.
        assert_eq!(*log.lock().unwrap(), vec!["b:1", "b:2"]);
    }
}

//! Background producers.
//!
//! Every refresh runs on its own short-lived thread and ends with exactly one
//! message on the bus. Nothing is ever cancelled; the coordinator drops
//! whatever arrives too late to matter.

use crate::bus::{Message, ViewId};
use crossbeam_channel::Sender;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, warn};

#[derive(Clone)]
pub struct Tasks {
    tx: Sender<Message>,
    in_flight: Arc<AtomicUsize>,
}

impl Tasks {
    pub fn new(tx: Sender<Message>) -> Self {
        Self {
            tx,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// True while at least one spawned job has not delivered its message
    pub fn refreshing(&self) -> bool {
        self.in_flight() > 0
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Run `job` on a named thread and send the message it returns
    pub fn spawn<F>(&self, origin: ViewId, label: &str, job: F)
    where
        F: FnOnce() -> Message + Send + 'static,
    {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        debug!("spawning {} for {}", label, origin);

        let tx = self.tx.clone();
        let in_flight = self.in_flight.clone();
        let name = label.to_string();
        let spawned = thread::Builder::new()
            .name(label.to_string())
            .spawn(move || {
                let mut guard = Delivery {
                    tx,
                    in_flight,
                    origin,
                    label: name,
                    done: false,
                };
                let message = job();
                guard.deliver(message);
            });

        if let Err(err) = spawned {
            // Never reached the thread, so no guard exists to clear the slot
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            error!("failed to spawn {}: {}", label, err);
        }
    }

    /// Send `message` after `delay` without blocking the caller
    pub fn defer(&self, delay: Duration, message: Message) {
        let tx = self.tx.clone();
        let spawned = thread::Builder::new()
            .name("deferred".to_string())
            .spawn(move || {
                thread::sleep(delay);
                if tx.send(message).is_err() {
                    debug!("deferred message dropped, coordinator is gone");
                }
            });
        if let Err(err) = spawned {
            error!("failed to schedule deferred message: {}", err);
        }
    }
}

/// Clears the in-flight slot and guarantees one terminating message, even
/// when the job panics
struct Delivery {
    tx: Sender<Message>,
    in_flight: Arc<AtomicUsize>,
    origin: ViewId,
    label: String,
    done: bool,
}

impl Delivery {
    /// The slot is released once the coordinator has taken the message
    fn deliver(&mut self, message: Message) {
        self.done = true;
        if self.tx.send(message).is_err() {
            debug!("{} finished after the coordinator stopped", self.label);
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        warn!("{} ended without a result", self.label);
        let message = Message::error(self.origin, format!("{} failed unexpectedly", self.label));
        self.deliver(message);
    }
}

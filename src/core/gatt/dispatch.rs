//! UI-safe notification context
//! Observer callbacks never run on the link task. They are posted as jobs to
//! a single consumer which runs them one at a time, in posting order.

use std::sync::{Arc, Mutex, PoisonError};

use log::warn;
use tokio::sync::mpsc;

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Clone)]
enum Mode {
    Queued(mpsc::UnboundedSender<Job>),
    Inline,
}

/// A clonable handle used to post observer notifications.
#[derive(Clone)]
pub struct UiDispatcher {
    mode: Mode,
}

impl UiDispatcher {
    /// Creates a dispatcher and the queue that must be drained to deliver its jobs.
    pub fn channel() -> (Self, UiQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                mode: Mode::Queued(tx),
            },
            UiQueue { rx },
        )
    }

    /// Runs every job immediately on the calling thread.
    pub fn inline() -> Self {
        Self { mode: Mode::Inline }
    }

    pub fn dispatch<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match &self.mode {
            Mode::Queued(tx) => {
                if tx.send(Box::new(job)).is_err() {
                    warn!("UI queue is closed, dropping notification");
                }
            }
            Mode::Inline => job(),
        }
    }
}

/// Receiving end of a queued [`UiDispatcher`].
pub struct UiQueue {
    rx: mpsc::UnboundedReceiver<Job>,
}

impl UiQueue {
    /// Delivers jobs until every dispatcher handle is dropped.
    pub async fn run(mut self) {
        while let Some(job) = self.rx.recv().await {
            job();
        }
    }

    /// Delivers the jobs already queued and returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut count = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            count += 1;
        }
        count
    }
}

/// Observer registry with identity semantics: an observer is registered at most once.
pub struct ObserverList<O: ?Sized> {
    observers: Mutex<Vec<Arc<O>>>,
}

impl<O: ?Sized> ObserverList<O> {
    pub fn new() -> Self {
        Self {
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Returns `false` if the observer was already registered.
    pub fn add(&self, observer: Arc<O>) -> bool {
        let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        if observers.iter().any(|o| same_observer(o, &observer)) {
            return false;
        }
        observers.push(observer);
        true
    }

    pub fn remove(&self, observer: &Arc<O>) -> bool {
        let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        match observers.iter().position(|o| same_observer(o, observer)) {
            Some(index) => {
                observers.remove(index);
                true
            }
            None => false,
        }
    }

    /// Copies the current list so callbacks run without holding the lock.
    pub fn snapshot(&self) -> Vec<Arc<O>> {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<O: ?Sized> Default for ObserverList<O> {
    fn default() -> Self {
        Self::new()
    }
}

// Compares data pointers only; vtable pointers of the same object may differ.
fn same_observer<O: ?Sized>(a: &Arc<O>, b: &Arc<O>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

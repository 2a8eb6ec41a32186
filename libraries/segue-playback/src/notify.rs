//! Notification context
//!
//! Delegate notifications and seek completions run on a configurable
//! callback queue, decoupled from the thread that mutates playback state.

use crate::error::{PlaybackError, Result};
use crate::events::{PlaybackDelegate, PlaybackEvent};
use crossbeam_channel::{unbounded, Sender};
use parking_lot::RwLock;
use std::sync::{Arc, Weak};
use std::thread;
use tracing::{debug, warn};

/// Unit of work run on a callback queue
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Completion handler of a seek, called once with `finished`
pub type SeekCallback = Box<dyn FnOnce(bool) + Send + 'static>;

/// Where notifications are executed
pub trait CallbackQueue: Send + Sync {
    /// Schedule a job; must not block on the job itself
    fn dispatch(&self, job: Job);
}

/// Runs jobs inline on the dispatching thread
///
/// Jobs run while the controller's state lock is held, so delegates used
/// with this queue must not call back into the controller.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateQueue;

impl CallbackQueue for ImmediateQueue {
    fn dispatch(&self, job: Job) {
        job();
    }
}

/// Runs jobs in order on a dedicated thread
///
/// The thread exits once the queue is dropped and remaining jobs ran.
#[derive(Debug)]
pub struct DedicatedThreadQueue {
    tx: Sender<Job>,
}

impl DedicatedThreadQueue {
    pub fn spawn(name: &str) -> Result<Self> {
        let (tx, rx) = unbounded::<Job>();

        thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                debug!("Notification thread started");
                for job in rx {
                    job();
                }
                debug!("Notification thread exiting");
            })
            .map_err(|e| PlaybackError::Runtime(format!("failed to spawn {name}: {e}")))?;

        Ok(Self { tx })
    }
}

impl CallbackQueue for DedicatedThreadQueue {
    fn dispatch(&self, job: Job) {
        if self.tx.send(job).is_err() {
            warn!("Notification thread gone, dropping job");
        }
    }
}

/// Delegate back-reference plus the queue it is notified on
pub(crate) struct NotificationContext {
    queue: RwLock<Arc<dyn CallbackQueue>>,
    delegate: RwLock<Option<Weak<dyn PlaybackDelegate>>>,
}

impl NotificationContext {
    pub(crate) fn new(queue: Arc<dyn CallbackQueue>) -> Self {
        Self {
            queue: RwLock::new(queue),
            delegate: RwLock::new(None),
        }
    }

    pub(crate) fn set_queue(&self, queue: Arc<dyn CallbackQueue>) {
        *self.queue.write() = queue;
    }

    pub(crate) fn set_delegate(&self, delegate: Option<Weak<dyn PlaybackDelegate>>) {
        *self.delegate.write() = delegate;
    }

    /// Forward events to the delegate, if one is still alive when the job runs
    pub(crate) fn publish(&self, events: Vec<PlaybackEvent>) {
        if events.is_empty() {
            return;
        }
        let Some(delegate) = self.delegate.read().clone() else {
            return;
        };

        self.queue.read().dispatch(Box::new(move || {
            if let Some(delegate) = delegate.upgrade() {
                for event in &events {
                    event.dispatch(delegate.as_ref());
                }
            }
        }));
    }

    /// Run resolved seek callbacks
    pub(crate) fn complete_seeks(&self, completions: Vec<(SeekCallback, bool)>) {
        let queue = self.queue.read();
        for (callback, finished) in completions {
            queue.dispatch(Box::new(move || callback(finished)));
        }
    }
}

/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! # Execution lanes
//!
//! The manager runs on three logical lanes:
//!
//!   - a serial account lane, which owns every mutation of the account
//!     handle and every state machine step;
//!   - the application-provided UI lane, on which observer notifications
//!     and completion callbacks are delivered;
//!   - a serial persistence lane for fire-and-forget secret-store writes.
//!
//! The serial lanes are backed by a dedicated thread draining an unbounded
//! channel, so tasks enqueued from any thread execute one at a time, in
//! FIFO order.

use crossbeam_channel::Sender;
use std::thread;

/// A unit of work for one of the execution lanes.
pub type Task = Box<dyn FnOnce() + Send>;

/// The context on which observer notifications and completion callbacks are
/// delivered. Implemented by the embedding application, typically by hopping
/// onto its main thread or event loop.
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, task: Task);
}

/// A [`Dispatcher`] that runs tasks immediately on the calling thread.
///
/// Suitable for headless embedders and tests; callbacks are then delivered
/// on the account lane itself.
pub struct InlineDispatcher;

impl Dispatcher for InlineDispatcher {
    fn dispatch(&self, task: Task) {
        task();
    }
}

/// A FIFO execution lane backed by a single worker thread.
///
/// Cloning yields another sender for the same lane. The worker exits once
/// every clone has been dropped and the queued tasks have drained.
#[derive(Clone)]
pub(crate) struct SerialQueue {
    sender: Sender<Task>,
}

impl SerialQueue {
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded::<Task>();
        thread::spawn(move || {
            while let Ok(task) = receiver.recv() {
                task();
            }
        });
        Self { sender }
    }

    pub fn enqueue(&self, task: Task) {
        if self.sender.send(task).is_err() {
            log::warn!("serial queue worker has shut down, dropping task");
        }
    }
}

#[cfg(test)]
pub(crate) fn flush(queue: &SerialQueue) {
    let (tx, rx) = crossbeam_channel::bounded(1);
    queue.enqueue(Box::new(move || {
        tx.send(()).ok();
    }));
    rx.recv_timeout(std::time::Duration::from_secs(5))
        .expect("serial queue did not drain");
}

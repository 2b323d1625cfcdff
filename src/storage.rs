/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! # State persistence
//!
//! The account handle invokes its registered [`StorageHandler`] after every
//! mutation that changes its persisted state, passing the freshly serialized
//! state. The [`PersistenceCoordinator`] bridges that hook to the
//! application's [`SecretStore`], writing on the persistence lane so the
//! operation that triggered the persist never waits on (or fails because of)
//! storage.

use std::sync::Arc;

use crate::dispatch::SerialQueue;

/// Secure storage for the serialized account state, implemented by the
/// embedding application (keychain, keystore, ...). The manager owns exactly
/// one entry.
///
/// **⚠️ Warning:** the serialized state may contain encryption keys and
/// access tokens that let anyone holding them access the user's data.
/// Implementations should store it accordingly for their target platform.
pub trait SecretStore: Send + Sync {
    fn read(&self) -> anyhow::Result<Option<String>>;
    fn write(&self, contents: &str) -> anyhow::Result<()>;
    fn clear(&self) -> anyhow::Result<()>;
}

/// Hook invoked by the account handle whenever its persisted state has
/// changed. The next handle should be constructed from this json data.
pub trait StorageHandler: Send + Sync {
    fn save_state(&self, json: String);
}

/// The [`StorageHandler`] the manager registers on every handle it owns.
///
/// Writes are fire-and-forget: failures are logged and swallowed.
pub(crate) struct PersistenceCoordinator {
    store: Arc<dyn SecretStore>,
    queue: SerialQueue,
}

impl PersistenceCoordinator {
    pub fn new(store: Arc<dyn SecretStore>, queue: SerialQueue) -> Self {
        Self { store, queue }
    }
}

impl StorageHandler for PersistenceCoordinator {
    fn save_state(&self, json: String) {
        let store = Arc::clone(&self.store);
        self.queue.enqueue(Box::new(move || {
            if let Err(e) = store.write(&json) {
                log::warn!("failed to persist account state: {}", e);
            }
        }));
    }
}

/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! # Firefox Accounts manager
//!
//! [`FxaAccountManager`] drives a user account through its whole lifecycle on
//! top of the lower-level account library: restoring a session from secure
//! storage on cold start, running interactive OAuth sign-ins, silently
//! recovering from token problems, keeping the device record and the device
//! constellation up to date, and logging out.
//!
//! The manager is a thin, strictly-serialized shell around an opaque
//! [`AccountHandle`] provided by the embedding application through an
//! [`AccountHandleFactory`]. Every operation that touches the handle is
//! queued onto a single serial lane, so the account never sees concurrent
//! use and lifecycle events are observed in a well-defined order. Results
//! and observer notifications are delivered on the application-provided
//! [`Dispatcher`], typically the UI thread.
//!
//! A typical embedding:
//!
//!  1. construct the manager with an [`FxaConfig`], a [`DeviceConfig`]
//!     describing this application, the account library's factory, a
//!     [`SecretStore`] backed by the platform keystore, and a UI dispatcher;
//!  2. [`register`](FxaAccountManager::register) an observer and call
//!     [`initialize`](FxaAccountManager::initialize);
//!  3. react to `on_authenticated` / `on_logged_out` / `on_profile_updated`
//!     notifications, and drive sign-ins with
//!     [`begin_authentication`](FxaAccountManager::begin_authentication) and
//!     [`finish_authentication`](FxaAccountManager::finish_authentication).

#![warn(rust_2018_idioms)]

use std::sync::{Arc, Weak};

mod account;
mod auth;
mod config;
mod device;
mod device_constellation;
mod dispatch;
mod error;
mod events;
mod internal;
mod profile;
pub mod scopes;
mod state_machine;
mod storage;
mod token;

pub use crate::account::{AccountHandle, AccountHandleFactory, AuthorizationInfo};
pub use crate::auth::{AuthData, AuthType};
pub use crate::config::FxaConfig;
pub use crate::device::{Device, DeviceCapability, DeviceConfig, DevicePushSubscription, DeviceType};
pub use crate::device_constellation::{
    ConstellationState, DeviceConstellation, DeviceConstellationObserver,
};
pub use crate::dispatch::{Dispatcher, InlineDispatcher, Task};
pub use crate::error::{ApiResult, Error, FxaError, Result};
pub use crate::events::{
    AccountObserver, DeviceEvent, DeviceEventOutgoing, DeviceEventsObserver, TabHistoryEntry,
};
pub use crate::profile::{Avatar, Profile};
pub use crate::state_machine::AccountState;
pub use crate::storage::{SecretStore, StorageHandler};
pub use crate::token::AccessTokenInfo;

use crate::state_machine::Event;

/// Account manager for one user account.
///
/// All operations are non-blocking: the ones with results take a completion
/// callback which is invoked on the [`Dispatcher`] the manager was built
/// with. The cheap queries ([`has_account`](Self::has_account),
/// [`account_profile`](Self::account_profile), ...) answer from cached state
/// and may be called from any thread.
pub struct FxaAccountManager {
    pub(crate) inner: Arc<internal::FxaAccountManager>,
}

impl FxaAccountManager {
    pub fn new(
        config: FxaConfig,
        device_config: DeviceConfig,
        accounts: Box<dyn AccountHandleFactory>,
        secret_store: Arc<dyn SecretStore>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        Self {
            inner: internal::FxaAccountManager::new(
                config,
                device_config,
                accounts,
                secret_store,
                dispatcher,
            ),
        }
    }

    /// Restore the account persisted in the secret store, or set up a fresh
    /// unauthenticated one.
    ///
    /// One-shot: this must be called once, before any operation that needs
    /// an account handle; those fail with [`Error::IllegalState`] until it
    /// completes. A restored session notifies the registered observer with
    /// `on_authenticated(AuthType::ExistingAccount)` followed by a profile
    /// update.
    pub fn initialize<F>(&self, completion: F)
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        self.inner.queue.enqueue(Box::new(move || {
            inner.process_event(Event::Initialize);
            inner.deliver(completion, Ok(()));
        }));
    }

    /// The current lifecycle state.
    pub fn state(&self) -> AccountState {
        *self.inner.state.lock()
    }

    /// Whether a usable (possibly degraded) account session exists.
    pub fn has_account(&self) -> bool {
        matches!(
            self.state(),
            AccountState::AuthenticatedNoProfile
                | AccountState::AuthenticatedWithProfile
                | AccountState::AuthenticationProblem
        )
    }

    /// Whether the session hit an authentication problem that requires the
    /// user to re-authenticate.
    pub fn account_needs_reauth(&self) -> bool {
        self.state() == AccountState::AuthenticationProblem
    }

    /// The device constellation of the signed-in account, or `None` when
    /// unauthenticated.
    pub fn device_constellation(&self) -> Option<DeviceConstellation> {
        self.inner.constellation.lock().clone()
    }

    /// Register the lifecycle observer. A single slot, held weakly: a new
    /// registration replaces the previous one, and a dropped observer
    /// silently stops receiving notifications.
    pub fn register(&self, observer: Weak<dyn AccountObserver>) {
        *self.inner.observer.lock() = Some(observer);
    }

    /// Register the observer for incoming device events (e.g. received
    /// tabs). Same single-slot, weakly-held semantics as
    /// [`register`](Self::register).
    pub fn register_for_device_events(&self, observer: Weak<dyn DeviceEventsObserver>) {
        *self.inner.device_events_observer.lock() = Some(observer);
    }

    /// Run `operation` against the live account handle on the account lane,
    /// delivering its result to `completion` on the UI lane.
    pub(crate) fn with_account<T, F, G>(&self, completion: F, operation: G)
    where
        T: Send + 'static,
        F: FnOnce(Result<T>) + Send + 'static,
        G: FnOnce(&mut dyn AccountHandle) -> ApiResult<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        self.inner.queue.enqueue(Box::new(move || {
            let result = inner.require_account().and_then(|account| {
                let mut handle = account.lock();
                operation(&mut **handle).map_err(Error::from)
            });
            inner.deliver(completion, result);
        }));
    }
}

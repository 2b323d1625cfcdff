/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! # Device constellation
//!
//! The set of devices (local + remote) associated with an account, together
//! with the operations against them: refreshing the cached device list,
//! sending and receiving device events, and maintaining this device's own
//! record.
//!
//! A constellation is bound to exactly one account handle. When the manager
//! replaces the handle (logout, fresh sign-in) it replaces the constellation
//! with it; operations still queued against the old constellation find their
//! handle gone and turn into logged no-ops rather than reaching a superseded
//! account.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::dispatch::{Dispatcher, SerialQueue};
use crate::internal::AccountCell;
use crate::{
    Device, DeviceCapability, DeviceEvent, DeviceEventOutgoing, DeviceEventsObserver,
    DevicePushSubscription, DeviceType,
};

/// Cached snapshot of the constellation.
///
/// This is a cache only; the source of truth is the server, reached through
/// the account handle by [`DeviceConstellation::refresh_state`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConstellationState {
    /// The device record registered for this application, if the server
    /// knows about it.
    pub local_device: Option<Device>,
    pub remote_devices: Vec<Device>,
}

/// Observer of constellation snapshot updates.
pub trait DeviceConstellationObserver: Send + Sync {
    fn on_state_update(&self, state: ConstellationState);
}

#[derive(Clone)]
pub struct DeviceConstellation {
    inner: Arc<ConstellationInner>,
}

struct ConstellationInner {
    account: Weak<AccountCell>,
    queue: SerialQueue,
    ui: Arc<dyn Dispatcher>,
    state: Mutex<Option<ConstellationState>>,
    device_observer: Mutex<Option<Weak<dyn DeviceConstellationObserver>>>,
    events_observer: Mutex<Option<Weak<dyn DeviceEventsObserver>>>,
}

impl DeviceConstellation {
    pub(crate) fn new(
        account: &Arc<AccountCell>,
        queue: SerialQueue,
        ui: Arc<dyn Dispatcher>,
    ) -> Self {
        Self {
            inner: Arc::new(ConstellationInner {
                account: Arc::downgrade(account),
                queue,
                ui,
                state: Mutex::new(None),
                device_observer: Mutex::new(None),
                events_observer: Mutex::new(None),
            }),
        }
    }

    pub(crate) fn is_bound_to(&self, account: &Arc<AccountCell>) -> bool {
        Weak::ptr_eq(&self.inner.account, &Arc::downgrade(account))
    }

    /// The cached snapshot, or `None` before the first refresh.
    pub fn state(&self) -> Option<ConstellationState> {
        self.inner.state.lock().clone()
    }

    /// Fetch a fresh device list from the server, update the cached snapshot
    /// and notify the registered [`DeviceConstellationObserver`].
    pub fn refresh_state(&self) {
        let inner = Arc::clone(&self.inner);
        self.inner.queue.enqueue(Box::new(move || {
            inner.refresh_state();
        }));
    }

    /// Update the display name of this device's record, then refresh.
    pub fn set_local_device_name(&self, name: &str) {
        let name = name.to_owned();
        let inner = Arc::clone(&self.inner);
        self.inner.queue.enqueue(Box::new(move || {
            inner.set_device_name(&name);
        }));
    }

    /// Poll the server for device commands addressed to this device and
    /// route the resulting events to the registered
    /// [`DeviceEventsObserver`].
    pub fn poll_for_events(&self) {
        let inner = Arc::clone(&self.inner);
        self.inner.queue.enqueue(Box::new(move || {
            inner.poll_for_events();
        }));
    }

    /// Hand an incoming push payload to the account library for decryption
    /// and parsing, routing the resulting events like
    /// [`poll_for_events`](Self::poll_for_events) does.
    pub fn process_raw_incoming_device_event(&self, payload: &str) {
        let payload = payload.to_owned();
        let inner = Arc::clone(&self.inner);
        self.inner.queue.enqueue(Box::new(move || {
            inner.handle_push_payload(&payload);
        }));
    }

    /// Send an event to another device designated by its device ID.
    pub fn send_event_to_device(&self, target_device_id: &str, event: DeviceEventOutgoing) {
        let target_device_id = target_device_id.to_owned();
        let inner = Arc::clone(&self.inner);
        self.inner.queue.enqueue(Box::new(move || {
            inner.send_event_to_device(&target_device_id, event);
        }));
    }

    /// Register the push subscription through which this device receives
    /// account notifications.
    pub fn set_device_push_subscription(&self, subscription: DevicePushSubscription) {
        let inner = Arc::clone(&self.inner);
        self.inner.queue.enqueue(Box::new(move || {
            let Some(account) = inner.upgrade_account("set push subscription") else {
                return;
            };
            if let Err(e) = account.lock().set_push_subscription(&subscription) {
                log::warn!("failed to set the push subscription: {}", e);
            };
        }));
    }

    // Device-record upkeep driven by the manager right after authentication.
    // Callers are already on the account lane, so these run synchronously.

    pub(crate) fn init_device(
        &self,
        name: &str,
        device_type: DeviceType,
        capabilities: &[DeviceCapability],
    ) {
        let Some(account) = self.inner.upgrade_account("initialize device") else {
            return;
        };
        if let Err(e) = account
            .lock()
            .initialize_device(name, device_type, capabilities)
        {
            log::warn!("failed to initialize the device record: {}", e);
        };
    }

    pub(crate) fn ensure_capabilities(&self, capabilities: &[DeviceCapability]) {
        let Some(account) = self.inner.upgrade_account("ensure capabilities") else {
            return;
        };
        if let Err(e) = account.lock().ensure_capabilities(capabilities) {
            log::warn!("failed to ensure the device capabilities: {}", e);
        };
    }

    pub fn register_device_observer(&self, observer: Weak<dyn DeviceConstellationObserver>) {
        *self.inner.device_observer.lock() = Some(observer);
    }

    pub fn register_device_events_observer(&self, observer: Weak<dyn DeviceEventsObserver>) {
        *self.inner.events_observer.lock() = Some(observer);
    }
}

impl ConstellationInner {
    fn refresh_state(&self) {
        let Some(account) = self.upgrade_account("refresh devices") else {
            return;
        };
        let devices = match account.lock().get_devices(true) {
            Ok(devices) => devices,
            Err(e) => {
                log::warn!("failed to fetch the device list: {}", e);
                return;
            }
        };
        let local_device = devices.iter().find(|d| d.is_current_device).cloned();
        if let Some(local) = &local_device {
            if local.push_endpoint_expired {
                log::warn!("the local device push subscription has expired");
            }
        }
        let remote_devices = devices
            .into_iter()
            .filter(|d| !d.is_current_device)
            .collect();
        let new_state = ConstellationState {
            local_device,
            remote_devices,
        };
        *self.state.lock() = Some(new_state.clone());

        let Some(observer) = self.device_observer.lock().clone() else {
            return;
        };
        self.ui.dispatch(Box::new(move || {
            if let Some(observer) = observer.upgrade() {
                observer.on_state_update(new_state);
            }
        }));
    }

    fn set_device_name(&self, name: &str) {
        let Some(account) = self.upgrade_account("set device name") else {
            return;
        };
        if let Err(e) = account.lock().set_device_name(name) {
            log::warn!("failed to rename the device: {}", e);
        }
        self.refresh_state();
    }

    fn poll_for_events(&self) {
        let Some(account) = self.upgrade_account("poll device commands") else {
            return;
        };
        match account.lock().poll_device_commands() {
            Ok(events) => self.route_events(events),
            Err(e) => log::warn!("failed to poll for device commands: {}", e),
        };
    }

    fn handle_push_payload(&self, payload: &str) {
        let Some(account) = self.upgrade_account("handle push payload") else {
            return;
        };
        match account.lock().handle_push_message(payload) {
            Ok(events) => self.route_events(events),
            Err(e) => log::warn!("failed to handle a push payload: {}", e),
        };
    }

    fn send_event_to_device(&self, target_device_id: &str, event: DeviceEventOutgoing) {
        let Some(account) = self.upgrade_account("send device event") else {
            return;
        };
        match event {
            DeviceEventOutgoing::SendTab { title, url } => {
                if let Err(e) = account
                    .lock()
                    .send_single_tab(target_device_id, &title, &url)
                {
                    log::warn!("failed to send a tab to {}: {}", target_device_id, e);
                }
            }
        }
    }

    fn route_events(&self, events: Vec<DeviceEvent>) {
        if events.is_empty() {
            return;
        }
        let Some(observer) = self.events_observer.lock().clone() else {
            log::info!("no device events observer, dropping {} events", events.len());
            return;
        };
        self.ui.dispatch(Box::new(move || {
            if let Some(observer) = observer.upgrade() {
                observer.on_events(events);
            }
        }));
    }

    fn upgrade_account(&self, operation: &str) -> Option<Arc<AccountCell>> {
        match self.account.upgrade() {
            Some(account) => Some(account),
            None => {
                log::warn!("account was replaced, dropping operation: {}", operation);
                None
            }
        }
    }
}

/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! # Device events and observer interfaces
//!
//! Observers are registered as weak single-slot references: the manager
//! notifies at most one observer per slot, and destruction of the embedding
//! object silently disables notifications. All notifications are delivered
//! on the application-provided [`Dispatcher`](crate::Dispatcher), never on
//! the account lane.

use crate::{AuthType, Device, Profile};

/// An event sent to this device by another device in the constellation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceEvent {
    TabReceived {
        /// The sending device, when the server was able to identify it.
        from: Option<Device>,
        entries: Vec<TabHistoryEntry>,
    },
}

/// An event to send to another device in the constellation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceEventOutgoing {
    SendTab { title: String, url: String },
}

/// One entry of the history of a received tab. The last entry is the
/// currently-displayed page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TabHistoryEntry {
    pub title: String,
    pub url: String,
}

/// Observer of account lifecycle changes.
pub trait AccountObserver: Send + Sync {
    /// The account moved into an authenticated state. `auth_type` describes
    /// how it got there (fresh sign-in, restored session, recovery, ...).
    fn on_authenticated(&self, auth_type: AuthType);
    /// A fresh profile was fetched for the signed-in user.
    fn on_profile_updated(&self, profile: &Profile);
    /// The account hit an authentication problem that could not be silently
    /// recovered; the user needs to re-authenticate.
    fn on_authentication_problems(&self);
    /// The user logged out.
    fn on_logged_out(&self);
}

/// Observer of incoming device events (e.g. received tabs).
pub trait DeviceEventsObserver: Send + Sync {
    fn on_events(&self, events: Vec<DeviceEvent>);
}

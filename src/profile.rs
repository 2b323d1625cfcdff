/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! # User Profile info
//!
//! These methods can be used to find out information about the connected user.

use std::sync::Arc;

use crate::{state_machine::Event, AccountState, FxaAccountManager};

impl FxaAccountManager {
    /// Get the cached profile for the signed-in user, if any.
    ///
    /// The profile is only available once the account has reached the
    /// authenticated-with-profile state, and is retained while the account
    /// is in an authentication-problem state so that UI can keep showing
    /// who the (possibly stale) session belongs to.
    pub fn account_profile(&self) -> Option<Profile> {
        match *self.inner.state.lock() {
            AccountState::AuthenticatedWithProfile | AccountState::AuthenticationProblem => {
                self.inner.profile.lock().clone()
            }
            _ => None,
        }
    }

    /// Fetch a fresh profile from the server.
    ///
    /// If the fetch succeeds, the registered
    /// [`AccountObserver`](crate::AccountObserver) is notified through
    /// `on_profile_updated`.
    pub fn refresh_profile(&self) {
        let inner = Arc::clone(&self.inner);
        self.inner.queue.enqueue(Box::new(move || {
            inner.process_event(Event::FetchProfile);
        }));
    }
}

/// Information about the user that controls an account.
///
/// This struct represents details about the user themselves, and would
/// typically be used to personalize account-related UI for the current user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Profile {
    /// An opaque immutable unique identifier for the account.
    pub uid: String,
    /// The user's current primary email address.
    ///
    /// Note that unlike the `uid` field, the email address may change over time.
    pub email: String,
    /// The user's preferred textual display name.
    pub display_name: Option<String>,
    /// A profile picture representing the user, if one is known.
    pub avatar: Option<Avatar>,
}

/// A profile picture.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Avatar {
    pub url: String,
    /// Whether `url` is the default avatar image rather than one the user
    /// provided.
    pub is_default: bool,
}

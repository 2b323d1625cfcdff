/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

/// Scope to access the user's profile data.
pub const PROFILE: &str = "profile";

/// Scope to obtain the sync keys.
pub const OLD_SYNC: &str = "https://identity.mozilla.com/apps/oldsync";

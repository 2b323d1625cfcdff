/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::{FxaAccountManager, Result};

impl FxaAccountManager {
    /// Get a short-lived OAuth access token for the given scope.
    ///
    /// The request is delegated to the underlying account library; any
    /// failure it reports is surfaced to the completion verbatim. Callers may
    /// pass the canonical scopes from [`crate::scopes`] or any other scope
    /// string their client is allowed to request.
    pub fn get_access_token<F>(&self, scope: &str, completion: F)
    where
        F: FnOnce(Result<AccessTokenInfo>) + Send + 'static,
    {
        let scope = scope.to_owned();
        self.with_account(completion, move |account| account.get_access_token(&scope));
    }
}

/// An OAuth access token, with its scope and expiry time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessTokenInfo {
    pub scope: String,
    pub token: String,
    /// The expiry time of the token, in seconds since the unix epoch.
    pub expires_at: u64,
}

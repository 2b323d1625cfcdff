/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

pub(crate) const CONTENT_URL_RELEASE: &str = "https://accounts.firefox.com";
pub(crate) const CONTENT_URL_STABLE_DEV: &str = "https://stable.dev.lcip.org";

/// Server configuration handed to the underlying account library when a new
/// account handle is constructed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FxaConfig {
    /// The account content server URL.
    pub content_url: String,
    /// The OAuth `client_id`.
    pub client_id: String,
    /// The OAuth `redirect_uri`.
    pub redirect_uri: String,
}

impl FxaConfig {
    pub fn new(content_url: &str, client_id: &str, redirect_uri: &str) -> Self {
        Self {
            content_url: content_url.to_owned(),
            client_id: client_id.to_owned(),
            redirect_uri: redirect_uri.to_owned(),
        }
    }

    pub fn release(client_id: &str, redirect_uri: &str) -> Self {
        Self::new(CONTENT_URL_RELEASE, client_id, redirect_uri)
    }

    pub fn stable_dev(client_id: &str, redirect_uri: &str) -> Self {
        Self::new(CONTENT_URL_STABLE_DEV, client_id, redirect_uri)
    }
}

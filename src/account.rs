/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! # The account-handle collaborator
//!
//! [`AccountHandle`] is the surface of the underlying account library: a
//! per-account object providing OAuth, profile, device and push primitives
//! as synchronous (potentially blocking) operations. The manager owns
//! exactly one live handle at a time and serializes every call to it on the
//! account lane.
//!
//! The handle's methods report failures with [`FxaError`]; how each failure
//! propagates (surfaced, logged-and-swallowed, or re-entered into the state
//! machine) is decided by the caller.

use crate::{
    AccessTokenInfo, ApiResult, Device, DeviceCapability, DevicePushSubscription, DeviceType,
    FxaAccountManager, FxaConfig, Profile, Result, StorageHandler,
};
use crate::events::DeviceEvent;

#[cfg_attr(test, mockall::automock)]
pub trait AccountHandle: Send {
    /// Initiate a web-based OAuth sign-in flow, returning the URL at which
    /// the user may authorize the application. The returned URL carries the
    /// `state` parameter identifying the flow.
    fn begin_oauth_flow(&mut self, scopes: &[String]) -> ApiResult<String>;

    /// Initiate a device-pairing sign-in flow from a scanned pairing URL.
    fn begin_pairing_flow(&mut self, pairing_url: &str, scopes: &[String]) -> ApiResult<String>;

    /// Complete an OAuth flow with the `code` and `state` parameters
    /// extracted from the redirect URL.
    fn complete_oauth_flow(&mut self, code: &str, state: &str) -> ApiResult<()>;

    /// Ask the server whether this application's tokens are still active.
    fn check_authorization_status(&mut self) -> ApiResult<AuthorizationInfo>;

    /// Destroy any tokens held by the client, disconnecting from the user's
    /// account.
    fn disconnect(&mut self) -> ApiResult<()>;

    /// Fetch profile information for the signed-in user.
    fn get_profile(&mut self, ignore_cache: bool) -> ApiResult<Profile>;

    /// Fetch the devices (including this one) registered on the account.
    fn get_devices(&mut self, ignore_cache: bool) -> ApiResult<Vec<Device>>;

    /// Create the device record for this application.
    fn initialize_device(
        &mut self,
        name: &str,
        device_type: DeviceType,
        capabilities: &[DeviceCapability],
    ) -> ApiResult<()>;

    /// Ensure the existing device record advertises the given capabilities.
    fn ensure_capabilities(&mut self, capabilities: &[DeviceCapability]) -> ApiResult<()>;

    /// Update the display name of this application's device record.
    fn set_device_name(&mut self, display_name: &str) -> ApiResult<()>;

    /// Register the push subscription through which this device receives
    /// account notifications.
    fn set_push_subscription(&mut self, subscription: &DevicePushSubscription) -> ApiResult<()>;

    /// Poll the server for pending device commands addressed to this device.
    fn poll_device_commands(&mut self) -> ApiResult<Vec<DeviceEvent>>;

    /// Decrypt and parse an incoming push payload, returning the device
    /// events it carried.
    fn handle_push_message(&mut self, payload: &str) -> ApiResult<Vec<DeviceEvent>>;

    /// Send a single tab to another device designated by its device ID.
    fn send_single_tab(&mut self, target_device_id: &str, title: &str, url: &str)
        -> ApiResult<()>;

    /// Get a short-lived access token for the given scope.
    fn get_access_token(&mut self, scope: &str) -> ApiResult<AccessTokenInfo>;

    /// Drop every cached access token, forcing the next `get_access_token`
    /// to mint a fresh one.
    fn clear_access_token_cache(&mut self);

    /// Get the token server URL used to access the user's sync data.
    fn get_token_server_endpoint_url(&mut self) -> ApiResult<String>;

    /// Get a URL at which the user can manage their account and profile data.
    fn get_manage_account_url(&mut self, entrypoint: &str) -> ApiResult<String>;

    /// Get a URL at which the user can manage the devices connected to their
    /// account.
    fn get_manage_devices_url(&mut self, entrypoint: &str) -> ApiResult<String>;

    /// Serialize the internal account state to an opaque string, to be
    /// restored later through [`AccountHandleFactory::from_json`].
    fn to_json(&self) -> ApiResult<String>;

    /// Register the hook invoked whenever the persisted account state has
    /// changed. Any previously registered handler is replaced; pass `None`
    /// to clear it.
    fn register_storage_handler(&mut self, handler: Option<Box<dyn StorageHandler>>);
}

/// Constructor surface of the underlying account library.
///
/// The manager uses it to mint a fresh handle for a given server
/// configuration, and to restore one from the opaque string written by
/// [`AccountHandle::to_json`] (the round trip must be exact).
pub trait AccountHandleFactory: Send + Sync {
    fn create(&self, config: &FxaConfig) -> Box<dyn AccountHandle>;
    fn from_json(&self, data: &str) -> ApiResult<Box<dyn AccountHandle>>;
}

/// Information about the authorization state of the application.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationInfo {
    pub active: bool,
}

impl FxaAccountManager {
    /// Get the token server URL used to access the user's sync data.
    pub fn get_token_server_endpoint_url<F>(&self, completion: F)
    where
        F: FnOnce(Result<String>) + Send + 'static,
    {
        self.with_account(completion, |account| account.get_token_server_endpoint_url());
    }

    /// Get a URL at which the user can manage their account and profile data.
    ///
    /// Applications should link the user out to this URL from an appropriate
    /// place in their signed-in settings UI.
    ///
    /// * `entrypoint` - metrics identifier for the UX entrypoint from which
    ///   the user followed the link.
    pub fn get_manage_account_url<F>(&self, entrypoint: &str, completion: F)
    where
        F: FnOnce(Result<String>) + Send + 'static,
    {
        let entrypoint = entrypoint.to_owned();
        self.with_account(completion, move |account| {
            account.get_manage_account_url(&entrypoint)
        });
    }

    /// Get a URL at which the user can manage the devices connected to their
    /// account. For example, "Manage your devices..." may be a useful link
    /// near the device list in the send-tab UI.
    pub fn get_manage_devices_url<F>(&self, entrypoint: &str, completion: F)
    where
        F: FnOnce(Result<String>) + Send + 'static,
    {
        let entrypoint = entrypoint.to_owned();
        self.with_account(completion, move |account| {
            account.get_manage_devices_url(&entrypoint)
        });
    }
}

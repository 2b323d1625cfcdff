/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! # Device data model
//!
//! Applications that connect to a user's account register a "device record"
//! describing themselves, which lets them appear in the user's device list
//! and participate in the device-commands ecosystem. The types here describe
//! those records and the configuration this application registers for itself.

/// The form factor of a device connected to the account.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeviceType {
    Desktop,
    Mobile,
    Tablet,
    VR,
    TV,
    Unknown,
}

/// A "capability" offered by a device.
///
/// Connected devices may advertise their ability to respond to various
/// "commands" invoked by other devices. The details of executing a command
/// are encapsulated by the underlying account library; consumers simply
/// select which ones they want to support.
///
/// In practice, the only currently-supported command is the ability to
/// receive a tab.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeviceCapability {
    SendTab,
}

/// How this application should register itself in the user's device list.
///
/// Supplied once at manager construction; drives device-record
/// initialization after a fresh sign-in and capability upkeep after a
/// restore.
#[derive(Clone, Debug)]
pub struct DeviceConfig {
    /// Human-readable display name for this application.
    pub name: String,
    pub device_type: DeviceType,
    pub capabilities: Vec<DeviceCapability>,
}

impl DeviceConfig {
    pub fn new(name: &str, device_type: DeviceType, capabilities: Vec<DeviceCapability>) -> Self {
        Self {
            name: name.to_owned(),
            device_type,
            capabilities,
        }
    }

    pub(crate) fn supports(&self, capability: DeviceCapability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// A device connected to the user's account.
///
/// This data would typically be used to display e.g. the list of candidate
/// devices in a "send tab" menu.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Device {
    pub id: String,
    pub display_name: String,
    pub device_type: DeviceType,
    pub capabilities: Vec<DeviceCapability>,
    pub push_subscription: Option<DevicePushSubscription>,
    pub push_endpoint_expired: bool,
    pub is_current_device: bool,
    pub last_access_time: Option<i64>,
}

/// Details of the Web Push subscription endpoint through which the device
/// receives account notifications.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DevicePushSubscription {
    pub endpoint: String,
    pub public_key: String,
    pub auth_key: String,
}

/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! End-to-end lifecycle tests driving the public manager surface with a
//! scripted in-memory account library.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use fxa_account_manager::{
    AccessTokenInfo, AccountHandle, AccountHandleFactory, AccountObserver, ApiResult, AuthData,
    AuthType, AuthorizationInfo, Device, DeviceCapability, DeviceConfig, DeviceEvent,
    DeviceEventOutgoing, DeviceEventsObserver, DevicePushSubscription, DeviceType, Error,
    FxaAccountManager, FxaConfig, FxaError, InlineDispatcher, Profile, Result, SecretStore,
    StorageHandler, TabHistoryEntry,
};

const OAUTH_STATE: &str = "STATE123";

/// The persisted state of the scripted account library; round-trips through
/// `to_json`/`from_json` exactly.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
struct FakeAccountState {
    connected: bool,
    device_name: Option<String>,
}

struct FakeAccount {
    state: FakeAccountState,
    log: Arc<Mutex<Vec<String>>>,
    storage_handler: Option<Box<dyn StorageHandler>>,
}

impl FakeAccount {
    fn new(state: FakeAccountState, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            state,
            log,
            storage_handler: None,
        }
    }

    fn record(&self, entry: String) {
        self.log.lock().push(entry);
    }

    fn persist(&self) {
        if let Some(handler) = &self.storage_handler {
            handler.save_state(serde_json::to_string(&self.state).unwrap());
        }
    }

    fn profile() -> Profile {
        Profile {
            uid: "uid-123".to_owned(),
            email: "test@example.com".to_owned(),
            display_name: None,
            avatar: None,
        }
    }
}

impl AccountHandle for FakeAccount {
    fn begin_oauth_flow(&mut self, _scopes: &[String]) -> ApiResult<String> {
        self.record("begin_oauth_flow".to_owned());
        Ok(format!(
            "https://accounts.example.com/authorization?state={OAUTH_STATE}&action=email"
        ))
    }

    fn begin_pairing_flow(&mut self, pairing_url: &str, _scopes: &[String]) -> ApiResult<String> {
        self.record(format!("begin_pairing_flow:{pairing_url}"));
        Ok(format!(
            "https://accounts.example.com/pair/supp?state={OAUTH_STATE}"
        ))
    }

    fn complete_oauth_flow(&mut self, code: &str, state: &str) -> ApiResult<()> {
        self.record(format!("complete_oauth_flow:{code}:{state}"));
        self.state.connected = true;
        self.persist();
        Ok(())
    }

    fn check_authorization_status(&mut self) -> ApiResult<AuthorizationInfo> {
        self.record("check_authorization_status".to_owned());
        Ok(AuthorizationInfo {
            active: self.state.connected,
        })
    }

    fn disconnect(&mut self) -> ApiResult<()> {
        self.record("disconnect".to_owned());
        self.state.connected = false;
        Ok(())
    }

    fn get_profile(&mut self, _ignore_cache: bool) -> ApiResult<Profile> {
        self.record("get_profile".to_owned());
        if self.state.connected {
            Ok(Self::profile())
        } else {
            Err(FxaError::Authentication)
        }
    }

    fn get_devices(&mut self, _ignore_cache: bool) -> ApiResult<Vec<Device>> {
        self.record("get_devices".to_owned());
        Ok(vec![])
    }

    fn initialize_device(
        &mut self,
        name: &str,
        _device_type: DeviceType,
        _capabilities: &[DeviceCapability],
    ) -> ApiResult<()> {
        self.record(format!("initialize_device:{name}"));
        self.state.device_name = Some(name.to_owned());
        self.persist();
        Ok(())
    }

    fn ensure_capabilities(&mut self, _capabilities: &[DeviceCapability]) -> ApiResult<()> {
        self.record("ensure_capabilities".to_owned());
        Ok(())
    }

    fn set_device_name(&mut self, display_name: &str) -> ApiResult<()> {
        self.record(format!("set_device_name:{display_name}"));
        self.state.device_name = Some(display_name.to_owned());
        self.persist();
        Ok(())
    }

    fn set_push_subscription(&mut self, subscription: &DevicePushSubscription) -> ApiResult<()> {
        self.record(format!("set_push_subscription:{}", subscription.endpoint));
        Ok(())
    }

    fn poll_device_commands(&mut self) -> ApiResult<Vec<DeviceEvent>> {
        self.record("poll_device_commands".to_owned());
        Ok(vec![])
    }

    fn handle_push_message(&mut self, payload: &str) -> ApiResult<Vec<DeviceEvent>> {
        self.record(format!("handle_push_message:{payload}"));
        Ok(vec![DeviceEvent::TabReceived {
            from: None,
            entries: vec![TabHistoryEntry {
                title: "Welcome".to_owned(),
                url: "https://example.com/welcome".to_owned(),
            }],
        }])
    }

    fn send_single_tab(
        &mut self,
        target_device_id: &str,
        title: &str,
        url: &str,
    ) -> ApiResult<()> {
        self.record(format!("send_single_tab:{target_device_id}:{title}:{url}"));
        Ok(())
    }

    fn get_access_token(&mut self, scope: &str) -> ApiResult<AccessTokenInfo> {
        self.record(format!("get_access_token:{scope}"));
        Ok(AccessTokenInfo {
            scope: scope.to_owned(),
            token: "tok-123".to_owned(),
            expires_at: u64::MAX,
        })
    }

    fn clear_access_token_cache(&mut self) {
        self.record("clear_access_token_cache".to_owned());
    }

    fn get_token_server_endpoint_url(&mut self) -> ApiResult<String> {
        Ok("https://token.example.com/1.0/sync/1.5".to_owned())
    }

    fn get_manage_account_url(&mut self, entrypoint: &str) -> ApiResult<String> {
        Ok(format!(
            "https://accounts.example.com/settings?entrypoint={entrypoint}"
        ))
    }

    fn get_manage_devices_url(&mut self, entrypoint: &str) -> ApiResult<String> {
        Ok(format!(
            "https://accounts.example.com/settings/clients?entrypoint={entrypoint}"
        ))
    }

    fn to_json(&self) -> ApiResult<String> {
        serde_json::to_string(&self.state).map_err(|e| FxaError::Other(e.to_string()))
    }

    fn register_storage_handler(&mut self, handler: Option<Box<dyn StorageHandler>>) {
        self.storage_handler = handler;
    }
}

struct FakeAccounts {
    log: Arc<Mutex<Vec<String>>>,
}

impl AccountHandleFactory for FakeAccounts {
    fn create(&self, _config: &FxaConfig) -> Box<dyn AccountHandle> {
        Box::new(FakeAccount::new(
            FakeAccountState::default(),
            Arc::clone(&self.log),
        ))
    }

    fn from_json(&self, data: &str) -> ApiResult<Box<dyn AccountHandle>> {
        let state: FakeAccountState =
            serde_json::from_str(data).map_err(|e| FxaError::Other(e.to_string()))?;
        Ok(Box::new(FakeAccount::new(state, Arc::clone(&self.log))))
    }
}

#[derive(Default)]
struct MemoryStore {
    contents: Mutex<Option<String>>,
}

impl SecretStore for MemoryStore {
    fn read(&self) -> anyhow::Result<Option<String>> {
        Ok(self.contents.lock().clone())
    }

    fn write(&self, contents: &str) -> anyhow::Result<()> {
        *self.contents.lock() = Some(contents.to_owned());
        Ok(())
    }

    fn clear(&self) -> anyhow::Result<()> {
        *self.contents.lock() = None;
        Ok(())
    }
}

struct ChannelObserver {
    tx: Sender<String>,
}

impl AccountObserver for ChannelObserver {
    fn on_authenticated(&self, auth_type: AuthType) {
        self.tx.send(format!("authenticated:{auth_type}")).unwrap();
    }

    fn on_profile_updated(&self, profile: &Profile) {
        self.tx
            .send(format!("profile_updated:{}", profile.email))
            .unwrap();
    }

    fn on_authentication_problems(&self) {
        self.tx.send("authentication_problems".to_owned()).unwrap();
    }

    fn on_logged_out(&self) {
        self.tx.send("logged_out".to_owned()).unwrap();
    }
}

struct ChannelEventsObserver {
    tx: Sender<Vec<DeviceEvent>>,
}

impl DeviceEventsObserver for ChannelEventsObserver {
    fn on_events(&self, events: Vec<DeviceEvent>) {
        self.tx.send(events).unwrap();
    }
}

struct Harness {
    manager: FxaAccountManager,
    store: Arc<MemoryStore>,
    log: Arc<Mutex<Vec<String>>>,
    notifications: Receiver<String>,
    // Keeps the weakly-registered observer alive.
    _observer: Arc<ChannelObserver>,
}

impl Harness {
    fn new(capabilities: Vec<DeviceCapability>) -> Self {
        Self::with_store(capabilities, Arc::new(MemoryStore::default()))
    }

    fn with_store(capabilities: Vec<DeviceCapability>, store: Arc<MemoryStore>) -> Self {
        let log = Arc::new(Mutex::new(Vec::new()));
        let manager = FxaAccountManager::new(
            FxaConfig::release("12345678", "https://app.example.com/redirect"),
            DeviceConfig::new("Integration Device", DeviceType::Desktop, capabilities),
            Box::new(FakeAccounts {
                log: Arc::clone(&log),
            }),
            Arc::clone(&store) as Arc<dyn SecretStore>,
            Arc::new(InlineDispatcher),
        );
        let (tx, notifications) = unbounded();
        let observer = Arc::new(ChannelObserver { tx });
        manager.register(Arc::downgrade(&observer) as Weak<dyn AccountObserver>);
        Self {
            manager,
            store,
            log,
            notifications,
            _observer: observer,
        }
    }

    fn initialize(&self) {
        let (tx, rx) = bounded(1);
        self.manager.initialize(move |result| {
            tx.send(result).unwrap();
        });
        wait(&rx).expect("initialize failed");
    }

    fn begin_authentication(&self) -> Result<String> {
        let (tx, rx) = bounded(1);
        self.manager.begin_authentication(move |result| {
            tx.send(result).unwrap();
        });
        wait(&rx)
    }

    fn finish_authentication(&self, auth_data: AuthData) -> Result<()> {
        let (tx, rx) = bounded(1);
        self.manager.finish_authentication(auth_data, move |result| {
            tx.send(result).unwrap();
        });
        wait(&rx)
    }

    fn logout(&self) {
        let (tx, rx) = bounded(1);
        self.manager.logout(move |result| {
            tx.send(result).unwrap();
        });
        wait(&rx).expect("logout failed");
    }

    /// Round-trip a no-op through the account lane, guaranteeing every
    /// previously enqueued operation has run.
    fn drain_account_lane(&self) {
        let (tx, rx) = bounded(1);
        self.manager.get_access_token("profile", move |result| {
            tx.send(result).unwrap();
        });
        wait(&rx).expect("barrier token fetch failed");
    }

    fn sign_in(&self) {
        self.initialize();
        let url = self.begin_authentication().expect("begin failed");
        let redirect = format!("https://app.example.com/redirect?code=C1&state={OAUTH_STATE}&action=signin");
        assert!(url.contains(&format!("state={OAUTH_STATE}")));
        self.finish_authentication(AuthData::from_redirect_url(&redirect).unwrap())
            .expect("finish failed");
    }

    fn next_notification(&self) -> String {
        self.notifications
            .recv_timeout(Duration::from_secs(5))
            .expect("timed out waiting for a notification")
    }

    fn logged(&self, entry: &str) -> bool {
        self.log.lock().iter().any(|l| l == entry)
    }
}

fn wait<T>(rx: &Receiver<Result<T>>) -> Result<T> {
    rx.recv_timeout(Duration::from_secs(5))
        .expect("timed out waiting for a completion")
}

/// Wait for the fire-and-forget persistence lane to catch up.
fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    panic!("condition not met within the deadline");
}

#[test]
fn test_cold_start_without_a_stored_account() {
    let harness = Harness::new(vec![]);
    harness.initialize();

    assert!(!harness.manager.has_account());
    assert!(!harness.manager.account_needs_reauth());
    assert!(harness.manager.account_profile().is_none());
    assert!(harness.manager.device_constellation().is_none());
    assert!(harness.notifications.is_empty());
}

#[test]
fn test_interactive_sign_in() {
    let harness = Harness::new(vec![]);
    harness.sign_in();

    assert_eq!(harness.next_notification(), "authenticated:signin");
    assert_eq!(harness.next_notification(), "profile_updated:test@example.com");
    assert!(harness.manager.has_account());
    assert_eq!(
        harness.manager.account_profile().unwrap().email,
        "test@example.com"
    );
    assert!(harness.manager.device_constellation().is_some());
    assert!(harness.logged(&format!("complete_oauth_flow:C1:{OAUTH_STATE}")));
    assert!(harness.logged("initialize_device:Integration Device"));

    // Completing the flow changed the persisted state, which must end up in
    // the secret store.
    wait_until(|| harness.store.contents.lock().is_some());
    let blob = harness.store.contents.lock().clone().unwrap();
    let state: FakeAccountState = serde_json::from_str(&blob).unwrap();
    assert!(state.connected);
}

#[test]
fn test_finish_authentication_rejects_a_mismatched_redirect() {
    let harness = Harness::new(vec![]);
    harness.initialize();
    harness.begin_authentication().expect("begin failed");

    let redirect = "https://app.example.com/redirect?code=C1&state=NOT-THE-FLOW&action=signin";
    match harness.finish_authentication(AuthData::from_redirect_url(redirect).unwrap()) {
        Err(Error::WrongAuthFlow) => {}
        r => panic!("expected WrongAuthFlow, got {r:?}"),
    }
    assert!(!harness.manager.has_account());
    assert!(harness.notifications.is_empty());
}

#[test]
fn test_operations_before_initialize_fail() {
    let harness = Harness::new(vec![]);
    match harness.begin_authentication() {
        Err(Error::IllegalState(_)) => {}
        r => panic!("expected IllegalState, got {r:?}"),
    }
}

#[test]
fn test_restore_from_secret_store() {
    let store = Arc::new(MemoryStore::default());
    let stored = FakeAccountState {
        connected: true,
        device_name: Some("Integration Device".to_owned()),
    };
    *store.contents.lock() = Some(serde_json::to_string(&stored).unwrap());

    let harness = Harness::with_store(vec![], store);
    harness.initialize();

    assert_eq!(harness.next_notification(), "authenticated:existing_account");
    assert_eq!(harness.next_notification(), "profile_updated:test@example.com");
    assert!(harness.manager.has_account());
    assert!(harness.logged("ensure_capabilities"));
    assert!(!harness.logged("initialize_device:Integration Device"));
}

#[test]
fn test_persisted_state_round_trips() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let accounts = FakeAccounts {
        log: Arc::clone(&log),
    };
    let account = FakeAccount::new(
        FakeAccountState {
            connected: true,
            device_name: Some("A Device".to_owned()),
        },
        log,
    );
    let json = account.to_json().unwrap();
    drop(account);
    let restored = accounts.from_json(&json).unwrap();
    assert_eq!(restored.to_json().unwrap(), json);
}

#[test]
fn test_logout_clears_everything() {
    let harness = Harness::new(vec![]);
    harness.sign_in();
    assert_eq!(harness.next_notification(), "authenticated:signin");
    assert_eq!(harness.next_notification(), "profile_updated:test@example.com");

    harness.logout();
    assert_eq!(harness.next_notification(), "logged_out");
    assert!(!harness.manager.has_account());
    assert!(harness.manager.account_profile().is_none());
    assert!(harness.manager.device_constellation().is_none());
    assert!(harness.store.contents.lock().is_none());
    assert!(harness.logged("disconnect"));
}

#[test]
fn test_send_tab_round_trip() {
    let harness = Harness::new(vec![DeviceCapability::SendTab]);
    let (events_tx, events_rx) = unbounded();
    let events_observer = Arc::new(ChannelEventsObserver { tx: events_tx });
    harness
        .manager
        .register_for_device_events(Arc::downgrade(&events_observer) as Weak<dyn DeviceEventsObserver>);

    harness.sign_in();
    let constellation = harness.manager.device_constellation().unwrap();

    constellation.send_event_to_device(
        "device-2",
        DeviceEventOutgoing::SendTab {
            title: "T".to_owned(),
            url: "U".to_owned(),
        },
    );
    harness.drain_account_lane();
    assert!(harness.logged("send_single_tab:device-2:T:U"));

    constellation.process_raw_incoming_device_event("PUSH-PAYLOAD");
    let events = events_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("no device events arrived");
    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0],
        DeviceEvent::TabReceived { entries, .. } if entries[0].url == "https://example.com/welcome"
    ));
}

#[test]
fn test_constellation_refresh_and_rename() {
    let harness = Harness::new(vec![DeviceCapability::SendTab]);
    harness.sign_in();
    let constellation = harness.manager.device_constellation().unwrap();

    // The post-authentication hook refreshes the snapshot; with no devices
    // on the server the snapshot is empty but present.
    harness.drain_account_lane();
    let state = constellation.state().expect("no snapshot after sign-in");
    assert!(state.local_device.is_none());
    assert!(state.remote_devices.is_empty());

    constellation.set_local_device_name("Renamed Device");
    harness.drain_account_lane();
    assert!(harness.logged("set_device_name:Renamed Device"));
}

/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! # Internal implementation details for the fxa_account_manager crate.
//!
//! Everything in here assumes it is running on the account lane unless noted
//! otherwise: the public wrappers enqueue onto [`Self::queue`] and the lane
//! drains one task at a time, so the state machine observes events in
//! arrival order and the account handle is never used concurrently.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use url::Url;

use crate::auth::query_param;
use crate::dispatch::{Dispatcher, SerialQueue};
use crate::state_machine::{self, Event};
use crate::storage::PersistenceCoordinator;
use crate::{
    scopes, AccountHandle, AccountHandleFactory, AccountObserver, AccountState, AuthData,
    AuthType, DeviceCapability, DeviceConfig, DeviceConstellation, DeviceEvent,
    DeviceEventsObserver, Error, FxaConfig, Profile, Result, SecretStore,
};

/// The slot holding the live account handle. A fresh cell is allocated every
/// time the handle is replaced, so components holding a [`Weak`] reference
/// to a superseded handle can tell it is gone.
pub(crate) type AccountCell = Mutex<Box<dyn AccountHandle>>;

pub(crate) struct FxaAccountManager {
    /// Self-reference handed to the constellation as the device-events sink.
    weak_self: Weak<FxaAccountManager>,
    pub(crate) config: FxaConfig,
    pub(crate) device_config: DeviceConfig,
    pub(crate) accounts: Box<dyn AccountHandleFactory>,
    pub(crate) store: Arc<dyn SecretStore>,
    /// The account lane: every handle mutation and state machine step.
    pub(crate) queue: SerialQueue,
    /// The persistence lane: fire-and-forget secret-store writes.
    pub(crate) persist_queue: SerialQueue,
    pub(crate) ui: Arc<dyn Dispatcher>,
    pub(crate) state: Mutex<AccountState>,
    pub(crate) profile: Mutex<Option<Profile>>,
    /// The `state` parameter of the flow most recently started by a
    /// `begin_*` call; `None` outside an in-flight flow.
    pub(crate) latest_auth_state: Mutex<Option<String>>,
    pub(crate) account: Mutex<Option<Arc<AccountCell>>>,
    pub(crate) constellation: Mutex<Option<DeviceConstellation>>,
    pub(crate) observer: Mutex<Option<Weak<dyn AccountObserver>>>,
    pub(crate) device_events_observer: Mutex<Option<Weak<dyn DeviceEventsObserver>>>,
}

impl FxaAccountManager {
    pub(crate) fn new(
        config: FxaConfig,
        device_config: DeviceConfig,
        accounts: Box<dyn AccountHandleFactory>,
        store: Arc<dyn SecretStore>,
        ui: Arc<dyn Dispatcher>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            weak_self: weak_self.clone(),
            config,
            device_config,
            accounts,
            store,
            queue: SerialQueue::new(),
            persist_queue: SerialQueue::new(),
            ui,
            state: Mutex::new(AccountState::Start),
            profile: Mutex::new(None),
            latest_auth_state: Mutex::new(None),
            account: Mutex::new(None),
            constellation: Mutex::new(None),
            observer: Mutex::new(None),
            device_events_observer: Mutex::new(None),
        })
    }

    /// Advance the state machine with `event`, run the side effects of the
    /// transition, and re-enter with any follow-up event until quiescence.
    pub(crate) fn process_event(&self, event: Event) {
        let mut next_event = Some(event);
        while let Some(event) = next_event.take() {
            let current = *self.state.lock();
            match state_machine::next(current, &event) {
                Some(new_state) => {
                    log::info!("account state transition: {current} -> {new_state} (via {event})");
                    *self.state.lock() = new_state;
                    next_event = self.act(new_state, event);
                }
                None => log::warn!("no transition from {current} for {event}, ignored"),
            }
        }
    }

    /// Side effects of entering `state` via `via`. Failures of the
    /// individual account calls never abort the transition; they are logged,
    /// and for the profile fetch turned back into an event.
    fn act(&self, state: AccountState, via: Event) -> Option<Event> {
        match (state, via) {
            (AccountState::Start, Event::Initialize) => self.restore_account(),
            (AccountState::NotAuthenticated, Event::AccountNotFound) => {
                self.replace_account(self.accounts.create(&self.config));
                None
            }
            (AccountState::NotAuthenticated, Event::Logout) => {
                self.logged_out();
                None
            }
            (AccountState::AuthenticatedNoProfile, Event::Authenticated(auth_data)) => {
                let account = self.authenticated_account()?;
                self.install_storage_handler(&account);
                if let Err(e) = account
                    .lock()
                    .complete_oauth_flow(&auth_data.code, &auth_data.state)
                {
                    log::warn!("failed to complete the OAuth flow: {}", e);
                }
                let constellation = self.setup_constellation(&account);
                self.init_device(&constellation);
                self.notify_authenticated(auth_data.auth_type);
                self.post_authenticated();
                Some(Event::FetchProfile)
            }
            (AccountState::AuthenticatedNoProfile, Event::AccountRestored) => {
                let account = self.authenticated_account()?;
                self.install_storage_handler(&account);
                let constellation = self.setup_constellation(&account);
                constellation.ensure_capabilities(&self.device_config.capabilities);
                self.notify_authenticated(AuthType::ExistingAccount);
                self.post_authenticated();
                Some(Event::FetchProfile)
            }
            (AccountState::AuthenticatedNoProfile, Event::RecoveredFromAuthProblem) => {
                let account = self.authenticated_account()?;
                self.install_storage_handler(&account);
                let constellation = self.setup_constellation(&account);
                self.init_device(&constellation);
                self.notify_authenticated(AuthType::Recovered);
                self.post_authenticated();
                Some(Event::FetchProfile)
            }
            (AccountState::AuthenticatedNoProfile, Event::FetchProfile) => self.fetch_profile(),
            (AccountState::AuthenticatedWithProfile, Event::FetchedProfile) => {
                // Clone out of the lock: the notification may run inline.
                let profile = self.profile.lock().clone();
                if let Some(profile) = profile {
                    self.notify_profile_updated(profile);
                }
                None
            }
            (AccountState::AuthenticationProblem, Event::AuthenticationError) => {
                self.attempt_auth_recovery()
            }
            _ => None,
        }
    }

    fn restore_account(&self) -> Option<Event> {
        let blob = match self.store.read() {
            Ok(Some(blob)) => blob,
            Ok(None) => return Some(Event::AccountNotFound),
            Err(e) => {
                log::warn!("failed to read the persisted account state: {}", e);
                return Some(Event::AccountNotFound);
            }
        };
        match self.accounts.from_json(&blob) {
            Ok(handle) => {
                self.replace_account(handle);
                Some(Event::AccountRestored)
            }
            Err(e) => {
                log::warn!("failed to restore the persisted account: {}", e);
                Some(Event::AccountNotFound)
            }
        }
    }

    /// Best-effort disconnect, then drop every trace of the old account and
    /// start over with a fresh handle.
    fn logged_out(&self) {
        let account = self.account.lock().clone();
        if let Some(account) = account {
            if let Err(e) = account.lock().disconnect() {
                log::warn!("failed to disconnect from the account: {}", e);
            }
        }
        *self.profile.lock() = None;
        *self.constellation.lock() = None;
        if let Err(e) = self.store.clear() {
            log::warn!("failed to clear the persisted account state: {}", e);
        }
        self.replace_account(self.accounts.create(&self.config));
        self.notify_logged_out();
    }

    fn fetch_profile(&self) -> Option<Event> {
        let account = self.authenticated_account()?;
        let fetched = account.lock().get_profile(true);
        match fetched {
            Ok(profile) => {
                *self.profile.lock() = Some(profile);
                Some(Event::FetchedProfile)
            }
            Err(e) => {
                log::warn!("failed to fetch the profile: {}", e);
                Some(Event::FailedToFetchProfile)
            }
        }
    }

    /// Try to silently recover from an authentication problem: if the server
    /// still considers our tokens active, clearing the token cache and
    /// minting a fresh access token proves the session is usable again.
    fn attempt_auth_recovery(&self) -> Option<Event> {
        let Some(account) = self.authenticated_account() else {
            self.notify_authentication_problems();
            return None;
        };
        let active = match account.lock().check_authorization_status() {
            Ok(info) => info.active,
            Err(e) => {
                log::warn!("failed to check the authorization status: {}", e);
                false
            }
        };
        if !active {
            self.notify_authentication_problems();
            return None;
        }
        let mut handle = account.lock();
        handle.clear_access_token_cache();
        match handle.get_access_token(scopes::PROFILE) {
            Ok(_) => Some(Event::RecoveredFromAuthProblem),
            Err(e) => {
                drop(handle);
                log::warn!("failed to fetch a fresh access token: {}", e);
                self.notify_authentication_problems();
                None
            }
        }
    }

    /// After any authenticated entry, start pulling device state if this
    /// device participates in the send-tab ecosystem.
    fn post_authenticated(&self) {
        if !self.device_config.supports(DeviceCapability::SendTab) {
            return;
        }
        let constellation = self.constellation.lock().clone();
        if let Some(constellation) = constellation {
            constellation.refresh_state();
            constellation.poll_for_events();
        }
    }

    /// Install a new account handle. The constellation bound to the previous
    /// handle is dropped with it; operations still queued against it become
    /// logged no-ops.
    fn replace_account(&self, handle: Box<dyn AccountHandle>) -> Arc<AccountCell> {
        *self.constellation.lock() = None;
        let account = Arc::new(Mutex::new(handle));
        *self.account.lock() = Some(Arc::clone(&account));
        account
    }

    fn install_storage_handler(&self, account: &Arc<AccountCell>) {
        let coordinator =
            PersistenceCoordinator::new(Arc::clone(&self.store), self.persist_queue.clone());
        account
            .lock()
            .register_storage_handler(Some(Box::new(coordinator)));
    }

    /// Get the constellation for `account`, creating it (with ourselves as
    /// the device-events sink) if the handle has no constellation yet.
    fn setup_constellation(&self, account: &Arc<AccountCell>) -> DeviceConstellation {
        let mut slot = self.constellation.lock();
        if let Some(existing) = slot.as_ref() {
            if existing.is_bound_to(account) {
                return existing.clone();
            }
        }
        let constellation =
            DeviceConstellation::new(account, self.queue.clone(), Arc::clone(&self.ui));
        let sink: Weak<dyn DeviceEventsObserver> = self.weak_self.clone();
        constellation.register_device_events_observer(sink);
        *slot = Some(constellation.clone());
        constellation
    }

    fn init_device(&self, constellation: &DeviceConstellation) {
        constellation.init_device(
            &self.device_config.name,
            self.device_config.device_type,
            &self.device_config.capabilities,
        );
    }

    fn authenticated_account(&self) -> Option<Arc<AccountCell>> {
        match self.account.lock().clone() {
            Some(account) => Some(account),
            None => {
                log::error!("authenticated state reached without an account handle");
                None
            }
        }
    }

    pub(crate) fn require_account(&self) -> Result<Arc<AccountCell>> {
        self.account
            .lock()
            .clone()
            .ok_or(Error::IllegalState("initialize has not completed"))
    }

    pub(crate) fn begin_oauth_flow(&self) -> Result<String> {
        let account = self.require_account()?;
        let oauth_url = account.lock().begin_oauth_flow(&Self::default_scopes())?;
        self.remember_auth_flow(&oauth_url)?;
        Ok(oauth_url)
    }

    pub(crate) fn begin_pairing_flow(&self, pairing_url: &str) -> Result<String> {
        let account = self.require_account()?;
        let oauth_url = account
            .lock()
            .begin_pairing_flow(pairing_url, &Self::default_scopes())?;
        self.remember_auth_flow(&oauth_url)?;
        Ok(oauth_url)
    }

    fn default_scopes() -> Vec<String> {
        vec![scopes::PROFILE.to_owned(), scopes::OLD_SYNC.to_owned()]
    }

    /// Remember the `state` parameter of the URL a `begin_*` call returned,
    /// so the redirect back to us can be matched against it.
    fn remember_auth_flow(&self, oauth_url: &str) -> Result<()> {
        let url = Url::parse(oauth_url)?;
        let state = query_param(&url, "state").ok_or(Error::MissingUrlParameter("state"))?;
        *self.latest_auth_state.lock() = Some(state);
        Ok(())
    }

    pub(crate) fn finish_authentication(&self, auth_data: AuthData) -> Result<()> {
        let mut latest = self.latest_auth_state.lock();
        match latest.as_deref() {
            None => Err(Error::NoExistingAuthFlow),
            Some(expected) if expected != auth_data.state => Err(Error::WrongAuthFlow),
            Some(_) => {
                *latest = None;
                drop(latest);
                self.process_event(Event::Authenticated(auth_data));
                Ok(())
            }
        }
    }

    /// Hop a completion callback onto the UI lane.
    pub(crate) fn deliver<T, F>(&self, completion: F, result: Result<T>)
    where
        T: Send + 'static,
        F: FnOnce(Result<T>) + Send + 'static,
    {
        self.ui.dispatch(Box::new(move || completion(result)));
    }

    fn notify_authenticated(&self, auth_type: AuthType) {
        self.notify(move |observer| observer.on_authenticated(auth_type));
    }

    fn notify_profile_updated(&self, profile: Profile) {
        self.notify(move |observer| observer.on_profile_updated(&profile));
    }

    fn notify_authentication_problems(&self) {
        self.notify(|observer| observer.on_authentication_problems());
    }

    fn notify_logged_out(&self) {
        self.notify(|observer| observer.on_logged_out());
    }

    fn notify<F>(&self, f: F)
    where
        F: FnOnce(&dyn AccountObserver) + Send + 'static,
    {
        let Some(observer) = self.observer.lock().clone() else {
            return;
        };
        self.ui.dispatch(Box::new(move || {
            if let Some(observer) = observer.upgrade() {
                f(observer.as_ref());
            }
        }));
    }
}

impl DeviceEventsObserver for FxaAccountManager {
    // The constellation delivers batches here on the UI lane; forward them
    // to the application's observer, if it is still alive.
    fn on_events(&self, events: Vec<DeviceEvent>) {
        let Some(observer) = self.device_events_observer.lock().clone() else {
            return;
        };
        if let Some(observer) = observer.upgrade() {
            observer.on_events(events);
        }
    }
}

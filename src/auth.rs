/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! # Signing in and out
//!
//! Two methods are supported for connecting an application to a user's
//! account:
//!
//!    - A traditional OAuth flow, where the user is directed to a webpage to
//!      enter their account credentials and then redirected back to the
//!      application. This is exposed by [`FxaAccountManager::begin_authentication`].
//!
//!    - A device pairing flow, where the user scans a QR code presented by
//!      another app that is already connected to the account. This is exposed
//!      by [`FxaAccountManager::begin_pairing_authentication`].
//!
//! Either way, the flow ends with the user being redirected to the
//! configured `redirect_uri`; the application extracts the query parameters
//! from that URL and passes them to
//! [`FxaAccountManager::finish_authentication`].

use std::fmt;
use std::sync::Arc;

use url::Url;

use crate::{state_machine::Event, Error, FxaAccountManager, Result};

impl FxaAccountManager {
    /// Begin an OAuth sign-in flow.
    ///
    /// The completion receives the URL at which the user may authorize the
    /// application; the embedder should navigate the user there. The flow's
    /// `state` parameter is remembered so that the matching redirect can be
    /// validated by [`finish_authentication`](Self::finish_authentication).
    pub fn begin_authentication<F>(&self, completion: F)
    where
        F: FnOnce(Result<String>) + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        self.inner.queue.enqueue(Box::new(move || {
            let result = inner.begin_oauth_flow();
            inner.deliver(completion, result);
        }));
    }

    /// Begin a sign-in flow from a pairing URL scanned on another device.
    pub fn begin_pairing_authentication<F>(&self, pairing_url: &str, completion: F)
    where
        F: FnOnce(Result<String>) + Send + 'static,
    {
        let pairing_url = pairing_url.to_owned();
        let inner = Arc::clone(&self.inner);
        self.inner.queue.enqueue(Box::new(move || {
            let result = inner.begin_pairing_flow(&pairing_url);
            inner.deliver(completion, result);
        }));
    }

    /// Complete an in-flight sign-in flow with the parameters carried by the
    /// redirect URL.
    ///
    /// Fails with [`Error::NoExistingAuthFlow`] when no flow was started, and
    /// with [`Error::WrongAuthFlow`] when `auth_data.state` does not match
    /// the flow most recently started by a `begin_*` call.
    pub fn finish_authentication<F>(&self, auth_data: AuthData, completion: F)
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        self.inner.queue.enqueue(Box::new(move || {
            let result = inner.finish_authentication(auth_data);
            inner.deliver(completion, result);
        }));
    }

    /// Log out from the account.
    ///
    /// This always succeeds from the caller's viewpoint: failure to destroy
    /// server-side tokens is logged, local state is dropped regardless, and
    /// the registered observer is notified through `on_logged_out`.
    pub fn logout<F>(&self, completion: F)
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        self.inner.queue.enqueue(Box::new(move || {
            inner.process_event(Event::Logout);
            inner.deliver(completion, Ok(()));
        }));
    }

    /// Tell the manager that some other component hit an authentication
    /// problem with the account (e.g. sync was rejected with an auth error).
    ///
    /// The manager double-checks the authorization status and either recovers
    /// silently or moves the account into the authentication-problem state,
    /// notifying the observer through `on_authentication_problems`.
    pub fn on_auth_issues(&self) {
        let inner = Arc::clone(&self.inner);
        self.inner.queue.enqueue(Box::new(move || {
            inner.process_event(Event::AuthenticationError);
        }));
    }
}

/// How an account reached its authenticated state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthType {
    /// Restored from a previously persisted session.
    ExistingAccount,
    Signin,
    Signup,
    Pairing,
    /// Silently recovered from an authentication problem.
    Recovered,
    /// Any other `action` the web content reported for the flow.
    Other(String),
}

impl AuthType {
    /// Map the `action` query parameter of a redirect URL.
    ///
    /// `ExistingAccount` and `Recovered` are produced internally by the
    /// manager, never from parameters.
    pub fn from_action(action: &str) -> Self {
        match action {
            "signin" => AuthType::Signin,
            "signup" => AuthType::Signup,
            "pairing" => AuthType::Pairing,
            other => AuthType::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthType::ExistingAccount => write!(f, "existing_account"),
            AuthType::Signin => write!(f, "signin"),
            AuthType::Signup => write!(f, "signup"),
            AuthType::Pairing => write!(f, "pairing"),
            AuthType::Recovered => write!(f, "recovered"),
            AuthType::Other(action) => write!(f, "other:{action}"),
        }
    }
}

/// The parameters carried by an OAuth redirect URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthData {
    pub code: String,
    pub state: String,
    pub auth_type: AuthType,
}

impl AuthData {
    /// Extract `code`, `state` and `action` from a redirect URL.
    pub fn from_redirect_url(redirect_url: &str) -> Result<Self> {
        let url = Url::parse(redirect_url)?;
        let code = query_param(&url, "code").ok_or(Error::MissingUrlParameter("code"))?;
        let state = query_param(&url, "state").ok_or(Error::MissingUrlParameter("state"))?;
        let auth_type = match query_param(&url, "action") {
            Some(action) => AuthType::from_action(&action),
            None => AuthType::Other("unknown".to_owned()),
        };
        Ok(AuthData {
            code,
            state,
            auth_type,
        })
    }
}

pub(crate) fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

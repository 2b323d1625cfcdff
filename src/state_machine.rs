/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! # Account lifecycle state machine
//!
//! [`next`] is the pure transition table over the account lifecycle; the side
//! effects that accompany each transition live with the manager core. Pairs
//! not listed in the table produce no transition: the caller logs and drops
//! the event.

use std::fmt;

use crate::AuthData;

/// The authentication states an account moves through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccountState {
    /// Initial state; nothing has been restored yet.
    Start,
    /// No usable account. Either there never was one, or the user logged out.
    NotAuthenticated,
    /// Authenticated, but the profile has not been fetched yet.
    AuthenticatedNoProfile,
    /// Authenticated with a cached profile.
    AuthenticatedWithProfile,
    /// The cached tokens are known or believed to be invalid; the user may
    /// need to re-authenticate.
    AuthenticationProblem,
}

/// Events fed into the state machine, either by public operations or as
/// follow-ups produced by side effects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Event {
    Initialize,
    AccountNotFound,
    AccountRestored,
    Authenticated(AuthData),
    AuthenticationError,
    RecoveredFromAuthProblem,
    FetchProfile,
    FetchedProfile,
    FailedToFetchProfile,
    Logout,
}

/// State transition for an event.
///
/// Returns `None` for pairs with no listed transition; the state is then left
/// unchanged and no side effect runs.
pub(crate) fn next(state: AccountState, event: &Event) -> Option<AccountState> {
    use AccountState::*;
    use Event::*;
    match (state, event) {
        (Start, Initialize) => Some(Start),
        (Start, AccountNotFound) => Some(NotAuthenticated),
        (Start, AccountRestored) => Some(AuthenticatedNoProfile),

        (NotAuthenticated, Authenticated(_)) => Some(AuthenticatedNoProfile),

        (AuthenticatedNoProfile, AuthenticationError) => Some(AuthenticationProblem),
        (AuthenticatedNoProfile, FetchProfile) => Some(AuthenticatedNoProfile),
        (AuthenticatedNoProfile, FetchedProfile) => Some(AuthenticatedWithProfile),
        (AuthenticatedNoProfile, FailedToFetchProfile) => Some(AuthenticatedNoProfile),
        (AuthenticatedNoProfile, Logout) => Some(NotAuthenticated),

        (AuthenticatedWithProfile, AuthenticationError) => Some(AuthenticationProblem),
        (AuthenticatedWithProfile, Logout) => Some(NotAuthenticated),

        (AuthenticationProblem, Authenticated(_)) => Some(AuthenticatedNoProfile),
        (AuthenticationProblem, RecoveredFromAuthProblem) => Some(AuthenticatedNoProfile),
        (AuthenticationProblem, Logout) => Some(NotAuthenticated),

        _ => None,
    }
}

// These end up in logs, so they must not leak PII. In general this means
// they don't output values for inner fields.

impl fmt::Display for AccountState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "Start",
            Self::NotAuthenticated => "NotAuthenticated",
            Self::AuthenticatedNoProfile => "AuthenticatedNoProfile",
            Self::AuthenticatedWithProfile => "AuthenticatedWithProfile",
            Self::AuthenticationProblem => "AuthenticationProblem",
        };
        write!(f, "{name}")
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initialize => "Initialize",
            Self::AccountNotFound => "AccountNotFound",
            Self::AccountRestored => "AccountRestored",
            Self::Authenticated(_) => "Authenticated",
            Self::AuthenticationError => "AuthenticationError",
            Self::RecoveredFromAuthProblem => "RecoveredFromAuthProblem",
            Self::FetchProfile => "FetchProfile",
            Self::FetchedProfile => "FetchedProfile",
            Self::FailedToFetchProfile => "FailedToFetchProfile",
            Self::Logout => "Logout",
        };
        write!(f, "{name}")
    }
}

/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

/// Error type surfaced by the underlying account library.
///
/// Precise details of the failure are hidden from the manager. The type of the
/// error indicates how the calling code should respond.
#[derive(Debug, thiserror::Error)]
pub enum FxaError {
    /// Thrown when there was a problem with the authentication status of the
    /// account, such as an expired token.
    #[error("authentication error")]
    Authentication,
    /// Thrown if an operation fails due to network access problems.
    /// The application may retry at a later time once connectivity is restored.
    #[error("network error")]
    Network,
    /// A catch-all for other unspecified errors.
    #[error("unexpected error: {0}")]
    Other(String),
}

/// Errors thrown by [`FxaAccountManager`](crate::FxaAccountManager) operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A failure originating in the underlying account library, surfaced
    /// verbatim.
    #[error("account error: {0}")]
    Account(#[from] FxaError),

    /// `finish_authentication` was called before any `begin_*` flow.
    #[error("no authentication flow was in progress")]
    NoExistingAuthFlow,

    /// The `state` parameter of the redirect did not match the flow most
    /// recently started by a `begin_*` call.
    #[error("the authentication flow was not the most recently started one")]
    WrongAuthFlow,

    /// An operation that requires a live account handle was invoked before
    /// `initialize` completed.
    #[error("illegal manager state: {0}")]
    IllegalState(&'static str),

    #[error("malformed URL: {0}")]
    MalformedUrl(#[from] url::ParseError),

    #[error("missing URL parameter: {0}")]
    MissingUrlParameter(&'static str),
}

/// Result type for operations on the underlying account library.
pub type ApiResult<T> = std::result::Result<T, FxaError>;

/// Result type for manager operations.
pub type Result<T> = std::result::Result<T, Error>;

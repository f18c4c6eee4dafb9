//! # Session State Machine
//!
//! The authoritative lifecycle controller for issuance sessions. Every other
//! component's outcome is expressed as a state transition plus a persisted
//! mutation and an emitted event; [`commit`] is the only path by which a
//! session's state changes.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::instrument;

use crate::provider::{EventSink, Provider, SessionStore};
use crate::types::CredentialOffer;
use crate::{Error, Result};

/// Lifecycle states of an issuance session.
///
/// Sessions advance `OfferCreated → OfferUriRetrieved → AccessTokenCreated →
/// CredentialRequestReceived → CredentialsPartiallyIssued → Completed`, with
/// `Error` reachable from any non-terminal state via [`abort`].
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// The offer has been created and is awaiting the wallet.
    #[default]
    OfferCreated,

    /// The wallet has retrieved the offer from its URI.
    OfferUriRetrieved,

    /// The wallet has exchanged the offer's grant for an access token.
    AccessTokenCreated,

    /// A credential request has arrived. Recorded independent of whether the
    /// request is ultimately satisfied.
    CredentialRequestReceived,

    /// Some, but not all, offered credentials have been issued.
    CredentialsPartiallyIssued,

    /// All offered credentials have been issued.
    Completed,

    /// The session was abandoned after an unrecoverable failure, as recorded
    /// by the host.
    Error,
}

impl Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OfferCreated => write!(f, "offer_created"),
            Self::OfferUriRetrieved => write!(f, "offer_uri_retrieved"),
            Self::AccessTokenCreated => write!(f, "access_token_created"),
            Self::CredentialRequestReceived => write!(f, "credential_request_received"),
            Self::CredentialsPartiallyIssued => write!(f, "credentials_partially_issued"),
            Self::Completed => write!(f, "completed"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// One offer-to-completion issuance lifecycle.
///
/// Invariant: `issued_credentials` is a subset of the offer's configuration
/// ids and never contains a configuration id twice. Sessions are created by
/// the offer builder and mutated only through [`commit`]; the engine never
/// deletes them.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct IssuanceSession {
    /// Session identifier.
    pub id: String,

    /// The issuer the session belongs to.
    pub credential_issuer: String,

    /// Current lifecycle state.
    pub state: SessionState,

    /// The credential offer the session was created for.
    pub credential_offer: CredentialOffer,

    /// URL the wallet can use to retrieve the offer.
    pub credential_offer_uri: String,

    /// Correlates an Authorization Request to this session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_state: Option<String>,

    /// The pre-authorized code bound to the offer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_authorized_code: Option<String>,

    /// The Transaction Code (user PIN) the holder must present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_code: Option<String>,

    /// Configuration ids already issued in this session, in issuance order.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub issued_credentials: Vec<String>,

    /// Opaque host-supplied metadata.
    #[serde(skip_serializing_if = "Map::is_empty", default)]
    pub metadata: Map<String, Value>,
}

impl IssuanceSession {
    /// Fails with `IllegalSessionState` unless the session is in one of the
    /// allowed states. Every mutating operation calls this first.
    ///
    /// # Errors
    ///
    /// Returns `Error::IllegalSessionState` when the current state is not in
    /// `allowed`.
    pub fn assert_state(&self, allowed: &[SessionState]) -> Result<()> {
        if !allowed.contains(&self.state) {
            return Err(Error::IllegalSessionState(format!(
                "operation not permitted in state {}",
                self.state
            )));
        }
        Ok(())
    }

    /// Configuration ids offered but not yet issued, in offer order.
    #[must_use]
    pub fn unissued(&self) -> Vec<String> {
        self.credential_offer
            .credential_configuration_ids
            .iter()
            .filter(|id| !self.issued_credentials.contains(id))
            .cloned()
            .collect()
    }
}

/// Emitted on every session state change.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct StateChanged {
    /// The session as persisted after the transition.
    pub session: IssuanceSession,

    /// The state before the transition. `None` on session creation.
    pub previous: Option<SessionState>,

    /// The state after the transition.
    pub current: SessionState,
}

/// Apply a state change to a session, returning the updated session and the
/// event describing the change. Pure: persistence and emission happen in
/// [`commit`].
#[must_use]
pub fn apply(
    mut session: IssuanceSession, new_state: SessionState,
) -> (IssuanceSession, StateChanged) {
    let previous = session.state;
    session.state = new_state;
    let event = StateChanged {
        session: session.clone(),
        previous: Some(previous),
        current: new_state,
    };
    (session, event)
}

/// Persist a state transition and emit its event.
///
/// This is the single mutation path for sessions. It is applied even when a
/// broader operation subsequently fails deeper in the flow: the session
/// records that a request arrived independent of the request's outcome.
///
/// # Errors
///
/// Returns `Error::ServerError` if the session cannot be persisted or the
/// event cannot be emitted.
pub async fn commit(
    provider: &impl Provider, session: IssuanceSession, new_state: SessionState,
) -> Result<IssuanceSession> {
    let (session, event) = apply(session, new_state);

    SessionStore::put(provider, &session)
        .await
        .map_err(|e| Error::ServerError(format!("issue saving session: {e}")))?;
    EventSink::emit(provider, event)
        .await
        .map_err(|e| Error::ServerError(format!("issue emitting event: {e}")))?;

    Ok(session)
}

/// Persist a newly created session and emit its creation event
/// (`previous = None`).
///
/// # Errors
///
/// Returns `Error::ServerError` if the session cannot be persisted or the
/// event cannot be emitted.
pub async fn commit_new(
    provider: &impl Provider, session: IssuanceSession,
) -> Result<IssuanceSession> {
    let event = StateChanged {
        session: session.clone(),
        previous: None,
        current: session.state,
    };

    SessionStore::put(provider, &session)
        .await
        .map_err(|e| Error::ServerError(format!("issue saving session: {e}")))?;
    EventSink::emit(provider, event)
        .await
        .map_err(|e| Error::ServerError(format!("issue emitting event: {e}")))?;

    Ok(session)
}

/// Record an unrecoverable failure: transition the session to the terminal
/// `Error` state. Invoked by the host; the engine never enters `Error` on
/// its own.
///
/// # Errors
///
/// Returns `Error::IllegalSessionState` if the session is already terminal,
/// or `Error::ServerError` on persistence failure.
#[instrument(level = "debug", skip(provider))]
pub async fn abort(provider: &impl Provider, session_id: &str) -> Result<IssuanceSession> {
    let session = SessionStore::get(provider, session_id)
        .await
        .map_err(|e| Error::InvalidRequest(format!("unknown session: {e}")))?;

    session.assert_state(&[
        SessionState::OfferCreated,
        SessionState::OfferUriRetrieved,
        SessionState::AccessTokenCreated,
        SessionState::CredentialRequestReceived,
        SessionState::CredentialsPartiallyIssued,
    ])?;

    commit(provider, session, SessionState::Error).await
}

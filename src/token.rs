//! # Token Endpoint (session side)
//!
//! Validates the grant presented in a token exchange against the session it
//! was issued for, and records the exchange as a state transition. The OAuth
//! mechanics — client authentication, DPoP proof checking, minting and
//! storing the access token — remain the host's concern: on success the host
//! binds its access token to the returned session's id.

use tracing::instrument;

use crate::provider::{Provider, SessionQuery, SessionStore};
use crate::state::{self, IssuanceSession, SessionState};
use crate::types::{TokenGrantType, TokenRequest};
use crate::{Error, Result};

/// Token request handler: accept a grant and advance the session.
///
/// # Errors
///
/// Returns `InvalidGrant` if the grant is unknown, was issued by another
/// issuer, or the Transaction Code does not match, and `IllegalSessionState`
/// if the grant was already exchanged.
#[instrument(level = "debug", skip(provider))]
pub async fn token(provider: impl Provider, request: &TokenRequest) -> Result<IssuanceSession> {
    tracing::debug!("token");

    let query = match &request.grant_type {
        TokenGrantType::AuthorizationCode { issuer_state } => {
            SessionQuery::IssuerState(issuer_state.clone())
        }
        TokenGrantType::PreAuthorizedCode { pre_authorized_code, .. } => {
            SessionQuery::PreAuthorizedCode(pre_authorized_code.clone())
        }
    };

    // RFC 6749 requires a particular error here
    let session = SessionStore::find(&provider, query)
        .await
        .map_err(|e| Error::ServerError(format!("issue fetching session: {e}")))?
        .ok_or_else(|| Error::InvalidGrant("the authorization grant is invalid".into()))?;

    session.assert_state(&[SessionState::OfferCreated, SessionState::OfferUriRetrieved])?;

    if session.credential_issuer != request.credential_issuer {
        return Err(Error::InvalidGrant("the grant was issued by another issuer".into()));
    }

    if let TokenGrantType::PreAuthorizedCode { tx_code, .. } = &request.grant_type {
        if tx_code != &session.tx_code {
            return Err(Error::InvalidGrant("invalid tx_code provided".into()));
        }
    }

    state::commit(&provider, session, SessionState::AccessTokenCreated).await
}

//! # Credential Offer Endpoint
//!
//! Used by the wallet to retrieve a previously created Credential Offer in a
//! cross-device flow: the issuer shares only the offer URI (e.g. as a QR
//! code) and the wallet fetches the offer itself.

use tracing::instrument;

use crate::provider::{Provider, SessionQuery, SessionStore};
use crate::state::{self, SessionState};
use crate::types::{CredentialOfferRequest, CredentialOfferResponse};
use crate::{Error, Result};

/// Credential Offer retrieval handler.
///
/// # Errors
///
/// Returns `InvalidRequest` if no offer exists for the id, and
/// `IllegalSessionState` if the offer was already retrieved or acted on.
#[instrument(level = "debug", skip(provider))]
pub async fn credential_offer(
    provider: impl Provider, request: &CredentialOfferRequest,
) -> Result<CredentialOfferResponse> {
    tracing::debug!("credential_offer");

    let uri = format!("{}/credential_offer/{}", request.credential_issuer, request.id);

    let session = SessionStore::find(&provider, SessionQuery::OfferUri(uri))
        .await
        .map_err(|e| Error::ServerError(format!("issue fetching session: {e}")))?
        .ok_or_else(|| Error::InvalidRequest("no credential offer found".into()))?;

    session.assert_state(&[SessionState::OfferCreated])?;

    let credential_offer = session.credential_offer.clone();
    state::commit(&provider, session, SessionState::OfferUriRetrieved).await?;

    Ok(CredentialOfferResponse { credential_offer })
}

//! # Create Offer Endpoint
//!
//! Creates a Credential Offer and the issuance session that tracks its
//! lifecycle. An issuer already interacting with a user calls this endpoint
//! to produce an offer the user's wallet can act on — shared directly, as a
//! deep link, or retrieved later from the offer URI.
//!
//! Below is a non-normative example of an offer produced for the
//! Pre-Authorized Code Grant:
//!
//! ```json
//! {
//!     "credential_issuer": "https://issuance.example.io",
//!     "credential_configuration_ids": [
//!         "EmployeeID_JWT"
//!     ],
//!     "grants": {
//!         "urn:ietf:params:oauth:grant-type:pre-authorized_code": {
//!             "pre-authorized_code": "adhjhdjajkdkhjhdj",
//!             "tx_code": {
//!                 "input_mode": "numeric",
//!                 "length": 6,
//!                 "description": "Please provide the one-time code received"
//!             }
//!        }
//!     }
//! }
//! ```

use std::collections::HashSet;

use tracing::instrument;
use uuid::Uuid;

use crate::core::generate;
use crate::provider::{Metadata, Provider};
use crate::state::{self, IssuanceSession};
use crate::types::{
    AuthorizationCodeGrant, CreateOfferRequest, CreateOfferResponse, CredentialOffer, Grants,
    PreAuthorizedCodeGrant, TxCode,
};
use crate::{Error, Result};

/// Create Offer request handler.
///
/// # Errors
///
/// Returns a protocol error if the request is invalid, and a `ServerError`
/// if a collaborator is unavailable.
#[instrument(level = "debug", skip(provider))]
pub async fn create_offer(
    provider: impl Provider, request: &CreateOfferRequest,
) -> Result<CreateOfferResponse> {
    verify(&provider, request).await?;
    process(provider, request).await
}

async fn verify(provider: &impl Provider, request: &CreateOfferRequest) -> Result<()> {
    tracing::debug!("create_offer::verify");

    let issuer = Metadata::issuer(provider, &request.credential_issuer)
        .await
        .map_err(|e| Error::ServerError(format!("metadata issue: {e}")))?;

    if request.credential_configuration_ids.is_empty() {
        return Err(Error::InvalidRequest("no credentials offered".into()));
    }

    // each configuration may be offered once
    let mut seen = HashSet::new();
    for id in &request.credential_configuration_ids {
        if !seen.insert(id) {
            return Err(Error::DuplicateOfferedCredential(format!(
                "configuration {id} is offered more than once"
            )));
        }
    }

    // at least one grant
    if !request.pre_authorize && !request.authorize {
        return Err(Error::MissingGrantConfig(
            "an offer requires a pre-authorized code or authorization code grant".into(),
        ));
    }

    // offered credentials are supported
    for id in &request.credential_configuration_ids {
        if !issuer.credential_configurations_supported.contains_key(id) {
            return Err(Error::UnsupportedCredentialType(format!(
                "configuration {id} is not supported by the issuer"
            )));
        }
    }

    Ok(())
}

// Build the offer, create the backing session, and commit it.
async fn process(
    provider: impl Provider, request: &CreateOfferRequest,
) -> Result<CreateOfferResponse> {
    tracing::debug!("create_offer::process");

    let mut pre_auth_grant = None;
    let mut auth_grant = None;
    let mut pre_authorized_code = None;
    let mut issuer_state = None;
    let mut tx_code = None;

    if request.pre_authorize {
        let code = generate::pre_authorized_code();

        let tx_code_def = if request.tx_code_required {
            tx_code = Some(generate::tx_code());
            Some(TxCode {
                input_mode: Some("numeric".into()),
                length: Some(6),
                description: Some("Please provide the one-time code received".into()),
            })
        } else {
            None
        };

        pre_auth_grant = Some(PreAuthorizedCodeGrant {
            pre_authorized_code: code.clone(),
            tx_code: tx_code_def,
            authorization_server: None,
        });
        pre_authorized_code = Some(code);
    }

    if request.authorize {
        let state_key = generate::issuer_state();
        auth_grant = Some(AuthorizationCodeGrant {
            issuer_state: Some(state_key.clone()),
            authorization_server: None,
        });
        issuer_state = Some(state_key);
    }

    let credential_offer = CredentialOffer {
        credential_issuer: request.credential_issuer.clone(),
        credential_configuration_ids: request.credential_configuration_ids.clone(),
        grants: Some(Grants {
            authorization_code: auth_grant,
            pre_authorized_code: pre_auth_grant,
        }),
    };

    let session_id = Uuid::new_v4().to_string();
    let credential_offer_uri =
        format!("{}/credential_offer/{session_id}", request.credential_issuer);

    let session = IssuanceSession {
        id: session_id.clone(),
        credential_issuer: request.credential_issuer.clone(),
        credential_offer: credential_offer.clone(),
        credential_offer_uri: credential_offer_uri.clone(),
        issuer_state,
        pre_authorized_code,
        tx_code: tx_code.clone(),
        metadata: request.metadata.clone(),
        ..IssuanceSession::default()
    };

    state::commit_new(&provider, session).await?;

    Ok(CreateOfferResponse {
        session_id,
        credential_offer,
        credential_offer_uri,
        tx_code,
    })
}

//! # Credential Endpoint
//!
//! Issues the credential(s) approved by the offer upon presentation of a
//! valid proof of possession. A wallet may submit one proof, or a batch of
//! proofs bound to the same challenge to receive one credential per proof.
//!
//! The session records that a request arrived before the request's proofs
//! are validated. A request rejected deeper in the flow therefore still
//! leaves the session in `CredentialRequestReceived`; the wallet retries
//! with the fresh challenge attached to the rejection.

use std::sync::OnceLock;

use tracing::instrument;

use crate::core::lock::KeyedLock;
use crate::provider::{CredentialMapper, Metadata, Provider, SessionStore};
use crate::state::{self, SessionState};
use crate::types::{ClaimFormat, CredentialRequest, CredentialResponse};
use crate::{matcher, nonce, proof, signing, Error, Result};

static LOCKS: OnceLock<KeyedLock> = OnceLock::new();

/// Credential request handler.
///
/// # Errors
///
/// Returns a protocol error (with a fresh `c_nonce` for proof-related kinds)
/// if the request is invalid, and a fatal error if the host's mapping
/// callback misbehaves or a collaborator is unavailable.
#[instrument(level = "debug", skip(provider))]
pub async fn credential(
    provider: impl Provider, request: &CredentialRequest,
) -> Result<CredentialResponse> {
    tracing::debug!("credential");

    // mutations to one session are serialized for the whole request
    let _guard = LOCKS.get_or_init(KeyedLock::default).lock(&request.session_id).await;

    let session = SessionStore::get(&provider, &request.session_id)
        .await
        .map_err(|e| Error::InvalidRequest(format!("unknown session: {e}")))?;
    let issuer = Metadata::issuer(&provider, &session.credential_issuer)
        .await
        .map_err(|e| Error::ServerError(format!("metadata issue: {e}")))?;

    session.assert_state(&[
        SessionState::OfferUriRetrieved,
        SessionState::AccessTokenCreated,
        SessionState::CredentialRequestReceived,
        SessionState::CredentialsPartiallyIssued,
    ])?;

    // addressing mode and format
    if let Some(identifier) = &request.credential_identifier {
        return Err(Error::UnsupportedAddressingMode(format!(
            "addressing credentials by identifier ({identifier}) is not supported"
        )));
    }
    let Some(format) = &request.format else {
        return Err(Error::UnsupportedCredentialFormat("no format specified".into()));
    };
    let format = format
        .parse::<ClaimFormat>()
        .map_err(|e| Error::UnsupportedCredentialFormat(e.to_string()))?;

    // a request without proofs earns a challenge to retry with
    let proof_jwts = request.proof_jwts();
    if proof_jwts.is_empty() {
        let (c_nonce, c_nonce_expires_in) = nonce::err_nonce(&provider, &issuer).await?;
        return Err(Error::MissingProof { c_nonce, c_nonce_expires_in });
    }

    // record request arrival, independent of the request's outcome
    let session = state::commit(&provider, session, SessionState::CredentialRequestReceived).await?;

    // proof of possession
    let signers = proof::verify_batch(&provider, &issuer, &proof_jwts).await?;
    let bindings = proof::resolve_bindings(&provider, &signers).await?;

    // configurations still issuable for this request
    let matching = matcher::matching(&issuer, &session, format);
    if matching.is_empty() {
        return Err(Error::CredentialRequestDenied(
            "no unissued configuration matches the requested format".into(),
        ));
    }

    // the host decides what is issued
    let options = CredentialMapper::select(&provider, &bindings, &matching, request)
        .await
        .map_err(|e| Error::ServerError(format!("issue mapping credential: {e}")))?;

    if session.issued_credentials.contains(&options.credential_configuration_id) {
        return Err(Error::AlreadyIssued(format!(
            "configuration {} was already issued in this session",
            options.credential_configuration_id
        )));
    }
    if options.payloads.len() != bindings.len() {
        return Err(Error::BindingCountMismatch(format!(
            "{} payloads returned for {} proofs",
            options.payloads.len(),
            bindings.len()
        )));
    }

    let Some(config) =
        issuer.credential_configurations_supported.get(&options.credential_configuration_id)
    else {
        return Err(Error::ServerError(format!(
            "mapped configuration {} is not supported by the issuer",
            options.credential_configuration_id
        )));
    };

    let credentials =
        signing::dispatch(&provider, &issuer, config, request, &options, &bindings).await?;

    // every successful response carries the next challenge
    let (c_nonce, c_nonce_expires_in) = nonce::mint(&provider, &issuer)
        .await
        .map_err(|e| Error::ServerError(format!("issue minting challenge: {e}")))?;

    // record issuance progress
    let mut session = session;
    session.issued_credentials.push(options.credential_configuration_id.clone());
    let new_state = if session.unissued().is_empty() {
        SessionState::Completed
    } else {
        SessionState::CredentialsPartiallyIssued
    };
    state::commit(&provider, session, new_state).await?;

    let mut response = CredentialResponse {
        c_nonce,
        c_nonce_expires_in,
        ..CredentialResponse::default()
    };
    if let [credential] = credentials.as_slice() {
        response.credential = Some(credential.clone());
    } else {
        response.credentials = Some(credentials);
    }

    Ok(response)
}

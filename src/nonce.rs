//! # Nonce Subsystem
//!
//! Mints and verifies short-lived anti-replay challenges (`c_nonce`) without
//! server-side state. A challenge is a signed, self-contained token carrying
//! the issuer URL and an expiry, bound to the issuer's *current* signing key.
//!
//! Because no per-nonce consumption record exists, a still-unexpired,
//! validly-signed challenge verifies more than once within its validity
//! window. Only expiry and signature bind it, so the TTL is kept short.

use anyhow::bail;
use chrono::{TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::jose::jws::{self, KeyBinding, Type};
use crate::provider::{KeyRing, Metadata, Provider};
use crate::types::{IssuerIdentity, NonceRequest, NonceResponse};
use crate::{Error, Result};

/// Challenge lifetime.
pub enum Expire {
    /// Lifetime of a minted `c_nonce`.
    Nonce,
}

impl Expire {
    /// Duration of the challenge.
    #[must_use]
    pub fn duration(&self) -> TimeDelta {
        match self {
            Self::Nonce => TimeDelta::try_minutes(5).unwrap_or_default(),
        }
    }
}

/// Claims carried by a challenge token.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct NonceClaims {
    /// The issuer the challenge was minted for.
    pub iss: String,

    /// Expiry, as a Unix timestamp.
    pub exp: i64,
}

/// Nonce request handler: mints a fresh challenge for the wallet to embed in
/// its next proof of possession.
///
/// # Errors
///
/// Returns an error if the issuer is unknown or the challenge cannot be
/// signed.
#[instrument(level = "debug", skip(provider))]
pub async fn nonce(provider: impl Provider, request: &NonceRequest) -> Result<NonceResponse> {
    tracing::debug!("nonce");

    let issuer = Metadata::issuer(&provider, &request.credential_issuer)
        .await
        .map_err(|e| Error::ServerError(format!("metadata issue: {e}")))?;

    let (c_nonce, c_nonce_expires_in) = mint(&provider, &issuer)
        .await
        .map_err(|e| Error::ServerError(format!("issue minting challenge: {e}")))?;

    Ok(NonceResponse { c_nonce, c_nonce_expires_in })
}

/// Mint a signed challenge for the issuer, returning the token and its
/// lifetime in seconds.
///
/// The token's header fixes the challenge type tag and the fingerprint of
/// the issuer's current signing key; the payload carries the issuer URL and
/// expiry. Signed with the first algorithm the key type supports.
///
/// # Errors
///
/// Returns an error if no signing key is held for the issuer or signing
/// fails.
pub async fn mint(
    provider: &impl Provider, issuer: &IssuerIdentity,
) -> anyhow::Result<(String, i64)> {
    let expires_in = Expire::Nonce.duration().num_seconds();
    let claims = NonceClaims {
        iss: issuer.credential_issuer.clone(),
        exp: (Utc::now() + Expire::Nonce.duration()).timestamp(),
    };

    let signer = KeyRing::signer(provider, &issuer.credential_issuer)?;
    let token = jws::encode(
        Type::CNonce,
        KeyBinding::KeyId(issuer.signing_key_fingerprint.clone()),
        &claims,
        &signer,
    )
    .await?;

    Ok((token, expires_in))
}

/// Verify a challenge against the issuer's current identity record.
///
/// The token verifies only if its payload issuer equals the issuer's
/// published URL exactly, its header type tag is the challenge tag, its
/// signature verifies against the key identified by the issuer's *current*
/// fingerprint, and it has not expired. The expected key is always re-derived
/// from the identity record, never from the token, so key rotation
/// invalidates outstanding challenges immediately.
///
/// # Errors
///
/// Returns an error on any verification failure. Callers collapse all
/// failures to a single generic outcome; no partial-failure detail reaches
/// the wallet.
pub async fn verify(
    provider: &impl Provider, issuer: &IssuerIdentity, token: &str,
) -> anyhow::Result<()> {
    let jwt: jws::Jwt<NonceClaims> = jws::decode(token, |_| async move {
        KeyRing::public_jwk(provider, &issuer.signing_key_fingerprint).await
    })
    .await?;

    if jwt.claims.iss != issuer.credential_issuer {
        bail!("challenge issuer mismatch");
    }
    if jwt.header.typ != Type::CNonce.to_string() {
        bail!("challenge type mismatch");
    }
    if jwt.claims.exp < Utc::now().timestamp() {
        bail!("challenge has expired");
    }

    Ok(())
}

// Mints the fresh challenge attached to proof-related protocol errors, so
// the wallet can retry immediately without a new offer.
pub(crate) async fn err_nonce(
    provider: &impl Provider, issuer: &IssuerIdentity,
) -> Result<(String, i64)> {
    mint(provider, issuer)
        .await
        .map_err(|e| Error::ServerError(format!("issue minting challenge: {e}")))
}

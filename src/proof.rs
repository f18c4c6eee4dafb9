//! # Proof Batch Validator
//!
//! Verifies the holder proof-of-possession tokens submitted in a credential
//! request, enforcing challenge consistency across the batch: every proof in
//! one request must be bound to the same, currently valid challenge.

use serde::{Deserialize, Serialize};

use crate::jose::jwk::PublicKeyJwk;
use crate::jose::jws::{self, KeyBinding, Type};
use crate::nonce;
use crate::provider::{DidResolver, Provider};
use crate::types::{IssuerIdentity, ProofClaims};
use crate::{Error, Result};

/// The holder-key reference extracted from a validated proof. Proofs bound
/// by any other method are rejected; the type has no case for them.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum ProofSigner {
    /// The proof embeds the holder's public key.
    Jwk(PublicKeyJwk),

    /// The proof references the holder's key by DID URL.
    Did {
        /// The DID URL identifying the key.
        url: String,
    },
}

/// The resolved key material for one [`ProofSigner`], used to bind a signed
/// credential to a holder key.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct HolderBinding {
    /// How the proof referenced the key.
    pub signer: ProofSigner,

    /// The holder's public key.
    pub jwk: PublicKeyJwk,
}

/// Verify a batch of proof tokens in submission order, returning the
/// extracted proof signers.
///
/// The first proof's nonce establishes the batch's expected challenge; each
/// proof's challenge is then verified against the issuer's current identity.
/// Every proof-related failure mints a fresh challenge for the wallet's
/// retry.
///
/// # Errors
///
/// Returns `MissingNonceInProof`, `InconsistentNonce`, `InvalidNonce`, or
/// `InvalidProof` (each carrying a fresh `c_nonce`) for client-correctable
/// failures, and `UnsupportedHolderBindingMethod` when a proof is bound by
/// a method the engine does not resolve.
pub async fn verify_batch(
    provider: &impl Provider, issuer: &IssuerIdentity, proof_jwts: &[String],
) -> Result<Vec<ProofSigner>> {
    tracing::debug!("proof::verify_batch");

    let mut signers = Vec::new();
    let mut expected_nonce: Option<String> = None;

    for token in proof_jwts {
        let header = match jws::decode_header(token) {
            Ok(header) => header,
            Err(e) => {
                let (c_nonce, c_nonce_expires_in) = nonce::err_nonce(provider, issuer).await?;
                return Err(Error::InvalidProof {
                    hint: format!("issue decoding proof: {e}"),
                    c_nonce,
                    c_nonce_expires_in,
                });
            }
        };

        let signer = match header.key {
            KeyBinding::Jwk(jwk) => ProofSigner::Jwk(jwk),
            KeyBinding::KeyId(kid) => {
                if !kid.starts_with("did:") {
                    return Err(Error::UnsupportedHolderBindingMethod(format!(
                        "proof key reference is not a DID URL: {kid}"
                    )));
                }
                ProofSigner::Did { url: kid }
            }
        };

        if header.typ != Type::Openid4VciProofJwt.to_string() {
            let (c_nonce, c_nonce_expires_in) = nonce::err_nonce(provider, issuer).await?;
            return Err(Error::InvalidProof {
                hint: format!("proof 'typ' is not {}", Type::Openid4VciProofJwt),
                c_nonce,
                c_nonce_expires_in,
            });
        }

        let resolving = signer.clone();
        let jwt: jws::Jwt<ProofClaims> =
            match jws::decode(token, |_| resolve_key(provider, resolving)).await {
                Ok(jwt) => jwt,
                Err(e) => {
                    let (c_nonce, c_nonce_expires_in) = nonce::err_nonce(provider, issuer).await?;
                    return Err(Error::InvalidProof {
                        hint: format!("issue verifying proof: {e}"),
                        c_nonce,
                        c_nonce_expires_in,
                    });
                }
            };

        if jwt.claims.aud != issuer.credential_issuer {
            let (c_nonce, c_nonce_expires_in) = nonce::err_nonce(provider, issuer).await?;
            return Err(Error::InvalidProof {
                hint: "proof 'aud' does not match the issuer".to_string(),
                c_nonce,
                c_nonce_expires_in,
            });
        }

        let Some(nonce_claim) = &jwt.claims.nonce else {
            let (c_nonce, c_nonce_expires_in) = nonce::err_nonce(provider, issuer).await?;
            return Err(Error::MissingNonceInProof { c_nonce, c_nonce_expires_in });
        };

        match &expected_nonce {
            None => expected_nonce = Some(nonce_claim.clone()),
            Some(expected) if expected != nonce_claim => {
                let (c_nonce, c_nonce_expires_in) = nonce::err_nonce(provider, issuer).await?;
                return Err(Error::InconsistentNonce { c_nonce, c_nonce_expires_in });
            }
            Some(_) => {}
        }

        if nonce::verify(provider, issuer, nonce_claim).await.is_err() {
            let (c_nonce, c_nonce_expires_in) = nonce::err_nonce(provider, issuer).await?;
            return Err(Error::InvalidNonce { c_nonce, c_nonce_expires_in });
        }

        signers.push(signer);
    }

    Ok(signers)
}

/// Resolve each proof signer to the holder key material a signed credential
/// will be bound to.
///
/// # Errors
///
/// Returns `Error::ServerError` if DID resolution fails.
pub async fn resolve_bindings(
    provider: &impl Provider, signers: &[ProofSigner],
) -> Result<Vec<HolderBinding>> {
    tracing::debug!("proof::resolve_bindings");

    let mut bindings = Vec::new();

    for signer in signers {
        let jwk = match signer {
            ProofSigner::Jwk(jwk) => jwk.clone(),
            ProofSigner::Did { url } => DidResolver::resolve_key(provider, url)
                .await
                .map_err(|e| Error::ServerError(format!("issue resolving DID: {e}")))?,
        };
        bindings.push(HolderBinding { signer: signer.clone(), jwk });
    }

    Ok(bindings)
}

// Resolve the public key a proof's signature must verify against.
async fn resolve_key(
    provider: &impl Provider, signer: ProofSigner,
) -> anyhow::Result<PublicKeyJwk> {
    match signer {
        ProofSigner::Jwk(jwk) => Ok(jwk),
        ProofSigner::Did { url } => DidResolver::resolve_key(provider, &url).await,
    }
}

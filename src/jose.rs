//! # JSON Object Signing
//!
//! A minimal JOSE surface: just enough compact JWS to mint and verify the
//! engine's self-describing challenge tokens and to validate holder
//! proof-of-possession tokens. General-purpose JOSE processing belongs to the
//! host.

pub mod jwk;
pub mod jws;

use std::fmt::Display;
use std::future::Future;

use serde::{Deserialize, Serialize};

/// Signing algorithms supported by the engine.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum Algorithm {
    /// Edwards-curve digital signatures (Ed25519).
    #[default]
    EdDSA,

    /// ECDSA using secp256k1 and SHA-256.
    ES256K,
}

impl Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EdDSA => write!(f, "EdDSA"),
            Self::ES256K => write!(f, "ES256K"),
        }
    }
}

/// Signer is implemented by key stores (or HSM adapters) to provide signing
/// on behalf of an issuer without the engine ever holding key material.
pub trait Signer: Send + Sync {
    /// The algorithm used by the signing key.
    fn algorithm(&self) -> Algorithm;

    /// The verification method a verifier should use to check signatures
    /// produced by this signer. Typically a DID URL + `#` + key identifier.
    fn verification_method(&self) -> String;

    /// Sign the provided message bytes.
    fn try_sign(&self, msg: &[u8]) -> impl Future<Output = anyhow::Result<Vec<u8>>> + Send;
}

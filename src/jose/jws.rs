//! # JSON Web Signature (JWS)
//!
//! Compact-serialization signing and verification ([RFC7515]) for the two
//! token kinds the engine handles itself: challenge tokens and holder
//! proof-of-possession tokens.
//!
//! [RFC7515]: https://www.rfc-editor.org/rfc/rfc7515

use std::fmt::Display;
use std::future::Future;

use anyhow::{anyhow, bail};
use base64ct::{Base64UrlUnpadded, Encoding};
use ecdsa::signature::Verifier as _;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::jose::jwk::{Curve, PublicKeyJwk};
use crate::jose::{Algorithm, Signer};

/// Registered `typ` header values understood by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Type {
    /// A holder proof-of-possession token.
    Openid4VciProofJwt,

    /// A self-describing anti-replay challenge.
    CNonce,
}

impl Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Openid4VciProofJwt => write!(f, "openid4vci-proof+jwt"),
            Self::CNonce => write!(f, "cnonce+jwt"),
        }
    }
}

/// The key (or key reference) a token's signature is bound to.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum KeyBinding {
    /// A verification-method reference, typically a DID URL. For challenge
    /// tokens, the fingerprint of the issuer's signing key.
    #[serde(rename = "kid")]
    KeyId(String),

    /// An embedded public key.
    #[serde(rename = "jwk")]
    Jwk(PublicKeyJwk),
}

/// JWS protected header.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Header {
    /// Algorithm used to sign the token.
    pub alg: Algorithm,

    /// Token type.
    pub typ: String,

    /// The signing key or a reference to it.
    #[serde(flatten)]
    pub key: KeyBinding,
}

/// A decoded token: verified header and claims.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Jwt<T> {
    /// The token's protected header.
    pub header: Header,

    /// The token's claims.
    pub claims: T,
}

/// Encode the provided claims and sign, returning the token in compact JWS
/// form.
///
/// # Errors
///
/// Returns an error if the header or claims cannot be serialized, or if the
/// signer fails to produce a signature.
pub async fn encode<T>(
    typ: Type, key: KeyBinding, claims: &T, signer: &impl Signer,
) -> anyhow::Result<String>
where
    T: Serialize + Send + Sync,
{
    let header = Header {
        alg: signer.algorithm(),
        typ: typ.to_string(),
        key,
    };

    let header = Base64UrlUnpadded::encode_string(&serde_json::to_vec(&header)?);
    let claims = Base64UrlUnpadded::encode_string(&serde_json::to_vec(claims)?);
    let payload = format!("{header}.{claims}");

    let sig = signer.try_sign(payload.as_bytes()).await?;
    let sig_enc = Base64UrlUnpadded::encode_string(&sig);

    Ok(format!("{payload}.{sig_enc}"))
}

/// Decode a token's protected header without verifying the signature.
///
/// Used to classify the signing key before the (potentially remote) key
/// resolution required for full verification.
///
/// # Errors
///
/// Returns an error if the token is not in compact JWS form or the header
/// cannot be deserialized.
pub fn decode_header(token: &str) -> anyhow::Result<Header> {
    let parts = token.split('.').collect::<Vec<&str>>();
    if parts.len() != 3 {
        bail!("invalid compact JWS format");
    }
    let decoded = Base64UrlUnpadded::decode_vec(parts[0])
        .map_err(|e| anyhow!("issue decoding header: {e}"))?;
    serde_json::from_slice(&decoded).map_err(|e| anyhow!("issue deserializing header: {e}"))
}

/// Decode and verify a compact JWS token, returning the header and claims.
///
/// The `resolver` callback maps the token's key binding to the public key the
/// signature must verify against. Callers decide the trust model: challenge
/// verification ignores the binding and resolves the issuer's *current* key;
/// proof verification resolves the holder's key.
///
/// # Errors
///
/// Returns an error if the token is malformed, the algorithm is not
/// recognised, the key cannot be resolved, or the signature does not verify.
pub async fn decode<T, F, Fut>(token: &str, resolver: F) -> anyhow::Result<Jwt<T>>
where
    T: DeserializeOwned + Send,
    F: FnOnce(KeyBinding) -> Fut + Send,
    Fut: Future<Output = anyhow::Result<PublicKeyJwk>> + Send,
{
    let parts = token.split('.').collect::<Vec<&str>>();
    if parts.len() != 3 {
        bail!("invalid compact JWS format");
    }

    let decoded = Base64UrlUnpadded::decode_vec(parts[0])
        .map_err(|e| anyhow!("issue decoding header: {e}"))?;
    let header: Header =
        serde_json::from_slice(&decoded).map_err(|e| anyhow!("issue deserializing header: {e}"))?;
    let decoded = Base64UrlUnpadded::decode_vec(parts[1])
        .map_err(|e| anyhow!("issue decoding claims: {e}"))?;
    let claims =
        serde_json::from_slice(&decoded).map_err(|e| anyhow!("issue deserializing claims: {e}"))?;
    let sig = Base64UrlUnpadded::decode_vec(parts[2])
        .map_err(|e| anyhow!("issue decoding signature: {e}"))?;

    if !(header.alg == Algorithm::ES256K || header.alg == Algorithm::EdDSA) {
        bail!("'alg' is not recognised");
    }

    let jwk = resolver(header.key.clone()).await?;
    verify(&jwk, &format!("{}.{}", parts[0], parts[1]), &sig)?;

    Ok(Jwt { header, claims })
}

/// Verify the signature of the provided message using the JWK.
///
/// # Errors
///
/// Returns an error if the signature is invalid, the JWK is invalid, or the
/// curve is unsupported.
pub fn verify(jwk: &PublicKeyJwk, msg: &str, sig: &[u8]) -> anyhow::Result<()> {
    match jwk.crv {
        Curve::Es256K => verify_es256k(jwk, msg, sig),
        Curve::Ed25519 => verify_eddsa(jwk, msg, sig),
    }
}

// Verify the signature of the provided message using the ES256K algorithm.
fn verify_es256k(jwk: &PublicKeyJwk, msg: &str, sig: &[u8]) -> anyhow::Result<()> {
    use ecdsa::{Signature, VerifyingKey};
    use k256::Secp256k1;

    let y = jwk.y.as_ref().ok_or_else(|| anyhow!("JWK 'y' is not set"))?;
    let mut sec1 = vec![0x04]; // uncompressed format
    sec1.append(&mut Base64UrlUnpadded::decode_vec(&jwk.x)?);
    sec1.append(&mut Base64UrlUnpadded::decode_vec(y)?);

    let verifying_key = VerifyingKey::<Secp256k1>::from_sec1_bytes(&sec1)?;
    let signature: Signature<Secp256k1> = Signature::from_slice(sig)?;
    let normalised = signature.normalize_s().unwrap_or(signature);

    Ok(verifying_key.verify(msg.as_bytes(), &normalised)?)
}

// Verify the signature of the provided message using the EdDSA algorithm.
fn verify_eddsa(jwk: &PublicKeyJwk, msg: &str, sig_bytes: &[u8]) -> anyhow::Result<()> {
    use ed25519_dalek::{Signature, VerifyingKey};

    let x_bytes = Base64UrlUnpadded::decode_vec(&jwk.x)
        .map_err(|e| anyhow!("unable to base64 decode JWK 'x': {e}"))?;
    let bytes = &x_bytes.try_into().map_err(|_| anyhow!("invalid public key length"))?;
    let verifying_key = VerifyingKey::from_bytes(bytes)
        .map_err(|e| anyhow!("unable to build verifying key: {e}"))?;
    let signature =
        Signature::from_slice(sig_bytes).map_err(|e| anyhow!("unable to build signature: {e}"))?;

    verifying_key
        .verify(msg.as_bytes(), &signature)
        .map_err(|e| anyhow!("unable to verify signature: {e}"))
}

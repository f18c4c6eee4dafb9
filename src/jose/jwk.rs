//! # JSON Web Key (JWK)
//!
//! Public key representation ([RFC7517]) with the fingerprint (thumbprint)
//! computation from [RFC7638] used to identify an issuer's current signing
//! key.
//!
//! [RFC7517]: https://www.rfc-editor.org/rfc/rfc7517
//! [RFC7638]: https://www.rfc-editor.org/rfc/rfc7638

use base64ct::{Base64UrlUnpadded, Encoding};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::jose::Algorithm;

/// A public key in JWK format.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct PublicKeyJwk {
    /// Key type.
    pub kty: KeyType,

    /// Cryptographic curve used with the key.
    pub crv: Curve,

    /// X coordinate (or the public key for Octet Key Pairs).
    pub x: String,

    /// Y coordinate. Only set for elliptic curve keys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,

    /// Intended use of the key, e.g. "sig".
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub use_: Option<String>,
}

/// Key types.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum KeyType {
    /// Octet key pair (Ed25519).
    #[default]
    #[serde(rename = "OKP")]
    Okp,

    /// Elliptic curve key pair.
    #[serde(rename = "EC")]
    Ec,
}

/// Cryptographic curves.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum Curve {
    /// Ed25519 signature curve.
    #[default]
    Ed25519,

    /// secp256k1 signature curve.
    #[serde(rename = "secp256k1")]
    Es256K,
}

impl PublicKeyJwk {
    /// The RFC 7638 thumbprint of the key: the SHA-256 hash of the key's
    /// required members in lexicographic order, base64url encoded.
    ///
    /// Used as the stable fingerprint identifying an issuer's current signing
    /// key. Rotation replaces the fingerprint; it does not revoke the key.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let kty = match self.kty {
            KeyType::Okp => "OKP",
            KeyType::Ec => "EC",
        };
        let crv = match self.crv {
            Curve::Ed25519 => "Ed25519",
            Curve::Es256K => "secp256k1",
        };

        let canonical = match &self.y {
            Some(y) => {
                format!(r#"{{"crv":"{crv}","kty":"{kty}","x":"{}","y":"{y}"}}"#, self.x)
            }
            None => format!(r#"{{"crv":"{crv}","kty":"{kty}","x":"{}"}}"#, self.x),
        };

        let digest = Sha256::digest(canonical.as_bytes());
        Base64UrlUnpadded::encode_string(&digest)
    }

    /// The first (preferred) signature algorithm supported by the key type.
    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        match self.crv {
            Curve::Ed25519 => Algorithm::EdDSA,
            Curve::Es256K => Algorithm::ES256K,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_jwk() -> PublicKeyJwk {
        PublicKeyJwk {
            x: "q-OkDmjY2sJ2ZvLyMv3cU0N1nC0MYNZ0zYVSI5u4Z9s".to_string(),
            ..PublicKeyJwk::default()
        }
    }

    #[test]
    fn fingerprint_is_stable() {
        assert_eq!(sample_jwk().fingerprint(), sample_jwk().fingerprint());
    }

    #[test]
    fn fingerprint_depends_on_key() {
        let mut other = sample_jwk();
        other.x = "8rmFFiUcTjjrL5mgBzWykaH39D64VD0mbDHwILvsu30".to_string();
        assert_ne!(sample_jwk().fingerprint(), other.fingerprint());
    }

    #[test]
    fn serde_renames() {
        let json = serde_json::to_value(sample_jwk()).expect("should serialize");
        assert_eq!(json["kty"], "OKP");
        assert_eq!(json["crv"], "Ed25519");
    }
}

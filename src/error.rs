//! # Errors
//!
//! Errors surfaced by the issuance engine fall into two tiers:
//!
//! * **protocol errors** — client-correctable. Returned as structured
//!   responses with an error kind and, for every proof-related kind, a fresh
//!   `c_nonce` enabling immediate retry without a new offer.
//! * **domain errors** — fatal and non-retryable. They indicate a host
//!   integration defect (an inconsistent mapping callback, an unresolvable
//!   holder binding) rather than a wallet error, and propagate unmodified.

use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

/// Error codes returned by the issuance engine.
#[derive(Error, Debug, Deserialize)]
pub enum Error {
    /// The request is missing a required parameter, includes an unsupported
    /// parameter value, repeats a parameter, or is otherwise malformed.
    #[error(r#"{{"error": "invalid_request", "error_description": "{0}"}}"#)]
    InvalidRequest(String),

    /// The provided grant (pre-authorized code or issuer state) is invalid,
    /// expired, or was issued to another session, or the Transaction Code
    /// does not match the one bound to the offer.
    #[error(r#"{{"error": "invalid_grant", "error_description": "{0}"}}"#)]
    InvalidGrant(String),

    /// An offered credential configuration id appears more than once in the
    /// offer under construction.
    #[error(r#"{{"error": "duplicate_offered_credential", "error_description": "{0}"}}"#)]
    DuplicateOfferedCredential(String),

    /// An offer must carry at least one of the pre-authorized code or
    /// authorization code grant configurations.
    #[error(r#"{{"error": "missing_grant_config", "error_description": "{0}"}}"#)]
    MissingGrantConfig(String),

    /// A requested credential configuration id is not supported by the
    /// issuer.
    #[error(r#"{{"error": "unsupported_credential_type", "error_description": "{0}"}}"#)]
    UnsupportedCredentialType(String),

    /// The session is not in a state that permits the attempted operation.
    #[error(r#"{{"error": "illegal_session_state", "error_description": "{0}"}}"#)]
    IllegalSessionState(String),

    /// The request addresses a credential by identifier, which this engine
    /// does not support.
    #[error(r#"{{"error": "unsupported_addressing_mode", "error_description": "{0}"}}"#)]
    UnsupportedAddressingMode(String),

    /// The request's credential format is missing or not recognised.
    #[error(r#"{{"error": "unsupported_credential_format", "error_description": "{0}"}}"#)]
    UnsupportedCredentialFormat(String),

    /// The request matched no credential configuration that remains unissued
    /// for the session.
    #[error(r#"{{"error": "credential_request_denied", "error_description": "{0}"}}"#)]
    CredentialRequestDenied(String),

    /// The credential request carried no proof of possession. The response
    /// contains a fresh `c_nonce` for the wallet to use when retrying.
    #[allow(missing_docs)]
    #[error(r#"{{"error": "missing_proof", "error_description": "proof of possession is required", "c_nonce": "{c_nonce}", "c_nonce_expires_in": {c_nonce_expires_in}}}"#)]
    MissingProof { c_nonce: String, c_nonce_expires_in: i64 },

    /// A proof token was malformed or its signature did not verify. The
    /// response contains a fresh `c_nonce` for the wallet to use when
    /// retrying.
    #[allow(missing_docs)]
    #[error(r#"{{"error": "invalid_proof", "error_description": "{hint}", "c_nonce": "{c_nonce}", "c_nonce_expires_in": {c_nonce_expires_in}}}"#)]
    InvalidProof { hint: String, c_nonce: String, c_nonce_expires_in: i64 },

    /// A proof token carried no nonce claim. The response contains a fresh
    /// `c_nonce` for the wallet to use when retrying.
    #[allow(missing_docs)]
    #[error(r#"{{"error": "missing_nonce_in_proof", "error_description": "proof is not bound to a challenge", "c_nonce": "{c_nonce}", "c_nonce_expires_in": {c_nonce_expires_in}}}"#)]
    MissingNonceInProof { c_nonce: String, c_nonce_expires_in: i64 },

    /// Proofs within one request are bound to different challenges. All
    /// proofs in a batch must carry the same nonce. The response contains a
    /// fresh `c_nonce` for the wallet to use when retrying.
    #[allow(missing_docs)]
    #[error(r#"{{"error": "inconsistent_nonce", "error_description": "all proofs in a request must be bound to the same challenge", "c_nonce": "{c_nonce}", "c_nonce_expires_in": {c_nonce_expires_in}}}"#)]
    InconsistentNonce { c_nonce: String, c_nonce_expires_in: i64 },

    /// The challenge bound to a proof failed verification. No further detail
    /// is disclosed. The response contains a fresh `c_nonce` for the wallet
    /// to use when retrying.
    #[allow(missing_docs)]
    #[error(r#"{{"error": "invalid_nonce", "error_description": "the challenge is invalid", "c_nonce": "{c_nonce}", "c_nonce_expires_in": {c_nonce_expires_in}}}"#)]
    InvalidNonce { c_nonce: String, c_nonce_expires_in: i64 },

    /// The mapping callback selected a credential configuration that has
    /// already been issued in this session. Fatal: indicates a host defect.
    #[error(r#"{{"error": "already_issued", "error_description": "{0}"}}"#)]
    AlreadyIssued(String),

    /// The mapping callback returned a payload count that differs from the
    /// holder binding count. Fatal: indicates a host defect.
    #[error(r#"{{"error": "binding_count_mismatch", "error_description": "{0}"}}"#)]
    BindingCountMismatch(String),

    /// A payload's declared type claim differs from the request's declared
    /// type claim. Fatal: indicates a host defect.
    #[error(r#"{{"error": "type_mismatch", "error_description": "{0}"}}"#)]
    TypeMismatch(String),

    /// A payload's declared document type differs from the request's declared
    /// document type. Fatal: indicates a host defect.
    #[error(r#"{{"error": "doc_type_mismatch", "error_description": "{0}"}}"#)]
    DocTypeMismatch(String),

    /// A proof is bound to its key by a method other than an embedded JWK or
    /// a DID URL. Fatal: the engine resolves no other binding methods.
    #[error(r#"{{"error": "unsupported_holder_binding_method", "error_description": "{0}"}}"#)]
    UnsupportedHolderBindingMethod(String),

    /// The engine encountered an unexpected condition that prevented it from
    /// fulfilling the request.
    #[error(r#"{{"error": "server_error", "error_description": "{0}"}}"#)]
    ServerError(String),
}

/// Wire-format error response body.
#[allow(clippy::module_name_repetitions)]
#[derive(Debug, Deserialize, Serialize)]
pub struct ErrorResponse {
    /// Error code.
    pub error: String,

    /// Human-readable error description.
    pub error_description: String,

    /// A fresh `c_nonce` to use when retrying proof submission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub c_nonce: Option<String>,

    /// Lifetime in seconds of the `c_nonce`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub c_nonce_expires_in: Option<i64>,
}

impl Serialize for Error {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::Error as SerdeError;

        let Ok(error) = serde_json::from_str::<ErrorResponse>(&self.to_string()) else {
            return Err(SerdeError::custom("issue deserializing error"));
        };
        error.serialize(serializer)
    }
}

impl Error {
    /// Transform the error to wire-compatible json format.
    #[must_use]
    pub fn to_json(self) -> serde_json::Value {
        serde_json::from_str(&self.to_string()).unwrap_or_default()
    }

    /// Whether the error is client-correctable: the wallet can retry after
    /// adjusting its request (with the attached fresh `c_nonce` for
    /// proof-related kinds).
    #[must_use]
    pub const fn is_protocol(&self) -> bool {
        !matches!(
            self,
            Self::AlreadyIssued(_)
                | Self::BindingCountMismatch(_)
                | Self::TypeMismatch(_)
                | Self::DocTypeMismatch(_)
                | Self::UnsupportedHolderBindingMethod(_)
                | Self::ServerError(_)
        )
    }

    /// The fresh `c_nonce` attached to proof-related kinds, if any.
    #[must_use]
    pub fn c_nonce(&self) -> Option<(&str, i64)> {
        match self {
            Self::MissingProof { c_nonce, c_nonce_expires_in }
            | Self::InvalidProof { c_nonce, c_nonce_expires_in, .. }
            | Self::MissingNonceInProof { c_nonce, c_nonce_expires_in }
            | Self::InconsistentNonce { c_nonce, c_nonce_expires_in }
            | Self::InvalidNonce { c_nonce, c_nonce_expires_in } => {
                Some((c_nonce, *c_nonce_expires_in))
            }
            _ => None,
        }
    }
}

//! # Provider
//!
//! The engine's collaborators, expressed as traits the host implements and
//! injects. The engine's dependencies are enumerable from these signatures
//! alone: there is no process-wide registry.

use std::future::Future;

use serde_json::Value;

use crate::jose::jwk::PublicKeyJwk;
use crate::jose::Signer;
use crate::proof::HolderBinding;
use crate::state::{IssuanceSession, StateChanged};
use crate::types::{
    CredentialConfiguration, CredentialRequest, IssuerIdentity, MdocSignOptions,
    OAuthServerMetadata, SdJwtSignOptions, SignOptions, W3cSignOptions,
};

/// Result type for provider (collaborator) operations.
pub type Result<T, E = anyhow::Error> = std::result::Result<T, E>;

/// Issuer Provider trait: the full set of collaborators the engine needs.
pub trait Provider:
    Metadata
    + SessionStore
    + KeyRing
    + DidResolver
    + EventSink
    + CredentialMapper
    + W3cSigner
    + SdJwtSigner
    + MdocSigner
    + Clone
{
}

/// The `Metadata` trait is used by implementers to provide issuer and
/// authorization server records to the engine.
pub trait Metadata: Send + Sync {
    /// The identity record for the specified issuer.
    fn issuer(&self, issuer_id: &str) -> impl Future<Output = Result<IssuerIdentity>> + Send;

    /// An external authorization server's metadata. Fetched only when
    /// explicitly requested; issuers otherwise reference external servers by
    /// URL alone.
    fn server(&self, server_id: &str) -> impl Future<Output = Result<OAuthServerMetadata>> + Send;
}

/// `SessionStore` is used to persist and retrieve issuance sessions between
/// requests. Persistence is last-write-wins; `put` must be atomic per
/// record.
pub trait SessionStore: Send + Sync {
    /// Store (or replace) a session, keyed by its id.
    fn put(&self, session: &IssuanceSession) -> impl Future<Output = Result<()>> + Send;

    /// Retrieve a session by its id.
    fn get(&self, session_id: &str) -> impl Future<Output = Result<IssuanceSession>> + Send;

    /// Find a session by an authorization-flow correlator.
    fn find(
        &self, query: SessionQuery,
    ) -> impl Future<Output = Result<Option<IssuanceSession>>> + Send;
}

/// Correlators a session can be looked up by.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionQuery {
    /// The offer's retrieval URI.
    OfferUri(String),

    /// The pre-authorized code bound to the offer.
    PreAuthorizedCode(String),

    /// The `issuer_state` value bound to the offer.
    IssuerState(String),
}

/// `KeyRing` fronts the wallet/key store holding the issuer's signing keys.
/// The engine never sees private key material.
pub trait KeyRing: Send + Sync {
    /// A signer for the key controlled by `controller` — an issuer identifier
    /// or a verification-method reference.
    ///
    /// # Errors
    ///
    /// Returns an error if no key is held for the controller.
    fn signer(&self, controller: &str) -> Result<impl Signer>;

    /// The public key identified by `fingerprint`.
    fn public_jwk(&self, fingerprint: &str) -> impl Future<Output = Result<PublicKeyJwk>> + Send;
}

/// `DidResolver` resolves the key material a DID URL refers to.
pub trait DidResolver: Send + Sync {
    /// Dereference a DID URL to the public key it identifies.
    fn resolve_key(&self, did_url: &str) -> impl Future<Output = Result<PublicKeyJwk>> + Send;
}

/// `EventSink` receives session lifecycle events. Every state transition
/// emits exactly one event, after the session has been persisted.
pub trait EventSink: Send + Sync {
    /// Emit a state-changed event.
    fn emit(&self, event: StateChanged) -> impl Future<Output = Result<()>> + Send;
}

/// The host's mapping callback: the extension point deciding *what* claims go
/// into a credential.
pub trait CredentialMapper: Send + Sync {
    /// Choose a credential configuration and produce one unsigned payload per
    /// holder binding.
    ///
    /// `matching` holds the configurations that remain unissued for the
    /// session and match the request's format, in offer order.
    fn select(
        &self, bindings: &[HolderBinding], matching: &[(String, CredentialConfiguration)],
        request: &CredentialRequest,
    ) -> impl Future<Output = Result<SignOptions>> + Send;
}

/// External signer for W3C credentials (`jwt_vc_json` and `ldp_vc`).
pub trait W3cSigner: Send + Sync {
    /// Sign an unsigned credential payload, returning the encoded credential.
    fn sign(
        &self, payload: &Value, options: &W3cSignOptions,
    ) -> impl Future<Output = Result<String>> + Send;
}

/// External signer for SD-JWT credentials.
pub trait SdJwtSigner: Send + Sync {
    /// Sign an unsigned credential payload, returning the encoded credential.
    fn sign(
        &self, payload: &Value, options: &SdJwtSignOptions,
    ) -> impl Future<Output = Result<String>> + Send;
}

/// External signer for mdoc credentials.
pub trait MdocSigner: Send + Sync {
    /// Sign an unsigned credential payload, returning the encoded credential.
    fn sign(
        &self, payload: &Value, options: &MdocSignOptions,
    ) -> impl Future<Output = Result<String>> + Send;
}

//! # Protocol Types
//!
//! Request, response, and configuration types for the issuance protocol.
//! Types serialize to and from JSON in accordance with the wire formats the
//! wallet sees; engine-internal records live in [`crate::state`].

use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::jose::jwk::PublicKeyJwk;
use crate::jose::Algorithm;

/// The claim format of a credential: the encoding/schema family an issued
/// credential belongs to.
///
/// The engine dispatches signing on this closed set. There is no fallback
/// case: a format outside the set cannot be represented.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub enum ClaimFormat {
    /// A W3C Verifiable Credential secured as a JWT.
    #[default]
    #[serde(rename = "jwt_vc_json")]
    JwtVc,

    /// A W3C Verifiable Credential secured with a linked-data proof.
    #[serde(rename = "ldp_vc")]
    LdpVc,

    /// An IETF SD-JWT Verifiable Credential supporting selective disclosure.
    #[serde(rename = "dc+sd-jwt")]
    SdJwtVc,

    /// An ISO mdoc (mobile document) credential.
    #[serde(rename = "mso_mdoc")]
    Mdoc,
}

impl Display for ClaimFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::JwtVc => write!(f, "jwt_vc_json"),
            Self::LdpVc => write!(f, "ldp_vc"),
            Self::SdJwtVc => write!(f, "dc+sd-jwt"),
            Self::Mdoc => write!(f, "mso_mdoc"),
        }
    }
}

impl FromStr for ClaimFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "jwt_vc_json" => Ok(Self::JwtVc),
            "ldp_vc" => Ok(Self::LdpVc),
            "dc+sd-jwt" => Ok(Self::SdJwtVc),
            "mso_mdoc" => Ok(Self::Mdoc),
            _ => Err(anyhow!("unknown claim format: {s}")),
        }
    }
}

/// Stable configuration for one issuing authority.
///
/// One identity owns many issuance sessions. The only mutable field is
/// `signing_key_fingerprint`: rotation is an atomic swap of the fingerprint,
/// and the prior key becomes unverifiable the instant it is replaced because
/// verification always re-derives the expected key from the current record.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct IssuerIdentity {
    /// The issuer's identifier: the URL wallets use to reach it.
    pub credential_issuer: String,

    /// Display properties for wallets to render.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<IssuerDisplay>,

    /// DPoP algorithms the issuer accepts at its token endpoint.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub dpop_signing_alg_values_supported: Vec<Algorithm>,

    /// Fingerprint (RFC 7638 thumbprint) of the issuer's current signing key.
    pub signing_key_fingerprint: String,

    /// External authorization servers able to authorize issuance for this
    /// issuer. When empty, the issuer acts as its own authorization server.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub authorization_servers: Vec<String>,

    /// The credential configurations the issuer is willing to issue, keyed by
    /// configuration id.
    pub credential_configurations_supported: HashMap<String, CredentialConfiguration>,
}

/// Issuer display properties.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct IssuerDisplay {
    /// Display name.
    pub name: String,

    /// Locale of the display name, as a BCP 47 language tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

/// A credential configuration: one entry in the issuer's
/// `credential_configurations_supported` metadata.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct CredentialConfiguration {
    /// The claim format credentials of this configuration are issued in.
    pub format: ClaimFormat,

    /// W3C credential definition. Set for `jwt_vc_json` and `ldp_vc`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_definition: Option<CredentialDefinition>,

    /// The SD-JWT type claim. Set for `dc+sd-jwt`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vct: Option<String>,

    /// The mdoc document type. Set for `mso_mdoc`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctype: Option<String>,

    /// Algorithms the issuer may use when signing credentials of this
    /// configuration.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub credential_signing_alg_values_supported: Vec<Algorithm>,

    /// Proof types accepted in credential requests, keyed by proof type name
    /// (currently only `jwt`).
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub proof_types_supported: HashMap<String, ProofTypesSupported>,

    /// Display properties for wallets to render.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<Vec<CredentialDisplay>>,
}

/// Algorithms accepted for a proof type.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProofTypesSupported {
    /// Algorithms a wallet may use to sign a proof of possession.
    pub proof_signing_alg_values_supported: Vec<Algorithm>,
}

/// W3C credential definition.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct CredentialDefinition {
    /// Credential type array, e.g.
    /// `["VerifiableCredential", "EmployeeIDCredential"]`.
    #[serde(rename = "type")]
    pub type_: Vec<String>,
}

/// Credential display properties.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct CredentialDisplay {
    /// Display name.
    pub name: String,

    /// Locale of the display name, as a BCP 47 language tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

// ----------------------------------------------------------------
// Credential Offer
// ----------------------------------------------------------------

/// Request to create a Credential Offer and its backing issuance session.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CreateOfferRequest {
    /// The issuer the offer is created for.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub credential_issuer: String,

    /// Identifiers of the credential configurations offered to the wallet.
    /// Each id must identify an entry in the issuer's
    /// `credential_configurations_supported` metadata, and may appear only
    /// once.
    pub credential_configuration_ids: Vec<String>,

    /// Include a Pre-Authorized Code Grant in the offer.
    #[serde(rename = "pre-authorize", default)]
    pub pre_authorize: bool,

    /// Include an Authorization Code Grant in the offer.
    #[serde(default)]
    pub authorize: bool,

    /// Whether a Transaction Code (user PIN) must be presented when
    /// exchanging the pre-authorized code.
    #[serde(default)]
    pub tx_code_required: bool,

    /// Opaque host-supplied metadata carried on the session for its lifetime.
    #[serde(skip_serializing_if = "Map::is_empty", default)]
    pub metadata: Map<String, Value>,
}

/// The response to a Create Offer request.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CreateOfferResponse {
    /// Identifier of the issuance session backing the offer.
    pub session_id: String,

    /// The Credential Offer to share with the wallet.
    pub credential_offer: CredentialOffer,

    /// URL the wallet can use to retrieve the offer in a cross-device flow.
    pub credential_offer_uri: String,

    /// The Transaction Code to communicate to the holder out of band, when
    /// one was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_code: Option<String>,
}

/// A Credential Offer: a machine-readable invitation describing which
/// credential configurations a wallet may request, and under which grant.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct CredentialOffer {
    /// The URL of the issuer the wallet is invited to obtain credentials
    /// from.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub credential_issuer: String,

    /// Identifiers of the offered credential configurations.
    pub credential_configuration_ids: Vec<String>,

    /// Grant types the issuer is prepared to process for this offer. When
    /// multiple grants are present it is at the wallet's discretion which one
    /// to use.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grants: Option<Grants>,
}

impl CredentialOffer {
    /// Generate a query string form of the offer, for use in deep links.
    ///
    /// # Errors
    ///
    /// Returns an error if the offer cannot be serialized.
    pub fn to_querystring(&self) -> anyhow::Result<String> {
        serde_qs::to_string(&self).map_err(|e| anyhow!("issue creating query string: {e}"))
    }
}

/// Grant types the issuer is prepared to process for a credential offer.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Grants {
    /// Authorization Code Grant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_code: Option<AuthorizationCodeGrant>,

    /// Pre-Authorized Code Grant.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "urn:ietf:params:oauth:grant-type:pre-authorized_code")]
    pub pre_authorized_code: Option<PreAuthorizedCodeGrant>,
}

/// Parameters for the Authorization Code Grant.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct AuthorizationCodeGrant {
    /// Links an Authorization Request to the offer context. The wallet must
    /// include this value in its Authorization Request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_state: Option<String>,

    /// Identifies which of the issuer's authorization servers to use with
    /// this grant, when the issuer metadata lists more than one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_server: Option<String>,
}

/// Parameters for the Pre-Authorized Code Grant.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct PreAuthorizedCodeGrant {
    /// The code representing the issuer's authorization for the wallet to
    /// obtain the offered credentials. Short lived and single use.
    #[serde(rename = "pre-authorized_code")]
    pub pre_authorized_code: String,

    /// Describes the Transaction Code the wallet must collect from the
    /// holder, when one is required.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_code: Option<TxCode>,

    /// Identifies which of the issuer's authorization servers to use with
    /// this grant, when the issuer metadata lists more than one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_server: Option<String>,
}

/// Describes the Transaction Code the wallet must collect from the holder.
/// The code binds the pre-authorized code to a transaction, preventing
/// replay by a party that intercepted the offer.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct TxCode {
    /// Input character set: "numeric" (default) or "text".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_mode: Option<String>,

    /// Length of the code, to help the wallet render an input screen.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<i32>,

    /// Guidance on how the holder receives the code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Request to retrieve a previously created Credential Offer by its URI id.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CredentialOfferRequest {
    /// The issuer the offer was created for.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub credential_issuer: String,

    /// The offer identifier: the last path segment of the offer URI.
    pub id: String,
}

/// The response to a Credential Offer retrieval request.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CredentialOfferResponse {
    /// The requested Credential Offer.
    pub credential_offer: CredentialOffer,
}

// ----------------------------------------------------------------
// Token
// ----------------------------------------------------------------

/// The session-side of a token exchange: the grant presented by the wallet.
/// Token minting, client authentication, and DPoP checking remain the host's
/// concern.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TokenRequest {
    /// The issuer the grant was issued by.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub credential_issuer: String,

    /// The grant being exchanged.
    #[serde(flatten)]
    pub grant_type: TokenGrantType,
}

/// Grant presented in a token exchange.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "grant_type")]
pub enum TokenGrantType {
    /// Authorization Code Grant, correlated to a session by `issuer_state`.
    #[serde(rename = "authorization_code")]
    AuthorizationCode {
        /// The `issuer_state` value from the credential offer.
        issuer_state: String,
    },

    /// Pre-Authorized Code Grant.
    #[serde(rename = "urn:ietf:params:oauth:grant-type:pre-authorized_code")]
    PreAuthorizedCode {
        /// The pre-authorized code from the credential offer.
        #[serde(rename = "pre-authorized_code")]
        pre_authorized_code: String,

        /// The Transaction Code collected from the holder, when the offer
        /// requires one.
        #[serde(skip_serializing_if = "Option::is_none")]
        tx_code: Option<String>,
    },
}

// ----------------------------------------------------------------
// Credential Request / Response
// ----------------------------------------------------------------

/// A request for issuance of one credential (or one credential per proof,
/// when a batch of proofs is submitted).
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CredentialRequest {
    /// The issuer the request is addressed to. Set by the host from the
    /// request context, not the request body.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub credential_issuer: String,

    /// The issuance session the request belongs to. Resolved by the host
    /// from its access token, not the request body.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub session_id: String,

    /// The requested claim format, as a wire-format identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Addressing a credential by identifier is not supported by this
    /// engine; a request carrying this field is rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_identifier: Option<String>,

    /// The SD-JWT type claim of the requested credential. Required when
    /// `format` is `dc+sd-jwt`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vct: Option<String>,

    /// The document type of the requested credential. Required when `format`
    /// is `mso_mdoc`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctype: Option<String>,

    /// A single proof of possession.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof: Option<SingleProof>,

    /// A batch of proofs of possession. All proofs in one request must be
    /// bound to the same challenge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proofs: Option<ProofSet>,
}

impl CredentialRequest {
    /// All proof tokens carried by the request, in submission order.
    #[must_use]
    pub fn proof_jwts(&self) -> Vec<String> {
        let mut jwts = vec![];
        if let Some(SingleProof::Jwt { jwt }) = &self.proof {
            jwts.push(jwt.clone());
        }
        if let Some(ProofSet::Jwt(batch)) = &self.proofs {
            jwts.extend(batch.iter().cloned());
        }
        jwts
    }
}

/// A single proof of possession, tagged by proof type.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "proof_type", rename_all = "snake_case")]
pub enum SingleProof {
    /// A JWT proof of possession.
    Jwt {
        /// The compact-serialized proof token.
        jwt: String,
    },
}

/// A batch of proofs of possession, keyed by proof type.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProofSet {
    /// JWT proofs of possession.
    Jwt(Vec<String>),
}

/// Claims carried by a JWT proof of possession.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProofClaims {
    /// The client id of the wallet, when one was used to obtain access.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// The issuer the proof is addressed to.
    pub aud: String,

    /// The time the proof was created, as a Unix timestamp.
    pub iat: i64,

    /// The challenge the proof is bound to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

/// The response to a credential request: the issued credential(s) plus the
/// next challenge.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CredentialResponse {
    /// The issued credential, when the request carried a single proof.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,

    /// The issued credentials, one per proof, when the request carried a
    /// batch of proofs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Vec<String>>,

    /// The challenge to embed in the next proof of possession.
    pub c_nonce: String,

    /// Lifetime in seconds of the `c_nonce`.
    pub c_nonce_expires_in: i64,
}

// ----------------------------------------------------------------
// Nonce
// ----------------------------------------------------------------

/// Request for a fresh challenge.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct NonceRequest {
    /// The issuer to mint the challenge for.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub credential_issuer: String,
}

/// A freshly minted challenge.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NonceResponse {
    /// The challenge to embed in the next proof of possession.
    pub c_nonce: String,

    /// Lifetime in seconds of the `c_nonce`.
    pub c_nonce_expires_in: i64,
}

// ----------------------------------------------------------------
// Metadata
// ----------------------------------------------------------------

/// Request for an issuer's published metadata.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct MetadataRequest {
    /// The issuer to build metadata for.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub credential_issuer: String,
}

/// An issuer's published metadata: the credential issuer document plus the
/// self-issued authorization server descriptor.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MetadataResponse {
    /// The credential issuer document.
    pub credential_issuer: IssuerMetadata,

    /// The issuer's own authorization server descriptor, used for the
    /// pre-authorized code grant.
    pub authorization_server: OAuthServerMetadata,
}

/// The published credential issuer document.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct IssuerMetadata {
    /// The issuer's identifier URL.
    pub credential_issuer: String,

    /// URL of the credential endpoint.
    pub credential_endpoint: String,

    /// URL of the nonce endpoint.
    pub nonce_endpoint: String,

    /// Issuers of the authorization servers able to authorize issuance.
    /// Absent when the issuer acts as its own authorization server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_servers: Option<Vec<String>>,

    /// The credential configurations the issuer is willing to issue.
    pub credential_configurations_supported: HashMap<String, CredentialConfiguration>,

    /// Display properties for wallets to render.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<IssuerDisplay>,
}

/// An authorization server descriptor.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct OAuthServerMetadata {
    /// The authorization server's issuer identifier.
    pub issuer: String,

    /// URL of the token endpoint.
    pub token_endpoint: String,

    /// Grant types the server supports.
    pub grant_types_supported: Vec<String>,

    /// Whether the pre-authorized grant may be exchanged without a client id.
    #[serde(default)]
    pub pre_authorized_grant_anonymous_access_supported: bool,

    /// DPoP algorithms the server accepts.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub dpop_signing_alg_values_supported: Vec<Algorithm>,
}

/// Request for an external authorization server's metadata.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ServerMetadataRequest {
    /// The issuer identifier of the authorization server.
    pub server_id: String,
}

/// An external authorization server's metadata.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ServerMetadataResponse {
    /// The fetched authorization server descriptor.
    pub authorization_server: OAuthServerMetadata,
}

// ----------------------------------------------------------------
// Signing
// ----------------------------------------------------------------

/// The host's issuance decision for one credential request: which
/// configuration to issue, in which format, with which unsigned payloads.
///
/// Produced by the mapping callback; one payload per holder binding.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct SignOptions {
    /// The credential configuration chosen for issuance.
    pub credential_configuration_id: String,

    /// The claim format to sign in.
    pub format: ClaimFormat,

    /// The verification method identifying the issuer key to sign W3C
    /// credentials with. Defaults to the issuer's own identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_method: Option<String>,

    /// One unsigned credential payload per holder binding, in proof
    /// submission order.
    pub payloads: Vec<Value>,
}

/// Instructions for the W3C credential signer.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct W3cSignOptions {
    /// The target format: `jwt_vc_json` or `ldp_vc`.
    pub format: ClaimFormat,

    /// The signature algorithm (JWT) or the algorithm selecting the proof
    /// suite (LDP).
    pub algorithm: Algorithm,

    /// The verification method to reference from the produced proof.
    pub verification_method: String,
}

/// Instructions for the SD-JWT credential signer.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct SdJwtSignOptions {
    /// The credential's type claim.
    pub vct: String,

    /// The holder key to bind the credential to (the `cnf` claim).
    pub holder_jwk: PublicKeyJwk,
}

/// Instructions for the mdoc credential signer.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct MdocSignOptions {
    /// The credential's document type.
    pub doctype: String,

    /// The holder key to bind the credential to (the device key).
    pub device_key: PublicKeyJwk,
}

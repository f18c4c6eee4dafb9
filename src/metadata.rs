//! # Metadata Endpoint
//!
//! Assembles the issuer's published capability documents: the credential
//! issuer document consumed by wallets, and the self-issued authorization
//! server descriptor used for the pre-authorized code grant. External
//! authorization servers are referenced by URL only and fetched on explicit
//! request.

use tracing::instrument;

use crate::provider::{Metadata as MetadataProvider, Provider};
use crate::types::{
    IssuerIdentity, IssuerMetadata, MetadataRequest, MetadataResponse, OAuthServerMetadata,
    ServerMetadataRequest, ServerMetadataResponse,
};
use crate::{Error, Result};

/// Metadata request handler.
///
/// # Errors
///
/// Returns a `ServerError` if the issuer record cannot be fetched.
#[instrument(level = "debug", skip(provider))]
pub async fn metadata(provider: impl Provider, request: &MetadataRequest) -> Result<MetadataResponse> {
    tracing::debug!("metadata");

    let identity = MetadataProvider::issuer(&provider, &request.credential_issuer)
        .await
        .map_err(|e| Error::ServerError(format!("metadata issue: {e}")))?;

    Ok(build(&identity))
}

/// Build the published documents from an issuer's identity record. A pure
/// function of the identity: endpoint URLs hang off the issuer URL.
#[must_use]
pub fn build(identity: &IssuerIdentity) -> MetadataResponse {
    let url = &identity.credential_issuer;

    let credential_issuer = IssuerMetadata {
        credential_issuer: url.clone(),
        credential_endpoint: format!("{url}/credential"),
        nonce_endpoint: format!("{url}/nonce"),
        authorization_servers: if identity.authorization_servers.is_empty() {
            None
        } else {
            Some(identity.authorization_servers.clone())
        },
        credential_configurations_supported: identity.credential_configurations_supported.clone(),
        display: identity.display.clone(),
    };

    // the issuer doubles as its own authorization server for the
    // pre-authorized code grant
    let authorization_server = OAuthServerMetadata {
        issuer: url.clone(),
        token_endpoint: format!("{url}/token"),
        grant_types_supported: vec![
            "authorization_code".to_string(),
            "urn:ietf:params:oauth:grant-type:pre-authorized_code".to_string(),
        ],
        pre_authorized_grant_anonymous_access_supported: true,
        dpop_signing_alg_values_supported: identity.dpop_signing_alg_values_supported.clone(),
    };

    MetadataResponse { credential_issuer, authorization_server }
}

/// Fetch an external authorization server's metadata. Lazy trust: nothing is
/// fetched until a caller asks for this specific server.
///
/// # Errors
///
/// Returns `InvalidRequest` if the server is unknown or unreachable.
#[instrument(level = "debug", skip(provider))]
pub async fn server_metadata(
    provider: impl Provider, request: &ServerMetadataRequest,
) -> Result<ServerMetadataResponse> {
    tracing::debug!("server_metadata");

    let authorization_server = MetadataProvider::server(&provider, &request.server_id)
        .await
        .map_err(|e| Error::InvalidRequest(format!("unknown authorization server: {e}")))?;

    Ok(ServerMetadataResponse { authorization_server })
}

//! # Signing Dispatcher
//!
//! Routes an unsigned credential payload to the format-specific signer,
//! validating format-specific fields before signing. The match over
//! [`ClaimFormat`] is exhaustive: an unsupported format is unrepresentable
//! rather than a runtime fallback.

use crate::jose::Signer;
use crate::proof::HolderBinding;
use crate::provider::{KeyRing, MdocSigner, Provider, SdJwtSigner, W3cSigner};
use crate::types::{
    ClaimFormat, CredentialConfiguration, CredentialRequest, IssuerIdentity, MdocSignOptions,
    SdJwtSignOptions, SignOptions, W3cSignOptions,
};
use crate::{Error, Result};

/// Sign one credential per holder binding, returning the encoded credentials
/// in binding order. Payload and binding counts are validated by the caller.
pub(crate) async fn dispatch(
    provider: &impl Provider, issuer: &IssuerIdentity, config: &CredentialConfiguration,
    request: &CredentialRequest, options: &SignOptions, bindings: &[HolderBinding],
) -> Result<Vec<String>> {
    tracing::debug!("signing::dispatch");

    let mut credentials = Vec::new();

    match options.format {
        ClaimFormat::JwtVc | ClaimFormat::LdpVc => {
            // resolve the signing key from the verification-method reference
            let controller = options
                .verification_method
                .clone()
                .unwrap_or_else(|| issuer.credential_issuer.clone());
            let signer = KeyRing::signer(provider, &controller)
                .map_err(|e| Error::ServerError(format!("issue resolving signer: {e}")))?;

            // first mutually supported signature algorithm (or proof suite)
            let algorithm = if config.credential_signing_alg_values_supported.is_empty() {
                signer.algorithm()
            } else {
                config
                    .credential_signing_alg_values_supported
                    .iter()
                    .copied()
                    .find(|alg| *alg == signer.algorithm())
                    .ok_or_else(|| {
                        Error::ServerError("no mutually supported signing algorithm".to_string())
                    })?
            };

            let sign_options = W3cSignOptions {
                format: options.format,
                algorithm,
                verification_method: signer.verification_method(),
            };

            for payload in &options.payloads {
                let credential = W3cSigner::sign(provider, payload, &sign_options)
                    .await
                    .map_err(|e| Error::ServerError(format!("issue signing credential: {e}")))?;
                credentials.push(credential);
            }
        }
        ClaimFormat::SdJwtVc => {
            let Some(expected) = &request.vct else {
                return Err(Error::TypeMismatch("request does not declare a type claim".into()));
            };

            for (payload, binding) in options.payloads.iter().zip(bindings) {
                if payload["vct"].as_str() != Some(expected.as_str()) {
                    return Err(Error::TypeMismatch(format!(
                        "payload type claim does not equal requested '{expected}'"
                    )));
                }

                let sign_options = SdJwtSignOptions {
                    vct: expected.clone(),
                    holder_jwk: binding.jwk.clone(),
                };
                let credential = SdJwtSigner::sign(provider, payload, &sign_options)
                    .await
                    .map_err(|e| Error::ServerError(format!("issue signing credential: {e}")))?;
                credentials.push(credential);
            }
        }
        ClaimFormat::Mdoc => {
            let Some(expected) = &request.doctype else {
                return Err(Error::DocTypeMismatch(
                    "request does not declare a document type".into(),
                ));
            };

            for (payload, binding) in options.payloads.iter().zip(bindings) {
                if payload["docType"].as_str() != Some(expected.as_str()) {
                    return Err(Error::DocTypeMismatch(format!(
                        "payload document type does not equal requested '{expected}'"
                    )));
                }

                let sign_options = MdocSignOptions {
                    doctype: expected.clone(),
                    device_key: binding.jwk.clone(),
                };
                let credential = MdocSigner::sign(provider, payload, &sign_options)
                    .await
                    .map_err(|e| Error::ServerError(format!("issue signing credential: {e}")))?;
                credentials.push(credential);
            }
        }
    }

    Ok(credentials)
}

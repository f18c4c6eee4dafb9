//! # Configuration Matcher
//!
//! Intersects what the wallet requested against what remains unissued for
//! the session.

use crate::state::IssuanceSession;
use crate::types::{ClaimFormat, CredentialConfiguration, IssuerIdentity};

/// The credential configurations offered to the session, not yet issued,
/// and declaring the requested format. Returned in offer order.
pub(crate) fn matching(
    issuer: &IssuerIdentity, session: &IssuanceSession, format: ClaimFormat,
) -> Vec<(String, CredentialConfiguration)> {
    session
        .unissued()
        .into_iter()
        .filter_map(|id| {
            issuer
                .credential_configurations_supported
                .get(&id)
                .map(|config| (id, config.clone()))
        })
        .filter(|(_, config)| config.format == format)
        .collect()
}

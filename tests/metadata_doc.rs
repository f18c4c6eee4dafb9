//! Published metadata: the issuer document and authorization server
//! descriptors.

mod provider;

use credenza::{Error, MetadataRequest, ServerMetadataRequest};
use provider::{Provider, CREDENTIAL_ISSUER, EXTERNAL_AS};

#[tokio::test]
async fn issuer_document() {
    let provider = Provider::new();

    let request = MetadataRequest { credential_issuer: CREDENTIAL_ISSUER.to_string() };
    let response = credenza::metadata(provider, &request).await.expect("should build");

    let doc = &response.credential_issuer;
    assert_eq!(doc.credential_issuer, CREDENTIAL_ISSUER);
    assert_eq!(doc.credential_endpoint, format!("{CREDENTIAL_ISSUER}/credential"));
    assert_eq!(doc.nonce_endpoint, format!("{CREDENTIAL_ISSUER}/nonce"));
    assert!(doc.credential_configurations_supported.contains_key("EmployeeID_JWT"));

    // the issuer doubles as its own authorization server
    assert_eq!(response.authorization_server.issuer, CREDENTIAL_ISSUER);
    assert!(response
        .authorization_server
        .grant_types_supported
        .contains(&"urn:ietf:params:oauth:grant-type:pre-authorized_code".to_string()));
}

#[tokio::test]
async fn external_server_fetched_on_request() {
    let provider = Provider::new();

    let request = ServerMetadataRequest { server_id: EXTERNAL_AS.to_string() };
    let response =
        credenza::server_metadata(provider.clone(), &request).await.expect("should fetch");
    assert_eq!(response.authorization_server.issuer, EXTERNAL_AS);

    // unknown servers are not resolved
    let request = ServerMetadataRequest { server_id: "https://nowhere.example.io".to_string() };
    let err = credenza::server_metadata(provider, &request).await.expect_err("should reject");
    assert!(matches!(err, Error::InvalidRequest(_)));
}

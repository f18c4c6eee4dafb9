//! Pre-Authorized Code Flow: offer → retrieve → token → credentials.

mod provider;

use credenza::state::SessionState;
use credenza::{
    CreateOfferRequest, CredentialOfferRequest, CredentialRequest, NonceRequest, TokenGrantType,
    TokenRequest,
};
use provider::{Provider, CREDENTIAL_ISSUER};

#[tokio::test]
async fn issuance() {
    let provider = Provider::new();

    // issuer creates an offer for two configurations
    let create_req = CreateOfferRequest {
        credential_issuer: CREDENTIAL_ISSUER.to_string(),
        credential_configuration_ids: vec![
            "EmployeeID_JWT".to_string(),
            "Identity_SD_JWT".to_string(),
        ],
        pre_authorize: true,
        tx_code_required: true,
        ..CreateOfferRequest::default()
    };
    let create_resp = credenza::create_offer(provider.clone(), &create_req)
        .await
        .expect("should create offer");

    let tx_code = create_resp.tx_code.clone().expect("tx code should be set");
    let grants = create_resp.credential_offer.grants.as_ref().expect("grants should be set");
    let pre_auth = grants.pre_authorized_code.as_ref().expect("pre-authorized grant");

    // wallet retrieves the offer from its URI
    let id = create_resp
        .credential_offer_uri
        .strip_prefix(&format!("{CREDENTIAL_ISSUER}/credential_offer/"))
        .expect("should have prefix");
    let offer_req = CredentialOfferRequest {
        credential_issuer: CREDENTIAL_ISSUER.to_string(),
        id: id.to_string(),
    };
    let offer_resp =
        credenza::credential_offer(provider.clone(), &offer_req).await.expect("should retrieve");
    assert_eq!(offer_resp.credential_offer, create_resp.credential_offer);
    assert_eq!(
        provider.session(&create_resp.session_id).state,
        SessionState::OfferUriRetrieved
    );

    // wallet exchanges the pre-authorized code (host mints the access token)
    let token_req = TokenRequest {
        credential_issuer: CREDENTIAL_ISSUER.to_string(),
        grant_type: TokenGrantType::PreAuthorizedCode {
            pre_authorized_code: pre_auth.pre_authorized_code.clone(),
            tx_code: Some(tx_code),
        },
    };
    let session = credenza::token(provider.clone(), &token_req).await.expect("should accept grant");
    assert_eq!(session.state, SessionState::AccessTokenCreated);

    // wallet obtains its first challenge
    let nonce_req = NonceRequest { credential_issuer: CREDENTIAL_ISSUER.to_string() };
    let nonce_resp = credenza::nonce(provider.clone(), &nonce_req).await.expect("should mint");

    // first credential request: jwt_vc_json
    let request = CredentialRequest {
        credential_issuer: CREDENTIAL_ISSUER.to_string(),
        session_id: session.id.clone(),
        format: Some("jwt_vc_json".to_string()),
        proof: Some(credenza::SingleProof::Jwt {
            jwt: provider::proof_jwt(Some(&nonce_resp.c_nonce)).await,
        }),
        ..CredentialRequest::default()
    };
    let response =
        credenza::credential(provider.clone(), &request).await.expect("should issue first");

    assert!(response.credential.is_some());
    assert!(response.credentials.is_none());
    assert!(response.c_nonce_expires_in > 0);

    let stored = provider.session(&session.id);
    assert_eq!(stored.state, SessionState::CredentialsPartiallyIssued);
    assert_eq!(stored.issued_credentials, vec!["EmployeeID_JWT"]);

    // second credential request: dc+sd-jwt, bound to the response challenge
    let request = CredentialRequest {
        credential_issuer: CREDENTIAL_ISSUER.to_string(),
        session_id: session.id.clone(),
        format: Some("dc+sd-jwt".to_string()),
        vct: Some("https://credentials.example.io/identity".to_string()),
        proof: Some(credenza::SingleProof::Jwt {
            jwt: provider::proof_jwt(Some(&response.c_nonce)).await,
        }),
        ..CredentialRequest::default()
    };
    let response =
        credenza::credential(provider.clone(), &request).await.expect("should issue second");
    assert!(response.credential.is_some());

    let stored = provider.session(&session.id);
    assert_eq!(stored.state, SessionState::Completed);
    assert_eq!(stored.issued_credentials, vec!["EmployeeID_JWT", "Identity_SD_JWT"]);

    // every transition was observed, starting from creation
    let events = provider.events();
    assert_eq!(events[0].previous, None);
    assert_eq!(events[0].current, SessionState::OfferCreated);
    let last = events.last().expect("events should exist");
    assert_eq!(last.previous, Some(SessionState::CredentialRequestReceived));
    assert_eq!(last.current, SessionState::Completed);

    // the issued list never left the offered set, with no duplicates
    for event in &events {
        let issued = &event.session.issued_credentials;
        assert!(issued
            .iter()
            .all(|id| event.session.credential_offer.credential_configuration_ids.contains(id)));
        let mut deduped = issued.clone();
        deduped.dedup();
        assert_eq!(&deduped, issued);
    }
}

#[tokio::test]
async fn batch_proofs_issue_one_credential_each() {
    let provider = Provider::new();

    let create_req = CreateOfferRequest {
        credential_issuer: CREDENTIAL_ISSUER.to_string(),
        credential_configuration_ids: vec!["EmployeeID_JWT".to_string()],
        pre_authorize: true,
        ..CreateOfferRequest::default()
    };
    let create_resp =
        credenza::create_offer(provider.clone(), &create_req).await.expect("should create offer");
    let grants = create_resp.credential_offer.grants.expect("grants should be set");
    let pre_auth = grants.pre_authorized_code.expect("pre-authorized grant");

    let token_req = TokenRequest {
        credential_issuer: CREDENTIAL_ISSUER.to_string(),
        grant_type: TokenGrantType::PreAuthorizedCode {
            pre_authorized_code: pre_auth.pre_authorized_code,
            tx_code: None,
        },
    };
    let session = credenza::token(provider.clone(), &token_req).await.expect("should accept grant");

    let nonce_req = NonceRequest { credential_issuer: CREDENTIAL_ISSUER.to_string() };
    let nonce_resp = credenza::nonce(provider.clone(), &nonce_req).await.expect("should mint");

    // two proofs bound to the same challenge: one credential per proof
    let request = CredentialRequest {
        credential_issuer: CREDENTIAL_ISSUER.to_string(),
        session_id: session.id.clone(),
        format: Some("jwt_vc_json".to_string()),
        proofs: Some(credenza::ProofSet::Jwt(vec![
            provider::proof_jwt(Some(&nonce_resp.c_nonce)).await,
            provider::proof_jwt_with_jwk(Some(&nonce_resp.c_nonce)).await,
        ])),
        ..CredentialRequest::default()
    };
    let response = credenza::credential(provider.clone(), &request).await.expect("should issue");

    assert!(response.credential.is_none());
    let credentials = response.credentials.expect("plural response");
    assert_eq!(credentials.len(), 2);

    let stored = provider.session(&session.id);
    assert_eq!(stored.state, SessionState::Completed);
    assert_eq!(stored.issued_credentials, vec!["EmployeeID_JWT"]);
}

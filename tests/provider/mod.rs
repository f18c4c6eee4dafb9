//! In-memory provider used by the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Utc;
use credenza::jose::jwk::PublicKeyJwk;
use credenza::jose::jws::{self, KeyBinding, Type};
use credenza::jose::{Algorithm, Signer};
use credenza::proof::HolderBinding;
use credenza::provider::SessionQuery;
use credenza::state::{IssuanceSession, StateChanged};
use credenza::{
    ClaimFormat, CredentialConfiguration, CredentialDefinition, CredentialRequest,
    IssuerIdentity, MdocSignOptions, OAuthServerMetadata, ProofClaims, ProofTypesSupported,
    SdJwtSignOptions, SignOptions, W3cSignOptions,
};
use ed25519_dalek::{Signer as _, SigningKey};
use serde_json::{json, Value};

pub const CREDENTIAL_ISSUER: &str = "https://issuance.example.io";
pub const EXTERNAL_AS: &str = "https://auth.example.io";
pub const HOLDER_DID: &str = "did:web:wallet.example.io";

const ISSUER_SECRET: &str = "AQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQE";
const ROTATED_SECRET: &str = "AwMDAwMDAwMDAwMDAwMDAwMDAwMDAwMDAwMDAwMDAwM";
const HOLDER_SECRET: &str = "AgICAgICAgICAgICAgICAgICAgICAgICAgICAgICAgI";

fn signing_key(secret: &str) -> SigningKey {
    let decoded = Base64UrlUnpadded::decode_vec(secret).expect("should decode");
    let bytes: [u8; 32] = decoded.try_into().expect("should be 32 bytes");
    SigningKey::from_bytes(&bytes)
}

fn jwk_for(key: &SigningKey) -> PublicKeyJwk {
    PublicKeyJwk {
        x: Base64UrlUnpadded::encode_string(key.verifying_key().as_bytes()),
        use_: Some("sig".to_string()),
        ..PublicKeyJwk::default()
    }
}

/// The signer fronting the issuer's (or holder's) Ed25519 key.
#[derive(Clone)]
pub struct Keystore {
    key: SigningKey,
    verification_method: String,
}

impl Signer for Keystore {
    fn algorithm(&self) -> Algorithm {
        Algorithm::EdDSA
    }

    fn verification_method(&self) -> String {
        self.verification_method.clone()
    }

    async fn try_sign(&self, msg: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(self.key.sign(msg).to_bytes().to_vec())
    }
}

/// In-memory implementation of every provider trait.
#[derive(Clone)]
pub struct Provider {
    issuers: Arc<Mutex<HashMap<String, IssuerIdentity>>>,
    keys: Arc<Mutex<HashMap<String, SigningKey>>>,
    sessions: Arc<Mutex<HashMap<String, IssuanceSession>>>,
    events: Arc<Mutex<Vec<StateChanged>>>,

    /// When set, the mapper returns this many payloads instead of one per
    /// binding.
    pub forced_payload_count: Arc<Mutex<Option<usize>>>,

    /// When set, the mapper selects this configuration id regardless of what
    /// matched.
    pub forced_configuration_id: Arc<Mutex<Option<String>>>,
}

impl Provider {
    pub fn new() -> Self {
        let issuer_key = signing_key(ISSUER_SECRET);
        let fingerprint = jwk_for(&issuer_key).fingerprint();

        let mut configurations = HashMap::new();
        configurations.insert(
            "EmployeeID_JWT".to_string(),
            CredentialConfiguration {
                format: ClaimFormat::JwtVc,
                credential_definition: Some(CredentialDefinition {
                    type_: vec![
                        "VerifiableCredential".to_string(),
                        "EmployeeIDCredential".to_string(),
                    ],
                }),
                credential_signing_alg_values_supported: vec![Algorithm::EdDSA],
                proof_types_supported: HashMap::from([(
                    "jwt".to_string(),
                    ProofTypesSupported {
                        proof_signing_alg_values_supported: vec![Algorithm::EdDSA],
                    },
                )]),
                ..CredentialConfiguration::default()
            },
        );
        configurations.insert(
            "Developer_JWT".to_string(),
            CredentialConfiguration {
                format: ClaimFormat::JwtVc,
                credential_definition: Some(CredentialDefinition {
                    type_: vec![
                        "VerifiableCredential".to_string(),
                        "DeveloperCredential".to_string(),
                    ],
                }),
                credential_signing_alg_values_supported: vec![Algorithm::EdDSA],
                ..CredentialConfiguration::default()
            },
        );
        configurations.insert(
            "Identity_SD_JWT".to_string(),
            CredentialConfiguration {
                format: ClaimFormat::SdJwtVc,
                vct: Some("https://credentials.example.io/identity".to_string()),
                ..CredentialConfiguration::default()
            },
        );
        configurations.insert(
            "DriverLicence_mdoc".to_string(),
            CredentialConfiguration {
                format: ClaimFormat::Mdoc,
                doctype: Some("org.iso.18013.5.1.mDL".to_string()),
                ..CredentialConfiguration::default()
            },
        );

        let identity = IssuerIdentity {
            credential_issuer: CREDENTIAL_ISSUER.to_string(),
            dpop_signing_alg_values_supported: vec![Algorithm::EdDSA],
            signing_key_fingerprint: fingerprint.clone(),
            credential_configurations_supported: configurations,
            ..IssuerIdentity::default()
        };

        Self {
            issuers: Arc::new(Mutex::new(HashMap::from([(
                CREDENTIAL_ISSUER.to_string(),
                identity,
            )]))),
            keys: Arc::new(Mutex::new(HashMap::from([(fingerprint, issuer_key)]))),
            sessions: Arc::new(Mutex::new(HashMap::new())),
            events: Arc::new(Mutex::new(Vec::new())),
            forced_payload_count: Arc::new(Mutex::new(None)),
            forced_configuration_id: Arc::new(Mutex::new(None)),
        }
    }

    /// The issuer's current signing key fingerprint.
    pub fn fingerprint(&self) -> String {
        self.issuers.lock().unwrap()[CREDENTIAL_ISSUER].signing_key_fingerprint.clone()
    }

    /// A signer for the issuer's current key.
    pub fn issuer_signer(&self) -> Keystore {
        let fingerprint = self.fingerprint();
        let key = self.keys.lock().unwrap()[&fingerprint].clone();
        Keystore { key, verification_method: fingerprint }
    }

    /// Swap the issuer's signing key: the identity record points at the new
    /// fingerprint and outstanding challenges stop verifying.
    pub fn rotate_issuer_key(&self) {
        let key = signing_key(ROTATED_SECRET);
        let fingerprint = jwk_for(&key).fingerprint();

        self.keys.lock().unwrap().insert(fingerprint.clone(), key);
        let mut issuers = self.issuers.lock().unwrap();
        if let Some(identity) = issuers.get_mut(CREDENTIAL_ISSUER) {
            identity.signing_key_fingerprint = fingerprint;
        }
    }

    /// Register a second issuer sharing the first issuer's signing key.
    pub fn register_issuer(&self, credential_issuer: &str) {
        let mut identity = self.issuers.lock().unwrap()[CREDENTIAL_ISSUER].clone();
        identity.credential_issuer = credential_issuer.to_string();
        self.issuers.lock().unwrap().insert(credential_issuer.to_string(), identity);
    }

    /// Events emitted so far.
    pub fn events(&self) -> Vec<StateChanged> {
        self.events.lock().unwrap().clone()
    }

    /// The session as persisted.
    pub fn session(&self, session_id: &str) -> IssuanceSession {
        self.sessions.lock().unwrap()[session_id].clone()
    }
}

impl credenza::provider::Provider for Provider {}

impl credenza::provider::Metadata for Provider {
    async fn issuer(&self, issuer_id: &str) -> anyhow::Result<IssuerIdentity> {
        self.issuers
            .lock()
            .unwrap()
            .get(issuer_id)
            .cloned()
            .ok_or_else(|| anyhow!("issuer not found: {issuer_id}"))
    }

    async fn server(&self, server_id: &str) -> anyhow::Result<OAuthServerMetadata> {
        if server_id != EXTERNAL_AS {
            return Err(anyhow!("server not found: {server_id}"));
        }
        Ok(OAuthServerMetadata {
            issuer: EXTERNAL_AS.to_string(),
            token_endpoint: format!("{EXTERNAL_AS}/token"),
            grant_types_supported: vec!["authorization_code".to_string()],
            ..OAuthServerMetadata::default()
        })
    }
}

impl credenza::provider::SessionStore for Provider {
    async fn put(&self, session: &IssuanceSession) -> anyhow::Result<()> {
        self.sessions.lock().unwrap().insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get(&self, session_id: &str) -> anyhow::Result<IssuanceSession> {
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .ok_or_else(|| anyhow!("session not found: {session_id}"))
    }

    async fn find(&self, query: SessionQuery) -> anyhow::Result<Option<IssuanceSession>> {
        let sessions = self.sessions.lock().unwrap();
        let found = sessions.values().find(|s| match &query {
            SessionQuery::OfferUri(uri) => &s.credential_offer_uri == uri,
            SessionQuery::PreAuthorizedCode(code) => {
                s.pre_authorized_code.as_deref() == Some(code)
            }
            SessionQuery::IssuerState(state) => s.issuer_state.as_deref() == Some(state),
        });
        Ok(found.cloned())
    }
}

impl credenza::provider::KeyRing for Provider {
    fn signer(&self, controller: &str) -> anyhow::Result<impl Signer> {
        let issuers = self.issuers.lock().unwrap();
        let identity = issuers
            .values()
            .find(|i| i.credential_issuer == controller)
            .ok_or_else(|| anyhow!("no key held for {controller}"))?;

        let fingerprint = identity.signing_key_fingerprint.clone();
        let key = self.keys.lock().unwrap()[&fingerprint].clone();
        Ok(Keystore { key, verification_method: fingerprint })
    }

    async fn public_jwk(&self, fingerprint: &str) -> anyhow::Result<PublicKeyJwk> {
        let keys = self.keys.lock().unwrap();
        let key = keys.get(fingerprint).ok_or_else(|| anyhow!("key not found"))?;
        Ok(jwk_for(key))
    }
}

impl credenza::provider::DidResolver for Provider {
    async fn resolve_key(&self, did_url: &str) -> anyhow::Result<PublicKeyJwk> {
        if !did_url.starts_with(HOLDER_DID) {
            return Err(anyhow!("unable to resolve {did_url}"));
        }
        Ok(jwk_for(&signing_key(HOLDER_SECRET)))
    }
}

impl credenza::provider::EventSink for Provider {
    async fn emit(&self, event: StateChanged) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

impl credenza::provider::CredentialMapper for Provider {
    async fn select(
        &self, bindings: &[HolderBinding], matching: &[(String, CredentialConfiguration)],
        _request: &CredentialRequest,
    ) -> anyhow::Result<SignOptions> {
        let (id, config) = match self.forced_configuration_id.lock().unwrap().clone() {
            Some(forced) => {
                let issuers = self.issuers.lock().unwrap();
                let config = issuers[CREDENTIAL_ISSUER]
                    .credential_configurations_supported
                    .get(&forced)
                    .cloned()
                    .ok_or_else(|| anyhow!("unknown configuration {forced}"))?;
                (forced, config)
            }
            None => matching.first().cloned().ok_or_else(|| anyhow!("nothing to issue"))?,
        };

        let count =
            self.forced_payload_count.lock().unwrap().unwrap_or(bindings.len());
        let payloads = (0..count).map(|_| unsigned_payload(&config)).collect();

        Ok(SignOptions {
            credential_configuration_id: id,
            format: config.format,
            verification_method: None,
            payloads,
        })
    }
}

impl credenza::provider::W3cSigner for Provider {
    async fn sign(&self, payload: &Value, options: &W3cSignOptions) -> anyhow::Result<String> {
        assert_eq!(options.algorithm, Algorithm::EdDSA);
        encode_credential(&self.issuer_signer(), payload).await
    }
}

impl credenza::provider::SdJwtSigner for Provider {
    async fn sign(&self, payload: &Value, options: &SdJwtSignOptions) -> anyhow::Result<String> {
        assert_eq!(payload["vct"].as_str(), Some(options.vct.as_str()));
        encode_credential(&self.issuer_signer(), payload).await
    }
}

impl credenza::provider::MdocSigner for Provider {
    async fn sign(&self, payload: &Value, options: &MdocSignOptions) -> anyhow::Result<String> {
        assert_eq!(payload["docType"].as_str(), Some(options.doctype.as_str()));
        encode_credential(&self.issuer_signer(), payload).await
    }
}

// Encode a stand-in credential: base64 payload + signature over it.
async fn encode_credential(signer: &Keystore, payload: &Value) -> anyhow::Result<String> {
    let body = Base64UrlUnpadded::encode_string(&serde_json::to_vec(payload)?);
    let sig = signer.try_sign(body.as_bytes()).await?;
    Ok(format!("{body}.{}", Base64UrlUnpadded::encode_string(&sig)))
}

fn unsigned_payload(config: &CredentialConfiguration) -> Value {
    match config.format {
        ClaimFormat::JwtVc | ClaimFormat::LdpVc => {
            let types = config
                .credential_definition
                .as_ref()
                .map_or_else(|| vec!["VerifiableCredential".to_string()], |d| d.type_.clone());
            json!({
                "@context": ["https://www.w3.org/2018/credentials/v1"],
                "type": types,
                "issuer": CREDENTIAL_ISSUER,
                "credentialSubject": { "givenName": "Alice", "familyName": "Doe" }
            })
        }
        ClaimFormat::SdJwtVc => json!({
            "vct": config.vct,
            "given_name": "Alice",
            "family_name": "Doe"
        }),
        ClaimFormat::Mdoc => json!({
            "docType": config.doctype,
            "org.iso.18013.5.1": { "family_name": "Doe" }
        }),
    }
}

/// A proof of possession signed with the holder's key, bound to its key by
/// DID URL.
pub async fn proof_jwt(nonce: Option<&str>) -> String {
    let signer = Keystore {
        key: signing_key(HOLDER_SECRET),
        verification_method: format!("{HOLDER_DID}#key-1"),
    };
    let claims = ProofClaims {
        iss: None,
        aud: CREDENTIAL_ISSUER.to_string(),
        iat: Utc::now().timestamp(),
        nonce: nonce.map(ToString::to_string),
    };
    jws::encode(
        Type::Openid4VciProofJwt,
        KeyBinding::KeyId(format!("{HOLDER_DID}#key-1")),
        &claims,
        &signer,
    )
    .await
    .expect("should encode proof")
}

/// A proof of possession bound to its key by an embedded JWK.
pub async fn proof_jwt_with_jwk(nonce: Option<&str>) -> String {
    let key = signing_key(HOLDER_SECRET);
    let jwk = jwk_for(&key);
    let signer = Keystore {
        key,
        verification_method: format!("{HOLDER_DID}#key-1"),
    };
    let claims = ProofClaims {
        iss: None,
        aud: CREDENTIAL_ISSUER.to_string(),
        iat: Utc::now().timestamp(),
        nonce: nonce.map(ToString::to_string),
    };
    jws::encode(Type::Openid4VciProofJwt, KeyBinding::Jwk(jwk), &claims, &signer)
        .await
        .expect("should encode proof")
}

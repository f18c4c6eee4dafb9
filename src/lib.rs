//! An engine for the server-side session lifecycle of verifiable credential
//! issuance: offer → proof of possession → signed credential.
//!
//! # Design
//!
//! **Endpoints**
//!
//! The library is architected around issuance endpoints, each with its own
//! `XxxRequest` and `XxxResponse` types serializing to and from JSON. The
//! endpoints are designed to be surfaced by Rust-based HTTP servers, such as
//! [axum](https://docs.rs/axum/latest/axum/); transport, OAuth token
//! mechanics, and wallet authentication stay outside the engine.
//!
//! Every endpoint outcome is expressed through the session state machine: a
//! state transition plus a persisted mutation and an emitted event. The
//! anti-replay challenges (`c_nonce`) wallets must bind their proofs to are
//! stateless signed tokens — no server-side nonce store exists, so a valid
//! challenge can be replayed within its (short) validity window. That is the
//! accepted trade-off; deployments needing stronger guarantees put an
//! explicit replay cache in front.
//!
//! **Providers**
//!
//! Implementers supply 'Provider' traits for the engine's collaborators:
//! session persistence, issuer records, key store, DID resolution, the
//! format-specific credential signers, the event sink, and the mapping
//! callback deciding what claims go into a credential. Dependencies are
//! injected; nothing resolves from a process-wide registry.
//!
//! # Example
//!
//! The following example demonstrates how a single endpoint might be
//! surfaced.
//!
//! ```rust,ignore
//! #[tokio::main]
//! async fn main() {
//!     // `Provider` implements the engine's provider traits
//!     let router = Router::new()
//!         // --- other routes ---
//!         .route("/credential", post(credential))
//!         // --- other routes ---
//!         .with_state(Provider::new());
//!
//!     let listener = TcpListener::bind("0.0.0.0:8080").await.expect("should bind");
//!     axum::serve(listener, router).await.expect("server should run");
//! }
//!
//! // Credential endpoint
//! async fn credential(
//!     State(provider): State<Provider>, TypedHeader(host): TypedHeader<Host>,
//!     TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
//!     Json(mut req): Json<CredentialRequest>,
//! ) -> AxResult<CredentialResponse> {
//!     // resolve issuer and session from the HTTP context
//!     req.credential_issuer = format!("http://{host}");
//!     req.session_id = session_for_token(auth.token());
//!
//!     // call endpoint
//!     credenza::credential(provider, &req).await.into()
//! }
//! ```

pub mod core;
mod create_offer;
mod credential;
mod credential_offer;
mod error;
pub mod jose;
mod matcher;
mod metadata;
pub mod nonce;
pub mod proof;
pub mod provider;
mod signing;
pub mod state;
pub mod types;
mod token;

pub use create_offer::create_offer;
pub use credential::credential;
pub use credential_offer::credential_offer;
pub use error::{Error, ErrorResponse};
pub use metadata::{build as build_metadata, metadata, server_metadata};
pub use nonce::nonce;
pub use state::abort;
pub use token::token;
/// Re-export protocol types at the crate root.
pub use types::*;

/// Result type for issuance endpoints.
pub type Result<T, E = Error> = std::result::Result<T, E>;

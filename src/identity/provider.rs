//! Single entry point for turning an authentication attempt into a principal.
//!
//! Local and federated login are a tagged variant dispatched here rather than
//! separate provider plugins, so the HTTP layer only ever calls
//! `resolve_principal`.

use crate::error::AppResult;
use crate::store::SharedMeta;

use super::credentials::CredentialVerifier;
use super::federated::FederatedIdentityResolver;
use super::principal::Principal;

#[derive(Debug, Clone)]
pub enum AuthMethod {
    Local { name: String, password: String },
    Federated { issuer: String, subject: String, display_name_hint: String },
}

pub struct AuthService {
    verifier: CredentialVerifier,
    resolver: FederatedIdentityResolver,
}

impl AuthService {
    pub fn new(store: SharedMeta) -> Self {
        Self {
            verifier: CredentialVerifier::new(store.clone()),
            resolver: FederatedIdentityResolver::new(store),
        }
    }

    pub async fn resolve_principal(&self, method: AuthMethod) -> AppResult<Principal> {
        match method {
            AuthMethod::Local { name, password } => self.verifier.verify(&name, &password).await,
            AuthMethod::Federated { issuer, subject, display_name_hint } => {
                self.resolver.resolve(&issuer, &subject, &display_name_hint).await
            }
        }
    }

    pub fn verifier(&self) -> &CredentialVerifier {
        &self.verifier
    }
}

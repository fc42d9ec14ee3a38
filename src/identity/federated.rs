//! Federated identity resolution with lazy provisioning.
//!
//! The (issuer, subject) pair is the durable identity. First sight creates a
//! principal plus its federated credential in one store write; when that write
//! loses a race to a concurrent first login, the resolver retries by
//! re-reading instead of surfacing the duplicate-key fault.

use crate::error::{AppError, AppResult};
use crate::store::SharedMeta;
use crate::tprintln;

use super::principal::Principal;

pub struct FederatedIdentityResolver {
    store: SharedMeta,
}

impl FederatedIdentityResolver {
    pub fn new(store: SharedMeta) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, issuer: &str, subject: &str, display_name_hint: &str) -> AppResult<Principal> {
        if let Some(principal) = self.store.find_federated(issuer, subject).await {
            return Ok(principal);
        }
        match self.store.create_federated_principal(issuer, subject, display_name_hint).await {
            Ok(principal) => {
                tprintln!("federated.provision issuer={} subject={} id={}", issuer, subject, principal.id);
                Ok(principal)
            }
            Err(AppError::Conflict { .. }) => {
                // Lost the create race; the winner's row must be visible now.
                self.store
                    .find_federated(issuer, subject)
                    .await
                    .ok_or_else(|| AppError::internal("federated_retry", "credential vanished after conflict"))
            }
            Err(e) => Err(e),
        }
    }
}

//! Identity resolution and session management for drivebox.
//! Keep the public surface thin and split implementation across sub-modules.

mod credentials;
mod federated;
mod principal;
mod provider;
mod session;

pub use credentials::CredentialVerifier;
pub use federated::FederatedIdentityResolver;
pub use principal::Principal;
pub use provider::{AuthMethod, AuthService};
pub use session::SessionManager;

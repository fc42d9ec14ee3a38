//! Environment-driven configuration.
//!
//! Everything is read once at startup into a `Config` value that gets passed
//! into the server explicitly. Secrets (OAuth client credentials) are carried
//! as opaque strings.

use crate::oauth::OidcConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    /// Root folder for the metadata snapshot.
    pub db_root: String,
    /// Root folder for blob payloads.
    pub blob_root: String,
    /// Externally visible base URL, used for blob access URLs and the OAuth
    /// redirect.
    pub public_url: String,
    pub session_ttl_secs: i64,
    pub session_sweep_secs: u64,
    pub max_upload_bytes: usize,
    /// Route key for the configured provider (e.g. "google"), when present.
    pub oidc_provider: Option<(String, OidcConfig)>,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

impl Config {
    pub fn from_env() -> Self {
        let http_port = env_or("DRIVEBOX_HTTP_PORT", "8080").parse().unwrap_or(8080);
        let public_url = env_or("DRIVEBOX_PUBLIC_URL", &format!("http://localhost:{}", http_port));
        let oidc_provider = std::env::var("DRIVEBOX_OIDC_CLIENT_ID").ok().map(|client_id| {
            let name = env_or("DRIVEBOX_OIDC_PROVIDER", "google");
            let cfg = OidcConfig {
                issuer: env_or("DRIVEBOX_OIDC_ISSUER", "https://accounts.google.com"),
                client_id,
                client_secret: env_or("DRIVEBOX_OIDC_CLIENT_SECRET", ""),
                auth_endpoint: env_or("DRIVEBOX_OIDC_AUTH_URL", "https://accounts.google.com/o/oauth2/v2/auth"),
                token_endpoint: env_or("DRIVEBOX_OIDC_TOKEN_URL", "https://oauth2.googleapis.com/token"),
                userinfo_endpoint: env_or("DRIVEBOX_OIDC_USERINFO_URL", "https://openidconnect.googleapis.com/v1/userinfo"),
                redirect_url: format!("{}/user/oauth2/redirect/{}", public_url.trim_end_matches('/'), name),
            };
            (name, cfg)
        });
        Self {
            http_port,
            db_root: env_or("DRIVEBOX_DB_FOLDER", "data/meta"),
            blob_root: env_or("DRIVEBOX_BLOB_FOLDER", "data/blobs"),
            public_url,
            session_ttl_secs: env_or("DRIVEBOX_SESSION_TTL_SECS", "2592000").parse().unwrap_or(2_592_000), // 30 days
            session_sweep_secs: env_or("DRIVEBOX_SESSION_SWEEP_SECS", "120").parse().unwrap_or(120),
            max_upload_bytes: env_or("DRIVEBOX_MAX_UPLOAD_BYTES", "10485760").parse().unwrap_or(10 * 1024 * 1024),
            oidc_provider,
        }
    }
}

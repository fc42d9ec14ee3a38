//!
//! drivebox HTTP server
//! --------------------
//! Axum-based HTTP surface for the file drive: session lifecycle (local and
//! federated login), owner-gated file metadata routes, and the public
//! share-token resolver.
//!
//! Responsibilities:
//! - Session management with an HttpOnly cookie holding an opaque session id.
//! - Login/signup/logout endpoints backed by the identity components.
//! - File routes delegating to the authorization gate and share manager.
//! - Public `/files/shared/{token}` resolution redirecting to the blob URL.
//! - Background sweep of expired sessions, decoupled from request handling.

use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::blobstore::{BlobStore, FsBlobStore};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::files::{FileGate, FileRecord, ShareLinkManager};
use crate::identity::{AuthMethod, AuthService, Principal, SessionManager};
use crate::oauth::{IdentityProvider, OidcProvider, StateRegistry};
use crate::store::MetaStore;

const SESSION_COOKIE: &str = "drivebox_session";

/// Shared server state injected into all handlers. Every component is built
/// once at startup and passed in explicitly; nothing reaches for globals.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub auth: Arc<AuthService>,
    pub files: Arc<FileGate>,
    pub shares: Arc<ShareLinkManager>,
    pub blobs: Arc<dyn BlobStore>,
    pub providers: Arc<HashMap<String, Arc<dyn IdentityProvider>>>,
    pub oauth_states: Arc<StateRegistry>,
    pub public_url: Arc<String>,
}

/// Convenience entry point reading configuration from the environment.
pub async fn run() -> anyhow::Result<()> {
    run_with_config(Config::from_env()).await
}

pub async fn run_with_config(cfg: Config) -> anyhow::Result<()> {
    let store = MetaStore::open(&cfg.db_root)
        .with_context(|| format!("While opening metadata store under: {}", cfg.db_root))?;
    let blobs: Arc<dyn BlobStore> = Arc::new(
        FsBlobStore::new(&cfg.blob_root, &cfg.public_url, cfg.max_upload_bytes)
            .with_context(|| format!("While opening blob store under: {}", cfg.blob_root))?,
    );

    let sessions = Arc::new(SessionManager::new(store.clone(), chrono::Duration::seconds(cfg.session_ttl_secs)));
    let mut providers: HashMap<String, Arc<dyn IdentityProvider>> = HashMap::new();
    if let Some((name, oidc)) = cfg.oidc_provider.clone() {
        info!("federated login enabled: provider='{}' issuer='{}'", name, oidc.issuer);
        providers.insert(name, Arc::new(OidcProvider::new(oidc)));
    }

    let state = AppState {
        sessions: sessions.clone(),
        auth: Arc::new(AuthService::new(store.clone())),
        files: Arc::new(FileGate::new(store.clone())),
        shares: Arc::new(ShareLinkManager::new(store.clone())),
        blobs,
        providers: Arc::new(providers),
        oauth_states: Arc::new(StateRegistry::new()),
        public_url: Arc::new(cfg.public_url.clone()),
    };

    // Background session sweeper, independent of request handling.
    {
        let sessions_for_sweep = sessions.clone();
        let interval = std::time::Duration::from_secs(cfg.session_sweep_secs.max(1));
        tokio::spawn(async move {
            loop {
                match sessions_for_sweep.sweep().await {
                    Ok(removed) if removed > 0 => tracing::debug!(removed = removed, "session_sweep"),
                    Ok(_) => {}
                    Err(e) => warn!("session sweep failed: {e}"),
                }
                tokio::time::sleep(interval).await;
            }
        });
    }

    let app = router(state).layer(DefaultBodyLimit::max(cfg.max_upload_bytes + 64 * 1024));

    let addr: SocketAddr = format!("0.0.0.0:{}", cfg.http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "drivebox ok" }))
        .route("/files", get(list_files))
        .route("/files/new", get(new_file_form).post(upload_file))
        .route("/files/shared/{token}", get(shared_file))
        .route("/files/{file_id}", get(file_detail).put(update_share).delete(delete_file))
        .route("/blobs/{locator}", get(serve_blob))
        .route("/user/login", get(login_form).post(login))
        .route("/user/signup", get(signup_form).post(signup))
        .route("/user/logout", get(logout))
        .route("/user/login/federated/{provider}", get(federated_start))
        .route("/user/oauth2/redirect/{provider}", get(federated_callback))
        .with_state(state)
}

// ----- cookie plumbing -----

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get("cookie").or_else(|| headers.get("Cookie"))?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some(eq) = p.find('=') {
            let (k, v) = p.split_at(eq);
            if k == name { return Some(v[1..].to_string()); }
        }
    }
    None
}

fn set_session_cookie(sid: &str) -> AppResult<HeaderValue> {
    HeaderValue::from_str(&format!("{}={}; HttpOnly; SameSite=Strict; Path=/", SESSION_COOKIE, sid))
        .map_err(|e| AppError::internal("cookie", &e.to_string()))
}

fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static(
        "drivebox_session=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; SameSite=Strict; Path=/",
    )
}

/// Resolve the request's session cookie to a principal. Missing cookie,
/// unknown session, and expired session all come back `None`.
async fn identify(state: &AppState, headers: &HeaderMap) -> Option<Principal> {
    let sid = parse_cookie(headers, SESSION_COOKIE)?;
    state.sessions.resolve(&sid).await
}

fn login_redirect() -> Response {
    Redirect::to("/user/login").into_response()
}

fn session_response(sid: &str, principal: &Principal) -> AppResult<Response> {
    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, set_session_cookie(sid)?);
    Ok((
        StatusCode::OK,
        headers,
        Json(json!({"status":"ok","user":{"id": principal.id, "name": principal.name}})),
    )
        .into_response())
}

fn file_json(state: &AppState, f: &FileRecord) -> serde_json::Value {
    let shared_url = f
        .share
        .as_ref()
        .map(|s| format!("{}/files/shared/{}", state.public_url.trim_end_matches('/'), s.token));
    json!({
        "id": f.id,
        "name": f.name,
        "shared": f.share.is_some(),
        "shared_url": shared_url,
        "shared_expiry": f.share.as_ref().map(|s| s.expires_at),
    })
}

// ----- session lifecycle -----

#[derive(Debug, Deserialize)]
struct LoginPayload {
    name: String,
    password: String,
}

async fn login_form() -> impl IntoResponse {
    Json(json!({"form": {"name": "text", "password": "password"}, "submit": "POST /user/login"}))
}

async fn login(State(state): State<AppState>, Json(payload): Json<LoginPayload>) -> AppResult<Response> {
    let principal = state
        .auth
        .resolve_principal(AuthMethod::Local { name: payload.name, password: payload.password })
        .await?;
    let sid = state.sessions.issue(&principal).await?;
    info!(target: "drivebox::auth", "login user={}", principal.name);
    session_response(&sid, &principal)
}

#[derive(Debug, Deserialize)]
struct SignupPayload {
    name: String,
    password: String,
    confirm_password: String,
}

async fn signup_form() -> impl IntoResponse {
    Json(json!({
        "form": {"name": "text", "password": "password", "confirm_password": "password"},
        "submit": "POST /user/signup"
    }))
}

async fn signup(State(state): State<AppState>, Json(payload): Json<SignupPayload>) -> AppResult<Response> {
    let principal = state
        .auth
        .verifier()
        .signup(&payload.name, &payload.password, &payload.confirm_password)
        .await?;
    // signup logs the new principal straight in, like the signup form did
    let sid = state.sessions.issue(&principal).await?;
    info!(target: "drivebox::auth", "signup user={}", principal.name);
    session_response(&sid, &principal)
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    if let Some(sid) = parse_cookie(&headers, SESSION_COOKIE) {
        state.sessions.logout(&sid).await?;
    }
    let mut h = HeaderMap::new();
    h.insert(header::SET_COOKIE, clear_session_cookie());
    Ok((StatusCode::OK, h, Json(json!({"status":"ok"}))).into_response())
}

// ----- federated login -----

async fn federated_start(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> AppResult<Response> {
    let Some(idp) = state.providers.get(&provider) else {
        return Err(AppError::not_found("provider_unknown", "no such login provider"));
    };
    let login_state = state.oauth_states.begin(&provider).await;
    Ok(Redirect::to(&idp.authorize_url(&login_state)).into_response())
}

#[derive(Debug, Deserialize)]
struct OAuthCallback {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

async fn federated_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<OAuthCallback>,
) -> AppResult<Response> {
    let Some(idp) = state.providers.get(&provider) else {
        return Err(AppError::not_found("provider_unknown", "no such login provider"));
    };
    // A denied consent screen, a stale state, or a broken exchange all land
    // back on the login page.
    let (Some(code), Some(login_state)) = (query.code, query.state) else {
        return Ok(login_redirect());
    };
    if state.oauth_states.take(&login_state, &provider).await.is_none() {
        return Ok(login_redirect());
    }
    let assertion = match idp.exchange(&code).await {
        Ok(a) => a,
        Err(e) => {
            error!("federated exchange failed for '{}': {e}", provider);
            return Ok(login_redirect());
        }
    };
    let principal = state
        .auth
        .resolve_principal(AuthMethod::Federated {
            issuer: assertion.issuer,
            subject: assertion.subject,
            display_name_hint: assertion.display_name,
        })
        .await?;
    let sid = state.sessions.issue(&principal).await?;
    info!(target: "drivebox::auth", "federated login user={}", principal.name);
    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, set_session_cookie(&sid)?);
    Ok((headers, Redirect::to("/")).into_response())
}

// ----- file routes -----

async fn list_files(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let Some(principal) = identify(&state, &headers).await else {
        return Ok(login_redirect());
    };
    let files = state.files.list(&principal).await;
    let items: Vec<_> = files.iter().map(|f| file_json(&state, f)).collect();
    Ok(Json(json!({"status":"ok","files": items})).into_response())
}

async fn new_file_form(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let Some(_principal) = identify(&state, &headers).await else {
        return Ok(login_redirect());
    };
    Ok(Json(json!({"form": {"file": "file"}, "submit": "POST /files/new"})).into_response())
}

async fn upload_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let Some(principal) = identify(&state, &headers).await else {
        return Ok(login_redirect());
    };
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation("multipart", &e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or("unnamed").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::upload_rejected("payload_too_large", &e.to_string()))?;
        let record = state.files.create(&principal, &name, &bytes, state.blobs.as_ref()).await?;
        return Ok((StatusCode::CREATED, Json(json!({"status":"ok","file": file_json(&state, &record)}))).into_response());
    }
    Err(AppError::validation("file_required", "file is required"))
}

async fn file_detail(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(file_id): Path<String>,
) -> AppResult<Response> {
    let Some(principal) = identify(&state, &headers).await else {
        return Ok(login_redirect());
    };
    let record = state.files.fetch(&principal, &file_id).await?;
    Ok(Json(json!({"status":"ok","file": file_json(&state, &record)})).into_response())
}

#[derive(Debug, Deserialize)]
struct SharePayload {
    is_share: bool,
    #[serde(default)]
    expiry_time: Option<DateTime<Utc>>,
}

async fn update_share(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(file_id): Path<String>,
    Json(payload): Json<SharePayload>,
) -> AppResult<Response> {
    let Some(principal) = identify(&state, &headers).await else {
        return Ok(login_redirect());
    };
    if payload.is_share {
        let Some(expiry) = payload.expiry_time else {
            return Err(AppError::validation("expiry_required", "expiry time is required for shared files"));
        };
        let share = state.shares.share(&principal, &file_id, expiry).await?;
        let url = format!("{}/files/shared/{}", state.public_url.trim_end_matches('/'), share.token);
        Ok(Json(json!({"status":"ok","shared_url": url, "shared_expiry": share.expires_at})).into_response())
    } else {
        state.shares.unshare(&principal, &file_id).await?;
        Ok(Json(json!({"status":"ok"})).into_response())
    }
}

async fn delete_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(file_id): Path<String>,
) -> AppResult<Response> {
    let Some(principal) = identify(&state, &headers).await else {
        return Ok(login_redirect());
    };
    state.files.delete(&principal, &file_id, state.blobs.as_ref()).await?;
    Ok(Json(json!({"status":"ok"})).into_response())
}

// ----- public share resolution -----

async fn shared_file(State(state): State<AppState>, Path(token): Path<String>) -> AppResult<Response> {
    let locator = state.shares.resolve_shared(&token).await?;
    Ok(Redirect::to(&state.blobs.locate(&locator)).into_response())
}

async fn serve_blob(State(state): State<AppState>, Path(locator): Path<String>) -> AppResult<Response> {
    let bytes = state.blobs.fetch(&locator).await?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/octet-stream")],
        bytes,
    )
        .into_response())
}

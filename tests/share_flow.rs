//! End-to-end share-link flow against the service layer: signup, upload,
//! share, public resolve, expiry, revoke, re-share with a rotated token.

use chrono::{Duration, Utc};
use drivebox::blobstore::{BlobStore, FsBlobStore};
use drivebox::error::AppError;
use drivebox::files::{FileGate, ShareLinkManager};
use drivebox::identity::{AuthMethod, AuthService, SessionManager};
use drivebox::store::MetaStore;

#[tokio::test]
async fn upload_share_expire_reshare() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = MetaStore::open(dir.path().join("meta")).expect("open store");
    let blobs = FsBlobStore::new(dir.path().join("blobs"), "http://localhost:8080", 10 * 1024).expect("blobstore");
    let auth = AuthService::new(store.clone());
    let gate = FileGate::new(store.clone());
    let shares = ShareLinkManager::new(store.clone());

    // signup and log back in through the single auth entry point
    let alice = auth.verifier().signup("alice", "s3cret", "s3cret").await.unwrap();
    let logged_in = auth
        .resolve_principal(AuthMethod::Local { name: "alice".into(), password: "s3cret".into() })
        .await
        .unwrap();
    assert_eq!(logged_in.id, alice.id);

    // upload a file -> fileId X
    let file = gate.create(&alice, "report.txt", b"quarterly numbers", &blobs).await.unwrap();
    assert_eq!(gate.list(&alice).await.len(), 1);

    // share(X, now+1h) -> token T; resolving T redirects to the blob URL
    let share = shares.share(&alice, &file.id, Utc::now() + Duration::hours(1)).await.unwrap();
    let locator = shares.resolve_shared(&share.token).await.unwrap();
    assert_eq!(locator, file.blob_locator);
    let url = blobs.locate(&locator);
    assert_eq!(url, format!("http://localhost:8080/blobs/{}", locator));
    assert_eq!(blobs.fetch(&locator).await.unwrap(), b"quarterly numbers");

    // after the expiry passes, the same call is a plain not-found
    store
        .modify_file_owned(&file.id, &alice.id, |r| {
            if let Some(s) = r.share.as_mut() {
                s.expires_at = Utc::now() - Duration::seconds(1);
            }
            Ok(())
        })
        .await
        .unwrap();
    let expired = shares.resolve_shared(&share.token).await.unwrap_err();
    let unknown = shares.resolve_shared("no-such-token").await.unwrap_err();
    assert!(matches!(expired, AppError::NotFound { .. }));
    assert_eq!(expired.code_str(), unknown.code_str());

    // unshare(X) then share(X, now+1h) mints T' != T
    shares.unshare(&alice, &file.id).await.unwrap();
    let reshared = shares.share(&alice, &file.id, Utc::now() + Duration::hours(1)).await.unwrap();
    assert_ne!(reshared.token, share.token);
    assert!(shares.resolve_shared(&reshared.token).await.is_ok());
    assert!(shares.resolve_shared(&share.token).await.is_err());
}

#[tokio::test]
async fn sessions_carry_the_flow_and_foreign_files_stay_hidden() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = MetaStore::open(dir.path().join("meta")).expect("open store");
    let blobs = FsBlobStore::new(dir.path().join("blobs"), "http://localhost:8080", 10 * 1024).expect("blobstore");
    let auth = AuthService::new(store.clone());
    let sessions = SessionManager::new(store.clone(), Duration::hours(1));
    let gate = FileGate::new(store.clone());

    let alice = auth.verifier().signup("alice", "s3cret", "s3cret").await.unwrap();
    let bob = auth.verifier().signup("bob", "passwd", "passwd").await.unwrap();

    // the durable session round-trips the principal
    let sid = sessions.issue(&alice).await.unwrap();
    let from_session = sessions.resolve(&sid).await.unwrap();
    assert_eq!(from_session.id, alice.id);

    let file = gate.create(&alice, "secret.txt", b"mine", &blobs).await.unwrap();

    // bob supplying alice's exact fileId gets NotFound, not Forbidden
    let err = gate.fetch(&bob, &file.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound { .. }));
    assert_eq!(err.http_status(), 404);

    // logout kills the session immediately
    sessions.logout(&sid).await.unwrap();
    assert!(sessions.resolve(&sid).await.is_none());
}

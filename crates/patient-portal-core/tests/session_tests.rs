//! Session persistence across reopen of a file-backed store.

use std::sync::Arc;

use patient_portal_core::api::ApiClient;
use patient_portal_core::auth::{AuthContext, AuthState};
use patient_portal_core::config::ClientConfig;
use patient_portal_core::forms::LoginForm;
use patient_portal_core::session::SessionStore;
use patient_portal_core::stub::StubBackend;
use tempfile::TempDir;

fn context(stub: &Arc<StubBackend>, session: SessionStore) -> AuthContext<Arc<StubBackend>> {
    AuthContext::new(
        ApiClient::new(ClientConfig::new("http://stub"), Arc::clone(stub)),
        session,
    )
}

#[test]
fn test_session_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("session.db");
    let stub = Arc::new(StubBackend::new());

    let token = {
        let mut ctx = context(&stub, SessionStore::open(&path).unwrap());
        ctx.restore();
        ctx.login(&LoginForm::new("admin@test.com", "admin123"))
            .unwrap()
            .token
    };

    let mut ctx = context(&stub, SessionStore::open(&path).unwrap());
    assert_eq!(ctx.restore(), AuthState::Authenticated);
    assert_eq!(ctx.session().get_token().unwrap(), Some(token));
    assert_eq!(ctx.user().unwrap().email, "admin@test.com");

    // Restoring from a cached user needs no request
    let before = stub.requests_seen();
    let mut again = context(&stub, SessionStore::open(&path).unwrap());
    again.restore();
    assert_eq!(stub.requests_seen(), before);
}

#[test]
fn test_logout_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("session.db");
    let stub = Arc::new(StubBackend::new());

    {
        let mut ctx = context(&stub, SessionStore::open(&path).unwrap());
        ctx.restore();
        ctx.login(&LoginForm::new("admin@test.com", "admin123"))
            .unwrap();
        ctx.logout().unwrap();
    }

    let store = SessionStore::open(&path).unwrap();
    assert_eq!(store.get_token().unwrap(), None);
    assert_eq!(store.get_user().unwrap(), None);
    assert!(!store.is_authenticated());
}

#[test]
fn test_garbage_token_fails_closed() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("session.db");

    {
        let store = SessionStore::open(&path).unwrap();
        store.set_auth_data("not.a.jwt", None).unwrap();
    }

    let stub = Arc::new(StubBackend::new());
    let mut ctx = context(&stub, SessionStore::open(&path).unwrap());
    assert_eq!(ctx.restore(), AuthState::Unauthenticated);
    assert_eq!(ctx.session().get_token().unwrap(), None);
    assert_eq!(stub.requests_seen(), 0);
}

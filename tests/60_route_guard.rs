mod common;

use anyhow::Result;

use admin_dashboard::backend::memory::Call;
use admin_dashboard::config::StoreConfig;
use admin_dashboard::guard::{GuardDecision, RouteGuard, DASHBOARD_PATH, LOGIN_PATH};

use common::{auth_store, backend_with_account, EMAIL, PASSWORD};

#[tokio::test]
async fn unmounted_guard_is_pending() -> Result<()> {
    let backend = backend_with_account();
    let auth = auth_store(&backend, StoreConfig::default());
    let guard = RouteGuard::private_only();

    assert!(!guard.is_mounted());
    assert_eq!(guard.evaluate(&auth.state(), "/users"), GuardDecision::Pending);
    Ok(())
}

#[tokio::test]
async fn private_route_redirects_anonymous_user_to_login() -> Result<()> {
    let backend = backend_with_account();
    let auth = auth_store(&backend, StoreConfig::default());
    let guard = RouteGuard::private_only();

    let decision = guard.resolve(&auth, "/users?page=2").await;

    assert_eq!(
        decision,
        GuardDecision::Redirect { to: LOGIN_PATH.to_string(), from: Some("/users?page=2".to_string()) }
    );
    Ok(())
}

#[tokio::test]
async fn private_route_renders_for_restored_session() -> Result<()> {
    let backend = backend_with_account();
    backend.restore_session(EMAIL);
    let auth = auth_store(&backend, StoreConfig::default());
    let guard = RouteGuard::private_only();

    assert_eq!(guard.resolve(&auth, "/dashboard").await, GuardDecision::Render);
    Ok(())
}

#[tokio::test]
async fn public_route_sends_signed_in_user_to_dashboard() -> Result<()> {
    let backend = backend_with_account();
    backend.restore_session(EMAIL);
    let auth = auth_store(&backend, StoreConfig::default());
    let guard = RouteGuard::public_only();

    let decision = guard.resolve(&auth, LOGIN_PATH).await;

    assert_eq!(decision, GuardDecision::Redirect { to: DASHBOARD_PATH.to_string(), from: None });
    Ok(())
}

#[tokio::test]
async fn public_route_renders_for_anonymous_user() -> Result<()> {
    let backend = backend_with_account();
    let auth = auth_store(&backend, StoreConfig::default());

    assert_eq!(RouteGuard::public_only().resolve(&auth, LOGIN_PATH).await, GuardDecision::Render);
    Ok(())
}

#[tokio::test]
async fn mount_initializes_once_per_guard() -> Result<()> {
    let backend = backend_with_account();
    let auth = auth_store(&backend, StoreConfig::default());
    let guard = RouteGuard::private_only();

    tokio::join!(guard.mount(&auth), guard.mount(&auth));
    guard.resolve(&auth, "/users").await;
    guard.resolve(&auth, "/notifications").await;

    assert!(guard.is_mounted());
    assert_eq!(backend.call_count(Call::GetSession), 1);
    Ok(())
}

#[tokio::test]
async fn decision_follows_later_sign_in() -> Result<()> {
    let backend = backend_with_account();
    let auth = auth_store(&backend, StoreConfig::default());
    let guard = RouteGuard::private_only();

    assert!(matches!(guard.resolve(&auth, "/settings").await, GuardDecision::Redirect { .. }));

    auth.sign_in(EMAIL, PASSWORD).await?;
    assert_eq!(guard.resolve(&auth, "/settings").await, GuardDecision::Render);

    auth.sign_out().await?;
    assert!(matches!(guard.resolve(&auth, "/settings").await, GuardDecision::Redirect { .. }));
    assert_eq!(backend.call_count(Call::GetSession), 1);
    Ok(())
}

#[tokio::test]
async fn custom_guard_uses_its_redirect_target() -> Result<()> {
    let backend = backend_with_account();
    let auth = auth_store(&backend, StoreConfig::default());
    let guard = RouteGuard::new(true, "/welcome");

    let decision = guard.resolve(&auth, "/reports").await;

    assert_eq!(
        decision,
        GuardDecision::Redirect { to: "/welcome".to_string(), from: Some("/reports".to_string()) }
    );
    assert!(guard.require_auth());
    assert_eq!(guard.redirect_to(), "/welcome");
    Ok(())
}

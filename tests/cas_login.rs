//! End-to-end CAS login against a mock portal

mod common;

use campus_gateway::{
    Error,
    error::AuthFailure,
    session::{SessionStore, TargetSystem},
    types::Principal,
};
use common::*;
use pretty_assertions::assert_eq;
use std::time::Duration;
use wiremock::{
    Mock, MockServer,
    matchers::{method, path},
};

const STUDENT: &str = "2021040501";

fn student() -> Principal {
    Principal::new(STUDENT, "correct-horse")
}

async fn post_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.method.as_str() == "POST")
        .count()
}

async fn hits(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == route)
        .count()
}

#[tokio::test]
async fn test_full_login_then_cached_fast_path() {
    let server = MockServer::start().await;
    mount_portal(&server).await;
    login_success(&server).expect(1).mount(&server).await;

    let settings = mock_settings(&server);
    let (manager, store) = manager_with_store(&settings);

    let jar = manager.login(&student(), false).await.unwrap();
    assert_eq!(jar.get("CASTGC"), Some("TGT-1-abc"));
    assert_eq!(jar.get("SESSION"), Some("cas-flow"));
    assert_eq!(jar.get("JSESSIONID"), Some("jw-1"));

    let cached = store
        .get(&TargetSystem::Primary.cache_key(STUDENT))
        .await
        .unwrap();
    assert!(cached.unwrap().contains("TGT-1-abc"));

    // Second call revalidates the cached jar instead of posting again
    let again = manager.login(&student(), false).await.unwrap();
    assert_eq!(again.get("CASTGC"), Some("TGT-1-abc"));
    assert_eq!(hits(&server, "/personal-center").await, 1);
}

#[tokio::test]
async fn test_login_form_carries_encrypted_password() {
    let server = MockServer::start().await;
    mount_portal(&server).await;
    login_success(&server).mount(&server).await;

    let (manager, _store) = manager_with_store(&mock_settings(&server));
    manager.login(&student(), true).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let submit = requests
        .iter()
        .find(|r| r.method.as_str() == "POST")
        .unwrap();

    let form: std::collections::HashMap<String, String> =
        url::form_urlencoded::parse(&submit.body).into_owned().collect();
    assert_eq!(form["username"], STUDENT);
    assert_eq!(form["execution"], "e1s1-token");
    assert_eq!(form["_eventId"], "submit");
    assert_eq!(form["authcode"], "");
    // Fixed-width hex of a 64-byte key
    assert_eq!(form["password"].len(), 128);
    assert_ne!(form["password"], "correct-horse");
}

#[tokio::test]
async fn test_force_refresh_skips_cache() {
    let server = MockServer::start().await;
    mount_portal(&server).await;
    login_success(&server).expect(2).mount(&server).await;

    let (manager, _store) = manager_with_store(&mock_settings(&server));
    manager.login(&student(), false).await.unwrap();
    manager.login(&student(), true).await.unwrap();
}

#[tokio::test]
async fn test_bad_credentials_are_not_cached() {
    let server = MockServer::start().await;
    mount_portal(&server).await;
    Mock::given(method("POST"))
        .and(path("/cas/login"))
        .respond_with(page("统一身份认证 用户名或密码错误"))
        .expect(1)
        .mount(&server)
        .await;

    let (manager, store) = manager_with_store(&mock_settings(&server));
    let err = manager.login(&student(), false).await.unwrap_err();

    assert!(matches!(
        err,
        Error::Auth {
            failure: AuthFailure::BadCredentials
        }
    ));
    assert_eq!(err.code(), -3);
    assert_eq!(err.user_message(), "账号或密码错误!");
    assert!(
        store
            .get(&TargetSystem::Primary.cache_key(STUDENT))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_rejection_is_classified_after_redirects() {
    let server = MockServer::start().await;
    mount_portal(&server).await;
    Mock::given(method("POST"))
        .and(path("/cas/login"))
        .respond_with(redirect(&format!("{}/cas/bind-phone", server.uri())))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cas/bind-phone"))
        .respond_with(page("统一身份认证 完成，进入门户"))
        .mount(&server)
        .await;

    let (manager, _store) = manager_with_store(&mock_settings(&server));
    let err = manager.login(&student(), true).await.unwrap_err();

    assert!(matches!(
        err,
        Error::Auth {
            failure: AuthFailure::PhoneNotBound
        }
    ));
}

#[tokio::test]
async fn test_decoding_error_is_retried() {
    let server = MockServer::start().await;
    mount_portal(&server).await;
    Mock::given(method("POST"))
        .and(path("/cas/login"))
        .respond_with(redirect(DECODING_ERROR_LOCATION))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    login_success(&server).mount(&server).await;

    let (manager, _store) = manager_with_store(&mock_settings(&server));
    let jar = manager.login(&student(), true).await.unwrap();

    assert_eq!(jar.get("CASTGC"), Some("TGT-1-abc"));
    assert_eq!(post_count(&server).await, 2);
}

#[tokio::test]
async fn test_decoding_error_gives_up_after_max_attempts() {
    let server = MockServer::start().await;
    mount_portal(&server).await;
    Mock::given(method("POST"))
        .and(path("/cas/login"))
        .respond_with(redirect(DECODING_ERROR_LOCATION))
        .mount(&server)
        .await;

    let settings = mock_settings(&server);
    let (manager, _store) = manager_with_store(&settings);
    let err = manager.login(&student(), true).await.unwrap_err();

    assert!(matches!(err, Error::Upstream { .. }));
    assert_eq!(err.code(), -1);
    assert_eq!(
        post_count(&server).await,
        settings.session.max_login_attempts as usize
    );
}

#[tokio::test]
async fn test_password_change_redirect() {
    let server = MockServer::start().await;
    mount_portal(&server).await;
    Mock::given(method("POST"))
        .and(path("/cas/login"))
        .respond_with(redirect(&format!(
            "{}/im/securitycenter/modifyPwd/index.zf",
            server.uri()
        )))
        .mount(&server)
        .await;

    let (manager, _store) = manager_with_store(&mock_settings(&server));
    let err = manager.login(&student(), true).await.unwrap_err();

    assert!(matches!(err, Error::PasswordExpired));
    assert_eq!(err.user_message(), "请修改密码!");
}

#[tokio::test]
async fn test_maintenance_page_is_upstream_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cas/login"))
        .respond_with(page("Loading..."))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/cas/login"))
        .respond_with(page("never reached"))
        .expect(0)
        .mount(&server)
        .await;

    let (manager, _store) = manager_with_store(&mock_settings(&server));
    let err = manager.login(&student(), true).await.unwrap_err();

    assert!(matches!(err, Error::Upstream { .. }));
    assert_eq!(err.user_message(), "请稍后再试!");
}

#[tokio::test]
async fn test_stale_cached_session_triggers_full_login() {
    let server = MockServer::start().await;
    // The authenticated probe now bounces to the login page
    Mock::given(method("GET"))
        .and(path("/personal-center"))
        .respond_with(redirect(&format!("{}/cas/login", server.uri())))
        .with_priority(1)
        .mount(&server)
        .await;
    mount_portal(&server).await;
    login_success(&server).expect(2).mount(&server).await;

    let (manager, _store) = manager_with_store(&mock_settings(&server));
    manager.login(&student(), false).await.unwrap();
    let jar = manager.login(&student(), false).await.unwrap();
    assert_eq!(jar.get("CASTGC"), Some("TGT-1-abc"));
}

#[tokio::test]
async fn test_stale_entry_is_dropped_even_when_relogin_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/personal-center"))
        .respond_with(redirect(&format!("{}/cas/login", server.uri())))
        .with_priority(1)
        .mount(&server)
        .await;
    mount_portal(&server).await;
    login_success(&server).up_to_n_times(1).mount(&server).await;
    // The password changed since the jar was cached
    Mock::given(method("POST"))
        .and(path("/cas/login"))
        .respond_with(page("统一身份认证 用户名或密码错误"))
        .mount(&server)
        .await;

    let (manager, store) = manager_with_store(&mock_settings(&server));
    let key = TargetSystem::Primary.cache_key(STUDENT);

    manager.login(&student(), false).await.unwrap();
    assert!(store.get(&key).await.unwrap().is_some());

    let err = manager.login(&student(), false).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Auth {
            failure: AuthFailure::BadCredentials
        }
    ));
    assert!(store.get(&key).await.unwrap().is_none());
    assert_eq!(hits(&server, "/personal-center").await, 1);
}

#[tokio::test]
async fn test_corrupt_cache_entry_is_replaced() {
    let server = MockServer::start().await;
    mount_portal(&server).await;
    login_success(&server).expect(1).mount(&server).await;

    let (manager, store) = manager_with_store(&mock_settings(&server));
    let key = TargetSystem::Primary.cache_key(STUDENT);
    store
        .set_ex(&key, "not a jar", Duration::from_secs(60))
        .await
        .unwrap();

    manager.login(&student(), false).await.unwrap();
    let cached = store.get(&key).await.unwrap().unwrap();
    assert!(cached.contains("CASTGC"));
}

#[tokio::test]
async fn test_concurrent_logins_share_one_submission() {
    let server = MockServer::start().await;
    mount_portal(&server).await;
    login_success(&server).expect(1).mount(&server).await;

    let (manager, _store) = manager_with_store(&mock_settings(&server));
    let first = student();
    let second = student();

    let (a, b) = tokio::join!(manager.login(&first, false), manager.login(&second, false));

    assert_eq!(a.unwrap().get("CASTGC"), Some("TGT-1-abc"));
    assert_eq!(b.unwrap().get("CASTGC"), Some("TGT-1-abc"));
}

#[tokio::test]
async fn test_invalid_principal_never_reaches_portal() {
    let server = MockServer::start().await;
    let (manager, _store) = manager_with_store(&mock_settings(&server));

    let err = manager
        .login(&Principal::new(" 2021040501", "pw"), false)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
    assert_eq!(err.user_message(), "用户名包含空字符!");
}

#[tokio::test]
async fn test_follow_redirects_accumulates_cookies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hop/a"))
        .respond_with(
            redirect(&format!("{}/hop/b", server.uri()))
                .insert_header("set-cookie", "first=1; Path=/"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/hop/b"))
        .respond_with(page("done").insert_header("set-cookie", "second=2; Path=/"))
        .mount(&server)
        .await;

    let (manager, _store) = manager_with_store(&mock_settings(&server));
    let mut jar = campus_gateway::session::CookieJar::new();
    let response = manager
        .follow_redirects(&mut jar, &format!("{}/hop/a", server.uri()))
        .await
        .unwrap();

    assert_eq!(response.status.as_u16(), 200);
    assert_eq!(jar.get("first"), Some("1"));
    assert_eq!(jar.get("second"), Some("2"));
}

#[tokio::test]
async fn test_follow_redirects_enforces_hop_bound() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hop/loop"))
        .respond_with(redirect(&format!("{}/hop/loop", server.uri())))
        .mount(&server)
        .await;

    let settings = mock_settings(&server);
    let (manager, _store) = manager_with_store(&settings);
    let mut jar = campus_gateway::session::CookieJar::new();
    let err = manager
        .follow_redirects(&mut jar, &format!("{}/hop/loop", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Upstream { .. }));
    let hits = server.received_requests().await.unwrap().len();
    assert_eq!(hits, settings.session.max_redirect_hops as usize + 1);
}

#[tokio::test]
async fn test_follow_redirects_is_idempotent_on_terminal_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hop/end"))
        .respond_with(page("done").insert_header("set-cookie", "route=r1; Path=/"))
        .mount(&server)
        .await;

    let (manager, _store) = manager_with_store(&mock_settings(&server));
    let url = format!("{}/hop/end", server.uri());

    let mut jar = campus_gateway::session::CookieJar::new();
    manager.follow_redirects(&mut jar, &url).await.unwrap();
    assert_eq!(hits(&server, "/hop/end").await, 1);

    let before = jar.clone();
    let response = manager.follow_redirects(&mut jar, &url).await.unwrap();

    assert_eq!(response.status.as_u16(), 200);
    assert_eq!(jar, before);
    assert_eq!(hits(&server, "/hop/end").await, 2);
}

//! Common test utilities and helpers
//!
//! Builds settings that point every portal URL at a wiremock server and
//! mounts the page sequences a real portal serves.

#![allow(dead_code)]

use campus_gateway::{
    config::Settings,
    network::ProxyManager,
    session::{MemoryStore, SessionManager},
};
use std::sync::Arc;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path, query_param},
};

/// Location the mock portal uses for a flow decoding failure
pub const DECODING_ERROR_LOCATION: &str =
    "/cas/login?exception.message=Error+decoding+flow+execution";

/// 512-bit all-ones modulus, large enough for any test password
pub fn test_modulus() -> String {
    "ff".repeat(64)
}

/// Settings wired to `server`, direct egress, no watchdog
pub fn mock_settings(server: &MockServer) -> Settings {
    let uri = server.uri();
    let mut settings = Settings::default();

    settings.server.port = 0;
    settings.logging.level = "debug".to_string();
    settings.network.retry_delay_ms = 10;
    settings.proxy.enabled = false;
    settings.watchdog.enabled = false;

    let portal = &mut settings.portal;
    portal.login_url = format!("{}/cas/login", uri);
    portal.public_key_url = format!("{}/cas/v2/getPubKey", uri);
    portal.login_test_url = format!("{}/personal-center", uri);
    portal.academic_url = format!("{}/jwglxt/index", uri);
    portal.password_change_url = format!("{}/im/securitycenter/modifyPwd", uri);
    portal.decoding_error_location = DECODING_ERROR_LOCATION.to_string();
    portal.lab_service_url = format!("{}/nuc/", uri);
    portal.lab_host = "127.0.0.1".to_string();
    portal.lab_probe_url = format!("{}/teachn/teachnAction/index.action?page.pageNum=1", uri);
    portal.lab_menu_url = format!("{}/aexp/stuLeft.jsp", uri);
    portal.lab_platform_url = format!("{}/teachn/teachnAction/index.action", uri);

    settings
}

/// Manager over an in-memory store the test keeps a handle to
pub fn manager_with_store(settings: &Settings) -> (SessionManager, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let proxy = Arc::new(ProxyManager::from_settings(settings).unwrap());
    let manager = SessionManager::new(settings, proxy, store.clone()).unwrap();
    (manager, store)
}

/// HTML page with the given body text
pub fn page(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html; charset=utf-8")
        .set_body_string(format!("<html><body>{}</body></html>", body))
}

/// 302 to `location`
pub fn redirect(location: &str) -> ResponseTemplate {
    ResponseTemplate::new(302).insert_header("location", location)
}

/// Login form, public key, portal home and the authenticated probes
///
/// The form POST itself is left to each test.
pub async fn mount_portal(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/cas/login"))
        .respond_with(
            page(r#"<form><input type="hidden" name="execution" value="e1s1-token"/></form>"#)
                .insert_header("set-cookie", "SESSION=cas-flow; Path=/cas"),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/cas/v2/getPubKey"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "exponent": "10001",
            "modulus": test_modulus(),
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/portal/home"))
        .respond_with(page("自定义门户"))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/personal-center"))
        .respond_with(page("自定义门户 个人中心"))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/jwglxt/index"))
        .respond_with(
            page("教学管理信息服务平台").insert_header("set-cookie", "JSESSIONID=jw-1; Path=/jwglxt"),
        )
        .mount(server)
        .await;
}

/// Successful form submission: ticket-granting cookie and a 302 home
pub fn login_success(server: &MockServer) -> Mock {
    Mock::given(method("POST"))
        .and(path("/cas/login"))
        .respond_with(
            redirect(&format!("{}/portal/home", server.uri()))
                .insert_header("set-cookie", "CASTGC=TGT-1-abc; Path=/cas; HttpOnly"),
        )
}

/// The six lab hand-off hops plus the cached-session probe
pub async fn mount_lab(server: &MockServer) {
    let uri = server.uri();

    Mock::given(method("GET"))
        .and(path("/nuc/"))
        .respond_with(redirect(&format!("{}/cas/lab", uri)))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/cas/lab"))
        .respond_with(redirect(&format!("{}/nuc/ticket?ticket=ST-1", uri)))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/nuc/ticket"))
        .and(query_param("ticket", "ST-1"))
        .respond_with(
            redirect(&format!("{}/nuc/session", uri))
                .insert_header("set-cookie", "JSESSIONID=lab-1; Path=/nuc"),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/nuc/session"))
        .respond_with(
            redirect(&format!("{}/nuc/home", uri)).insert_header("set-cookie", "aexpsid=aexp-1; Path=/"),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/nuc/home"))
        .respond_with(page("学生首页").insert_header("set-cookie", "JSESSIONID=lab-2; Path=/"))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/aexp/stuLeft.jsp"))
        .respond_with(page("菜单").insert_header("set-cookie", "route=menu-node; Path=/"))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/teachn/teachnAction/index.action"))
        .and(query_param("page.pageNum", "1"))
        .respond_with(page("中北大学实践教学管理平台"))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/teachn/teachnAction/index.action"))
        .and(header("referer", format!("{}/aexp/stuLeft.jsp", uri).as_str()))
        .respond_with(page("实验教学管理平台").insert_header("set-cookie", "aexpsid=aexp-2; Path=/"))
        .mount(server)
        .await;
}

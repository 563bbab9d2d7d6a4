//! Egress failover with unreachable proxy endpoints

mod common;

use campus_gateway::{
    Error,
    config::{FailoverMode, RotationPolicy, Settings},
    network::{ProxyEndpoint, ProxyManager, ProxyScheme},
};
use wiremock::MockServer;

fn proxied_settings(server: &MockServer, failover: FailoverMode) -> Settings {
    let mut settings = common::mock_settings(server);
    settings.proxy.enabled = true;
    settings.proxy.rotation = RotationPolicy::RoundRobin;
    settings.proxy.failover = failover;
    // Nothing listens on these loopback ports
    settings.proxy.endpoints = vec![
        ProxyEndpoint::new("127.0.0.1:1", ProxyScheme::Http),
        ProxyEndpoint::new("127.0.0.1:9", ProxyScheme::Socks5),
    ];
    settings
}

#[tokio::test]
async fn test_every_endpoint_is_tried_before_giving_up() {
    let server = MockServer::start().await;
    let settings = proxied_settings(&server, FailoverMode::TryAll);
    let manager = ProxyManager::from_settings(&settings).unwrap();

    let err = manager
        .get(&format!("{}/personal-center", server.uri()))
        .await
        .unwrap_err();

    match err {
        Error::Transport { attempts, .. } => assert_eq!(attempts, 2),
        other => panic!("expected transport error, got {:?}", other),
    }
    assert_eq!(requests_seen(&server).await, 0);
}

#[tokio::test]
async fn test_sticky_mode_makes_one_attempt() {
    let server = MockServer::start().await;
    let settings = proxied_settings(&server, FailoverMode::Sticky);
    let manager = ProxyManager::from_settings(&settings).unwrap();

    let err = manager
        .get(&format!("{}/personal-center", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Transport { attempts: 1, .. }));
    assert_eq!(err.user_message(), "VPN通道已关闭!");
    // The caller decides when to move on
    assert_eq!(manager.cursor(), 0);
    manager.advance();
    assert_eq!(manager.cursor(), 1);
}

#[tokio::test]
async fn test_disabled_proxy_goes_direct() {
    let server = MockServer::start().await;
    let mut settings = proxied_settings(&server, FailoverMode::TryAll);
    settings.proxy.enabled = false;

    let manager = ProxyManager::from_settings(&settings).unwrap();
    assert!(manager.pool().is_empty());

    // Unmatched paths answer 404; direct responses are returned as-is
    let response = manager
        .get(&format!("{}/personal-center", server.uri()))
        .await
        .unwrap();
    assert_eq!(response.status.as_u16(), 404);
}

async fn requests_seen(server: &MockServer) -> usize {
    server.received_requests().await.unwrap_or_default().len()
}

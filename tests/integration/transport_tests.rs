//! HTTP transport tests against a wiremock server

use blog_sweep::config::ConnectionConfig;
use blog_sweep::crawler::{HttpTransport, Transport};
use blog_sweep::TransportError;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn serve_status(server: &MockServer, route: &str, status: u16) -> String {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
    format!("{}{}", server.uri(), route)
}

#[tokio::test]
async fn test_status_classification() {
    let server = MockServer::start().await;
    let transport = HttpTransport::new(&ConnectionConfig::default()).unwrap();
    let cancel = CancellationToken::new();

    for status in [401, 403, 503] {
        let url = serve_status(&server, &format!("/locked/{}", status), status).await;
        assert_eq!(
            transport.fetch(&url, &cancel).await,
            Err(TransportError::Unauthorized { url: url.clone() }),
            "status {}",
            status
        );
    }

    let url = serve_status(&server, "/busy", 429).await;
    assert_eq!(
        transport.fetch(&url, &cancel).await,
        Err(TransportError::RateLimited { url: url.clone() })
    );

    let url = serve_status(&server, "/missing", 404).await;
    assert_eq!(
        transport.fetch(&url, &cancel).await,
        Err(TransportError::Other {
            url: url.clone(),
            message: "HTTP 404".to_string()
        })
    );
}

#[tokio::test]
async fn test_fetch_sends_session_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .and(header("X-Requested-With", "XMLHttpRequest"))
        .and(header("Cookie", "pfg=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"payload".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let config = ConnectionConfig {
        cookie: Some("pfg=abc".to_string()),
        ..ConnectionConfig::default()
    };
    let transport = HttpTransport::new(&config).unwrap();
    let body = transport
        .fetch(&format!("{}/page", server.uri()), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(body, b"payload");
}

#[tokio::test]
async fn test_cancel_aborts_slow_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    let transport = HttpTransport::new(&ConnectionConfig::default()).unwrap();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        transport.fetch(&format!("{}/slow", server.uri()), &cancel),
    )
    .await
    .expect("cancelled fetch returns promptly");
    assert_eq!(result, Err(TransportError::Cancelled));
}

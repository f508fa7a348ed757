//! REST client tests against a mock console.

use hmc_transport::{HmcRestClient, ManagementRest, TransportError};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LOGON_BODY: &str =
    "<LogonResponse><X-API-Session kb=\"CUR\">tok-1</X-API-Session></LogonResponse>";

async fn mock_console() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/rest/api/web/Logon"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGON_BODY))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn lookup_resolves_system_by_name() {
    let server = mock_console().await;
    Mock::given(method("GET"))
        .and(path("/rest/api/uom/ManagedSystem/quick/All"))
        .and(header("X-API-Session", "tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"SystemName": "sys1", "UUID": "uuid-1", "State": "operating"},
            {"SystemName": "sys2", "UUID": "uuid-2", "State": "power off"},
        ])))
        .mount(&server)
        .await;

    let client = HmcRestClient::with_base_url(server.uri(), "hscroot", "secret").unwrap();

    let (id, doc) = client.lookup_system("sys2").await.unwrap().unwrap();
    assert_eq!(id, "uuid-2");
    assert_eq!(doc["State"], "power off");

    assert!(client.lookup_system("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn summary_fetches_quick_document() {
    let server = mock_console().await;
    Mock::given(method("GET"))
        .and(path("/rest/api/uom/ManagedSystem/uuid-1/quick"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "SystemName": "sys1",
            "State": "operating",
            "InstalledSystemMemory": 524288,
        })))
        .mount(&server)
        .await;

    let client = HmcRestClient::with_base_url(server.uri(), "hscroot", "secret").unwrap();
    let summary = client.system_summary("uuid-1").await.unwrap();
    assert_eq!(summary["InstalledSystemMemory"], 524288);
}

#[tokio::test]
async fn api_failure_surfaces_status_and_body() {
    let server = mock_console().await;
    Mock::given(method("GET"))
        .and(path("/rest/api/uom/ManagedSystem/uuid-9/quick"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such system"))
        .mount(&server)
        .await;

    let client = HmcRestClient::with_base_url(server.uri(), "hscroot", "secret").unwrap();
    let err = client.system_summary("uuid-9").await.unwrap_err();
    match err {
        TransportError::Api { status, message } => {
            assert_eq!(status, 404);
            assert!(message.contains("no such system"));
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn logon_failure_is_an_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/rest/api/web/Logon"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .mount(&server)
        .await;

    let client = HmcRestClient::with_base_url(server.uri(), "hscroot", "wrong").unwrap();
    let err = client.system_summary("uuid-1").await.unwrap_err();
    assert!(matches!(err, TransportError::Api { status: 401, .. }));
}

#[tokio::test]
async fn close_releases_the_session_once() {
    let server = mock_console().await;
    Mock::given(method("GET"))
        .and(path("/rest/api/uom/ManagedSystem/quick/All"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/api/web/Logon"))
        .and(header("X-API-Session", "tok-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = HmcRestClient::with_base_url(server.uri(), "hscroot", "secret").unwrap();
    let _ = client.lookup_system("anything").await.unwrap();

    client.close().await.unwrap();
    // Second close is a no-op: the session token is already gone.
    client.close().await.unwrap();
}

// ReqwestTransport against a local mock HTTP server

use http::StatusCode;
use soapwire_transport::{
    HttpRequest, HttpTransport, ReqwestTransport, TransportConfig, TransportError,
};

fn transport() -> ReqwestTransport {
    ReqwestTransport::new(TransportConfig {
        timeout_ms: 5000,
        connect_timeout_ms: 1000,
        ..TransportConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_post_sends_headers_and_body() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/soap")
        .match_header("content-type", "text/xml; charset=utf-8")
        .match_header("soapaction", "\"urn:echo\"")
        .match_body("<Envelope/>")
        .with_status(200)
        .with_header("content-type", "text/xml")
        .with_body("<ok/>")
        .create_async()
        .await;

    let request = HttpRequest::post(format!("{}/soap", server.url()), "<Envelope/>")
        .with_header("Content-Type", "text/xml; charset=utf-8")
        .unwrap()
        .with_header("SOAPAction", "\"urn:echo\"")
        .unwrap();

    let response = transport().send(request).await.unwrap();
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.content_type(), Some("text/xml"));
    assert_eq!(&response.body[..], b"<ok/>");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_error_status_is_returned_not_raised() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/soap")
        .with_status(500)
        .with_body("boom")
        .create_async()
        .await;

    let response = transport()
        .send(HttpRequest::post(format!("{}/soap", server.url()), "<x/>"))
        .await
        .unwrap();
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!response.is_success());

    let err = response.error_for_status().unwrap_err();
    assert!(matches!(err, TransportError::Status { .. }));
}

#[tokio::test]
async fn test_get_request() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/service?wsdl")
        .with_status(200)
        .with_body("<definitions/>")
        .create_async()
        .await;

    let response = transport()
        .send(HttpRequest::get(format!("{}/service?wsdl", server.url())))
        .await
        .unwrap();
    assert!(response.is_success());
    assert_eq!(&response.body[..], b"<definitions/>");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_unreachable_host_is_an_error() {
    // Port 9 (discard) on localhost is not expected to be listening.
    let result = transport()
        .send(HttpRequest::post("http://127.0.0.1:9/soap", "<x/>"))
        .await;
    assert!(result.is_err());
}

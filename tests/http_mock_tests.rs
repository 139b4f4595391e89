use bstack_xcuitest::{
    BrowserStackClient, BuildId, BuildOutcome, Credentials, Error, client::parse_base_url,
    poll_build_status,
};
use httpmock::{Method::GET, MockServer};
use serde_json::json;
use std::time::Duration;

fn client_for(server: &MockServer) -> BrowserStackClient {
    BrowserStackClient::new(Credentials::new("alice", "s3cret"))
        .unwrap()
        .with_base_url(parse_base_url(&server.base_url()).unwrap())
}

#[tokio::test]
async fn poll_uses_custom_base_url_and_basic_auth() {
    let server = MockServer::start_async().await;
    let m = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/app-automate/xcuitest/builds/abc")
                .header("authorization", "Basic YWxpY2U6czNjcmV0");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"status": "done", "duration": 120}));
        })
        .await;

    let outcome = poll_build_status(
        &client_for(&server),
        &BuildId::new("abc"),
        Duration::from_millis(5),
    )
    .await
    .unwrap();

    assert_eq!(outcome, BuildOutcome::Succeeded);
    m.assert_hits_async(1).await;
}

#[tokio::test]
async fn queued_status_is_unsupported() {
    let server = MockServer::start_async().await;
    let m = server
        .mock_async(|when, then| {
            when.method(GET).path("/app-automate/xcuitest/builds/abc");
            then.status(200).json_body(json!({"status": "queued"}));
        })
        .await;

    let err = poll_build_status(
        &client_for(&server),
        &BuildId::new("abc"),
        Duration::from_millis(5),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::UnsupportedStatus { ref status } if status == "queued"));
    assert!(err.to_string().contains("queued"));
    m.assert_hits_async(1).await;
}

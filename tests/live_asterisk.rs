//! Integration tests against a live Asterisk manager.
//!
//! These tests need a reachable server, configured with `AMI_HOST` (host or
//! host:port, default 127.0.0.1:5038), `AMI_USER` and `AMI_SECRET`. The user
//! needs the `system`, `call` and `originate` permissions.
//! Run with: cargo test --test live_asterisk -- --ignored

use asterisk_ami_tokio::{
    AmiAction, AmiClient, AmiConfig, AmiError, AmiEventStream, ConnectionState, OriginateRequest,
    ResponseStatus,
};
use std::time::Duration;

fn config() -> AmiConfig {
    let host = std::env::var("AMI_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let user = std::env::var("AMI_USER").expect("AMI_USER not set");
    let secret = std::env::var("AMI_SECRET").expect("AMI_SECRET not set");
    AmiConfig::from_split_str(&format!("{}::{}::{}", host, user, secret), "::")
        .expect("invalid AMI_HOST")
}

async fn connect() -> (AmiClient, AmiEventStream) {
    let (client, events) = AmiClient::new(config());
    client
        .start()
        .await
        .expect("failed to log in to Asterisk");
    (client, events)
}

#[tokio::test]
#[ignore]
async fn live_login_and_ping() {
    let (client, _events) = connect().await;
    assert_eq!(client.state(), ConnectionState::Ready);

    let resp = client
        .ping()
        .await
        .unwrap();
    assert_eq!(resp.get("Ping"), Some("Pong"));

    client
        .close()
        .await
        .unwrap();
    assert_eq!(client.state(), ConnectionState::Stopped);
}

#[tokio::test]
#[ignore]
async fn live_bad_secret_is_rejected() {
    let mut config = config();
    config.secret = format!("wrong-{}", std::process::id());
    let (client, _events) = AmiClient::new(config);

    let err = client
        .start()
        .await
        .unwrap_err();
    assert!(
        matches!(err, AmiError::AuthenticationFailed { .. }),
        "unexpected error: {}",
        err
    );
    assert_eq!(client.state(), ConnectionState::Stopped);
}

#[tokio::test]
#[ignore]
async fn live_core_status_and_unknown_action() {
    let (client, _events) = connect().await;

    let status = client
        .submit(AmiAction::new("CoreStatus"), Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(status.status(), ResponseStatus::Success);
    assert!(status
        .get("CoreCurrentCalls")
        .is_some());

    let bogus = client
        .submit(AmiAction::new("NoSuchActionHere"), Duration::from_secs(5))
        .await
        .unwrap();
    assert!(bogus.is_error(), "expected Error response: {:?}", bogus);
}

#[tokio::test]
#[ignore]
async fn live_concurrent_pings() {
    let (client, _events) = connect().await;

    let tasks: Vec<_> = (0..10)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .ping()
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await
            .unwrap()
            .unwrap();
    }
}

#[tokio::test]
#[ignore]
async fn live_user_event_on_global_stream() {
    let (client, mut events) = connect().await;
    let marker = format!("ami_test_{}", std::process::id());

    client
        .submit(
            AmiAction::new("UserEvent")
                .param("UserEvent", marker.as_str())
                .param("Payload", "hello"),
            Duration::from_secs(5),
        )
        .await
        .unwrap()
        .into_result()
        .unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        match tokio::time::timeout_at(deadline, events.recv()).await {
            Ok(Some(Ok(evt))) => {
                if evt.get("UserEvent") == Some(marker.as_str()) {
                    assert_eq!(evt.get("Payload"), Some("hello"));
                    return;
                }
            }
            Ok(Some(Err(e))) => panic!("event error: {}", e),
            Ok(None) => panic!("event stream closed"),
            Err(_) => break,
        }
    }
    panic!("did not receive UserEvent {}", marker);
}

#[tokio::test]
#[ignore]
async fn live_originate_local_channel() {
    let (client, _events) = connect().await;

    let request = OriginateRequest {
        channel: "Local/s@default".into(),
        application: "Wait".into(),
        data: "1".into(),
        timeout: Some(Duration::from_secs(10)),
        ..Default::default()
    };
    let mut call = client
        .originate(request, Duration::ZERO)
        .await
        .unwrap();

    let finished = tokio::time::timeout(Duration::from_secs(20), async {
        while call
            .next_event()
            .await
            .is_some()
        {}
    })
    .await;
    assert!(finished.is_ok(), "call did not end");
    assert!(call.is_finished());
    assert!(call
        .hangup_cause()
        .is_some());
}

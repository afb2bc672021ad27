// tests/integration/offline_queue_test.rs

//! Integration tests for offline queueing and resending unanswered commands

use super::test_helpers::{
    MockReply, MockServer, ready_client, redis_like, unreachable_config, wait_for_event, wait_for_ready_epoch,
    with_timeout,
};
use futures::future::join_all;
use spineldb_client::config::QueueOptions;
use spineldb_client::connection::{ClientEvent, ConnectionState};
use spineldb_client::core::{ClientError, RespValue};
use spineldb_client::Client;
use std::time::Duration;

/// Connection 1 never answers and drops the socket on `PING drop`.
/// Later connections behave normally.
async fn flaky_server() -> MockServer {
    MockServer::with_handler(|session, args| {
        if session.connection_id == 1 && args.first().map(String::as_str) == Some("PING") {
            if args.get(1).map(String::as_str) == Some("drop") {
                return MockReply::Disconnect;
            }
            return MockReply::NoReply;
        }
        redis_like(session, args)
    })
    .await
}

#[tokio::test]
async fn test_commands_before_connect_are_queued_and_flushed_in_order() {
    let server = MockServer::start().await;
    let client = server.client();

    let futures: Vec<_> = (0..20)
        .map(|i| client.ping(Some(i.to_string().as_str())))
        .collect();
    let results = with_timeout(join_all(futures)).await;

    for (i, result) in results.into_iter().enumerate() {
        assert_eq!(result.unwrap(), RespValue::bulk(i.to_string()));
    }
    assert_eq!(server.connection_count(), 1);
}

#[tokio::test]
async fn test_offline_queue_disabled_rejects_while_connecting() {
    let mut config = unreachable_config().await;
    config.queue.enable_offline_queue = false;
    let client = Client::new(config);

    let err = with_timeout(client.ping(None)).await.unwrap_err();
    match err {
        ClientError::QueueRejected(msg) => assert!(msg.contains("enableOfflineQueue")),
        other => panic!("Expected QueueRejected, got {other:?}"),
    }
    assert_eq!(client.state(), ConnectionState::Connecting);
    client.close();
}

#[tokio::test]
async fn test_offline_queue_disabled_rejects_during_outage() {
    let server = MockServer::start().await;
    let mut config = server.config();
    config.queue.enable_offline_queue = false;
    config.reconnect.initial_delay = Duration::from_millis(500);
    let client = Client::new(config);
    with_timeout(client.wait_until_ready()).await.unwrap();
    let mut events = client.events();

    server.disconnect_all();
    wait_for_event(&mut events, |e| matches!(e, ClientEvent::Disconnected { .. })).await;

    let err = with_timeout(client.ping(Some("during"))).await.unwrap_err();
    assert!(matches!(err, ClientError::QueueRejected(_)));

    wait_for_ready_epoch(&mut events, 2).await;
    let reply = with_timeout(client.ping(Some("after"))).await.unwrap();
    assert_eq!(reply, RespValue::bulk("after"));
}

#[tokio::test]
async fn test_set_options_changes_gating_at_runtime() {
    let config = unreachable_config().await;
    let client = Client::new(config);

    client.set_options(QueueOptions {
        enable_offline_queue: false,
        ..QueueOptions::default()
    });
    let err = with_timeout(client.ping(None)).await.unwrap_err();
    assert!(matches!(err, ClientError::QueueRejected(_)));
    client.close();
}

#[tokio::test]
async fn test_offline_queue_limit() {
    let mut config = unreachable_config().await;
    config.queue.offline_queue_limit = 2;
    let client = Client::new(config);

    let first = client.ping(Some("1"));
    let second = client.ping(Some("2"));
    let err = with_timeout(client.ping(Some("3"))).await.unwrap_err();
    match err {
        ClientError::QueueRejected(msg) => assert!(msg.contains("full")),
        other => panic!("Expected QueueRejected, got {other:?}"),
    }

    client.close();
    assert!(matches!(
        with_timeout(first).await,
        Err(ClientError::ConnectionClosed(_))
    ));
    assert!(matches!(
        with_timeout(second).await,
        Err(ClientError::ConnectionClosed(_))
    ));
}

#[tokio::test]
async fn test_resend_preserves_order_ahead_of_new_commands() {
    let server = flaky_server().await;
    let client = ready_client(&server, |_| {}).await;
    let mut events = client.events();

    let a = client.ping(Some("a"));
    let b = client.ping(Some("b"));
    let c = client.ping(Some("c"));
    let dropped = client.ping(Some("drop"));

    wait_for_event(&mut events, |e| matches!(e, ClientEvent::Disconnected { .. })).await;
    let x = client.ping(Some("x"));

    let (a, b, c, dropped, x) = with_timeout(async { tokio::join!(a, b, c, dropped, x) }).await;
    assert_eq!(a.unwrap(), RespValue::bulk("a"));
    assert_eq!(b.unwrap(), RespValue::bulk("b"));
    assert_eq!(c.unwrap(), RespValue::bulk("c"));
    assert_eq!(dropped.unwrap(), RespValue::bulk("drop"));
    assert_eq!(x.unwrap(), RespValue::bulk("x"));

    let resent: Vec<String> = server
        .received_on(2)
        .into_iter()
        .map(|c| c.join(" "))
        .collect();
    assert_eq!(resent, vec!["PING a", "PING b", "PING c", "PING drop", "PING x"]);
}

#[tokio::test]
async fn test_resend_disabled_fails_unanswered_commands() {
    let server = flaky_server().await;
    let client = ready_client(&server, |config| {
        config.queue.auto_resend_unfulfilled_commands = false;
    })
    .await;
    let mut events = client.events();

    let a = client.ping(Some("a"));
    let dropped = client.ping(Some("drop"));
    let (a, dropped) = with_timeout(async { tokio::join!(a, dropped) }).await;
    assert!(matches!(a, Err(ClientError::ConnectionClosed(_))));
    assert!(matches!(dropped, Err(ClientError::ConnectionClosed(_))));

    wait_for_ready_epoch(&mut events, 2).await;
    let reply = with_timeout(client.ping(Some("c"))).await.unwrap();
    assert_eq!(reply, RespValue::bulk("c"));

    // Nothing from the first connection was written again.
    let second: Vec<String> = server
        .received_on(2)
        .into_iter()
        .map(|c| c.join(" "))
        .collect();
    assert_eq!(second, vec!["PING c"]);
}

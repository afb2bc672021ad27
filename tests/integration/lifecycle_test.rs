// tests/integration/lifecycle_test.rs

//! Integration tests for connection state transitions: reconnects, quit,
//! close and giving up.

use super::test_helpers::{
    MockReply, MockServer, ready_client, redis_like, unreachable_config, wait_for_event,
    wait_for_ready_epoch, wait_until, with_timeout,
};
use spineldb_client::Client;
use spineldb_client::connection::{ClientEvent, ConnectionState};
use spineldb_client::core::{ClientError, Command, RespValue};

#[tokio::test]
async fn test_state_becomes_ready() {
    let server = MockServer::start().await;
    let client = ready_client(&server, |_| {}).await;
    assert_eq!(client.state(), ConnectionState::Ready);
    assert_eq!(server.connection_count(), 1);
}

#[tokio::test]
async fn test_reconnect_emits_events_in_order() {
    let server = MockServer::start().await;
    let client = ready_client(&server, |_| {}).await;
    let mut events = client.events();

    server.disconnect_all();

    let event = wait_for_event(&mut events, |_| true).await;
    assert!(matches!(event, ClientEvent::Disconnected { epoch, .. } if epoch.0 == 1));
    let event = wait_for_event(&mut events, |_| true).await;
    assert!(matches!(event, ClientEvent::Reconnecting { attempt: 1, .. }));
    let event = wait_for_event(&mut events, |_| true).await;
    assert!(matches!(event, ClientEvent::Connected { epoch } if epoch.0 == 2));
    let event = wait_for_event(&mut events, |_| true).await;
    assert!(matches!(event, ClientEvent::Ready { epoch } if epoch.0 == 2));
    assert_eq!(client.state(), ConnectionState::Ready);
}

#[tokio::test]
async fn test_scenario_d_new_command_resolves_after_reconnect_without_offline_queue() {
    let server = MockServer::start().await;
    let client = ready_client(&server, |config| {
        config.queue.enable_offline_queue = false;
    })
    .await;
    let mut events = client.events();

    assert_eq!(
        with_timeout(client.ping(Some("a"))).await.unwrap(),
        RespValue::bulk("a")
    );

    server.disconnect_all();
    wait_for_ready_epoch(&mut events, 2).await;

    let reply = with_timeout(client.ping(Some("c"))).await.unwrap();
    assert_eq!(reply, RespValue::bulk("c"));
}

#[tokio::test]
async fn test_scenario_d_transaction_in_flight_without_offline_queue() {
    let server = MockServer::start().await;
    let client = ready_client(&server, |config| {
        config.queue.enable_offline_queue = false;
    })
    .await;
    let mut events = client.events();

    let mut tx = client.multi().unwrap();
    let a = tx.queue(Command::ping(Some("a")));
    let exec = tx.ping(Some("reconnect")).exec();

    let err = with_timeout(exec).await.unwrap_err();
    match err {
        ClientError::ConnectionClosed(msg) => assert!(msg.starts_with("transaction aborted")),
        other => panic!("Expected ConnectionClosed, got {other:?}"),
    }
    assert!(matches!(
        with_timeout(a).await,
        Err(ClientError::ConnectionClosed(_))
    ));

    wait_for_ready_epoch(&mut events, 2).await;
    let c = with_timeout(client.ping(Some("c"))).await.unwrap();
    assert_eq!(c, RespValue::bulk("c"));

    // Only `PING c` reached the new connection.
    let second = server.received_on(2);
    assert_eq!(second, vec![vec!["PING".to_string(), "c".to_string()]]);
}

#[tokio::test]
async fn test_scenario_d_stale_entry_does_not_block_matching() {
    // The first connection swallows `PING hang`.
    let server = MockServer::with_handler(|session, args| {
        if session.connection_id == 1 && args.get(1).map(String::as_str) == Some("hang") {
            return MockReply::NoReply;
        }
        redis_like(session, args)
    })
    .await;
    let client = ready_client(&server, |config| {
        config.queue.enable_offline_queue = false;
    })
    .await;
    let mut events = client.events();

    let hang = client.ping(Some("hang"));
    // Make sure the command has reached the server before cutting it off.
    wait_until(|| server.received_on(1).iter().any(|cmd| cmd.join(" ") == "PING hang")).await;
    server.disconnect_all();
    wait_for_ready_epoch(&mut events, 2).await;

    let c = with_timeout(client.ping(Some("c"))).await.unwrap();
    assert_eq!(c, RespValue::bulk("c"));
    // Resent on the new connection and answered there.
    assert_eq!(with_timeout(hang).await.unwrap(), RespValue::bulk("hang"));
}

#[tokio::test]
async fn test_quit_closes_client() {
    let server = MockServer::start().await;
    let client = ready_client(&server, |_| {}).await;
    let mut events = client.events();

    with_timeout(client.quit()).await.unwrap();
    wait_for_event(&mut events, |e| matches!(e, ClientEvent::Closed)).await;
    assert_eq!(client.state(), ConnectionState::Closed);

    let err = with_timeout(client.ping(None)).await.unwrap_err();
    assert!(matches!(err, ClientError::ConnectionClosed(_)));
    // QUIT does not trigger a reconnect.
    assert_eq!(server.connection_count(), 1);
}

#[tokio::test]
async fn test_close_rejects_in_flight_commands() {
    let server = MockServer::with_handler(|session, args| {
        if args.get(1).map(String::as_str) == Some("hang") {
            return MockReply::NoReply;
        }
        redis_like(session, args)
    })
    .await;
    let client = ready_client(&server, |_| {}).await;

    let hang = client.ping(Some("hang"));
    client.close();

    let err = with_timeout(hang).await.unwrap_err();
    assert_eq!(
        err,
        ClientError::ConnectionClosed("Connection is closed.".into())
    );
    assert!(with_timeout(client.wait_until_ready()).await.is_err());
}

#[tokio::test]
async fn test_close_before_connect_rejects_queued_commands() {
    let client = Client::new(unreachable_config().await);
    let queued = client.ping(Some("queued"));
    client.close();

    let err = with_timeout(queued).await.unwrap_err();
    assert!(matches!(err, ClientError::ConnectionClosed(_)));
}

#[tokio::test]
async fn test_gives_up_after_max_attempts() {
    let mut config = unreachable_config().await;
    config.reconnect.max_attempts = Some(2);
    let client = Client::new(config);
    let queued = client.ping(None);

    let err = with_timeout(queued).await.unwrap_err();
    match err {
        ClientError::ConnectionClosed(msg) => assert!(msg.contains("gave up")),
        other => panic!("Expected ConnectionClosed, got {other:?}"),
    }
    assert!(with_timeout(client.wait_until_ready()).await.is_err());
    assert_eq!(client.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn test_dropping_all_handles_stops_the_client() {
    let server = MockServer::start().await;
    let client = ready_client(&server, |_| {}).await;
    let mut events = client.events();
    drop(client);

    wait_for_event(&mut events, |e| matches!(e, ClientEvent::Closed)).await;
}

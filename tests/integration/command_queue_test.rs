// tests/integration/command_queue_test.rs

//! Integration tests for ordinary command submission and reply matching

use super::test_helpers::{
    MockReply, MockServer, bulk, ready_client, redis_like, wait_for_event, wait_for_ready_epoch,
    with_timeout,
};
use futures::future::join_all;
use spineldb_client::connection::ClientEvent;
use spineldb_client::core::{ClientError, Command, RespValue};

#[tokio::test]
async fn test_ping_without_message_returns_pong() {
    let server = MockServer::start().await;
    let client = ready_client(&server, |_| {}).await;

    let reply = with_timeout(client.ping(None)).await.unwrap();
    assert_eq!(reply, RespValue::SimpleString("PONG".into()));
}

#[tokio::test]
async fn test_pipelined_commands_resolve_in_order() {
    let server = MockServer::start().await;
    let client = ready_client(&server, |_| {}).await;

    let futures: Vec<_> = (0..200)
        .map(|i| client.ping(Some(i.to_string().as_str())))
        .collect();
    let results = with_timeout(join_all(futures)).await;

    for (i, result) in results.into_iter().enumerate() {
        assert_eq!(result.unwrap(), RespValue::bulk(i.to_string()));
    }
}

#[tokio::test]
async fn test_concurrent_submitters_each_get_their_own_reply() {
    let server = MockServer::start().await;
    let client = ready_client(&server, |_| {}).await;

    let mut tasks = Vec::new();
    for task in 0..8 {
        let client = client.clone();
        tasks.push(tokio::spawn(async move {
            for i in 0..25 {
                let msg = format!("{task}-{i}");
                let reply = client.echo(msg.clone()).await.unwrap();
                assert_eq!(reply, RespValue::bulk(msg));
            }
        }));
    }
    for task in tasks {
        with_timeout(task).await.unwrap();
    }
}

#[tokio::test]
async fn test_string_commands() {
    let server = MockServer::start().await;
    let client = ready_client(&server, |_| {}).await;

    assert_eq!(
        with_timeout(client.set("key", "value")).await.unwrap(),
        RespValue::SimpleString("OK".into())
    );
    assert_eq!(
        with_timeout(client.get("key")).await.unwrap(),
        RespValue::bulk("value")
    );
    assert_eq!(
        with_timeout(client.del(["key", "missing"])).await.unwrap(),
        RespValue::Integer(1)
    );
    assert_eq!(with_timeout(client.get("key")).await.unwrap(), RespValue::Null);
}

#[tokio::test]
async fn test_error_reply_does_not_disturb_neighbours() {
    let server = MockServer::start().await;
    let client = ready_client(&server, |_| {}).await;

    let a = client.ping(Some("a"));
    let bad = client.send(Command::new("NOSUCHCMD"));
    let b = client.ping(Some("b"));
    let (a, bad, b) = with_timeout(async { tokio::join!(a, bad, b) }).await;

    assert_eq!(a.unwrap(), RespValue::bulk("a"));
    match bad.unwrap_err() {
        ClientError::Reply(msg) => assert!(msg.contains("unknown command")),
        other => panic!("Expected Reply error, got {other:?}"),
    }
    assert_eq!(b.unwrap(), RespValue::bulk("b"));
}

#[tokio::test]
async fn test_transaction_verbs_cannot_be_sent_directly() {
    let server = MockServer::start().await;
    let client = ready_client(&server, |_| {}).await;

    for verb in ["MULTI", "EXEC", "DISCARD"] {
        let err = with_timeout(client.send(Command::new(verb)))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidRequest(_)));
    }
    assert!(server.received().is_empty());
}

#[tokio::test]
async fn test_scenario_a_transaction_and_standalone_commands_interleaved() {
    let server = MockServer::start().await;
    let client = ready_client(&server, |_| {}).await;

    let exec = client.multi().unwrap().ping(Some("a")).ping(Some("b")).exec();
    let c = client.ping(Some("c"));
    let d = client.ping(Some("d"));
    let e = client.ping(Some("e"));
    let (exec, c, d, e) = with_timeout(async { tokio::join!(exec, c, d, e) }).await;

    assert_eq!(
        exec.unwrap(),
        vec![Ok(RespValue::bulk("a")), Ok(RespValue::bulk("b"))]
    );
    assert_eq!(c.unwrap(), RespValue::bulk("c"));
    assert_eq!(d.unwrap(), RespValue::bulk("d"));
    assert_eq!(e.unwrap(), RespValue::bulk("e"));
}

#[tokio::test]
async fn test_scenario_a_commands_submitted_while_staging_stay_outside() {
    let server = MockServer::start().await;
    let client = ready_client(&server, |_| {}).await;

    let mut tx = client.multi().unwrap();
    let a = tx.queue(Command::ping(Some("a")));
    let c = client.ping(Some("c"));
    let b = tx.queue(Command::ping(Some("b")));
    let d = client.ping(Some("d"));
    let exec = tx.exec();
    let e = client.ping(Some("e"));

    let (a, b, c, d, exec, e) = with_timeout(async { tokio::join!(a, b, c, d, exec, e) }).await;
    assert_eq!(a.unwrap(), RespValue::bulk("a"));
    assert_eq!(b.unwrap(), RespValue::bulk("b"));
    assert_eq!(c.unwrap(), RespValue::bulk("c"));
    assert_eq!(d.unwrap(), RespValue::bulk("d"));
    assert_eq!(e.unwrap(), RespValue::bulk("e"));
    assert_eq!(exec.unwrap().len(), 2);

    let wire: Vec<String> = server.received().into_iter().map(|c| c.join(" ")).collect();
    assert_eq!(
        wire,
        vec!["PING c", "PING d", "MULTI", "PING a", "PING b", "EXEC", "PING e"]
    );
}

#[tokio::test]
async fn test_unsolicited_reply_resets_connection() {
    let server = MockServer::with_handler(|session, args| {
        if args.get(1).map(String::as_str) == Some("extra") {
            return MockReply::Frames(vec![bulk("extra"), bulk("stray")]);
        }
        redis_like(session, args)
    })
    .await;
    let client = ready_client(&server, |_| {}).await;
    let mut events = client.events();

    let reply = with_timeout(client.ping(Some("extra"))).await.unwrap();
    assert_eq!(reply, RespValue::bulk("extra"));

    wait_for_event(&mut events, |e| matches!(e, ClientEvent::Disconnected { .. })).await;
    wait_for_ready_epoch(&mut events, 2).await;

    let reply = with_timeout(client.ping(Some("after"))).await.unwrap();
    assert_eq!(reply, RespValue::bulk("after"));
    assert_eq!(server.connection_count(), 2);
}

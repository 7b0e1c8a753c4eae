//! Tests for acknowledgements that wait on a broker RECEIPT.

use futures::StreamExt;
use std::time::Duration;
use stompline::codec;
use stompline::{
    AckMode, ByteFramer, Command, ConnError, ConnectOptions, Connection, Frame, Phase,
};
use tokio::io::{AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};
use tokio_util::codec::FramedRead;

struct Broker {
    frames: FramedRead<ReadHalf<DuplexStream>, ByteFramer>,
    write: WriteHalf<DuplexStream>,
}

impl Broker {
    async fn next(&mut self) -> Frame {
        let raw = self
            .frames
            .next()
            .await
            .expect("client closed")
            .expect("read error");
        codec::decode(&raw).expect("client sent malformed frame")
    }

    async fn reply(&mut self, bytes: &[u8]) {
        self.write.write_all(bytes).await.unwrap();
    }
}

async fn connected() -> (Connection, Broker) {
    let (client, server) = tokio::io::duplex(4096);
    let (read, write) = tokio::io::split(server);
    let mut broker = Broker {
        frames: FramedRead::new(read, ByteFramer::new()),
        write,
    };
    let handshake = tokio::spawn(async move {
        assert_eq!(broker.next().await.command, Command::Connect);
        broker.reply(b"CONNECTED\nsession:S1\n\n\0").await;
        broker
    });
    let conn = Connection::connect_with_stream(client, None, ConnectOptions::default())
        .await
        .expect("connect");
    (conn, handshake.await.unwrap())
}

#[tokio::test]
async fn ack_confirmed_resolves_on_matching_receipt() {
    let (conn, mut broker) = connected().await;
    conn.subscribe("/queue/a", AckMode::Client).await.unwrap();
    assert_eq!(broker.next().await.command, Command::Subscribe);

    let waiter = {
        let conn = conn.clone();
        tokio::spawn(async move { conn.ack_confirmed("m1", None, Duration::from_secs(5)).await })
    };

    let ack = broker.next().await;
    assert_eq!(ack.command, Command::Ack);
    assert_eq!(ack.get_header("message-id"), Some("m1"));
    assert_eq!(ack.get_header("receipt"), Some("m1"));
    assert_eq!(ack.get_header("session"), None);

    broker.reply(b"RECEIPT\nreceipt-id:m1\n\n\0").await;
    waiter.await.unwrap().expect("receipt should resolve the wait");
}

#[tokio::test]
async fn ack_confirmed_ignores_other_receipts_and_times_out() {
    let (conn, mut broker) = connected().await;

    let waiter = {
        let conn = conn.clone();
        tokio::spawn(async move {
            conn.ack_confirmed("m1", Some("tx1"), Duration::from_millis(200))
                .await
        })
    };

    let ack = broker.next().await;
    assert_eq!(ack.get_header("transaction"), Some("tx1"));
    broker.reply(b"RECEIPT\nreceipt-id:m2\n\n\0").await;

    match waiter.await.unwrap() {
        Err(ConnError::ReceiptTimeout(id)) => assert_eq!(id, "m1"),
        other => panic!("expected ReceiptTimeout, got {:?}", other),
    }
}

#[tokio::test]
async fn messages_keep_flowing_while_waiting_for_receipt() {
    let (conn, mut broker) = connected().await;

    let waiter = {
        let conn = conn.clone();
        tokio::spawn(async move { conn.ack_confirmed("m1", None, Duration::from_secs(5)).await })
    };
    assert_eq!(broker.next().await.command, Command::Ack);

    broker
        .reply(b"MESSAGE\nmessage-id:m2\ndestination:/queue/a\n\nsecond\0")
        .await;
    broker
        .reply(b"MESSAGE\nmessage-id:m3\ndestination:/queue/a\n\nthird\0")
        .await;
    broker.reply(b"RECEIPT\nreceipt-id:m1\n\n\0").await;

    waiter.await.unwrap().expect("receipt should resolve the wait");

    let first = conn.receive().await.unwrap();
    assert_eq!(first.message_id, "m2");
    assert_eq!(first.body(), b"second");
    assert_eq!(first.destination(), Some("/queue/a"));
    let second = conn.receive().await.unwrap();
    assert_eq!(second.message_id, "m3");
}

#[tokio::test]
async fn concurrent_waits_are_correlated_independently() {
    let (conn, mut broker) = connected().await;

    let spawn_wait = |id: &'static str| {
        let conn = conn.clone();
        tokio::spawn(async move { conn.ack_confirmed(id, None, Duration::from_secs(5)).await })
    };
    let a = spawn_wait("a");
    let b = spawn_wait("b");
    broker.next().await;
    broker.next().await;

    broker.reply(b"RECEIPT\nreceipt-id:b\n\n\0").await;
    b.await.unwrap().expect("b resolves");
    assert!(!a.is_finished());

    broker.reply(b"RECEIPT\nreceipt-id:a\n\n\0").await;
    a.await.unwrap().expect("a resolves");
}

#[tokio::test]
async fn waits_sharing_a_message_id_all_resolve_on_one_receipt() {
    let (conn, mut broker) = connected().await;

    let spawn_wait = || {
        let conn = conn.clone();
        tokio::spawn(async move { conn.ack_confirmed("m1", None, Duration::from_secs(5)).await })
    };
    let first = spawn_wait();
    let second = spawn_wait();
    assert_eq!(broker.next().await.command, Command::Ack);
    assert_eq!(broker.next().await.command, Command::Ack);

    broker.reply(b"RECEIPT\nreceipt-id:m1\n\n\0").await;
    first.await.unwrap().expect("first wait resolves");
    second.await.unwrap().expect("second wait resolves");
    assert_eq!(conn.phase().await, Phase::Connected);
}

#[tokio::test]
async fn timed_out_wait_does_not_cancel_another_on_same_id() {
    let (conn, mut broker) = connected().await;

    let short = {
        let conn = conn.clone();
        tokio::spawn(async move { conn.ack_confirmed("m1", None, Duration::from_millis(100)).await })
    };
    let long = {
        let conn = conn.clone();
        tokio::spawn(async move { conn.ack_confirmed("m1", None, Duration::from_secs(5)).await })
    };
    broker.next().await;
    broker.next().await;

    match short.await.unwrap() {
        Err(ConnError::ReceiptTimeout(id)) => assert_eq!(id, "m1"),
        other => panic!("expected ReceiptTimeout, got {:?}", other),
    }
    assert!(!long.is_finished());

    broker.reply(b"RECEIPT\nreceipt-id:m1\n\n\0").await;
    long.await.unwrap().expect("remaining wait still resolves");
}

#[tokio::test]
async fn malformed_frame_is_discarded_and_delivery_continues() {
    let (conn, mut broker) = connected().await;

    broker.reply(b"BOGUS\n\n\0").await;
    broker
        .reply(b"MESSAGE\nmessage-id:m7\ndestination:/queue/a\n\nafter\0")
        .await;

    let msg = tokio::time::timeout(Duration::from_secs(2), conn.receive())
        .await
        .expect("message after malformed frame was not delivered")
        .unwrap();
    assert_eq!(msg.message_id, "m7");
    assert_eq!(msg.body(), b"after");
    assert_eq!(conn.phase().await, Phase::Connected);

    conn.send("/queue/a", "still usable").await.unwrap();
    assert_eq!(broker.next().await.command, Command::Send);
}

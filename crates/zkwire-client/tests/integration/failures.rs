//! Dispatcher-wide failure semantics.

use zkwire_client::{ClientError, TransportError};
use zkwire_proto::{CreateResponse, EventType, KeeperState, ResponseBody, WatchedEvent};

use crate::harness::{client_server_pair, create_packet, establish};

#[tokio::test]
async fn test_channel_drop_mid_pipeline_cancels_everything() -> anyhow::Result<()> {
    let (client, mut server) = client_server_pair().await?;
    establish(&client, &mut server).await?;

    let rx1 = client.dispatcher.submit(create_packet(1, "/a", b"")).await?;
    let rx2 = client.dispatcher.submit(create_packet(2, "/b", b"")).await?;
    let rx3 = client.dispatcher.submit(create_packet(3, "/c", b"")).await?;
    for _ in 0..3 {
        server.expect_request().await?;
    }
    assert_eq!(client.dispatcher.pending_len(), 3);

    // The transport surfaces a channel error on read.
    drop(server);

    for rx in [rx1, rx2, rx3] {
        let err = rx.await?.unwrap_err();
        assert!(matches!(err, ClientError::Cancelled { .. }));
        assert!(matches!(
            err.root_cause(),
            ClientError::Transport(TransportError::Channel(_))
        ));
    }

    assert!(client.dispatcher.is_failed());
    assert_eq!(client.dispatcher.pending_len(), 0);
    assert!(!client.managers.conn.is_valid());
    assert!(client.managers.session.ping.is_cancelled());
    Ok(())
}

#[tokio::test]
async fn test_xid_mismatch_is_fatal() -> anyhow::Result<()> {
    let (client, mut server) = client_server_pair().await?;
    establish(&client, &mut server).await?;

    let rx = client.dispatcher.submit(create_packet(7, "/a", b"")).await?;
    server.expect_request().await?;

    // Desynchronized stream: the server answers a request we never sent.
    server.reply(9, 1, 0, &ResponseBody::None).await?;

    let err = rx.await?.unwrap_err();
    match err.root_cause() {
        ClientError::Association { expected, got } => {
            assert_eq!(*expected, 7);
            assert_eq!(*got, 9);
        }
        other => panic!("unexpected cause: {other:?}"),
    }
    assert!(client.dispatcher.is_failed());
    assert!(!client.managers.conn.is_valid());
    Ok(())
}

#[tokio::test]
async fn test_submission_after_failure_never_blocks() -> anyhow::Result<()> {
    let (client, mut server) = client_server_pair().await?;
    establish(&client, &mut server).await?;
    drop(server);

    // Wait for the read loop to observe the drop.
    for _ in 0..50 {
        if client.dispatcher.is_failed() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(client.dispatcher.is_failed());

    let started = std::time::Instant::now();
    let err = client
        .dispatcher
        .submit(create_packet(1, "/late", b""))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Cancelled { .. }));
    assert!(started.elapsed() < std::time::Duration::from_secs(1));
    Ok(())
}

#[tokio::test]
async fn test_notification_on_empty_queue_is_fine_other_xids_fatal() -> anyhow::Result<()> {
    let (client, mut server) = client_server_pair().await?;
    establish(&client, &mut server).await?;

    // A notification with nothing pending is normal traffic.
    server
        .notify(&WatchedEvent {
            event_type: EventType::NodeCreated,
            state: KeeperState::SyncConnected,
            path: "/orphan".into(),
        })
        .await?;

    // Round-trip one request to prove the dispatcher stayed healthy.
    let rx = client.dispatcher.submit(create_packet(1, "/a", b"")).await?;
    let (header, _) = server.expect_request().await?;
    server
        .reply(
            header.xid,
            1,
            0,
            &ResponseBody::Create(CreateResponse { path: "/a".into() }),
        )
        .await?;
    rx.await??;
    assert!(!client.dispatcher.is_failed());

    // A correlated-range xid with nothing pending is a protocol violation.
    server.reply(42, 2, 0, &ResponseBody::None).await?;
    for _ in 0..50 {
        if client.dispatcher.is_failed() {
            return Ok(());
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("dispatcher tolerated an uncorrelated reply");
}

#[tokio::test]
async fn test_cancellations_share_one_root_cause() -> anyhow::Result<()> {
    let (client, mut server) = client_server_pair().await?;
    establish(&client, &mut server).await?;

    let rx1 = client.dispatcher.submit(create_packet(1, "/a", b"")).await?;
    let rx2 = client.dispatcher.submit(create_packet(2, "/b", b"")).await?;
    server.expect_request().await?;
    server.expect_request().await?;
    drop(server);

    let err1 = rx1.await?.unwrap_err();
    let err2 = rx2.await?.unwrap_err();
    let (ClientError::Cancelled { cause: c1 }, ClientError::Cancelled { cause: c2 }) =
        (&err1, &err2)
    else {
        panic!("expected cancellations, got {err1:?} / {err2:?}");
    };
    assert!(std::sync::Arc::ptr_eq(c1, c2));
    Ok(())
}

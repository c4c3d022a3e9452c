//! Watch notification fan-out around the pending queue.

use zkwire_client::WatchKind;
use zkwire_proto::{
    CreateResponse, EventType, GetChildren2Response, KeeperState, ResponseBody, Stat, StatResponse,
    WatchedEvent,
};

use crate::harness::{children_packet, client_server_pair, create_packet, establish, exists_packet};

#[tokio::test]
async fn test_exists_watch_then_data_change() -> anyhow::Result<()> {
    let (client, mut server) = client_server_pair().await?;
    establish(&client, &mut server).await?;

    let mut watch_rx = client.managers.watches.register("/a", WatchKind::Exist);

    let rx = client
        .dispatcher
        .submit(exists_packet(1, "/a", true))
        .await?;
    let (header, mut body) = server.expect_request().await?;
    let req = zkwire_proto::PathWatchRequest::decode(&mut body)?;
    assert!(req.watch);
    server
        .reply(
            header.xid,
            1,
            0,
            &ResponseBody::Exists(StatResponse {
                stat: Stat::default(),
            }),
        )
        .await?;
    rx.await??;

    // Later, the watched node changes.
    server
        .notify(&WatchedEvent {
            event_type: EventType::NodeDataChanged,
            state: KeeperState::SyncConnected,
            path: "/a".into(),
        })
        .await?;

    let event = watch_rx.recv().await.expect("watch event");
    assert_eq!(event.event_type, EventType::NodeDataChanged);
    assert_eq!(event.path, "/a");

    // The notification left the queue untouched.
    assert_eq!(client.dispatcher.pending_len(), 0);
    assert!(!client.dispatcher.is_failed());
    Ok(())
}

#[tokio::test]
async fn test_interleaved_children_delete() -> anyhow::Result<()> {
    let (client, mut server) = client_server_pair().await?;
    establish(&client, &mut server).await?;

    let mut watch_rx = client.managers.watches.register("/p", WatchKind::Child);

    let rx = client
        .dispatcher
        .submit(children_packet(1, "/p", true))
        .await?;
    let (header, _) = server.expect_request().await?;

    // Reply dequeues the get_children record...
    server
        .reply(
            header.xid,
            2,
            0,
            &ResponseBody::GetChildren2(GetChildren2Response {
                children: vec!["c1".into(), "c2".into()],
                stat: Stat::default(),
            }),
        )
        .await?;
    let reply = rx.await??;
    match reply.body {
        ResponseBody::GetChildren2(resp) => assert_eq!(resp.children.len(), 2),
        other => panic!("unexpected body: {other:?}"),
    }
    assert_eq!(client.dispatcher.pending_len(), 0);

    // ...and the subsequent child deletion fans out without touching it.
    server
        .notify(&WatchedEvent {
            event_type: EventType::NodeChildrenChanged,
            state: KeeperState::SyncConnected,
            path: "/p".into(),
        })
        .await?;

    let event = watch_rx.recv().await.expect("watch event");
    assert_eq!(event.event_type, EventType::NodeChildrenChanged);
    assert_eq!(client.dispatcher.pending_len(), 0);
    Ok(())
}

#[tokio::test]
async fn test_notification_between_pipelined_replies() -> anyhow::Result<()> {
    let (client, mut server) = client_server_pair().await?;
    establish(&client, &mut server).await?;

    let mut watch_rx = client.managers.watches.register("/x", WatchKind::Data);

    let rx1 = client.dispatcher.submit(create_packet(1, "/x", b"")).await?;
    let rx2 = client.dispatcher.submit(create_packet(2, "/y", b"")).await?;
    server.expect_request().await?;
    server.expect_request().await?;

    server
        .reply(
            1,
            1,
            0,
            &ResponseBody::Create(CreateResponse { path: "/x".into() }),
        )
        .await?;
    // Watch event interleaved between the two replies.
    server
        .notify(&WatchedEvent {
            event_type: EventType::NodeDataChanged,
            state: KeeperState::SyncConnected,
            path: "/x".into(),
        })
        .await?;
    server
        .reply(
            2,
            2,
            0,
            &ResponseBody::Create(CreateResponse { path: "/y".into() }),
        )
        .await?;

    rx1.await??;
    rx2.await??;
    assert!(watch_rx.recv().await.is_some());
    assert_eq!(client.dispatcher.pending_len(), 0);
    Ok(())
}

#[tokio::test]
async fn test_state_notification_updates_session() -> anyhow::Result<()> {
    let (client, mut server) = client_server_pair().await?;
    establish(&client, &mut server).await?;

    server
        .notify(&WatchedEvent {
            event_type: EventType::None,
            state: KeeperState::Expired,
            path: String::new(),
        })
        .await?;

    // Session bookkeeping happens before fan-out; poll until the read loop
    // has processed the frame.
    for _ in 0..50 {
        if client.managers.session.state() == zkwire_client::SessionState::Expired {
            return Ok(());
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("session never observed expiry");
}

//! Test harness for in-process dispatcher integration tests.
//!
//! Provides a scripted server (one real TCP connection, frames written by
//! the test) and a connected client fixture with managers attached.

use std::net::SocketAddr;

use bytes::Bytes;
use tokio::net::{TcpListener, TcpStream};
use zkwire_client::transport::{split, ConnReader, ConnWriter};
use zkwire_client::{Dispatcher, Managers, Packet};
use zkwire_proto::{
    open_acl_unsafe, ConnectRequest, ConnectResponse, CreateRequest, OpCode, PathWatchRequest,
    Reader, ReplyHeader, Request, RequestHeader, ResponseBody, WatchedEvent, Writer,
};

/// One accepted connection, driven frame by frame from the test body.
pub struct ServerConn {
    read: ConnReader,
    write: ConnWriter,
}

#[allow(dead_code)]
impl ServerConn {
    pub async fn recv_frame(&mut self) -> anyhow::Result<Bytes> {
        Ok(self.read.next().await?)
    }

    pub async fn send_frame(&mut self, payload: Bytes) -> anyhow::Result<()> {
        self.write.send(payload).await?;
        Ok(())
    }

    /// Read the headerless connect body that opens every session.
    pub async fn expect_connect(&mut self) -> anyhow::Result<ConnectRequest> {
        let frame = self.recv_frame().await?;
        Ok(ConnectRequest::decode(&mut Reader::new(frame))?)
    }

    /// Complete session establishment: read the connect request, reply
    /// with a fresh session.
    pub async fn establish_session(&mut self, session_id: i64) -> anyhow::Result<ConnectRequest> {
        let req = self.expect_connect().await?;
        let resp = ConnectResponse {
            protocol_version: 0,
            timeout_ms: req.timeout_ms,
            session_id,
            password: vec![0xab; 16],
            read_only: false,
        };
        let mut w = Writer::new();
        resp.encode(&mut w);
        self.send_frame(w.into_bytes()).await?;
        Ok(req)
    }

    /// Read one protocol request; returns its header and a cursor over the
    /// body.
    pub async fn expect_request(&mut self) -> anyhow::Result<(RequestHeader, Reader)> {
        let frame = self.recv_frame().await?;
        let mut r = Reader::new(frame);
        let header = RequestHeader::decode(&mut r)?;
        Ok((header, r))
    }

    pub async fn reply(
        &mut self,
        xid: i32,
        zxid: i64,
        err: i32,
        body: &ResponseBody,
    ) -> anyhow::Result<()> {
        let mut w = Writer::new();
        ReplyHeader { xid, zxid, err }.encode(&mut w);
        body.encode(&mut w);
        self.send_frame(w.into_bytes()).await
    }

    /// Send an unsolicited watch notification.
    pub async fn notify(&mut self, event: &WatchedEvent) -> anyhow::Result<()> {
        let mut w = Writer::new();
        ReplyHeader {
            xid: zkwire_proto::NOTIFICATION_XID,
            zxid: -1,
            err: 0,
        }
        .encode(&mut w);
        event.encode(&mut w);
        self.send_frame(w.into_bytes()).await
    }
}

/// Connected client fixture with managers attached and configured.
pub struct TestClient {
    pub dispatcher: Dispatcher,
    pub managers: Managers,
}

/// Bind a scripted server on an ephemeral port, connect a client to it,
/// attach managers. Session establishment is left to the test.
pub async fn client_server_pair() -> anyhow::Result<(TestClient, ServerConn)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr: SocketAddr = listener.local_addr()?;

    let connect = tokio::spawn(async move { TcpStream::connect(addr).await });
    let (accepted, _peer) = listener.accept().await?;
    let client_stream = connect.await??;
    client_stream.set_nodelay(true)?;
    accepted.set_nodelay(true)?;

    let dispatcher = Dispatcher::new(client_stream);
    let managers = Managers::new();
    dispatcher
        .submit(Packet::ConfigureManagers(managers.clone()))
        .await?;
    dispatcher.submit(Packet::ConfigureDone).await?;

    let (read, write) = split(accepted);
    Ok((
        TestClient {
            dispatcher,
            managers,
        },
        ServerConn { read, write },
    ))
}

/// Establish a session over the pair.
pub async fn establish(client: &TestClient, server: &mut ServerConn) -> anyhow::Result<()> {
    let rx = client
        .dispatcher
        .submit(Packet::Connect(ConnectRequest::new(30_000, false)))
        .await?;
    server.establish_session(0x100).await?;
    let reply = rx.await??;
    anyhow::ensure!(
        matches!(reply.body, ResponseBody::Connect(_)),
        "connect reply carried no session"
    );
    Ok(())
}

/// Build a create packet for `path` with the given xid.
pub fn create_packet(xid: i32, path: &str, data: &[u8]) -> Packet {
    Packet::Protocol {
        header: RequestHeader::new(xid, OpCode::Create),
        request: Request::Create(CreateRequest {
            path: path.into(),
            data: data.to_vec(),
            acl: open_acl_unsafe(),
            flags: 0,
        }),
    }
}

#[allow(dead_code)]
pub fn exists_packet(xid: i32, path: &str, watch: bool) -> Packet {
    Packet::Protocol {
        header: RequestHeader::new(xid, OpCode::Exists),
        request: Request::Exists(PathWatchRequest {
            path: path.into(),
            watch,
        }),
    }
}

#[allow(dead_code)]
pub fn children_packet(xid: i32, path: &str, watch: bool) -> Packet {
    Packet::Protocol {
        header: RequestHeader::new(xid, OpCode::GetChildren2),
        request: Request::GetChildren2(PathWatchRequest {
            path: path.into(),
            watch,
        }),
    }
}

//! Wire records for every request and reply shape.
//!
//! Field order is the wire order and must not change. Each record offers
//! `encode` into a [`Writer`] and `decode` from a [`Reader`]; the
//! per-opcode dispatch lives in [`Request`] and [`ResponseBody`].

use bytes::Bytes;

use crate::de::{DecodeError, Reader};
use crate::ser::Writer;
use crate::{EventType, KeeperState, OpCode};

// ============================================================================
// Headers
// ============================================================================

/// Leading record of every protocol request (connect excepted).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    pub xid: i32,
    pub opcode: i32,
}

impl RequestHeader {
    pub fn new(xid: i32, opcode: OpCode) -> Self {
        Self {
            xid,
            opcode: opcode.as_i32(),
        }
    }

    pub fn encode(&self, w: &mut Writer) {
        w.write_i32(self.xid);
        w.write_i32(self.opcode);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        Ok(Self {
            xid: r.read_i32()?,
            opcode: r.read_i32()?,
        })
    }
}

/// Leading record of every reply frame (connect excepted).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyHeader {
    pub xid: i32,
    pub zxid: i64,
    pub err: i32,
}

impl ReplyHeader {
    pub fn encode(&self, w: &mut Writer) {
        w.write_i32(self.xid);
        w.write_i64(self.zxid);
        w.write_i32(self.err);
    }

    /// Fixed 16-byte prefix. A non-zero `err` is still a successful decode;
    /// honoring it is the caller's job.
    pub fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        Ok(Self {
            xid: r.read_i32()?,
            zxid: r.read_i64()?,
            err: r.read_i32()?,
        })
    }
}

// ============================================================================
// Session establishment (headerless on the wire)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub protocol_version: i32,
    pub last_zxid_seen: i64,
    pub timeout_ms: i32,
    pub session_id: i64,
    pub password: Vec<u8>,
    pub read_only: bool,
}

impl ConnectRequest {
    /// Fresh-session request: zeroed ids, empty password.
    pub fn new(timeout_ms: i32, read_only: bool) -> Self {
        Self {
            protocol_version: crate::PROTOCOL_VERSION,
            last_zxid_seen: 0,
            timeout_ms,
            session_id: 0,
            password: vec![0; crate::PASSWORD_LEN],
            read_only,
        }
    }

    pub fn encode(&self, w: &mut Writer) {
        w.write_i32(self.protocol_version);
        w.write_i64(self.last_zxid_seen);
        w.write_i32(self.timeout_ms);
        w.write_i64(self.session_id);
        w.write_buffer(Some(&self.password));
        w.write_bool(self.read_only);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        Ok(Self {
            protocol_version: r.read_i32()?,
            last_zxid_seen: r.read_i64()?,
            timeout_ms: r.read_i32()?,
            session_id: r.read_i64()?,
            password: r.read_buffer()?.map(|b| b.to_vec()).unwrap_or_default(),
            // Absent on pre-3.4 peers.
            read_only: r.read_trailing_bool()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectResponse {
    pub protocol_version: i32,
    pub timeout_ms: i32,
    pub session_id: i64,
    pub password: Vec<u8>,
    pub read_only: bool,
}

impl ConnectResponse {
    pub fn encode(&self, w: &mut Writer) {
        w.write_i32(self.protocol_version);
        w.write_i32(self.timeout_ms);
        w.write_i64(self.session_id);
        w.write_buffer(Some(&self.password));
        w.write_bool(self.read_only);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        Ok(Self {
            protocol_version: r.read_i32()?,
            timeout_ms: r.read_i32()?,
            session_id: r.read_i64()?,
            password: r.read_buffer()?.map(|b| b.to_vec()).unwrap_or_default(),
            read_only: r.read_trailing_bool()?,
        })
    }
}

// ============================================================================
// Shared records
// ============================================================================

/// Node metadata, returned by most read operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stat {
    pub czxid: i64,
    pub mzxid: i64,
    pub ctime: i64,
    pub mtime: i64,
    pub version: i32,
    pub cversion: i32,
    pub aversion: i32,
    pub ephemeral_owner: i64,
    pub data_length: i32,
    pub num_children: i32,
    pub pzxid: i64,
}

impl Stat {
    pub fn encode(&self, w: &mut Writer) {
        w.write_i64(self.czxid);
        w.write_i64(self.mzxid);
        w.write_i64(self.ctime);
        w.write_i64(self.mtime);
        w.write_i32(self.version);
        w.write_i32(self.cversion);
        w.write_i32(self.aversion);
        w.write_i64(self.ephemeral_owner);
        w.write_i32(self.data_length);
        w.write_i32(self.num_children);
        w.write_i64(self.pzxid);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        Ok(Self {
            czxid: r.read_i64()?,
            mzxid: r.read_i64()?,
            ctime: r.read_i64()?,
            mtime: r.read_i64()?,
            version: r.read_i32()?,
            cversion: r.read_i32()?,
            aversion: r.read_i32()?,
            ephemeral_owner: r.read_i64()?,
            data_length: r.read_i32()?,
            num_children: r.read_i32()?,
            pzxid: r.read_i64()?,
        })
    }
}

/// One ACL entry. The inner `Id` record (scheme, id) is flattened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acl {
    pub perms: i32,
    pub scheme: String,
    pub id: String,
}

impl Acl {
    pub fn encode(&self, w: &mut Writer) {
        w.write_i32(self.perms);
        w.write_string(&self.scheme);
        w.write_string(&self.id);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        Ok(Self {
            perms: r.read_i32()?,
            scheme: r.read_string()?,
            id: r.read_string()?,
        })
    }
}

/// Unsolicited server notification (reply xid -1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedEvent {
    pub event_type: EventType,
    pub state: KeeperState,
    pub path: String,
}

impl WatchedEvent {
    pub fn encode(&self, w: &mut Writer) {
        w.write_i32(self.event_type.as_i32());
        w.write_i32(self.state.as_i32());
        w.write_string(&self.path);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        Ok(Self {
            event_type: EventType::from_i32(r.read_i32()?)?,
            state: KeeperState::from_i32(r.read_i32()?)?,
            path: r.read_string()?,
        })
    }
}

// ============================================================================
// Request bodies
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRequest {
    pub path: String,
    pub data: Vec<u8>,
    pub acl: Vec<Acl>,
    pub flags: i32,
}

impl CreateRequest {
    pub fn encode(&self, w: &mut Writer) {
        w.write_string(&self.path);
        w.write_buffer(Some(&self.data));
        w.write_vec(&self.acl, |w, a| a.encode(w));
        w.write_i32(self.flags);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        Ok(Self {
            path: r.read_string()?,
            data: r.read_buffer()?.map(|b| b.to_vec()).unwrap_or_default(),
            acl: r.read_vec(Acl::decode)?,
            flags: r.read_i32()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    pub path: String,
    pub version: i32,
}

impl DeleteRequest {
    pub fn encode(&self, w: &mut Writer) {
        w.write_string(&self.path);
        w.write_i32(self.version);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        Ok(Self {
            path: r.read_string()?,
            version: r.read_i32()?,
        })
    }
}

/// Path plus watch flag: the shape shared by exists, get_data and both
/// get_children variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathWatchRequest {
    pub path: String,
    pub watch: bool,
}

impl PathWatchRequest {
    pub fn encode(&self, w: &mut Writer) {
        w.write_string(&self.path);
        w.write_bool(self.watch);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        Ok(Self {
            path: r.read_string()?,
            watch: r.read_bool()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetDataRequest {
    pub path: String,
    pub data: Vec<u8>,
    pub version: i32,
}

impl SetDataRequest {
    pub fn encode(&self, w: &mut Writer) {
        w.write_string(&self.path);
        w.write_buffer(Some(&self.data));
        w.write_i32(self.version);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        Ok(Self {
            path: r.read_string()?,
            data: r.read_buffer()?.map(|b| b.to_vec()).unwrap_or_default(),
            version: r.read_i32()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetAclRequest {
    pub path: String,
}

impl GetAclRequest {
    pub fn encode(&self, w: &mut Writer) {
        w.write_string(&self.path);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        Ok(Self {
            path: r.read_string()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetAclRequest {
    pub path: String,
    pub acl: Vec<Acl>,
    pub version: i32,
}

impl SetAclRequest {
    pub fn encode(&self, w: &mut Writer) {
        w.write_string(&self.path);
        w.write_vec(&self.acl, |w, a| a.encode(w));
        w.write_i32(self.version);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        Ok(Self {
            path: r.read_string()?,
            acl: r.read_vec(Acl::decode)?,
            version: r.read_i32()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    pub path: String,
}

impl SyncRequest {
    pub fn encode(&self, w: &mut Writer) {
        w.write_string(&self.path);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        Ok(Self {
            path: r.read_string()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequest {
    pub auth_type: i32,
    pub scheme: String,
    pub auth: Vec<u8>,
}

impl AuthRequest {
    pub fn encode(&self, w: &mut Writer) {
        w.write_i32(self.auth_type);
        w.write_string(&self.scheme);
        w.write_buffer(Some(&self.auth));
    }

    pub fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        Ok(Self {
            auth_type: r.read_i32()?,
            scheme: r.read_string()?,
            auth: r.read_buffer()?.map(|b| b.to_vec()).unwrap_or_default(),
        })
    }
}

/// Re-arm watches after a session move.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SetWatchesRequest {
    pub relative_zxid: i64,
    pub data_watches: Vec<String>,
    pub exist_watches: Vec<String>,
    pub child_watches: Vec<String>,
}

impl SetWatchesRequest {
    pub fn encode(&self, w: &mut Writer) {
        w.write_i64(self.relative_zxid);
        w.write_vec(&self.data_watches, |w, s| w.write_string(s));
        w.write_vec(&self.exist_watches, |w, s| w.write_string(s));
        w.write_vec(&self.child_watches, |w, s| w.write_string(s));
    }

    pub fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        Ok(Self {
            relative_zxid: r.read_i64()?,
            data_watches: r.read_vec(|r| r.read_string())?,
            exist_watches: r.read_vec(|r| r.read_string())?,
            child_watches: r.read_vec(|r| r.read_string())?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckVersionRequest {
    pub path: String,
    pub version: i32,
}

impl CheckVersionRequest {
    pub fn encode(&self, w: &mut Writer) {
        w.write_string(&self.path);
        w.write_i32(self.version);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        Ok(Self {
            path: r.read_string()?,
            version: r.read_i32()?,
        })
    }
}

// ============================================================================
// Response bodies
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateResponse {
    pub path: String,
}

impl CreateResponse {
    pub fn encode(&self, w: &mut Writer) {
        w.write_string(&self.path);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        Ok(Self {
            path: r.read_string()?,
        })
    }
}

/// Bare stat: the reply shape of exists, set_data and set_acl.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatResponse {
    pub stat: Stat,
}

impl StatResponse {
    pub fn encode(&self, w: &mut Writer) {
        self.stat.encode(w);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        Ok(Self {
            stat: Stat::decode(r)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetDataResponse {
    pub data: Vec<u8>,
    pub stat: Stat,
}

impl GetDataResponse {
    pub fn encode(&self, w: &mut Writer) {
        w.write_buffer(Some(&self.data));
        self.stat.encode(w);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        Ok(Self {
            data: r.read_buffer()?.map(|b| b.to_vec()).unwrap_or_default(),
            stat: Stat::decode(r)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetAclResponse {
    pub acl: Vec<Acl>,
    pub stat: Stat,
}

impl GetAclResponse {
    pub fn encode(&self, w: &mut Writer) {
        w.write_vec(&self.acl, |w, a| a.encode(w));
        self.stat.encode(w);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        Ok(Self {
            acl: r.read_vec(Acl::decode)?,
            stat: Stat::decode(r)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetChildrenResponse {
    pub children: Vec<String>,
}

impl GetChildrenResponse {
    pub fn encode(&self, w: &mut Writer) {
        w.write_vec(&self.children, |w, s| w.write_string(s));
    }

    pub fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        Ok(Self {
            children: r.read_vec(|r| r.read_string())?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetChildren2Response {
    pub children: Vec<String>,
    pub stat: Stat,
}

impl GetChildren2Response {
    pub fn encode(&self, w: &mut Writer) {
        w.write_vec(&self.children, |w, s| w.write_string(s));
        self.stat.encode(w);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        Ok(Self {
            children: r.read_vec(|r| r.read_string())?,
            stat: Stat::decode(r)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncResponse {
    pub path: String,
}

impl SyncResponse {
    pub fn encode(&self, w: &mut Writer) {
        w.write_string(&self.path);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        Ok(Self {
            path: r.read_string()?,
        })
    }
}

// ============================================================================
// Multi (transaction) framing
// ============================================================================

/// Per-op framing header inside a multi request or response. The sequence
/// terminates with `op == -1, done == true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultiHeader {
    pub op: i32,
    pub done: bool,
    pub err: i32,
}

impl MultiHeader {
    fn terminator() -> Self {
        Self {
            op: -1,
            done: true,
            err: -1,
        }
    }

    pub fn encode(&self, w: &mut Writer) {
        w.write_i32(self.op);
        w.write_bool(self.done);
        w.write_i32(self.err);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        Ok(Self {
            op: r.read_i32()?,
            done: r.read_bool()?,
            err: r.read_i32()?,
        })
    }
}

/// One operation inside a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultiOp {
    Create(CreateRequest),
    Delete(DeleteRequest),
    SetData(SetDataRequest),
    Check(CheckVersionRequest),
}

impl MultiOp {
    fn opcode(&self) -> OpCode {
        match self {
            MultiOp::Create(_) => OpCode::Create,
            MultiOp::Delete(_) => OpCode::Delete,
            MultiOp::SetData(_) => OpCode::SetData,
            MultiOp::Check(_) => OpCode::Check,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiRequest {
    pub ops: Vec<MultiOp>,
}

impl MultiRequest {
    pub fn encode(&self, w: &mut Writer) {
        for op in &self.ops {
            MultiHeader {
                op: op.opcode().as_i32(),
                done: false,
                err: -1,
            }
            .encode(w);
            match op {
                MultiOp::Create(req) => req.encode(w),
                MultiOp::Delete(req) => req.encode(w),
                MultiOp::SetData(req) => req.encode(w),
                MultiOp::Check(req) => req.encode(w),
            }
        }
        MultiHeader::terminator().encode(w);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        let mut ops = Vec::new();
        loop {
            let header = MultiHeader::decode(r)?;
            if header.done {
                break;
            }
            let op = match OpCode::from_i32(header.op)? {
                OpCode::Create => MultiOp::Create(CreateRequest::decode(r)?),
                OpCode::Delete => MultiOp::Delete(DeleteRequest::decode(r)?),
                OpCode::SetData => MultiOp::SetData(SetDataRequest::decode(r)?),
                OpCode::Check => MultiOp::Check(CheckVersionRequest::decode(r)?),
                _ => return Err(DecodeError::UnexpectedMultiOp(header.op)),
            };
            ops.push(op);
        }
        Ok(Self { ops })
    }
}

/// One result inside a transaction reply. A failed op arrives as an error
/// record carrying its code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultiResult {
    Create(CreateResponse),
    Delete,
    SetData(StatResponse),
    Check,
    Error(i32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiResponse {
    pub results: Vec<MultiResult>,
}

impl MultiResponse {
    pub fn encode(&self, w: &mut Writer) {
        for result in &self.results {
            let (op, err) = match result {
                MultiResult::Create(_) => (OpCode::Create.as_i32(), 0),
                MultiResult::Delete => (OpCode::Delete.as_i32(), 0),
                MultiResult::SetData(_) => (OpCode::SetData.as_i32(), 0),
                MultiResult::Check => (OpCode::Check.as_i32(), 0),
                MultiResult::Error(code) => (OpCode::Error.as_i32(), *code),
            };
            MultiHeader {
                op,
                done: false,
                err,
            }
            .encode(w);
            match result {
                MultiResult::Create(resp) => resp.encode(w),
                MultiResult::SetData(resp) => resp.encode(w),
                MultiResult::Error(code) => w.write_i32(*code),
                MultiResult::Delete | MultiResult::Check => {}
            }
        }
        MultiHeader::terminator().encode(w);
    }

    pub fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        let mut results = Vec::new();
        loop {
            let header = MultiHeader::decode(r)?;
            if header.done {
                break;
            }
            let result = match OpCode::from_i32(header.op)? {
                OpCode::Create => MultiResult::Create(CreateResponse::decode(r)?),
                OpCode::Delete => MultiResult::Delete,
                OpCode::SetData => MultiResult::SetData(StatResponse::decode(r)?),
                OpCode::Check => MultiResult::Check,
                OpCode::Error => MultiResult::Error(r.read_i32()?),
                _ => return Err(DecodeError::UnexpectedMultiOp(header.op)),
            };
            results.push(result);
        }
        Ok(Self { results })
    }
}

// ============================================================================
// Per-opcode dispatch
// ============================================================================

/// A protocol request body, tagged by operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Create(CreateRequest),
    Delete(DeleteRequest),
    Exists(PathWatchRequest),
    GetData(PathWatchRequest),
    SetData(SetDataRequest),
    GetAcl(GetAclRequest),
    SetAcl(SetAclRequest),
    GetChildren(PathWatchRequest),
    GetChildren2(PathWatchRequest),
    Sync(SyncRequest),
    Auth(AuthRequest),
    SetWatches(SetWatchesRequest),
    Multi(MultiRequest),
    Ping,
    CloseSession,
}

impl Request {
    pub fn opcode(&self) -> OpCode {
        match self {
            Request::Create(_) => OpCode::Create,
            Request::Delete(_) => OpCode::Delete,
            Request::Exists(_) => OpCode::Exists,
            Request::GetData(_) => OpCode::GetData,
            Request::SetData(_) => OpCode::SetData,
            Request::GetAcl(_) => OpCode::GetAcl,
            Request::SetAcl(_) => OpCode::SetAcl,
            Request::GetChildren(_) => OpCode::GetChildren,
            Request::GetChildren2(_) => OpCode::GetChildren2,
            Request::Sync(_) => OpCode::Sync,
            Request::Auth(_) => OpCode::Auth,
            Request::SetWatches(_) => OpCode::SetWatches,
            Request::Multi(_) => OpCode::Multi,
            Request::Ping => OpCode::Ping,
            Request::CloseSession => OpCode::CloseSession,
        }
    }

    pub fn encode(&self, w: &mut Writer) {
        match self {
            Request::Create(req) => req.encode(w),
            Request::Delete(req) => req.encode(w),
            Request::Exists(req) => req.encode(w),
            Request::GetData(req) => req.encode(w),
            Request::SetData(req) => req.encode(w),
            Request::GetAcl(req) => req.encode(w),
            Request::SetAcl(req) => req.encode(w),
            Request::GetChildren(req) => req.encode(w),
            Request::GetChildren2(req) => req.encode(w),
            Request::Sync(req) => req.encode(w),
            Request::Auth(req) => req.encode(w),
            Request::SetWatches(req) => req.encode(w),
            Request::Multi(req) => req.encode(w),
            Request::Ping | Request::CloseSession => {}
        }
    }
}

/// A decoded reply body. `None` covers header-only opcodes and every reply
/// whose header carries a non-zero error code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    None,
    Create(CreateResponse),
    Exists(StatResponse),
    GetData(GetDataResponse),
    SetData(StatResponse),
    GetAcl(GetAclResponse),
    SetAcl(StatResponse),
    GetChildren(GetChildrenResponse),
    GetChildren2(GetChildren2Response),
    Sync(SyncResponse),
    Multi(MultiResponse),
    Connect(ConnectResponse),
    WatchedEvent(WatchedEvent),
}

impl ResponseBody {
    /// Opcode-keyed body decode. A non-zero header error always yields an
    /// empty body, whatever the opcode's normal shape.
    pub fn decode(opcode: OpCode, err: i32, r: &mut Reader) -> Result<Self, DecodeError> {
        if err != 0 || !opcode.has_reply_body() {
            return Ok(ResponseBody::None);
        }
        Ok(match opcode {
            OpCode::Create => ResponseBody::Create(CreateResponse::decode(r)?),
            OpCode::Exists => ResponseBody::Exists(StatResponse::decode(r)?),
            OpCode::GetData => ResponseBody::GetData(GetDataResponse::decode(r)?),
            OpCode::SetData => ResponseBody::SetData(StatResponse::decode(r)?),
            OpCode::GetAcl => ResponseBody::GetAcl(GetAclResponse::decode(r)?),
            OpCode::SetAcl => ResponseBody::SetAcl(StatResponse::decode(r)?),
            OpCode::GetChildren => ResponseBody::GetChildren(GetChildrenResponse::decode(r)?),
            OpCode::GetChildren2 => ResponseBody::GetChildren2(GetChildren2Response::decode(r)?),
            OpCode::Sync => ResponseBody::Sync(SyncResponse::decode(r)?),
            OpCode::Multi => ResponseBody::Multi(MultiResponse::decode(r)?),
            OpCode::CreateSession => ResponseBody::Connect(ConnectResponse::decode(r)?),
            other => {
                debug_assert!(!other.has_reply_body());
                ResponseBody::None
            }
        })
    }

    pub fn encode(&self, w: &mut Writer) {
        match self {
            ResponseBody::None => {}
            ResponseBody::Create(resp) => resp.encode(w),
            ResponseBody::Exists(resp) => resp.encode(w),
            ResponseBody::GetData(resp) => resp.encode(w),
            ResponseBody::SetData(resp) => resp.encode(w),
            ResponseBody::GetAcl(resp) => resp.encode(w),
            ResponseBody::SetAcl(resp) => resp.encode(w),
            ResponseBody::GetChildren(resp) => resp.encode(w),
            ResponseBody::GetChildren2(resp) => resp.encode(w),
            ResponseBody::Sync(resp) => resp.encode(w),
            ResponseBody::Multi(resp) => resp.encode(w),
            ResponseBody::Connect(resp) => resp.encode(w),
            ResponseBody::WatchedEvent(event) => event.encode(w),
        }
    }
}

/// Encode a full protocol request frame payload: header then body.
pub fn encode_request_frame(header: &RequestHeader, request: &Request) -> Bytes {
    let mut w = Writer::with_capacity(64);
    header.encode(&mut w);
    request.encode(&mut w);
    w.into_bytes()
}

/// Encode a connect frame payload (headerless).
pub fn encode_connect_frame(request: &ConnectRequest) -> Bytes {
    let mut w = Writer::with_capacity(48);
    request.encode(&mut w);
    w.into_bytes()
}

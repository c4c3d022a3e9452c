//! zkwire protocol -- jute records, frame codec, opcode tables.
//!
//! Every packet on a ZooKeeper connection is a 4-byte big-endian length
//! prefix followed by jute-encoded records. This crate is pure: byte
//! cursors in, records out. All I/O lives in zkwire-client.

pub mod codec;
pub mod de;
pub mod records;
pub mod ser;

pub use codec::FrameCodec;
pub use de::{DecodeError, Reader};
pub use records::*;
pub use ser::Writer;

/// Maximum frame payload size, matching the server's default jute buffer
/// ceiling (jute.maxbuffer).
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Protocol version sent in the connect request. The server has never
/// bumped it.
pub const PROTOCOL_VERSION: i32 = 0;

/// Reply xid reserved for unsolicited watch notifications.
pub const NOTIFICATION_XID: i32 = -1;

/// Reply xid reserved for heartbeat (ping) replies.
pub const PING_XID: i32 = -2;

/// Conventional xid for auth packets. Auth replies correlate through the
/// queue like any other xid.
pub const AUTH_XID: i32 = -4;

/// Conventional xid for set-watches packets.
pub const SET_WATCHES_XID: i32 = -8;

/// Default client port.
pub const DEFAULT_PORT: u16 = 2181;

/// Session password length issued by the server.
pub const PASSWORD_LEN: usize = 16;

/// Errors raised by the frame codec.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Request/response operation codes, using the server's numeric convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    Notification,
    Create,
    Delete,
    Exists,
    GetData,
    SetData,
    GetAcl,
    SetAcl,
    GetChildren,
    Sync,
    Ping,
    GetChildren2,
    Check,
    Multi,
    Auth,
    SetWatches,
    CreateSession,
    CloseSession,
    Error,
}

impl OpCode {
    pub fn as_i32(self) -> i32 {
        match self {
            OpCode::Notification => 0,
            OpCode::Create => 1,
            OpCode::Delete => 2,
            OpCode::Exists => 3,
            OpCode::GetData => 4,
            OpCode::SetData => 5,
            OpCode::GetAcl => 6,
            OpCode::SetAcl => 7,
            OpCode::GetChildren => 8,
            OpCode::Sync => 9,
            OpCode::Ping => 11,
            OpCode::GetChildren2 => 12,
            OpCode::Check => 13,
            OpCode::Multi => 14,
            OpCode::Auth => 100,
            OpCode::SetWatches => 101,
            OpCode::CreateSession => -10,
            OpCode::CloseSession => -11,
            OpCode::Error => -1,
        }
    }

    pub fn from_i32(code: i32) -> Result<Self, DecodeError> {
        Ok(match code {
            0 => OpCode::Notification,
            1 => OpCode::Create,
            2 => OpCode::Delete,
            3 => OpCode::Exists,
            4 => OpCode::GetData,
            5 => OpCode::SetData,
            6 => OpCode::GetAcl,
            7 => OpCode::SetAcl,
            8 => OpCode::GetChildren,
            9 => OpCode::Sync,
            11 => OpCode::Ping,
            12 => OpCode::GetChildren2,
            13 => OpCode::Check,
            14 => OpCode::Multi,
            100 => OpCode::Auth,
            101 => OpCode::SetWatches,
            -10 => OpCode::CreateSession,
            -11 => OpCode::CloseSession,
            -1 => OpCode::Error,
            other => return Err(DecodeError::UnknownOpCode(other)),
        })
    }

    /// Whether a successful (`err == 0`) reply for this opcode carries a body.
    pub fn has_reply_body(self) -> bool {
        !matches!(
            self,
            OpCode::Auth
                | OpCode::Ping
                | OpCode::CloseSession
                | OpCode::Delete
                | OpCode::SetWatches
                | OpCode::Check
                | OpCode::Notification
                | OpCode::Error
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            OpCode::Notification => "notification",
            OpCode::Create => "create",
            OpCode::Delete => "delete",
            OpCode::Exists => "exists",
            OpCode::GetData => "get_data",
            OpCode::SetData => "set_data",
            OpCode::GetAcl => "get_acl",
            OpCode::SetAcl => "set_acl",
            OpCode::GetChildren => "get_children",
            OpCode::Sync => "sync",
            OpCode::Ping => "ping",
            OpCode::GetChildren2 => "get_children2",
            OpCode::Check => "check",
            OpCode::Multi => "multi",
            OpCode::Auth => "auth",
            OpCode::SetWatches => "set_watches",
            OpCode::CreateSession => "create_session",
            OpCode::CloseSession => "close_session",
            OpCode::Error => "error",
        }
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Server-reported error codes. These travel in the reply header's `err`
/// field and are data, never decode failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ZkError {
    #[error("system error")]
    SystemError,
    #[error("runtime inconsistency")]
    RuntimeInconsistency,
    #[error("data inconsistency")]
    DataInconsistency,
    #[error("connection loss")]
    ConnectionLoss,
    #[error("marshalling error")]
    MarshallingError,
    #[error("unimplemented operation")]
    Unimplemented,
    #[error("operation timeout")]
    OperationTimeout,
    #[error("bad arguments")]
    BadArguments,
    #[error("api error")]
    ApiError,
    #[error("no node")]
    NoNode,
    #[error("not authenticated")]
    NoAuth,
    #[error("bad version")]
    BadVersion,
    #[error("ephemeral nodes may not have children")]
    NoChildrenForEphemerals,
    #[error("node exists")]
    NodeExists,
    #[error("node has children")]
    NotEmpty,
    #[error("session expired")]
    SessionExpired,
    #[error("invalid callback")]
    InvalidCallback,
    #[error("invalid acl")]
    InvalidAcl,
    #[error("authentication failed")]
    AuthFailed,
    #[error("session moved")]
    SessionMoved,
    #[error("server is read-only")]
    NotReadOnly,
    #[error("server error {0}")]
    Other(i32),
}

impl ZkError {
    /// Map a reply header `err` field. `0` is success and maps to `None`.
    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            0 => return None,
            -1 => ZkError::SystemError,
            -2 => ZkError::RuntimeInconsistency,
            -3 => ZkError::DataInconsistency,
            -4 => ZkError::ConnectionLoss,
            -5 => ZkError::MarshallingError,
            -6 => ZkError::Unimplemented,
            -7 => ZkError::OperationTimeout,
            -8 => ZkError::BadArguments,
            -100 => ZkError::ApiError,
            -101 => ZkError::NoNode,
            -102 => ZkError::NoAuth,
            -103 => ZkError::BadVersion,
            -108 => ZkError::NoChildrenForEphemerals,
            -110 => ZkError::NodeExists,
            -111 => ZkError::NotEmpty,
            -112 => ZkError::SessionExpired,
            -113 => ZkError::InvalidCallback,
            -114 => ZkError::InvalidAcl,
            -115 => ZkError::AuthFailed,
            -118 => ZkError::SessionMoved,
            -119 => ZkError::NotReadOnly,
            other => ZkError::Other(other),
        })
    }

    pub fn code(self) -> i32 {
        match self {
            ZkError::SystemError => -1,
            ZkError::RuntimeInconsistency => -2,
            ZkError::DataInconsistency => -3,
            ZkError::ConnectionLoss => -4,
            ZkError::MarshallingError => -5,
            ZkError::Unimplemented => -6,
            ZkError::OperationTimeout => -7,
            ZkError::BadArguments => -8,
            ZkError::ApiError => -100,
            ZkError::NoNode => -101,
            ZkError::NoAuth => -102,
            ZkError::BadVersion => -103,
            ZkError::NoChildrenForEphemerals => -108,
            ZkError::NodeExists => -110,
            ZkError::NotEmpty => -111,
            ZkError::SessionExpired => -112,
            ZkError::InvalidCallback => -113,
            ZkError::InvalidAcl => -114,
            ZkError::AuthFailed => -115,
            ZkError::SessionMoved => -118,
            ZkError::NotReadOnly => -119,
            ZkError::Other(code) => code,
        }
    }
}

/// Watch event types carried in unsolicited notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    None,
    NodeCreated,
    NodeDeleted,
    NodeDataChanged,
    NodeChildrenChanged,
}

impl EventType {
    pub fn from_i32(code: i32) -> Result<Self, DecodeError> {
        Ok(match code {
            -1 => EventType::None,
            1 => EventType::NodeCreated,
            2 => EventType::NodeDeleted,
            3 => EventType::NodeDataChanged,
            4 => EventType::NodeChildrenChanged,
            other => return Err(DecodeError::UnknownEventType(other)),
        })
    }

    pub fn as_i32(self) -> i32 {
        match self {
            EventType::None => -1,
            EventType::NodeCreated => 1,
            EventType::NodeDeleted => 2,
            EventType::NodeDataChanged => 3,
            EventType::NodeChildrenChanged => 4,
        }
    }
}

/// Connection states carried in watch notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeeperState {
    Disconnected,
    SyncConnected,
    AuthFailed,
    ConnectedReadOnly,
    Expired,
}

impl KeeperState {
    pub fn from_i32(code: i32) -> Result<Self, DecodeError> {
        Ok(match code {
            0 => KeeperState::Disconnected,
            3 => KeeperState::SyncConnected,
            4 => KeeperState::AuthFailed,
            5 => KeeperState::ConnectedReadOnly,
            -112 => KeeperState::Expired,
            other => return Err(DecodeError::UnknownKeeperState(other)),
        })
    }

    pub fn as_i32(self) -> i32 {
        match self {
            KeeperState::Disconnected => 0,
            KeeperState::SyncConnected => 3,
            KeeperState::AuthFailed => 4,
            KeeperState::ConnectedReadOnly => 5,
            KeeperState::Expired => -112,
        }
    }
}

/// Create flags (combined into the `flags` field of a create request).
pub mod create_flags {
    pub const PERSISTENT: i32 = 0;
    pub const EPHEMERAL: i32 = 1;
    pub const SEQUENTIAL: i32 = 2;
}

/// ACL permission bits.
pub mod perms {
    pub const READ: i32 = 1;
    pub const WRITE: i32 = 2;
    pub const CREATE: i32 = 4;
    pub const DELETE: i32 = 8;
    pub const ADMIN: i32 = 16;
    pub const ALL: i32 = READ | WRITE | CREATE | DELETE | ADMIN;
}

/// The world-readable, world-writable ACL every quickstart uses.
pub fn open_acl_unsafe() -> Vec<records::Acl> {
    vec![records::Acl {
        perms: perms::ALL,
        scheme: "world".into(),
        id: "anyone".into(),
    }]
}

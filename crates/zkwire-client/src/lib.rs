//! zkwire client -- response dispatcher for the ZooKeeper wire protocol.
//!
//! The dispatcher sits between a framed byte transport and request
//! submitters: it correlates outbound requests with inbound replies over
//! one duplex stream, fans unsolicited watch notifications out to a
//! registry, and fails closed on transport errors. Re-exports the pieces
//! integration tests and embedders need.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod pending;
pub mod session;
pub mod transport;
pub mod watch;

pub use config::ClientConfig;
pub use dispatcher::{Dispatcher, Managers, Packet, Reply};
pub use error::{ClientError, TransportError};
pub use pending::{ReplyReceiver, ReplySender};
pub use session::{ConnState, PingScheduler, Session, SessionState};
pub use watch::{WatchKind, WatchManager};

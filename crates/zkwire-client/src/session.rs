//! Session manager -- connection-wide state the dispatcher correlates
//! against, plus the heartbeat scheduler it cancels on failure.
//!
//! The session never calls back into the dispatcher; the ping closure is
//! supplied from above so the dependency edge stays one-way.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use zkwire_proto::{ConnectResponse, KeeperState, WatchedEvent};

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotConnected,
    Connecting,
    Connected,
    ConnectedReadOnly,
    Closing,
    Closed,
    Expired,
    AuthFailed,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::NotConnected => "not_connected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::ConnectedReadOnly => "connected_read_only",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
            SessionState::Expired => "expired",
            SessionState::AuthFailed => "auth_failed",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            SessionState::Connected | SessionState::ConnectedReadOnly
        )
    }
}

/// Identity handed out by the server on session establishment.
#[derive(Debug, Clone, Default)]
pub struct SessionInfo {
    pub session_id: i64,
    pub password: Vec<u8>,
    pub timeout_ms: i32,
    pub read_only: bool,
}

/// Shared session handle. Constructed once, attached to the dispatcher via
/// the configuration packet, read-only reference thereafter.
#[derive(Debug)]
pub struct Session {
    state: Mutex<SessionState>,
    info: Mutex<SessionInfo>,
    closing: AtomicBool,
    /// Cleared the first time a connect reply installs a session.
    first_connect: AtomicBool,
    pub ping: PingScheduler,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SessionState::NotConnected),
            info: Mutex::new(SessionInfo::default()),
            closing: AtomicBool::new(false),
            first_connect: AtomicBool::new(true),
            ping: PingScheduler::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    pub fn set_state(&self, state: SessionState) {
        *self.state.lock().unwrap() = state;
    }

    pub fn info(&self) -> SessionInfo {
        self.info.lock().unwrap().clone()
    }

    pub fn is_first_connect(&self) -> bool {
        self.first_connect.load(Ordering::Acquire)
    }

    /// Whether the read loop should drain and exit.
    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
            || matches!(self.state(), SessionState::Closing | SessionState::Closed)
    }

    /// Mark the session as closing. Monotonic.
    pub fn begin_close(&self) {
        self.closing.store(true, Ordering::Release);
        self.set_state(SessionState::Closing);
    }

    /// Install a fresh session from a connect reply: new identity,
    /// connected state, first-connect cleared.
    pub fn install(&self, resp: &ConnectResponse) {
        *self.info.lock().unwrap() = SessionInfo {
            session_id: resp.session_id,
            password: resp.password.clone(),
            timeout_ms: resp.timeout_ms,
            read_only: resp.read_only,
        };
        self.set_state(if resp.read_only {
            SessionState::ConnectedReadOnly
        } else {
            SessionState::Connected
        });
        self.first_connect.store(false, Ordering::Release);
    }

    /// State bookkeeping for an unsolicited notification, before the event
    /// reaches the watch registry.
    pub fn note_watch_event(&self, event: &WatchedEvent) {
        let next = match event.state {
            KeeperState::Disconnected => Some(SessionState::NotConnected),
            KeeperState::Expired => Some(SessionState::Expired),
            KeeperState::AuthFailed => Some(SessionState::AuthFailed),
            KeeperState::SyncConnected | KeeperState::ConnectedReadOnly => None,
        };
        if let Some(next) = next {
            let prev = self.state();
            if prev != next {
                tracing::debug!(
                    from = prev.name(),
                    to = next.name(),
                    "session state moved by notification"
                );
                self.set_state(next);
            }
        }
    }
}

/// Cancellable periodic task driving heartbeats. The dispatcher only ever
/// calls [`cancel`](PingScheduler::cancel); scheduling is wired up by
/// whoever owns both the session and a dispatcher handle.
#[derive(Debug, Default)]
pub struct PingScheduler {
    handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
    cancelled: AtomicBool,
}

impl PingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `tick` every `interval` until cancelled. Re-scheduling replaces
    /// the previous task.
    pub fn schedule<F, Fut>(&self, interval: Duration, tick: F)
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.cancelled.load(Ordering::Acquire) {
            return;
        }
        let task = tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; skip it so the first
            // heartbeat waits a full interval.
            timer.tick().await;
            loop {
                timer.tick().await;
                tick().await;
            }
        });
        let mut handle = self.handle.lock().unwrap();
        if let Some(previous) = handle.replace(task) {
            previous.abort();
        }
    }

    /// Stop heartbeats. Idempotent; later `schedule` calls become no-ops.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(task) = self.handle.lock().unwrap().take() {
            task.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Connection-manager surface the dispatcher needs: a validity flag it
/// clears on failure.
#[derive(Debug)]
pub struct ConnState {
    valid: AtomicBool,
}

impl Default for ConnState {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnState {
    pub fn new() -> Self {
        Self {
            valid: AtomicBool::new(true),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
    }
}

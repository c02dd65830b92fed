use crate::database::Database;
use crate::error::{DataError, Result};
use downcast_rs::{impl_downcast, Downcast};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Unopened,
    Open,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Unopened => write!(f, "unopened"),
            ConnectionState::Open => write!(f, "open"),
            ConnectionState::Closed => write!(f, "closed"),
        }
    }
}

/// An open channel to one backend instance.
///
/// Lifecycle calls are synchronous and report failure through `Result`; a
/// failed call leaves the connection in the state it was in. The host
/// serializes lifecycle calls per connection.
pub trait Connection: Send + Sync + Downcast {
    /// URL the connection was created from
    fn url(&self) -> &Url;

    fn state(&self) -> ConnectionState;

    /// The primary database; only available while open
    fn database(&self) -> Result<Arc<dyn Database>>;

    /// No-op when already open
    fn open(&self) -> Result<()>;

    /// No-op when already closed
    fn close(&self) -> Result<()>;

    /// Return an open connection to a clean state without closing it
    fn reset(&self) -> Result<()>;

    fn as_multi_database(&self) -> Option<&dyn MultiDatabase> {
        None
    }

    fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }
}

impl_downcast!(Connection);

/// Optional trait for backends that host several databases behind one server
pub trait MultiDatabase: Connection {
    /// Names of the databases this connection could expose
    fn available_databases(&self) -> Result<Vec<String>>;

    /// A new, unopened connection scoped to `name`
    fn connection_selecting_database(&self, name: &str) -> Result<Arc<dyn Connection>>;
}

/// State machine shared by connection implementations.
///
/// Each transition runs the backend's closure first and only commits the new
/// state when it succeeds. Closures must not call back into the same
/// lifecycle.
#[derive(Debug)]
pub struct ConnectionLifecycle {
    state: Mutex<ConnectionState>,
}

impl ConnectionLifecycle {
    pub fn new() -> Self {
        Self::starting_in(ConnectionState::Unopened)
    }

    /// For connections whose handshake already happened during connect
    pub fn opened() -> Self {
        Self::starting_in(ConnectionState::Open)
    }

    fn starting_in(state: ConnectionState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ConnectionState> {
        // The guarded value is a plain enum, a poisoned lock still holds a valid state
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> ConnectionState {
        *self.lock()
    }

    pub fn ensure_open(&self) -> Result<()> {
        match self.state() {
            ConnectionState::Open => Ok(()),
            state => Err(DataError::invalid_state(format!("connection is {}", state))),
        }
    }

    pub fn open(&self, establish: impl FnOnce() -> Result<()>) -> Result<()> {
        let mut state = self.lock();
        match *state {
            ConnectionState::Open => Ok(()),
            ConnectionState::Closed => Err(DataError::invalid_state(
                "connection is closed and cannot be reopened",
            )),
            ConnectionState::Unopened => {
                establish()?;
                *state = ConnectionState::Open;
                debug!("Connection opened");
                Ok(())
            }
        }
    }

    pub fn close(&self, release: impl FnOnce() -> Result<()>) -> Result<()> {
        let mut state = self.lock();
        match *state {
            ConnectionState::Closed => Ok(()),
            ConnectionState::Unopened => {
                *state = ConnectionState::Closed;
                Ok(())
            }
            ConnectionState::Open => {
                release()?;
                *state = ConnectionState::Closed;
                debug!("Connection closed");
                Ok(())
            }
        }
    }

    pub fn reset(&self, clean: impl FnOnce() -> Result<()>) -> Result<()> {
        let state = self.lock();
        match *state {
            ConnectionState::Open => {
                clean()?;
                debug!("Connection reset");
                Ok(())
            }
            other => Err(DataError::invalid_state(format!(
                "cannot reset a connection that is {}",
                other
            ))),
        }
    }
}

impl Default for ConnectionLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

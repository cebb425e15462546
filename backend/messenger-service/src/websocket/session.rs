use crate::websocket::registry::ConnectionId;
use thiserror::Error;
use uuid::Uuid;

/// Lifecycle of one real-time connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Handshaking,
    Authenticated { user: Uuid, connection: ConnectionId },
    Closed,
}

impl ConnectionState {
    fn name(&self) -> &'static str {
        match self {
            ConnectionState::Handshaking => "handshaking",
            ConnectionState::Authenticated { .. } => "authenticated",
            ConnectionState::Closed => "closed",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid connection transition {from} -> {to}")]
pub struct TransitionError {
    pub from: &'static str,
    pub to: &'static str,
}

/// Explicit state machine driven by the transport callbacks
#[derive(Debug)]
pub struct ConnectionSession {
    state: ConnectionState,
}

impl Default for ConnectionSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionSession {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Handshaking,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// `Handshaking -> Authenticated`. Any other starting state is rejected.
    pub fn authenticate(&mut self, user: Uuid, connection: ConnectionId) -> Result<(), TransitionError> {
        match self.state {
            ConnectionState::Handshaking => {
                self.state = ConnectionState::Authenticated { user, connection };
                Ok(())
            }
            other => Err(TransitionError {
                from: other.name(),
                to: "authenticated",
            }),
        }
    }

    /// Move to `Closed`. Returns the presence binding to release the first
    /// time an authenticated session closes, `None` otherwise.
    pub fn close(&mut self) -> Option<(Uuid, ConnectionId)> {
        let previous = std::mem::replace(&mut self.state, ConnectionState::Closed);
        match previous {
            ConnectionState::Authenticated { user, connection } => Some((user, connection)),
            ConnectionState::Handshaking | ConnectionState::Closed => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state == ConnectionState::Closed
    }
}

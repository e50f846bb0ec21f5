//! Lifecycle state of the single upstream realtime connection.

use serde::{Deserialize, Serialize};

/// Connection lifecycle state.
///
/// Exactly one value exists per coordinator. It is mutated only by the
/// coordinator's lifecycle logic; everyone else observes snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    /// No screen is interested in any coin; nothing is open.
    #[default]
    Disconnected,
    /// A connect attempt is in flight.
    Connecting,
    /// The transport completed its handshake and is streaming.
    Connected,
    /// The last attempt failed or the stream dropped; a retry is scheduled.
    Reconnecting,
    /// The reconnection strategy gave up. Left on interest change or an
    /// explicit reconnect request.
    Failed,
}

impl ConnectionState {
    /// All states, in lifecycle order.
    pub const ALL: [ConnectionState; 5] =
        [Self::Disconnected, Self::Connecting, Self::Connected, Self::Reconnecting, Self::Failed];

    /// Whether a status indicator should be visible for this state.
    ///
    /// Hidden while streaming normally and in the initial idle state.
    pub fn shows_indicator(self) -> bool {
        matches!(self, Self::Connecting | Self::Reconnecting | Self::Failed)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "DISCONNECTED"),
            Self::Connecting => write!(f, "CONNECTING"),
            Self::Connected => write!(f, "CONNECTED"),
            Self::Reconnecting => write!(f, "RECONNECTING"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicator_hidden_when_connected_or_idle() {
        assert!(!ConnectionState::Connected.shows_indicator());
        assert!(!ConnectionState::Disconnected.shows_indicator());
    }

    #[test]
    fn indicator_shown_while_not_streaming() {
        assert!(ConnectionState::Connecting.shows_indicator());
        assert!(ConnectionState::Reconnecting.shows_indicator());
        assert!(ConnectionState::Failed.shows_indicator());
    }

    #[test]
    fn display_and_serde_agree() {
        for state in ConnectionState::ALL {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{state}\""));
        }
    }
}

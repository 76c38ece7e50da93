use std::fmt;

/// Socket lifecycle of one Connection.
///
/// ```text
/// Disconnected -> Connecting -> Open -> Reconnecting -> Connecting ...
///                     |                      ^
///                     +----------------------+
/// ```
/// `Disconnected` is terminal only after an explicit shutdown or an exhausted retry policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Reconnecting,
}

impl ConnectionState {
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Open)
                | (Connecting, Reconnecting)
                | (Open, Reconnecting)
                | (Reconnecting, Connecting)
                | (_, Disconnected)
        )
    }

    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "DISCONNECTED",
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::Open => "OPEN",
            ConnectionState::Reconnecting => "RECONNECTING",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConnectionState::*;

    #[test]
    fn test_documented_transitions() {
        assert!(Disconnected.can_transition_to(Connecting));
        assert!(Connecting.can_transition_to(Open));
        assert!(Connecting.can_transition_to(Reconnecting));
        assert!(Open.can_transition_to(Reconnecting));
        assert!(Reconnecting.can_transition_to(Connecting));
        assert!(Open.can_transition_to(Disconnected));
    }

    #[test]
    fn test_rejected_transitions() {
        assert!(!Disconnected.can_transition_to(Open));
        assert!(!Open.can_transition_to(Connecting));
        assert!(!Reconnecting.can_transition_to(Open));
    }
}

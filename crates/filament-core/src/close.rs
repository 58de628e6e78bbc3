//! WebSocket close codes used by the relay.

use std::fmt;

/// Close codes the relay sends or observes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CloseCode {
    /// 1000: normal closure.
    Normal,
    /// 1001: the server is shutting down or the connection went idle.
    GoingAway,
    /// 1006: abnormal closure (connection dropped without a close frame).
    ///
    /// Never sent by the relay, only observed.
    Abnormal,
    /// 1007: the frame payload was not a well-formed message envelope.
    MalformedEnvelope,
    /// 4000: the filament is missing a domain or a name.
    IncompleteFilament,
    /// 4100: the message names a topic the connection is not subscribed to.
    NotSubscribed,
    /// Any other code reported by the peer.
    Other(u16),
}

impl CloseCode {
    /// Numeric close code.
    pub fn as_u16(self) -> u16 {
        match self {
            Self::Normal => 1000,
            Self::GoingAway => 1001,
            Self::Abnormal => 1006,
            Self::MalformedEnvelope => 1007,
            Self::IncompleteFilament => 4000,
            Self::NotSubscribed => 4100,
            Self::Other(code) => code,
        }
    }

    /// Human-readable reason sent alongside the code.
    pub fn reason(self) -> &'static str {
        match self {
            Self::Normal => "",
            Self::GoingAway => "Server going away.",
            Self::Abnormal => "Abnormal closure, no reason given.",
            Self::MalformedEnvelope => "Malformed message envelope.",
            Self::IncompleteFilament => "Incomplete filament information.",
            Self::NotSubscribed => "Connection is not part of the filament conversation.",
            Self::Other(_) => "",
        }
    }
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        match code {
            1000 => Self::Normal,
            1001 => Self::GoingAway,
            1006 => Self::Abnormal,
            1007 => Self::MalformedEnvelope,
            4000 => Self::IncompleteFilament,
            4100 => Self::NotSubscribed,
            other => Self::Other(other),
        }
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.as_u16()
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

use thiserror::Error;

use crate::ControlMessage;

#[derive(Error, Debug)]
pub enum RelayCraftError {
    #[error("Frame too large: {len} bytes (max {max})")]
    FrameTooLarge { len: usize, max: usize },

    #[error("Malformed control message: {0}")]
    MalformedMessage(String),

    #[error("Unexpected control action: {0}")]
    UnexpectedAction(String),

    #[error("Connection closed during handshake")]
    HandshakeClosed,

    #[error("Handshake timed out")]
    HandshakeTimeout,

    #[error("Missing host ID")]
    MissingHostId,

    #[error("No target ID")]
    NoTargetId,

    #[error("Host {0} not found")]
    HostNotFound(String),

    #[error("Host failed")]
    HostFailed,

    #[error("Peer unreachable: {0}")]
    PeerUnreachable(std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayCraftError {
    /// Structured reply owed to the requester, if this error has one.
    ///
    /// Protocol and handshake failures close silently; only matching
    /// failures are reported back on the wire.
    pub fn reply(&self) -> Option<ControlMessage> {
        match self {
            Self::NoTargetId | Self::HostNotFound(_) | Self::HostFailed => {
                Some(ControlMessage::error(self.to_string()))
            }
            _ => None,
        }
    }

    /// True for failures caused by the peer breaking the framing rules
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Self::FrameTooLarge { .. } | Self::MalformedMessage(_) | Self::UnexpectedAction(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RelayCraftError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_frame_too_large() {
        let err = RelayCraftError::FrameTooLarge { len: 11, max: 10 };
        assert_eq!(err.to_string(), "Frame too large: 11 bytes (max 10)");
    }

    #[test]
    fn test_error_display_matches_wire_text() {
        assert_eq!(RelayCraftError::NoTargetId.to_string(), "No target ID");
        assert_eq!(
            RelayCraftError::HostNotFound("abc".to_string()).to_string(),
            "Host abc not found"
        );
        assert_eq!(RelayCraftError::HostFailed.to_string(), "Host failed");
    }

    #[test]
    fn test_reply_for_matching_errors() {
        let reply = RelayCraftError::HostNotFound("abc".to_string()).reply();
        assert_eq!(
            reply,
            Some(ControlMessage::Error {
                error: "Host abc not found".to_string()
            })
        );

        assert!(RelayCraftError::NoTargetId.reply().is_some());
        assert!(RelayCraftError::HostFailed.reply().is_some());
    }

    #[test]
    fn test_silent_errors_have_no_reply() {
        assert!(RelayCraftError::HandshakeTimeout.reply().is_none());
        assert!(RelayCraftError::MissingHostId.reply().is_none());
        assert!(RelayCraftError::FrameTooLarge { len: 1, max: 0 }.reply().is_none());
        assert!(RelayCraftError::UnexpectedAction("ping".to_string())
            .reply()
            .is_none());
    }

    #[test]
    fn test_is_protocol() {
        assert!(RelayCraftError::MalformedMessage("x".to_string()).is_protocol());
        assert!(RelayCraftError::FrameTooLarge { len: 1, max: 0 }.is_protocol());
        assert!(!RelayCraftError::HandshakeTimeout.is_protocol());
        assert!(!RelayCraftError::HostFailed.is_protocol());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err: RelayCraftError = io.into();
        assert!(matches!(err, RelayCraftError::Io(_)));
        assert_eq!(err.to_string(), "IO error: pipe");
    }

    #[test]
    fn test_result_type_err() {
        let result: Result<i32> = Err(RelayCraftError::HandshakeTimeout);
        assert!(result.is_err());
    }
}

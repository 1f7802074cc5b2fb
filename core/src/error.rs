//! Error types
//!
//! None of these are fatal. Capacity exhaustion, timeouts and overflow are
//! expected, best-effort outcomes; the caller retries or drops.

/// Bounded queue operation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelError {
    /// No space left (non-blocking put)
    Full,
    /// Nothing queued (non-blocking get)
    Empty,
    /// Blocking wait exceeded its bound; no data moved
    Timeout,
}

impl core::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Full => write!(f, "Channel full"),
            Self::Empty => write!(f, "Channel empty"),
            Self::Timeout => write!(f, "Channel wait timed out"),
        }
    }
}

impl core::error::Error for ChannelError {}

/// Subscriber registry errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegistryError {
    /// Every handle is in use
    Full,
    /// Handle was never issued (or already removed)
    UnknownHandle,
}

impl core::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Full => write!(f, "Subscriber registry full"),
            Self::UnknownHandle => write!(f, "Unknown subscriber handle"),
        }
    }
}

impl core::error::Error for RegistryError {}

/// Outbound serial errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SendError {
    /// Port has no hardware attached
    Disabled,
    /// Payload can never fit in the outbound channel
    TooLarge,
    /// Not enough room right now (non-blocking send)
    Full,
    /// Blocking send exceeded its bound
    Timeout,
}

impl core::fmt::Display for SendError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Disabled => write!(f, "Serial port disabled"),
            Self::TooLarge => write!(f, "Payload larger than output channel"),
            Self::Full => write!(f, "Output channel full"),
            Self::Timeout => write!(f, "Send timed out"),
        }
    }
}

impl core::error::Error for SendError {}

impl From<ChannelError> for SendError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::Timeout => Self::Timeout,
            ChannelError::Full | ChannelError::Empty => Self::Full,
        }
    }
}

impl embedded_io::Error for SendError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            Self::Disabled => embedded_io::ErrorKind::NotConnected,
            Self::TooLarge => embedded_io::ErrorKind::InvalidInput,
            Self::Full => embedded_io::ErrorKind::OutOfMemory,
            Self::Timeout => embedded_io::ErrorKind::TimedOut,
        }
    }
}

/// Time scaling errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimeError {
    /// No room for another scaling-change listener
    ListenerTableFull,
}

impl core::fmt::Display for TimeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ListenerTableFull => write!(f, "Scaling listener table full"),
        }
    }
}

impl core::error::Error for TimeError {}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_io::Error as _;

    #[test]
    fn test_channel_error_maps_to_send_error() {
        assert_eq!(SendError::from(ChannelError::Timeout), SendError::Timeout);
        assert_eq!(SendError::from(ChannelError::Full), SendError::Full);
    }

    #[test]
    fn test_send_error_io_kind() {
        assert_eq!(
            SendError::Timeout.kind(),
            embedded_io::ErrorKind::TimedOut
        );
        assert_eq!(
            SendError::Disabled.kind(),
            embedded_io::ErrorKind::NotConnected
        );
    }
}

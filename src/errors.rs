//! Error handling for the voting engine

/// Result type alias for the voting engine
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the voting engine
///
/// The variants map one-to-one onto the rejection policy of the engine:
/// state-machine misuse, malformed or unresolvable vote input, duplicate
/// explicit votes, the 26-option alphabet ceiling, platform transport
/// failures on the mandatory post/edit path, and internal invariant
/// violations. Pin/unpin permission failures are never represented here:
/// they are swallowed with a warning at the call site.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Lifecycle misuse (start while open, stop/cancel while closed)
    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    /// Malformed or unresolvable vote input
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Duplicate explicit vote for the same option by the same participant
    #[error("You have already voted for \"{title}\"")]
    AlreadyVoted { title: String },

    /// More options than the letter alphabet can address
    #[error("Too many options: a vote is limited to {limit} options")]
    CapacityExceeded { limit: usize },

    /// Message post/edit rejected or platform unreachable
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal invariant violations
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl Error {
    /// Create a new invalid-state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create a new invalid-input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a new already-voted error
    pub fn already_voted(title: impl Into<String>) -> Self {
        Self::AlreadyVoted {
            title: title.into(),
        }
    }

    /// Create a new capacity-exceeded error
    pub fn capacity_exceeded(limit: usize) -> Self {
        Self::CapacityExceeded { limit }
    }

    /// Create a new transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a new internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Convenience macros for creating specific error types
#[macro_export]
macro_rules! invalid_input {
    ($msg:expr) => {
        $crate::Error::invalid_input($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Error::invalid_input(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! transport_error {
    ($msg:expr) => {
        $crate::Error::transport($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Error::transport(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! internal_error {
    ($msg:expr) => {
        $crate::Error::internal($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Error::internal(format!($fmt, $($arg)*))
    };
}

//! Error types for the peripheral controller

use thiserror::Error;

use crate::events::EventKind;
use crate::protocol::PowerState;

// ----------------------------------------------------------------------------
// Adapter Error
// ----------------------------------------------------------------------------

/// Opaque error value reported by the adapter.
///
/// The controller never inspects or rewrites it; it is handed verbatim to the
/// waiting completion and to `*Error` subscribers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct AdapterError {
    message: String,
}

impl AdapterError {
    /// Create an adapter error from any displayable message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The message as reported by the adapter
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Result type for adapter commands
pub type AdapterResult<T> = std::result::Result<T, AdapterError>;

// ----------------------------------------------------------------------------
// Peripheral Error
// ----------------------------------------------------------------------------

/// Errors surfaced by the peripheral controller
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PeripheralError {
    #[error("could not {operation}, state is {state} (not poweredOn)")]
    InvalidState {
        operation: &'static str,
        state: PowerState,
    },

    #[error("malformed UUID {uuid:?}: {reason}")]
    MalformedUuid { uuid: String, reason: String },

    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("unknown power state: {0}")]
    InvalidPowerState(String),

    #[error("invalid advertising parameters: {0}")]
    InvalidAdvertisingParams(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("completion for {event} dropped before the adapter answered")]
    CompletionDropped { event: EventKind },

    #[error("completion for {event} was already taken")]
    CompletionTaken { event: EventKind },

    #[error("expected {expected} event, got {actual}")]
    UnexpectedEvent { expected: EventKind, actual: EventKind },
}

/// Result type for peripheral operations
pub type Result<T> = std::result::Result<T, PeripheralError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_state_message_names_state() {
        let err = PeripheralError::InvalidState {
            operation: "start advertising",
            state: PowerState::PoweredOff,
        };
        assert_eq!(
            err.to_string(),
            "could not start advertising, state is poweredOff (not poweredOn)"
        );
    }

    #[test]
    fn test_adapter_error_passes_through_verbatim() {
        let err: PeripheralError = AdapterError::new("Command Disallowed (0x0c)").into();
        assert_eq!(err, PeripheralError::Adapter(AdapterError::new("Command Disallowed (0x0c)")));
        assert_eq!(err.to_string(), "adapter error: Command Disallowed (0x0c)");
    }
}

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum BusError {
    #[error("BusError: Command handler registered already. Command type '{0}' by handler '{1}'")]
    CommandHandlerRegistered(String, String),

    #[error("BusError: Event handler registered already. Event type '{0}' by handler '{1}'")]
    EventHandlerRegistered(String, String),

    #[error("BusError: No command handler found for command type '{0}'")]
    CommandHandlerNotFound(String),

    #[error("BusError: Incorrect Message type '{0}' by handler '{1}'")]
    IncorrectMessageType(String, String),

    #[error("BusError: Incorrect Error type '{0}' by message '{1}'. Error: '{2}'")]
    IncorrectErrorType(String, String, String),

    #[error("BusError: DeserializationError: '{0}' error '{1}'")]
    DeserializationError(String, String),
}

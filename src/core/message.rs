use crate::core::contracts::{
    AnyError, ErasedMessage, ICommand, ICommandHandler, IErasedHandler, IEvent, IEventHandler,
    MessageContext, MessageKind,
};
use crate::core::error_bus::BusError;
use crate::core::handlers::{CommandHandlerWrapper, EventHandlerWrapper};
use std::any::type_name;
use std::sync::Arc;

pub type PayloadDecoder = fn(serde_json::Value) -> Result<ErasedMessage, BusError>;

fn decode<T>(value: serde_json::Value) -> Result<ErasedMessage, BusError>
where
    T: serde::de::DeserializeOwned + Send + Sync + 'static,
{
    serde_json::from_value::<T>(value)
        .map(|message| Arc::new(message) as ErasedMessage)
        .map_err(|err| BusError::DeserializationError(type_name::<T>().to_string(), err.to_string()))
}

#[derive(Debug, Clone)]
pub enum Payload {
    Typed(ErasedMessage),
    Json(serde_json::Value),
}

pub struct Envelope {
    pub context: MessageContext,
    pub payload: Payload,
}

impl Envelope {
    pub fn typed<T>(kind: MessageKind, message: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        Self {
            context: MessageContext::new(kind, type_name::<T>()),
            payload: Payload::Typed(Arc::new(message)),
        }
    }

    pub fn json(kind: MessageKind, message_name: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            context: MessageContext::new(kind, message_name),
            payload: Payload::Json(value),
        }
    }
}

/// A handler bound to one message type, ready to be attached to a bus client.
pub struct Subscription {
    pub kind: MessageKind,
    pub message_name: &'static str,
    pub handler_name: &'static str,
    pub handler: Arc<dyn IErasedHandler>,
    decoder: PayloadDecoder,
}

impl Subscription {
    pub fn command<C, E>(handler: Arc<dyn ICommandHandler<C, E>>) -> Self
    where
        C: ICommand<E>,
        E: AnyError,
    {
        Self {
            kind: MessageKind::Command,
            message_name: type_name::<C>(),
            handler_name: handler.handler_name(),
            handler: Arc::new(CommandHandlerWrapper::new(handler)),
            decoder: decode::<C>,
        }
    }

    pub fn event<Ev, E>(handler: Arc<dyn IEventHandler<Ev, E>>) -> Self
    where
        Ev: IEvent<E>,
        E: AnyError,
    {
        Self {
            kind: MessageKind::Event,
            message_name: type_name::<Ev>(),
            handler_name: handler.handler_name(),
            handler: Arc::new(EventHandlerWrapper::new(handler)),
            decoder: decode::<Ev>,
        }
    }

    pub fn decode(&self, payload: Payload) -> Result<ErasedMessage, BusError> {
        match payload {
            Payload::Typed(message) => Ok(message),
            Payload::Json(value) => (self.decoder)(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct CreateUser {
        name: String,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("TestError")]
    struct TestError;

    impl From<BusError> for TestError {
        fn from(_: BusError) -> Self {
            TestError
        }
    }

    impl ICommand<TestError> for CreateUser {}

    struct CreateUserHandler;

    #[async_trait]
    impl ICommandHandler<CreateUser, TestError> for CreateUserHandler {
        async fn handle_async(&self, _command: CreateUser) -> Result<(), TestError> {
            Ok(())
        }
    }

    #[test]
    fn test_command_subscription_names() {
        let subscription = Subscription::command::<CreateUser, TestError>(Arc::new(CreateUserHandler));
        assert_eq!(subscription.kind, MessageKind::Command);
        assert_eq!(subscription.message_name, type_name::<CreateUser>());
        assert_eq!(subscription.handler_name, type_name::<CreateUserHandler>());
    }

    #[test]
    fn test_decode_json_payload() {
        let subscription = Subscription::command::<CreateUser, TestError>(Arc::new(CreateUserHandler));
        let message = subscription
            .decode(Payload::Json(serde_json::json!({ "name": "ann" })))
            .unwrap();
        assert_eq!(
            message.downcast_ref::<CreateUser>(),
            Some(&CreateUser { name: "ann".into() })
        );
    }

    #[test]
    fn test_decode_invalid_json_payload() {
        let subscription = Subscription::command::<CreateUser, TestError>(Arc::new(CreateUserHandler));
        let result = subscription.decode(Payload::Json(serde_json::json!({ "nope": 1 })));
        assert!(matches!(result, Err(BusError::DeserializationError(_, _))));
    }

    #[test]
    fn test_typed_envelope_uses_type_name() {
        let envelope = Envelope::typed(MessageKind::Command, CreateUser { name: "bob".into() });
        assert_eq!(envelope.context.message_name, type_name::<CreateUser>());
        assert!(matches!(envelope.payload, Payload::Typed(_)));
    }
}

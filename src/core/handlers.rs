use crate::core::bus_client::InMemoryBusClient;
use crate::core::contracts::{
    AnyError, ErasedError, ErasedMessage, IBusClient, ICommand, ICommandHandler, IErasedHandler,
    IEvent, IEventHandler, MessageContext,
};
use crate::core::error_bus::BusError;
use crate::core::error_host::ServiceError;
use crate::core::registry::registered_pipelines;
use crate::core::services::{ServiceCollection, ServiceLifetime, ServiceProvider};
use async_trait::async_trait;
use std::any::type_name;
use std::sync::Arc;

pub struct CommandHandlerWrapper<C, E>
where
    C: ICommand<E>,
    E: AnyError,
{
    inner: Arc<dyn ICommandHandler<C, E>>,
}

impl<C, E> CommandHandlerWrapper<C, E>
where
    C: ICommand<E>,
    E: AnyError,
{
    pub fn new(inner: Arc<dyn ICommandHandler<C, E>>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<C, E> IErasedHandler for CommandHandlerWrapper<C, E>
where
    C: ICommand<E>,
    E: AnyError,
{
    async fn handle(
        &self,
        _context: &MessageContext,
        message: ErasedMessage,
    ) -> Result<(), ErasedError> {
        let command = message.downcast_ref::<C>().cloned().ok_or_else(|| {
            BusError::IncorrectMessageType(
                type_name::<C>().to_string(),
                self.inner.handler_name().to_string(),
            )
        })?;
        self.inner.handle_async(command).await?;
        Ok(())
    }
}

pub struct EventHandlerWrapper<Ev, E>
where
    Ev: IEvent<E>,
    E: AnyError,
{
    inner: Arc<dyn IEventHandler<Ev, E>>,
}

impl<Ev, E> EventHandlerWrapper<Ev, E>
where
    Ev: IEvent<E>,
    E: AnyError,
{
    pub fn new(inner: Arc<dyn IEventHandler<Ev, E>>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<Ev, E> IErasedHandler for EventHandlerWrapper<Ev, E>
where
    Ev: IEvent<E>,
    E: AnyError,
{
    async fn handle(
        &self,
        _context: &MessageContext,
        message: ErasedMessage,
    ) -> Result<(), ErasedError> {
        let event = message.downcast_ref::<Ev>().cloned().ok_or_else(|| {
            BusError::IncorrectMessageType(
                type_name::<Ev>().to_string(),
                self.inner.handler_name().to_string(),
            )
        })?;
        self.inner.handle_async(event).await?;
        Ok(())
    }
}

/// Turns an erased handler error back into the caller's error type.
///
/// Bus failures are routed through `From<BusError>`; anything else that is
/// not a `TError` becomes [`BusError::IncorrectErrorType`].
pub(crate) fn into_typed_error<TError: AnyError>(message_name: &str, err: ErasedError) -> TError {
    let err_str = err.to_string();
    match err.downcast::<TError>() {
        Ok(typed) => *typed,
        Err(err) => match err.downcast::<BusError>() {
            Ok(bus_error) => TError::from(*bus_error),
            Err(_) => TError::from(BusError::IncorrectErrorType(
                type_name::<TError>().to_string(),
                message_name.to_string(),
                err_str,
            )),
        },
    }
}

impl ServiceCollection {
    pub fn add_command_handler<C, E, H, F>(
        &mut self,
        lifetime: ServiceLifetime,
        factory: F,
    ) -> &mut Self
    where
        C: ICommand<E>,
        E: AnyError,
        H: ICommandHandler<C, E>,
        F: Fn(&ServiceProvider) -> Result<H, ServiceError> + Send + Sync + 'static,
    {
        self.add::<dyn ICommandHandler<C, E>, _>(lifetime, move |provider| {
            Ok(Arc::new(factory(provider)?) as Arc<dyn ICommandHandler<C, E>>)
        })
    }

    pub fn add_event_handler<Ev, E, H, F>(
        &mut self,
        lifetime: ServiceLifetime,
        factory: F,
    ) -> &mut Self
    where
        Ev: IEvent<E>,
        E: AnyError,
        H: IEventHandler<Ev, E>,
        F: Fn(&ServiceProvider) -> Result<H, ServiceError> + Send + Sync + 'static,
    {
        self.add::<dyn IEventHandler<Ev, E>, _>(lifetime, move |provider| {
            Ok(Arc::new(factory(provider)?) as Arc<dyn IEventHandler<Ev, E>>)
        })
    }

    pub fn add_bus_client(&mut self, client: Arc<dyn IBusClient>) -> &mut Self {
        self.add_singleton_instance::<dyn IBusClient>(client)
    }

    /// Registers an [`InMemoryBusClient`] carrying every pipeline declared
    /// with `#[BusPipeline]`.
    pub fn add_in_memory_bus(&mut self) -> &mut Self {
        self.add_singleton::<dyn IBusClient, _>(|_| {
            let client = InMemoryBusClient::new();
            for factory in registered_pipelines() {
                client.add_pipeline(factory());
            }
            Ok(Arc::new(client) as Arc<dyn IBusClient>)
        })
    }
}

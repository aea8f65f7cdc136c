use crate::core::contracts::{AnyError, ICommand, ICommandHandler, IEvent, IEventHandler};
use crate::core::error_host::ServiceError;
use crate::core::services::ServiceProvider;

/// Construction hook used by `#[CommandHandler(factory)]`.
pub trait CommandProvidesFactory<TCommandHandler, TCommand, TError>
where
    TCommandHandler: ICommandHandler<TCommand, TError>,
    TCommand: ICommand<TError>,
    TError: AnyError,
{
    fn factory(provider: &ServiceProvider) -> Result<TCommandHandler, ServiceError>;
}

/// Construction hook used by `#[EventHandler(factory)]`.
pub trait EventProvidesFactory<TEventHandler, TEvent, TError>
where
    TEventHandler: IEventHandler<TEvent, TError>,
    TEvent: IEvent<TError>,
    TError: AnyError,
{
    fn factory(provider: &ServiceProvider) -> Result<TEventHandler, ServiceError>;
}

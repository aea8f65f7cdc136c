use crate::core::contracts::{
    AnyError, IBusPipeline, ICommand, ICommandHandler, IEvent, IEventHandler, MessageKind,
};
use crate::core::error_bus::BusError;
use crate::core::error_host::{HostError, ServiceError};
use crate::core::service_host::BusBuilder;
use crate::core::services::{ServiceCollection, ServiceLifetime, ServiceProvider};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::any::type_name;
use std::sync::Arc;

type Registration = dyn Fn(&mut ServiceCollection) + Send + Sync + 'static;
type Subscriber = fn(BusBuilder) -> Result<BusBuilder, HostError>;
type PipelineFactory = dyn Fn() -> Arc<dyn IBusPipeline> + Send + Sync + 'static;

/// A handler declared with `#[CommandHandler]` or `#[EventHandler]`.
pub struct RegisteredHandler {
    pub kind: MessageKind,
    pub message_name: &'static str,
    pub handler_name: &'static str,
    register: Arc<Registration>,
    subscribe: Subscriber,
}

static HANDLERS: OnceCell<RwLock<Vec<Arc<RegisteredHandler>>>> = OnceCell::new();
static PIPELINES: OnceCell<RwLock<Vec<Arc<PipelineFactory>>>> = OnceCell::new();
static CONFLICTS: OnceCell<RwLock<Vec<BusError>>> = OnceCell::new();

fn get_handlers() -> &'static RwLock<Vec<Arc<RegisteredHandler>>> {
    HANDLERS.get_or_init(|| RwLock::new(Vec::new()))
}

fn get_pipelines() -> &'static RwLock<Vec<Arc<PipelineFactory>>> {
    PIPELINES.get_or_init(|| RwLock::new(Vec::new()))
}

fn get_conflicts() -> &'static RwLock<Vec<BusError>> {
    CONFLICTS.get_or_init(|| RwLock::new(Vec::new()))
}

fn register_handler(handler: RegisteredHandler) -> Result<(), BusError> {
    let mut handlers = get_handlers().write();

    // the container holds one implementation per handler trait, so a message
    // type can only be claimed once
    if handlers.iter().any(|existing| {
        existing.kind == handler.kind && existing.message_name == handler.message_name
    }) {
        let message_name = handler.message_name.to_string();
        let handler_name = handler.handler_name.to_string();
        let err = match handler.kind {
            MessageKind::Command => BusError::CommandHandlerRegistered(message_name, handler_name),
            MessageKind::Event => BusError::EventHandlerRegistered(message_name, handler_name),
        };

        #[cfg(feature = "logging")]
        log::error!("Registry. {}", err);

        // reported again by BusBuilder::subscribe_to_registered_handlers
        get_conflicts().write().push(err.clone());
        return Err(err);
    }

    handlers.push(Arc::new(handler));
    Ok(())
}

pub fn command_handler<H, C, E, F>(factory: F) -> Result<(), BusError>
where
    F: Fn(&ServiceProvider) -> Result<H, ServiceError> + Send + Sync + 'static,
    H: ICommandHandler<C, E>,
    C: ICommand<E>,
    E: AnyError,
{
    let factory = Arc::new(factory);
    register_handler(RegisteredHandler {
        kind: MessageKind::Command,
        message_name: type_name::<C>(),
        handler_name: type_name::<H>(),
        register: Arc::new(move |services: &mut ServiceCollection| {
            let factory = Arc::clone(&factory);
            services.add_command_handler::<C, E, H, _>(ServiceLifetime::Scoped, move |provider| {
                factory(provider)
            });
        }),
        subscribe: |builder| builder.subscribe_to_command::<C, E>(),
    })
}

pub fn event_handler<H, Ev, E, F>(factory: F) -> Result<(), BusError>
where
    F: Fn(&ServiceProvider) -> Result<H, ServiceError> + Send + Sync + 'static,
    H: IEventHandler<Ev, E>,
    Ev: IEvent<E>,
    E: AnyError,
{
    let factory = Arc::new(factory);
    register_handler(RegisteredHandler {
        kind: MessageKind::Event,
        message_name: type_name::<Ev>(),
        handler_name: type_name::<H>(),
        register: Arc::new(move |services: &mut ServiceCollection| {
            let factory = Arc::clone(&factory);
            services.add_event_handler::<Ev, E, H, _>(ServiceLifetime::Scoped, move |provider| {
                factory(provider)
            });
        }),
        subscribe: |builder| builder.subscribe_to_event::<Ev, E>(),
    })
}

pub fn bus_pipeline(factory: impl Fn() -> Arc<dyn IBusPipeline> + Send + Sync + 'static) {
    get_pipelines().write().push(Arc::new(factory));
}

pub fn registered_handlers() -> Vec<Arc<RegisteredHandler>> {
    get_handlers().read().clone()
}

/// Duplicate declarations rejected so far, in registration order.
pub fn registration_conflicts() -> Vec<BusError> {
    get_conflicts().read().clone()
}

pub(crate) fn registered_pipelines() -> Vec<Arc<PipelineFactory>> {
    get_pipelines().read().clone()
}

impl RegisteredHandler {
    pub(crate) fn subscribe(&self, builder: BusBuilder) -> Result<BusBuilder, HostError> {
        (self.subscribe)(builder)
    }
}

impl ServiceCollection {
    /// Adds every handler declared with `#[CommandHandler]` / `#[EventHandler]`
    /// as a scoped service.
    pub fn add_registered_handlers(&mut self) -> &mut Self {
        for handler in registered_handlers() {
            (handler.register)(&mut *self);
        }
        self
    }
}

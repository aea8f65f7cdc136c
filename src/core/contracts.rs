use crate::core::configuration::Configuration;
use crate::core::error_bus::BusError;
use crate::core::error_host::HostError;
use crate::core::message::{Envelope, Subscription};
use crate::core::services::{ServiceCollection, ServiceProvider};
use async_trait::async_trait;
use axum::Router;
use std::any::{Any, type_name};
use std::error::Error;
use std::sync::Arc;

pub type ErasedMessage = Arc<dyn Any + Send + Sync>;
pub type ErasedError = Box<dyn Error + Send + Sync>;

pub trait TypeNamed {
    fn type_name(&self) -> &'static str {
        type_name::<Self>()
    }
}

impl<T> TypeNamed for T {
    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }
}

pub trait AnyError: Error + From<BusError> + Send + Sync + 'static {}
impl<T> AnyError for T where T: Error + From<BusError> + Send + Sync + 'static {}

pub trait ICommand<TError>:
    serde::Serialize + serde::de::DeserializeOwned + TypeNamed + Clone + Send + Sync + 'static
where
    TError: AnyError,
{
}

pub trait IEvent<TError>:
    serde::Serialize + serde::de::DeserializeOwned + TypeNamed + Clone + Send + Sync + 'static
where
    TError: AnyError,
{
}

#[async_trait]
pub trait ICommandHandler<TCommand, TError>: Send + Sync + 'static
where
    TCommand: ICommand<TError>,
    TError: AnyError,
{
    async fn handle_async(&self, command: TCommand) -> Result<(), TError>;

    fn handler_name(&self) -> &'static str {
        type_name::<Self>()
    }
}

#[async_trait]
pub trait IEventHandler<TEvent, TError>: Send + Sync + 'static
where
    TEvent: IEvent<TError>,
    TError: AnyError,
{
    async fn handle_async(&self, event: TEvent) -> Result<(), TError>;

    fn handler_name(&self) -> &'static str {
        type_name::<Self>()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Command,
    Event,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageKind::Command => write!(f, "command"),
            MessageKind::Event => write!(f, "event"),
        }
    }
}

/// Metadata attached to every dispatched message and handed to pipelines.
#[derive(Debug, Clone)]
pub struct MessageContext {
    pub message_id: uuid::Uuid,
    pub message_name: String,
    pub kind: MessageKind,
    pub published_at: chrono::DateTime<chrono::Utc>,
}

impl MessageContext {
    pub fn new(kind: MessageKind, message_name: impl Into<String>) -> Self {
        Self {
            message_id: uuid::Uuid::now_v7(),
            message_name: message_name.into(),
            kind,
            published_at: chrono::Utc::now(),
        }
    }
}

#[async_trait]
pub trait IErasedHandler: Send + Sync {
    async fn handle(
        &self,
        context: &MessageContext,
        message: ErasedMessage,
    ) -> Result<(), ErasedError>;
}

#[async_trait]
pub trait IBusPipeline: Send + Sync {
    async fn handle(
        &self,
        context: &MessageContext,
        message: ErasedMessage,
        next: Arc<dyn IErasedHandler>,
    ) -> Result<(), ErasedError>;
}

/// Publish/subscribe client the host attaches handlers to.
///
/// The trait is object safe so it can be registered in and resolved from a
/// [`ServiceProvider`] as `dyn IBusClient`. Typed helpers live in
/// [`crate::core::bus_client::BusClientExt`].
#[async_trait]
pub trait IBusClient: Send + Sync + 'static {
    fn subscribe(&self, subscription: Subscription) -> Result<(), BusError>;

    async fn dispatch(&self, envelope: Envelope) -> Result<(), ErasedError>;
}

#[async_trait]
pub trait IWebHost: Send + Sync {
    fn services(&self) -> &ServiceProvider;

    async fn run_async(&self) -> Result<(), HostError>;
}

/// Application entry point type handed to [`crate::ServiceHost::create`].
pub trait IStartup: Send + Sync + 'static {
    fn new(configuration: &Configuration) -> Self
    where
        Self: Sized;

    fn configure_services(&self, services: &mut ServiceCollection);

    fn configure(&self, app: Router<ServiceProvider>) -> Router<ServiceProvider> {
        app
    }
}
